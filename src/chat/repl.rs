//! The read-classify-dispatch loop.

use crate::backend::ChatBackend;
use crate::chat::commands::{DispatchError, parse_command};
use crate::chat::dispatch::{Flow, dispatch};
use crate::chat::session::ChatSession;
use crate::clipboard::Clipboard;
use crate::interrupt::Interrupt;
use crate::observability::REPL_UNKNOWN_COMMANDS;
use crate::render::Renderer;

/// Prompt shown before each line.
pub const PROMPT: &str = "> ";

/// The result of asking for one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl+C at the prompt.
    Interrupted,
    /// End of input.
    Eof,
    /// The input could not be read.
    Failed(String),
}

/// Where the REPL gets its lines from.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome;

    /// Called whenever the command prefix may have changed.
    fn set_command_prefix(&mut self, _prefix: char) {}
}

/// REPL lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplState {
    Running,
    Terminated,
}

/// Drives a [`ChatSession`] from a [`LineSource`].
pub struct Repl<B: ChatBackend> {
    session: ChatSession<B>,
    renderer: Box<dyn Renderer>,
    clipboard: Box<dyn Clipboard>,
    interrupt: Interrupt,
    state: ReplState,
}

impl<B: ChatBackend> Repl<B> {
    pub fn new(
        session: ChatSession<B>,
        renderer: Box<dyn Renderer>,
        clipboard: Box<dyn Clipboard>,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            session,
            renderer,
            clipboard,
            interrupt,
            state: ReplState::Running,
        }
    }

    pub fn session(&self) -> &ChatSession<B> {
        &self.session
    }

    pub fn state(&self) -> ReplState {
        self.state
    }

    /// Print the startup banner.
    pub fn print_banner(&mut self) {
        self.renderer.print_info(&format!("parley (model: {})", self.session.model()));
        self.renderer.print_info(&format!(
            "Type {}help for help.",
            self.session.command_prefix()
        ));
    }

    /// Read and handle lines until `exit` or end of input.
    pub async fn run(&mut self, input: &mut dyn LineSource) {
        self.state = ReplState::Running;
        input.set_command_prefix(self.session.command_prefix());
        while self.state == ReplState::Running {
            self.interrupt.clear();
            match input.read_line(PROMPT) {
                ReadOutcome::Line(line) => {
                    self.handle_line(&line).await;
                    input.set_command_prefix(self.session.command_prefix());
                }
                ReadOutcome::Interrupted => continue,
                ReadOutcome::Eof => {
                    tracing::debug!("end of input");
                    self.state = ReplState::Terminated;
                }
                ReadOutcome::Failed(err) => {
                    tracing::warn!(error = %err, "failed to read input");
                    self.state = ReplState::Terminated;
                }
            }
        }
    }

    /// Route one line to the dispatcher or the chat engine.
    pub async fn handle_line(&mut self, line: &str) {
        match parse_command(line, self.session.command_prefix()) {
            Some(Ok(command)) => {
                let flow = dispatch(
                    command,
                    &mut self.session,
                    self.renderer.as_mut(),
                    self.clipboard.as_mut(),
                );
                if flow == Flow::Exit {
                    self.state = ReplState::Terminated;
                }
            }
            Some(Err(err)) => {
                if matches!(err, DispatchError::UnknownCommand(_)) {
                    REPL_UNKNOWN_COMMANDS.click();
                }
                self.renderer.print_error(&err.to_string());
            }
            None => {
                if let Err(err) = self
                    .session
                    .send_streaming(line, self.renderer.as_mut(), &self.interrupt)
                    .await
                {
                    if err.is_abort() {
                        self.renderer.print_interrupted();
                    } else {
                        tracing::warn!(error = %err, "chat turn failed");
                        self.renderer.print_error(&err.to_string());
                    }
                }
            }
        }
    }
}
