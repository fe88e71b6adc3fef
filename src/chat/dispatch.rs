//! Executes parsed REPL commands against a session.

use crate::backend::ChatBackend;
use crate::chat::commands::{ChatCommand, SystemAction, help_table};
use crate::chat::config::find_field;
use crate::chat::session::ChatSession;
use crate::clipboard::Clipboard;
use crate::observability::REPL_COMMANDS;
use crate::render::Renderer;

/// Whether the REPL keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Run one command.  Failures are reported through `renderer` and never end the REPL.
pub fn dispatch<B: ChatBackend>(
    command: ChatCommand,
    session: &mut ChatSession<B>,
    renderer: &mut dyn Renderer,
    clipboard: &mut dyn Clipboard,
) -> Flow {
    REPL_COMMANDS.click();
    tracing::debug!(?command, "dispatching command");
    match command {
        ChatCommand::System(SystemAction::Show) => {
            renderer.print_info(session.system_prompt());
        }
        ChatCommand::System(SystemAction::Reset) => {
            session.reset_system_prompt();
            renderer.print_info("System prompt has been reset");
        }
        ChatCommand::Embed(files) => {
            for file in &files {
                match session.embed_file(file) {
                    Ok(()) => renderer.print_info(&format!("Added `{file}` to system prompt")),
                    Err(err) => renderer.print_error(&err.to_string()),
                }
            }
        }
        ChatCommand::Save(path) => match session.save_transcript(path.as_deref()) {
            Ok(path) => {
                renderer.print_info(&format!("History saved to `{}`", path.display()));
            }
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Load(path) => match session.load_transcript(path.as_deref()) {
            Ok(path) => {
                renderer.print_info(&format!("Loaded history from `{}`", path.display()));
            }
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Copy => match session.last_response() {
            Some(text) => match clipboard.set_text(text) {
                Ok(()) => renderer.print_info("Copied last response to clipboard"),
                Err(err) => renderer.print_error(&err.to_string()),
            },
            None => renderer.print_info("nothing to copy"),
        },
        ChatCommand::ShowConfig => {
            renderer.print_info(&session.config().to_string());
        }
        ChatCommand::SetConfig { field, value } => {
            set_config(session, renderer, &field, &value);
        }
        ChatCommand::Help => {
            renderer.print_info(&help_table(session.command_prefix()));
        }
        ChatCommand::Exit => {
            renderer.print_info("Goodbye!");
            return Flow::Exit;
        }
    }
    Flow::Continue
}

fn set_config<B: ChatBackend>(
    session: &mut ChatSession<B>,
    renderer: &mut dyn Renderer,
    name: &str,
    value: &str,
) {
    let field = match session.set_config_field(name, value) {
        Ok(field) => field,
        Err(err) => {
            renderer.print_error(&err.to_string());
            return;
        }
    };
    let shown = find_field(field)
        .map(|f| f.value(session.config()))
        .unwrap_or_default();
    match session.persist_config() {
        Ok(Some(path)) => renderer.print_info(&format!(
            "{field} set to {shown} (saved to `{}`)",
            path.display()
        )),
        Ok(None) => renderer.print_info(&format!("{field} set to {shown}")),
        Err(err) => {
            renderer.print_info(&format!("{field} set to {shown}"));
            renderer.print_error(&format!("failed to save config: {err}"));
        }
    }
}
