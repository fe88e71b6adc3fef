//! Test doubles shared by the chat module's unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures::stream::{self, StreamExt};

use crate::backend::{ChatBackend, ChunkStream};
use crate::clipboard::Clipboard;
use crate::interrupt::Interrupt;
use crate::render::Renderer;
use crate::types::ChatCompletionRequest;
use crate::{Error, Result};

/// One scripted reply.
pub enum Reply {
    /// Stream these items, then end.
    Chunks(Vec<Result<String>>),
    /// Stream these chunks, then never end.
    Stall(Vec<String>),
    /// Refuse to start the stream.
    Refuse(Error),
}

impl Reply {
    pub fn text(chunks: &[&str]) -> Self {
        Reply::Chunks(chunks.iter().map(|c| Ok(c.to_string())).collect())
    }
}

/// Backend that answers from a script and records every request.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatBackend for ScriptedBackend {
    async fn stream_chat(&self, request: ChatCompletionRequest) -> Result<ChunkStream> {
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Chunks(Vec::new()));
        match reply {
            Reply::Chunks(items) => Ok(Box::pin(stream::iter(items))),
            Reply::Stall(chunks) => Ok(Box::pin(
                stream::iter(chunks.into_iter().map(Ok)).chain(stream::pending()),
            )),
            Reply::Refuse(err) => Err(err),
        }
    }
}

/// Renderer that keeps everything it is asked to print.
#[derive(Default)]
pub struct RecordingRenderer {
    pub text: String,
    pub infos: Vec<String>,
    pub errors: Vec<String>,
    pub rendered: Vec<String>,
    pub finished: usize,
    pub interrupted: usize,
    /// Triggered after the first streamed chunk is printed.
    pub interrupt_after_text: Option<Interrupt>,
}

impl Renderer for RecordingRenderer {
    fn print_text(&mut self, text: &str) {
        self.text.push_str(text);
        if let Some(interrupt) = &self.interrupt_after_text {
            interrupt.trigger();
        }
    }

    fn print_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
    }

    fn print_info(&mut self, info: &str) {
        self.infos.push(info.to_string());
    }

    fn print_rendered(&mut self, rendered: &str) {
        self.rendered.push(rendered.to_string());
    }

    fn finish_response(&mut self) {
        self.finished += 1;
    }

    fn print_interrupted(&mut self) {
        self.interrupted += 1;
    }
}

/// Clipboard that remembers what was copied, or always fails.
#[derive(Default)]
pub struct MemoryClipboard {
    pub copied: Vec<String>,
    pub broken: bool,
}

impl Clipboard for MemoryClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        if self.broken {
            return Err(Error::clipboard("no display"));
        }
        self.copied.push(text.to_string());
        Ok(())
    }
}
