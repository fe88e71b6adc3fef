//! Core chat session management.
//!
//! `ChatSession` owns everything a REPL run mutates: the configuration, the current system
//! prompt, the transcript and the text of the last response.  Commands change it through the
//! dispatcher; chat lines go through [`ChatSession::send_streaming`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::StreamExt;

use crate::backend::ChatBackend;
use crate::chat::commands::DispatchError;
use crate::chat::config::ChatConfig;
use crate::chat::transcript::Transcript;
use crate::interrupt::Interrupt;
use crate::markdown;
use crate::observability::{
    REPL_CHAT_TURNS, STREAM_CHUNKS, STREAM_DURATION, STREAM_ERRORS, STREAM_INTERRUPTED,
};
use crate::render::Renderer;
use crate::types::{ChatCompletionRequest, ChatMessage};
use crate::{Error, Result};

/// How a response stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The backend finished the response.
    Completed,
    /// The user interrupted the response.
    Interrupted,
    /// The stream broke part way.
    Failed,
}

/// The result of one chat turn whose stream was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnOutcome {
    pub end: StreamEnd,
    pub chunks: usize,
}

/// A chat session that manages conversation state and backend interactions.
pub struct ChatSession<B: ChatBackend> {
    backend: B,
    config: ChatConfig,
    config_path: Option<PathBuf>,
    model_override: Option<String>,
    system_prompt: String,
    default_system_prompt: String,
    transcript: Transcript,
    last_response: Option<String>,
}

impl<B: ChatBackend> ChatSession<B> {
    /// Creates a new chat session.
    ///
    /// The configured system prompt is captured here; `system reset` returns to this value even
    /// if the configuration changes later.
    pub fn new(backend: B, config: ChatConfig) -> Self {
        let default_system_prompt = config.system_prompt.clone();
        Self {
            backend,
            config,
            config_path: None,
            model_override: None,
            system_prompt: default_system_prompt.clone(),
            default_system_prompt,
            transcript: Transcript::new(),
            last_response: None,
        }
    }

    /// Persist configuration changes to `path`.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Use `model` instead of the configured model until `config Model` is set.
    pub fn with_model_override(mut self, model: Option<String>) -> Self {
        self.model_override = model;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// The model sent with requests.
    pub fn model(&self) -> &str {
        self.model_override.as_deref().unwrap_or(&self.config.model)
    }

    pub fn command_prefix(&self) -> char {
        self.config.prefix_char()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn default_system_prompt(&self) -> &str {
        &self.default_system_prompt
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Text of the most recent response, even an empty one.
    ///
    /// `None` until a turn's stream has been established.
    pub fn last_response(&self) -> Option<&str> {
        self.last_response.as_deref()
    }

    /// Restore the system prompt captured at startup.
    pub fn reset_system_prompt(&mut self) {
        self.system_prompt = self.default_system_prompt.clone();
    }

    /// Append a file to the system prompt under a header naming it.
    ///
    /// Nothing is appended when the file cannot be read.
    pub fn embed_file(&mut self, name: &str) -> Result<()> {
        let content = fs::read(name)
            .map_err(|err| Error::io(format!("can't read file `{name}`"), err))?;
        self.system_prompt.push_str(&format!("\nFile `{name}`:\n"));
        self.system_prompt.push_str(&String::from_utf8_lossy(&content));
        tracing::debug!(file = name, bytes = content.len(), "embedded file");
        Ok(())
    }

    fn history_path(&self, path: Option<&str>) -> PathBuf {
        PathBuf::from(path.unwrap_or(&self.config.default_history_path))
    }

    /// Save the transcript to `path`, or to the default history path.
    pub fn save_transcript(&self, path: Option<&str>) -> Result<PathBuf> {
        let path = self.history_path(path);
        self.transcript.save(&path)?;
        Ok(path)
    }

    /// Replace the transcript with the one stored at `path`, or at the default history path.
    ///
    /// On failure the current transcript is kept.
    pub fn load_transcript(&mut self, path: Option<&str>) -> Result<PathBuf> {
        let path = self.history_path(path);
        self.transcript = Transcript::load(&path)?;
        Ok(path)
    }

    /// Set one configuration field by name.  Returns the canonical field name.
    pub fn set_config_field(
        &mut self,
        name: &str,
        value: &str,
    ) -> std::result::Result<&'static str, DispatchError> {
        let field = self.config.set_field(name, value)?;
        if field == "Model" {
            self.model_override = None;
        }
        tracing::info!(field, value, "config changed");
        Ok(field)
    }

    /// Write the configuration to its file.  Returns the path written, if there is one.
    pub fn persist_config(&self) -> Result<Option<&Path>> {
        match &self.config_path {
            Some(path) => {
                self.config.save(path)?;
                Ok(Some(path.as_path()))
            }
            None => Ok(None),
        }
    }

    /// The messages sent for `line`: the system prompt, the whole transcript, then `line` again
    /// as a trailing user message.
    ///
    /// Call after `line` has been appended to the transcript; it then appears twice.
    pub fn outbound_messages(&self, line: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.transcript.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(self.transcript.turns().iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(line));
        messages
    }

    /// Sends a user line and streams the response.
    ///
    /// This method:
    /// 1. Adds the user turn to the transcript
    /// 2. Sends a streaming request to the backend
    /// 3. Renders chunks as they arrive
    /// 4. Adds the accumulated response as an assistant turn, however the stream ended
    /// 5. Prints a rendered copy when markdown rendering is on
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be established, or [`Error::Abort`] if it
    /// was interrupted before the response started.  The user turn stays in the transcript
    /// either way.
    pub async fn send_streaming(
        &mut self,
        line: &str,
        renderer: &mut dyn Renderer,
        interrupt: &Interrupt,
    ) -> Result<TurnOutcome> {
        REPL_CHAT_TURNS.click();
        self.last_response = None;
        self.transcript.push_user(line);

        let request = ChatCompletionRequest::streaming(self.model(), self.outbound_messages(line));
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "sending chat turn"
        );
        let start = Instant::now();
        let mut stream = tokio::select! {
            biased;
            _ = interrupt.triggered() => {
                STREAM_INTERRUPTED.click();
                return Err(Error::abort("interrupted before the response started"));
            }
            stream = self.backend.stream_chat(request) => stream?,
        };
        let response = self.last_response.insert(String::new());

        let mut end = StreamEnd::Completed;
        let mut chunks = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = interrupt.triggered() => {
                    end = StreamEnd::Interrupted;
                    break;
                }
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    STREAM_CHUNKS.click();
                    chunks += 1;
                    renderer.print_text(&chunk);
                    response.push_str(&chunk);
                }
                Some(Err(err)) => {
                    STREAM_ERRORS.click();
                    tracing::warn!(error = %err, "response stream failed");
                    renderer.print_error(&err.to_string());
                    end = StreamEnd::Failed;
                    break;
                }
                None => break,
            }
        }
        // Dropping the stream closes the connection.
        drop(stream);
        STREAM_DURATION.add(start.elapsed().as_secs_f64());
        tracing::debug!(?end, chunks, bytes = response.len(), "chat turn finished");

        match end {
            StreamEnd::Completed => renderer.finish_response(),
            StreamEnd::Interrupted => {
                STREAM_INTERRUPTED.click();
                renderer.print_interrupted();
            }
            StreamEnd::Failed => {}
        }
        self.transcript.push_assistant(response.clone());

        if self.config.render_markdown && !response.is_empty() {
            match markdown::render(response, &self.config.theme) {
                Ok(rendered) => renderer.print_rendered(&rendered),
                Err(err) => tracing::warn!(error = %err, "markdown rendering failed"),
            }
        }
        Ok(TurnOutcome { end, chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::{RecordingRenderer, Reply, ScriptedBackend};
    use crate::types::{ChatRole, Turn};

    fn session(replies: Vec<Reply>) -> ChatSession<ScriptedBackend> {
        ChatSession::new(ScriptedBackend::new(replies), ChatConfig::default())
    }

    #[test]
    fn new_session_empty() {
        let session = session(vec![]);
        assert!(session.transcript().is_empty());
        assert_eq!(session.system_prompt(), ChatConfig::default().system_prompt);
        assert_eq!(session.model(), "gpt-4o-mini");
        assert!(session.last_response().is_none());
    }

    #[test]
    fn model_override_until_config_changes_model() {
        let mut session = session(vec![]).with_model_override(Some("gpt-4.1".to_string()));
        assert_eq!(session.model(), "gpt-4.1");
        session.set_config_field("RenderMarkdown", "true").unwrap();
        assert_eq!(session.model(), "gpt-4.1");
        session.set_config_field("model", "o3").unwrap();
        assert_eq!(session.model(), "o3");
    }

    #[test]
    fn config_changes_do_not_touch_current_prompt() {
        let mut session = session(vec![]);
        session.set_config_field("SystemPrompt", "pirate").unwrap();
        assert_eq!(session.config().system_prompt, "pirate");
        assert_eq!(session.system_prompt(), ChatConfig::default().system_prompt);
        session.reset_system_prompt();
        assert_eq!(session.system_prompt(), ChatConfig::default().system_prompt);
    }

    #[test]
    fn embed_then_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "remember this").unwrap();
        let name = path.to_str().unwrap();

        let mut session = session(vec![]);
        let initial = session.system_prompt().to_string();
        session.embed_file(name).unwrap();
        session.embed_file(name).unwrap();
        let block = format!("\nFile `{name}`:\nremember this");
        assert_eq!(session.system_prompt(), format!("{initial}{block}{block}"));

        session.reset_system_prompt();
        assert_eq!(session.system_prompt(), initial);
    }

    #[test]
    fn embed_missing_file_changes_nothing() {
        let mut session = session(vec![]);
        let before = session.system_prompt().to_string();
        let err = session.embed_file("/definitely/not/here.txt").unwrap_err();
        assert!(err.to_string().contains("can't read file `/definitely/not/here.txt`"));
        assert_eq!(session.system_prompt(), before);
    }

    #[test]
    fn outbound_messages_repeat_the_new_line() {
        let mut session = session(vec![]);
        session.transcript.push_user("first");
        session.transcript.push_assistant("answer");
        session.transcript.push_user("second");
        let messages = session.outbound_messages("second");
        let roles: Vec<ChatRole> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
                ChatRole::User
            ]
        );
        assert_eq!(messages[3].content, "second");
        assert_eq!(messages[4].content, "second");
    }

    #[tokio::test]
    async fn streaming_commits_both_turns() {
        let mut session = session(vec![Reply::text(&["Hel", "lo", "!"])]);
        let mut renderer = RecordingRenderer::default();
        let outcome = session
            .send_streaming("hi", &mut renderer, &Interrupt::new())
            .await
            .unwrap();

        assert_eq!(outcome, TurnOutcome { end: StreamEnd::Completed, chunks: 3 });
        assert_eq!(renderer.text, "Hello!");
        assert_eq!(renderer.finished, 1);
        assert!(renderer.rendered.is_empty());
        assert_eq!(
            session.transcript().turns(),
            &[Turn::user("hi"), Turn::assistant("Hello!")]
        );
        assert_eq!(session.last_response(), Some("Hello!"));

        let requests = session.backend().requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].stream);
        assert_eq!(requests[0].model, "gpt-4o-mini");
        assert_eq!(requests[0].messages.len(), 3);
    }

    #[tokio::test]
    async fn empty_stream_still_commits_an_assistant_turn() {
        let mut session = session(vec![Reply::text(&[])]);
        let mut renderer = RecordingRenderer::default();
        session
            .send_streaming("", &mut renderer, &Interrupt::new())
            .await
            .unwrap();
        assert_eq!(
            session.transcript().turns(),
            &[Turn::user(""), Turn::assistant("")]
        );
        assert_eq!(session.last_response(), Some(""));
    }

    #[tokio::test]
    async fn mid_stream_error_keeps_partial_text() {
        let mut session = session(vec![Reply::Chunks(vec![
            Ok("partial".to_string()),
            Err(Error::streaming("connection reset", None)),
            Ok("never seen".to_string()),
        ])]);
        let mut renderer = RecordingRenderer::default();
        let outcome = session
            .send_streaming("hi", &mut renderer, &Interrupt::new())
            .await
            .unwrap();
        assert_eq!(outcome.end, StreamEnd::Failed);
        assert_eq!(renderer.errors.len(), 1);
        assert!(renderer.errors[0].contains("connection reset"));
        assert_eq!(
            session.transcript().turns().last(),
            Some(&Turn::assistant("partial"))
        );
    }

    #[tokio::test]
    async fn refused_request_keeps_user_turn_only() {
        let mut session = session(vec![Reply::Refuse(Error::authentication("no key"))]);
        let mut renderer = RecordingRenderer::default();
        let err = session
            .send_streaming("hi", &mut renderer, &Interrupt::new())
            .await
            .unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(session.transcript().turns(), &[Turn::user("hi")]);
        assert!(renderer.text.is_empty());
    }

    #[tokio::test]
    async fn interrupt_commits_partial_response() {
        let interrupt = Interrupt::new();
        let mut session = session(vec![Reply::Stall(vec!["so far".to_string()])]);
        let mut renderer = RecordingRenderer {
            interrupt_after_text: Some(interrupt.clone()),
            ..RecordingRenderer::default()
        };
        let outcome = session
            .send_streaming("tell me everything", &mut renderer, &interrupt)
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome { end: StreamEnd::Interrupted, chunks: 1 });
        assert_eq!(renderer.interrupted, 1);
        assert_eq!(renderer.finished, 0);
        assert_eq!(
            session.transcript().turns().last(),
            Some(&Turn::assistant("so far"))
        );
    }

    #[tokio::test]
    async fn interrupt_before_start_aborts() {
        let interrupt = Interrupt::new();
        interrupt.trigger();
        let mut session = session(vec![Reply::text(&["unused"])]);
        let mut renderer = RecordingRenderer::default();
        let err = session
            .send_streaming("hi", &mut renderer, &interrupt)
            .await
            .unwrap_err();
        assert!(err.is_abort());
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn markdown_block_follows_stream_when_enabled() {
        let mut session = session(vec![Reply::text(&["# Title\n", "body"])]);
        session.set_config_field("RenderMarkdown", "1").unwrap();
        session.set_config_field("Theme", "notty").unwrap();
        let mut renderer = RecordingRenderer::default();
        session
            .send_streaming("hi", &mut renderer, &Interrupt::new())
            .await
            .unwrap();
        assert_eq!(renderer.text, "# Title\nbody");
        assert_eq!(renderer.rendered, vec!["# Title\n\nbody\n".to_string()]);
    }

    #[tokio::test]
    async fn new_turn_resets_last_response() {
        let mut session = session(vec![Reply::text(&["one"]), Reply::text(&[])]);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();
        session.send_streaming("a", &mut renderer, &interrupt).await.unwrap();
        assert_eq!(session.last_response(), Some("one"));
        session.send_streaming("b", &mut renderer, &interrupt).await.unwrap();
        assert_eq!(session.last_response(), Some(""));
    }

    #[tokio::test]
    async fn refused_turn_has_no_response() {
        let mut session = session(vec![
            Reply::text(&["one"]),
            Reply::Refuse(Error::authentication("no key")),
        ]);
        let mut renderer = RecordingRenderer::default();
        let interrupt = Interrupt::new();
        session.send_streaming("a", &mut renderer, &interrupt).await.unwrap();
        assert!(session.send_streaming("b", &mut renderer, &interrupt).await.is_err());
        assert!(session.last_response().is_none());
    }

    #[test]
    fn save_and_load_use_default_path() {
        let dir = tempfile::tempdir().unwrap();
        let default = dir.path().join("history.json");
        let mut config = ChatConfig::default();
        config.default_history_path = default.to_str().unwrap().to_string();

        let mut session = ChatSession::new(ScriptedBackend::default(), config.clone());
        session.transcript.push_user("q");
        session.transcript.push_assistant("a");
        assert_eq!(session.save_transcript(None).unwrap(), default);

        let mut other = ChatSession::new(ScriptedBackend::default(), config);
        other.transcript.push_user("stale");
        assert_eq!(other.load_transcript(None).unwrap(), default);
        assert_eq!(other.transcript(), session.transcript());
    }

    #[test]
    fn failed_load_keeps_transcript() {
        let mut session = session(vec![]);
        session.transcript.push_user("keep me");
        assert!(session.load_transcript(Some("/no/such/history.json")).is_err());
        assert_eq!(session.transcript().turns(), &[Turn::user("keep me")]);
    }

    #[test]
    fn persist_config_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut session = session(vec![]).with_config_path(&path);
        session.set_config_field("RenderMarkdown", "true").unwrap();
        assert_eq!(session.persist_config().unwrap(), Some(path.as_path()));
        assert!(ChatConfig::load(&path).unwrap().render_markdown);

        let unsaved = self::session(vec![]);
        assert_eq!(unsaved.persist_config().unwrap(), None);
    }
}
