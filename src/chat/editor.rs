//! Interactive line editor backed by rustyline.

use std::env;
use std::path::{Path, PathBuf};

use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;

use crate::chat::completion::ReplHelper;
use crate::chat::repl::{LineSource, ReadOutcome};
use crate::{Error, Result};

const HISTORY_FILE: &str = "parley_history";

/// `<temp dir>/parley_history`.
pub fn default_history_file() -> PathBuf {
    env::temp_dir().join(HISTORY_FILE)
}

/// A rustyline editor with command completion and persistent input history.
///
/// History is loaded when the editor opens and written back when it is dropped, whichever way
/// the REPL ends.
pub struct LineEditor {
    editor: Editor<ReplHelper, FileHistory>,
    history_path: PathBuf,
}

impl LineEditor {
    /// Open an editor using the default history file.
    pub fn open(prefix: char) -> Result<Self> {
        Self::with_history_file(prefix, default_history_file())
    }

    pub fn with_history_file(prefix: char, history_path: impl Into<PathBuf>) -> Result<Self> {
        let history_path = history_path.into();
        let mut editor: Editor<ReplHelper, FileHistory> = Editor::new()
            .map_err(|e| Error::editor(format!("failed to initialize line editor: {e}")))?;
        editor.set_helper(Some(ReplHelper::new(prefix)));
        if let Err(err) = editor.load_history(&history_path) {
            tracing::debug!(
                path = %history_path.display(),
                error = %err,
                "no input history loaded"
            );
        }
        Ok(Self {
            editor,
            history_path,
        })
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }
}

impl LineSource for LineEditor {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty()
                    && let Err(err) = self.editor.add_history_entry(line.as_str())
                {
                    tracing::warn!(error = %err, "failed to record input history");
                }
                ReadOutcome::Line(line)
            }
            Err(ReadlineError::Interrupted) => ReadOutcome::Interrupted,
            Err(ReadlineError::Eof) => ReadOutcome::Eof,
            Err(err) => ReadOutcome::Failed(err.to_string()),
        }
    }

    fn set_command_prefix(&mut self, prefix: char) {
        if let Some(helper) = self.editor.helper_mut() {
            helper.set_prefix(prefix);
        }
    }
}

impl Drop for LineEditor {
    fn drop(&mut self) {
        if let Err(err) = self.editor.save_history(&self.history_path) {
            tracing::warn!(
                path = %self.history_path.display(),
                error = %err,
                "failed to save input history"
            );
        }
    }
}
