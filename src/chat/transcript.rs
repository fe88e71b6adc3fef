//! The conversation transcript and its JSON file format.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};

use crate::types::{ChatRole, Turn};
use crate::{Error, Result};

/// Ordered user and assistant turns.
///
/// The system prompt is kept elsewhere and never appears here; [`Transcript::load`] refuses
/// files that contain a system turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::assistant(content));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recent assistant turn, if any.
    pub fn last_assistant(&self) -> Option<&Turn> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role() == ChatRole::Assistant)
    }

    /// Write the transcript as indented JSON, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|err| {
            Error::io(
                format!("failed to create transcript file `{}`", path.display()),
                err,
            )
        })?;
        let mut writer = BufWriter::new(file);
        to_writer_pretty(&mut writer, self).map_err(|err| {
            Error::serialization("failed to serialize transcript", Some(Box::new(err)))
        })?;
        writer.flush().map_err(|err| {
            Error::io(
                format!("failed to write transcript file `{}`", path.display()),
                err,
            )
        })?;
        tracing::debug!(path = %path.display(), turns = self.len(), "saved transcript");
        Ok(())
    }

    /// Read a transcript written by [`Transcript::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| {
            Error::io(
                format!("failed to open transcript file `{}`", path.display()),
                err,
            )
        })?;
        let reader = BufReader::new(file);
        let transcript: Transcript = from_reader(reader).map_err(|err| {
            Error::serialization(
                format!("failed to parse transcript `{}`: {err}", path.display()),
                Some(Box::new(err)),
            )
        })?;
        if transcript
            .turns
            .iter()
            .any(|turn| turn.role() == ChatRole::System)
        {
            return Err(Error::validation(format!(
                "transcript `{}` contains a system turn",
                path.display()
            )));
        }
        tracing::debug!(path = %path.display(), turns = transcript.len(), "loaded transcript");
        Ok(transcript)
    }
}
