use serde::{Deserialize, Serialize};

use crate::types::ChatRole;

/// One server-sent event payload of a streaming chat completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Identifier shared by every chunk of one completion.
    #[serde(default)]
    pub id: Option<String>,

    /// The model that produced the chunk.
    #[serde(default)]
    pub model: Option<String>,

    /// Incremental choices; chat clients only ever request one.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// A single choice within a [`ChatCompletionChunk`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Index of the choice.
    #[serde(default)]
    pub index: u32,

    /// The incremental message fragment.
    #[serde(default)]
    pub delta: ChunkDelta,

    /// Why generation stopped, present on the final chunk.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The incremental fragment carried by a [`ChunkChoice`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Present on the first chunk only.
    #[serde(default)]
    pub role: Option<ChatRole>,

    /// The text fragment.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    /// The text fragment of the first choice, if any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
    }
}
