//! The model backend seam.
//!
//! The chat engine only needs one thing from a backend: given a request, hand back a lazy
//! sequence of text chunks.  [`crate::ChatClient`] talks HTTP; tests supply scripted backends.

use std::pin::Pin;

use futures::Stream;

use crate::Result;
use crate::types::ChatCompletionRequest;

/// A finite, non-restartable sequence of response text chunks.
///
/// Dropping the stream releases the underlying connection.  An `Err` item ends the response;
/// everything yielded before it is still part of the answer.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A service that answers chat completion requests with streamed text.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Establish a streaming completion.
    ///
    /// Errors returned here mean the request never started (authentication, network, or a
    /// non-success HTTP status); errors inside the stream mean it broke part way.
    async fn stream_chat(&self, request: ChatCompletionRequest) -> Result<ChunkStream>;
}
