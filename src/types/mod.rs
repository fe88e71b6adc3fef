// Public modules
pub mod chat_completion_chunk;
pub mod chat_completion_request;
pub mod chat_role;
pub mod turn;

// Re-exports
pub use chat_completion_chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
pub use chat_completion_request::{ChatCompletionRequest, ChatMessage};
pub use chat_role::ChatRole;
pub use turn::Turn;
