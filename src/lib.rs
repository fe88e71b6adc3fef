// Public modules
pub mod backend;
pub mod chat;
pub mod client;
pub mod clipboard;
pub mod error;
pub mod interrupt;
pub mod markdown;
pub mod render;
pub mod sse;
pub mod types;

mod observability;

// Re-exports
pub use backend::{ChatBackend, ChunkStream};
pub use client::ChatClient;
pub use clipboard::{Clipboard, SystemClipboard};
pub use error::{Error, Result};
pub use interrupt::Interrupt;
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use types::*;
