//! The interactive chat REPL.
//!
//! Each input line is either a prefixed command or a chat message.  Chat messages are sent with
//! the system prompt and the whole transcript, and the reply is streamed to the terminal as it
//! arrives.  Ctrl+C aborts a reply in flight without leaving the REPL.
//!
//! # Architecture
//!
//! - [`config`]: command-line arguments and the persisted TOML settings
//! - [`commands`]: the command registry and line parsing
//! - [`dispatch`]: executes parsed commands against a session
//! - [`session`]: conversation state and the streaming chat turn
//! - [`transcript`]: the user/assistant history and its JSON file format
//! - [`completion`] and [`editor`]: rustyline integration
//! - [`repl`]: the read-classify-dispatch loop

pub mod commands;
pub mod completion;
pub mod config;
pub mod dispatch;
pub mod editor;
pub mod repl;
pub mod session;
pub mod transcript;

#[cfg(test)]
mod testing;

pub use commands::{
    ArgCompletion, COMMANDS, ChatCommand, CommandSpec, CompletionNode, DispatchError,
    SystemAction, completion_tree, help_table, parse_command,
};
pub use completion::{CompletionTarget, ReplHelper, complete_command_line};
pub use config::{ChatArgs, ChatConfig, FIELDS, FieldError};
pub use dispatch::{Flow, dispatch};
pub use editor::LineEditor;
pub use repl::{LineSource, PROMPT, ReadOutcome, Repl, ReplState};
pub use session::{ChatSession, StreamEnd, TurnOutcome};
pub use transcript::Transcript;
