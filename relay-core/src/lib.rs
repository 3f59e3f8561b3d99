//! Relay Core - the pure pieces of the relay bot.
//!
//! - [`history`]: per-user conversation log rendered into a backend prompt
//! - [`chunker`]: splits long replies into platform-sized segments
//!
//! Nothing here performs I/O or locking; callers own the synchronisation.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod chunker;
pub mod history;

pub use chunker::{split_message, DEFAULT_MAX_LENGTH};
pub use history::{HistoryBuffer, Role, Turn, ASSISTANT_MARKER};
