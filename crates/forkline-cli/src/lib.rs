// NOTE: forkline Architecture Rationale
//
// Why the message map is the source of lineage (not live session ids)?
// - A channel's live session id is cleared on reset and replaced on resume
// - Every surface message keeps the session and transcript id that produced it
// - Forks anchored on old history therefore resolve after any number of resets
//
// Why poll instead of file notifications?
// - Transcripts are append-only; a byte offset is all the state a reader needs
// - A partial trailing line is simply left for the next tick
// - Trade-off: up to one poll interval of latency per conversation
//
// Why the console surface?
// - The CLI exercises the full mirroring pipeline without chat credentials
// - Chat platform adapters implement the same `Surface` and `Renderer` traits

mod args;
mod commands;
pub mod console;
mod handlers;
mod logging;
pub mod types;

pub use args::{Cli, Commands, ConversationArgs, SessionCommand};
pub use commands::run;
