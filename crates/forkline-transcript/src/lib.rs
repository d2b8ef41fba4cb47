//! Reading agent transcripts.
//!
//! A transcript is an append-only JSONL log written by the agent process.
//! [`read_new`] returns the records appended since a byte offset, tolerating
//! lines that are still being written.

mod content;
mod error;
mod paths;
mod schema;
mod tailer;

pub use content::{summarize_tool_input, tool_target};
pub use error::{Error, Result};
pub use paths::{encode_working_dir, find_transcript, transcript_path};
pub use schema::{ContentBlock, RecordBody, TranscriptRecord, UserContent};
pub use tailer::{ReadBatch, TailedRecord, read_new};
