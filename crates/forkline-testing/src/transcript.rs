//! Builder for agent transcript files.

use anyhow::Result;
use serde_json::{Value, json};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Appends transcript lines in the agent's JSONL format.
///
/// Every helper returns the record's `uuid`, which is what the engine stores
/// as `sdkMessageId`.
#[derive(Debug, Clone)]
pub struct TranscriptWriter {
    path: PathBuf,
    session_id: String,
    counter: u32,
}

impl TranscriptWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
            counter: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Switch to a new session id, as after a reset
    pub fn set_session_id(&mut self, session_id: impl Into<String>) {
        self.session_id = session_id.into();
    }

    fn timestamp(&mut self) -> String {
        self.counter += 1;
        format!(
            "2025-01-01T00:{:02}:{:02}.000Z",
            (self.counter / 60) % 60,
            self.counter % 60
        )
    }

    fn envelope(&mut self, kind: &str, content: Value) -> (String, Value) {
        let uuid = uuid::Uuid::new_v4().to_string();
        let timestamp = self.timestamp();
        let record = json!({
            "type": kind,
            "uuid": uuid,
            "sessionId": self.session_id,
            "timestamp": timestamp,
            "isSidechain": false,
            "message": {"role": kind, "content": content},
        });
        (uuid, record)
    }

    /// Append raw bytes, e.g. half a line
    pub fn append_raw(&self, bytes: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(bytes.as_bytes())?;
        Ok(())
    }

    pub fn append_value(&self, value: &Value) -> Result<()> {
        self.append_raw(&format!("{}\n", value))
    }

    fn append(&mut self, kind: &str, content: Value) -> Result<String> {
        let (uuid, record) = self.envelope(kind, content);
        self.append_value(&record)?;
        Ok(uuid)
    }

    /// Serialized line without appending it
    pub fn render_line(&mut self, kind: &str, content: Value) -> (String, String) {
        let (uuid, record) = self.envelope(kind, content);
        (uuid, format!("{}\n", record))
    }

    pub fn user(&mut self, text: &str) -> Result<String> {
        self.append("user", json!(text))
    }

    pub fn assistant_text(&mut self, text: &str) -> Result<String> {
        self.append("assistant", json!([{"type": "text", "text": text}]))
    }

    /// Assistant record with arbitrary content blocks
    pub fn assistant_blocks(&mut self, blocks: Value) -> Result<String> {
        self.append("assistant", blocks)
    }

    pub fn thinking(&mut self, thinking: &str) -> Result<String> {
        self.append(
            "assistant",
            json!([{"type": "thinking", "thinking": thinking, "signature": "sig"}]),
        )
    }

    /// Append a tool call; returns `(record uuid, tool_use id)`
    pub fn tool_use(&mut self, name: &str, input: Value) -> Result<(String, String)> {
        self.counter += 1;
        let tool_id = format!("toolu_{:04}", self.counter);
        let uuid = self.append(
            "assistant",
            json!([{"type": "tool_use", "id": tool_id, "name": name, "input": input}]),
        )?;
        Ok((uuid, tool_id))
    }

    pub fn tool_result(&mut self, tool_use_id: &str, is_error: bool) -> Result<String> {
        self.append(
            "user",
            json!([{
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": "done",
                "is_error": is_error,
            }]),
        )
    }

    /// A bookkeeping record without conversation content
    pub fn summary(&self, text: &str) -> Result<()> {
        self.append_value(&json!({"type": "summary", "summary": text, "leafUuid": "leaf"}))
    }
}
