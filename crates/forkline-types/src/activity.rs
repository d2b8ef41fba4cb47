use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Thinking,
    ToolStart,
    ToolComplete,
    Generating,
    Starting,
}

/// One sub-turn event shown while the assistant is working.
///
/// Lives in the in-memory batch until flushed, then in the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    /// Unix millis
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    /// Short human-readable target of the tool call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_message_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_message_link: Option<String>,
}

impl ActivityEntry {
    pub fn new(kind: ActivityKind, timestamp: i64) -> Self {
        Self {
            timestamp,
            kind,
            tool: None,
            tool_use_id: None,
            tool_input: None,
            duration_ms: None,
            is_error: false,
            thinking_content: None,
            char_count: None,
            thread_message_ts: None,
            thread_message_link: None,
        }
    }

    pub fn tool_start(
        timestamp: i64,
        tool: impl Into<String>,
        tool_use_id: impl Into<String>,
        tool_input: Option<String>,
    ) -> Self {
        Self {
            tool: Some(tool.into()),
            tool_use_id: Some(tool_use_id.into()),
            tool_input,
            ..Self::new(ActivityKind::ToolStart, timestamp)
        }
    }

    pub fn thinking(timestamp: i64, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            char_count: Some(content.chars().count()),
            thinking_content: Some(content),
            ..Self::new(ActivityKind::Thinking, timestamp)
        }
    }

    /// Mark a started tool as finished
    pub fn complete(&mut self, finished_at: i64, is_error: bool) {
        if self.kind != ActivityKind::ToolStart {
            return;
        }
        self.kind = ActivityKind::ToolComplete;
        self.duration_ms = Some(finished_at.saturating_sub(self.timestamp).max(0) as u64);
        self.is_error = is_error;
    }

    pub fn is_tool(&self) -> bool {
        matches!(self.kind, ActivityKind::ToolStart | ActivityKind::ToolComplete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_tool_records_duration() {
        let mut entry = ActivityEntry::tool_start(1_000, "Read", "toolu_1", None);
        entry.complete(1_750, false);
        assert_eq!(entry.kind, ActivityKind::ToolComplete);
        assert_eq!(entry.duration_ms, Some(750));

        // Completing twice keeps the first result
        entry.complete(9_000, true);
        assert_eq!(entry.duration_ms, Some(750));
        assert!(!entry.is_error);
    }

    #[test]
    fn test_complete_ignores_non_tool_entries() {
        let mut entry = ActivityEntry::thinking(1_000, "hmm");
        entry.complete(2_000, false);
        assert_eq!(entry.kind, ActivityKind::Thinking);
        assert_eq!(entry.char_count, Some(3));
    }
}
