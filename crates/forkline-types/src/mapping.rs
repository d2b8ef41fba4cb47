use serde::{Deserialize, Serialize};

/// Which side of the conversation produced a surface message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
}

/// Ledger record linking one surface message to the transcript entry and the
/// session that produced it.
///
/// Written once per surface message. The only field ever filled in later is
/// `permalink`, which carries no lineage meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    pub sdk_message_id: String,
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_slack_ts: Option<String>,
    /// Set on every part after the first of a length-split message
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_continuation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl MappingEntry {
    pub fn user(sdk_message_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::new(sdk_message_id, session_id, MessageKind::User)
    }

    pub fn assistant(sdk_message_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::new(sdk_message_id, session_id, MessageKind::Assistant)
    }

    fn new(
        sdk_message_id: impl Into<String>,
        session_id: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            sdk_message_id: sdk_message_id.into(),
            session_id: session_id.into(),
            kind,
            parent_slack_ts: None,
            is_continuation: false,
            permalink: None,
        }
    }

    pub fn in_thread(mut self, parent_slack_ts: Option<String>) -> Self {
        self.parent_slack_ts = parent_slack_ts;
        self
    }

    pub fn continuation(mut self) -> Self {
        self.is_continuation = true;
        self
    }

    pub fn is_assistant(&self) -> bool {
        self.kind == MessageKind::Assistant
    }

    pub fn fork_point(&self) -> ForkPoint {
        ForkPoint {
            message_id: self.sdk_message_id.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

/// Where a derived branch resumes: a transcript message inside a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkPoint {
    pub message_id: String,
    pub session_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuation_flag_is_omitted_when_false() {
        let entry = MappingEntry::assistant("A", "S1");
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("isContinuation").is_none());

        let value = serde_json::to_value(entry.continuation()).unwrap();
        assert_eq!(value["isContinuation"], true);
    }

    #[test]
    fn test_legacy_entry_without_optional_fields() {
        let entry: MappingEntry =
            serde_json::from_str(r#"{"sdkMessageId":"U1","sessionId":"S1","type":"user"}"#)
                .unwrap();
        assert_eq!(entry.kind, MessageKind::User);
        assert!(!entry.is_continuation);
        assert_eq!(entry.parent_slack_ts, None);
    }
}
