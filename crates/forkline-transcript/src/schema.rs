use serde::Deserialize;
use serde_json::Value;

/// Envelope of every transcript line. Only `user` and `assistant` carry
/// conversation content; the log also holds summaries, system notices,
/// file-history snapshots and similar bookkeeping records.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "kebab-case")]
enum RawRecord {
    User(RawEnvelope),
    Assistant(RawEnvelope),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    is_sidechain: bool,
    #[serde(default)]
    is_meta: bool,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Option<Value>,
}

/// One typed block of message content
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Option<Value>,
        #[serde(default)]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Unknown,
}

/// User content is a plain prompt string, or blocks (tool results)
#[derive(Debug, Clone, PartialEq)]
pub enum UserContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordBody {
    User(UserContent),
    Assistant(Vec<ContentBlock>),
}

/// A transcript line that carries user-facing content
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptRecord {
    /// Transcript message id; what mapping entries store as `sdkMessageId`
    pub uuid: String,
    pub session_id: Option<String>,
    /// RFC 3339, as written by the agent
    pub timestamp: Option<String>,
    pub body: RecordBody,
}

impl TranscriptRecord {
    /// Convert one parsed JSON line.
    ///
    /// Returns `None` for record types without conversation content, records
    /// without an id or content payload, sidechain (sub-agent) records and
    /// meta records.
    pub fn from_value(value: Value) -> Option<Self> {
        let (envelope, is_user) = match serde_json::from_value::<RawRecord>(value).ok()? {
            RawRecord::User(envelope) => (envelope, true),
            RawRecord::Assistant(envelope) => (envelope, false),
            RawRecord::Other => return None,
        };

        if envelope.is_sidechain || envelope.is_meta {
            return None;
        }
        let uuid = envelope.uuid?;
        let content = envelope.message?.content?;

        let body = if is_user {
            RecordBody::User(match content {
                Value::String(text) => UserContent::Text(text),
                Value::Array(_) => UserContent::Blocks(parse_blocks(content)?),
                _ => return None,
            })
        } else {
            RecordBody::Assistant(match content {
                Value::String(text) => vec![ContentBlock::Text { text }],
                Value::Array(_) => parse_blocks(content)?,
                _ => return None,
            })
        };

        Some(Self {
            uuid,
            session_id: envelope.session_id,
            timestamp: envelope.timestamp,
            body,
        })
    }

    pub fn is_user(&self) -> bool {
        matches!(self.body, RecordBody::User(_))
    }

    /// Content blocks; empty for plain-string user prompts
    pub fn blocks(&self) -> &[ContentBlock] {
        match &self.body {
            RecordBody::User(UserContent::Text(_)) => &[],
            RecordBody::User(UserContent::Blocks(blocks)) | RecordBody::Assistant(blocks) => blocks,
        }
    }

    /// Renderable text, if any.
    ///
    /// For assistant records this is what marks a turn as complete; records
    /// holding only tool or thinking blocks return `None`.
    pub fn text(&self) -> Option<String> {
        let text = match &self.body {
            RecordBody::User(UserContent::Text(text)) => text.trim().to_string(),
            _ => self
                .blocks()
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } if !text.trim().is_empty() => Some(text.trim()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
        };
        (!text.is_empty()).then_some(text)
    }

    pub fn timestamp_millis(&self) -> Option<i64> {
        let ts = self.timestamp.as_deref()?;
        chrono::DateTime::parse_from_rfc3339(ts)
            .ok()
            .map(|dt| dt.timestamp_millis())
    }
}

fn parse_blocks(content: Value) -> Option<Vec<ContentBlock>> {
    let Value::Array(items) = content else {
        return None;
    };
    if items.is_empty() {
        return None;
    }
    Some(
        items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or(ContentBlock::Unknown))
            .collect(),
    )
}
