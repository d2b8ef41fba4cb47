use serde::{Deserialize, Serialize};
use std::fmt;

/// A channel, or a thread inside a channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationKey {
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

impl ConversationKey {
    pub fn channel(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            thread_ts: None,
        }
    }

    pub fn thread(channel_id: impl Into<String>, thread_ts: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            thread_ts: Some(thread_ts.into()),
        }
    }

    /// File-name safe form, used for per-conversation artifacts
    pub fn slug(&self) -> String {
        match &self.thread_ts {
            Some(ts) => format!("{}_{}", self.channel_id, ts.replace('.', "")),
            None => self.channel_id.clone(),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.thread_ts {
            Some(ts) => write!(f, "{}/{}", self.channel_id, ts),
            None => write!(f, "{}", self.channel_id),
        }
    }
}
