use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::mapping::MappingEntry;

/// Permission mode the agent runs under for a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    #[default]
    Default,
    Plan,
    AcceptEdits,
    BypassPermissions,
}

/// Working-path configuration.
///
/// Once `path_configured` is true the remaining fields are frozen: merge-patch
/// saves never overwrite them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathConfig {
    #[serde(default)]
    pub path_configured: bool,
    #[serde(default)]
    pub configured_path: Option<String>,
    #[serde(default)]
    pub configured_by: Option<String>,
    #[serde(default)]
    pub configured_at: Option<i64>,
}

/// Agent session bound to a channel or thread
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Live agent session id; `None` after a reset
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub working_dir: String,
    #[serde(default)]
    pub mode: PermissionMode,
    /// Unix millis
    #[serde(default)]
    pub created_at: i64,
    /// Unix millis
    #[serde(default)]
    pub last_active_at: i64,
    #[serde(flatten)]
    pub path: PathConfig,
    /// Superseded session ids, oldest first
    #[serde(default)]
    pub previous_session_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_rate_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_char_limit: Option<usize>,
}

impl Session {
    pub fn new(working_dir: impl Into<String>, now: i64) -> Self {
        Self {
            working_dir: working_dir.into(),
            created_at: now,
            last_active_at: now,
            ..Default::default()
        }
    }

    /// Move the live session id into history and clear it.
    ///
    /// Returns the superseded id, if there was one.
    pub fn reset(&mut self) -> Option<String> {
        let old = self.session_id.take()?;
        if !self.previous_session_ids.contains(&old) {
            self.previous_session_ids.push(old.clone());
        }
        Some(old)
    }
}

/// Session of a forked thread.
///
/// `forked_from` is a snapshot of the parent's session id at fork time, not a
/// live reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSession {
    #[serde(flatten)]
    pub session: Session,
    #[serde(default)]
    pub forked_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forked_from_thread_ts: Option<String>,
    /// Fork-point anchor; written at creation and never afterwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_session_at_message_id: Option<String>,
}

/// Everything persisted for one channel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSession {
    #[serde(flatten)]
    pub session: Session,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<BTreeMap<String, ThreadSession>>,
    /// Surface ts -> mapping entry
    #[serde(default)]
    pub message_map: BTreeMap<String, MappingEntry>,
}

impl ChannelSession {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            threads: None,
            message_map: BTreeMap::new(),
        }
    }

    pub fn thread(&self, thread_ts: &str) -> Option<&ThreadSession> {
        self.threads.as_ref()?.get(thread_ts)
    }

    pub fn thread_mut(&mut self, thread_ts: &str) -> Option<&mut ThreadSession> {
        self.threads.as_mut()?.get_mut(thread_ts)
    }

    pub fn threads_mut(&mut self) -> &mut BTreeMap<String, ThreadSession> {
        self.threads.get_or_insert_with(BTreeMap::new)
    }
}
