use forkline_types::{
    ChannelSession, ConversationKey, MappingEntry, PathConfig, PermissionMode, Session,
    ThreadSession, now_millis,
};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::document::StoreDocument;
use crate::{Error, Result};

/// Merge-patch for a [`Session`].
///
/// `None` leaves a field untouched. `created_at` is not patchable, and `path`
/// is ignored once the target already has a configured path.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    /// `Some(None)` clears the live session id
    pub session_id: Option<Option<String>>,
    pub working_dir: Option<String>,
    pub mode: Option<PermissionMode>,
    pub last_active_at: Option<i64>,
    pub path: Option<PathConfig>,
    pub update_rate_seconds: Option<u32>,
    pub thread_char_limit: Option<usize>,
}

impl SessionPatch {
    pub fn session_id(id: impl Into<String>) -> Self {
        Self {
            session_id: Some(Some(id.into())),
            ..Default::default()
        }
    }

    fn apply(self, session: &mut Session, now: i64) {
        if let Some(next) = self.session_id {
            if let Some(current) = session.session_id.take()
                && next.as_deref() != Some(current.as_str())
                && !session.previous_session_ids.contains(&current)
            {
                session.previous_session_ids.push(current);
            }
            session.session_id = next;
        }
        if let Some(working_dir) = self.working_dir {
            session.working_dir = working_dir;
        }
        if let Some(mode) = self.mode {
            session.mode = mode;
        }
        if let Some(path) = self.path
            && !session.path.path_configured
        {
            session.path = path;
        }
        if let Some(rate) = self.update_rate_seconds {
            session.update_rate_seconds = Some(rate);
        }
        if let Some(limit) = self.thread_char_limit {
            session.thread_char_limit = Some(limit);
        }
        session.last_active_at = self.last_active_at.unwrap_or(now);
    }
}

// NOTE: Store Design Rationale
//
// One JSON document holds every channel. Each mutation is a full
// read-modify-write of that document under a process-local lock, so
// last-write-wins holds per channel/thread/map entry. Callers only see keyed
// operations; a per-key backend could replace the document without changing
// call sites. Multiple processes sharing one file are not supported.

/// Keyed access to the persisted session document
pub struct Store {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl Store {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document; empty when the file is missing or malformed
    pub fn load(&self) -> StoreDocument {
        StoreDocument::load(&self.path)
    }

    /// Replace the whole document
    pub fn save(&self, doc: &StoreDocument) -> Result<()> {
        let _guard = self.lock();
        doc.write(&self.path)
    }

    /// Read-modify-write. The closure reports whether it changed anything;
    /// unchanged documents are not written back.
    pub(crate) fn update<T>(
        &self,
        f: impl FnOnce(&mut StoreDocument) -> Result<(T, bool)>,
    ) -> Result<T> {
        let _guard = self.lock();
        let mut doc = StoreDocument::load(&self.path);
        let (out, changed) = f(&mut doc)?;
        if changed {
            doc.write(&self.path)?;
        }
        Ok(out)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get_channel(&self, channel_id: &str) -> Option<ChannelSession> {
        self.load().channels.remove(channel_id)
    }

    pub fn get_session(&self, channel_id: &str) -> Option<Session> {
        self.get_channel(channel_id).map(|c| c.session)
    }

    /// Merge `patch` into the channel session, creating it on first use
    pub fn save_session(&self, channel_id: &str, patch: SessionPatch) -> Result<Session> {
        let now = now_millis();
        self.update(|doc| {
            let channel = doc
                .channels
                .entry(channel_id.to_string())
                .or_insert_with(|| ChannelSession::new(Session::new("", now)));
            patch.apply(&mut channel.session, now);
            Ok((channel.session.clone(), true))
        })
    }

    pub fn get_thread_session(&self, channel_id: &str, thread_ts: &str) -> Option<ThreadSession> {
        self.get_channel(channel_id)?.thread(thread_ts).cloned()
    }

    /// Merge `patch` into a thread session.
    ///
    /// A thread created here starts from the channel's current working dir,
    /// mode, path config and tunables; afterwards the two evolve separately.
    pub fn save_thread_session(
        &self,
        channel_id: &str,
        thread_ts: &str,
        patch: SessionPatch,
    ) -> Result<ThreadSession> {
        let now = now_millis();
        self.update(|doc| {
            let channel = doc
                .channels
                .entry(channel_id.to_string())
                .or_insert_with(|| ChannelSession::new(Session::new("", now)));
            let parent = channel.session.clone();
            let thread = channel
                .threads_mut()
                .entry(thread_ts.to_string())
                .or_insert_with(|| ThreadSession {
                    session: inherit_session(&parent, now),
                    ..Default::default()
                });
            patch.apply(&mut thread.session, now);
            Ok((thread.clone(), true))
        })
    }

    /// Session of a conversation, whichever kind it is
    pub fn get_conversation_session(&self, key: &ConversationKey) -> Option<Session> {
        match &key.thread_ts {
            Some(ts) => self
                .get_thread_session(&key.channel_id, ts)
                .map(|t| t.session),
            None => self.get_session(&key.channel_id),
        }
    }

    /// Append a mapping entry for a surface message.
    ///
    /// Entries are never overwritten: returns `false` and leaves the existing
    /// entry alone when `surface_ts` is already mapped.
    pub fn record_message(
        &self,
        channel_id: &str,
        surface_ts: &str,
        entry: MappingEntry,
    ) -> Result<bool> {
        let now = now_millis();
        self.update(|doc| {
            let channel = doc
                .channels
                .entry(channel_id.to_string())
                .or_insert_with(|| ChannelSession::new(Session::new("", now)));
            if channel.message_map.contains_key(surface_ts) {
                return Ok((false, false));
            }
            channel.message_map.insert(surface_ts.to_string(), entry);
            Ok((true, true))
        })
    }

    /// Whether any surface message of the channel came from `sdk_message_id`
    pub fn is_synced(&self, channel_id: &str, sdk_message_id: &str) -> bool {
        self.get_channel(channel_id).is_some_and(|c| {
            c.message_map
                .values()
                .any(|entry| entry.sdk_message_id == sdk_message_id)
        })
    }

    /// Fill in the permalink of an existing entry; never replaces one
    pub fn backfill_permalink(&self, channel_id: &str, surface_ts: &str, url: &str) -> Result<bool> {
        self.update(|doc| {
            let entry = doc
                .channels
                .get_mut(channel_id)
                .and_then(|c| c.message_map.get_mut(surface_ts));
            match entry {
                Some(entry) if entry.permalink.is_none() => {
                    entry.permalink = Some(url.to_string());
                    Ok((true, true))
                }
                _ => Ok((false, false)),
            }
        })
    }

    /// Retire the live session id of a channel or thread.
    ///
    /// The message map is left as is so that forks anchored on earlier
    /// history still resolve to the session that produced it.
    pub fn reset_session(&self, key: &ConversationKey) -> Result<Option<String>> {
        let now = now_millis();
        self.update(|doc| {
            let channel = doc
                .channels
                .get_mut(&key.channel_id)
                .ok_or_else(|| Error::NotFound(format!("channel {}", key.channel_id)))?;
            let session = match &key.thread_ts {
                Some(ts) => {
                    &mut channel
                        .thread_mut(ts)
                        .ok_or_else(|| Error::NotFound(format!("thread {}", key)))?
                        .session
                }
                None => &mut channel.session,
            };
            let old = session.reset();
            session.last_active_at = now;
            Ok((old, true))
        })
    }

    /// Drop a channel with its threads and message map
    pub fn delete_channel(&self, channel_id: &str) -> Result<bool> {
        self.update(|doc| {
            let removed = doc.channels.remove(channel_id).is_some();
            Ok((removed, removed))
        })
    }
}

/// Fresh session carrying the parent's configuration at this instant
pub(crate) fn inherit_session(parent: &Session, now: i64) -> Session {
    Session {
        session_id: None,
        working_dir: parent.working_dir.clone(),
        mode: parent.mode,
        created_at: now,
        last_active_at: now,
        path: parent.path.clone(),
        previous_session_ids: Vec::new(),
        update_rate_seconds: parent.update_rate_seconds,
        thread_char_limit: parent.thread_char_limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> Store {
        Store::open(dir.path().join("sessions.json"))
    }

    #[test]
    fn test_save_session_preserves_created_at() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store(&dir);

        let first = store.save_session(
            "C1",
            SessionPatch {
                working_dir: Some("/repo".to_string()),
                ..Default::default()
            },
        )?;
        let second = store.save_session("C1", SessionPatch::session_id("S1"))?;

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.working_dir, "/repo");
        assert_eq!(second.session_id.as_deref(), Some("S1"));
        Ok(())
    }

    #[test]
    fn test_configured_path_is_frozen() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store(&dir);

        let configured = PathConfig {
            path_configured: true,
            configured_path: Some("/first".to_string()),
            configured_by: Some("U1".to_string()),
            configured_at: Some(1),
        };
        store.save_session(
            "C1",
            SessionPatch {
                path: Some(configured.clone()),
                ..Default::default()
            },
        )?;
        let after = store.save_session(
            "C1",
            SessionPatch {
                path: Some(PathConfig {
                    path_configured: true,
                    configured_path: Some("/second".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )?;

        assert_eq!(after.path, configured);
        Ok(())
    }

    #[test]
    fn test_new_session_id_supersedes_old() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store(&dir);

        store.save_session("C1", SessionPatch::session_id("S1"))?;
        store.save_session("C1", SessionPatch::session_id("S1"))?;
        let session = store.save_session("C1", SessionPatch::session_id("S2"))?;

        assert_eq!(session.session_id.as_deref(), Some("S2"));
        assert_eq!(session.previous_session_ids, vec!["S1".to_string()]);
        Ok(())
    }

    #[test]
    fn test_thread_inherits_channel_config_once() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store(&dir);

        store.save_session(
            "C1",
            SessionPatch {
                working_dir: Some("/repo".to_string()),
                mode: Some(PermissionMode::Plan),
                thread_char_limit: Some(800),
                ..Default::default()
            },
        )?;
        let thread = store.save_thread_session("C1", "1.0", SessionPatch::default())?;
        assert_eq!(thread.session.working_dir, "/repo");
        assert_eq!(thread.session.mode, PermissionMode::Plan);
        assert_eq!(thread.session.thread_char_limit, Some(800));

        // Later parent changes do not reach the existing thread
        store.save_session(
            "C1",
            SessionPatch {
                working_dir: Some("/elsewhere".to_string()),
                ..Default::default()
            },
        )?;
        let thread = store.save_thread_session("C1", "1.0", SessionPatch::session_id("T1"))?;
        assert_eq!(thread.session.working_dir, "/repo");
        assert_eq!(thread.session.session_id.as_deref(), Some("T1"));
        Ok(())
    }

    #[test]
    fn test_record_message_is_append_only() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store(&dir);

        assert!(store.record_message("C1", "1.0", MappingEntry::assistant("A", "S1"))?);
        assert!(!store.record_message("C1", "1.0", MappingEntry::assistant("B", "S2"))?);

        let channel = store.get_channel("C1").unwrap();
        assert_eq!(channel.message_map["1.0"].sdk_message_id, "A");
        assert!(store.is_synced("C1", "A"));
        assert!(!store.is_synced("C1", "B"));
        Ok(())
    }

    #[test]
    fn test_backfill_permalink_only_once() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store(&dir);

        store.record_message("C1", "1.0", MappingEntry::user("U", "S1"))?;
        assert!(store.backfill_permalink("C1", "1.0", "https://a")?);
        assert!(!store.backfill_permalink("C1", "1.0", "https://b")?);
        assert!(!store.backfill_permalink("C1", "9.0", "https://c")?);

        let entry = &store.get_channel("C1").unwrap().message_map["1.0"];
        assert_eq!(entry.permalink.as_deref(), Some("https://a"));
        Ok(())
    }

    #[test]
    fn test_reset_keeps_message_map() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store(&dir);

        store.save_session("C1", SessionPatch::session_id("S1"))?;
        store.record_message("C1", "1.0", MappingEntry::assistant("A", "S1"))?;

        let old = store.reset_session(&ConversationKey::channel("C1"))?;
        assert_eq!(old.as_deref(), Some("S1"));

        let channel = store.get_channel("C1").unwrap();
        assert_eq!(channel.session.session_id, None);
        assert_eq!(channel.session.previous_session_ids, vec!["S1".to_string()]);
        assert_eq!(channel.message_map.len(), 1);
        Ok(())
    }

    #[test]
    fn test_reset_unknown_thread_is_not_found() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store(&dir);
        store.save_session("C1", SessionPatch::default())?;

        let err = store
            .reset_session(&ConversationKey::thread("C1", "1.0"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        Ok(())
    }

    #[test]
    fn test_delete_channel() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store(&dir);

        store.record_message("C1", "1.0", MappingEntry::user("U", "S1"))?;
        assert!(store.delete_channel("C1")?);
        assert!(!store.delete_channel("C1")?);
        assert!(store.get_channel("C1").is_none());
        Ok(())
    }

    #[test]
    fn test_save_replaces_whole_document() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store(&dir);
        store.record_message("C1", "1.0", MappingEntry::user("U", "S1"))?;

        let mut doc = store.load();
        doc.channels.remove("C1");
        doc.channels.insert(
            "C2".to_string(),
            ChannelSession::new(Session::new("/repo", 1_000)),
        );
        store.save(&doc)?;

        assert_eq!(store.load(), doc);
        assert!(store.get_channel("C1").is_none());
        assert_eq!(store.get_session("C2").map(|s| s.working_dir), Some("/repo".to_string()));

        // Keyed writes merge into the saved document
        store.record_message("C2", "2.0", MappingEntry::user("U2", "S2"))?;
        let channel = store.get_channel("C2").expect("saved channel");
        assert_eq!(channel.session.created_at, 1_000);
        assert_eq!(channel.message_map.len(), 1);
        Ok(())
    }
}
