//! Fork-point resolution and lazy creation of forked thread sessions.
//!
//! Lineage always comes from the message map. The channel's live `sessionId`
//! is never consulted: after a reset it is `None`, while every mapping entry
//! still names the session that produced its message.

use forkline_types::{ForkPoint, MappingEntry, ThreadSession, compare_ts, now_millis};
use std::collections::BTreeMap;

use crate::store::inherit_session;
use crate::{Error, Result, Store};

/// Outcome of [`Store::get_or_create_thread_session`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkedThread {
    pub session: ThreadSession,
    /// `false` when the thread already existed and was returned untouched
    pub is_new_fork: bool,
}

/// Resolve the fork point for `anchor_ts` within one channel's message map.
///
/// Assistant anchors resolve to themselves; every part of a split message
/// shares one transcript id, so any part gives the same answer. User anchors
/// resolve to the nearest assistant entry strictly before them.
pub fn resolve_fork_point(
    message_map: &BTreeMap<String, MappingEntry>,
    anchor_ts: &str,
) -> Option<ForkPoint> {
    let anchor = message_map.get(anchor_ts)?;
    if anchor.is_assistant() {
        return Some(anchor.fork_point());
    }

    let mut earlier: Vec<(&String, &MappingEntry)> = message_map
        .iter()
        .filter(|(ts, _)| compare_ts(ts, anchor_ts).is_lt())
        .collect();
    earlier.sort_by(|(a, _), (b, _)| compare_ts(a, b));

    earlier
        .into_iter()
        .rev()
        .find(|(_, entry)| entry.is_assistant())
        .map(|(_, entry)| entry.fork_point())
}

impl Store {
    /// Fork point for an anchor message, or `None` for unknown anchors and
    /// user messages with no assistant reply before them.
    pub fn find_fork_point(&self, channel_id: &str, anchor_ts: &str) -> Option<ForkPoint> {
        let channel = self.get_channel(channel_id)?;
        resolve_fork_point(&channel.message_map, anchor_ts)
    }

    /// Return the thread session for `thread_ts`, creating it on first call.
    ///
    /// Creation snapshots working dir, mode, path config and tunables from
    /// the parent (the channel, or `parent_thread_ts` for a fork of a fork)
    /// and pins the fork point. Later calls return the stored thread
    /// unchanged, so a retry can never re-anchor it.
    pub fn get_or_create_thread_session(
        &self,
        channel_id: &str,
        thread_ts: &str,
        fork_point: Option<&ForkPoint>,
        parent_thread_ts: Option<&str>,
    ) -> Result<ForkedThread> {
        let now = now_millis();
        self.update(|doc| {
            let channel = doc
                .channels
                .get_mut(channel_id)
                .ok_or_else(|| Error::NotFound(format!("channel {}", channel_id)))?;

            if let Some(existing) = channel.thread(thread_ts) {
                let forked = ForkedThread {
                    session: existing.clone(),
                    is_new_fork: false,
                };
                return Ok((forked, false));
            }

            let parent = match parent_thread_ts {
                Some(parent_ts) => {
                    &channel
                        .thread(parent_ts)
                        .ok_or_else(|| {
                            Error::NotFound(format!("thread {}/{}", channel_id, parent_ts))
                        })?
                        .session
                }
                None => &channel.session,
            };

            let thread = ThreadSession {
                session: inherit_session(parent, now),
                forked_from: fork_point.map(|p| p.session_id.clone()),
                forked_from_thread_ts: parent_thread_ts.map(str::to_string),
                resume_session_at_message_id: fork_point.map(|p| p.message_id.clone()),
            };

            tracing::info!(
                channel = channel_id,
                thread = thread_ts,
                forked_from = ?thread.forked_from,
                resume_at = ?thread.resume_session_at_message_id,
                "created forked thread session"
            );

            channel
                .threads_mut()
                .insert(thread_ts.to_string(), thread.clone());
            let forked = ForkedThread {
                session: thread,
                is_new_fork: true,
            };
            Ok((forked, true))
        })
    }
}
