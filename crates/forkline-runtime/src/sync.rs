//! One poll tick of transcript mirroring.
//!
//! Records are handled strictly in log order. Activity-only assistant
//! records feed the batcher; records with text flush pending activity first,
//! then post. A record counts as synced once its mapping entry exists, and
//! the message map is consulted before posting, so re-reading a record after
//! a failure never posts it twice.

use forkline_store::{ActivityLog, Store};
use forkline_transcript::{ContentBlock, ReadBatch, TranscriptRecord};
use forkline_types::{ConversationKey, MappingEntry, MessageKind, now_millis};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;

use crate::Result;
use crate::activity::{ActivityBatcher, TurnState, render_user_message};
use crate::config::WatchSettings;
use crate::split::split_message;
use crate::surface::{Delivery, Rendered};

/// Runtime state of one watched conversation. Never persisted.
#[derive(Debug)]
pub struct WatchState {
    pub key: ConversationKey,
    pub transcript: PathBuf,
    /// Used for mapping entries when a record carries no session id
    pub session_id: Option<String>,
    pub file_offset: u64,
    pub settings: WatchSettings,
    pub batcher: ActivityBatcher,
    /// Record whose blocks were already fed to the batcher
    last_ingested: Option<String>,
}

impl WatchState {
    pub fn new(
        key: ConversationKey,
        transcript: PathBuf,
        session_id: Option<String>,
        file_offset: u64,
        settings: WatchSettings,
    ) -> Self {
        Self {
            batcher: ActivityBatcher::new(key.clone(), settings),
            key,
            transcript,
            session_id,
            file_offset,
            settings,
            last_ingested: None,
        }
    }

    /// Feed blocks of `record` once; a record re-read after a failed post is
    /// not fed twice.
    fn ingest(&mut self, record: &TranscriptRecord, blocks: &[ContentBlock], now: Instant) -> bool {
        if self.last_ingested.as_deref() == Some(record.uuid.as_str()) {
            return false;
        }
        self.feed(record, blocks, now);
        self.last_ingested = Some(record.uuid.clone());
        true
    }

    fn feed(&mut self, record: &TranscriptRecord, blocks: &[ContentBlock], now: Instant) {
        let at_ms = record.timestamp_millis().unwrap_or_else(now_millis);
        self.batcher.ingest(blocks, at_ms, now);
    }
}

/// Split at the last text block: activity before it belongs to the turn the
/// text completes, activity after it starts the next one.
fn split_at_text(blocks: &[ContentBlock]) -> (&[ContentBlock], &[ContentBlock]) {
    let end = blocks
        .iter()
        .rposition(|block| matches!(block, ContentBlock::Text { text } if !text.trim().is_empty()))
        .map_or(blocks.len(), |index| index + 1);
    blocks.split_at(end)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Records posted to the surface
    pub posted: usize,
    /// Records skipped because the message map already has them
    pub skipped_synced: usize,
    /// Records fed to the activity batcher only
    pub ingested: usize,
    /// A record failed; the offset was rewound to retry it
    pub failed: bool,
}

enum Outcome {
    Posted,
    AlreadySynced,
    Ingested,
}

pub struct SyncEngine {
    store: Arc<Store>,
    activity_log: ActivityLog,
    delivery: Delivery,
}

impl SyncEngine {
    pub fn new(store: Arc<Store>, activity_log: ActivityLog, delivery: Delivery) -> Self {
        Self {
            store,
            activity_log,
            delivery,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn delivery(&self) -> &Delivery {
        &self.delivery
    }

    /// Apply one tailer read to the conversation.
    ///
    /// On the first failing record the offset is moved back to that record's
    /// start and the remaining records are left for the next tick. Periodic
    /// activity work still runs.
    pub async fn process(&self, state: &mut WatchState, batch: ReadBatch, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        state.file_offset = batch.next_offset;

        for tailed in batch.records {
            match self.process_record(state, &tailed.record, now).await {
                Ok(Outcome::Posted) => report.posted += 1,
                Ok(Outcome::AlreadySynced) => report.skipped_synced += 1,
                Ok(Outcome::Ingested) => report.ingested += 1,
                Err(err) => {
                    tracing::warn!(
                        conversation = %state.key,
                        record = %tailed.record.uuid,
                        offset = tailed.start_offset,
                        error = %err,
                        "failed to sync record, will retry"
                    );
                    state.file_offset = tailed.start_offset;
                    report.failed = true;
                    break;
                }
            }
        }

        state.batcher.tick(&self.delivery, now).await;
        self.append_activity(state);

        if report.posted > 0 || report.failed {
            tracing::info!(
                conversation = %state.key,
                posted = report.posted,
                skipped = report.skipped_synced,
                offset = state.file_offset,
                "synced transcript"
            );
        }
        report
    }

    async fn process_record(
        &self,
        state: &mut WatchState,
        record: &TranscriptRecord,
        now: Instant,
    ) -> Result<Outcome> {
        let text = record.text();

        if text.is_some() && self.store.is_synced(&state.key.channel_id, &record.uuid) {
            tracing::debug!(conversation = %state.key, record = %record.uuid, "already synced");
            if state.batcher.state() == TurnState::AccumulatingTurn {
                // Replayed history: the activity belongs to a turn already shown
                state.batcher.discard_turn();
            }
            return Ok(Outcome::AlreadySynced);
        }

        let (leading, trailing) = split_at_text(record.blocks());
        let fed = state.ingest(record, leading, now);
        let Some(text) = text else {
            return Ok(if fed {
                Outcome::Ingested
            } else {
                Outcome::AlreadySynced
            });
        };

        // Activity precedes the message that follows it
        state.batcher.flush_all(&self.delivery, now).await;

        if record.is_user() {
            let content = render_user_message(&text);
            self.post_record(state, record, MessageKind::User, &content, now)
                .await?;
        } else {
            self.post_record(state, record, MessageKind::Assistant, &text, now)
                .await?;
            let at_ms = record.timestamp_millis().unwrap_or_else(now_millis);
            state.batcher.end_turn(at_ms, text.chars().count());
        }
        if !trailing.is_empty() {
            state.feed(record, trailing, now);
        }
        Ok(Outcome::Posted)
    }

    async fn post_record(
        &self,
        state: &mut WatchState,
        record: &TranscriptRecord,
        kind: MessageKind,
        content: &str,
        now: Instant,
    ) -> Result<()> {
        let key = &state.key;
        let rendered = self
            .delivery
            .render(key, content, state.settings.upload_char_limit)
            .await?;

        let posted = match rendered {
            Rendered::Uploaded { ts } => vec![ts],
            Rendered::Inline(text) => {
                let mut posted = Vec::new();
                for part in split_message(&text, state.settings.message_char_limit) {
                    posted.push(self.delivery.post(key, &part).await?);
                }
                posted
            }
        };
        state.batcher.note_surface_write(now);

        let Some(session_id) = record
            .session_id
            .clone()
            .or_else(|| state.session_id.clone())
        else {
            tracing::warn!(
                conversation = %key,
                record = %record.uuid,
                "record has no session id, posted without a mapping entry"
            );
            return Ok(());
        };

        for (index, ts) in posted.iter().enumerate() {
            let mut entry = match kind {
                MessageKind::User => MappingEntry::user(record.uuid.as_str(), session_id.as_str()),
                MessageKind::Assistant => {
                    MappingEntry::assistant(record.uuid.as_str(), session_id.as_str())
                }
            }
            .in_thread(key.thread_ts.clone());
            if index > 0 {
                entry = entry.continuation();
            }
            self.store.record_message(&key.channel_id, ts, entry)?;
        }

        for ts in &posted {
            let url = self.delivery.permalink(key, ts).await;
            if let Err(err) = self.store.backfill_permalink(&key.channel_id, ts, &url) {
                tracing::debug!(conversation = %key, ts = %ts, error = %err, "permalink backfill failed");
            }
        }

        tracing::debug!(
            conversation = %key,
            record = %record.uuid,
            parts = posted.len(),
            "posted record"
        );
        Ok(())
    }

    fn append_activity(&self, state: &mut WatchState) {
        let entries = state.batcher.take_logged();
        if let Err(err) = self.activity_log.append(&state.key, &entries) {
            tracing::warn!(conversation = %state.key, error = %err, "failed to append activity log");
        }
    }
}
