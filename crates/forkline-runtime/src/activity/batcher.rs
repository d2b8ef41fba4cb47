use forkline_transcript::{ContentBlock, summarize_tool_input};
use forkline_types::{ActivityEntry, ActivityKind, ConversationKey};
use std::collections::HashSet;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::render::{render_thinking, render_tool_batch};
use super::throttle::Throttle;
use crate::Result;
use crate::config::WatchSettings;
use crate::surface::{Delivery, Rendered};

/// Whether the assistant is mid-turn, i.e. activity has arrived since the
/// last text-bearing record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AccumulatingTurn,
}

/// A flushed tool batch, kept so late tool results can update it in place
#[derive(Debug)]
struct PostedBatch {
    ts: String,
    entries: Vec<ActivityEntry>,
    tool_ids: HashSet<String>,
    dirty: bool,
}

/// Thinking message updated in place while the block stream is open
#[derive(Debug)]
struct RollingMessage {
    ts: Option<String>,
    content: String,
    started_at: i64,
    dirty: bool,
    complete: bool,
    in_flight: Option<JoinHandle<Result<()>>>,
}

impl RollingMessage {
    fn new(content: &str, started_at: i64) -> Self {
        Self {
            ts: None,
            content: content.to_string(),
            started_at,
            dirty: true,
            complete: false,
            in_flight: None,
        }
    }

    /// Wait for the outstanding update, if any
    async fn settle(&mut self, key: &ConversationKey) {
        let Some(handle) = self.in_flight.take() else {
            return;
        };
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(conversation = %key, ts = ?self.ts, error = %err, "thinking update failed");
            }
            Err(err) => {
                tracing::warn!(conversation = %key, ts = ?self.ts, error = %err, "thinking update task aborted");
            }
        }
    }
}

/// Accumulates tool and thinking activity of the current turn and mirrors
/// it onto the surface at a bounded rate.
///
/// Every surface write of the conversation shares one throttle. Writes that
/// fall inside the window are coalesced: the message stays dirty and the
/// latest content goes out on the first call after the window closes.
/// [`flush_all`](Self::flush_all) and completed thinking bypass the window.
#[derive(Debug)]
pub struct ActivityBatcher {
    key: ConversationKey,
    settings: WatchSettings,
    state: TurnState,
    pending: Vec<ActivityEntry>,
    pending_since: Option<Instant>,
    /// Oldest first; only the last one accepts in-place updates
    batches: Vec<PostedBatch>,
    thinking: Option<RollingMessage>,
    finished_thinking: Vec<RollingMessage>,
    throttle: Throttle,
    logged: Vec<ActivityEntry>,
}

impl ActivityBatcher {
    pub fn new(key: ConversationKey, settings: WatchSettings) -> Self {
        Self {
            key,
            settings,
            state: TurnState::Idle,
            pending: Vec::new(),
            pending_since: None,
            batches: Vec::new(),
            thinking: None,
            finished_thinking: Vec::new(),
            throttle: Throttle::new(settings.min_update_interval),
            logged: Vec::new(),
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Tool entries not yet posted
    pub fn pending(&self) -> &[ActivityEntry] {
        &self.pending
    }

    pub fn posted_batches(&self) -> usize {
        self.batches.len()
    }

    /// Feed the content blocks of one transcript record
    pub fn ingest(&mut self, blocks: &[ContentBlock], at_ms: i64, now: Instant) {
        for block in blocks {
            match block {
                ContentBlock::Thinking { thinking } if !thinking.trim().is_empty() => {
                    self.begin_turn(at_ms);
                    if let Some(open) = self.thinking.as_mut().filter(|t| !t.complete) {
                        open.content.push_str("\n\n");
                        open.content.push_str(thinking);
                        open.dirty = true;
                    } else {
                        if let Some(done) = self.thinking.take() {
                            self.finished_thinking.push(done);
                        }
                        self.thinking = Some(RollingMessage::new(thinking, at_ms));
                    }
                }
                ContentBlock::ToolUse { id, name, input } => {
                    self.begin_turn(at_ms);
                    self.complete_thinking();
                    if self.pending.is_empty() {
                        self.pending_since = Some(now);
                    }
                    self.pending.push(ActivityEntry::tool_start(
                        at_ms,
                        name.as_str(),
                        id.as_str(),
                        summarize_tool_input(input),
                    ));
                }
                ContentBlock::ToolResult {
                    tool_use_id,
                    is_error,
                    ..
                } => self.complete_tool(tool_use_id, at_ms, is_error.unwrap_or(false)),
                _ => {}
            }
        }
    }

    fn begin_turn(&mut self, at_ms: i64) {
        if self.state == TurnState::Idle {
            self.state = TurnState::AccumulatingTurn;
            self.logged
                .push(ActivityEntry::new(ActivityKind::Starting, at_ms));
        }
    }

    fn complete_thinking(&mut self) {
        if let Some(open) = &mut self.thinking {
            open.complete = true;
        }
    }

    fn complete_tool(&mut self, tool_use_id: &str, at_ms: i64, is_error: bool) {
        let matches = |e: &&mut ActivityEntry| e.tool_use_id.as_deref() == Some(tool_use_id);

        if let Some(entry) = self.pending.iter_mut().find(matches) {
            entry.complete(at_ms, is_error);
            return;
        }

        if let Some(newest) = self.batches.last_mut()
            && newest.tool_ids.contains(tool_use_id)
        {
            if let Some(entry) = newest.entries.iter_mut().find(matches)
                && entry.kind == ActivityKind::ToolStart
            {
                entry.complete(at_ms, is_error);
                newest.dirty = true;
            }
            return;
        }

        if self.batches.iter().any(|b| b.tool_ids.contains(tool_use_id)) {
            tracing::debug!(conversation = %self.key, tool_use_id, "result for superseded batch ignored");
        } else {
            tracing::debug!(conversation = %self.key, tool_use_id, "result for unknown tool ignored");
        }
    }

    /// Push throttled updates whose window has opened, and finalize thinking
    /// whose block stream completed.
    pub async fn apply_updates(&mut self, delivery: &Delivery, now: Instant) {
        self.finalize_thinking(delivery, now).await;

        if let Some(mut open) = self.thinking.take() {
            if open.dirty && self.throttle.ready(now) {
                self.write_open_thinking(delivery, &mut open, now).await;
            }
            self.thinking = Some(open);
        }

        if self.batches.last().is_some_and(|b| b.dirty) && self.throttle.ready(now) {
            self.update_newest_batch(delivery, now).await;
        }
    }

    /// Periodic work: throttled updates, then a forced flush of tool activity
    /// that has waited for the flush interval.
    pub async fn tick(&mut self, delivery: &Delivery, now: Instant) {
        self.apply_updates(delivery, now).await;

        if self
            .pending_since
            .is_some_and(|since| now.duration_since(since) >= self.settings.flush_interval)
        {
            self.flush_pending(delivery, now).await;
        }
    }

    /// Flush everything regardless of the throttle window
    pub async fn flush_all(&mut self, delivery: &Delivery, now: Instant) {
        self.complete_thinking();
        self.finalize_thinking(delivery, now).await;
        self.flush_pending(delivery, now).await;
        if self.batches.last().is_some_and(|b| b.dirty) {
            self.update_newest_batch(delivery, now).await;
        }
    }

    /// Close the turn after its text has been posted. The newest batch stays
    /// addressable while it still has tools awaiting a result.
    pub fn end_turn(&mut self, at_ms: i64, char_count: usize) {
        self.state = TurnState::Idle;
        let running = self.batches.pop().filter(|batch| {
            batch
                .entries
                .iter()
                .any(|entry| entry.kind == ActivityKind::ToolStart)
        });
        self.batches.clear();
        self.batches.extend(running);
        let mut entry = ActivityEntry::new(ActivityKind::Generating, at_ms);
        entry.char_count = Some(char_count);
        self.logged.push(entry);
    }

    /// Drop the turn's unposted activity without writing anything
    pub fn discard_turn(&mut self) {
        self.state = TurnState::Idle;
        self.pending.clear();
        self.pending_since = None;
        self.thinking = None;
        self.finished_thinking.clear();
        self.batches.clear();
    }

    /// Wait for any outstanding rolling-message update
    pub async fn wait_in_flight(&mut self) {
        if let Some(open) = &mut self.thinking {
            open.settle(&self.key).await;
        }
    }

    /// Count a write made outside the batcher against the throttle
    pub fn note_surface_write(&mut self, now: Instant) {
        self.throttle.record(now);
    }

    /// Entries flushed since the last call, for the activity log
    pub fn take_logged(&mut self) -> Vec<ActivityEntry> {
        std::mem::take(&mut self.logged)
    }

    async fn write_open_thinking(
        &mut self,
        delivery: &Delivery,
        open: &mut RollingMessage,
        now: Instant,
    ) {
        let text = render_thinking(&open.content, self.settings.thread_char_limit);
        match open.ts.clone() {
            None => {
                // Tool activity seen before this thinking goes out first
                self.flush_pending(delivery, now).await;
                match delivery.post(&self.key, &text).await {
                    Ok(ts) => open.ts = Some(ts),
                    Err(err) => {
                        tracing::warn!(conversation = %self.key, error = %err, "failed to post thinking message");
                    }
                }
            }
            Some(ts) => {
                open.settle(&self.key).await;
                let delivery = delivery.clone();
                let key = self.key.clone();
                open.in_flight = Some(tokio::spawn(async move {
                    delivery.update(&key, &ts, &text).await
                }));
            }
        }
        open.dirty = false;
        self.throttle.record(now);
    }

    async fn finalize_thinking(&mut self, delivery: &Delivery, now: Instant) {
        let mut done = std::mem::take(&mut self.finished_thinking);
        if self.thinking.as_ref().is_some_and(|t| t.complete) {
            done.extend(self.thinking.take());
        }
        for message in done {
            self.finalize_one(delivery, message, now).await;
        }
    }

    async fn finalize_one(&mut self, delivery: &Delivery, mut message: RollingMessage, now: Instant) {
        // The last streaming update must land before the message is replaced
        message.settle(&self.key).await;

        let limit = self.settings.thread_char_limit;
        let mut entry = ActivityEntry::thinking(message.started_at, message.content.as_str());
        let mut final_ts = message.ts.clone();

        if message.content.chars().count() > limit {
            match delivery.render(&self.key, &message.content, limit).await {
                Ok(Rendered::Uploaded { ts }) => {
                    if let Some(rolling_ts) = &message.ts
                        && let Err(err) = delivery.delete(&self.key, rolling_ts).await
                    {
                        tracing::warn!(conversation = %self.key, ts = %rolling_ts, error = %err, "failed to delete rolling thinking message");
                    }
                    final_ts = Some(ts);
                }
                Ok(Rendered::Inline(text)) => {
                    final_ts = self.write_final(delivery, &message, &text).await;
                }
                Err(err) => {
                    tracing::warn!(conversation = %self.key, error = %err, "failed to upload thinking");
                }
            }
        } else if message.dirty || message.ts.is_none() {
            let text = render_thinking(&message.content, limit);
            final_ts = self.write_final(delivery, &message, &text).await;
        }
        self.throttle.record(now);

        if let Some(ts) = final_ts {
            entry.thread_message_link = Some(delivery.permalink(&self.key, &ts).await);
            entry.thread_message_ts = Some(ts);
        }
        self.logged.push(entry);
    }

    async fn write_final(
        &self,
        delivery: &Delivery,
        message: &RollingMessage,
        text: &str,
    ) -> Option<String> {
        let result = match &message.ts {
            Some(ts) => delivery.update(&self.key, ts, text).await.map(|()| ts.clone()),
            None => delivery.post(&self.key, text).await,
        };
        match result {
            Ok(ts) => Some(ts),
            Err(err) => {
                tracing::warn!(conversation = %self.key, error = %err, "failed to finalize thinking message");
                message.ts.clone()
            }
        }
    }

    /// Post pending tool entries as one message. A failed post drops the
    /// batch.
    async fn flush_pending(&mut self, delivery: &Delivery, now: Instant) {
        if self.pending.is_empty() {
            return;
        }
        let mut entries = std::mem::take(&mut self.pending);
        self.pending_since = None;

        let content = render_tool_batch(&entries);
        match delivery.post(&self.key, &content).await {
            Ok(ts) => {
                self.throttle.record(now);
                let link = delivery.permalink(&self.key, &ts).await;
                for entry in &mut entries {
                    entry.thread_message_ts = Some(ts.clone());
                    entry.thread_message_link = Some(link.clone());
                }
                self.logged.extend(entries.iter().cloned());

                let tool_ids = entries
                    .iter()
                    .filter_map(|e| e.tool_use_id.clone())
                    .collect();
                tracing::debug!(conversation = %self.key, ts = %ts, tools = entries.len(), "posted activity batch");
                self.batches.push(PostedBatch {
                    ts,
                    entries,
                    tool_ids,
                    dirty: false,
                });
            }
            Err(err) => {
                tracing::warn!(
                    conversation = %self.key,
                    tools = entries.len(),
                    error = %err,
                    "dropping activity batch after failed post"
                );
                self.logged.extend(entries);
            }
        }
    }

    async fn update_newest_batch(&mut self, delivery: &Delivery, now: Instant) {
        let Some(newest) = self.batches.last_mut() else {
            return;
        };
        let content = render_tool_batch(&newest.entries);
        if let Err(err) = delivery.update(&self.key, &newest.ts, &content).await {
            tracing::warn!(conversation = %self.key, ts = %newest.ts, error = %err, "failed to update activity batch");
        }
        newest.dirty = false;
        self.throttle.record(now);
    }
}
