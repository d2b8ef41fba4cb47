use forkline_transcript::read_new;
use forkline_types::ConversationKey;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::Config;
use crate::sync::{SyncEngine, TickReport, WatchState};
use crate::{Error, Result};

/// Where a new watch starts reading the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// Replay the whole transcript; already mapped records are skipped
    Beginning,
    /// Mirror only what is appended from now on
    #[default]
    End,
}

#[derive(Debug, Clone)]
pub struct WatchRequest {
    pub key: ConversationKey,
    pub transcript: PathBuf,
    pub session_id: Option<String>,
    pub start: StartPosition,
}

impl WatchRequest {
    pub fn new(key: ConversationKey, transcript: impl Into<PathBuf>) -> Self {
        Self {
            key,
            transcript: transcript.into(),
            session_id: None,
            start: StartPosition::default(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn from_beginning(mut self) -> Self {
        self.start = StartPosition::Beginning;
        self
    }
}

struct WatchHandle {
    state: Arc<AsyncMutex<WatchState>>,
    task: JoinHandle<()>,
}

/// Owns every watched conversation: its runtime state and its poll timer.
///
/// Each conversation polls on its own interval. The state mutex doubles as
/// the in-progress guard: a tick that finds it held is skipped, not queued.
pub struct WatchScheduler {
    engine: Arc<SyncEngine>,
    config: Config,
    watches: Mutex<HashMap<ConversationKey, WatchHandle>>,
}

impl WatchScheduler {
    pub fn new(engine: Arc<SyncEngine>, config: Config) -> Self {
        Self {
            engine,
            config,
            watches: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    fn watches(&self) -> MutexGuard<'_, HashMap<ConversationKey, WatchHandle>> {
        self.watches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start polling a conversation's transcript. Returns `false` if the
    /// conversation is already watched.
    pub fn start_watch(&self, request: WatchRequest) -> Result<bool> {
        let mut watches = self.watches();
        if watches.contains_key(&request.key) {
            return Ok(false);
        }

        let session = self.engine.store().get_conversation_session(&request.key);
        let settings = self.config.settings_for(session.as_ref());
        let session_id = request
            .session_id
            .or_else(|| session.and_then(|s| s.session_id));

        let file_offset = match request.start {
            StartPosition::Beginning => 0,
            StartPosition::End => match std::fs::metadata(&request.transcript) {
                Ok(meta) => meta.len(),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => 0,
                Err(err) => return Err(err.into()),
            },
        };

        tracing::info!(
            conversation = %request.key,
            transcript = %request.transcript.display(),
            offset = file_offset,
            "starting watch"
        );

        let state = Arc::new(AsyncMutex::new(WatchState::new(
            request.key.clone(),
            request.transcript,
            session_id,
            file_offset,
            settings,
        )));

        let engine = self.engine.clone();
        let task_state = state.clone();
        let task = tokio::spawn(async move {
            let period = settings.poll_interval;
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                run_tick(&engine, &task_state).await;
            }
        });

        watches.insert(request.key, WatchHandle { state, task });
        Ok(true)
    }

    /// Cancel the timer and drop the conversation's runtime state. Pending
    /// activity is discarded, not flushed.
    pub fn stop_watch(&self, key: &ConversationKey) -> bool {
        let Some(handle) = self.watches().remove(key) else {
            return false;
        };
        handle.task.abort();
        tracing::info!(conversation = %key, "stopped watch");
        true
    }

    /// The agent session behind `key` was reset elsewhere; its transcript
    /// is no longer the conversation's.
    pub fn on_session_reset(&self, key: &ConversationKey) -> bool {
        let stopped = self.stop_watch(key);
        if stopped {
            tracing::info!(conversation = %key, "watch stopped after session reset");
        }
        stopped
    }

    pub fn is_watching(&self, key: &ConversationKey) -> bool {
        self.watches().contains_key(key)
    }

    pub fn watched(&self) -> Vec<ConversationKey> {
        let mut keys: Vec<_> = self.watches().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Run one tick now, through the same guard as the timer. `Ok(None)`
    /// means a tick was already running.
    pub async fn poll_now(&self, key: &ConversationKey) -> Result<Option<TickReport>> {
        let state = self
            .watches()
            .get(key)
            .map(|handle| handle.state.clone())
            .ok_or_else(|| Error::InvalidOperation(format!("{} is not being watched", key)))?;
        Ok(run_tick(&self.engine, &state).await)
    }

    pub fn stop_all(&self) {
        let drained: Vec<_> = self.watches().drain().collect();
        for (key, handle) in drained {
            handle.task.abort();
            tracing::debug!(conversation = %key, "stopped watch");
        }
    }
}

impl Drop for WatchScheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}

async fn run_tick(engine: &SyncEngine, state: &AsyncMutex<WatchState>) -> Option<TickReport> {
    let Ok(mut state) = state.try_lock() else {
        tracing::debug!("previous tick still running, skipping");
        return None;
    };

    let path = state.transcript.clone();
    let offset = state.file_offset;
    let batch = match tokio::task::spawn_blocking(move || read_new(&path, offset)).await {
        Ok(Ok(batch)) => batch,
        Ok(Err(err)) => {
            tracing::warn!(conversation = %state.key, error = %err, "failed to read transcript");
            return Some(TickReport::default());
        }
        Err(err) => {
            tracing::warn!(conversation = %state.key, error = %err, "transcript read task failed");
            return Some(TickReport::default());
        }
    };

    if batch.skipped_fragment {
        tracing::debug!(conversation = %state.key, offset, "skipped partial leading line");
    }

    Some(engine.process(&mut state, batch, Instant::now()).await)
}
