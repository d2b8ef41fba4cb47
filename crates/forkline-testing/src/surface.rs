//! In-memory messaging surface that records every operation.

use async_trait::async_trait;
use forkline_runtime::{Error, Rendered, Renderer, Result, Surface};
use forkline_types::ConversationKey;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One operation as the surface saw it, in completion order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    Post {
        channel: String,
        thread_ts: Option<String>,
        ts: String,
        content: String,
    },
    Update {
        channel: String,
        ts: String,
        content: String,
    },
    Delete {
        channel: String,
        ts: String,
    },
    Upload {
        channel: String,
        thread_ts: Option<String>,
        ts: String,
        content: String,
    },
}

impl SurfaceOp {
    pub fn ts(&self) -> &str {
        match self {
            SurfaceOp::Post { ts, .. }
            | SurfaceOp::Update { ts, .. }
            | SurfaceOp::Delete { ts, .. }
            | SurfaceOp::Upload { ts, .. } => ts,
        }
    }
}

/// Fake surface and renderer.
///
/// Timestamps increase monotonically (`1700000000.000001`, ...). Failures
/// and post or update latency can be injected.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    ops: Mutex<Vec<SurfaceOp>>,
    next_ts: AtomicU64,
    failing_posts: AtomicU64,
    failing_permalinks: AtomicBool,
    update_delay: Mutex<Duration>,
    post_delay: Mutex<Duration>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn ops_guard(&self) -> MutexGuard<'_, Vec<SurfaceOp>> {
        self.ops.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_ts(&self) -> String {
        let n = self.next_ts.fetch_add(1, Ordering::SeqCst) + 1;
        format!("1700000000.{:06}", n)
    }

    /// The next `count` posts fail
    pub fn fail_next_posts(&self, count: u64) {
        self.failing_posts.store(count, Ordering::SeqCst);
    }

    pub fn fail_permalinks(&self, fail: bool) {
        self.failing_permalinks.store(fail, Ordering::SeqCst);
    }

    /// Every update takes this long before it lands
    pub fn set_update_delay(&self, delay: Duration) {
        *self
            .update_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Every post takes this long before it lands
    pub fn set_post_delay(&self, delay: Duration) {
        *self
            .post_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.ops_guard().clone()
    }

    /// `(ts, content)` of every post
    pub fn posts(&self) -> Vec<(String, String)> {
        self.ops_guard()
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::Post { ts, content, .. } => Some((ts.clone(), content.clone())),
                _ => None,
            })
            .collect()
    }

    /// `(ts, content)` of every update
    pub fn updates(&self) -> Vec<(String, String)> {
        self.ops_guard()
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::Update { ts, content, .. } => Some((ts.clone(), content.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.ops_guard()
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::Delete { ts, .. } => Some(ts.clone()),
                _ => None,
            })
            .collect()
    }

    /// `(ts, content)` of every attachment upload
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.ops_guard()
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::Upload { ts, content, .. } => Some((ts.clone(), content.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.ops_guard().clear();
    }
}

#[async_trait]
impl Surface for RecordingSurface {
    async fn post(
        &self,
        channel_id: &str,
        thread_ts: Option<&str>,
        content: &str,
    ) -> Result<String> {
        let delay = *self
            .post_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failing = self.failing_posts.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_posts.store(failing - 1, Ordering::SeqCst);
            return Err(Error::surface("injected post failure"));
        }

        let ts = self.next_ts();
        self.ops_guard().push(SurfaceOp::Post {
            channel: channel_id.to_string(),
            thread_ts: thread_ts.map(str::to_string),
            ts: ts.clone(),
            content: content.to_string(),
        });
        Ok(ts)
    }

    async fn update(&self, channel_id: &str, ts: &str, content: &str) -> Result<()> {
        let delay = *self
            .update_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.ops_guard().push(SurfaceOp::Update {
            channel: channel_id.to_string(),
            ts: ts.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, channel_id: &str, ts: &str) -> Result<()> {
        self.ops_guard().push(SurfaceOp::Delete {
            channel: channel_id.to_string(),
            ts: ts.to_string(),
        });
        Ok(())
    }

    async fn permalink(&self, channel_id: &str, ts: &str) -> Result<String> {
        if self.failing_permalinks.load(Ordering::SeqCst) {
            return Err(Error::surface("injected permalink failure"));
        }
        Ok(format!("https://surface.test/{}/{}", channel_id, ts))
    }
}

#[async_trait]
impl Renderer for RecordingSurface {
    async fn render(
        &self,
        key: &ConversationKey,
        text: &str,
        threshold: usize,
    ) -> Result<Rendered> {
        if text.chars().count() <= threshold {
            return Ok(Rendered::Inline(text.to_string()));
        }

        let ts = self.next_ts();
        self.ops_guard().push(SurfaceOp::Upload {
            channel: key.channel_id.clone(),
            thread_ts: key.thread_ts.clone(),
            ts: ts.clone(),
            content: text.to_string(),
        });
        Ok(Rendered::Uploaded { ts })
    }
}
