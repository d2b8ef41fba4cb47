//! Collaborators the engine talks to: the messaging surface that shows a
//! conversation, and the renderer that decides between inline text and an
//! uploaded attachment.

use async_trait::async_trait;
use forkline_types::ConversationKey;
use std::sync::Arc;

use crate::Result;

/// Chat platform operations on one channel.
///
/// Implementations own their retry policy; an `Err` here means retries were
/// exhausted.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Post a message, returning its surface timestamp
    async fn post(&self, channel_id: &str, thread_ts: Option<&str>, content: &str)
    -> Result<String>;

    async fn update(&self, channel_id: &str, ts: &str, content: &str) -> Result<()>;

    async fn delete(&self, channel_id: &str, ts: &str) -> Result<()>;

    async fn permalink(&self, channel_id: &str, ts: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Short enough to post as message text
    Inline(String),
    /// Uploaded as an attachment; `ts` is the surface message carrying it
    Uploaded { ts: String },
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `text` for `key`. Content longer than `threshold` characters is
    /// uploaded as an attachment into the conversation.
    async fn render(&self, key: &ConversationKey, text: &str, threshold: usize)
    -> Result<Rendered>;
}

/// Everything needed to put content on the surface
#[derive(Clone)]
pub struct Delivery {
    pub surface: Arc<dyn Surface>,
    pub renderer: Arc<dyn Renderer>,
    /// Base for permalinks built without asking the surface
    pub workspace_url: String,
}

impl Delivery {
    pub fn new(
        surface: Arc<dyn Surface>,
        renderer: Arc<dyn Renderer>,
        workspace_url: impl Into<String>,
    ) -> Self {
        Self {
            surface,
            renderer,
            workspace_url: workspace_url.into(),
        }
    }

    pub async fn post(&self, key: &ConversationKey, content: &str) -> Result<String> {
        self.surface
            .post(&key.channel_id, key.thread_ts.as_deref(), content)
            .await
    }

    pub async fn update(&self, key: &ConversationKey, ts: &str, content: &str) -> Result<()> {
        self.surface.update(&key.channel_id, ts, content).await
    }

    pub async fn delete(&self, key: &ConversationKey, ts: &str) -> Result<()> {
        self.surface.delete(&key.channel_id, ts).await
    }

    pub async fn render(&self, key: &ConversationKey, text: &str, threshold: usize) -> Result<Rendered> {
        self.renderer.render(key, text, threshold).await
    }

    pub async fn permalink(&self, key: &ConversationKey, ts: &str) -> String {
        crate::permalink::resolve_permalink(self.surface.as_ref(), &self.workspace_url, key, ts)
            .await
    }
}
