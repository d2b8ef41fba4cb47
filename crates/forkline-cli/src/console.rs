//! Terminal stand-in for a chat platform.
//!
//! Posts, edits and deletions are printed as they happen. Content over the
//! render threshold is written to an attachment file and announced with a
//! one-line message.

use async_trait::async_trait;
use forkline_runtime::{Error, Rendered, Renderer, Result, Surface};
use forkline_types::ConversationKey;
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct ConsoleSurface {
    attachments_dir: PathBuf,
    color: bool,
    counter: AtomicU64,
}

impl ConsoleSurface {
    pub fn new(attachments_dir: impl Into<PathBuf>) -> Self {
        Self {
            attachments_dir: attachments_dir.into(),
            color: std::io::stdout().is_terminal(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn next_ts(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}.{:06}", chrono::Utc::now().timestamp(), n)
    }

    fn print(&self, verb: &str, location: &str, content: &str) {
        if self.color {
            println!("{} {} {}", verb.cyan().bold(), location.dimmed(), content);
        } else {
            println!("{} {} {}", verb, location, content);
        }
    }
}

#[async_trait]
impl Surface for ConsoleSurface {
    async fn post(
        &self,
        channel_id: &str,
        thread_ts: Option<&str>,
        content: &str,
    ) -> Result<String> {
        let ts = self.next_ts();
        let location = match thread_ts {
            Some(parent) => format!("[{}/{} {}]", channel_id, parent, ts),
            None => format!("[{} {}]", channel_id, ts),
        };
        self.print("post", &location, content);
        Ok(ts)
    }

    async fn update(&self, channel_id: &str, ts: &str, content: &str) -> Result<()> {
        self.print("edit", &format!("[{} {}]", channel_id, ts), content);
        Ok(())
    }

    async fn delete(&self, channel_id: &str, ts: &str) -> Result<()> {
        self.print("delete", &format!("[{} {}]", channel_id, ts), "");
        Ok(())
    }

    async fn permalink(&self, _channel_id: &str, _ts: &str) -> Result<String> {
        Err(Error::surface("the console has no permalinks"))
    }
}

#[async_trait]
impl Renderer for ConsoleSurface {
    async fn render(&self, key: &ConversationKey, text: &str, threshold: usize) -> Result<Rendered> {
        if text.chars().count() <= threshold {
            return Ok(Rendered::Inline(text.to_string()));
        }

        tokio::fs::create_dir_all(&self.attachments_dir).await?;
        let n = self.counter.load(Ordering::Relaxed) + 1;
        let path = self
            .attachments_dir
            .join(format!("{}-{:06}.md", key.slug(), n));
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| Error::render(format!("{}: {}", path.display(), e)))?;

        let notice = format!(
            "attachment ({} chars): {}",
            text.chars().count(),
            path.display()
        );
        let ts = self
            .post(&key.channel_id, key.thread_ts.as_deref(), &notice)
            .await?;
        Ok(Rendered::Uploaded { ts })
    }
}
