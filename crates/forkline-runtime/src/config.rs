use crate::{Error, Result};
use forkline_store::{ActivityLog, Store};
use forkline_types::Session;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolve the data directory based on priority:
/// 1. Explicit path (with tilde expansion)
/// 2. FORKLINE_PATH environment variable (with tilde expansion)
/// 3. XDG data directory (recommended default)
/// 4. ~/.forkline (fallback for systems without XDG)
pub fn resolve_data_dir(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var("FORKLINE_PATH") {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("forkline"));
    }

    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".forkline"));
    }

    Err(Error::Config(
        "Could not determine data directory: no HOME directory or XDG data directory found"
            .to_string(),
    ))
}

/// Expand tilde (~) in paths to the user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transcript poll cadence per watched conversation
    pub poll_interval_ms: u64,
    /// Minimum spacing of activity updates; sessions may override
    pub update_rate_seconds: u32,
    /// Thinking longer than this is uploaded as an attachment; sessions may override
    pub thread_char_limit: usize,
    /// Inline messages longer than this are split into continuation parts
    pub message_char_limit: usize,
    /// Prompts and replies longer than this are uploaded instead of posted
    pub upload_char_limit: usize,
    /// Pending tool activity is flushed at least this often
    pub activity_flush_seconds: u64,
    /// Root of the agent's per-project transcript directories
    pub transcripts_root: Option<String>,
    /// Base URL for permalinks built without asking the surface
    pub workspace_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            update_rate_seconds: 2,
            thread_char_limit: 500,
            message_char_limit: 3_000,
            upload_char_limit: 12_000,
            activity_flush_seconds: 5,
            transcripts_root: None,
            workspace_url: "https://slack.com".to_string(),
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn transcripts_root(&self) -> PathBuf {
        match &self.transcripts_root {
            Some(root) => expand_tilde(root),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".claude")
                .join("projects"),
        }
    }

    /// Effective tunables for one conversation
    pub fn settings_for(&self, session: Option<&Session>) -> WatchSettings {
        let update_rate = session
            .and_then(|s| s.update_rate_seconds)
            .unwrap_or(self.update_rate_seconds);
        let thread_char_limit = session
            .and_then(|s| s.thread_char_limit)
            .unwrap_or(self.thread_char_limit);
        let upload_char_limit = self.upload_char_limit.max(1);

        WatchSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            min_update_interval: Duration::from_secs(u64::from(update_rate)),
            flush_interval: Duration::from_secs(self.activity_flush_seconds),
            thread_char_limit: thread_char_limit.max(1),
            message_char_limit: self.message_char_limit.clamp(1, upload_char_limit),
            upload_char_limit,
        }
    }
}

/// Per-conversation tunables, fixed when a watch starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSettings {
    pub poll_interval: Duration,
    pub min_update_interval: Duration,
    pub flush_interval: Duration,
    pub thread_char_limit: usize,
    pub message_char_limit: usize,
    pub upload_char_limit: usize,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Config::default().settings_for(None)
    }
}

/// Data directory plus its configuration
#[derive(Debug, Clone)]
pub struct Workspace {
    pub data_dir: PathBuf,
    pub config: Config,
}

impl Workspace {
    pub fn open(explicit_path: Option<&str>) -> Result<Self> {
        let data_dir = resolve_data_dir(explicit_path)?;
        let config = Config::load_from(&data_dir.join("config.toml"))?;
        Ok(Self { data_dir, config })
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    pub fn store(&self) -> Store {
        Store::open(self.data_dir.join("sessions.json"))
    }

    pub fn activity_log(&self) -> ActivityLog {
        ActivityLog::new(self.data_dir.join("activity"))
    }
}
