use forkline_types::{ActivityEntry, ConversationKey};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::Result;

/// Flushed activity entries, one JSONL file per conversation
#[derive(Debug, Clone)]
pub struct ActivityLog {
    dir: PathBuf,
}

impl ActivityLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &ConversationKey) -> PathBuf {
        self.dir.join(format!("{}.jsonl", key.slug()))
    }

    pub fn append(&self, key: &ConversationKey, entries: &[ActivityEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir)?;

        let mut buf = String::new();
        for entry in entries {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(key))?;
        file.write_all(buf.as_bytes())?;
        Ok(())
    }

    /// All logged entries for a conversation, oldest first.
    ///
    /// Lines that do not parse are skipped.
    pub fn read(&self, key: &ConversationKey) -> Result<Vec<ActivityEntry>> {
        let path = self.path_for(key);
        let file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ActivityEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "skipping activity line")
                }
            }
        }
        Ok(entries)
    }
}
