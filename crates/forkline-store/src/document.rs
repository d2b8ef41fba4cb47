use forkline_types::ChannelSession;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::Path;

use crate::Result;

/// The whole persisted store: `{ "channels": { <channelId>: ChannelSession } }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelSession>,
}

impl StoreDocument {
    /// Read the document at `path`.
    ///
    /// Never fails: a missing file, unreadable bytes, invalid JSON, or a
    /// document of the wrong shape all yield an empty store.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "store unreadable, starting empty");
                return Self::default();
            }
        };

        match Self::parse(&text) {
            Ok((doc, migrated)) => {
                if migrated > 0 {
                    tracing::info!(
                        path = %path.display(),
                        fields = migrated,
                        "filled defaults for legacy store fields"
                    );
                }
                doc
            }
            Err(reason) => {
                tracing::warn!(path = %path.display(), %reason, "store malformed, starting empty");
                Self::default()
            }
        }
    }

    /// Parse and migrate a document, returning it with the number of fields
    /// that had to be filled with defaults.
    pub fn parse(text: &str) -> std::result::Result<(Self, usize), String> {
        if text.trim().is_empty() {
            return Ok((Self::default(), 0));
        }

        let mut value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let root = value
            .as_object_mut()
            .ok_or_else(|| "document root is not an object".to_string())?;

        let migrated = match root.get_mut("channels") {
            None => 0,
            Some(Value::Object(channels)) => channels.values_mut().map(migrate_channel).sum(),
            Some(_) => return Err("`channels` is not an object".to_string()),
        };

        let doc: StoreDocument = serde_json::from_value(value).map_err(|e| e.to_string())?;
        Ok((doc, migrated))
    }

    /// Write the whole document, replacing the file atomically
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn migrate_channel(channel: &mut Value) -> usize {
    let Some(obj) = channel.as_object_mut() else {
        return 0;
    };

    let mut filled = migrate_session_fields(obj);
    filled += fill(obj, "messageMap", json!({}));

    if let Some(Value::Object(threads)) = obj.get_mut("threads") {
        for thread in threads.values_mut() {
            if let Some(thread) = thread.as_object_mut() {
                filled += migrate_session_fields(thread);
                filled += fill(thread, "forkedFrom", Value::Null);
            }
        }
    }

    filled
}

fn migrate_session_fields(obj: &mut Map<String, Value>) -> usize {
    let mut filled = 0;

    // Oldest documents stored the working directory as `cwd`
    if !obj.contains_key("workingDir")
        && let Some(cwd) = obj.remove("cwd")
    {
        obj.insert("workingDir".to_string(), cwd);
        filled += 1;
    }

    filled += fill(obj, "sessionId", Value::Null);
    filled += fill(obj, "workingDir", json!(""));
    filled += fill(obj, "mode", json!("default"));

    let created = obj.get("createdAt").cloned();
    let active = obj.get("lastActiveAt").cloned();
    filled += fill(obj, "createdAt", active.unwrap_or(json!(0)));
    filled += fill(obj, "lastActiveAt", created.unwrap_or(json!(0)));

    let has_path = obj.get("configuredPath").is_some_and(|v| !v.is_null());
    filled += fill(obj, "pathConfigured", json!(has_path));
    filled += fill(obj, "previousSessionIds", json!([]));

    filled
}

fn fill(obj: &mut Map<String, Value>, key: &str, default: Value) -> usize {
    if obj.contains_key(key) {
        return 0;
    }
    obj.insert(key.to_string(), default);
    1
}
