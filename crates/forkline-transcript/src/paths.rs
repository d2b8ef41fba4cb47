use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::Result;

/// Directory name the agent uses for a working directory:
/// `/Users/foo/my.app` -> `-Users-foo-my-app`
pub fn encode_working_dir(working_dir: &str) -> String {
    working_dir.replace(['/', '.', '\\', ':'], "-")
}

/// Expected transcript location for a session started in `working_dir`
pub fn transcript_path(root: &Path, working_dir: &str, session_id: &str) -> PathBuf {
    root.join(encode_working_dir(working_dir))
        .join(format!("{}.jsonl", session_id))
}

/// Search `root` (one project level deep) for `<session_id>.jsonl`.
///
/// Used when the session's working directory is unknown or was renamed.
pub fn find_transcript(root: &Path, session_id: &str) -> Result<Option<PathBuf>> {
    if !root.exists() {
        return Ok(None);
    }

    let file_name = format!("{}.jsonl", session_id);
    for entry in WalkDir::new(root).max_depth(2) {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name().to_string_lossy() == file_name {
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}
