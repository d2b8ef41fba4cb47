use forkline_types::ConversationKey;

use crate::surface::Surface;

/// Permalink built from ids alone, used when the surface cannot be asked
pub fn fallback_permalink(workspace_url: &str, key: &ConversationKey, ts: &str) -> String {
    let base = workspace_url.trim_end_matches('/');
    let message = ts.replace('.', "");
    match &key.thread_ts {
        Some(thread_ts) => format!(
            "{}/archives/{}/p{}?thread_ts={}&cid={}",
            base, key.channel_id, message, thread_ts, key.channel_id
        ),
        None => format!("{}/archives/{}/p{}", base, key.channel_id, message),
    }
}

/// Ask the surface for a permalink, falling back to [`fallback_permalink`]
pub async fn resolve_permalink(
    surface: &dyn Surface,
    workspace_url: &str,
    key: &ConversationKey,
    ts: &str,
) -> String {
    match surface.permalink(&key.channel_id, ts).await {
        Ok(url) => url,
        Err(err) => {
            tracing::debug!(conversation = %key, ts, error = %err, "permalink lookup failed, using fallback");
            fallback_permalink(workspace_url, key, ts)
        }
    }
}
