use crate::types::OutputFormat;
use anyhow::Result;
use forkline_runtime::Workspace;
use serde_json::json;

/// Create the forked thread session, or return the existing one unchanged.
///
/// An anchor that resolves to no fork point gives an unanchored fork with a
/// fresh session.
pub fn handle(
    workspace: &Workspace,
    channel_id: &str,
    thread_ts: &str,
    anchor_ts: Option<&str>,
    parent_thread_ts: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let store = workspace.store();
    let point = anchor_ts.and_then(|anchor| store.find_fork_point(channel_id, anchor));
    if let Some(anchor) = anchor_ts
        && point.is_none()
    {
        tracing::warn!(
            channel = channel_id,
            anchor = anchor,
            "anchor has no fork point, forking without one"
        );
    }

    let forked = store.get_or_create_thread_session(
        channel_id,
        thread_ts,
        point.as_ref(),
        parent_thread_ts,
    )?;

    match format {
        OutputFormat::Json => {
            let value = json!({
                "isNewFork": forked.is_new_fork,
                "thread": forked.session,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Plain => {
            let thread = &forked.session;
            if forked.is_new_fork {
                println!("Created fork {}/{}", channel_id, thread_ts);
            } else {
                println!("Fork {}/{} already exists", channel_id, thread_ts);
            }
            println!(
                "forked from: {}",
                thread.forked_from.as_deref().unwrap_or("-")
            );
            println!(
                "resume at:   {}",
                thread.resume_session_at_message_id.as_deref().unwrap_or("-")
            );
            if let Some(parent) = &thread.forked_from_thread_ts {
                println!("parent:      {}/{}", channel_id, parent);
            }
        }
    }
    Ok(())
}
