use crate::types::OutputFormat;
use anyhow::{Result, bail};
use forkline_runtime::Workspace;
use forkline_store::SessionPatch;
use forkline_types::{ConversationKey, PermissionMode, Session};
use serde_json::json;

pub fn patch(
    session_id: Option<String>,
    working_dir: Option<String>,
    mode: Option<PermissionMode>,
    update_rate_seconds: Option<u32>,
    thread_char_limit: Option<usize>,
) -> SessionPatch {
    SessionPatch {
        session_id: session_id.map(Some),
        working_dir,
        mode,
        update_rate_seconds,
        thread_char_limit,
        ..Default::default()
    }
}

pub fn list(workspace: &Workspace, format: OutputFormat) -> Result<()> {
    let doc = workspace.store().load();

    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = doc
                .channels
                .iter()
                .map(|(id, channel)| {
                    json!({
                        "channelId": id,
                        "sessionId": channel.session.session_id,
                        "workingDir": channel.session.working_dir,
                        "threads": channel.threads.as_ref().map_or(0, |t| t.len()),
                        "messages": channel.message_map.len(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Plain => {
            if doc.channels.is_empty() {
                println!("No sessions");
                return Ok(());
            }
            for (id, channel) in &doc.channels {
                println!(
                    "{}  session={}  threads={}  messages={}",
                    id,
                    channel.session.session_id.as_deref().unwrap_or("-"),
                    channel.threads.as_ref().map_or(0, |t| t.len()),
                    channel.message_map.len()
                );
            }
        }
    }
    Ok(())
}

pub fn show(workspace: &Workspace, key: &ConversationKey, format: OutputFormat) -> Result<()> {
    let store = workspace.store();

    match &key.thread_ts {
        Some(ts) => {
            let Some(thread) = store.get_thread_session(&key.channel_id, ts) else {
                bail!("No session for {}", key);
            };
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&thread)?),
                OutputFormat::Plain => {
                    print_session(key, &thread.session);
                    println!(
                        "forked from:      {}",
                        thread.forked_from.as_deref().unwrap_or("-")
                    );
                    println!(
                        "resume at:        {}",
                        thread.resume_session_at_message_id.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        None => {
            let Some(channel) = store.get_channel(&key.channel_id) else {
                bail!("No session for {}", key);
            };
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&channel.session)?)
                }
                OutputFormat::Plain => {
                    print_session(key, &channel.session);
                    println!("messages:         {}", channel.message_map.len());
                    if let Some(threads) = &channel.threads {
                        for ts in threads.keys() {
                            println!("thread:           {}", ts);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

pub fn set(
    workspace: &Workspace,
    key: &ConversationKey,
    patch: SessionPatch,
    format: OutputFormat,
) -> Result<()> {
    let store = workspace.store();
    let session = match &key.thread_ts {
        Some(ts) => store.save_thread_session(&key.channel_id, ts, patch)?.session,
        None => store.save_session(&key.channel_id, patch)?,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&session)?),
        OutputFormat::Plain => print_session(key, &session),
    }
    Ok(())
}

pub fn reset(workspace: &Workspace, key: &ConversationKey, format: OutputFormat) -> Result<()> {
    let retired = workspace.store().reset_session(key)?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "retiredSessionId": retired }))?
            );
        }
        OutputFormat::Plain => match retired {
            Some(id) => println!("Retired session {} for {}", id, key),
            None => println!("{} has no live session", key),
        },
    }
    Ok(())
}

pub fn delete(workspace: &Workspace, channel_id: &str, format: OutputFormat) -> Result<()> {
    let removed = workspace.store().delete_channel(channel_id)?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "deleted": removed }))?
            );
        }
        OutputFormat::Plain if removed => println!("Deleted {}", channel_id),
        OutputFormat::Plain => println!("No session for {}", channel_id),
    }
    Ok(())
}

fn print_session(key: &ConversationKey, session: &Session) {
    println!("conversation:     {}", key);
    println!(
        "session:          {}",
        session.session_id.as_deref().unwrap_or("-")
    );
    println!("working dir:      {}", session.working_dir);
    println!("mode:             {:?}", session.mode);
    if !session.previous_session_ids.is_empty() {
        println!(
            "previous:         {}",
            session.previous_session_ids.join(", ")
        );
    }
    if let Some(rate) = session.update_rate_seconds {
        println!("update rate:      {}s", rate);
    }
    if let Some(limit) = session.thread_char_limit {
        println!("char limit:       {}", limit);
    }
}
