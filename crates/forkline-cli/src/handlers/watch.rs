use crate::console::ConsoleSurface;
use anyhow::{Context, Result, bail};
use forkline_runtime::{Delivery, SyncEngine, WatchRequest, WatchScheduler, Workspace};
use forkline_store::{SessionPatch, Store};
use forkline_transcript::{find_transcript, transcript_path};
use forkline_types::ConversationKey;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct WatchArgs {
    pub key: ConversationKey,
    pub session_id: Option<String>,
    pub transcript: Option<PathBuf>,
    pub working_dir: Option<String>,
    pub from_beginning: bool,
}

pub fn handle(workspace: Workspace, args: WatchArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(watch(workspace, args))
}

async fn watch(workspace: Workspace, args: WatchArgs) -> Result<()> {
    let store = Arc::new(workspace.store());

    if args.session_id.is_some() || args.working_dir.is_some() {
        let patch = SessionPatch {
            session_id: args.session_id.clone().map(Some),
            working_dir: args.working_dir.clone(),
            ..Default::default()
        };
        match &args.key.thread_ts {
            Some(ts) => {
                store.save_thread_session(&args.key.channel_id, ts, patch)?;
            }
            None => {
                store.save_session(&args.key.channel_id, patch)?;
            }
        }
    }

    let transcript = match args.transcript {
        Some(path) => path,
        None => locate_transcript(&store, &args.key, &workspace.config.transcripts_root())?,
    };

    let console = Arc::new(ConsoleSurface::new(workspace.data_dir.join("attachments")));
    let delivery = Delivery::new(
        console.clone(),
        console,
        workspace.config.workspace_url.clone(),
    );
    let engine = SyncEngine::new(store, workspace.activity_log(), delivery);
    let scheduler = WatchScheduler::new(Arc::new(engine), workspace.config.clone());

    let mut request = WatchRequest::new(args.key.clone(), transcript.clone());
    if args.from_beginning {
        request = request.from_beginning();
    }
    scheduler.start_watch(request)?;

    eprintln!(
        "Watching {} for {} (Ctrl+C to stop)",
        transcript.display(),
        args.key
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    scheduler.stop_all();
    tracing::info!(conversation = %args.key, "watch stopped");
    Ok(())
}

/// Transcript of the conversation's live session: the expected project path
/// when it exists, otherwise a search of the transcripts root. A transcript
/// that does not exist yet is watched at its expected path.
fn locate_transcript(store: &Store, key: &ConversationKey, root: &Path) -> Result<PathBuf> {
    let Some(session) = store.get_conversation_session(key) else {
        bail!("No session for {}; pass --session-id or --transcript", key);
    };
    let Some(session_id) = session.session_id else {
        bail!("{} has no live session; pass --session-id or --transcript", key);
    };

    let expected = (!session.working_dir.is_empty())
        .then(|| transcript_path(root, &session.working_dir, &session_id));
    if let Some(path) = &expected
        && path.exists()
    {
        return Ok(path.clone());
    }

    if let Some(found) = find_transcript(root, &session_id)? {
        return Ok(found);
    }

    match expected {
        Some(path) => Ok(path),
        None => bail!(
            "Transcript for session {} not found under {}",
            session_id,
            root.display()
        ),
    }
}
