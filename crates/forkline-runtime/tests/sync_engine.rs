use anyhow::Result;
use forkline_runtime::{TickReport, WatchSettings, WatchState};
use forkline_testing::{TestWorld, TranscriptWriter};
use forkline_transcript::read_new;
use forkline_types::{ActivityKind, ConversationKey, MessageKind};
use serde_json::json;
use tokio::time::Instant;

fn watch(transcript: &TranscriptWriter, key: ConversationKey, settings: WatchSettings) -> WatchState {
    WatchState::new(key, transcript.path().to_path_buf(), None, 0, settings)
}

async fn sync(world: &TestWorld, state: &mut WatchState) -> Result<TickReport> {
    let batch = read_new(&state.transcript, state.file_offset)?;
    Ok(world.engine().process(state, batch, Instant::now()).await)
}

#[tokio::test]
async fn test_mirrors_prompt_activity_and_reply_in_order() -> Result<()> {
    let world = TestWorld::new();
    let mut transcript = world.transcript("S1");
    let prompt_id = transcript.user("fix the build")?;
    let (_, tool_id) = transcript.tool_use("Bash", json!({"command": "cargo build"}))?;
    transcript.tool_result(&tool_id, false)?;
    let reply_id = transcript.assistant_text("Fixed it.")?;
    transcript.summary("build fix")?;

    let mut state = watch(&transcript, ConversationKey::channel("C1"), WatchSettings::default());
    let report = sync(&world, &mut state).await?;

    assert_eq!(report.posted, 2);
    assert_eq!(report.ingested, 2);
    assert!(!report.failed);
    assert_eq!(state.file_offset, std::fs::metadata(transcript.path())?.len());

    let posts = world.surface().posts();
    assert_eq!(posts.len(), 3);
    assert_eq!(posts[0].1, "*User:* fix the build");
    assert!(posts[1].1.starts_with("✓ *Bash* `cargo build`"));
    assert_eq!(posts[2].1, "Fixed it.");

    let channel = world.store().get_channel("C1").expect("channel created");
    assert_eq!(channel.message_map.len(), 2);

    let prompt = &channel.message_map[&posts[0].0];
    assert_eq!(prompt.kind, MessageKind::User);
    assert_eq!(prompt.sdk_message_id, prompt_id);
    assert_eq!(prompt.session_id, "S1");

    let reply = &channel.message_map[&posts[2].0];
    assert_eq!(reply.kind, MessageKind::Assistant);
    assert_eq!(reply.sdk_message_id, reply_id);
    assert_eq!(
        reply.permalink,
        Some(format!("https://surface.test/C1/{}", posts[2].0))
    );
    Ok(())
}

#[tokio::test]
async fn test_replay_skips_synced_records() -> Result<()> {
    let world = TestWorld::new();
    let mut transcript = world.transcript("S1");
    transcript.user("hello")?;
    transcript.tool_use("Read", json!({"file_path": "/a.rs"}))?;
    transcript.assistant_text("hi")?;

    let mut first = watch(&transcript, ConversationKey::channel("C1"), WatchSettings::default());
    sync(&world, &mut first).await?;
    let posted = world.surface().posts().len();

    let mut replay = watch(&transcript, ConversationKey::channel("C1"), WatchSettings::default());
    let report = sync(&world, &mut replay).await?;

    assert_eq!(report.posted, 0);
    assert_eq!(report.skipped_synced, 2);
    assert_eq!(world.surface().posts().len(), posted);
    Ok(())
}

#[tokio::test]
async fn test_failed_post_is_retried_without_duplicates() -> Result<()> {
    let world = TestWorld::new();
    let mut transcript = world.transcript("S1");
    let mut state = watch(&transcript, ConversationKey::channel("C1"), WatchSettings::default());

    transcript.user("one")?;
    sync(&world, &mut state).await?;
    let resume_at = state.file_offset;

    let two = transcript.user("two")?;
    transcript.assistant_text("three")?;
    world.surface().fail_next_posts(1);

    let report = sync(&world, &mut state).await?;
    assert!(report.failed);
    assert_eq!(report.posted, 0);
    assert_eq!(state.file_offset, resume_at);
    assert!(!world.store().is_synced("C1", &two));

    let report = sync(&world, &mut state).await?;
    assert!(!report.failed);
    assert_eq!(report.posted, 2);

    let contents: Vec<_> = world.surface().posts().into_iter().map(|(_, c)| c).collect();
    assert_eq!(contents, vec!["*User:* one", "*User:* two", "three"]);
    assert!(world.store().is_synced("C1", &two));
    Ok(())
}

#[tokio::test]
async fn test_long_reply_is_split_into_continuations() -> Result<()> {
    let world = TestWorld::new();
    let mut transcript = world.transcript("S1");
    let reply_id = transcript.assistant_text("alpha beta gamma delta")?;

    let settings = WatchSettings {
        message_char_limit: 10,
        ..WatchSettings::default()
    };
    let mut state = watch(&transcript, ConversationKey::channel("C1"), settings);
    let report = sync(&world, &mut state).await?;
    assert_eq!(report.posted, 1);

    let posts = world.surface().posts();
    let contents: Vec<_> = posts.iter().map(|(_, c)| c.as_str()).collect();
    assert_eq!(contents, vec!["alpha beta", "gamma", "delta"]);

    let channel = world.store().get_channel("C1").expect("channel created");
    let parts: Vec<_> = posts.iter().map(|(ts, _)| &channel.message_map[ts]).collect();
    assert!(parts.iter().all(|e| e.sdk_message_id == reply_id));
    assert!(!parts[0].is_continuation);
    assert!(parts[1].is_continuation && parts[2].is_continuation);

    let first = world.store().find_fork_point("C1", &posts[0].0);
    assert!(first.is_some());
    for (ts, _) in &posts[1..] {
        assert_eq!(world.store().find_fork_point("C1", ts), first);
    }
    Ok(())
}

#[tokio::test]
async fn test_reply_over_threshold_is_uploaded() -> Result<()> {
    let world = TestWorld::new();
    let mut transcript = world.transcript("S1");
    let reply_id = transcript.assistant_text("a reply that is far too long to inline")?;

    let settings = WatchSettings {
        upload_char_limit: 10,
        ..WatchSettings::default()
    };
    let mut state = watch(&transcript, ConversationKey::channel("C1"), settings);
    sync(&world, &mut state).await?;

    assert!(world.surface().posts().is_empty());
    let uploads = world.surface().uploads();
    assert_eq!(uploads.len(), 1);

    let entry = world
        .store()
        .get_channel("C1")
        .and_then(|c| c.message_map.get(&uploads[0].0).cloned())
        .expect("upload mapped");
    assert_eq!(entry.sdk_message_id, reply_id);
    Ok(())
}

#[tokio::test]
async fn test_thread_conversation_posts_into_thread() -> Result<()> {
    let world = TestWorld::new();
    let mut transcript = world.transcript("S2");
    transcript.user("branch here")?;

    let key = ConversationKey::thread("C1", "1699999999.000100");
    let mut state = watch(&transcript, key, WatchSettings::default());
    sync(&world, &mut state).await?;

    let ops = world.surface().ops();
    assert!(matches!(
        &ops[0],
        forkline_testing::SurfaceOp::Post { thread_ts: Some(ts), .. } if ts == "1699999999.000100"
    ));

    let channel = world.store().get_channel("C1").expect("channel created");
    let entry = channel.message_map.values().next().expect("entry recorded");
    assert_eq!(entry.parent_slack_ts.as_deref(), Some("1699999999.000100"));
    assert_eq!(entry.session_id, "S2");
    Ok(())
}

#[tokio::test]
async fn test_partial_trailing_line_waits_for_completion() -> Result<()> {
    let world = TestWorld::new();
    let mut transcript = world.transcript("S1");
    transcript.user("first")?;
    let first_end = std::fs::metadata(transcript.path())?.len();

    let (_, line) = transcript.render_line("user", json!("second"));
    let (head, tail) = line.split_at(line.len() / 2);
    transcript.append_raw(head)?;

    let mut state = watch(&transcript, ConversationKey::channel("C1"), WatchSettings::default());
    let report = sync(&world, &mut state).await?;
    assert_eq!(report.posted, 1);
    assert_eq!(state.file_offset, first_end);

    transcript.append_raw(tail)?;
    let report = sync(&world, &mut state).await?;
    assert_eq!(report.posted, 1);
    assert_eq!(world.surface().posts()[1].1, "*User:* second");
    Ok(())
}

#[tokio::test]
async fn test_flushed_activity_is_logged() -> Result<()> {
    let world = TestWorld::new();
    let mut transcript = world.transcript("S1");
    let (_, tool_id) = transcript.tool_use("Read", json!({"file_path": "/a.rs"}))?;
    transcript.tool_result(&tool_id, true)?;
    transcript.assistant_text("done")?;

    let key = ConversationKey::channel("C1");
    let mut state = watch(&transcript, key.clone(), WatchSettings::default());
    sync(&world, &mut state).await?;

    let entries = world.activity_log().read(&key)?;
    let kinds: Vec<_> = entries.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ActivityKind::Starting,
            ActivityKind::ToolComplete,
            ActivityKind::Generating
        ]
    );
    assert!(entries[1].is_error);
    Ok(())
}

#[tokio::test]
async fn test_long_reply_splits_with_default_settings() -> Result<()> {
    let world = TestWorld::new();
    let mut transcript = world.transcript("S1");
    let reply = vec!["word"; 1_000].join(" ");
    let reply_id = transcript.assistant_text(&reply)?;

    let mut state = watch(&transcript, ConversationKey::channel("C1"), WatchSettings::default());
    let report = sync(&world, &mut state).await?;
    assert_eq!(report.posted, 1);
    assert!(world.surface().uploads().is_empty());

    let posts = world.surface().posts();
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|(_, c)| c.chars().count() <= 3_000));
    assert_eq!(
        posts.iter().map(|(_, c)| c.as_str()).collect::<Vec<_>>().join(" "),
        reply
    );

    let channel = world.store().get_channel("C1").expect("channel created");
    let first = &channel.message_map[&posts[0].0];
    let second = &channel.message_map[&posts[1].0];
    assert!(!first.is_continuation);
    assert!(second.is_continuation);
    assert_eq!(second.sdk_message_id, reply_id);
    Ok(())
}

#[tokio::test]
async fn test_record_without_session_id_is_not_mapped() -> Result<()> {
    let world = TestWorld::new();
    let transcript = world.transcript("S1");
    transcript.append_value(&json!({
        "type": "assistant",
        "uuid": "a-orphan",
        "message": {"content": [{"type": "text", "text": "no lineage"}]}
    }))?;

    let mut state = watch(&transcript, ConversationKey::channel("C1"), WatchSettings::default());
    let report = sync(&world, &mut state).await?;

    assert!(!report.failed);
    assert_eq!(world.surface().posts().len(), 1);
    let mapped = world
        .store()
        .get_channel("C1")
        .map_or(0, |c| c.message_map.len());
    assert_eq!(mapped, 0);
    Ok(())
}

#[tokio::test]
async fn test_text_is_posted_before_tools_that_follow_it() -> Result<()> {
    let world = TestWorld::new();
    let mut transcript = world.transcript("S1");
    transcript.assistant_blocks(json!([
        {"type": "text", "text": "Let me check."},
        {"type": "tool_use", "id": "toolu_late", "name": "Read", "input": {"file_path": "/a.rs"}}
    ]))?;
    transcript.tool_result("toolu_late", false)?;
    transcript.assistant_text("All good.")?;

    let mut state = watch(&transcript, ConversationKey::channel("C1"), WatchSettings::default());
    sync(&world, &mut state).await?;

    let contents: Vec<_> = world.surface().posts().into_iter().map(|(_, c)| c).collect();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0], "Let me check.");
    assert!(contents[1].starts_with("✓ *Read* `/a.rs`"));
    assert_eq!(contents[2], "All good.");
    Ok(())
}
