use forkline_runtime::{ActivityBatcher, TurnState, WatchSettings};
use forkline_testing::{SurfaceOp, TestWorld};
use forkline_transcript::ContentBlock;
use forkline_types::{ActivityKind, ConversationKey};
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

fn settings() -> WatchSettings {
    WatchSettings {
        poll_interval: Duration::from_secs(1),
        min_update_interval: Duration::from_secs(2),
        flush_interval: Duration::from_secs(5),
        thread_char_limit: 500,
        message_char_limit: 3_000,
        upload_char_limit: 12_000,
    }
}

fn thinking(text: &str) -> Vec<ContentBlock> {
    vec![ContentBlock::Thinking {
        thinking: text.to_string(),
    }]
}

fn tool_use(id: &str, name: &str) -> Vec<ContentBlock> {
    vec![ContentBlock::ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input: json!({"file_path": "/src/lib.rs"}),
    }]
}

fn tool_result(id: &str) -> Vec<ContentBlock> {
    vec![ContentBlock::ToolResult {
        tool_use_id: id.to_string(),
        content: None,
        is_error: Some(false),
    }]
}

#[tokio::test(start_paused = true)]
async fn test_twenty_deltas_in_one_window_produce_one_update() {
    let world = TestWorld::new();
    let delivery = world.delivery();
    let mut batcher = ActivityBatcher::new(ConversationKey::channel("C1"), settings());

    batcher.ingest(&thinking("start"), 0, Instant::now());
    batcher.apply_updates(&delivery, Instant::now()).await;
    assert_eq!(world.surface().posts().len(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    for i in 0..20 {
        batcher.ingest(&thinking(&format!("delta {i}")), 0, Instant::now());
        batcher.apply_updates(&delivery, Instant::now()).await;
        tokio::time::advance(Duration::from_millis(50)).await;
    }
    batcher.wait_in_flight().await;
    assert_eq!(world.surface().updates().len(), 1);

    // Coalesced deltas go out once the window reopens
    tokio::time::advance(Duration::from_secs(2)).await;
    batcher.apply_updates(&delivery, Instant::now()).await;
    batcher.wait_in_flight().await;

    let updates = world.surface().updates();
    assert_eq!(updates.len(), 2);
    assert!(updates[1].1.contains("delta 19"));
    assert_eq!(world.surface().posts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tool_result_updates_newest_batch_in_place() {
    let world = TestWorld::new();
    let delivery = world.delivery();
    let mut batcher = ActivityBatcher::new(ConversationKey::channel("C1"), settings());

    batcher.ingest(&tool_use("t1", "Read"), 0, Instant::now());
    batcher.ingest(&tool_use("t2", "Edit"), 0, Instant::now());
    batcher.flush_all(&delivery, Instant::now()).await;

    let posts = world.surface().posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].1, "… *Read* `/src/lib.rs`\n… *Edit* `/src/lib.rs`");
    let batch_ts = posts[0].0.clone();

    batcher.ingest(&tool_result("t1"), 1_500, Instant::now());
    tokio::time::advance(Duration::from_secs(2)).await;
    batcher.apply_updates(&delivery, Instant::now()).await;

    let updates = world.surface().updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, batch_ts);
    assert!(updates[0].1.starts_with("✓ *Read* `/src/lib.rs` (1.5s)"));

    // A newer batch supersedes the first one
    batcher.ingest(&tool_use("t3", "Grep"), 2_000, Instant::now());
    batcher.flush_all(&delivery, Instant::now()).await;
    assert_eq!(batcher.posted_batches(), 2);

    batcher.ingest(&tool_result("t2"), 3_000, Instant::now());
    tokio::time::advance(Duration::from_secs(2)).await;
    batcher.apply_updates(&delivery, Instant::now()).await;
    batcher.flush_all(&delivery, Instant::now()).await;

    assert_eq!(world.surface().updates().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_update_lands_before_finalization() {
    let world = TestWorld::new();
    let delivery = world.delivery();
    let mut batcher = ActivityBatcher::new(
        ConversationKey::channel("C1"),
        WatchSettings {
            thread_char_limit: 20,
            ..settings()
        },
    );
    world.surface().set_update_delay(Duration::from_millis(500));

    batcher.ingest(&thinking("short"), 0, Instant::now());
    batcher.apply_updates(&delivery, Instant::now()).await;
    let rolling_ts = world.surface().posts()[0].0.clone();

    tokio::time::advance(Duration::from_secs(2)).await;
    batcher.ingest(&thinking("a much longer continuation"), 0, Instant::now());
    batcher.apply_updates(&delivery, Instant::now()).await;

    // Finalization starts while the update is still in flight
    batcher.flush_all(&delivery, Instant::now()).await;

    let ops = world.surface().ops();
    let update_at = ops
        .iter()
        .position(|op| matches!(op, SurfaceOp::Update { ts, .. } if *ts == rolling_ts))
        .expect("rolling update recorded");
    let delete_at = ops
        .iter()
        .position(|op| matches!(op, SurfaceOp::Delete { ts, .. } if *ts == rolling_ts))
        .expect("rolling message deleted");
    assert!(update_at < delete_at);

    let uploads = world.surface().uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].1, "short\n\na much longer continuation");
}

#[tokio::test(start_paused = true)]
async fn test_periodic_tick_flushes_waiting_tools() {
    let world = TestWorld::new();
    let delivery = world.delivery();
    let mut batcher = ActivityBatcher::new(ConversationKey::channel("C1"), settings());
    let start = Instant::now();

    batcher.ingest(&tool_use("t1", "Read"), 0, start);
    assert_eq!(batcher.state(), TurnState::AccumulatingTurn);

    batcher.tick(&delivery, start + Duration::from_secs(1)).await;
    assert!(world.surface().posts().is_empty());
    assert_eq!(batcher.pending().len(), 1);

    batcher.tick(&delivery, start + Duration::from_secs(5)).await;
    assert_eq!(world.surface().posts().len(), 1);
    assert!(batcher.pending().is_empty());

    batcher.end_turn(10_000, 42);
    assert_eq!(batcher.state(), TurnState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_flushed_entries_carry_message_link() {
    let world = TestWorld::new();
    let delivery = world.delivery();
    let mut batcher = ActivityBatcher::new(ConversationKey::channel("C1"), settings());

    batcher.ingest(&tool_use("t1", "Read"), 0, Instant::now());
    batcher.flush_all(&delivery, Instant::now()).await;
    batcher.end_turn(1_000, 5);

    let logged = batcher.take_logged();
    let kinds: Vec<_> = logged.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ActivityKind::Starting,
            ActivityKind::ToolStart,
            ActivityKind::Generating
        ]
    );

    let ts = world.surface().posts()[0].0.clone();
    assert_eq!(logged[1].thread_message_ts.as_deref(), Some(ts.as_str()));
    assert_eq!(
        logged[1].thread_message_link,
        Some(format!("https://surface.test/C1/{}", ts))
    );
    assert!(batcher.take_logged().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_is_dropped() {
    let world = TestWorld::new();
    let delivery = world.delivery();
    let mut batcher = ActivityBatcher::new(ConversationKey::channel("C1"), settings());
    world.surface().fail_next_posts(1);

    batcher.ingest(&tool_use("t1", "Read"), 0, Instant::now());
    batcher.flush_all(&delivery, Instant::now()).await;
    assert!(batcher.pending().is_empty());
    assert_eq!(batcher.posted_batches(), 0);

    batcher.flush_all(&delivery, Instant::now()).await;
    assert!(world.surface().posts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_discarded_turn_posts_nothing() {
    let world = TestWorld::new();
    let delivery = world.delivery();
    let mut batcher = ActivityBatcher::new(ConversationKey::channel("C1"), settings());

    batcher.ingest(&thinking("old thoughts"), 0, Instant::now());
    batcher.ingest(&tool_use("t1", "Read"), 0, Instant::now());
    batcher.discard_turn();
    batcher.flush_all(&delivery, Instant::now()).await;

    assert_eq!(batcher.state(), TurnState::Idle);
    assert!(world.surface().ops().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_running_batch_outlives_turn_end() {
    let world = TestWorld::new();
    let delivery = world.delivery();
    let mut batcher = ActivityBatcher::new(ConversationKey::channel("C1"), settings());

    batcher.ingest(&tool_use("t1", "Bash"), 0, Instant::now());
    batcher.flush_all(&delivery, Instant::now()).await;
    batcher.end_turn(500, 10);
    assert_eq!(batcher.posted_batches(), 1);

    batcher.ingest(&tool_result("t1"), 2_000, Instant::now());
    tokio::time::advance(Duration::from_secs(2)).await;
    batcher.apply_updates(&delivery, Instant::now()).await;

    let updates = world.surface().updates();
    assert_eq!(updates.len(), 1);
    assert!(updates[0].1.starts_with("✓ *Bash*"));

    // Nothing left running: the next turn end releases it
    batcher.end_turn(3_000, 10);
    assert_eq!(batcher.posted_batches(), 0);
}
