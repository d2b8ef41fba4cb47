//! Loading documents written by older versions, or damaged ones

use forkline_store::{Result, SessionPatch, Store};
use forkline_types::MappingEntry;
use tempfile::TempDir;

#[test]
fn test_malformed_file_loads_as_empty_store() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("sessions.json");
    std::fs::write(&path, "{\"channels\": {\"C1\": ")?;

    let store = Store::open(&path);
    assert!(store.load().channels.is_empty());
    assert_eq!(store.find_fork_point("C1", "1.0"), None);

    // The store stays usable
    store.save_session("C1", SessionPatch::session_id("S1"))?;
    assert_eq!(
        store.get_session("C1").unwrap().session_id.as_deref(),
        Some("S1")
    );
    Ok(())
}

#[test]
fn test_legacy_document_is_migrated_and_keeps_history() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("sessions.json");
    std::fs::write(
        &path,
        r#"{
          "channels": {
            "C1": {
              "sessionId": null,
              "cwd": "/legacy",
              "previousSessionIds": ["S1"],
              "messageMap": {
                "1.0": {"sdkMessageId": "A", "sessionId": "S1", "type": "assistant"}
              }
            },
            "C2": { "sessionId": "S7" }
          }
        }"#,
    )?;

    let store = Store::open(&path);
    let c1 = store.get_channel("C1").unwrap();
    assert_eq!(c1.session.working_dir, "/legacy");
    assert_eq!(store.find_fork_point("C1", "1.0").unwrap().session_id, "S1");

    let c2 = store.get_channel("C2").unwrap();
    assert!(c2.message_map.is_empty());
    assert!(c2.session.previous_session_ids.is_empty());

    // First write persists the migrated shape
    store.record_message("C2", "5.0", MappingEntry::user("U", "S7"))?;
    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(raw["channels"]["C1"]["workingDir"], "/legacy");
    assert_eq!(raw["channels"]["C2"]["mode"], "default");
    Ok(())
}
