use super::*;
use mindgraph_core::{ThemeMode, Tree};
use serde_json::json;

fn sample_payload() -> SessionPayload {
    let tree = Tree::from_value(&json!({"a": 1, "b": {"c": null}}));
    SessionPayload::new(
        r#"{"a": 1, "b": {"c": null}}"#,
        tree.root(),
        UiSettings::default(),
    )
}

#[test]
fn test_session_round_trip() -> Result<(), StorageError> {
    let storage = Storage::new_in_memory()?;
    let payload = sample_payload();

    storage.save_session("jsonMindMapSession", &payload)?;
    let loaded = storage.load_session("jsonMindMapSession")?;
    assert_eq!(loaded.as_ref(), Some(&payload));

    let loaded = loaded.unwrap();
    assert_eq!(loaded.version, FORMAT_VERSION);
    assert!(loaded.saved_at().is_some());
    Ok(())
}

#[test]
fn test_deep_tree_session_round_trip() -> Result<(), StorageError> {
    let mut value = json!(1);
    for _ in 0..100 {
        value = json!([value]);
    }
    let tree = Tree::from_value(&value);
    let payload = SessionPayload::new(value.to_string(), tree.root(), UiSettings::default());

    let storage = Storage::new_in_memory()?;
    storage.save_session("deep", &payload)?;
    assert_eq!(storage.load_session("deep")?, Some(payload));
    Ok(())
}

#[test]
fn test_missing_session_is_none() -> Result<(), StorageError> {
    let storage = Storage::new_in_memory()?;
    assert!(storage.load_session("nope")?.is_none());
    assert!(!storage.clear_session("nope")?);
    Ok(())
}

#[test]
fn test_save_overwrites_and_clear_removes() -> Result<(), StorageError> {
    let storage = Storage::new_in_memory()?;
    let mut payload = sample_payload();
    storage.save_session("s", &payload)?;

    payload.input = "[]".to_string();
    payload.tree = None;
    storage.save_session("s", &payload)?;

    let count: i64 = storage
        .conn
        .query_row("SELECT count(*) FROM session", [], |row| row.get(0))?;
    assert_eq!(count, 1);
    assert_eq!(storage.load_session("s")?.unwrap().input, "[]");

    assert!(storage.clear_session("s")?);
    assert!(storage.load_session("s")?.is_none());
    Ok(())
}

#[test]
fn test_session_keys_newest_first() -> Result<(), StorageError> {
    let storage = Storage::new_in_memory()?;
    let mut payload = sample_payload();
    payload.timestamp = 1_000;
    storage.save_session("old", &payload)?;
    payload.timestamp = 2_000;
    storage.save_session("new", &payload)?;

    assert_eq!(storage.session_keys()?, vec!["new", "old"]);
    Ok(())
}

#[test]
fn test_corrupt_payload_is_an_error() -> Result<(), StorageError> {
    let storage = Storage::new_in_memory()?;
    storage.conn.execute(
        "INSERT INTO session (key, payload, saved_at) VALUES ('bad', 'not json', 0)",
        [],
    )?;
    assert!(matches!(
        storage.load_session("bad"),
        Err(StorageError::Serialization(_))
    ));
    Ok(())
}

#[test]
fn test_settings_round_trip() -> Result<(), StorageError> {
    let storage = Storage::new_in_memory()?;
    assert!(storage.load_settings("settings")?.is_none());

    let settings = UiSettings {
        theme: ThemeMode::Dark,
        grid: true,
        ..Default::default()
    };
    storage.save_settings("settings", &settings)?;
    assert_eq!(storage.load_settings("settings")?, Some(settings));
    Ok(())
}

#[test]
fn test_on_disk_database_persists() -> Result<(), StorageError> {
    let dir = tempfile::tempdir().map_err(|e| StorageError::Other(e.to_string()))?;
    let path = dir.path().join("mindgraph.db");
    let payload = sample_payload();

    {
        let storage = Storage::open(&path)?;
        storage.save_session("disk", &payload)?;
    }

    let storage = Storage::open(&path)?;
    assert_eq!(storage.load_session("disk")?, Some(payload));
    assert_eq!(storage.schema_version()?, SCHEMA_VERSION);
    Ok(())
}

#[test]
fn test_newer_schema_is_rejected() -> Result<(), StorageError> {
    let dir = tempfile::tempdir().map_err(|e| StorageError::Other(e.to_string()))?;
    let path = dir.path().join("future.db");
    {
        let storage = Storage::open(&path)?;
        storage.set_schema_version(SCHEMA_VERSION + 1)?;
    }
    assert!(matches!(Storage::open(&path), Err(StorageError::Other(_))));
    Ok(())
}
