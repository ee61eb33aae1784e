use super::*;

pub(super) fn save_settings(
    conn: &Connection,
    key: &str,
    settings: &UiSettings,
) -> Result<(), StorageError> {
    let encoded = serde_json::to_string(settings)?;
    conn.execute(
        "INSERT INTO settings (key, payload) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET payload = excluded.payload",
        params![key, encoded],
    )?;
    Ok(())
}

pub(super) fn load_settings(conn: &Connection, key: &str) -> Result<Option<UiSettings>, StorageError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT payload FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}
