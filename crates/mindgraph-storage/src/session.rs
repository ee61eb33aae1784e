use super::*;

pub(super) fn save_session(
    conn: &Connection,
    key: &str,
    payload: &SessionPayload,
) -> Result<(), StorageError> {
    let encoded = serde_json::to_string(payload)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO session (key, payload, saved_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, saved_at = excluded.saved_at",
        params![key, encoded, payload.timestamp],
    )?;
    tx.commit()?;
    tracing::debug!("Saved session {key} ({} bytes)", encoded.len());
    Ok(())
}

pub(super) fn load_session(
    conn: &Connection,
    key: &str,
) -> Result<Option<SessionPayload>, StorageError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT payload FROM session WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;

    let Some(raw) = raw else {
        return Ok(None);
    };
    let payload: SessionPayload = serde_json::from_str(&raw)?;
    if payload.version != FORMAT_VERSION {
        tracing::warn!(
            "Session {key} was written with format {} (current {FORMAT_VERSION})",
            payload.version
        );
    }
    Ok(Some(payload))
}

pub(super) fn clear_session(conn: &Connection, key: &str) -> Result<bool, StorageError> {
    let removed = conn.execute("DELETE FROM session WHERE key = ?1", params![key])?;
    Ok(removed > 0)
}

pub(super) fn session_keys(conn: &Connection) -> Result<Vec<String>, StorageError> {
    let mut stmt = conn.prepare("SELECT key FROM session ORDER BY saved_at DESC, key")?;
    let keys = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(keys)
}
