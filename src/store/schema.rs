use rusqlite::{Connection, Result};

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS actors (
            id INTEGER PRIMARY KEY,
            login TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            type TEXT NOT NULL,
            actor_id INTEGER NOT NULL REFERENCES actors(id)
        );

        CREATE INDEX IF NOT EXISTS idx_events_actor ON events(actor_id);
        ",
    )?;

    Ok(())
}
