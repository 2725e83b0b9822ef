use crate::error::PersistenceError;
use crate::store::{ActorRow, BatchSink, EventRow, FileBatch, WriteOutcome, schema};
use anyhow::{Context, Result};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use std::path::Path;

pub const DEFAULT_PAGE_SIZE: usize = 1000;
/// Keeps `page_size * 3` bound parameters under SQLite's variable limit.
pub const MAX_PAGE_SIZE: usize = 10_000;

pub struct SqliteStore {
    conn: Connection,
    page_size: usize,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db parent dir {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| PersistenceError::new("open", e))
            .with_context(|| format!("open sqlite db {}", path.display()))?;
        schema::migrate(&conn)
            .map_err(|e| PersistenceError::new("schema", e))
            .with_context(|| format!("prepare sqlite db {}", path.display()))?;
        Ok(Self {
            conn,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn count_actors(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM actors", [], |row| row.get(0))
            .map_err(Into::into)
    }

    pub fn count_events(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Events whose actor row is missing. Zero while foreign keys are enforced.
    pub fn count_orphan_events(&self) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM events e LEFT JOIN actors a ON a.id = e.actor_id
                 WHERE a.id IS NULL",
                [],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn get_actor(&self, id: i64) -> Result<Option<ActorRow>> {
        self.conn
            .query_row(
                "SELECT id, login FROM actors WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ActorRow {
                        id: row.get(0)?,
                        login: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn get_event(&self, id: &str) -> Result<Option<EventRow>> {
        self.conn
            .query_row(
                "SELECT id, type, actor_id FROM events WHERE id = ?1",
                params![id],
                |row| {
                    Ok(EventRow {
                        id: row.get(0)?,
                        event_type: row.get(1)?,
                        actor_id: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn list_events(&self) -> Result<Vec<EventRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, type, actor_id FROM events ORDER BY id ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(EventRow {
                    id: row.get(0)?,
                    event_type: row.get(1)?,
                    actor_id: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_actors(&self) -> Result<Vec<ActorRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, login FROM actors ORDER BY id ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ActorRow {
                    id: row.get(0)?,
                    login: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl BatchSink for SqliteStore {
    fn write_batch(&mut self, batch: &FileBatch) -> Result<WriteOutcome, PersistenceError> {
        if batch.is_empty() {
            return Ok(WriteOutcome::default());
        }
        let page_size = self.page_size;
        let tx = self
            .conn
            .transaction()
            .map_err(|e| PersistenceError::new("begin", e))?;

        // Actors go first so every event's actor_id resolves inside the transaction.
        if !batch.actors.is_empty() {
            upsert_actors(&tx, &batch.actors, page_size)
                .map_err(|e| PersistenceError::new("upsert actors", e))?;
        }
        let events_inserted = if batch.events.is_empty() {
            0
        } else {
            insert_events(&tx, &batch.events, page_size)
                .map_err(|e| PersistenceError::new("upsert events", e))?
        };

        tx.commit().map_err(|e| PersistenceError::new("commit", e))?;
        Ok(WriteOutcome {
            actors_written: batch.actors.len(),
            events_written: batch.events.len(),
            events_inserted,
        })
    }
}

fn values_clause(rows: usize, columns: usize) -> String {
    let row = format!("({})", vec!["?"; columns].join(", "));
    vec![row; rows].join(", ")
}

fn upsert_actors(
    tx: &Transaction<'_>,
    rows: &[ActorRow],
    page_size: usize,
) -> rusqlite::Result<()> {
    for page in rows.chunks(page_size) {
        let sql = format!(
            "INSERT INTO actors (id, login) VALUES {}
             ON CONFLICT(id) DO UPDATE SET login = excluded.login",
            values_clause(page.len(), 2)
        );
        let mut stmt = tx.prepare_cached(&sql)?;
        let values = page
            .iter()
            .flat_map(|r| [&r.id as &dyn ToSql, &r.login as &dyn ToSql]);
        stmt.execute(params_from_iter(values))?;
    }
    Ok(())
}

fn insert_events(
    tx: &Transaction<'_>,
    rows: &[EventRow],
    page_size: usize,
) -> rusqlite::Result<usize> {
    let mut inserted = 0;
    for page in rows.chunks(page_size) {
        let sql = format!(
            "INSERT INTO events (id, type, actor_id) VALUES {}
             ON CONFLICT(id) DO NOTHING",
            values_clause(page.len(), 3)
        );
        let mut stmt = tx.prepare_cached(&sql)?;
        let values = page.iter().flat_map(|r| {
            [
                &r.id as &dyn ToSql,
                &r.event_type as &dyn ToSql,
                &r.actor_id as &dyn ToSql,
            ]
        });
        inserted += stmt.execute(params_from_iter(values))?;
    }
    Ok(inserted)
}
