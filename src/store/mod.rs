pub mod schema;
pub mod sqlite;

use crate::error::PersistenceError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRow {
    pub id: i64,
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRow {
    pub id: String,
    pub event_type: String,
    pub actor_id: i64,
}

/// Rows admitted from one input file, in record order.
#[derive(Debug, Clone, Default)]
pub struct FileBatch {
    pub actors: Vec<ActorRow>,
    pub events: Vec<EventRow>,
    pub skipped: usize,
}

impl FileBatch {
    pub fn push(&mut self, actor: ActorRow, event: EventRow) {
        self.actors.push(actor);
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty() && self.events.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub actors_written: usize,
    pub events_written: usize,
    /// Events that did not already exist in the store.
    pub events_inserted: usize,
}

/// Destination for per-file batches. One call is one unit of work: either every
/// row in the batch is committed or none is.
pub trait BatchSink {
    fn write_batch(&mut self, batch: &FileBatch) -> Result<WriteOutcome, PersistenceError>;
}
