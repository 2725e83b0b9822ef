use crate::error::IngestError;
use crate::ingest::pipeline::{FileReport, IngestSummary};
use chrono::Utc;
use serde_json::{Value, json};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Append-only NDJSON record of one invocation: a line per committed file,
/// then a terminal `run_completed` or `run_failed` line.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
    run_id: String,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn file_committed(&self, report: &FileReport) -> io::Result<()> {
        self.append(json!({
            "event": "file_committed",
            "file": report.path,
            "sha256": report.sha256,
            "actors": report.actors,
            "events": report.events,
            "events_inserted": report.events_inserted,
            "skipped": report.skipped
        }))
    }

    pub fn run_completed(&self, summary: &IngestSummary) -> io::Result<()> {
        self.append(json!({
            "event": "run_completed",
            "files": summary.files,
            "actors": summary.actors,
            "events": summary.events,
            "events_inserted": summary.events_inserted,
            "skipped": summary.skipped
        }))
    }

    pub fn run_failed(&self, err: &IngestError) -> io::Result<()> {
        let (file, stage) = match err {
            IngestError::File { path, stage, .. } => {
                (Some(path.display().to_string()), Some(stage.to_string()))
            }
            _ => (None, None),
        };
        self.append(json!({
            "event": "run_failed",
            "file": file,
            "stage": stage,
            "error": err.to_string()
        }))
    }

    fn append(&self, mut line: Value) -> io::Result<()> {
        if let Some(obj) = line.as_object_mut() {
            obj.insert("ts".to_string(), json!(Utc::now().to_rfc3339()));
            obj.insert("run_id".to_string(), json!(self.run_id));
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(f, "{}", line)?;
        Ok(())
    }
}
