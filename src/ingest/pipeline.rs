use crate::error::{IngestError, Stage};
use crate::ingest::{locate, normalize, reader};
use crate::logging::ndjson::RunLog;
use crate::store::BatchSink;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What one committed file contributed.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub sha256: String,
    pub actors: usize,
    pub events: usize,
    pub events_inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IngestSummary {
    pub files: usize,
    pub actors: usize,
    pub events: usize,
    pub events_inserted: usize,
    pub skipped: usize,
}

impl IngestSummary {
    fn add(&mut self, report: &FileReport) {
        self.files += 1;
        self.actors += report.actors;
        self.events += report.events;
        self.events_inserted += report.events_inserted;
        self.skipped += report.skipped;
    }
}

/// Drives files through read, normalize and write, one commit per file. The
/// first failing file stops the run.
pub struct Pipeline<S: BatchSink> {
    sink: S,
    run_log: Option<RunLog>,
}

impl<S: BatchSink> Pipeline<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            run_log: None,
        }
    }

    pub fn with_run_log(mut self, run_log: RunLog) -> Self {
        self.run_log = Some(run_log);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn ingest_dir(&mut self, root: &Path) -> Result<IngestSummary, IngestError> {
        let files = locate::locate_files(root).map_err(|source| IngestError::Locate {
            root: root.to_path_buf(),
            source,
        })?;
        self.run(&files)
    }

    pub fn run(&mut self, files: &[PathBuf]) -> Result<IngestSummary, IngestError> {
        let mut summary = IngestSummary::default();
        for path in files {
            let report = match self.ingest_file(path) {
                Ok(report) => report,
                Err(err) => {
                    tracing::error!(
                        file = %path.display(),
                        stage = ?err.stage(),
                        error = %err,
                        "ingest failed"
                    );
                    if let Some(log) = &self.run_log
                        && let Err(log_err) = log.run_failed(&err)
                    {
                        tracing::warn!(
                            log = %log.path().display(),
                            error = %log_err,
                            "could not record run_failed"
                        );
                    }
                    return Err(err);
                }
            };
            summary.add(&report);
        }

        tracing::info!(
            files = summary.files,
            actors = summary.actors,
            events = summary.events,
            events_inserted = summary.events_inserted,
            skipped = summary.skipped,
            "ingest finished"
        );
        if let Some(log) = &self.run_log {
            log.run_completed(&summary)
                .map_err(|source| run_log_error(log, source))?;
        }
        Ok(summary)
    }

    pub fn ingest_file(&mut self, path: &Path) -> Result<FileReport, IngestError> {
        let file = reader::read_json_file(path)
            .map_err(|e| IngestError::file(path, Stage::Reading, e))?;
        let batch = normalize::normalize_file(&file.value)
            .map_err(|e| IngestError::file(path, Stage::Normalizing, e))?;
        let outcome = self
            .sink
            .write_batch(&batch)
            .map_err(|e| IngestError::file(path, Stage::Writing, e))?;

        let report = FileReport {
            path: path.to_path_buf(),
            sha256: file.sha256,
            actors: outcome.actors_written,
            events: outcome.events_written,
            events_inserted: outcome.events_inserted,
            skipped: batch.skipped,
        };
        tracing::info!(
            file = %display_name(path),
            actors = report.actors,
            events = report.events,
            events_inserted = report.events_inserted,
            skipped = report.skipped,
            "committed"
        );
        if let Some(log) = &self.run_log {
            log.file_committed(&report)
                .map_err(|source| run_log_error(log, source))?;
        }
        Ok(report)
    }
}

fn run_log_error(log: &RunLog, source: std::io::Error) -> IngestError {
    IngestError::RunLog {
        path: log.path().to_path_buf(),
        source,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
