use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A file's bytes could not be turned into usable records.
#[derive(Debug, Error)]
pub enum MalformedInput {
    #[error("read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decode {path:?} as utf-8: {source}")]
    Utf8 {
        path: PathBuf,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("parse {path:?} as json: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("actor id for event '{event_id}' is not an integer: {raw}")]
    ActorId { event_id: String, raw: String },
}

#[derive(Debug, Error)]
#[error("{op}: {source}")]
pub struct PersistenceError {
    pub op: &'static str,
    #[source]
    pub source: rusqlite::Error,
}

impl PersistenceError {
    pub fn new(op: &'static str, source: rusqlite::Error) -> Self {
        Self { op, source }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Reading,
    Normalizing,
    Writing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Reading => "reading",
            Stage::Normalizing => "normalizing",
            Stage::Writing => "writing",
        })
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Malformed(#[from] MalformedInput),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("list input files under {root:?}: {source}")]
    Locate {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} {path:?} failed: {source}")]
    File {
        path: PathBuf,
        stage: Stage,
        #[source]
        source: StageError,
    },
    #[error("append run log {path:?}: {source}")]
    RunLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    pub fn file(path: impl Into<PathBuf>, stage: Stage, source: impl Into<StageError>) -> Self {
        IngestError::File {
            path: path.into(),
            stage,
            source: source.into(),
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            IngestError::File { stage, .. } => Some(*stage),
            IngestError::Locate { .. } | IngestError::RunLog { .. } => None,
        }
    }
}
