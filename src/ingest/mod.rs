pub mod locate;
pub mod normalize;
pub mod pipeline;
pub mod reader;

use crate::config::{LoaderConfig, resolve_config, validate_page_size};
use crate::logging::ndjson::RunLog;
use crate::store::sqlite::SqliteStore;
use anyhow::{Context, Result};
use pipeline::{IngestSummary, Pipeline};
use std::path::{Path, PathBuf};

const DEFAULT_SOURCE_ROOT: &str = "data";

#[derive(Debug, Clone, Default)]
pub struct IngestCommand {
    pub root: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub page_size: Option<usize>,
    pub log: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub root: PathBuf,
    pub db: PathBuf,
    pub page_size: Option<usize>,
    pub log: Option<PathBuf>,
}

impl IngestCommand {
    /// Flags win over config values, which win over built-in defaults.
    pub fn settings(&self, cfg: Option<&LoaderConfig>) -> Result<IngestSettings> {
        let root = self
            .root
            .clone()
            .or_else(|| cfg.and_then(|c| c.source_root()).map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_ROOT));
        let db = resolve_db_path(self.db.clone(), cfg);
        let page_size = match self.page_size {
            Some(n) => Some(validate_page_size(n as i64).context("invalid --page-size")?),
            None => cfg.and_then(LoaderConfig::page_size),
        };
        let log = self
            .log
            .clone()
            .or_else(|| cfg.and_then(|c| c.ndjson_log()).map(Path::to_path_buf));
        Ok(IngestSettings {
            root,
            db,
            page_size,
            log,
        })
    }
}

pub(crate) fn default_db_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("ghload").join("events.db");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("ghload")
            .join("events.db");
    }
    PathBuf::from(".ghload/events.db")
}

fn resolve_db_path(explicit: Option<PathBuf>, cfg: Option<&LoaderConfig>) -> PathBuf {
    explicit
        .or_else(|| cfg.and_then(|c| c.store_path()).map(Path::to_path_buf))
        .unwrap_or_else(default_db_path)
}

fn load_config_from_cwd(explicit: Option<&Path>) -> Result<Option<LoaderConfig>> {
    let cwd = std::env::current_dir().context("resolve current directory")?;
    resolve_config(explicit, &cwd)
}

pub fn execute_ingest(cmd: IngestCommand) -> Result<IngestSummary> {
    let cfg = load_config_from_cwd(cmd.config.as_deref())?;
    run_ingest(&cmd.settings(cfg.as_ref())?)
}

pub fn run_ingest(settings: &IngestSettings) -> Result<IngestSummary> {
    let mut store = SqliteStore::open(&settings.db)?;
    if let Some(page_size) = settings.page_size {
        store = store.with_page_size(page_size);
    }
    tracing::info!(
        root = %settings.root.display(),
        db = %settings.db.display(),
        page_size = store.page_size(),
        "starting ingest"
    );

    let mut pipeline = Pipeline::new(store);
    if let Some(path) = settings.log.as_ref() {
        let log = RunLog::new(path);
        tracing::info!(run_id = log.run_id(), log = %path.display(), "mirroring run to ndjson log");
        pipeline = pipeline.with_run_log(log);
    }

    let summary = pipeline
        .ingest_dir(&settings.root)
        .with_context(|| format!("ingest {}", settings.root.display()))?;
    println!(
        "Ingested {} files: {} actor rows, {} event rows ({} new), {} records skipped",
        summary.files, summary.actors, summary.events, summary.events_inserted, summary.skipped
    );
    Ok(summary)
}

pub fn create_schema(db: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let cfg = load_config_from_cwd(config.as_deref())?;
    let path = resolve_db_path(db, cfg.as_ref());
    SqliteStore::open(&path)?;
    println!("Schema ready at {}", path.display());
    Ok(())
}

pub fn print_stats(db: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let cfg = load_config_from_cwd(config.as_deref())?;
    let path = resolve_db_path(db, cfg.as_ref());
    let store = SqliteStore::open(&path)?;
    println!("db: {}", path.display());
    println!("actors: {}", store.count_actors()?);
    println!("events: {}", store.count_events()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogConfig, SourceConfig, StoreConfig};

    fn cfg() -> LoaderConfig {
        LoaderConfig {
            version: 1,
            source: Some(SourceConfig {
                root: Some(PathBuf::from("cfg-root")),
            }),
            store: Some(StoreConfig {
                path: Some(PathBuf::from("cfg.db")),
                page_size: Some(50),
            }),
            log: Some(LogConfig {
                ndjson: Some(PathBuf::from("cfg.ndjson")),
            }),
        }
    }

    #[test]
    fn flags_override_config() {
        let cmd = IngestCommand {
            root: Some(PathBuf::from("flag-root")),
            db: Some(PathBuf::from("flag.db")),
            config: None,
            page_size: Some(10),
            log: Some(PathBuf::from("flag.ndjson")),
        };
        let s = cmd.settings(Some(&cfg())).unwrap();
        assert_eq!(s.root, PathBuf::from("flag-root"));
        assert_eq!(s.db, PathBuf::from("flag.db"));
        assert_eq!(s.page_size, Some(10));
        assert_eq!(s.log, Some(PathBuf::from("flag.ndjson")));
    }

    #[test]
    fn config_fills_missing_flags() {
        let s = IngestCommand::default().settings(Some(&cfg())).unwrap();
        assert_eq!(s.root, PathBuf::from("cfg-root"));
        assert_eq!(s.db, PathBuf::from("cfg.db"));
        assert_eq!(s.page_size, Some(50));
        assert_eq!(s.log, Some(PathBuf::from("cfg.ndjson")));
    }

    #[test]
    fn root_defaults_to_data_dir() {
        let s = IngestCommand::default().settings(None).unwrap();
        assert_eq!(s.root, PathBuf::from(DEFAULT_SOURCE_ROOT));
        assert_eq!(s.page_size, None);
        assert_eq!(s.log, None);
    }

    #[test]
    fn rejects_zero_page_size_flag() {
        let cmd = IngestCommand {
            page_size: Some(0),
            ..IngestCommand::default()
        };
        assert!(cmd.settings(None).is_err());
    }
}
