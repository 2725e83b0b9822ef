use crate::store::sqlite::MAX_PAGE_SIZE;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_RELATIVE_PATH: &str = ".ghload/config.toml";
const SUPPORTED_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoaderConfig {
    pub version: u32,
    pub source: Option<SourceConfig>,
    pub store: Option<StoreConfig>,
    pub log: Option<LogConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub ndjson: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawLoaderConfig {
    version: Option<u32>,
    source: Option<RawSourceConfig>,
    store: Option<RawStoreConfig>,
    log: Option<RawLogConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSourceConfig {
    root: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawStoreConfig {
    path: Option<String>,
    page_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawLogConfig {
    ndjson: Option<String>,
}

impl LoaderConfig {
    pub fn source_root(&self) -> Option<&Path> {
        self.source.as_ref().and_then(|s| s.root.as_deref())
    }

    pub fn store_path(&self) -> Option<&Path> {
        self.store.as_ref().and_then(|s| s.path.as_deref())
    }

    pub fn page_size(&self) -> Option<usize> {
        self.store.as_ref().and_then(|s| s.page_size)
    }

    pub fn ndjson_log(&self) -> Option<&Path> {
        self.log.as_ref().and_then(|l| l.ndjson.as_deref())
    }
}

pub fn default_config_path(base: &Path) -> PathBuf {
    base.join(CONFIG_RELATIVE_PATH)
}

/// Loads `explicit` (which must exist) or, when absent, the default config
/// under `base` if there is one.
pub fn resolve_config(explicit: Option<&Path>, base: &Path) -> Result<Option<LoaderConfig>> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            load_config(path)
        }
        None => load_config(&default_config_path(base)),
    }
}

pub fn load_config(path: &Path) -> Result<Option<LoaderConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw =
        std::fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let parsed: RawLoaderConfig =
        toml::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(validate_config(parsed, path)?))
}

fn validate_config(raw: RawLoaderConfig, path: &Path) -> Result<LoaderConfig> {
    let version = raw
        .version
        .ok_or_else(|| anyhow::anyhow!("{} missing required `version`", path.display()))?;
    if version != SUPPORTED_VERSION {
        bail!(
            "{} has unsupported version {version}; expected version = {SUPPORTED_VERSION}",
            path.display()
        );
    }

    let source = raw.source.map(|source| SourceConfig {
        root: sanitize_path(source.root),
    });

    let store = raw
        .store
        .map(|store| {
            let page_size = store
                .page_size
                .map(|n| {
                    validate_page_size(n)
                        .with_context(|| format!("{} invalid `[store].page_size`", path.display()))
                })
                .transpose()?;
            Ok::<_, anyhow::Error>(StoreConfig {
                path: sanitize_path(store.path),
                page_size,
            })
        })
        .transpose()?;

    let log = raw.log.map(|log| LogConfig {
        ndjson: sanitize_path(log.ndjson),
    });

    Ok(LoaderConfig {
        version,
        source,
        store,
        log,
    })
}

pub fn validate_page_size(n: i64) -> Result<usize> {
    if n < 1 || n > MAX_PAGE_SIZE as i64 {
        bail!("page size {n} out of range; expected 1..={MAX_PAGE_SIZE}");
    }
    Ok(n as usize)
}

fn sanitize_path(value: Option<String>) -> Option<PathBuf> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
