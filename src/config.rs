use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

pub const TRACE_ENV: &str = "JOBTRACK_TRACE";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
const DB_FILE: &str = "jobtrack.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub trace: bool,
}

impl Config {
    /// Resolves settings from the `--db` flag (or `JOBTRACK_DB`), then
    /// `DATABASE_URL`, then the platform data directory.
    pub fn resolve(db_flag: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let database_url = std::env::var(DATABASE_URL_ENV).ok();
        let trace = verbose || std::env::var(TRACE_ENV).ok().as_deref() == Some("1");
        Ok(Self {
            db_path: resolve_db_path(db_flag, database_url.as_deref())?,
            trace,
        })
    }
}

fn resolve_db_path(db_flag: Option<PathBuf>, database_url: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = db_flag {
        return Ok(path);
    }
    if let Some(url) = database_url.filter(|u| !u.trim().is_empty()) {
        return path_from_database_url(url);
    }
    Ok(default_path())
}

/// Accepts `sqlite:///relative/or/absolute.db` style URLs. Anything else is
/// another database engine, which this tool does not speak.
pub fn path_from_database_url(url: &str) -> Result<PathBuf> {
    let url = url.trim();
    if url == "sqlite://" || url == "sqlite:///" || url == "sqlite:///:memory:" {
        return Err(anyhow!("DATABASE_URL must name a database file, got '{}'", url));
    }
    let path = url
        .strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite://"))
        .or_else(|| url.strip_prefix("sqlite:"))
        .ok_or_else(|| {
            anyhow!(
                "unsupported DATABASE_URL '{}': only sqlite:/// URLs are supported",
                url
            )
        })?;
    Ok(Path::new(path).to_path_buf())
}

fn default_path() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobtrack") {
        proj_dirs.data_dir().join(DB_FILE)
    } else {
        PathBuf::from(DB_FILE)
    }
}
