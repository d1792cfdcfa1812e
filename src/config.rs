//! Configuration from the environment (and `.env`, via dotenv).

use std::{fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{bail, Context, Result};

use crate::{cache, paginator, Settings};

#[derive(Debug, Clone)]
pub struct Config {
    /// sqlx SQLite URL, e.g. `sqlite://scribbles.db`
    pub database_url: String,
    pub bind_addr: String,
    pub media_root: PathBuf,
    pub page_size: u32,
    pub index_cache_ttl: Duration,
    pub session_idle: time::Duration,
    pub max_upload_bytes: usize,
    pub db_max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url =
            lookup("DATABASE_URL").context("DATABASE_URL environment variable not set")?;

        let page_size = parsed(&lookup, "PAGE_SIZE", paginator::DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            bail!("PAGE_SIZE must be at least 1");
        }

        Ok(Config {
            database_url,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_owned()),
            media_root: lookup("MEDIA_ROOT").unwrap_or_else(|| "media".to_owned()).into(),
            page_size,
            index_cache_ttl: Duration::from_secs(parsed(
                &lookup,
                "INDEX_CACHE_SECS",
                cache::DEFAULT_TTL.as_secs(),
            )?),
            session_idle: time::Duration::minutes(parsed(&lookup, "SESSION_IDLE_MINUTES", 60)?),
            max_upload_bytes: parsed(&lookup, "MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
            db_max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS", 16)?,
        })
    }

    pub fn settings(&self) -> Settings {
        Settings {
            page_size: self.page_size,
            max_upload_bytes: self.max_upload_bytes,
            session_idle: self.session_idle,
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key}={raw:?}: {e}")),
        None => Ok(default),
    }
}
