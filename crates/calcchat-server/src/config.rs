use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use calcchat_types::participants::Participants;

const DEFAULT_PARTICIPANTS: &str = "9492:Rahitha,9746:Guest";

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub participants: Participants,
    pub history_limit: u32,
    pub typing_ttl: Duration,
    /// Firebase service-account JSON. Push is disabled when unset.
    pub fcm_credentials: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("CALCCHAT_PORT", "5000")
            .parse()
            .context("CALCCHAT_PORT must be a port number")?;
        let participants = Participants::parse(&var("CALCCHAT_PARTICIPANTS", DEFAULT_PARTICIPANTS))
            .context("CALCCHAT_PARTICIPANTS must be two id:name pairs")?;
        let history_limit = var("CALCCHAT_HISTORY_LIMIT", "20")
            .parse()
            .context("CALCCHAT_HISTORY_LIMIT must be a positive integer")?;
        let typing_ttl_secs: u64 = var("CALCCHAT_TYPING_TTL_SECS", "5")
            .parse()
            .context("CALCCHAT_TYPING_TTL_SECS must be a number of seconds")?;

        Ok(Self {
            host: var("CALCCHAT_HOST", "0.0.0.0"),
            port,
            db_path: var("CALCCHAT_DB_PATH", "calcchat.db").into(),
            participants,
            history_limit,
            typing_ttl: Duration::from_secs(typing_ttl_secs),
            fcm_credentials: lookup("CALCCHAT_FCM_CREDENTIALS")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}
