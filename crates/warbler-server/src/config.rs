use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing::warn;

const DEFAULT_DATABASE: &str = "warbler.db";
const DEV_SECRET: &str = "dev-secret-change-me";

/// Secrets that ship in sample configs and must never sign real sessions.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", DEV_SECRET];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Accepts `sqlite://path`, `sqlite:path`, a bare path, or `:memory:`.
    pub fn parse(url: &str) -> Self {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url)
            .trim();

        match path {
            "" => Self::File(PathBuf::from(DEFAULT_DATABASE)),
            ":memory:" => Self::Memory,
            path => Self::File(PathBuf::from(path)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseLocation,
    pub secret_key: String,
    pub addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database = DatabaseLocation::parse(
            &var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE.into()),
        );

        let secret_key = match var("WARBLER_SECRET_KEY").filter(|s| !s.is_empty()) {
            Some(secret) if PLACEHOLDER_SECRETS.contains(&secret.as_str()) => {
                bail!("WARBLER_SECRET_KEY is still a placeholder; set a random value")
            }
            Some(secret) => secret,
            None => {
                warn!("WARBLER_SECRET_KEY is unset; using the dev secret, sessions can be forged");
                DEV_SECRET.into()
            }
        };

        let host = var("WARBLER_HOST").unwrap_or_else(|| "127.0.0.1".into());
        let port: u16 = var("WARBLER_PORT")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .context("WARBLER_PORT must be a port number")?;
        let addr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;

        Ok(Self {
            database,
            secret_key,
            addr,
        })
    }
}
