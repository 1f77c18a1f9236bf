use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use tracing::{info, warn};

const DEV_SECRET: &str = "dev-secret-change-me";

/// Longest token lifetime accepted from the environment (30 days).
const MAX_TOKEN_TTL_MINUTES: i64 = 30 * 24 * 60;

pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("AGORA_JWT_SECRET").unwrap_or_else(|_| {
            warn!("AGORA_JWT_SECRET not set, using the development secret");
            DEV_SECRET.into()
        });

        Ok(Self {
            db_path: PathBuf::from(try_load::<String>("AGORA_DB_PATH", "agora.db")?),
            host: try_load("AGORA_HOST", "0.0.0.0")?,
            port: try_load("AGORA_PORT", "8000")?,
            jwt_secret,
            token_ttl: token_ttl(try_load("AGORA_TOKEN_TTL_MINUTES", "30")?)?,
        })
    }
}

fn token_ttl(minutes: i64) -> Result<chrono::Duration> {
    if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&minutes) {
        anyhow::bail!(
            "AGORA_TOKEN_TTL_MINUTES must be between 1 and {}, got {}",
            MAX_TOKEN_TTL_MINUTES,
            minutes
        );
    }
    chrono::Duration::try_minutes(minutes)
        .with_context(|| format!("AGORA_TOKEN_TTL_MINUTES value {minutes} is out of range"))
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse::<T>()
        .map_err(|e: T::Err| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value '{raw}'"))
}
