use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing::warn;

use board_api::ApiConfig;
use board_api::auth::{hash_password, verify_password};
use board_guard::RateLimitPolicy;

/// Attempts must outlive the daily counting window.
const MIN_RETENTION_HOURS: i64 = 24;
/// Ten years.
const MAX_HOURS: i64 = 24 * 365 * 10;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub cleanup_interval_secs: u64,
    pub api: ApiConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("BOARD_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("BOARD_JWT_SECRET is unset or still a placeholder");
        }

        let admin_password_hash = match (var("BOARD_ADMIN_PASSWORD_HASH"), var("BOARD_ADMIN_PASSWORD")) {
            (Some(hash), _) => {
                verify_password(&hash, "")
                    .context("BOARD_ADMIN_PASSWORD_HASH is not a valid PHC string")?;
                hash
            }
            (None, Some(plain)) => {
                warn!("BOARD_ADMIN_PASSWORD is set in plain text; prefer BOARD_ADMIN_PASSWORD_HASH");
                hash_password(&plain)?
            }
            (None, None) => bail!("Set BOARD_ADMIN_PASSWORD_HASH (or BOARD_ADMIN_PASSWORD)"),
        };

        let port: u16 = var("BOARD_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("BOARD_PORT must be a port number")?;

        let session_hours: i64 = parse_or(&var, "BOARD_SESSION_HOURS", 12)?;
        if !(1..=MAX_HOURS).contains(&session_hours) {
            bail!("BOARD_SESSION_HOURS must be between 1 and {}", MAX_HOURS);
        }
        let retention_hours: i64 = parse_or(&var, "BOARD_ATTEMPT_RETENTION_HOURS", 168)?;
        if !(MIN_RETENTION_HOURS..=MAX_HOURS).contains(&retention_hours) {
            bail!(
                "BOARD_ATTEMPT_RETENTION_HOURS must be between {} and {}",
                MIN_RETENTION_HOURS,
                MAX_HOURS
            );
        }
        let allow_post_delete: bool = parse_or(&var, "BOARD_ALLOW_POST_DELETE", false)?;

        Ok(Self {
            host: var("BOARD_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("BOARD_DB_PATH").unwrap_or_else(|| "board.db".into()).into(),
            static_dir: var("BOARD_STATIC_DIR").map(PathBuf::from),
            cleanup_interval_secs: parse_or(&var, "BOARD_CLEANUP_INTERVAL_SECS", 3600)?,
            api: ApiConfig {
                jwt_secret,
                admin_password_hash,
                session_ttl: chrono::Duration::hours(session_hours),
                allow_post_delete,
                public_api_key: var("BOARD_PUBLIC_API_KEY"),
                rate_limit: RateLimitPolicy {
                    attempt_retention: chrono::Duration::hours(retention_hours),
                    ..Default::default()
                },
            },
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}
