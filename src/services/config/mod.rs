pub mod models;

pub use models::*;

use crate::services::lock::enforcement::ReadLockPolicy;
use crate::types::errors::AppError;
use secrecy::SecretString;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://grants-ui-backend.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
/// Four hours.
pub const DEFAULT_LOCK_TTL_MS: i64 = 4 * 60 * 60 * 1000;
/// Thirty days.
pub const MAX_LOCK_TTL_MS: i64 = 30 * 24 * 60 * 60 * 1000;
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 5 * 60 * 1000;

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through `lookup`, which returns the raw value of a variable if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let server = ServerConfig {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
        };

        let database = DatabaseConfig {
            url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
        };
        if database.max_connections == 0 {
            return Err(AppError::Config(
                "DATABASE_MAX_CONNECTIONS must be greater than 0".into(),
            ));
        }

        let secret = get("APPLICATION_LOCK_TOKEN_SECRET").ok_or_else(|| {
            AppError::Config("APPLICATION_LOCK_TOKEN_SECRET must be set".into())
        })?;

        let ttl_ms: i64 = parse_or(&get, "APPLICATION_LOCK_TTL_MS", DEFAULT_LOCK_TTL_MS)?;
        if ttl_ms <= 0 || ttl_ms > MAX_LOCK_TTL_MS {
            return Err(AppError::Config(format!(
                "APPLICATION_LOCK_TTL_MS must be between 1 and {MAX_LOCK_TTL_MS}"
            )));
        }

        let refresh_on_read = parse_bool(&get, "APPLICATION_LOCK_REFRESH_ON_READ", true)?;
        let sweep_ms: u64 =
            parse_or(&get, "APPLICATION_LOCK_SWEEP_INTERVAL_MS", DEFAULT_SWEEP_INTERVAL_MS)?;

        let lock = LockConfig {
            secret: SecretString::from(secret),
            ttl: chrono::Duration::milliseconds(ttl_ms),
            read_policy: if refresh_on_read {
                ReadLockPolicy::AcquireOrRefresh
            } else {
                ReadLockPolicy::CheckOnly
            },
            sweep_interval: (sweep_ms > 0).then(|| Duration::from_millis(sweep_ms)),
        };

        let service_auth = ServiceAuthConfig {
            token: get("GRANTS_UI_BACKEND_AUTH_TOKEN").map(SecretString::from),
            encryption_key: get("GRANTS_UI_BACKEND_ENCRYPTION_KEY").map(SecretString::from),
        };

        let logging = LoggingConfig {
            level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            format: match get("LOG_FORMAT").as_deref() {
                None | Some("pretty") => LogFormat::Pretty,
                Some("json") => LogFormat::Json,
                Some(other) => {
                    return Err(AppError::Config(format!(
                        "LOG_FORMAT must be 'pretty' or 'json', got '{other}'"
                    )))
                }
            },
        };

        Ok(Self {
            server,
            database,
            lock,
            service_auth,
            logging,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value '{raw}'"))),
    }
}

fn parse_bool<G>(get: &G, key: &str, default: bool) -> Result<bool, AppError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(AppError::Config(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
