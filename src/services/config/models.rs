use crate::services::lock::enforcement::ReadLockPolicy;
use secrecy::SecretString;
use std::time::Duration;

/// Everything the service reads from its environment, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub lock: LockConfig,
    pub service_auth: ServiceAuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct LockConfig {
    pub secret: SecretString,
    pub ttl: chrono::Duration,
    pub read_policy: ReadLockPolicy,
    /// `None` disables the expired-lock sweep.
    pub sweep_interval: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceAuthConfig {
    pub token: Option<SecretString>,
    pub encryption_key: Option<SecretString>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
