//! Process-wide logger setup.

use crate::services::config::{LogFormat, LoggingConfig};
use chrono::{SecondsFormat, Utc};
use std::io::Write;

/// Install the global logger. Later calls are ignored.
pub fn init_logging(config: &LoggingConfig) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&config.level);

    if config.format == LogFormat::Json {
        builder.format(|buf, record| {
            writeln!(buf, "{}", json_line(record))
        });
    }

    if let Err(e) = builder.try_init() {
        log::debug!("Logger already initialised: {e}");
    }
}

fn json_line(record: &log::Record<'_>) -> serde_json::Value {
    serde_json::json!({
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "level": record.level().as_str(),
        "target": record.target(),
        "message": record.args().to_string(),
    })
}

#[cfg(test)]
#[path = "tests/logging_tests.rs"]
mod tests;
