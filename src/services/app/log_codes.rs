//! Closed set of operational log events.
//!
//! Each code has a fixed level and renders as
//! `CODE | key=value | key=value` so events can be grepped and parsed.

use log::Level;
use std::fmt::{self, Display, Write as _};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCode {
    ServerStarted,
    LockAcquireFailed,
    LockConflict,
    LockReleaseFailed,
    LockReleaseAllFailed,
    LockSweepCompleted,
    LockSweepFailed,
    StateFailed,
    SubmissionFailed,
    ServiceAuthFailed,
    PayloadSizeWarning,
}

impl LogCode {
    pub const ALL: &'static [LogCode] = &[
        LogCode::ServerStarted,
        LogCode::LockAcquireFailed,
        LogCode::LockConflict,
        LogCode::LockReleaseFailed,
        LogCode::LockReleaseAllFailed,
        LogCode::LockSweepCompleted,
        LogCode::LockSweepFailed,
        LogCode::StateFailed,
        LogCode::SubmissionFailed,
        LogCode::ServiceAuthFailed,
        LogCode::PayloadSizeWarning,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::ServerStarted => "SERVER_STARTED",
            Self::LockAcquireFailed => "APPLICATION_LOCK_ACQUIRE_FAILED",
            Self::LockConflict => "APPLICATION_LOCK_CONFLICT",
            Self::LockReleaseFailed => "APPLICATION_LOCK_RELEASE_FAILED",
            Self::LockReleaseAllFailed => "APPLICATION_LOCKS_RELEASE_ALL_FAILED",
            Self::LockSweepCompleted => "APPLICATION_LOCK_SWEEP_COMPLETED",
            Self::LockSweepFailed => "APPLICATION_LOCK_SWEEP_FAILED",
            Self::StateFailed => "APPLICATION_STATE_FAILED",
            Self::SubmissionFailed => "SUBMISSION_FAILED",
            Self::ServiceAuthFailed => "SERVICE_AUTH_FAILED",
            Self::PayloadSizeWarning => "PAYLOAD_SIZE_WARNING",
        }
    }

    pub const fn level(self) -> Level {
        match self {
            Self::ServerStarted | Self::LockConflict | Self::LockSweepCompleted => Level::Info,
            Self::ServiceAuthFailed | Self::PayloadSizeWarning => Level::Warn,
            Self::LockAcquireFailed
            | Self::LockReleaseFailed
            | Self::LockReleaseAllFailed
            | Self::LockSweepFailed
            | Self::StateFailed
            | Self::SubmissionFailed => Level::Error,
        }
    }
}

impl Display for LogCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Render an event message without logging it.
pub fn format_event(code: LogCode, fields: &[(&str, &dyn Display)]) -> String {
    let mut message = code.name().to_string();
    for (key, value) in fields {
        let _ = write!(message, " | {key}={value}");
    }
    message
}

/// Log `code` at its fixed level.
pub fn log_event(code: LogCode, fields: &[(&str, &dyn Display)]) {
    let level = code.level();
    if log::log_enabled!(level) {
        log::log!(level, "{}", format_event(code, fields));
    }
}

/// Startup check: every code must have a non-empty, unique name.
pub fn validate_log_codes() -> Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for code in LogCode::ALL {
        let name = code.name();
        if name.trim().is_empty() {
            return Err(format!("log code {code:?} has an empty name"));
        }
        if !seen.insert(name) {
            return Err(format!("duplicate log code name {name}"));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/log_codes_tests.rs"]
mod tests;
