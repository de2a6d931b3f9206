//! Statistic logging.
//!
//! Statistics are disabled unless [`configure`] enables them; every
//! statistic is emitted as one `info` line so downstream tooling can grep
//! for the prefix.

use std::fmt::Display;

use log::info;
use once_cell::sync::OnceCell;

static LOG_STATISTICS: OnceCell<bool> = OnceCell::new();

/// Configures statistic logging process-wide; later calls are ignored.
pub fn configure(log_statistics: bool) {
    let _ = LOG_STATISTICS.set(log_statistics);
}

pub fn should_log_statistics() -> bool {
    *LOG_STATISTICS.get().unwrap_or(&false)
}

pub fn log_statistic(name: impl Display, value: impl Display) {
    if should_log_statistics() {
        info!("STAT {name}={value}");
    }
}
