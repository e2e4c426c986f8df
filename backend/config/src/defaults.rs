//! Default values for every optional config field.

use std::time::Duration;

/// Text command prefix.
pub const DEFAULT_PREFIX: &str = "!";

/// Separator between the command token and its arguments.
pub const DEFAULT_ARGUMENT_SEPARATOR: &str = " ";

/// Interval of the cooldown sweeper.
pub const DEFAULT_COOLDOWN_SWEEP_INTERVAL_SECS: u64 = 60 * 60;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Reply sent on an unhandled command error when `replyOnError` is set.
pub const DEFAULT_ERROR_REPLY: &str = "An error occurred while executing this command.";

pub(crate) fn prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

pub(crate) fn argument_separator() -> String {
    DEFAULT_ARGUMENT_SEPARATOR.to_string()
}

pub(crate) fn cooldown_sweep_interval_secs() -> u64 {
    DEFAULT_COOLDOWN_SWEEP_INTERVAL_SECS
}

pub(crate) fn log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

pub(crate) fn error_reply() -> String {
    DEFAULT_ERROR_REPLY.to_string()
}

pub(crate) fn enabled() -> bool {
    true
}

/// Sweep interval as a [`Duration`], never zero.
pub fn sweep_interval(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}
