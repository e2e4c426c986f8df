//! Structured logging for Switchboard.
//!
//! Console and rolling JSON file output, plus an observer that logs every
//! engine event.

pub mod event_logger;
pub mod logger;

pub use event_logger::{spawn_event_logger, EventLogEntry};
pub use logger::init_logger;
