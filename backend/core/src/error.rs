use thiserror::Error;

use crate::cooldown::CooldownRecord;
use crate::types::SurfaceType;

/// Top-level error type for the Switchboard engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid name '{name}'")]
    InvalidName { name: String },

    #[error("{surface} command '{name}' is already registered")]
    DuplicateName { surface: SurfaceType, name: String },

    #[error("command '{command}' declares option '{option}' more than once")]
    DuplicateOption { command: String, option: String },

    #[error("command '{command}': required option '{option}' follows an optional option")]
    InvalidOptionOrder { command: String, option: String },

    #[error("cooldown already active for '{}' (actor {})", .0.command, .0.actor_id)]
    AlreadyActive(Box<CooldownRecord>),

    #[error("module '{module}' has an invalid version or range: {message}")]
    InvalidVersionRange { module: String, message: String },

    #[error("module '{module}' supports engine {required}, running {engine}")]
    IncompatibleVersion { module: String, required: String, engine: String },

    #[error("module '{0}' is already installed")]
    DuplicateModule(String),

    #[error("module '{0}' not found")]
    ModuleNotFound(String),

    #[error("module '{0}' declined to start")]
    ModuleRejected(String),

    #[error("module '{module}' failed to start: {source}")]
    ModuleStart {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("module '{module}' failed to load: {source}")]
    ModuleLoad {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("gateway error: {0}")]
    Gateway(#[source] anyhow::Error),

    /// A command failure that reached no observer; surfaced to the host.
    #[error("unhandled: {0}")]
    Unhandled(#[from] CommandError),
}

/// A command failure in the wrapped form delivered to observers.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("{surface} command '{command}' failed: {message}")]
    Execute { surface: SurfaceType, command: String, message: String },

    #[error("halt handler of {surface} command '{command}' failed: {message}")]
    Halt { surface: SurfaceType, command: String, message: String },
}

impl CommandError {
    pub fn command(&self) -> &str {
        match self {
            Self::Execute { command, .. } | Self::Halt { command, .. } => command,
        }
    }
}
