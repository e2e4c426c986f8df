//! Module lifecycle hooks: start, load and unload.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use switchboard_commands::Engine;
use switchboard_core::CommandDef;

use crate::manifest::ModuleManifest;

/// Why a module is being unloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnloadReason {
    Shutdown,
    /// Replaced by a newer instance with the same id.
    Reload,
    Uninstall,
    Other(String),
}

impl fmt::Display for UnloadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => f.write_str("shutdown"),
            Self::Reload => f.write_str("reload"),
            Self::Uninstall => f.write_str("uninstall"),
            Self::Other(reason) => f.write_str(reason),
        }
    }
}

/// A bundle of commands with its own lifecycle.
///
/// `commands()` is read after a successful `start`, so a module may build
/// its commands there. A definition error fails the start or load that
/// reads it.
#[async_trait]
pub trait Module: Send + Sync {
    fn manifest(&self) -> ModuleManifest;

    /// Return `Ok(false)` to decline starting.
    async fn start(&self, engine: &Engine) -> Result<bool>;

    async fn load(&self, _engine: &Engine) -> Result<()> {
        Ok(())
    }

    async fn unload(&self, _engine: &Engine, _reason: &UnloadReason) -> Result<()> {
        Ok(())
    }

    fn commands(&self) -> Result<Vec<CommandDef>>;
}
