//! `switchboard-config`: runtime configuration for the Switchboard engine.
//!
//! Provides:
//! - Typed config schema with a default for every field
//! - YAML read/write with a single rolling backup
//! - Validation with field paths

pub mod defaults;
pub mod io;
pub mod schema;
pub mod validation;

pub use io::{config_dir, config_file_path, load_config, parse_config, write_config};
pub use schema::{
    IgnoredChannelsConfig, LoggingConfig, MessagesConfig, ModulesConfig, RegisterCommandsConfig, SurfaceConfig,
    SurfacesConfig, SwitchboardConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Result};
use std::path::Path;

/// Load and validate a config file.
///
/// Warnings are logged; any validation error fails the load.
pub async fn load_and_validate(path: &Path) -> Result<SwitchboardConfig> {
    let config = load_config(path).await?;

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        bail!("{} config error(s) in {}", report.errors.len(), path.display());
    }

    Ok(config)
}
