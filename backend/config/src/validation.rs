//! Config validation with field paths.

use crate::schema::SwitchboardConfig;
use switchboard_core::SurfaceType;
use thiserror::Error;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError { path: path.into(), message: message.into() });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError { path: path.into(), message: message.into() });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &SwitchboardConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_text(config, &mut report);
    validate_surfaces(config, &mut report);
    validate_cooldowns(config, &mut report);
    validate_registration(config, &mut report);
    validate_logging(config, &mut report);
    if config.modules.disable_version_check {
        report.warn("modules.disableVersionCheck", "Module engine version ranges are not checked");
    }
    report
}

fn validate_text(config: &SwitchboardConfig, report: &mut ValidationReport) {
    if config.prefix.is_empty() {
        report.error("prefix", "Prefix cannot be empty");
    } else if config.prefix.chars().any(char::is_whitespace) {
        report.warn("prefix", "Prefix contains whitespace");
    }
    if config.argument_separator.is_empty() {
        report.error("argumentSeparator", "Argument separator cannot be empty");
    }
    let ignored = &config.ignored_channels;
    if ignored.enabled && ignored.convert_to_allow_list && ignored.channels.is_empty() {
        report.warn("ignoredChannels", "Allow list is empty; every channel is ignored");
    }
}

fn validate_surfaces(config: &SwitchboardConfig, report: &mut ValidationReport) {
    if SurfaceType::ALL.iter().all(|s| !config.surface(*s).enabled) {
        report.warn("surfaces", "Every surface is disabled; no command will dispatch");
    }
}

fn validate_cooldowns(config: &SwitchboardConfig, report: &mut ValidationReport) {
    if config.cooldown_sweep_interval_secs == 0 {
        report.error("cooldownSweepIntervalSecs", "Sweep interval must be at least one second");
    }
}

fn validate_registration(config: &SwitchboardConfig, report: &mut ValidationReport) {
    let register = &config.register_commands;
    for (i, guild) in register.guilds.iter().enumerate() {
        if guild.trim().is_empty() {
            report.error(format!("registerCommands.guilds[{i}]"), "Guild id cannot be empty");
        }
    }
    if register.enabled && !register.global && register.guilds.is_empty() {
        report.warn("registerCommands", "Registration is enabled but has no target");
    }
}

fn validate_logging(config: &SwitchboardConfig, report: &mut ValidationReport) {
    let level = config.logging.level.trim();
    // Directives such as `switchboard_commands=debug` are passed through to EnvFilter.
    if !level.contains('=') && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.error("logging.level", format!("Unknown log level '{level}'"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let report = validate(&SwitchboardConfig::default());
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_reports_errors_with_paths() {
        let mut config = SwitchboardConfig::default();
        config.prefix.clear();
        config.cooldown_sweep_interval_secs = 0;
        config.logging.level = "loud".into();
        config.register_commands.guilds = vec![" ".into()];

        let report = validate(&config);
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["prefix", "cooldownSweepIntervalSecs", "registerCommands.guilds[0]", "logging.level"]
        );
    }

    #[test]
    fn test_warnings() {
        let mut config = SwitchboardConfig::default();
        config.register_commands.global = false;
        config.modules.disable_version_check = true;
        config.logging.level = "switchboard_commands=debug".into();

        let report = validate(&config);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 2);
    }
}
