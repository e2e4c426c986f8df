//! Switchboard runtime configuration schema.
//!
//! Every field has a default, so an empty file (or no file) is a valid config.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use switchboard_core::{CooldownScope, SurfaceType};

use crate::defaults;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchboardConfig {
    /// Prefix that marks a text message as a command.
    #[serde(default = "defaults::prefix")]
    pub prefix: String,

    /// Splits the command token and positional arguments.
    #[serde(default = "defaults::argument_separator")]
    pub argument_separator: String,

    #[serde(default)]
    pub ignored_channels: IgnoredChannelsConfig,

    #[serde(default)]
    pub surfaces: SurfacesConfig,

    #[serde(default)]
    pub cooldown_scope: CooldownScope,

    #[serde(default = "defaults::cooldown_sweep_interval_secs")]
    pub cooldown_sweep_interval_secs: u64,

    #[serde(default)]
    pub register_commands: RegisterCommandsConfig,

    #[serde(default)]
    pub modules: ModulesConfig,

    #[serde(default)]
    pub messages: MessagesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SwitchboardConfig {
    fn default() -> Self {
        Self {
            prefix: defaults::prefix(),
            argument_separator: defaults::argument_separator(),
            ignored_channels: IgnoredChannelsConfig::default(),
            surfaces: SurfacesConfig::default(),
            cooldown_scope: CooldownScope::default(),
            cooldown_sweep_interval_secs: defaults::cooldown_sweep_interval_secs(),
            register_commands: RegisterCommandsConfig::default(),
            modules: ModulesConfig::default(),
            messages: MessagesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SwitchboardConfig {
    pub fn surface(&self, surface: SurfaceType) -> &SurfaceConfig {
        self.surfaces.get(surface)
    }

    /// Whether events from `channel_id` are dropped before lookup.
    pub fn is_channel_ignored(&self, channel_id: &str) -> bool {
        self.ignored_channels.is_ignored(channel_id)
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Channels the engine never dispatches in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoredChannelsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Treat `channels` as the only channels that are *not* ignored.
    #[serde(default)]
    pub convert_to_allow_list: bool,
    #[serde(default)]
    pub channels: Vec<String>,
}

impl IgnoredChannelsConfig {
    pub fn is_ignored(&self, channel_id: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let listed = self.channels.iter().any(|c| c == channel_id);
        listed != self.convert_to_allow_list
    }
}

/// Per-surface switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
    #[serde(default = "defaults::enabled")]
    pub enable_cooldown: bool,
    /// Dispatch interactions another listener already replied to.
    #[serde(default)]
    pub accept_replied_interactions: bool,
    /// Reply with `messages.error` after an unhandled command error.
    #[serde(default)]
    pub reply_on_error: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enable_cooldown: true,
            accept_replied_interactions: false,
            reply_on_error: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfacesConfig {
    #[serde(default)]
    pub structured: SurfaceConfig,
    #[serde(default)]
    pub text: SurfaceConfig,
    #[serde(default)]
    pub context: SurfaceConfig,
}

impl SurfacesConfig {
    pub fn get(&self, surface: SurfaceType) -> &SurfaceConfig {
        match surface {
            SurfaceType::Structured => &self.structured,
            SurfaceType::Text => &self.text,
            SurfaceType::Context => &self.context,
        }
    }

    pub fn get_mut(&mut self, surface: SurfaceType) -> &mut SurfaceConfig {
        match surface {
            SurfaceType::Structured => &mut self.structured,
            SurfaceType::Text => &mut self.text,
            SurfaceType::Context => &mut self.context,
        }
    }
}

/// Remote registration of structured and context commands at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCommandsConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
    /// Register globally in addition to the listed guilds.
    #[serde(default = "defaults::enabled")]
    pub global: bool,
    #[serde(default)]
    pub guilds: Vec<String>,
}

impl Default for RegisterCommandsConfig {
    fn default() -> Self {
        Self { enabled: true, global: true, guilds: Vec::new() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulesConfig {
    /// Skip the engine version check for every module.
    #[serde(default)]
    pub disable_version_check: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesConfig {
    #[serde(default = "defaults::error_reply")]
    pub error: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self { error: defaults::error_reply() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `switchboard_commands=debug`.
    #[serde(default = "defaults::log_level")]
    pub level: String,
    /// Directory for daily-rolling JSON logs. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: defaults::log_level(), dir: None }
    }
}
