use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// The three inbound command shapes the engine dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceType {
    /// Structured "slash" interaction with typed options.
    Structured,
    /// Free-text message starting with the configured prefix.
    Text,
    /// Context-menu action on a user or a message.
    Context,
}

impl SurfaceType {
    pub const ALL: [SurfaceType; 3] = [Self::Structured, Self::Text, Self::Context];

    /// Surfaces that are registered remotely with the gateway.
    pub fn is_remote(self) -> bool {
        matches!(self, Self::Structured | Self::Context)
    }
}

impl fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Structured => "structured",
            Self::Text => "text",
            Self::Context => "context",
        };
        f.write_str(s)
    }
}

/// A 64-bit permission set.
///
/// Bit meaning is owned by the gateway; the engine only compares sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(pub u64);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);
    pub const ALL: Permissions = Permissions(u64::MAX);

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `required` is present in `self`.
    pub const fn contains(self, required: Permissions) -> bool {
        self.0 & required.0 == required.0
    }

    /// Bits of `required` that `self` lacks.
    pub const fn missing(self, required: Permissions) -> Permissions {
        Permissions(required.0 & !self.0)
    }
}

impl BitOr for Permissions {
    type Output = Permissions;

    fn bitor(self, rhs: Self) -> Self::Output {
        Permissions(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// The user who triggered an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    #[serde(default)]
    pub is_bot: bool,
    /// Effective permissions of the actor in the scope of the event.
    #[serde(default)]
    pub permissions: Permissions,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), is_bot: false, permissions: Permissions::NONE }
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn bot(mut self) -> Self {
        self.is_bot = true;
        self
    }
}

/// Where an event happened: a channel, optionally inside a guild.
///
/// An event with no guild is a direct message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
}

impl Scope {
    pub fn guild(guild_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self { channel_id: channel_id.into(), guild_id: Some(guild_id.into()) }
    }

    pub fn direct(channel_id: impl Into<String>) -> Self {
        Self { channel_id: channel_id.into(), guild_id: None }
    }

    pub fn is_direct(&self) -> bool {
        self.guild_id.is_none()
    }
}

/// What a context-action command is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextTarget {
    User,
    Message,
}

/// What a cooldown window is bound to besides actor and command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownScope {
    /// One window per actor everywhere.
    Global,
    /// One window per guild; direct messages fall back to the channel.
    #[default]
    Guild,
    Channel,
}

impl CooldownScope {
    /// Scope id for an event in `scope`.
    pub fn scope_id(self, scope: &Scope) -> Option<String> {
        match self {
            Self::Global => None,
            Self::Guild => Some(scope.guild_id.clone().unwrap_or_else(|| scope.channel_id.clone())),
            Self::Channel => Some(scope.channel_id.clone()),
        }
    }
}

/// Lifecycle state of an installed module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Discovered,
    Started,
    Loaded,
    /// Terminal.
    Unloaded,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discovered => "discovered",
            Self::Started => "started",
            Self::Loaded => "loaded",
            Self::Unloaded => "unloaded",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_contains_and_missing() {
        let held = Permissions(0b0110);
        assert!(held.contains(Permissions(0b0100)));
        assert!(held.contains(Permissions::NONE));
        assert!(!held.contains(Permissions(0b1100)));
        assert_eq!(held.missing(Permissions(0b1101)), Permissions(0b1001));
        assert!(held.missing(Permissions(0b0010)).is_empty());
    }

    #[test]
    fn test_surface_display() {
        assert_eq!(SurfaceType::Structured.to_string(), "structured");
        assert_eq!(SurfaceType::Text.to_string(), "text");
        assert!(SurfaceType::Context.is_remote());
        assert!(!SurfaceType::Text.is_remote());
    }

    #[test]
    fn test_cooldown_scope_id() {
        let guild = Scope::guild("g1", "c1");
        let dm = Scope::direct("dm-1");
        assert_eq!(CooldownScope::Global.scope_id(&guild), None);
        assert_eq!(CooldownScope::Guild.scope_id(&guild).as_deref(), Some("g1"));
        assert_eq!(CooldownScope::Guild.scope_id(&dm).as_deref(), Some("dm-1"));
        assert_eq!(CooldownScope::Channel.scope_id(&guild).as_deref(), Some("c1"));
    }

    #[test]
    fn test_scope_direct() {
        assert!(Scope::direct("dm-1").is_direct());
        assert!(!Scope::guild("g", "c").is_direct());
    }
}
