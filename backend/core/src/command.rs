//! Command definitions and their builder.
//!
//! A definition is a set of engine fields shared by every surface plus a
//! surface-specific [`CommandKind`] payload. Definitions are validated when
//! built and again when registered; once registered they are immutable.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::EngineError;
use crate::precondition::Precondition;
use crate::traits::{ExecuteHandler, HaltHandler, RemoteCommand};
use crate::types::{ContextTarget, Permissions, SurfaceType};

/// Names and aliases: 1–32 ASCII word characters or dashes.
static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,32}$").unwrap());

/// Context command names may also hold inner spaces ("User Info").
static CONTEXT_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-](?:[A-Za-z0-9_ -]{0,30}[A-Za-z0-9_-])?$").unwrap());

/// Check a command name or alias against the name pattern.
pub fn validate_name(name: &str) -> Result<(), EngineError> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(EngineError::InvalidName { name: name.to_string() })
    }
}

/// Check a context command name.
pub fn validate_context_name(name: &str) -> Result<(), EngineError> {
    if CONTEXT_NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(EngineError::InvalidName { name: name.to_string() })
    }
}

/// Synchronous validator for one text option value.
pub type OptionValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A positional option of a text command.
#[derive(Clone)]
pub struct TextOption {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub validator: Option<OptionValidator>,
}

impl TextOption {
    pub fn required(name: impl Into<String>) -> Self {
        Self { name: name.into(), description: String::new(), required: true, validator: None }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self { name: name.into(), description: String::new(), required: false, validator: None }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn validator(mut self, f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.validator = Some(Arc::new(f));
        self
    }

    pub fn accepts(&self, value: &str) -> bool {
        self.validator.as_ref().map_or(true, |v| v(value))
    }
}

impl fmt::Debug for TextOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextOption")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// Text-surface payload.
#[derive(Debug, Clone, Default)]
pub struct TextSpec {
    pub aliases: Vec<String>,
    pub options: Vec<TextOption>,
    /// Halt with `MissingArguments` / `InvalidArguments` before preconditions run.
    pub validate_options: bool,
}

/// Surface-specific part of a definition.
#[derive(Debug, Clone)]
pub enum CommandKind {
    /// Opaque option schema forwarded to the gateway.
    Structured { options: serde_json::Value },
    Text(TextSpec),
    Context { target: ContextTarget },
}

/// A command as registered in the engine.
#[derive(Clone)]
pub struct CommandDef {
    pub name: String,
    pub description: String,
    /// Cooldown window in milliseconds, 0 disables it.
    pub cooldown_ms: u64,
    pub required_caller_permissions: Permissions,
    pub required_agent_permissions: Permissions,
    pub allow_in_dm: bool,
    pub allow_bots: bool,
    pub execute: Option<Arc<dyn ExecuteHandler>>,
    pub halt: Option<Arc<dyn HaltHandler>>,
    pub preconditions: Vec<Arc<dyn Precondition>>,
    pub kind: CommandKind,
}

impl CommandDef {
    pub fn structured(name: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(name, CommandKind::Structured { options: serde_json::Value::Null })
    }

    pub fn text(name: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(name, CommandKind::Text(TextSpec::default()))
    }

    pub fn context(name: impl Into<String>, target: ContextTarget) -> CommandBuilder {
        CommandBuilder::new(name, CommandKind::Context { target })
    }

    pub fn surface(&self) -> SurfaceType {
        match self.kind {
            CommandKind::Structured { .. } => SurfaceType::Structured,
            CommandKind::Text(_) => SurfaceType::Text,
            CommandKind::Context { .. } => SurfaceType::Context,
        }
    }

    pub fn text_spec(&self) -> Option<&TextSpec> {
        match &self.kind {
            CommandKind::Text(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn aliases(&self) -> &[String] {
        self.text_spec().map_or(&[], |spec| spec.aliases.as_slice())
    }

    /// Primary name followed by every alias.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases().iter().map(String::as_str))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Check the definition invariants: name pattern, alias rules and, for
    /// text commands, unique option names with required options first.
    pub fn validate(&self) -> Result<(), EngineError> {
        match self.kind {
            CommandKind::Context { .. } => validate_context_name(&self.name)?,
            _ => validate_name(&self.name)?,
        }

        let Some(spec) = self.text_spec() else { return Ok(()) };

        for alias in &spec.aliases {
            validate_name(alias)?;
            if alias.eq_ignore_ascii_case(&self.name) {
                return Err(EngineError::DuplicateName {
                    surface: SurfaceType::Text,
                    name: alias.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        let mut optional_seen = false;
        for option in &spec.options {
            if !seen.insert(option.name.as_str()) {
                return Err(EngineError::DuplicateOption {
                    command: self.name.clone(),
                    option: option.name.clone(),
                });
            }
            if option.required && optional_seen {
                return Err(EngineError::InvalidOptionOrder {
                    command: self.name.clone(),
                    option: option.name.clone(),
                });
            }
            optional_seen |= !option.required;
        }
        Ok(())
    }

    /// Gateway-facing form. `None` for text commands.
    pub fn to_remote(&self) -> Option<RemoteCommand> {
        let (options, target) = match &self.kind {
            CommandKind::Structured { options } => (options.clone(), None),
            CommandKind::Context { target } => (serde_json::Value::Null, Some(*target)),
            CommandKind::Text(_) => return None,
        };
        Some(RemoteCommand {
            name: self.name.clone(),
            surface: self.surface(),
            description: self.description.clone(),
            target,
            options,
            default_member_permissions: self.required_caller_permissions,
            allow_in_dm: self.allow_in_dm,
        })
    }
}

impl fmt::Debug for CommandDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDef")
            .field("name", &self.name)
            .field("surface", &self.surface())
            .field("cooldown_ms", &self.cooldown_ms)
            .field("aliases", &self.aliases())
            .field("has_execute", &self.execute.is_some())
            .field("has_halt", &self.halt.is_some())
            .field("preconditions", &self.preconditions.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent builder for [`CommandDef`].
///
/// Text-only settings (`alias`, `option`, `validate_options`) have no effect
/// on other surfaces; `options` only applies to structured commands.
pub struct CommandBuilder {
    def: CommandDef,
}

impl CommandBuilder {
    fn new(name: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            def: CommandDef {
                name: name.into(),
                description: String::new(),
                cooldown_ms: 0,
                required_caller_permissions: Permissions::NONE,
                required_agent_permissions: Permissions::NONE,
                allow_in_dm: true,
                allow_bots: false,
                execute: None,
                halt: None,
                preconditions: Vec::new(),
                kind,
            },
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.def.description = description.into();
        self
    }

    pub fn cooldown_ms(mut self, millis: u64) -> Self {
        self.def.cooldown_ms = millis;
        self
    }

    pub fn cooldown(self, window: Duration) -> Self {
        let millis = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self.cooldown_ms(millis)
    }

    pub fn caller_permissions(mut self, permissions: Permissions) -> Self {
        self.def.required_caller_permissions = permissions;
        self
    }

    pub fn agent_permissions(mut self, permissions: Permissions) -> Self {
        self.def.required_agent_permissions = permissions;
        self
    }

    pub fn allow_in_dm(mut self, allow: bool) -> Self {
        self.def.allow_in_dm = allow;
        self
    }

    pub fn allow_bots(mut self, allow: bool) -> Self {
        self.def.allow_bots = allow;
        self
    }

    pub fn execute(mut self, handler: Arc<dyn ExecuteHandler>) -> Self {
        self.def.execute = Some(handler);
        self
    }

    pub fn halt(mut self, handler: Arc<dyn HaltHandler>) -> Self {
        self.def.halt = Some(handler);
        self
    }

    pub fn precondition(mut self, precondition: Arc<dyn Precondition>) -> Self {
        self.def.preconditions.push(precondition);
        self
    }

    pub fn options(mut self, schema: serde_json::Value) -> Self {
        if let CommandKind::Structured { options } = &mut self.def.kind {
            *options = schema;
        }
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        if let CommandKind::Text(spec) = &mut self.def.kind {
            let alias = alias.into();
            if !spec.aliases.contains(&alias) {
                spec.aliases.push(alias);
            }
        }
        self
    }

    pub fn option(mut self, option: TextOption) -> Self {
        if let CommandKind::Text(spec) = &mut self.def.kind {
            spec.options.push(option);
        }
        self
    }

    pub fn validate_options(mut self, validate: bool) -> Self {
        if let CommandKind::Text(spec) = &mut self.def.kind {
            spec.validate_options = validate;
        }
        self
    }

    pub fn build(self) -> Result<CommandDef, EngineError> {
        self.def.validate()?;
        Ok(self.def)
    }
}
