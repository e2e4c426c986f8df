//! Inbound gateway events and the per-invocation execute context.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::command::CommandDef;
use crate::traits::GatewayClient;
use crate::types::{Actor, Permissions, Scope, SurfaceType};

/// A structured or context-action interaction delivered by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub id: String,
    pub command_name: String,
    pub actor: Actor,
    pub scope: Scope,
    /// Permissions the engine's own account holds in `scope`.
    #[serde(default)]
    pub agent_permissions: Permissions,
    /// Already acknowledged by something else before reaching the engine.
    #[serde(default)]
    pub replied: bool,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A plain text message delivered by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub id: String,
    pub content: String,
    pub actor: Actor,
    pub scope: Scope,
    #[serde(default)]
    pub agent_permissions: Permissions,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Typed inbound event, one variant per surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    StructuredInvoked(InteractionEvent),
    TextMessage(MessageEvent),
    ContextInvoked(InteractionEvent),
}

impl InboundEvent {
    pub fn surface(&self) -> SurfaceType {
        match self {
            Self::StructuredInvoked(_) => SurfaceType::Structured,
            Self::TextMessage(_) => SurfaceType::Text,
            Self::ContextInvoked(_) => SurfaceType::Context,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::StructuredInvoked(e) | Self::ContextInvoked(e) => &e.id,
            Self::TextMessage(e) => &e.id,
        }
    }

    pub fn actor(&self) -> &Actor {
        match self {
            Self::StructuredInvoked(e) | Self::ContextInvoked(e) => &e.actor,
            Self::TextMessage(e) => &e.actor,
        }
    }

    pub fn scope(&self) -> &Scope {
        match self {
            Self::StructuredInvoked(e) | Self::ContextInvoked(e) => &e.scope,
            Self::TextMessage(e) => &e.scope,
        }
    }

    pub fn agent_permissions(&self) -> Permissions {
        match self {
            Self::StructuredInvoked(e) | Self::ContextInvoked(e) => e.agent_permissions,
            Self::TextMessage(e) => e.agent_permissions,
        }
    }

    pub fn payload(&self) -> &serde_json::Value {
        match self {
            Self::StructuredInvoked(e) | Self::ContextInvoked(e) => &e.payload,
            Self::TextMessage(e) => &e.payload,
        }
    }
}

/// One resolved text option after validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionValue {
    pub name: String,
    pub value: Option<String>,
    pub required: bool,
    pub missing: bool,
    pub invalid: bool,
}

/// Arguments of a text invocation. Empty for the other surfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandArgs {
    /// Everything after the command token.
    pub raw: String,
    /// Positional tokens split on the configured separator.
    pub positional: Vec<String>,
    /// Named values, in declaration order, when the command declares options.
    pub options: Vec<OptionValue>,
}

impl CommandArgs {
    /// Value of a declared option by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.value.as_deref())
    }

    pub fn missing(&self) -> Vec<&OptionValue> {
        self.options.iter().filter(|o| o.missing).collect()
    }

    pub fn invalid(&self) -> Vec<&OptionValue> {
        self.options.iter().filter(|o| o.invalid).collect()
    }
}

/// Everything a precondition or handler needs about one invocation.
///
/// Cheap to clone; never persisted.
#[derive(Clone)]
pub struct ExecuteContext {
    pub invocation_id: Uuid,
    pub surface: SurfaceType,
    pub command: Arc<CommandDef>,
    pub event: Arc<InboundEvent>,
    pub args: Arc<CommandArgs>,
    pub gateway: Arc<dyn GatewayClient>,
}

impl ExecuteContext {
    pub fn new(
        command: Arc<CommandDef>,
        event: Arc<InboundEvent>,
        args: CommandArgs,
        gateway: Arc<dyn GatewayClient>,
    ) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            surface: command.surface(),
            command,
            event,
            args: Arc::new(args),
            gateway,
        }
    }

    pub fn command_name(&self) -> &str {
        &self.command.name
    }

    pub fn actor(&self) -> &Actor {
        self.event.actor()
    }

    pub fn scope(&self) -> &Scope {
        self.event.scope()
    }

    /// Reply to the triggering event through the gateway.
    pub async fn reply(&self, content: &str) -> anyhow::Result<()> {
        self.gateway.reply(&self.event, content).await
    }
}

impl fmt::Debug for ExecuteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteContext")
            .field("invocation_id", &self.invocation_id)
            .field("surface", &self.surface)
            .field("command", &self.command.name)
            .field("actor", &self.actor().id)
            .field("args", &self.args)
            .finish()
    }
}
