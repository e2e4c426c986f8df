use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{ExecuteContext, InboundEvent};
use crate::halt::HaltEvent;
use crate::types::{ContextTarget, Permissions, SurfaceType};

/// Runs a command once it has been admitted.
#[async_trait]
pub trait ExecuteHandler: Send + Sync {
    async fn execute(&self, ctx: &ExecuteContext) -> Result<()>;
}

/// Gets first refusal on a halted invocation of its command.
///
/// Return `Ok(true)` when the halt was handled (e.g. the user was told about
/// the cooldown) and observers need not treat it as unhandled.
#[async_trait]
pub trait HaltHandler: Send + Sync {
    async fn halt(&self, event: &HaltEvent) -> Result<bool>;
}

struct FnExecute<F>(F);

#[async_trait]
impl<F, Fut> ExecuteHandler for FnExecute<F>
where
    F: Fn(ExecuteContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn execute(&self, ctx: &ExecuteContext) -> Result<()> {
        (self.0)(ctx.clone()).await
    }
}

struct FnHalt<F>(F);

#[async_trait]
impl<F, Fut> HaltHandler for FnHalt<F>
where
    F: Fn(HaltEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    async fn halt(&self, event: &HaltEvent) -> Result<bool> {
        (self.0)(event.clone()).await
    }
}

/// Wrap an async closure as an [`ExecuteHandler`].
pub fn execute_fn<F, Fut>(f: F) -> Arc<dyn ExecuteHandler>
where
    F: Fn(ExecuteContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnExecute(f))
}

/// Wrap an async closure as a [`HaltHandler`].
pub fn halt_fn<F, Fut>(f: F) -> Arc<dyn HaltHandler>
where
    F: Fn(HaltEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    Arc::new(FnHalt(f))
}

// ---------------------------------------------------------------------------
// Gateway boundary
// ---------------------------------------------------------------------------

/// Definition of a structured or context command as sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub name: String,
    pub surface: SurfaceType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ContextTarget>,
    /// Opaque structured-option schema.
    #[serde(default)]
    pub options: serde_json::Value,
    pub default_member_permissions: Permissions,
    pub allow_in_dm: bool,
}

/// Where remote commands are registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegisterTarget {
    Global,
    Guild { guild_id: String },
}

/// The messaging gateway client, as seen by the engine.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Replace the remote command set for `target`.
    async fn register_commands(&self, commands: &[RemoteCommand], target: &RegisterTarget) -> Result<()>;

    /// Send a reply to the channel or interaction `event` came from.
    async fn reply(&self, event: &InboundEvent, content: &str) -> Result<()>;
}

/// Gateway that accepts everything and sends nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGateway;

#[async_trait]
impl GatewayClient for NoopGateway {
    async fn register_commands(&self, commands: &[RemoteCommand], target: &RegisterTarget) -> Result<()> {
        debug!(count = commands.len(), ?target, "NoopGateway: register_commands");
        Ok(())
    }

    async fn reply(&self, event: &InboundEvent, content: &str) -> Result<()> {
        debug!(event = %event.id(), content, "NoopGateway: reply");
        Ok(())
    }
}
