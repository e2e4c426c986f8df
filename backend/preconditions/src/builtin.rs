//! Built-in preconditions.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use switchboard_core::{
    CooldownKey, CooldownScope, ExecuteContext, Precondition, PreconditionResult, Rejection, SurfaceType,
};

use crate::cooldown::CooldownTracker;

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Caller and agent must hold every permission the command requires.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissionsPrecondition;

#[async_trait]
impl Precondition for PermissionsPrecondition {
    fn name(&self) -> &str {
        "permissions"
    }

    async fn check(&self, ctx: &ExecuteContext) -> Result<PreconditionResult> {
        let command = &ctx.command;

        let missing = ctx.actor().permissions.missing(command.required_caller_permissions);
        if !missing.is_empty() {
            debug!(command = %command.name, actor = %ctx.actor().id, %missing, "Caller lacks permissions");
            return Ok(PreconditionResult::Reject(Rejection::MissingCallerPermission(missing)));
        }

        let missing = ctx.event.agent_permissions().missing(command.required_agent_permissions);
        if !missing.is_empty() {
            debug!(command = %command.name, %missing, "Agent lacks permissions");
            return Ok(PreconditionResult::Reject(Rejection::MissingAgentPermission(missing)));
        }

        Ok(PreconditionResult::Pass)
    }
}

// ---------------------------------------------------------------------------
// Cooldown
// ---------------------------------------------------------------------------

/// Admits at most one invocation per cooldown window and starts the window
/// on admission.
#[derive(Debug, Clone)]
pub struct CooldownPrecondition {
    tracker: CooldownTracker,
    scope: CooldownScope,
    disabled: HashSet<SurfaceType>,
}

impl CooldownPrecondition {
    pub fn new(tracker: CooldownTracker) -> Self {
        Self { tracker, scope: CooldownScope::default(), disabled: HashSet::new() }
    }

    pub fn with_scope(mut self, scope: CooldownScope) -> Self {
        self.scope = scope;
        self
    }

    /// Skip cooldowns entirely on `surface`.
    pub fn disable_surface(mut self, surface: SurfaceType) -> Self {
        self.disabled.insert(surface);
        self
    }

    pub fn tracker(&self) -> &CooldownTracker {
        &self.tracker
    }

    pub fn key_for(&self, ctx: &ExecuteContext) -> CooldownKey {
        CooldownKey::new(
            ctx.command.name.clone(),
            ctx.surface,
            ctx.actor().id.clone(),
            self.scope.scope_id(ctx.scope()),
        )
    }
}

#[async_trait]
impl Precondition for CooldownPrecondition {
    fn name(&self) -> &str {
        "cooldown"
    }

    async fn check(&self, ctx: &ExecuteContext) -> Result<PreconditionResult> {
        if ctx.command.cooldown_ms == 0 || self.disabled.contains(&ctx.surface) {
            return Ok(PreconditionResult::Pass);
        }

        match self.tracker.try_start(self.key_for(ctx), ctx.command.cooldown_ms).await {
            Ok(_) => Ok(PreconditionResult::Pass),
            Err(active) => Ok(PreconditionResult::Reject(Rejection::Cooldown(active))),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::*;
    use switchboard_core::{
        Actor, CommandArgs, CommandDef, InboundEvent, MessageEvent, NoopGateway, Permissions, Scope,
    };

    pub(crate) fn text_ctx(def: CommandDef, actor: Actor, agent: Permissions) -> ExecuteContext {
        let event = InboundEvent::TextMessage(MessageEvent {
            id: "m1".into(),
            content: format!("!{}", def.name),
            actor,
            scope: Scope::guild("g1", "c1"),
            agent_permissions: agent,
            payload: serde_json::Value::Null,
        });
        ExecuteContext::new(Arc::new(def), Arc::new(event), CommandArgs::default(), Arc::new(NoopGateway))
    }

    #[tokio::test]
    async fn permissions_reports_missing_caller_bits() {
        let def = CommandDef::text("ban").caller_permissions(Permissions(0b110)).build().unwrap();
        let ctx = text_ctx(def, Actor::new("a").with_permissions(Permissions(0b010)), Permissions::ALL);
        let result = PermissionsPrecondition.check(&ctx).await.unwrap();
        assert_eq!(result, PreconditionResult::Reject(Rejection::MissingCallerPermission(Permissions(0b100))));
    }

    #[tokio::test]
    async fn permissions_checks_agent_after_caller() {
        let def = CommandDef::text("ban").agent_permissions(Permissions(0b1)).build().unwrap();
        let ctx = text_ctx(def, Actor::new("a"), Permissions::NONE);
        let result = PermissionsPrecondition.check(&ctx).await.unwrap();
        assert_eq!(result, PreconditionResult::Reject(Rejection::MissingAgentPermission(Permissions(0b1))));
    }

    #[tokio::test]
    async fn cooldown_admits_once_per_window() {
        let pre = CooldownPrecondition::new(CooldownTracker::new());
        let def = CommandDef::text("ping").cooldown_ms(10_000).build().unwrap();
        let ctx = text_ctx(def, Actor::new("a"), Permissions::NONE);

        assert!(pre.check(&ctx).await.unwrap().is_pass());
        match pre.check(&ctx).await.unwrap() {
            PreconditionResult::Reject(Rejection::Cooldown(record)) => {
                assert_eq!(record.command, "ping");
                assert_eq!(record.scope_id.as_deref(), Some("g1"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn cooldown_skips_zero_and_disabled_surfaces() {
        let tracker = CooldownTracker::new();
        let zero = CommandDef::text("free").build().unwrap();
        let ctx = text_ctx(zero, Actor::new("a"), Permissions::NONE);
        let pre = CooldownPrecondition::new(tracker.clone());
        assert!(pre.check(&ctx).await.unwrap().is_pass());
        assert!(pre.check(&ctx).await.unwrap().is_pass());

        let gated = CommandDef::text("ping").cooldown_ms(10_000).build().unwrap();
        let ctx = text_ctx(gated, Actor::new("a"), Permissions::NONE);
        let pre = CooldownPrecondition::new(tracker.clone()).disable_surface(SurfaceType::Text);
        assert!(pre.check(&ctx).await.unwrap().is_pass());
        assert!(pre.check(&ctx).await.unwrap().is_pass());
        assert!(tracker.is_empty().await);
    }
}
