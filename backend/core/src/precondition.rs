//! Admission check contract.
//!
//! The chain that runs these lives in `switchboard-preconditions`; the trait
//! lives here because command definitions carry their own preconditions.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::context::ExecuteContext;
use crate::cooldown::CooldownRecord;
use crate::types::Permissions;

/// Why a precondition refused an invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// The actor is still inside a cooldown window.
    Cooldown(CooldownRecord),
    MissingCallerPermission(Permissions),
    MissingAgentPermission(Permissions),
    /// Any user-defined policy.
    Custom { message: String, payload: serde_json::Value },
}

impl Rejection {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom { message: message.into(), payload: serde_json::Value::Null }
    }
}

/// Outcome of one precondition.
#[derive(Debug, Clone, PartialEq)]
pub enum PreconditionResult {
    Pass,
    Reject(Rejection),
}

impl PreconditionResult {
    pub fn pass() -> Self {
        Self::Pass
    }

    pub fn reject(message: impl Into<String>) -> Self {
        Self::Reject(Rejection::custom(message))
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// A pluggable admission check run before a handler.
///
/// Returning `Err` halts the invocation with an `Error` halt.
#[async_trait]
pub trait Precondition: Send + Sync {
    /// Human-readable name for logging and halt payloads.
    fn name(&self) -> &str;

    async fn check(&self, ctx: &ExecuteContext) -> Result<PreconditionResult>;
}

struct FnPrecondition<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> Precondition for FnPrecondition<F>
where
    F: Fn(ExecuteContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PreconditionResult>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &ExecuteContext) -> Result<PreconditionResult> {
        (self.f)(ctx.clone()).await
    }
}

/// Wrap an async closure as a named [`Precondition`].
pub fn precondition_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn Precondition>
where
    F: Fn(ExecuteContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PreconditionResult>> + Send + 'static,
{
    Arc::new(FnPrecondition { name: name.into(), f })
}
