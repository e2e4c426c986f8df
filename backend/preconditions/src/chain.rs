/// Precondition chain.
///
/// Engine-level preconditions run first in registration order, followed by
/// the command's own list. The first rejection stops the chain; a
/// precondition that fails with an error rejects the invocation too.
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use switchboard_core::{ExecuteContext, HaltKind, Precondition, PreconditionResult};

use crate::builtin::{CooldownPrecondition, PermissionsPrecondition};
use crate::cooldown::CooldownTracker;

/// Result of running the chain for one invocation.
#[derive(Debug)]
pub enum ChainOutcome {
    Admitted,
    /// Stopped by the named precondition.
    Rejected { precondition: String, halt: HaltKind },
}

impl ChainOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// Ordered, shared list of engine-level preconditions. Clones share state.
#[derive(Default, Clone)]
pub struct PreconditionChain {
    preconditions: Arc<RwLock<Vec<Arc<dyn Precondition>>>>,
}

impl PreconditionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// `[permissions, cooldown]`: the bitmask comparison before the table lookup.
    pub fn with_defaults(cooldown: CooldownPrecondition) -> Self {
        let list: Vec<Arc<dyn Precondition>> = vec![Arc::new(PermissionsPrecondition), Arc::new(cooldown)];
        Self { preconditions: Arc::new(RwLock::new(list)) }
    }

    /// Default chain over a fresh cooldown table.
    pub fn standard(tracker: CooldownTracker) -> Self {
        Self::with_defaults(CooldownPrecondition::new(tracker))
    }

    /// Append a precondition after the existing ones.
    pub async fn push(&self, precondition: Arc<dyn Precondition>) {
        debug!(precondition = precondition.name(), "Precondition registered");
        self.preconditions.write().await.push(precondition);
    }

    /// Remove every precondition called `name`. Returns how many were removed.
    pub async fn remove(&self, name: &str) -> usize {
        let mut list = self.preconditions.write().await;
        let before = list.len();
        list.retain(|p| p.name() != name);
        before - list.len()
    }

    pub async fn names(&self) -> Vec<String> {
        self.preconditions.read().await.iter().map(|p| p.name().to_string()).collect()
    }

    pub async fn len(&self) -> usize {
        self.preconditions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.preconditions.read().await.is_empty()
    }

    /// Evaluate the chain for `ctx`.
    pub async fn run(&self, ctx: &ExecuteContext) -> ChainOutcome {
        // Snapshot so no lock is held across precondition awaits.
        let engine_level: Vec<Arc<dyn Precondition>> = self.preconditions.read().await.clone();

        for precondition in engine_level.iter().chain(ctx.command.preconditions.iter()) {
            let name = precondition.name();
            debug!(command = %ctx.command.name, precondition = name, "Running precondition");
            match precondition.check(ctx).await {
                Ok(PreconditionResult::Pass) => {}
                Ok(PreconditionResult::Reject(rejection)) => {
                    debug!(command = %ctx.command.name, precondition = name, ?rejection, "Precondition rejected");
                    return ChainOutcome::Rejected {
                        precondition: name.to_string(),
                        halt: HaltKind::from_rejection(name, rejection),
                    };
                }
                Err(e) => {
                    warn!(command = %ctx.command.name, precondition = name, error = %e, "Precondition failed");
                    let error = e.context(format!("precondition '{name}' failed"));
                    return ChainOutcome::Rejected {
                        precondition: name.to_string(),
                        halt: HaltKind::Error(Arc::new(error)),
                    };
                }
            }
        }
        ChainOutcome::Admitted
    }
}
