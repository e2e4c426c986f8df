//! `switchboard-preconditions`: admission control for the Switchboard engine.
//!
//! - [`CooldownTracker`]: per-tuple rate-limit windows with atomic check-then-start
//! - [`PreconditionChain`]: ordered, short-circuiting admission checks
//! - [`PermissionsPrecondition`] / [`CooldownPrecondition`]: the built-ins

pub mod builtin;
pub mod chain;
pub mod cooldown;

pub use builtin::{CooldownPrecondition, PermissionsPrecondition};
pub use chain::{ChainOutcome, PreconditionChain};
pub use cooldown::{CooldownFilter, CooldownTracker};
