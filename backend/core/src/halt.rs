//! Halt events: the uniform failure outcome of a dispatch.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::ExecuteContext;
use crate::cooldown::CooldownRecord;
use crate::precondition::Rejection;
use crate::types::Permissions;

/// Payload-free tag of a [`HaltKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    Error,
    CooldownActive,
    MissingHandler,
    PreconditionRejected,
    MissingCallerPermission,
    MissingAgentPermission,
    MissingArguments,
    InvalidArguments,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        f.write_str(&s)
    }
}

/// Why a dispatch halted, with the reason-specific payload.
#[derive(Debug, Clone)]
pub enum HaltKind {
    /// The handler (or a precondition) returned an error.
    Error(Arc<anyhow::Error>),
    CooldownActive(CooldownRecord),
    MissingHandler,
    PreconditionRejected {
        precondition: String,
        message: String,
        payload: serde_json::Value,
    },
    MissingCallerPermission { missing: Permissions },
    MissingAgentPermission { missing: Permissions },
    /// Required text options that were not supplied.
    MissingArguments { options: Vec<String> },
    /// Text options whose validator refused the value.
    InvalidArguments { options: Vec<String> },
}

impl HaltKind {
    pub fn reason(&self) -> HaltReason {
        match self {
            Self::Error(_) => HaltReason::Error,
            Self::CooldownActive(_) => HaltReason::CooldownActive,
            Self::MissingHandler => HaltReason::MissingHandler,
            Self::PreconditionRejected { .. } => HaltReason::PreconditionRejected,
            Self::MissingCallerPermission { .. } => HaltReason::MissingCallerPermission,
            Self::MissingAgentPermission { .. } => HaltReason::MissingAgentPermission,
            Self::MissingArguments { .. } => HaltReason::MissingArguments,
            Self::InvalidArguments { .. } => HaltReason::InvalidArguments,
        }
    }

    /// Map a precondition rejection to the matching halt.
    pub fn from_rejection(precondition: &str, rejection: Rejection) -> Self {
        match rejection {
            Rejection::Cooldown(record) => Self::CooldownActive(record),
            Rejection::MissingCallerPermission(missing) => Self::MissingCallerPermission { missing },
            Rejection::MissingAgentPermission(missing) => Self::MissingAgentPermission { missing },
            Rejection::Custom { message, payload } => Self::PreconditionRejected {
                precondition: precondition.to_string(),
                message,
                payload,
            },
        }
    }
}

/// A halted invocation, consumed synchronously by the halt pipeline.
#[derive(Debug, Clone)]
pub struct HaltEvent {
    pub context: ExecuteContext,
    pub kind: HaltKind,
}

impl HaltEvent {
    pub fn new(context: ExecuteContext, kind: HaltKind) -> Self {
        Self { context, kind }
    }

    pub fn error(context: ExecuteContext, error: anyhow::Error) -> Self {
        Self::new(context, HaltKind::Error(Arc::new(error)))
    }

    pub fn reason(&self) -> HaltReason {
        self.kind.reason()
    }

    /// The caught error, for `Error` halts.
    pub fn caught_error(&self) -> Option<&anyhow::Error> {
        match &self.kind {
            HaltKind::Error(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    /// The active cooldown, for `CooldownActive` halts.
    pub fn cooldown(&self) -> Option<&CooldownRecord> {
        match &self.kind {
            HaltKind::CooldownActive(record) => Some(record),
            _ => None,
        }
    }
}
