use crate::context::ExecuteContext;
use crate::error::CommandError;
use crate::halt::HaltEvent;
use crate::traits::RegisterTarget;
use crate::types::ModuleState;

/// Notifications published on the [`EventBus`](crate::channel::EventBus).
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A handler ran to completion.
    Executed(ExecuteContext),
    /// A dispatch halted and the halt is not error-class.
    Halted { event: HaltEvent, handled: bool },
    /// The registry was mutated.
    RegistryChanged { owner: Option<String>, added: usize, removed: usize },
    /// Structured and context commands were pushed to the gateway.
    RemoteCommandsRegistered { target: RegisterTarget, count: usize },
    ModuleStateChanged { module: String, from: ModuleState, to: ModuleState },
    /// An unhandled command failure.
    Error(CommandError),
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Executed(_) => "executed",
            Self::Halted { .. } => "halted",
            Self::RegistryChanged { .. } => "registry_changed",
            Self::RemoteCommandsRegistered { .. } => "remote_commands_registered",
            Self::ModuleStateChanged { .. } => "module_state_changed",
            Self::Error(_) => "error",
        }
    }

    /// Halt notifications, whether plain or error-class.
    pub fn is_halt_notification(&self) -> bool {
        matches!(self, Self::Halted { .. } | Self::Error(_))
    }
}

impl std::fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
