pub mod channel;
pub mod command;
pub mod context;
pub mod cooldown;
pub mod error;
pub mod event;
pub mod halt;
pub mod precondition;
pub mod traits;
pub mod types;

pub use channel::EventBus;
pub use command::{validate_context_name, validate_name, CommandBuilder, CommandDef, CommandKind, OptionValidator, TextOption, TextSpec};
pub use context::{CommandArgs, ExecuteContext, InboundEvent, InteractionEvent, MessageEvent, OptionValue};
pub use cooldown::{CooldownKey, CooldownRecord};
pub use error::{CommandError, EngineError};
pub use event::EngineEvent;
pub use halt::{HaltEvent, HaltKind, HaltReason};
pub use precondition::{precondition_fn, Precondition, PreconditionResult, Rejection};
pub use traits::{
    execute_fn, halt_fn, ExecuteHandler, GatewayClient, HaltHandler, NoopGateway, RegisterTarget, RemoteCommand,
};
pub use types::{Actor, ContextTarget, CooldownScope, ModuleState, Permissions, Scope, SurfaceType};

/// Version of the running engine, checked against module version ranges.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
