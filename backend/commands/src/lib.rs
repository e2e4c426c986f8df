pub mod detection;
pub mod dispatch;
pub mod engine;
pub mod halt;
pub mod registry;

pub use detection::{command_args, parse_text, resolve_options, ParsedText};
pub use dispatch::DispatchOutcome;
pub use engine::Engine;
pub use halt::{HaltPipeline, Resolution};
pub use registry::{CommandId, CommandRegistry, RegistryDiff};
