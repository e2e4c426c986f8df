//! Module lifecycle: installable bundles of commands with start, load and
//! unload hooks and an engine version range.

pub mod lifecycle;
pub mod manager;
pub mod manifest;

pub use lifecycle::{Module, UnloadReason};
pub use manager::{ModuleInfo, ModuleManager, StartOptions};
pub use manifest::ModuleManifest;
