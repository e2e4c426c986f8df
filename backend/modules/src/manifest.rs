/// Module manifest: identity, declared version and the engine versions a
/// module supports.
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use switchboard_core::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleManifest {
    pub id: String,
    /// Semver version of the module itself.
    pub version: String,
    /// Semver range of compatible engine versions, e.g. `^0.1`.
    pub engine_versions: String,
    #[serde(default)]
    pub description: String,
}

impl ModuleManifest {
    pub fn new(id: impl Into<String>, version: impl Into<String>, engine_versions: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            engine_versions: engine_versions.into(),
            description: String::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Validate the manifest for required fields and well-formed versions.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.id.trim().is_empty() {
            return Err(EngineError::InvalidName { name: self.id.clone() });
        }
        self.parsed_version()?;
        self.engine_range()?;
        Ok(())
    }

    pub fn parsed_version(&self) -> Result<Version, EngineError> {
        Version::parse(&self.version).map_err(|e| self.invalid(format!("version '{}': {e}", self.version)))
    }

    pub fn engine_range(&self) -> Result<VersionReq, EngineError> {
        VersionReq::parse(&self.engine_versions)
            .map_err(|e| self.invalid(format!("engine range '{}': {e}", self.engine_versions)))
    }

    /// Fail with `IncompatibleVersion` unless `engine` satisfies the
    /// declared range.
    pub fn check_compatible(&self, engine: &str) -> Result<(), EngineError> {
        let range = self.engine_range()?;
        let running = Version::parse(engine).map_err(|e| self.invalid(format!("engine version '{engine}': {e}")))?;
        if range.matches(&running) {
            Ok(())
        } else {
            Err(EngineError::IncompatibleVersion {
                module: self.id.clone(),
                required: self.engine_versions.clone(),
                engine: engine.to_string(),
            })
        }
    }

    fn invalid(&self, message: String) -> EngineError {
        EngineError::InvalidVersionRange { module: self.id.clone(), message }
    }
}
