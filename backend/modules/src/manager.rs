/// Module manager: owns the live collection of installed modules and drives
/// each through Started → Loaded → Unloaded, keeping the command registry in
/// step with what every module contributed.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use switchboard_commands::{CommandId, Engine};
use switchboard_core::{CommandDef, EngineError, EngineEvent, ModuleState, ENGINE_VERSION};

use crate::lifecycle::{Module, UnloadReason};
use crate::manifest::ModuleManifest;

#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    /// Merge the module's commands into the registry right after start
    /// instead of at load.
    pub register_commands: bool,
    pub skip_version_check: bool,
}

/// Snapshot of an installed module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
    pub manifest: ModuleManifest,
    pub state: ModuleState,
    pub commands: Vec<CommandId>,
}

struct ModuleRecord {
    module: Arc<dyn Module>,
    manifest: ModuleManifest,
    state: ModuleState,
    merged: bool,
}

/// Ids whose start hook is running.
type Starting = Arc<Mutex<HashSet<String>>>;

/// Claim on a module id, released on drop.
struct Reservation {
    starting: Starting,
    id: String,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.starting.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.id);
    }
}

#[derive(Clone)]
pub struct ModuleManager {
    engine: Engine,
    engine_version: String,
    modules: Arc<RwLock<HashMap<String, ModuleRecord>>>,
    starting: Starting,
}

impl ModuleManager {
    pub fn new(engine: Engine) -> Self {
        Self::with_engine_version(engine, ENGINE_VERSION)
    }

    /// Manager that checks modules against `version` instead of the
    /// crate version.
    pub fn with_engine_version(engine: Engine, version: impl Into<String>) -> Self {
        Self {
            engine,
            engine_version: version.into(),
            modules: Arc::new(RwLock::new(HashMap::new())),
            starting: Arc::default(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Check, start and record `module`. Returns its id.
    pub async fn start(&self, module: Arc<dyn Module>, options: StartOptions) -> Result<String, EngineError> {
        let manifest = module.manifest();
        manifest.validate()?;
        let id = manifest.id.clone();
        self.check_version(&manifest, options)?;

        let _reservation = self.reserve(&id)?;
        if self.modules.read().await.contains_key(&id) {
            return Err(EngineError::DuplicateModule(id));
        }

        match module.start(&self.engine).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(module = %id, "Module declined to start");
                return Err(EngineError::ModuleRejected(id));
            }
            Err(source) => return Err(EngineError::ModuleStart { module: id, source }),
        }

        self.modules.write().await.insert(
            id.clone(),
            ModuleRecord { module: module.clone(), manifest: manifest.clone(), state: ModuleState::Started, merged: false },
        );
        self.transition(&id, ModuleState::Discovered, ModuleState::Started);
        info!(module = %id, version = %manifest.version, "Module started");

        if options.register_commands {
            let merged = match module.commands() {
                Ok(defs) => self.merge(&id, defs).await,
                Err(source) => Err(EngineError::ModuleStart { module: id.clone(), source }),
            };
            if let Err(e) = merged {
                warn!(module = %id, error = %e, "Module commands rejected");
                self.discard(&id, ModuleState::Started).await;
                return Err(e);
            }
        }
        Ok(id)
    }

    /// Load started modules one after another, in the given order.
    ///
    /// Stops at the first failure; modules before it stay loaded.
    pub async fn load(&self, ids: &[&str]) -> Result<(), EngineError> {
        for &id in ids {
            let (module, state, merged) = {
                let modules = self.modules.read().await;
                let record = modules.get(id).ok_or_else(|| EngineError::ModuleNotFound(id.to_string()))?;
                (record.module.clone(), record.state, record.merged)
            };
            if state == ModuleState::Loaded {
                debug!(module = %id, "Module already loaded");
                continue;
            }

            if !merged {
                let merged = match module.commands() {
                    Ok(defs) => self.merge(id, defs).await,
                    Err(source) => Err(EngineError::ModuleLoad { module: id.to_string(), source }),
                };
                if let Err(e) = merged {
                    warn!(module = %id, error = %e, "Module commands rejected");
                    self.discard(id, state).await;
                    return Err(e);
                }
            }

            if let Err(source) = module.load(&self.engine).await {
                warn!(module = %id, error = %source, "Module failed to load");
                self.engine.registry().unregister_all(id).await;
                self.discard(id, state).await;
                return Err(EngineError::ModuleLoad { module: id.to_string(), source });
            }

            if let Some(record) = self.modules.write().await.get_mut(id) {
                record.state = ModuleState::Loaded;
            }
            self.transition(id, state, ModuleState::Loaded);
            info!(module = %id, "Module loaded");
        }
        Ok(())
    }

    /// Unload modules, best effort. Unknown ids and failing unload hooks are
    /// logged and skipped. Returns the number of modules unloaded.
    pub async fn unload(&self, ids: &[&str], reason: &UnloadReason) -> usize {
        let mut unloaded = 0;
        for &id in ids {
            let Some(record) = self.modules.write().await.remove(id) else {
                warn!(module = %id, "Cannot unload unknown module");
                continue;
            };

            if let Err(e) = record.module.unload(&self.engine, reason).await {
                warn!(module = %id, %reason, error = %e, "Unload hook failed");
            }
            let removed = self.engine.registry().unregister_all(id).await;
            self.transition(id, record.state, ModuleState::Unloaded);
            info!(module = %id, %reason, commands = removed.len(), "Module unloaded");
            unloaded += 1;
        }
        unloaded
    }

    /// Unload every installed module.
    pub async fn unload_all(&self, reason: &UnloadReason) -> usize {
        let mut ids: Vec<String> = self.modules.read().await.keys().cloned().collect();
        ids.sort();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        self.unload(&ids, reason).await
    }

    /// Start and load in one step.
    pub async fn install(&self, module: Arc<dyn Module>, options: StartOptions) -> Result<String, EngineError> {
        let id = self.start(module, options).await?;
        self.load(&[&id]).await?;
        Ok(id)
    }

    /// Swap the installed module with the same id for `module`, or install it
    /// if there is none.
    ///
    /// The new instance is checked, started and loaded, and its commands are
    /// swapped in atomically, before the old instance is unloaded. On any
    /// failure the old instance and its commands stay in place.
    pub async fn replace(&self, module: Arc<dyn Module>, options: StartOptions) -> Result<String, EngineError> {
        let manifest = module.manifest();
        manifest.validate()?;
        let id = manifest.id.clone();
        self.check_version(&manifest, options)?;

        let reservation = self.reserve(&id)?;
        let current = self.modules.read().await.get(&id).map(|r| (r.module.clone(), r.state, r.merged));
        let Some((old, old_state, old_merged)) = current else {
            drop(reservation);
            return self.install(module, options).await;
        };

        match module.start(&self.engine).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(module = %id, "Replacement declined to start");
                return Err(EngineError::ModuleRejected(id));
            }
            Err(source) => return Err(EngineError::ModuleStart { module: id, source }),
        }

        let defs = match module.commands() {
            Ok(defs) => defs,
            Err(source) => {
                self.abandon(&id, module.as_ref()).await;
                return Err(EngineError::ModuleStart { module: id, source });
            }
        };
        let diff = match self.engine.registry().replace_module(&id, defs).await {
            Ok(diff) => diff,
            Err(e) => {
                self.abandon(&id, module.as_ref()).await;
                return Err(e);
            }
        };

        if let Err(source) = module.load(&self.engine).await {
            warn!(module = %id, error = %source, "Replacement failed to load");
            self.restore(&id, old.as_ref(), old_merged).await;
            self.abandon(&id, module.as_ref()).await;
            return Err(EngineError::ModuleLoad { module: id, source });
        }

        self.modules.write().await.insert(
            id.clone(),
            ModuleRecord { module, manifest: manifest.clone(), state: ModuleState::Loaded, merged: true },
        );
        drop(reservation);

        if let Err(e) = old.unload(&self.engine, &UnloadReason::Reload).await {
            warn!(module = %id, error = %e, "Unload hook failed");
        }
        self.transition(&id, old_state, ModuleState::Unloaded);
        self.transition(&id, ModuleState::Discovered, ModuleState::Started);
        self.transition(&id, ModuleState::Started, ModuleState::Loaded);
        info!(
            module = %id,
            version = %manifest.version,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "Module replaced"
        );
        Ok(id)
    }

    pub async fn uninstall(&self, id: &str) -> Result<(), EngineError> {
        if self.unload(&[id], &UnloadReason::Uninstall).await == 0 {
            return Err(EngineError::ModuleNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Installed modules, sorted by id.
    pub async fn list(&self) -> Vec<ModuleInfo> {
        let snapshot: Vec<(ModuleManifest, ModuleState)> = {
            let modules = self.modules.read().await;
            modules.values().map(|r| (r.manifest.clone(), r.state)).collect()
        };
        let mut infos = Vec::with_capacity(snapshot.len());
        for (manifest, state) in snapshot {
            let commands = self.engine.registry().owned_by(&manifest.id).await;
            infos.push(ModuleInfo { manifest, state, commands });
        }
        infos.sort_by(|a, b| a.manifest.id.cmp(&b.manifest.id));
        infos
    }

    pub async fn get(&self, id: &str) -> Option<ModuleInfo> {
        let (manifest, state) = {
            let modules = self.modules.read().await;
            let record = modules.get(id)?;
            (record.manifest.clone(), record.state)
        };
        let commands = self.engine.registry().owned_by(id).await;
        Some(ModuleInfo { manifest, state, commands })
    }

    pub async fn state(&self, id: &str) -> Option<ModuleState> {
        self.modules.read().await.get(id).map(|r| r.state)
    }

    pub async fn len(&self) -> usize {
        self.modules.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.modules.read().await.is_empty()
    }

    fn check_version(&self, manifest: &ModuleManifest, options: StartOptions) -> Result<(), EngineError> {
        if options.skip_version_check || self.engine.config().modules.disable_version_check {
            debug!(module = %manifest.id, "Version check skipped");
            return Ok(());
        }
        manifest.check_compatible(&self.engine_version)
    }

    /// Claim `id` for the duration of a start hook.
    fn reserve(&self, id: &str) -> Result<Reservation, EngineError> {
        let mut starting = self.starting.lock().unwrap_or_else(PoisonError::into_inner);
        if !starting.insert(id.to_string()) {
            return Err(EngineError::DuplicateModule(id.to_string()));
        }
        Ok(Reservation { starting: self.starting.clone(), id: id.to_string() })
    }

    async fn merge(&self, id: &str, defs: Vec<CommandDef>) -> Result<(), EngineError> {
        let added = self.engine.registry().register_all(defs, Some(id)).await?;
        debug!(module = %id, commands = added.len(), "Module commands merged");
        if let Some(record) = self.modules.write().await.get_mut(id) {
            record.merged = true;
        }
        Ok(())
    }

    /// Drop a module that failed partway and mark it unloaded.
    async fn discard(&self, id: &str, from: ModuleState) {
        self.modules.write().await.remove(id);
        self.transition(id, from, ModuleState::Unloaded);
    }

    /// Put the old instance's commands back after a failed replace.
    async fn restore(&self, id: &str, old: &dyn Module, merged: bool) {
        let registry = self.engine.registry();
        if !merged {
            registry.unregister_all(id).await;
            return;
        }
        let restored = match old.commands() {
            Ok(defs) => registry.replace_module(id, defs).await.map(|_| ()).map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };
        if let Err(e) = restored {
            warn!(module = %id, error = %e, "Could not restore module commands");
        }
    }

    /// Run the unload hook of a replacement that never took over.
    async fn abandon(&self, id: &str, module: &dyn Module) {
        let reason = UnloadReason::Other("replace aborted".into());
        if let Err(e) = module.unload(&self.engine, &reason).await {
            warn!(module = %id, error = %e, "Unload hook failed");
        }
    }

    fn transition(&self, id: &str, from: ModuleState, to: ModuleState) {
        self.engine.bus().publish(EngineEvent::ModuleStateChanged { module: id.to_string(), from, to });
    }
}

impl std::fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleManager").field("engine_version", &self.engine_version).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::*;
    use switchboard_config::SwitchboardConfig;
    use switchboard_core::{execute_fn, CommandDef, NoopGateway, SurfaceType};

    struct TestModule {
        id: &'static str,
        engine_versions: &'static str,
        commands: Vec<&'static str>,
        accept: bool,
        fail_start: bool,
        fail_load: bool,
        fail_unload: bool,
        loads: Arc<Mutex<Vec<String>>>,
        unloads: Arc<Mutex<Vec<UnloadReason>>>,
        starts: AtomicUsize,
    }

    impl TestModule {
        fn new(id: &'static str, commands: Vec<&'static str>) -> Self {
            Self {
                id,
                engine_versions: "^0.1",
                commands,
                accept: true,
                fail_start: false,
                fail_load: false,
                fail_unload: false,
                loads: Arc::default(),
                unloads: Arc::default(),
                starts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Module for TestModule {
        fn manifest(&self) -> ModuleManifest {
            ModuleManifest::new(self.id, "1.0.0", self.engine_versions)
        }

        async fn start(&self, _engine: &Engine) -> Result<bool> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_start {
                return Err(anyhow!("no database"));
            }
            Ok(self.accept)
        }

        async fn load(&self, _engine: &Engine) -> Result<()> {
            if self.fail_load {
                return Err(anyhow!("load exploded"));
            }
            self.loads.lock().unwrap().push(self.id.to_string());
            Ok(())
        }

        async fn unload(&self, _engine: &Engine, reason: &UnloadReason) -> Result<()> {
            self.unloads.lock().unwrap().push(reason.clone());
            if self.fail_unload {
                return Err(anyhow!("unload exploded"));
            }
            Ok(())
        }

        fn commands(&self) -> Result<Vec<CommandDef>> {
            let defs = self
                .commands
                .iter()
                .map(|name| CommandDef::text(*name).execute(execute_fn(|_ctx| async { Ok(()) })).build())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(defs)
        }
    }

    fn manager() -> ModuleManager {
        ModuleManager::with_engine_version(Engine::standalone(), "0.1.4")
    }

    async fn has(manager: &ModuleManager, name: &str) -> bool {
        manager.engine().registry().lookup(SurfaceType::Text, name).await.is_some()
    }

    fn transitions(rx: &mut tokio::sync::broadcast::Receiver<EngineEvent>) -> Vec<(String, ModuleState, ModuleState)> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let EngineEvent::ModuleStateChanged { module, from, to } = event {
                out.push((module, from, to));
            }
        }
        out
    }

    #[tokio::test]
    async fn install_registers_commands_and_reports_states() {
        let manager = manager();
        let mut rx = manager.engine().subscribe();

        let id = manager.install(Arc::new(TestModule::new("greeter", vec!["hello", "bye"])), StartOptions::default()).await.unwrap();
        assert_eq!(id, "greeter");
        assert_eq!(manager.state("greeter").await, Some(ModuleState::Loaded));
        assert!(has(&manager, "hello").await);
        assert_eq!(manager.engine().registry().owner_of(SurfaceType::Text, "bye").await.as_deref(), Some("greeter"));

        assert_eq!(
            transitions(&mut rx),
            vec![
                ("greeter".to_string(), ModuleState::Discovered, ModuleState::Started),
                ("greeter".to_string(), ModuleState::Started, ModuleState::Loaded),
            ]
        );

        let info = manager.get("greeter").await.unwrap();
        assert_eq!(info.commands.len(), 2);
        assert_eq!(manager.list().await.len(), 1);
    }

    #[tokio::test]
    async fn commands_merge_at_start_when_asked() {
        let manager = manager();
        let options = StartOptions { register_commands: true, ..StartOptions::default() };
        manager.start(Arc::new(TestModule::new("greeter", vec!["hello"])), options).await.unwrap();
        assert_eq!(manager.state("greeter").await, Some(ModuleState::Started));
        assert!(has(&manager, "hello").await);

        manager.load(&["greeter"]).await.unwrap();
        assert_eq!(manager.state("greeter").await, Some(ModuleState::Loaded));
        assert_eq!(manager.engine().registry().len().await, 1);
    }

    #[tokio::test]
    async fn unload_removes_only_own_commands() {
        let manager = manager();
        manager.install(Arc::new(TestModule::new("a", vec!["ping"])), StartOptions::default()).await.unwrap();
        manager.install(Arc::new(TestModule::new("b", vec!["pong"])), StartOptions::default()).await.unwrap();

        assert_eq!(manager.unload(&["a"], &UnloadReason::Shutdown).await, 1);
        assert!(!has(&manager, "ping").await);
        assert!(has(&manager, "pong").await);
        assert_eq!(manager.state("a").await, None);
        assert_eq!(manager.state("b").await, Some(ModuleState::Loaded));
    }

    #[tokio::test]
    async fn version_mismatch_is_rejected_unless_skipped() {
        let manager = manager();
        let mut module = TestModule::new("legacy", vec!["old"]);
        module.engine_versions = "^6";
        let module = Arc::new(module);

        let err = manager.install(module.clone(), StartOptions::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::IncompatibleVersion { ref required, .. } if required == "^6"));
        assert_eq!(module.starts.load(Ordering::SeqCst), 0);
        assert!(manager.is_empty().await);

        let options = StartOptions { skip_version_check: true, ..StartOptions::default() };
        manager.install(module, options).await.unwrap();
        assert!(has(&manager, "old").await);
    }

    #[tokio::test]
    async fn version_check_can_be_disabled_in_config() {
        let mut config = SwitchboardConfig::default();
        config.modules.disable_version_check = true;
        let manager = ModuleManager::new(Engine::new(config, Arc::new(NoopGateway)));
        let mut module = TestModule::new("legacy", vec![]);
        module.engine_versions = "^6";
        manager.install(Arc::new(module), StartOptions::default()).await.unwrap();
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test]
    async fn start_failures() {
        let manager = manager();
        manager.start(Arc::new(TestModule::new("a", vec![])), StartOptions::default()).await.unwrap();
        let err = manager.start(Arc::new(TestModule::new("a", vec![])), StartOptions::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::DuplicateModule(ref id) if id == "a"));

        let mut declined = TestModule::new("declined", vec![]);
        declined.accept = false;
        let err = manager.start(Arc::new(declined), StartOptions::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::ModuleRejected(_)));

        let mut broken = TestModule::new("broken", vec![]);
        broken.fail_start = true;
        let err = manager.start(Arc::new(broken), StartOptions::default()).await.unwrap_err();
        assert!(err.to_string().contains("no database"));

        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test]
    async fn failed_load_rolls_back_commands() {
        let manager = manager();
        let mut rx = manager.engine().subscribe();
        let mut module = TestModule::new("flaky", vec!["flaky"]);
        module.fail_load = true;

        let err = manager.install(Arc::new(module), StartOptions::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::ModuleLoad { ref module, .. } if module == "flaky"));
        assert!(!has(&manager, "flaky").await);
        assert_eq!(manager.state("flaky").await, None);
        assert_eq!(
            transitions(&mut rx).last(),
            Some(&("flaky".to_string(), ModuleState::Started, ModuleState::Unloaded))
        );
    }

    #[tokio::test]
    async fn load_runs_in_given_order_and_stops_at_failure() {
        let manager = manager();
        let loads = Arc::new(Mutex::new(Vec::new()));
        for (id, fail) in [("first", false), ("second", true), ("third", false)] {
            let mut module = TestModule::new(id, vec![]);
            module.fail_load = fail;
            module.loads = loads.clone();
            manager.start(Arc::new(module), StartOptions::default()).await.unwrap();
        }

        let err = manager.load(&["third", "first", "second"]).await.unwrap_err();
        assert!(matches!(err, EngineError::ModuleLoad { ref module, .. } if module == "second"));
        assert_eq!(*loads.lock().unwrap(), vec!["third".to_string(), "first".to_string()]);
        assert_eq!(manager.state("third").await, Some(ModuleState::Loaded));
        assert_eq!(manager.state("first").await, Some(ModuleState::Loaded));
        assert_eq!(manager.state("second").await, None);

        let err = manager.load(&["missing"]).await.unwrap_err();
        assert!(matches!(err, EngineError::ModuleNotFound(_)));
    }

    #[tokio::test]
    async fn unload_is_best_effort() {
        let manager = manager();
        let mut noisy = TestModule::new("noisy", vec!["noise"]);
        noisy.fail_unload = true;
        manager.install(Arc::new(noisy), StartOptions::default()).await.unwrap();
        manager.install(Arc::new(TestModule::new("quiet", vec!["hush"])), StartOptions::default()).await.unwrap();

        assert_eq!(manager.unload(&["noisy", "ghost", "quiet"], &UnloadReason::Shutdown).await, 2);
        assert!(manager.engine().registry().is_empty().await);
        assert!(manager.is_empty().await);
    }

    #[tokio::test]
    async fn replace_reloads_module() {
        let manager = manager();
        let old = TestModule::new("greeter", vec!["hello", "hey"]);
        let unloads = old.unloads.clone();
        manager.install(Arc::new(old), StartOptions::default()).await.unwrap();
        let mut rx = manager.engine().subscribe();

        manager.replace(Arc::new(TestModule::new("greeter", vec!["hey", "hi"])), StartOptions::default()).await.unwrap();
        assert_eq!(*unloads.lock().unwrap(), vec![UnloadReason::Reload]);
        assert!(!has(&manager, "hello").await);
        assert!(has(&manager, "hi").await);
        assert_eq!(
            manager.engine().registry().owned_by("greeter").await,
            vec![CommandId::new(SurfaceType::Text, "hey"), CommandId::new(SurfaceType::Text, "hi")]
        );
        assert_eq!(manager.state("greeter").await, Some(ModuleState::Loaded));
        assert_eq!(
            transitions(&mut rx),
            vec![
                ("greeter".to_string(), ModuleState::Loaded, ModuleState::Unloaded),
                ("greeter".to_string(), ModuleState::Discovered, ModuleState::Started),
                ("greeter".to_string(), ModuleState::Started, ModuleState::Loaded),
            ]
        );

        // Nothing installed under that id yet: a plain install.
        manager.replace(Arc::new(TestModule::new("fresh", vec!["new"])), StartOptions::default()).await.unwrap();
        assert_eq!(manager.state("fresh").await, Some(ModuleState::Loaded));
    }

    #[tokio::test]
    async fn failed_replace_keeps_old_module() {
        let manager = manager();
        let old = TestModule::new("greeter", vec!["hello"]);
        let old_unloads = old.unloads.clone();
        manager.install(Arc::new(old), StartOptions::default()).await.unwrap();

        let mut incompatible = TestModule::new("greeter", vec!["hi"]);
        incompatible.engine_versions = "^9";
        let err = manager.replace(Arc::new(incompatible), StartOptions::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::IncompatibleVersion { .. }));

        let mut declined = TestModule::new("greeter", vec!["hi"]);
        declined.accept = false;
        let err = manager.replace(Arc::new(declined), StartOptions::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::ModuleRejected(_)));

        let broken = TestModule::new("greeter", vec!["hi", "has space"]);
        let broken_unloads = broken.unloads.clone();
        let err = manager.replace(Arc::new(broken), StartOptions::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::ModuleStart { .. }));
        assert_eq!(*broken_unloads.lock().unwrap(), vec![UnloadReason::Other("replace aborted".into())]);

        let mut flaky = TestModule::new("greeter", vec!["hi"]);
        flaky.fail_load = true;
        let err = manager.replace(Arc::new(flaky), StartOptions::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::ModuleLoad { .. }));

        assert_eq!(manager.state("greeter").await, Some(ModuleState::Loaded));
        assert!(has(&manager, "hello").await);
        assert!(!has(&manager, "hi").await);
        assert!(old_unloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn broken_command_definition_fails_loudly() {
        let manager = manager();
        let err = manager
            .install(Arc::new(TestModule::new("broken", vec!["fine", "has space"])), StartOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ModuleLoad { ref module, .. } if module == "broken"));
        assert_eq!(manager.state("broken").await, None);
        assert!(!has(&manager, "fine").await);

        let options = StartOptions { register_commands: true, ..StartOptions::default() };
        let err = manager
            .start(Arc::new(TestModule::new("broken", vec!["has space"])), options)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ModuleStart { .. }));
        assert!(manager.is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_starts_run_one_hook() {
        let manager = manager();
        let first = Arc::new(TestModule::new("twin", vec![]));
        let second = Arc::new(TestModule::new("twin", vec![]));

        let (a, b) = tokio::join!(
            manager.start(first.clone(), StartOptions::default()),
            manager.start(second.clone(), StartOptions::default())
        );
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(r, Err(EngineError::DuplicateModule(id)) if id == "twin")));
        assert_eq!(first.starts.load(Ordering::SeqCst) + second.starts.load(Ordering::SeqCst), 1);
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test]
    async fn uninstall_and_colliding_commands() {
        let manager = manager();
        manager.install(Arc::new(TestModule::new("a", vec!["ping"])), StartOptions::default()).await.unwrap();

        let err = manager.install(Arc::new(TestModule::new("b", vec!["ping"])), StartOptions::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::DuplicateName { .. }));
        assert_eq!(manager.state("b").await, None);
        assert_eq!(manager.engine().registry().owner_of(SurfaceType::Text, "ping").await.as_deref(), Some("a"));

        manager.uninstall("a").await.unwrap();
        assert!(!has(&manager, "ping").await);
        assert!(matches!(manager.uninstall("a").await, Err(EngineError::ModuleNotFound(_))));
    }
}
