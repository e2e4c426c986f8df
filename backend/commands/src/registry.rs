/// Command registry: `(surface, name) → definition`, with a secondary alias
/// index for text commands.
///
/// Text names and aliases are matched case-insensitively. Every batch
/// operation holds the write lock for its whole duration, so a concurrent
/// lookup sees either all or none of a module's commands.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use switchboard_core::{CommandDef, EngineError, EngineEvent, EventBus, RemoteCommand, SurfaceType};

/// Registry key of a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandId {
    pub surface: SurfaceType,
    pub name: String,
}

impl CommandId {
    pub fn new(surface: SurfaceType, name: impl Into<String>) -> Self {
        Self { surface, name: normalize(surface, &name.into()) }
    }

    pub fn of(def: &CommandDef) -> Self {
        Self::new(def.surface(), def.name.clone())
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.surface, self.name)
    }
}

/// What replacing a module's command set would change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDiff {
    pub added: Vec<CommandId>,
    pub removed: Vec<CommandId>,
    pub retained: Vec<CommandId>,
}

impl RegistryDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

fn normalize(surface: SurfaceType, name: &str) -> String {
    match surface {
        SurfaceType::Text => name.to_lowercase(),
        SurfaceType::Structured | SurfaceType::Context => name.to_string(),
    }
}

struct Entry {
    def: Arc<CommandDef>,
    owner: Option<String>,
}

#[derive(Default)]
struct Tables {
    entries: HashMap<CommandId, Entry>,
    /// Lowercased text alias → lowercased primary name.
    aliases: HashMap<String, String>,
}

impl Tables {
    fn owner_of(&self, id: &CommandId) -> Option<&str> {
        self.entries.get(id).and_then(|e| e.owner.as_deref())
    }

    /// Whether `key` is taken on `surface`, ignoring entries owned by `skip_owner`.
    fn is_taken(&self, surface: SurfaceType, key: &str, skip_owner: Option<&str>) -> bool {
        let skipped = |id: &CommandId| skip_owner.is_some() && self.owner_of(id) == skip_owner;

        let id = CommandId { surface, name: key.to_string() };
        if self.entries.contains_key(&id) && !skipped(&id) {
            return true;
        }
        if surface == SurfaceType::Text {
            if let Some(primary) = self.aliases.get(key) {
                let primary_id = CommandId { surface, name: primary.clone() };
                return !skipped(&primary_id);
            }
        }
        false
    }

    /// Fail with `DuplicateName` if any key of `def` is taken, by the table or
    /// by an earlier member of the same batch.
    fn check_free(
        &self,
        def: &CommandDef,
        skip_owner: Option<&str>,
        batch: &mut HashSet<(SurfaceType, String)>,
    ) -> Result<(), EngineError> {
        let surface = def.surface();
        for key in def.keys() {
            let key = normalize(surface, key);
            if self.is_taken(surface, &key, skip_owner) || !batch.insert((surface, key.clone())) {
                return Err(EngineError::DuplicateName { surface, name: key });
            }
        }
        Ok(())
    }

    fn insert(&mut self, def: Arc<CommandDef>, owner: Option<&str>) {
        let id = CommandId::of(&def);
        if id.surface == SurfaceType::Text {
            for alias in def.aliases() {
                self.aliases.insert(alias.to_lowercase(), id.name.clone());
            }
        }
        self.entries.insert(id, Entry { def, owner: owner.map(String::from) });
    }

    fn remove_owned_by(&mut self, owner: &str) -> Vec<Arc<CommandDef>> {
        let ids: Vec<CommandId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.owner.as_deref() == Some(owner))
            .map(|(id, _)| id.clone())
            .collect();

        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.entries.remove(&id) {
                if id.surface == SurfaceType::Text {
                    self.aliases.retain(|_, primary| *primary != id.name);
                }
                removed.push(entry.def);
            }
        }
        removed
    }
}

/// Shared command registry. Clones share state.
#[derive(Clone)]
pub struct CommandRegistry {
    tables: Arc<RwLock<Tables>>,
    bus: EventBus,
}

impl CommandRegistry {
    pub fn new(bus: EventBus) -> Self {
        Self { tables: Arc::new(RwLock::new(Tables::default())), bus }
    }

    /// Register one command. `owner` is the contributing module, if any.
    pub async fn register(&self, def: CommandDef, owner: Option<&str>) -> Result<Arc<CommandDef>, EngineError> {
        def.validate()?;
        let def = Arc::new(def);
        {
            let mut tables = self.tables.write().await;
            tables.check_free(&def, None, &mut HashSet::new())?;
            tables.insert(def.clone(), owner);
        }
        info!(command = %def.name, surface = %def.surface(), owner = owner.unwrap_or("-"), "Command registered");
        self.changed(owner, 1, 0);
        Ok(def)
    }

    /// Register a batch. Nothing is inserted if any member fails.
    pub async fn register_all(
        &self,
        defs: Vec<CommandDef>,
        owner: Option<&str>,
    ) -> Result<Vec<Arc<CommandDef>>, EngineError> {
        for def in &defs {
            def.validate()?;
        }
        let defs: Vec<Arc<CommandDef>> = defs.into_iter().map(Arc::new).collect();
        {
            let mut tables = self.tables.write().await;
            let mut batch = HashSet::new();
            for def in &defs {
                tables.check_free(def, None, &mut batch)?;
            }
            for def in &defs {
                tables.insert(def.clone(), owner);
            }
        }
        if !defs.is_empty() {
            info!(count = defs.len(), owner = owner.unwrap_or("-"), "Commands registered");
            self.changed(owner, defs.len(), 0);
        }
        Ok(defs)
    }

    /// Look a command up by name or, for text commands, alias.
    pub async fn lookup(&self, surface: SurfaceType, name: &str) -> Option<Arc<CommandDef>> {
        let key = normalize(surface, name);
        let tables = self.tables.read().await;
        let id = CommandId { surface, name: key };
        if let Some(entry) = tables.entries.get(&id) {
            return Some(entry.def.clone());
        }
        if surface != SurfaceType::Text {
            return None;
        }
        let primary = tables.aliases.get(&id.name)?;
        tables
            .entries
            .get(&CommandId { surface, name: primary.clone() })
            .map(|e| e.def.clone())
    }

    /// Remove every command contributed by `owner`.
    pub async fn unregister_all(&self, owner: &str) -> Vec<Arc<CommandDef>> {
        let removed = self.tables.write().await.remove_owned_by(owner);
        if !removed.is_empty() {
            info!(owner, count = removed.len(), "Commands unregistered");
            self.changed(Some(owner), 0, removed.len());
        }
        removed
    }

    /// Atomically swap `owner`'s command set for `defs`.
    ///
    /// Fails without modifying anything if the new set collides with another
    /// owner's commands.
    pub async fn replace_module(&self, owner: &str, defs: Vec<CommandDef>) -> Result<RegistryDiff, EngineError> {
        for def in &defs {
            def.validate()?;
        }
        let defs: Vec<Arc<CommandDef>> = defs.into_iter().map(Arc::new).collect();

        let diff = {
            let mut tables = self.tables.write().await;
            let mut batch = HashSet::new();
            for def in &defs {
                tables.check_free(def, Some(owner), &mut batch)?;
            }
            let diff = diff_against(&tables, owner, defs.iter().map(|d| d.as_ref()));
            tables.remove_owned_by(owner);
            for def in &defs {
                tables.insert(def.clone(), Some(owner));
            }
            diff
        };

        debug!(owner, added = diff.added.len(), removed = diff.removed.len(), "Module commands replaced");
        self.changed(Some(owner), diff.added.len(), diff.removed.len());
        Ok(diff)
    }

    /// Compare `owner`'s registered commands with `defs` by `(surface, name)`.
    pub async fn diff(&self, owner: &str, defs: &[CommandDef]) -> RegistryDiff {
        let tables = self.tables.read().await;
        diff_against(&tables, owner, defs.iter())
    }

    /// Commands on `surface`, sorted by name.
    pub async fn list(&self, surface: SurfaceType) -> Vec<Arc<CommandDef>> {
        let tables = self.tables.read().await;
        let mut list: Vec<_> = tables
            .entries
            .iter()
            .filter(|(id, _)| id.surface == surface)
            .map(|(_, e)| e.def.clone())
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Ids of the commands `owner` contributed, sorted.
    pub async fn owned_by(&self, owner: &str) -> Vec<CommandId> {
        let tables = self.tables.read().await;
        let mut ids: Vec<_> = tables
            .entries
            .iter()
            .filter(|(_, e)| e.owner.as_deref() == Some(owner))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub async fn owner_of(&self, surface: SurfaceType, name: &str) -> Option<String> {
        let tables = self.tables.read().await;
        tables.owner_of(&CommandId::new(surface, name)).map(String::from)
    }

    /// Gateway form of every structured and context command.
    pub async fn remote_commands(&self) -> Vec<RemoteCommand> {
        let tables = self.tables.read().await;
        let mut remote: Vec<_> = tables.entries.values().filter_map(|e| e.def.to_remote()).collect();
        remote.sort_by(|a, b| (a.surface, &a.name).cmp(&(b.surface, &b.name)));
        remote
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.entries.is_empty()
    }

    fn changed(&self, owner: Option<&str>, added: usize, removed: usize) {
        self.bus.publish(EngineEvent::RegistryChanged { owner: owner.map(String::from), added, removed });
    }
}

fn diff_against<'a>(tables: &Tables, owner: &str, defs: impl Iterator<Item = &'a CommandDef>) -> RegistryDiff {
    let current: HashSet<CommandId> = tables
        .entries
        .iter()
        .filter(|(_, e)| e.owner.as_deref() == Some(owner))
        .map(|(id, _)| id.clone())
        .collect();
    let next: HashSet<CommandId> = defs.map(CommandId::of).collect();

    let mut diff = RegistryDiff {
        added: next.difference(&current).cloned().collect(),
        removed: current.difference(&next).cloned().collect(),
        retained: current.intersection(&next).cloned().collect(),
    };
    diff.added.sort();
    diff.removed.sort();
    diff.retained.sort();
    diff
}
