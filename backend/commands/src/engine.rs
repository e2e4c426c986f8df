//! The engine: shared handle over registry, admission control, halt
//! pipeline, observer bus and gateway.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use switchboard_config::{defaults::sweep_interval, SwitchboardConfig};
use switchboard_core::{
    EngineError, EngineEvent, EventBus, GatewayClient, NoopGateway, RegisterTarget, SurfaceType,
};
use switchboard_preconditions::{CooldownPrecondition, CooldownTracker, PreconditionChain};

use crate::halt::HaltPipeline;
use crate::registry::CommandRegistry;

pub(crate) struct EngineInner {
    pub(crate) config: SwitchboardConfig,
    pub(crate) registry: CommandRegistry,
    pub(crate) cooldowns: CooldownTracker,
    pub(crate) preconditions: PreconditionChain,
    pub(crate) halts: HaltPipeline,
    pub(crate) bus: EventBus,
    pub(crate) gateway: Arc<dyn GatewayClient>,
}

/// Cheap-to-clone handle; every clone drives the same engine.
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new(config: SwitchboardConfig, gateway: Arc<dyn GatewayClient>) -> Self {
        Self::with_bus(config, gateway, EventBus::new())
    }

    /// Engine publishing on an existing bus.
    pub fn with_bus(config: SwitchboardConfig, gateway: Arc<dyn GatewayClient>, bus: EventBus) -> Self {
        let cooldowns = CooldownTracker::new();
        let mut cooldown = CooldownPrecondition::new(cooldowns.clone()).with_scope(config.cooldown_scope);
        for surface in SurfaceType::ALL {
            if !config.surface(surface).enable_cooldown {
                cooldown = cooldown.disable_surface(surface);
            }
        }

        Self {
            inner: Arc::new(EngineInner {
                registry: CommandRegistry::new(bus.clone()),
                preconditions: PreconditionChain::with_defaults(cooldown),
                halts: HaltPipeline::new(bus.clone()),
                cooldowns,
                bus,
                gateway,
                config,
            }),
        }
    }

    /// Engine with default config and a gateway that sends nothing.
    pub fn standalone() -> Self {
        Self::new(SwitchboardConfig::default(), Arc::new(NoopGateway))
    }

    pub fn config(&self) -> &SwitchboardConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.inner.registry
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.inner.cooldowns
    }

    /// Engine-level preconditions; `[permissions, cooldown]` by default.
    pub fn preconditions(&self) -> &PreconditionChain {
        &self.inner.preconditions
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.bus.subscribe()
    }

    pub fn gateway(&self) -> &Arc<dyn GatewayClient> {
        &self.inner.gateway
    }

    /// Sweep expired cooldowns at the configured interval.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        self.inner.cooldowns.spawn_sweeper(sweep_interval(self.inner.config.cooldown_sweep_interval_secs))
    }

    /// Push every structured and context command to the gateway, to each
    /// configured target. Returns the number of commands sent per target.
    pub async fn register_remote_commands(&self) -> Result<usize, EngineError> {
        let settings = &self.inner.config.register_commands;
        if !settings.enabled {
            info!("Remote command registration disabled");
            return Ok(0);
        }

        let commands = self.inner.registry.remote_commands().await;
        let mut targets = Vec::new();
        if settings.global {
            targets.push(RegisterTarget::Global);
        }
        targets.extend(settings.guilds.iter().map(|g| RegisterTarget::Guild { guild_id: g.clone() }));

        for target in targets {
            self.inner
                .gateway
                .register_commands(&commands, &target)
                .await
                .map_err(EngineError::Gateway)?;
            info!(count = commands.len(), ?target, "Remote commands registered");
            self.inner
                .bus
                .publish(EngineEvent::RemoteCommandsRegistered { target, count: commands.len() });
        }
        Ok(commands.len())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("prefix", &self.inner.config.prefix)
            .field("bus", &self.inner.bus)
            .finish()
    }
}
