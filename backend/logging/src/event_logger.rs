//! Event Logger
//!
//! Default observer: subscribes to the engine's event bus and writes one
//! structured log line per event under the `switchboard_events` target.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use switchboard_core::{EngineEvent, EventBus};

#[derive(Debug, Clone, Serialize)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface: Option<String>,
    pub detail: String,
}

impl EventLogEntry {
    pub fn from_event(event: &EngineEvent) -> Self {
        let (command, surface, detail) = match event {
            EngineEvent::Executed(ctx) => (
                Some(ctx.command.name.clone()),
                Some(ctx.surface.to_string()),
                format!("actor {}", ctx.actor().id),
            ),
            EngineEvent::Halted { event, handled } => (
                Some(event.context.command.name.clone()),
                Some(event.context.surface.to_string()),
                format!("{} (handled: {handled})", event.reason()),
            ),
            EngineEvent::Error(err) => (Some(err.command().to_string()), None, err.to_string()),
            EngineEvent::RegistryChanged { owner, added, removed } => (
                None,
                None,
                format!("owner {}: +{added} -{removed}", owner.as_deref().unwrap_or("-")),
            ),
            EngineEvent::RemoteCommandsRegistered { target, count } => {
                (None, None, format!("{count} commands to {target:?}"))
            }
            EngineEvent::ModuleStateChanged { module, from, to } => (None, None, format!("{module}: {from} -> {to}")),
        };
        Self { timestamp: Utc::now(), event: event.name(), command, surface, detail }
    }
}

fn log_entry(event: &EngineEvent) {
    let entry = EventLogEntry::from_event(event);
    let json = serde_json::to_string(&entry).unwrap_or_default();
    match event {
        EngineEvent::Error(_) => error!(target: "switchboard_events", entry = %json, "Engine event"),
        EngineEvent::Halted { .. } | EngineEvent::RegistryChanged { .. } => {
            debug!(target: "switchboard_events", entry = %json, "Engine event")
        }
        _ => info!(target: "switchboard_events", entry = %json, "Engine event"),
    }
}

/// Log every event published on `bus` until the bus is dropped.
pub fn spawn_event_logger(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_entry(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event logger fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
