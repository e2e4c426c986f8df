use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{CommandError, EngineError};
use crate::event::EngineEvent;

/// Default broadcast buffer per subscriber.
const DEFAULT_CAPACITY: usize = 256;

/// The observer channel of the engine.
///
/// Built on a tokio broadcast channel: every subscriber sees every event
/// published after it subscribed. Slow subscribers lag and lose the oldest
/// events; publishers never block.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to every current subscriber. Returns how many received it.
    pub fn publish(&self, event: EngineEvent) -> usize {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(event = name, receivers, "EngineEvent published");
                receivers
            }
            Err(_) => {
                debug!(event = name, "EngineEvent dropped: no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish an unhandled command failure.
    ///
    /// With nobody listening the failure is handed back as
    /// [`EngineError::Unhandled`] so the host sees it.
    pub fn report_error(&self, error: CommandError) -> Result<(), EngineError> {
        match self.sender.send(EngineEvent::Error(error)) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(event)) => match event {
                EngineEvent::Error(error) => {
                    warn!(command = %error.command(), %error, "Command error has no observer");
                    Err(EngineError::Unhandled(error))
                }
                other => {
                    debug!(event = other.name(), "EngineEvent dropped: no subscribers");
                    Ok(())
                }
            },
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
