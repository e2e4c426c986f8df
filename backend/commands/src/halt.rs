/// Halt pipeline: routes every halted dispatch to exactly one observer
/// notification.
///
/// The command's own halt handler gets first refusal. A handled halt is
/// published as `Halted { handled: true }`; an unhandled error halt, or a
/// failing halt handler, is published as `EngineEvent::Error`; any other
/// unhandled halt as `Halted { handled: false }`.
use tracing::{debug, warn};

use switchboard_core::{CommandError, EngineError, EngineEvent, EventBus, HaltEvent};

/// How a halt was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// The command's halt handler took care of it.
    pub handled: bool,
    /// Published as an error-class notification.
    pub error: bool,
}

#[derive(Debug, Clone)]
pub struct HaltPipeline {
    bus: EventBus,
}

impl HaltPipeline {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Resolve `event`.
    ///
    /// Fails with [`EngineError::Unhandled`] when an error-class notification
    /// has no observer to receive it.
    pub async fn resolve(&self, event: HaltEvent) -> Result<Resolution, EngineError> {
        let command = event.context.command.clone();
        let surface = event.context.surface;
        let reason = event.reason();

        if let Some(handler) = &command.halt {
            match handler.halt(&event).await {
                Ok(true) => {
                    debug!(command = %command.name, %surface, %reason, "Halt handled");
                    self.bus.publish(EngineEvent::Halted { event, handled: true });
                    return Ok(Resolution { handled: true, error: false });
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(command = %command.name, %surface, %reason, error = %e, "Halt handler failed");
                    self.bus.report_error(CommandError::Halt {
                        surface,
                        command: command.name.clone(),
                        message: format!("{e:#}"),
                    })?;
                    return Ok(Resolution { handled: false, error: true });
                }
            }
        }

        if let Some(err) = event.caught_error() {
            warn!(command = %command.name, %surface, error = %err, "Command failed");
            self.bus.report_error(CommandError::Execute {
                surface,
                command: command.name.clone(),
                message: format!("{err:#}"),
            })?;
            return Ok(Resolution { handled: false, error: true });
        }

        debug!(command = %command.name, %surface, %reason, "Halt unhandled");
        self.bus.publish(EngineEvent::Halted { event, handled: false });
        Ok(Resolution { handled: false, error: false })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use switchboard_core::{
        halt_fn, Actor, CommandArgs, CommandDef, ExecuteContext, HaltKind, InboundEvent, MessageEvent, NoopGateway,
        Scope,
    };
    use tokio::sync::broadcast::Receiver;

    fn halt(def: CommandDef, kind: HaltKind) -> HaltEvent {
        let event = InboundEvent::TextMessage(MessageEvent {
            id: "m".into(),
            content: "!x".into(),
            actor: Actor::new("a"),
            scope: Scope::guild("g", "c"),
            agent_permissions: Default::default(),
            payload: serde_json::Value::Null,
        });
        let ctx = ExecuteContext::new(Arc::new(def), Arc::new(event), CommandArgs::default(), Arc::new(NoopGateway));
        HaltEvent::new(ctx, kind)
    }

    fn drain(rx: &mut Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn handled_halt_is_published_once() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let def = CommandDef::text("x").halt(halt_fn(|_e| async { Ok(true) })).build().unwrap();

        let resolution = HaltPipeline::new(bus).resolve(halt(def, HaltKind::MissingHandler)).await.unwrap();
        assert!(resolution.handled);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], EngineEvent::Halted { handled: true, .. }));
    }

    #[tokio::test]
    async fn unhandled_error_becomes_execute_error() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let def = CommandDef::text("x").halt(halt_fn(|_e| async { Ok(false) })).build().unwrap();

        let kind = HaltKind::Error(Arc::new(anyhow::anyhow!("boom")));
        let resolution = HaltPipeline::new(bus).resolve(halt(def, kind)).await.unwrap();
        assert!(resolution.error);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            EngineEvent::Error(CommandError::Execute { command, message, .. }) => {
                assert_eq!(command, "x");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[tokio::test]
    async fn failing_halt_handler_is_wrapped() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let def = CommandDef::text("x")
            .halt(halt_fn(|_e| async { Err(anyhow::anyhow!("reply failed")) }))
            .build()
            .unwrap();

        HaltPipeline::new(bus).resolve(halt(def, HaltKind::MissingHandler)).await.unwrap();
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], EngineEvent::Error(CommandError::Halt { message, .. }) if message == "reply failed"));
    }

    #[tokio::test]
    async fn non_error_halt_without_handler() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let def = CommandDef::text("x").build().unwrap();
        HaltPipeline::new(bus).resolve(halt(def, HaltKind::MissingHandler)).await.unwrap();
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], EngineEvent::Halted { handled: false, .. }));
    }

    #[tokio::test]
    async fn unobserved_error_reaches_the_caller() {
        let def = CommandDef::text("x").build().unwrap();
        let kind = HaltKind::Error(Arc::new(anyhow::anyhow!("boom")));
        let err = HaltPipeline::new(EventBus::new()).resolve(halt(def, kind)).await.unwrap_err();
        assert!(matches!(err, EngineError::Unhandled(CommandError::Execute { .. })));
    }

    #[tokio::test]
    async fn unobserved_plain_halt_is_dropped() {
        let def = CommandDef::text("x").build().unwrap();
        let resolution = HaltPipeline::new(EventBus::new())
            .resolve(halt(def, HaltKind::MissingHandler))
            .await
            .unwrap();
        assert!(!resolution.handled && !resolution.error);
    }
}
