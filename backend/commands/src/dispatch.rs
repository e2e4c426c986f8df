/// Command dispatch: route an inbound event through lookup, filters,
/// admission and the handler, feeding every failure to the halt pipeline.
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use switchboard_core::{
    CommandArgs, CommandDef, EngineError, EngineEvent, ExecuteContext, HaltEvent, HaltKind, HaltReason, InboundEvent,
};
use switchboard_preconditions::ChainOutcome;

use crate::detection::{command_args, parse_text};
use crate::engine::Engine;

/// What happened to one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a command, unknown, or filtered out.
    Ignored,
    Executed,
    Halted { reason: HaltReason, handled: bool },
}

impl Engine {
    /// Dispatch one inbound event.
    ///
    /// Only fails with [`EngineError::Unhandled`], when a command error had
    /// no observer to receive it.
    pub async fn dispatch(&self, event: InboundEvent) -> Result<DispatchOutcome, EngineError> {
        let surface = event.surface();
        let settings = self.config().surface(surface);
        if !settings.enabled {
            return Ok(DispatchOutcome::Ignored);
        }

        let Some((command, args)) = self.resolve(&event).await else {
            return Ok(DispatchOutcome::Ignored);
        };

        if let Some(filter) = self.filtered_by(&command, &event) {
            debug!(command = %command.name, %surface, filter, "Dispatch filtered");
            return Ok(DispatchOutcome::Ignored);
        }

        let ctx = ExecuteContext::new(command, Arc::new(event), args, self.gateway().clone());
        debug!(command = %ctx.command.name, %surface, invocation = %ctx.invocation_id, "Dispatching");

        if let Some(kind) = invalid_arguments(&ctx) {
            return self.halt(ctx, kind).await;
        }

        if let ChainOutcome::Rejected { halt, .. } = self.preconditions().run(&ctx).await {
            return self.halt(ctx, halt).await;
        }

        let Some(handler) = ctx.command.execute.clone() else {
            return self.halt(ctx, HaltKind::MissingHandler).await;
        };

        match handler.execute(&ctx).await {
            Ok(()) => {
                info!(command = %ctx.command.name, %surface, actor = %ctx.actor().id, "Command executed");
                self.bus().publish(EngineEvent::Executed(ctx));
                Ok(DispatchOutcome::Executed)
            }
            Err(e) => self.halt(ctx, HaltKind::Error(Arc::new(e))).await,
        }
    }

    /// Dispatch on a separate task. Unhandled errors are also logged.
    pub fn spawn_dispatch(&self, event: InboundEvent) -> JoinHandle<Result<DispatchOutcome, EngineError>> {
        let engine = self.clone();
        tokio::spawn(async move {
            let result = engine.dispatch(event).await;
            if let Err(e) = &result {
                error!(error = %e, "Dispatch failed");
            }
            result
        })
    }

    /// Registry entry and arguments for `event`, if it names a command.
    async fn resolve(&self, event: &InboundEvent) -> Option<(Arc<CommandDef>, CommandArgs)> {
        let surface = event.surface();
        match event {
            InboundEvent::TextMessage(message) => {
                let config = self.config();
                let parsed = parse_text(&message.content, &config.prefix, &config.argument_separator)?;
                let command = self.registry().lookup(surface, &parsed.name).await?;
                let args = command_args(parsed, command.text_spec());
                Some((command, args))
            }
            InboundEvent::StructuredInvoked(interaction) | InboundEvent::ContextInvoked(interaction) => {
                if interaction.replied && !self.config().surface(surface).accept_replied_interactions {
                    return None;
                }
                let command = self.registry().lookup(surface, &interaction.command_name).await?;
                Some((command, CommandArgs::default()))
            }
        }
    }

    /// Name of the silent filter that drops this invocation, if any.
    fn filtered_by(&self, command: &CommandDef, event: &InboundEvent) -> Option<&'static str> {
        let scope = event.scope();
        if self.config().is_channel_ignored(&scope.channel_id) {
            Some("ignored_channel")
        } else if scope.is_direct() && !command.allow_in_dm {
            Some("direct_message")
        } else if event.actor().is_bot && !command.allow_bots {
            Some("bot")
        } else {
            None
        }
    }

    async fn halt(&self, ctx: ExecuteContext, kind: HaltKind) -> Result<DispatchOutcome, EngineError> {
        let reason = kind.reason();
        let settings = self.config().surface(ctx.surface);
        let reply_to = settings.reply_on_error.then(|| ctx.clone());

        let result = self.inner.halts.resolve(HaltEvent::new(ctx, kind)).await;
        let errored = match &result {
            Ok(resolution) => resolution.error,
            Err(_) => true,
        };

        if errored {
            if let Some(ctx) = reply_to {
                if let Err(e) = ctx.reply(&self.config().messages.error).await {
                    warn!(command = %ctx.command.name, error = %e, "Failed to send error reply");
                }
            }
        }

        let resolution = result?;
        Ok(DispatchOutcome::Halted { reason, handled: resolution.handled })
    }
}

/// `MissingArguments` / `InvalidArguments` for text commands that validate
/// their options.
fn invalid_arguments(ctx: &ExecuteContext) -> Option<HaltKind> {
    if !ctx.command.text_spec().is_some_and(|s| s.validate_options) {
        return None;
    }

    let missing: Vec<String> = ctx.args.missing().into_iter().map(|o| o.name.clone()).collect();
    if !missing.is_empty() {
        return Some(HaltKind::MissingArguments { options: missing });
    }
    let invalid: Vec<String> = ctx.args.invalid().into_iter().map(|o| o.name.clone()).collect();
    if !invalid.is_empty() {
        return Some(HaltKind::InvalidArguments { options: invalid });
    }
    None
}
