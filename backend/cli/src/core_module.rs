//! The built-in `core` module: `ping` and `help`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::OnceCell;

use switchboard_commands::{CommandRegistry, Engine};
use switchboard_core::{execute_fn, halt_fn, CommandDef, SurfaceType, TextOption, ENGINE_VERSION};
use switchboard_modules::{Module, ModuleManifest};

const PING_COOLDOWN_MS: u64 = 5_000;

#[derive(Clone)]
struct HelpState {
    registry: CommandRegistry,
    prefix: String,
}

#[derive(Default)]
pub struct CoreModule {
    help: OnceCell<HelpState>,
}

#[async_trait]
impl Module for CoreModule {
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest::new("core", env!("CARGO_PKG_VERSION"), format!("^{ENGINE_VERSION}"))
            .description("Built-in ping and help commands")
    }

    async fn start(&self, engine: &Engine) -> Result<bool> {
        let state = HelpState { registry: engine.registry().clone(), prefix: engine.config().prefix.clone() };
        // A restarted instance keeps its first state.
        let _ = self.help.set(state);
        Ok(true)
    }

    fn commands(&self) -> Result<Vec<CommandDef>> {
        let mut commands = vec![ping_command()?];
        if let Some(state) = self.help.get().cloned() {
            commands.push(help_command(state)?);
        }
        Ok(commands)
    }
}

fn ping_command() -> Result<CommandDef, switchboard_core::EngineError> {
    CommandDef::text("ping")
        .description("Check that the engine responds")
        .cooldown_ms(PING_COOLDOWN_MS)
        .execute(execute_fn(|ctx| async move { ctx.reply("Pong!").await }))
        .halt(halt_fn(|event| async move {
            let Some(record) = event.cooldown() else {
                return Ok(false);
            };
            let secs = record.remaining_at(Utc::now()).num_milliseconds().max(0) as f64 / 1000.0;
            event.context.reply(&format!("Slow down! Try again in {secs:.1}s")).await?;
            Ok(true)
        }))
        .build()
}

fn help_command(state: HelpState) -> Result<CommandDef, switchboard_core::EngineError> {
    CommandDef::text("help")
        .alias("commands")
        .description("List text commands, or describe one")
        .option(TextOption::optional("command").description("Command to describe"))
        .execute(execute_fn(move |ctx| {
            let state = state.clone();
            async move {
                let text = help_text(&state, ctx.args.get("command")).await;
                ctx.reply(&text).await
            }
        }))
        .build()
}

async fn help_text(state: &HelpState, query: Option<&str>) -> String {
    let prefix = &state.prefix;
    let Some(name) = query else {
        let mut lines = vec!["Commands:".to_string()];
        for def in state.registry.list(SurfaceType::Text).await {
            lines.push(format!("  {prefix}{} - {}", def.name, def.description));
        }
        return lines.join("\n");
    };

    let Some(def) = state.registry.lookup(SurfaceType::Text, name).await else {
        return format!("Unknown command '{name}'");
    };
    let mut usage = format!("{prefix}{}", def.name);
    for option in def.text_spec().map(|s| s.options.as_slice()).unwrap_or_default() {
        if option.required {
            usage.push_str(&format!(" <{}>", option.name));
        } else {
            usage.push_str(&format!(" [{}]", option.name));
        }
    }
    let mut text = format!("{usage}\n{}", def.description);
    if !def.aliases().is_empty() {
        text.push_str(&format!("\nAliases: {}", def.aliases().join(", ")));
    }
    if def.cooldown_ms > 0 {
        text.push_str(&format!("\nCooldown: {}s", def.cooldown_ms as f64 / 1000.0));
    }
    text
}
