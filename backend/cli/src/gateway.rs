//! Console gateway: each stdin line is a text message from one configured
//! actor, and replies are written to stdout.

use std::io::Write;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::info;

use switchboard_core::{
    Actor, GatewayClient, InboundEvent, MessageEvent, Permissions, RegisterTarget, RemoteCommand, Scope,
};

use crate::terminal_output::stream_write;

pub struct ConsoleGateway {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleGateway {
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self { writer: Mutex::new(writer) }
    }
}

#[async_trait]
impl GatewayClient for ConsoleGateway {
    async fn register_commands(&self, commands: &[RemoteCommand], target: &RegisterTarget) -> Result<()> {
        let names: Vec<&str> = commands.iter().map(|c| c.name.as_str()).collect();
        info!(?target, commands = ?names, "Console gateway accepted remote commands");
        Ok(())
    }

    async fn reply(&self, _event: &InboundEvent, content: &str) -> Result<()> {
        let mut writer = self.writer.lock().map_err(|_| anyhow!("console writer poisoned"))?;
        stream_write(&mut *writer, &format!("{content}\n"))?;
        Ok(())
    }
}

/// Who is typing at the console, and where.
#[derive(Debug, Clone)]
pub struct ConsoleSession {
    pub actor: String,
    pub channel: String,
    /// `None` makes every line a direct message.
    pub guild: Option<String>,
}

impl ConsoleSession {
    /// The console operator holds every permission.
    pub fn message(&self, line: &str, seq: u64) -> InboundEvent {
        let scope = match &self.guild {
            Some(guild) => Scope::guild(guild.clone(), self.channel.clone()),
            None => Scope::direct(self.channel.clone()),
        };
        InboundEvent::TextMessage(MessageEvent {
            id: format!("console-{seq}"),
            content: line.to_string(),
            actor: Actor::new(self.actor.clone()).with_permissions(Permissions::ALL),
            scope,
            agent_permissions: Permissions::ALL,
            payload: serde_json::Value::Null,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::*;

    /// Cloneable in-memory writer.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuffer(pub(crate) Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn session(guild: Option<&str>) -> ConsoleSession {
        ConsoleSession { actor: "op".into(), channel: "console".into(), guild: guild.map(String::from) }
    }

    #[test]
    fn session_builds_text_messages() {
        let event = session(Some("home")).message("!ping", 3);
        assert_eq!(event.id(), "console-3");
        assert_eq!(event.scope().guild_id.as_deref(), Some("home"));
        assert!(event.actor().permissions.contains(Permissions(0b1010)));
        assert!(session(None).message("!ping", 1).scope().is_direct());
    }

    #[tokio::test]
    async fn replies_are_written_line_by_line() {
        let buffer = SharedBuffer::default();
        let gateway = ConsoleGateway::with_writer(Box::new(buffer.clone()));
        let event = session(None).message("!ping", 1);
        gateway.reply(&event, "Pong!").await.unwrap();
        gateway.reply(&event, "again").await.unwrap();
        assert_eq!(buffer.contents(), "Pong!\nagain\n");
    }
}
