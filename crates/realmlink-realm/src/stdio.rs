//! Console passthrough realm.

use async_trait::async_trait;
use realmlink_types::{Event, EventKind, Message, User};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::config::StdioConfig;
use crate::emitter::EventEmitter;
use crate::error::RealmError;
use crate::format::format_relay;
use crate::realm::Realm;

/// The local console, registered as `STDIO`.
///
/// Relayed events are printed to stdout. When reading is enabled, every
/// non-empty stdin line is published as chat from the console user.
#[derive(Debug)]
pub struct StdioRealm {
    config: StdioConfig,
    emitter: EventEmitter,
}

impl StdioRealm {
    pub fn new(config: StdioConfig) -> Self {
        Self {
            config,
            emitter: EventEmitter::new(),
        }
    }

    /// Publishes one console line as chat from the console user.
    ///
    /// Blank lines are ignored.
    pub fn say(&self, line: &str) {
        let content = line.trim();
        if content.is_empty() {
            return;
        }
        let user = User::new(self.config.name.clone(), self.config.rank);
        self.emitter.fire(&Event::Chat(Message {
            user,
            content: content.to_string(),
        }));
    }
}

#[async_trait]
impl Realm for StdioRealm {
    async fn run(&self, cancel: CancellationToken) -> Result<(), RealmError> {
        self.emitter.fire(&Event::Connected);

        if !self.config.read {
            cancel.cancelled().await;
            return Ok(());
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                line = lines.next_line() => match line? {
                    Some(line) => self.say(&line),
                    None => {
                        tracing::debug!("stdin closed, waiting for shutdown");
                        cancel.cancelled().await;
                        return Ok(());
                    }
                },
            }
        }
    }

    fn on(&self, kind: EventKind, handler: Box<dyn Fn(&Event) + Send + Sync>) {
        self.emitter.on(kind, handler);
    }

    fn relay(&self, event: &Event, source: &str) {
        if let Some(line) = format_relay(event, source) {
            println!("{line}");
        }
    }
}
