//! Chat-service realm: one logged-in account in one channel.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use realmlink_types::{Event, EventKind, Message, User};
use tokio_util::sync::CancellationToken;

use crate::config::BNetConfig;
use crate::emitter::EventEmitter;
use crate::error::RealmError;
use crate::format::format_relay;
use crate::gateway::{GatewaySession, Inbound, Outbound, Outbox};
use crate::realm::Realm;

/// Flag bits that mark a user as a channel operator.
pub const FLAG_BLIZZARD: u32 = 0x01;
pub const FLAG_OPERATOR: u32 = 0x02;
pub const FLAG_ADMIN: u32 = 0x08;

const OPERATOR_FLAGS: u32 = FLAG_BLIZZARD | FLAG_OPERATOR | FLAG_ADMIN;

/// A chat-service session reached through a gateway.
///
/// Tracks the current channel and its membership. Relayed events are posted
/// into the channel as plain lines.
#[derive(Debug)]
pub struct BNetRealm {
    key: String,
    config: BNetConfig,
    emitter: EventEmitter,
    outbox: Outbox,
    state: Mutex<ChannelState>,
}

#[derive(Debug, Default)]
struct ChannelState {
    channel: Option<String>,
    /// Keyed by lowercase name.
    users: HashMap<String, User>,
}

impl BNetRealm {
    /// Creates the realm from merged settings.
    ///
    /// # Errors
    ///
    /// Returns `RealmError::Config` if a required setting is missing.
    pub fn new(key: impl Into<String>, config: BNetConfig) -> Result<Self, RealmError> {
        let key = key.into();
        config.validate(&key)?;
        Ok(Self {
            key,
            config,
            emitter: EventEmitter::new(),
            outbox: Outbox::new(),
            state: Mutex::new(ChannelState::default()),
        })
    }

    /// Name of the current channel, if any.
    pub fn channel(&self) -> Option<String> {
        self.state().channel.clone()
    }

    /// Snapshot of the current channel membership.
    pub fn users(&self) -> Vec<User> {
        self.state().users.values().cloned().collect()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the known user named `name`, refreshing `last_seen`, or a
    /// fresh user ranked from settings.
    fn touch_user(&self, name: &str) -> User {
        let mut state = self.state();
        match state.users.get_mut(&name.to_lowercase()) {
            Some(user) => {
                user.last_seen = Utc::now();
                user.clone()
            }
            None => User::new(name, self.config.rank_for(name, false)),
        }
    }

    /// Applies one gateway frame and fires the resulting event.
    pub fn handle_frame(&self, frame: Inbound) {
        let event = match frame {
            Inbound::Channel { name } => {
                let mut state = self.state();
                state.channel = Some(name.clone());
                state.users.clear();
                Event::Channel { name }
            }
            Inbound::Join {
                name, stat, flags, ..
            } => {
                let rank = self.config.rank_for(&name, flags & OPERATOR_FLAGS != 0);
                let mut state = self.state();
                match state.users.get_mut(&name.to_lowercase()) {
                    Some(user) => {
                        // Status update for someone already present.
                        user.rank = rank;
                        user.stat_string = stat;
                        user.last_seen = Utc::now();
                        return;
                    }
                    None => {
                        let user = User::new(name.clone(), rank).with_stat_string(stat);
                        state.users.insert(name.to_lowercase(), user.clone());
                        Event::Join(user)
                    }
                }
            }
            Inbound::Leave { name, .. } => {
                let removed = self.state().users.remove(&name.to_lowercase());
                let rank = self.config.rank_for(&name, false);
                Event::Leave(removed.unwrap_or_else(|| User::new(name, rank)))
            }
            Inbound::Chat { name, text, .. } => Event::Chat(Message {
                user: self.touch_user(&name),
                content: text,
            }),
            Inbound::Whisper { name, text } => Event::PrivateChat(Message {
                user: self.touch_user(&name),
                content: text,
            }),
            Inbound::Info { text } | Inbound::Error { text } => {
                Event::SystemMessage { content: text }
            }
        };

        self.emitter.fire(&event);
    }
}

#[async_trait]
impl Realm for BNetRealm {
    async fn run(&self, cancel: CancellationToken) -> Result<(), RealmError> {
        // validate() guarantees both are set.
        let addr = self.config.gateway.clone().unwrap_or_default();
        let username = self.config.username.clone().unwrap_or_default();

        let mut session = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            session = GatewaySession::connect(&addr) => session?,
        };
        session
            .send(&Outbound::Login {
                username,
                channel: self.config.channel.clone(),
            })
            .await?;

        tracing::info!(realm = %self.key, %addr, "chat-service session established");
        self.emitter.fire(&Event::Connected);

        let result = session
            .serve(&self.outbox, &cancel, |frame| self.handle_frame(frame))
            .await;

        {
            let mut state = self.state();
            state.channel = None;
            state.users.clear();
        }
        self.emitter.fire(&Event::Disconnected);
        tracing::info!(realm = %self.key, "chat-service session ended");

        match result {
            Err(RealmError::Cancelled) => Ok(()),
            other => other,
        }
    }

    fn on(&self, kind: EventKind, handler: Box<dyn Fn(&Event) + Send + Sync>) {
        self.emitter.on(kind, handler);
    }

    fn relay(&self, event: &Event, source: &str) {
        let Some(text) = format_relay(event, source) else {
            return;
        };
        if !self.outbox.send(Outbound::Say {
            text,
            channel_id: None,
        }) {
            tracing::trace!(realm = %self.key, source, "dropping relay while disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realmlink_types::Rank;
    use std::sync::Arc;

    fn realm() -> BNetRealm {
        BNetRealm::new(
            "europe",
            BNetConfig {
                gateway: Some("127.0.0.1:1".into()),
                username: Some("relay".into()),
                rank_default: Some(Rank::Member),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn record(realm: &BNetRealm, kind: EventKind) -> Arc<Mutex<Vec<Event>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        realm.on(kind, Box::new(move |ev| s.lock().unwrap().push(ev.clone())));
        seen
    }

    #[test]
    fn new_rejects_missing_username() {
        let err = BNetRealm::new(
            "asia",
            BNetConfig {
                gateway: Some("x:1".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, RealmError::Config { field: "username", .. }));
    }

    #[test]
    fn join_tracks_membership_and_ranks_operators() {
        let realm = realm();
        let joins = record(&realm, EventKind::Join);

        realm.handle_frame(Inbound::Channel { name: "Op Clan".into() });
        realm.handle_frame(Inbound::Join {
            name: "Grubby".into(),
            stat: "3RAW W3O1 10 clan".into(),
            flags: FLAG_OPERATOR,
            roles: Vec::new(),
            channel_id: None,
        });
        realm.handle_frame(Inbound::Join {
            name: "Moon".into(),
            stat: String::new(),
            flags: 0,
            roles: Vec::new(),
            channel_id: None,
        });
        // Repeated join for a present user is a status update only.
        realm.handle_frame(Inbound::Join {
            name: "moon".into(),
            stat: "PX3W".into(),
            flags: 0,
            roles: Vec::new(),
            channel_id: None,
        });

        let joins = joins.lock().unwrap();
        assert_eq!(joins.len(), 2);
        assert_eq!(joins[0].user().unwrap().rank, Rank::Operator);
        assert_eq!(joins[0].user().unwrap().stat().level, 10);
        assert_eq!(joins[1].user().unwrap().rank, Rank::Member);
        assert_eq!(realm.users().len(), 2);
        assert_eq!(realm.channel().as_deref(), Some("Op Clan"));
    }

    #[test]
    fn leave_uses_stored_user() {
        let realm = realm();
        let leaves = record(&realm, EventKind::Leave);

        realm.handle_frame(Inbound::Join {
            name: "Grubby".into(),
            stat: String::new(),
            flags: FLAG_ADMIN,
            roles: Vec::new(),
            channel_id: None,
        });
        realm.handle_frame(Inbound::Leave {
            name: "grubby".into(),
            channel_id: None,
        });

        let leaves = leaves.lock().unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].user().unwrap().name, "Grubby");
        assert_eq!(leaves[0].user().unwrap().rank, Rank::Operator);
        assert!(realm.users().is_empty());
    }

    #[test]
    fn chat_whisper_and_notices_map_to_events() {
        let realm = realm();
        let chats = record(&realm, EventKind::Chat);
        let whispers = record(&realm, EventKind::PrivateChat);
        let notices = record(&realm, EventKind::SystemMessage);

        realm.handle_frame(Inbound::Chat {
            name: "stranger".into(),
            text: "hi all".into(),
            roles: Vec::new(),
            channel_id: None,
        });
        realm.handle_frame(Inbound::Whisper {
            name: "friend".into(),
            text: "psst".into(),
        });
        realm.handle_frame(Inbound::Info {
            text: "Welcome".into(),
        });
        realm.handle_frame(Inbound::Error {
            text: "That user is not logged on.".into(),
        });

        assert_eq!(chats.lock().unwrap().len(), 1);
        assert_eq!(
            chats.lock().unwrap()[0].user().unwrap().rank,
            Rank::Member
        );
        assert_eq!(whispers.lock().unwrap().len(), 1);
        assert_eq!(notices.lock().unwrap().len(), 2);
    }

    #[test]
    fn channel_change_clears_membership() {
        let realm = realm();
        realm.handle_frame(Inbound::Join {
            name: "Grubby".into(),
            stat: String::new(),
            flags: 0,
            roles: Vec::new(),
            channel_id: None,
        });
        realm.handle_frame(Inbound::Channel { name: "Void".into() });
        assert!(realm.users().is_empty());
    }

    #[test]
    fn relay_while_disconnected_is_dropped() {
        let realm = realm();
        realm.relay(&Event::Connected, "asia");
        assert!(!realm.outbox.is_open());
    }
}
