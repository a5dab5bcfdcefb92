//! Chat-bridge realm and its per-channel sub-realms.
//!
//! A [`DiscordRealm`] owns one gateway session shared by all of its
//! channels. Each configured channel is exposed as a [`DiscordChannelRealm`]
//! registered under `<realm>/<channel_id>`, so relay links can address a
//! single channel. Frames tagged with a channel id are dispatched to that
//! channel's emitter; untagged frames belong to the bridge itself. Relays
//! addressed to the bridge are not fanned out to its channels.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use realmlink_types::{Event, EventKind, Message, Rank, User};
use tokio_util::sync::CancellationToken;

use crate::config::{DiscordChannelConfig, DiscordConfig};
use crate::emitter::EventEmitter;
use crate::error::RealmError;
use crate::format::format_relay;
use crate::gateway::{GatewaySession, Inbound, Outbound, Outbox};
use crate::realm::{sub_realm_key, Realm};

/// A chat-bridge session reached through a gateway.
#[derive(Debug)]
pub struct DiscordRealm {
    key: String,
    config: DiscordConfig,
    emitter: EventEmitter,
    outbox: Arc<Outbox>,
    /// Cancelled once the bridge's run loop returns.
    ended: CancellationToken,
    channels: BTreeMap<String, Arc<DiscordChannelRealm>>,
}

impl DiscordRealm {
    /// Creates the bridge and one sub-realm per configured channel.
    ///
    /// # Errors
    ///
    /// Returns `RealmError::Config` if a required setting is missing.
    pub fn new(key: impl Into<String>, config: DiscordConfig) -> Result<Self, RealmError> {
        let key = key.into();
        config.validate(&key)?;

        let outbox = Arc::new(Outbox::new());
        let ended = CancellationToken::new();
        let channels = config
            .channels
            .iter()
            .map(|(id, channel)| {
                let realm = DiscordChannelRealm {
                    key: sub_realm_key(&key, id),
                    channel_id: id.clone(),
                    config: channel.clone(),
                    emitter: EventEmitter::new(),
                    outbox: outbox.clone(),
                    ended: ended.clone(),
                    users: Mutex::new(HashMap::new()),
                };
                (id.clone(), Arc::new(realm))
            })
            .collect();

        Ok(Self {
            key,
            config,
            emitter: EventEmitter::new(),
            outbox,
            ended,
            channels,
        })
    }

    /// The sub-realm for `channel_id`, if configured.
    pub fn channel(&self, channel_id: &str) -> Option<&Arc<DiscordChannelRealm>> {
        self.channels.get(channel_id)
    }

    /// Applies one gateway frame.
    ///
    /// Frames for unconfigured channels are ignored.
    pub fn handle_frame(&self, frame: Inbound) {
        let channel_id = match &frame {
            Inbound::Join { channel_id, .. }
            | Inbound::Leave { channel_id, .. }
            | Inbound::Chat { channel_id, .. } => channel_id.clone(),
            _ => None,
        };

        if let Some(id) = channel_id {
            match self.channels.get(&id) {
                Some(channel) => channel.handle_frame(frame),
                None => tracing::debug!(
                    realm = %self.key,
                    channel_id = %id,
                    "ignoring frame for unmanaged channel"
                ),
            }
            return;
        }

        let event = match frame {
            Inbound::Channel { name } => Event::Channel { name },
            Inbound::Join { name, .. } => Event::Join(User::new(name, Rank::Guest)),
            Inbound::Leave { name, .. } => Event::Leave(User::new(name, Rank::Guest)),
            Inbound::Chat { name, text, .. } => Event::Chat(Message {
                user: User::new(name, Rank::Guest),
                content: text,
            }),
            Inbound::Whisper { name, text } => Event::PrivateChat(Message {
                user: User::new(name, Rank::Guest),
                content: text,
            }),
            Inbound::Info { text } | Inbound::Error { text } => {
                Event::SystemMessage { content: text }
            }
        };
        self.emitter.fire(&event);
    }

    async fn run_session(&self, cancel: &CancellationToken) -> Result<(), RealmError> {
        // validate() guarantees the gateway is set.
        let addr = self.config.gateway.clone().unwrap_or_default();

        let mut session = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            session = GatewaySession::connect(&addr) => session?,
        };
        session
            .send(&Outbound::Login {
                username: self.config.username.clone().unwrap_or_else(|| self.key.clone()),
                channel: None,
            })
            .await?;

        tracing::info!(
            realm = %self.key,
            %addr,
            channels = self.channels.len(),
            "chat-bridge session established"
        );
        self.emitter.fire(&Event::Connected);

        let result = session
            .serve(&self.outbox, cancel, |frame| self.handle_frame(frame))
            .await;

        for channel in self.channels.values() {
            channel.users().clear();
        }
        self.emitter.fire(&Event::Disconnected);
        tracing::info!(realm = %self.key, "chat-bridge session ended");

        match result {
            Err(RealmError::Cancelled) => Ok(()),
            other => other,
        }
    }
}

#[async_trait]
impl Realm for DiscordRealm {
    async fn run(&self, cancel: CancellationToken) -> Result<(), RealmError> {
        let result = self.run_session(&cancel).await;
        self.ended.cancel();
        result
    }

    fn on(&self, kind: EventKind, handler: Box<dyn Fn(&Event) + Send + Sync>) {
        self.emitter.on(kind, handler);
    }

    /// Posts nothing. Channels are relay targets in their own right and
    /// receive linked events directly.
    fn relay(&self, event: &Event, source: &str) {
        tracing::trace!(
            realm = %self.key,
            source,
            kind = %event.kind(),
            "bridge relay left to its channels"
        );
    }

    fn sub_realms(&self) -> Vec<(String, Arc<dyn Realm>)> {
        self.channels
            .iter()
            .map(|(id, channel)| (id.clone(), channel.clone() as Arc<dyn Realm>))
            .collect()
    }
}

/// One channel of a chat-bridge realm.
///
/// Has no connection of its own: events arrive through the parent's session
/// and relayed lines leave through it.
#[derive(Debug)]
pub struct DiscordChannelRealm {
    key: String,
    channel_id: String,
    config: DiscordChannelConfig,
    emitter: EventEmitter,
    outbox: Arc<Outbox>,
    ended: CancellationToken,
    /// Keyed by name.
    users: Mutex<HashMap<String, User>>,
}

impl DiscordChannelRealm {
    fn users(&self) -> std::sync::MutexGuard<'_, HashMap<String, User>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of users seen in this channel.
    pub fn members(&self) -> Vec<User> {
        self.users().values().cloned().collect()
    }

    fn handle_frame(&self, frame: Inbound) {
        let event = match frame {
            Inbound::Join {
                name, stat, roles, ..
            } => {
                let user = User::new(name.clone(), self.config.rank_for(&roles))
                    .with_stat_string(stat);
                self.users().insert(name, user.clone());
                Event::Join(user)
            }
            Inbound::Leave { name, .. } => {
                let removed = self.users().remove(&name);
                let rank = self.config.rank_for::<&str>(&[]);
                Event::Leave(removed.unwrap_or_else(|| User::new(name, rank)))
            }
            Inbound::Chat {
                name, text, roles, ..
            } => {
                let rank = self.config.rank_for(&roles);
                let user = {
                    let mut users = self.users();
                    match users.get_mut(&name) {
                        Some(user) => {
                            user.rank = rank;
                            user.last_seen = Utc::now();
                            user.clone()
                        }
                        None => User::new(name, rank),
                    }
                };
                Event::Chat(Message {
                    user,
                    content: text,
                })
            }
            // Only tagged membership and chat frames are routed here.
            _ => return,
        };
        self.emitter.fire(&event);
    }
}

#[async_trait]
impl Realm for DiscordChannelRealm {
    async fn run(&self, cancel: CancellationToken) -> Result<(), RealmError> {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = self.ended.cancelled() => {}
        }
        Ok(())
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
            channel_id: Some(self.channel_id.clone()),
        }) {
            tracing::trace!(realm = %self.key, source, "dropping relay while disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> DiscordRealm {
        let mut config = DiscordConfig {
            gateway: Some("127.0.0.1:1".into()),
            username: None,
            channels: BTreeMap::new(),
        };
        config.channels.insert(
            "100".into(),
            DiscordChannelConfig {
                rank_default: Some(Rank::Member),
                rank_roles: HashMap::from([("mod".to_string(), Rank::Operator)]),
            },
        );
        config
            .channels
            .insert("200".into(), DiscordChannelConfig::default());
        DiscordRealm::new("discord", config).unwrap()
    }

    fn record(realm: &dyn Realm, kind: EventKind) -> Arc<Mutex<Vec<Event>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        realm.on(kind, Box::new(move |ev| s.lock().unwrap().push(ev.clone())));
        seen
    }

    #[test]
    fn sub_realms_use_composite_keys() {
        let bridge = bridge();
        let subs = bridge.sub_realms();
        let ids: Vec<&str> = subs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["100", "200"]);
        assert_eq!(bridge.channel("100").unwrap().key, "discord/100");
    }

    #[test]
    fn tagged_frames_reach_only_their_channel() {
        let bridge = bridge();
        let ch100 = bridge.channel("100").unwrap().clone();
        let ch200 = bridge.channel("200").unwrap().clone();
        let chat100 = record(ch100.as_ref(), EventKind::Chat);
        let chat200 = record(ch200.as_ref(), EventKind::Chat);
        let chat_parent = record(&bridge, EventKind::Chat);

        bridge.handle_frame(Inbound::Chat {
            name: "alice".into(),
            text: "hello".into(),
            roles: vec!["mod".into()],
            channel_id: Some("100".into()),
        });
        bridge.handle_frame(Inbound::Chat {
            name: "bob".into(),
            text: "nobody hears".into(),
            roles: Vec::new(),
            channel_id: Some("999".into()),
        });

        let chat100 = chat100.lock().unwrap();
        assert_eq!(chat100.len(), 1);
        assert_eq!(chat100[0].user().unwrap().rank, Rank::Operator);
        assert!(chat200.lock().unwrap().is_empty());
        assert!(chat_parent.lock().unwrap().is_empty());
    }

    #[test]
    fn channel_membership_and_default_rank() {
        let bridge = bridge();
        let ch100 = bridge.channel("100").unwrap().clone();
        let joins = record(ch100.as_ref(), EventKind::Join);

        bridge.handle_frame(Inbound::Join {
            name: "carol".into(),
            stat: String::new(),
            flags: 0,
            roles: Vec::new(),
            channel_id: Some("100".into()),
        });
        assert_eq!(joins.lock().unwrap()[0].user().unwrap().rank, Rank::Member);
        assert_eq!(ch100.members().len(), 1);

        bridge.handle_frame(Inbound::Leave {
            name: "carol".into(),
            channel_id: Some("100".into()),
        });
        assert!(ch100.members().is_empty());
    }

    #[test]
    fn untagged_frames_fire_on_bridge() {
        let bridge = bridge();
        let notices = record(&bridge, EventKind::SystemMessage);
        let whispers = record(&bridge, EventKind::PrivateChat);

        bridge.handle_frame(Inbound::Info {
            text: "bridge ready".into(),
        });
        bridge.handle_frame(Inbound::Whisper {
            name: "dave".into(),
            text: "dm".into(),
        });

        assert_eq!(notices.lock().unwrap().len(), 1);
        assert_eq!(whispers.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn channel_run_ends_with_parent() {
        let bridge = bridge();
        let ch = bridge.channel("200").unwrap().clone();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(async move { ch.run(CancellationToken::new()).await });
        cancel.cancel();
        // The channel was given its own token; only the bridge ending stops it.
        let _ = bridge.run(cancel).await;
        assert!(handle.await.unwrap().is_ok());
    }
}
