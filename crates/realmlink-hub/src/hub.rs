//! The hub: realm registry, relay wiring, and the run entry point.

use std::collections::HashMap;
use std::sync::Arc;

use realmlink_realm::{
    sub_realm_key, BNetRealm, DiscordRealm, EventEmitter, Realm, StdioRealm, REALM_DELIMITER,
    STDIO_KEY,
};
use realmlink_types::{Event, EventKind};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, RelayLink};
use crate::error::HubError;
use crate::graph::wire_link;
use crate::supervisor::run_all;

/// Collects realms and links, then wires them into a [`Hub`].
#[derive(Default)]
pub struct HubBuilder {
    realms: HashMap<String, Arc<dyn Realm>>,
    keys: Vec<String>,
    links: Vec<RelayLink>,
}

impl HubBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `realm` under `key`, followed by each of its sub-realms
    /// under `<key>/<id>`.
    ///
    /// # Errors
    ///
    /// Returns `HubError::DuplicateRealm` if any of those keys is taken.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        realm: Arc<dyn Realm>,
    ) -> Result<&mut Self, HubError> {
        let key = key.into();
        let subs = realm.sub_realms();
        self.insert(key.clone(), realm)?;
        for (id, sub) in subs {
            self.insert(sub_realm_key(&key, &id), sub)?;
        }
        Ok(self)
    }

    fn insert(&mut self, key: String, realm: Arc<dyn Realm>) -> Result<(), HubError> {
        if self.realms.contains_key(&key) {
            return Err(HubError::DuplicateRealm(key));
        }
        self.realms.insert(key.clone(), realm);
        self.keys.push(key);
        Ok(())
    }

    pub fn link(&mut self, link: RelayLink) -> &mut Self {
        self.links.push(link);
        self
    }

    pub fn links(&mut self, links: impl IntoIterator<Item = RelayLink>) -> &mut Self {
        self.links.extend(links);
        self
    }

    /// Wires every link against the registry.
    ///
    /// # Errors
    ///
    /// Returns `HubError::UnknownRealm` if a link names an unregistered key.
    pub fn build(self) -> Result<Hub, HubError> {
        let mut subscriptions = 0;
        for link in &self.links {
            subscriptions += wire_link(&self.realms, &self.keys, link)?;
        }

        tracing::info!(
            realms = self.keys.len(),
            links = self.links.len(),
            subscriptions,
            "relay graph wired"
        );

        Ok(Hub {
            emitter: EventEmitter::new(),
            realms: self.realms,
            keys: self.keys,
        })
    }
}

/// A fully wired set of realms.
pub struct Hub {
    emitter: EventEmitter,
    realms: HashMap<String, Arc<dyn Realm>>,
    keys: Vec<String>,
}

impl Hub {
    pub fn builder() -> HubBuilder {
        HubBuilder::new()
    }

    /// Builds every configured realm and wires the configured links.
    ///
    /// Realms are registered as `STDIO`, then chat-service realms, then
    /// chat-bridge realms each followed by their channels.
    ///
    /// # Errors
    ///
    /// Returns the first construction failure; no realm has been started.
    pub fn from_config(config: &Config) -> Result<Self, HubError> {
        let mut builder = HubBuilder::new();
        builder.register(STDIO_KEY, Arc::new(StdioRealm::new(config.stdio.clone())))?;

        for (key, settings) in &config.bnet.realms {
            check_key(key)?;
            let mut settings = settings.clone();
            settings.merge_defaults(&config.bnet.default);
            let realm = BNetRealm::new(key.as_str(), settings).map_err(|source| {
                HubError::Realm {
                    realm: key.clone(),
                    source,
                }
            })?;
            builder.register(key.as_str(), Arc::new(realm))?;
        }

        let defaults = &config.discord.default;
        for (key, settings) in &config.discord.realms {
            check_key(key)?;
            let mut settings = settings.clone();
            settings.merge_defaults(&defaults.realm, &defaults.channel);
            let realm = DiscordRealm::new(key.as_str(), settings).map_err(|source| {
                HubError::Realm {
                    realm: key.clone(),
                    source,
                }
            })?;
            builder.register(key.as_str(), Arc::new(realm))?;
        }

        builder.links(config.relay.iter().cloned());
        builder.build()
    }

    /// Registered keys in discovery order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn realm(&self, key: &str) -> Option<&Arc<dyn Realm>> {
        self.realms.get(key)
    }

    /// Subscribes to process-wide events such as realm run failures.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.emitter.on(kind, handler);
    }

    /// Runs every realm until all of them have returned.
    ///
    /// Cancel `cancel` to shut down. Failures are reported as
    /// [`Event::AsyncError`] to handlers registered with [`Hub::on`].
    pub async fn run(&self, cancel: &CancellationToken) {
        let realms = self
            .keys
            .iter()
            .filter_map(|key| self.realms.get(key).map(|r| (key.clone(), r.clone())))
            .collect();

        tracing::info!(realms = self.keys.len(), "starting realms");
        run_all(realms, &self.emitter, cancel).await;
        tracing::info!("all realms finished");
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("keys", &self.keys)
            .field("emitter", &self.emitter)
            .finish()
    }
}

fn check_key(key: &str) -> Result<(), HubError> {
    if key.is_empty() || key.contains(REALM_DELIMITER) || key == STDIO_KEY {
        return Err(HubError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_keys_must_be_plain() {
        assert!(check_key("europe").is_ok());
        assert!(matches!(check_key("eu/west"), Err(HubError::InvalidKey(_))));
        assert!(matches!(check_key(""), Err(HubError::InvalidKey(_))));
        assert!(matches!(check_key("STDIO"), Err(HubError::InvalidKey(_))));
    }
}
