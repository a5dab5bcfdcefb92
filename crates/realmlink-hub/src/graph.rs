//! Relay graph wiring.
//!
//! Each relay link is expanded eagerly into one subscription per
//! `(source, target, event kind)`. Every subscription owns a
//! [`RelayForward`] that already carries its target, provenance key and rank
//! threshold, so dispatch does no lookups.

use std::collections::HashMap;
use std::sync::Arc;

use realmlink_realm::Realm;
use realmlink_types::{Event, EventKind, Rank};

use crate::config::RelayLink;
use crate::error::HubError;

/// Forwards events from one source realm into one target realm.
#[derive(Clone)]
pub struct RelayForward {
    target: Arc<dyn Realm>,
    source: String,
    min_rank: Option<Rank>,
}

impl RelayForward {
    /// `min_rank` applies only to events that carry a user.
    pub fn new(target: Arc<dyn Realm>, source: impl Into<String>, min_rank: Option<Rank>) -> Self {
        Self {
            target,
            source: source.into(),
            min_rank,
        }
    }

    /// Relays `event` to the target unless its user ranks below the threshold.
    pub fn forward(&self, event: &Event) {
        if let (Some(min), Some(user)) = (self.min_rank, event.user()) {
            if user.rank < min {
                return;
            }
        }
        self.target.relay(event, &self.source);
    }

    fn subscribe(&self, source: &dyn Realm, kind: EventKind) {
        let forward = self.clone();
        source.on(kind, Box::new(move |ev| forward.forward(ev)));
    }
}

/// Event kinds and rank threshold enabled by a link, per category.
fn categories(link: &RelayLink) -> Vec<(EventKind, Option<Rank>)> {
    let mut kinds = Vec::new();
    if link.log {
        kinds.push((EventKind::Connected, None));
        kinds.push((EventKind::Disconnected, None));
        kinds.push((EventKind::Channel, None));
    }
    if link.system {
        kinds.push((EventKind::SystemMessage, None));
    }
    if link.joins {
        kinds.push((EventKind::Join, Some(link.join_rank)));
        kinds.push((EventKind::Leave, Some(link.join_rank)));
    }
    if link.chat {
        kinds.push((EventKind::Chat, Some(link.chat_rank)));
    }
    if link.private_chat {
        kinds.push((EventKind::PrivateChat, Some(link.private_chat_rank)));
    }
    kinds
}

fn resolve<'a>(
    realms: &'a HashMap<String, Arc<dyn Realm>>,
    keys: &'a [String],
    selected: Option<&'a [String]>,
) -> Result<Vec<(&'a str, &'a Arc<dyn Realm>)>, HubError> {
    selected
        .unwrap_or(keys)
        .iter()
        .map(|key| {
            realms
                .get(key)
                .map(|realm| (key.as_str(), realm))
                .ok_or_else(|| HubError::UnknownRealm(key.clone()))
        })
        .collect()
}

fn same_realm(a: &Arc<dyn Realm>, b: &Arc<dyn Realm>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Wires one link into subscriptions on its source realms.
///
/// `keys` is the default source and target list for links that omit one.
/// Every key is resolved before anything is subscribed. Pairs whose source
/// and target are the same realm are skipped.
///
/// Returns the number of subscriptions created.
///
/// # Errors
///
/// Returns `HubError::UnknownRealm` for the first key with no registered
/// realm.
pub fn wire_link(
    realms: &HashMap<String, Arc<dyn Realm>>,
    keys: &[String],
    link: &RelayLink,
) -> Result<usize, HubError> {
    let sources = resolve(realms, keys, link.sources.as_deref())?;
    let targets = resolve(realms, keys, link.targets.as_deref())?;
    let kinds = categories(link);

    let mut subscriptions = 0;
    for (source_key, source) in &sources {
        for (target_key, target) in &targets {
            if same_realm(source, target) {
                continue;
            }

            for (kind, min_rank) in &kinds {
                RelayForward::new((*target).clone(), *source_key, *min_rank)
                    .subscribe(source.as_ref(), *kind);
                subscriptions += 1;
            }

            tracing::debug!(
                source = %source_key,
                target = %target_key,
                kinds = kinds.len(),
                "wired relay"
            );
        }
    }

    Ok(subscriptions)
}
