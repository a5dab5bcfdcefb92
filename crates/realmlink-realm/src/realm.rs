//! The capability contract shared by every endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use realmlink_types::{Event, EventKind};
use tokio_util::sync::CancellationToken;

use crate::error::RealmError;

/// Registration key of the console realm.
pub const STDIO_KEY: &str = "STDIO";

/// Separator between a parent realm key and a sub-realm id.
///
/// Configured realm keys must not contain it.
pub const REALM_DELIMITER: &str = "/";

/// Builds the composite key of a sub-realm.
pub fn sub_realm_key(parent: &str, child: &str) -> String {
    format!("{parent}{REALM_DELIMITER}{child}")
}

/// An addressable chat endpoint participating in relaying.
///
/// `relay` is called from the source realm's task, not this realm's own
/// `run` task, so any state it touches must be synchronized.
#[async_trait]
pub trait Realm: Send + Sync {
    /// Runs the realm until its session ends or `cancel` fires.
    ///
    /// Returns `Ok(())` (or [`RealmError::Cancelled`]) on cancellation and
    /// the triggering error otherwise.
    async fn run(&self, cancel: CancellationToken) -> Result<(), RealmError>;

    /// Subscribes `handler` to events of `kind` fired by this realm.
    fn on(&self, kind: EventKind, handler: Box<dyn Fn(&Event) + Send + Sync>);

    /// Accepts an event forwarded from the realm registered as `source`.
    ///
    /// Implementations must not forward the event back toward `source`.
    fn relay(&self, event: &Event, source: &str);

    /// Nested realms owned by this one, keyed by their local id.
    fn sub_realms(&self) -> Vec<(String, Arc<dyn Realm>)> {
        Vec::new()
    }
}
