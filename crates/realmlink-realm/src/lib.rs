//! Realms: the endpoints the hub relays between.
//!
//! Every realm implements the [`Realm`] capability contract: it runs until
//! its session ends or the shared cancellation token fires, exposes its
//! [`EventEmitter`] through `on`, and accepts events relayed from other
//! realms through `relay`.
//!
//! # Realm kinds
//!
//! | Kind | Type | Key |
//! |------|------|-----|
//! | console | [`StdioRealm`] | `STDIO` |
//! | chat-service | [`BNetRealm`] | configured key |
//! | chat-bridge | [`DiscordRealm`] | configured key |
//! | chat-bridge channel | [`DiscordChannelRealm`] | `<key>/<channel_id>` |
//!
//! Chat-service and chat-bridge realms reach their upstream networks through
//! a gateway process speaking newline-delimited JSON; see [`gateway`].

pub mod bnet;
pub mod config;
pub mod discord;
pub mod emitter;
pub mod error;
pub mod format;
pub mod gateway;
pub mod realm;
pub mod stdio;

pub use bnet::BNetRealm;
pub use config::{BNetConfig, DiscordChannelConfig, DiscordConfig, StdioConfig};
pub use discord::{DiscordChannelRealm, DiscordRealm};
pub use emitter::{EventEmitter, Handler};
pub use error::RealmError;
pub use format::format_relay;
pub use realm::{sub_realm_key, Realm, REALM_DELIMITER, STDIO_KEY};
pub use stdio::StdioRealm;
