//! Per-realm settings records and their explicit defaulting.
//!
//! Every optional field left unset on a realm record is filled from the
//! section's `default` record by `merge_defaults`. Required fields are then
//! checked by `validate`; a field still missing at that point is a
//! construction error.

use std::collections::{BTreeMap, HashMap};

use realmlink_types::Rank;
use serde::Deserialize;

use crate::error::RealmError;

fn default_stdio_read() -> bool {
    true
}

fn default_stdio_name() -> String {
    "console".to_string()
}

fn default_stdio_rank() -> Rank {
    Rank::Owner
}

/// Settings of the console realm.
#[derive(Debug, Clone, Deserialize)]
pub struct StdioConfig {
    /// Whether lines typed on stdin are published as chat.
    #[serde(default = "default_stdio_read")]
    pub read: bool,

    /// Name of the console user.
    #[serde(default = "default_stdio_name")]
    pub name: String,

    /// Rank of the console user.
    #[serde(default = "default_stdio_rank")]
    pub rank: Rank,
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            read: default_stdio_read(),
            name: default_stdio_name(),
            rank: default_stdio_rank(),
        }
    }
}

/// Settings of a chat-service realm.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BNetConfig {
    /// Gateway address, `host:port`.
    pub gateway: Option<String>,

    /// Account name used to log in.
    pub username: Option<String>,

    /// Channel to enter after login.
    pub channel: Option<String>,

    /// Rank given to channel operators.
    pub rank_operator: Option<Rank>,

    /// Rank given to everyone else.
    pub rank_default: Option<Rank>,

    /// Per-user rank overrides, matched case-insensitively.
    #[serde(default)]
    pub rank_users: HashMap<String, Rank>,
}

impl BNetConfig {
    /// Fills every unset field from `default`.
    ///
    /// Per-user overrides are merged key by key; entries already present on
    /// this record win.
    pub fn merge_defaults(&mut self, default: &BNetConfig) {
        fill(&mut self.gateway, &default.gateway);
        fill(&mut self.username, &default.username);
        fill(&mut self.channel, &default.channel);
        fill(&mut self.rank_operator, &default.rank_operator);
        fill(&mut self.rank_default, &default.rank_default);
        for (name, rank) in &default.rank_users {
            self.rank_users.entry(name.clone()).or_insert(*rank);
        }
    }

    /// Checks that the settings needed to open a session are present.
    ///
    /// # Errors
    ///
    /// Returns `RealmError::Config` naming the first missing field.
    pub fn validate(&self, realm: &str) -> Result<(), RealmError> {
        require(realm, "gateway", &self.gateway)?;
        require(realm, "username", &self.username)?;
        Ok(())
    }

    /// Derives the rank of a user from its name and operator status.
    pub fn rank_for(&self, name: &str, operator: bool) -> Rank {
        let overridden = self
            .rank_users
            .iter()
            .find(|(user, _)| user.eq_ignore_ascii_case(name))
            .map(|(_, rank)| *rank);

        match overridden {
            Some(rank) => rank,
            None if operator => self.rank_operator.unwrap_or(Rank::Operator),
            None => self.rank_default.unwrap_or(Rank::Guest),
        }
    }
}

/// Settings of one channel managed by a chat-bridge realm.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordChannelConfig {
    /// Rank for users with none of the listed roles.
    pub rank_default: Option<Rank>,

    /// Role name to rank; a user gets the highest matching rank.
    #[serde(default)]
    pub rank_roles: HashMap<String, Rank>,
}

impl DiscordChannelConfig {
    /// Fills every unset field from `default`.
    pub fn merge_defaults(&mut self, default: &DiscordChannelConfig) {
        fill(&mut self.rank_default, &default.rank_default);
        for (role, rank) in &default.rank_roles {
            self.rank_roles.entry(role.clone()).or_insert(*rank);
        }
    }

    /// Derives a user's rank from their roles.
    pub fn rank_for<S: AsRef<str>>(&self, roles: &[S]) -> Rank {
        roles
            .iter()
            .filter_map(|role| self.rank_roles.get(role.as_ref()).copied())
            .max()
            .unwrap_or_else(|| self.rank_default.unwrap_or(Rank::Guest))
    }
}

/// Settings of a chat-bridge realm.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordConfig {
    /// Gateway address, `host:port`.
    pub gateway: Option<String>,

    /// Bot name announced at login.
    pub username: Option<String>,

    /// Managed channels, keyed by channel id.
    #[serde(default)]
    pub channels: BTreeMap<String, DiscordChannelConfig>,
}

impl DiscordConfig {
    /// Fills unset realm fields from `default` and every channel from
    /// `default_channel`.
    pub fn merge_defaults(
        &mut self,
        default: &DiscordConfig,
        default_channel: &DiscordChannelConfig,
    ) {
        fill(&mut self.gateway, &default.gateway);
        fill(&mut self.username, &default.username);
        for channel in self.channels.values_mut() {
            channel.merge_defaults(default_channel);
        }
    }

    /// Checks that the settings needed to open a session are present.
    ///
    /// # Errors
    ///
    /// Returns `RealmError::Config` naming the first missing field.
    pub fn validate(&self, realm: &str) -> Result<(), RealmError> {
        require(realm, "gateway", &self.gateway)
    }
}

fn fill<T: Clone>(field: &mut Option<T>, default: &Option<T>) {
    if field.is_none() {
        field.clone_from(default);
    }
}

fn require<T>(realm: &str, field: &'static str, value: &Option<T>) -> Result<(), RealmError> {
    match value {
        Some(_) => Ok(()),
        None => Err(RealmError::Config {
            realm: realm.to_string(),
            field,
        }),
    }
}
