//! Shared types for the realmlink relay hub.
//!
//! This crate provides the vocabulary every other crate speaks: user
//! [`Rank`]s, the [`User`] record carried by membership and chat events, and
//! the closed [`Event`] taxonomy published on realm emitters.
//!
//! No crate in the workspace defines its own event or user types. Realms
//! translate their protocol-level observations into these types before
//! firing them, so the relay graph never needs to know which kind of realm
//! produced an event.

mod event;

pub use event::{AsyncError, Event, EventKind, Message};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Privilege level of a user, used purely for relay filtering.
///
/// Ranks are totally ordered: `Guest < Member < Operator < Owner`. A relay
/// link with a rank threshold drops events whose user is strictly below it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    /// Unknown or unprivileged user.
    #[default]
    Guest,
    /// Regular member of a channel or server.
    Member,
    /// Channel operator or moderator.
    Operator,
    /// Owner of the realm (or the local console user).
    Owner,
}

impl Rank {
    /// Returns the canonical lowercase label for this rank.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Member => "member",
            Self::Operator => "operator",
            Self::Owner => "owner",
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Rank {
    type Err = ParseRankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "guest" => Ok(Self::Guest),
            "member" => Ok(Self::Member),
            "operator" => Ok(Self::Operator),
            "owner" => Ok(Self::Owner),
            _ => Err(ParseRankError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown rank label.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown rank: {0}")]
pub struct ParseRankError(pub String);

/// A user observed in a realm.
///
/// `name` identifies the user within a realm's membership at a point in
/// time. `stat_string` is the opaque status string reported by the realm;
/// see [`User::stat`] for its decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Display name, unique within the realm's current membership.
    pub name: String,
    /// Rank derived by the realm from its own notion of privilege.
    pub rank: Rank,
    /// Opaque status string (product, icon, level, clan).
    #[serde(default)]
    pub stat_string: String,
    /// When the user was first seen in the current channel.
    pub joined: DateTime<Utc>,
    /// When the user last produced any activity.
    pub last_seen: DateTime<Utc>,
}

impl User {
    /// Creates a user first seen now.
    pub fn new(name: impl Into<String>, rank: Rank) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            rank,
            stat_string: String::new(),
            joined: now,
            last_seen: now,
        }
    }

    /// Sets the opaque status string.
    pub fn with_stat_string(mut self, stat_string: impl Into<String>) -> Self {
        self.stat_string = stat_string.into();
        self
    }

    /// Decodes the status string into its product, icon, level and clan tag.
    ///
    /// Missing tokens yield sentinel values (empty strings, level `-1`)
    /// rather than errors.
    pub fn stat(&self) -> Stat {
        Stat::parse(&self.stat_string)
    }
}

/// Decoded form of a user's status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Four-character product code (stored reversed on the wire).
    pub product: String,
    /// Icon identifier.
    pub icon: String,
    /// Player level, `-1` when absent or not numeric.
    pub level: i32,
    /// Upper-cased clan tag.
    pub tag: String,
}

impl Default for Stat {
    fn default() -> Self {
        Self {
            product: String::new(),
            icon: String::new(),
            level: -1,
            tag: String::new(),
        }
    }
}

impl Stat {
    /// Parses a space-separated status string.
    ///
    /// A first token longer than four characters is not a product code, in
    /// which case every field keeps its sentinel value.
    pub fn parse(s: &str) -> Self {
        let mut stat = Self::default();

        let tokens: Vec<&str> = s.split(' ').collect();
        match tokens.first() {
            Some(product) if product.chars().count() <= 4 => {
                stat.product = product.chars().rev().collect();
            }
            _ => return stat,
        }

        if let Some(icon) = tokens.get(1) {
            stat.icon = (*icon).to_string();
        }
        if let Some(level) = tokens.get(2).and_then(|t| t.parse().ok()) {
            stat.level = level;
        }
        if let Some(tag) = tokens.get(3) {
            stat.tag = tag.to_uppercase();
        }

        stat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_total_order() {
        assert!(Rank::Guest < Rank::Member);
        assert!(Rank::Member < Rank::Operator);
        assert!(Rank::Operator < Rank::Owner);
        assert_eq!(Rank::default(), Rank::Guest);
    }

    #[test]
    fn rank_labels_parse_back() {
        for rank in [Rank::Guest, Rank::Member, Rank::Operator, Rank::Owner] {
            assert_eq!(rank.as_str().parse::<Rank>().unwrap(), rank);
        }
        assert_eq!("OPERATOR".parse::<Rank>().unwrap(), Rank::Operator);
        assert!("admin".parse::<Rank>().is_err());
    }

    #[test]
    fn rank_deserializes_lowercase() {
        let rank: Rank = serde_json::from_str("\"member\"").unwrap();
        assert_eq!(rank, Rank::Member);
    }

    #[test]
    fn stat_full_string() {
        let stat = Stat::parse("3RAW W3O1 10 clan");
        assert_eq!(stat.product, "WAR3");
        assert_eq!(stat.icon, "W3O1");
        assert_eq!(stat.level, 10);
        assert_eq!(stat.tag, "CLAN");
    }

    #[test]
    fn stat_missing_trailing_tokens() {
        let stat = Stat::parse("PX3W");
        assert_eq!(stat.product, "W3XP");
        assert_eq!(stat.icon, "");
        assert_eq!(stat.level, -1);
        assert_eq!(stat.tag, "");

        let stat = Stat::parse("3RAW icon");
        assert_eq!(stat.icon, "icon");
        assert_eq!(stat.level, -1);
    }

    #[test]
    fn stat_non_numeric_level() {
        let stat = Stat::parse("3RAW icon abc tag");
        assert_eq!(stat.level, -1);
        assert_eq!(stat.tag, "TAG");
    }

    #[test]
    fn stat_long_first_token_is_sentinel() {
        assert_eq!(Stat::parse("TOOLONG icon 10 clan"), Stat::default());
    }

    #[test]
    fn stat_empty_string() {
        let stat = User::new("alice", Rank::Guest).stat();
        assert_eq!(stat, Stat::default());
    }
}
