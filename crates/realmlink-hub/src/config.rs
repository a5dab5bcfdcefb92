//! Hub configuration loading from file and environment variables.

use std::collections::BTreeMap;

use realmlink_realm::{BNetConfig, DiscordChannelConfig, DiscordConfig, StdioConfig};
use realmlink_types::Rank;
use serde::Deserialize;
use thiserror::Error;

/// Top-level hub configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Console realm settings.
    #[serde(default)]
    pub stdio: StdioConfig,

    /// Chat-service realms.
    #[serde(default)]
    pub bnet: BNetSection,

    /// Chat-bridge realms.
    #[serde(default)]
    pub discord: DiscordSection,

    /// Relay links, wired in order.
    #[serde(default)]
    pub relay: Vec<RelayLink>,
}

/// Chat-service section: a default record and one record per realm.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BNetSection {
    #[serde(default)]
    pub default: BNetConfig,

    #[serde(default)]
    pub realms: BTreeMap<String, BNetConfig>,
}

/// Defaults for chat-bridge realms and for their channels.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultDiscordConfig {
    #[serde(flatten)]
    pub realm: DiscordConfig,

    #[serde(flatten)]
    pub channel: DiscordChannelConfig,
}

/// Chat-bridge section: defaults and one record per realm.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordSection {
    #[serde(default)]
    pub default: DefaultDiscordConfig,

    #[serde(default)]
    pub realms: BTreeMap<String, DiscordConfig>,
}

/// A declarative relay rule.
///
/// Events of the enabled categories flow from every `in` realm to every
/// `out` realm. An absent list means every realm registered at wiring time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RelayLink {
    /// Source realm keys.
    #[serde(default, rename = "in")]
    pub sources: Option<Vec<String>>,

    /// Target realm keys.
    #[serde(default, rename = "out")]
    pub targets: Option<Vec<String>>,

    /// Relay connect, disconnect and channel events.
    #[serde(default)]
    pub log: bool,

    /// Relay system messages.
    #[serde(default)]
    pub system: bool,

    /// Relay joins and leaves.
    #[serde(default)]
    pub joins: bool,

    /// Relay public chat.
    #[serde(default)]
    pub chat: bool,

    /// Relay private chat.
    #[serde(default)]
    pub private_chat: bool,

    /// Minimum rank for relayed joins and leaves.
    #[serde(default)]
    pub join_rank: Rank,

    /// Minimum rank for relayed public chat.
    #[serde(default)]
    pub chat_rank: Rank,

    /// Minimum rank for relayed private chat.
    #[serde(default)]
    pub private_chat_rank: Rank,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "realmlink_hub=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `REALMLINK_LOG_LEVEL` overrides `logging.level`
/// - `REALMLINK_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Ok(level) = std::env::var("REALMLINK_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("REALMLINK_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[stdio]
read = false

[bnet.default]
gateway = "127.0.0.1:6200"
rank_default = "member"

[bnet.realms.europe]
username = "relay_eu"
channel = "Op Clan"

[bnet.realms.asia]
username = "relay_as"
gateway = "127.0.0.1:6201"

[discord.default]
gateway = "127.0.0.1:7000"
rank_default = "member"

[discord.realms.discord.channels.100]
[discord.realms.discord.channels.200]
rank_roles = { mod = "operator" }

[[relay]]
in = ["europe"]
out = ["discord/100"]
chat = true
chat_rank = "member"

[[relay]]
system = true
log = true
"#;

    #[test]
    fn parses_sections_and_links() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        assert!(!config.stdio.read);
        assert_eq!(config.stdio.rank, Rank::Owner);
        assert_eq!(
            config.bnet.default.gateway.as_deref(),
            Some("127.0.0.1:6200")
        );
        assert_eq!(config.bnet.realms.len(), 2);
        assert_eq!(
            config.discord.default.realm.gateway.as_deref(),
            Some("127.0.0.1:7000")
        );
        assert_eq!(config.discord.default.channel.rank_default, Some(Rank::Member));
        assert_eq!(config.discord.realms["discord"].channels.len(), 2);

        assert_eq!(config.relay.len(), 2);
        let first = &config.relay[0];
        assert_eq!(first.sources, Some(vec!["europe".to_string()]));
        assert_eq!(first.targets, Some(vec!["discord/100".to_string()]));
        assert!(first.chat && !first.joins);
        assert_eq!(first.chat_rank, Rank::Member);
        assert_eq!(first.join_rank, Rank::Guest);

        let second = &config.relay[1];
        assert!(second.sources.is_none() && second.targets.is_none());
        assert!(second.system && second.log);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(config.stdio.read);
        assert!(config.relay.is_empty());
    }

    #[test]
    fn unknown_rank_is_a_parse_error() {
        let err = toml::from_str::<Config>("[[relay]]\nchat_rank = \"admin\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn load_config_missing_file_falls_back() {
        let config = load_config(Some("/nonexistent/realmlink.toml")).unwrap();
        assert!(config.bnet.realms.is_empty());
    }

    #[test]
    fn load_config_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.relay.len(), 2);
    }

    #[test]
    fn load_config_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[[relay]\nbroken").unwrap();

        let err = load_config(file.path().to_str()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
