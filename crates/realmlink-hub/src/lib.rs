//! Relay hub: builds realms from configuration, wires the relay graph, and
//! supervises every realm's run loop.
//!
//! ```no_run
//! # async fn demo() -> Result<(), realmlink_hub::HubError> {
//! use realmlink_hub::{load_config, Hub};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = load_config(Some("config.toml"))?;
//! let hub = Hub::from_config(&config)?;
//! hub.run(&CancellationToken::new()).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod hub;
pub mod supervisor;

pub use config::{load_config, Config, ConfigError, LoggingConfig, RelayLink};
pub use error::HubError;
pub use graph::{wire_link, RelayForward};
pub use hub::{Hub, HubBuilder};
pub use supervisor::{run_label, RealmPanic};
