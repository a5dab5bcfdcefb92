//! Error types for realm construction and sessions.

/// Errors that can occur while building or running a realm.
#[derive(Debug, thiserror::Error)]
pub enum RealmError {
    /// Network or console I/O failed.
    #[error("realm io error: {0}")]
    Io(#[from] std::io::Error),

    /// A gateway frame could not be encoded or decoded.
    #[error("gateway frame error: {0}")]
    Frame(#[from] serde_json::Error),

    /// A gateway line was too long or the stream failed mid-line.
    #[error("gateway codec error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    /// A required setting is missing after defaults were applied.
    #[error("realm {realm}: missing required setting `{field}`")]
    Config {
        /// Realm the setting belongs to.
        realm: String,
        /// Name of the missing field.
        field: &'static str,
    },

    /// The shared cancellation token fired.
    #[error("realm run cancelled")]
    Cancelled,
}

impl RealmError {
    /// Returns true for the cancellation sentinel.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
