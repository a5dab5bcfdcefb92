//! The closed event taxonomy published on realm emitters.

use std::sync::Arc;

use crate::User;

/// A chat line together with the user who said it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Author of the message.
    pub user: User,
    /// Message text.
    pub content: String,
}

/// A realm-internal failure surfaced as an event rather than a return value.
///
/// `src` labels where the failure happened, e.g. `Run[realm:main]`.
#[derive(Debug, Clone)]
pub struct AsyncError {
    /// Label of the operation that failed.
    pub src: String,
    /// The underlying failure.
    pub err: Arc<dyn std::error::Error + Send + Sync>,
}

impl AsyncError {
    /// Wraps an error with a source label.
    pub fn new(src: impl Into<String>, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            src: src.into(),
            err: Arc::new(err),
        }
    }
}

impl std::fmt::Display for AsyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.src, self.err)
    }
}

/// Events published by realms.
///
/// Events are immutable once fired; handlers receive them by reference.
#[derive(Debug, Clone)]
pub enum Event {
    /// The realm established its session.
    Connected,
    /// The realm lost or closed its session.
    Disconnected,
    /// The realm entered or changed a named channel.
    Channel {
        /// Channel name.
        name: String,
    },
    /// Informational text from the realm itself.
    SystemMessage {
        /// Message text.
        content: String,
    },
    /// A user entered the realm's channel.
    Join(User),
    /// A user left the realm's channel.
    Leave(User),
    /// Public chat.
    Chat(Message),
    /// Directed chat.
    PrivateChat(Message),
    /// A realm-internal failure.
    AsyncError(AsyncError),
}

/// Discriminant of [`Event`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Connected,
    Disconnected,
    Channel,
    SystemMessage,
    Join,
    Leave,
    Chat,
    PrivateChat,
    AsyncError,
}

impl Event {
    /// Returns the discriminant of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected => EventKind::Disconnected,
            Self::Channel { .. } => EventKind::Channel,
            Self::SystemMessage { .. } => EventKind::SystemMessage,
            Self::Join(_) => EventKind::Join,
            Self::Leave(_) => EventKind::Leave,
            Self::Chat(_) => EventKind::Chat,
            Self::PrivateChat(_) => EventKind::PrivateChat,
            Self::AsyncError(_) => EventKind::AsyncError,
        }
    }

    /// Returns the user carried by membership and chat events.
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Join(user) | Self::Leave(user) => Some(user),
            Self::Chat(msg) | Self::PrivateChat(msg) => Some(&msg.user),
            _ => None,
        }
    }
}

impl EventKind {
    /// Returns a stable label for logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Channel => "channel",
            Self::SystemMessage => "system_message",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Chat => "chat",
            Self::PrivateChat => "private_chat",
            Self::AsyncError => "async_error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rank;

    #[test]
    fn kind_matches_variant() {
        let user = User::new("bob", Rank::Member);
        assert_eq!(Event::Connected.kind(), EventKind::Connected);
        assert_eq!(Event::Join(user.clone()).kind(), EventKind::Join);
        assert_eq!(
            Event::PrivateChat(Message {
                user,
                content: "hi".into()
            })
            .kind(),
            EventKind::PrivateChat
        );
    }

    #[test]
    fn user_only_on_membership_and_chat() {
        let user = User::new("bob", Rank::Operator);
        let chat = Event::Chat(Message {
            user: user.clone(),
            content: "hello".into(),
        });
        assert_eq!(chat.user().map(|u| u.rank), Some(Rank::Operator));
        assert_eq!(Event::Leave(user).user().map(|u| u.name.as_str()), Some("bob"));
        assert!(Event::SystemMessage {
            content: "motd".into()
        }
        .user()
        .is_none());
        assert!(Event::Disconnected.user().is_none());
    }

    #[test]
    fn async_error_display_includes_source() {
        let err = AsyncError::new(
            "Run[realm:main]",
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
        );
        assert_eq!(err.to_string(), "Run[realm:main]: reset");
    }
}
