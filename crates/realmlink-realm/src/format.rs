//! Text rendering of relayed events.

use realmlink_types::Event;

/// Renders a relayed event as one line attributed to `source`.
///
/// Returns `None` for events that are never shown to users.
pub fn format_relay(event: &Event, source: &str) -> Option<String> {
    let line = match event {
        Event::Connected => format!("[{source}] *** connected"),
        Event::Disconnected => format!("[{source}] *** disconnected"),
        Event::Channel { name } => format!("[{source}] *** joined channel {name}"),
        Event::SystemMessage { content } => format!("[{source}] {content}"),
        Event::Join(user) => format!("[{source}] *** {} has joined", user.name),
        Event::Leave(user) => format!("[{source}] *** {} has left", user.name),
        Event::Chat(msg) => format!("[{source}] <{}> {}", msg.user.name, msg.content),
        Event::PrivateChat(msg) => {
            format!("[{source}] <{}> (whisper) {}", msg.user.name, msg.content)
        }
        Event::AsyncError(_) => return None,
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use realmlink_types::{AsyncError, Message, Rank, User};

    fn msg(content: &str) -> Message {
        Message {
            user: User::new("Grubby", Rank::Member),
            content: content.to_string(),
        }
    }

    #[test]
    fn chat_lines_carry_source_and_author() {
        assert_eq!(
            format_relay(&Event::Chat(msg("gg")), "europe").as_deref(),
            Some("[europe] <Grubby> gg")
        );
        assert_eq!(
            format_relay(&Event::PrivateChat(msg("psst")), "europe").as_deref(),
            Some("[europe] <Grubby> (whisper) psst")
        );
    }

    #[test]
    fn membership_and_lifecycle_notices() {
        let user = User::new("Moon", Rank::Guest);
        assert_eq!(
            format_relay(&Event::Join(user.clone()), "asia").as_deref(),
            Some("[asia] *** Moon has joined")
        );
        assert_eq!(
            format_relay(&Event::Leave(user), "asia").as_deref(),
            Some("[asia] *** Moon has left")
        );
        assert_eq!(
            format_relay(&Event::Connected, "STDIO").as_deref(),
            Some("[STDIO] *** connected")
        );
    }

    #[test]
    fn async_errors_are_not_rendered() {
        let err = AsyncError::new("x", std::io::Error::other("boom"));
        assert!(format_relay(&Event::AsyncError(err), "asia").is_none());
    }
}
