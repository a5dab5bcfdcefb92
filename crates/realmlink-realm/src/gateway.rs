//! Newline-delimited JSON transport to an external chat gateway.
//!
//! Chat-service and chat-bridge realms do not speak their upstream protocols
//! themselves. They connect to a gateway process over TCP and exchange one
//! JSON object per line, tagged by `type`. The gateway reports what it
//! observes upstream ([`Inbound`]) and accepts what the realm wants posted
//! ([`Outbound`]).
//!
//! Outbound frames produced by `relay` calls on other tasks go through an
//! [`Outbox`], which the session loop drains in between reads.

use std::sync::Mutex;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;

use crate::error::RealmError;

/// Longest accepted line, in bytes.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Frames sent by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// The session entered a channel.
    Channel { name: String },
    /// A user is present in (or entered) a channel.
    Join {
        name: String,
        #[serde(default)]
        stat: String,
        #[serde(default)]
        flags: u32,
        #[serde(default)]
        roles: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_id: Option<String>,
    },
    /// A user left a channel.
    Leave {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_id: Option<String>,
    },
    /// Public chat.
    Chat {
        name: String,
        text: String,
        #[serde(default)]
        roles: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_id: Option<String>,
    },
    /// Chat directed at the session's own user.
    Whisper { name: String, text: String },
    /// Informational notice.
    Info { text: String },
    /// Error notice; informational, the session continues.
    Error { text: String },
}

/// Frames sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// First frame of every session.
    Login {
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
    /// Post a line, optionally into a specific channel.
    Say {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_id: Option<String>,
    },
}

/// Queue of outbound frames for the current session, if any.
///
/// Frames queued while no session is open are dropped.
#[derive(Debug, Default)]
pub struct Outbox {
    tx: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a frame. Returns false if no session is open.
    pub fn send(&self, frame: Outbound) -> bool {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        match tx.as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    fn open(&self) -> mpsc::UnboundedReceiver<Outbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.tx.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        rx
    }

    fn close(&self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

/// An open connection to a gateway.
pub struct GatewaySession {
    reader: FramedRead<OwnedReadHalf, LinesCodec>,
    writer: FramedWrite<OwnedWriteHalf, LinesCodec>,
}

impl GatewaySession {
    /// Connects to the gateway at `addr`.
    ///
    /// # Errors
    ///
    /// Returns `RealmError::Io` if the connection cannot be established.
    pub async fn connect(addr: &str) -> Result<Self, RealmError> {
        let stream = TcpStream::connect(addr).await?;
        tracing::debug!(addr, "connected to gateway");
        Ok(Self::from_stream(stream))
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            reader: FramedRead::new(read, LinesCodec::new_with_max_length(MAX_FRAME_LEN)),
            writer: FramedWrite::new(write, LinesCodec::new()),
        }
    }

    /// Writes one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be encoded or written.
    pub async fn send(&mut self, frame: &Outbound) -> Result<(), RealmError> {
        let line = serde_json::to_string(frame)?;
        self.writer.send(line).await?;
        Ok(())
    }

    /// Reads frames until the gateway closes the stream or `cancel` fires.
    ///
    /// Every decoded frame is handed to `on_frame`; frames queued on
    /// `outbox` meanwhile are written in order. The outbox is closed when
    /// this returns.
    ///
    /// Returns `Ok(())` on a clean close and `RealmError::Cancelled` on
    /// cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, an over-long line, or a frame that
    /// is not valid JSON for [`Inbound`].
    pub async fn serve<F>(
        mut self,
        outbox: &Outbox,
        cancel: &CancellationToken,
        mut on_frame: F,
    ) -> Result<(), RealmError>
    where
        F: FnMut(Inbound),
    {
        let mut queued = outbox.open();

        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Err(RealmError::Cancelled),
                line = self.reader.next() => match line {
                    None => break Ok(()),
                    Some(Err(e)) => break Err(e.into()),
                    Some(Ok(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Inbound>(&line) {
                            Ok(frame) => on_frame(frame),
                            Err(e) => break Err(e.into()),
                        }
                    }
                },
                Some(frame) = queued.recv() => {
                    if let Err(e) = self.send(&frame).await {
                        break Err(e);
                    }
                }
            }
        };

        outbox.close();
        result
    }
}
