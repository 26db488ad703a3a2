//! Transport-neutral client connection
//!
//! A session talks to its client through a pair of bounded queues. The
//! transport (a WebSocket handler, or a test) holds the other end and moves
//! frames between the queues and the wire.

use tokio::sync::mpsc;

use crate::runner::ChannelClosed;

/// The session's side of a client connection
///
/// The session is the only writer of outbound frames, so frames are never
/// interleaved.
#[derive(Debug)]
pub struct ClientChannel {
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<String>,
}

/// The transport's side of a client connection
#[derive(Debug)]
pub struct ClientEnd {
    /// Messages received from the client, forwarded to the session
    pub to_session: mpsc::Sender<String>,
    /// Text frames produced by the session, to be sent to the client
    pub from_session: mpsc::Receiver<String>,
}

impl ClientChannel {
    /// Create a connected channel pair with the given queue capacity
    pub fn pair(capacity: usize) -> (ClientChannel, ClientEnd) {
        let (outbound, from_session) = mpsc::channel(capacity);
        let (to_session, inbound) = mpsc::channel(capacity);
        (
            ClientChannel { outbound, inbound },
            ClientEnd {
                to_session,
                from_session,
            },
        )
    }

    /// Send one text frame to the client
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), ChannelClosed> {
        self.outbound
            .send(text.into())
            .await
            .map_err(|_| ChannelClosed)
    }

    /// Receive the next raw message from the client
    ///
    /// Returns `None` once the client side has gone away.
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }

    /// Split into the outbound sender and inbound receiver, for the pump
    pub(crate) fn halves(&mut self) -> (&mpsc::Sender<String>, &mut mpsc::Receiver<String>) {
        (&self.outbound, &mut self.inbound)
    }
}

impl ClientEnd {
    /// Queue a message from the client
    pub async fn send(&self, message: impl Into<String>) -> Result<(), ChannelClosed> {
        self.to_session
            .send(message.into())
            .await
            .map_err(|_| ChannelClosed)
    }

    /// Next frame from the session; `None` once the session has finished
    pub async fn recv(&mut self) -> Option<String> {
        self.from_session.recv().await
    }
}
