use thiserror::Error;
use tokio::sync::mpsc;

pub mod websocket;

pub use websocket::{ChannelOpenError, WebSocketChannel};

/// One inbound frame from the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Text(text) => text.into_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }
}

/// Instruction queued for the channel's pump task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Send(String),
    Close,
}

#[derive(Debug, Error)]
#[error("channel is closed")]
pub struct ChannelClosed;

/// Cloneable write half of a channel. Sends are queued; a send only fails
/// once the transport has shut down.
#[derive(Debug, Clone)]
pub struct ChannelController {
    tx: mpsc::UnboundedSender<Command>,
}

impl ChannelController {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { tx }
    }

    /// Queue one outbound text message.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), ChannelClosed> {
        self.tx
            .send(Command::Send(text.into()))
            .map_err(|_| ChannelClosed)
    }

    /// Request an orderly close of the transport. Safe to call more than
    /// once, and after the transport has already gone away.
    pub fn close(&self) {
        let _ = self.tx.send(Command::Close);
    }
}

/// Read half of a channel. Events arrive strictly in wire order.
#[derive(Debug)]
pub struct ChannelEvents {
    rx: mpsc::UnboundedReceiver<Payload>,
}

impl ChannelEvents {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Payload>) -> Self {
        Self { rx }
    }

    /// Next inbound payload, or `None` once the transport has closed.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn controller_send_fails_after_pump_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = ChannelController::new(tx);
        controller.send_text("still alive").unwrap();
        drop(rx);
        assert!(controller.send_text("too late").is_err());
    }

    #[tokio::test]
    async fn events_end_when_sender_drops() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut events = ChannelEvents::new(rx);
        tx.send(Payload::Text("one".into())).unwrap();
        drop(tx);
        assert_eq!(events.recv().await, Some(Payload::Text("one".into())));
        assert_eq!(events.recv().await, None);
    }
}
