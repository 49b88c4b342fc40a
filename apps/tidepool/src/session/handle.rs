use crate::transport::{ChannelClosed, ChannelController, Payload, WebSocketChannel};
use tracing::debug;

/// The channel once past negotiation, in pass-through mode.
///
/// All data from here on is opaque payload for whichever sink owns the
/// handle; no control messages are expected or parsed.
#[derive(Debug)]
pub struct SessionHandle {
    channel: WebSocketChannel,
}

impl SessionHandle {
    pub(crate) fn new(channel: WebSocketChannel) -> Self {
        Self { channel }
    }

    /// A cloneable write half, usable from other tasks while the owner of
    /// the handle sits in `recv`.
    pub fn controller(&self) -> ChannelController {
        self.channel.controller()
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), ChannelClosed> {
        self.channel.send_text(text)
    }

    /// Next inbound payload, or `None` once the channel has closed (by the
    /// remote side, by cancellation, or by a previous `close`).
    pub async fn recv(&mut self) -> Option<Payload> {
        self.channel.recv().await
    }

    /// Actively close the channel.
    pub async fn close(self) {
        self.channel.close().await;
    }
}

/// An owned "current channel" cell for one UI slot.
///
/// A channel is exclusively owned by one sink at a time; attaching a new
/// session through the slot closes whatever was there before, so two sinks
/// can never race on one logical stream.
#[derive(Debug, Default)]
pub struct ChannelSlot {
    current: Option<SessionHandle>,
}

impl ChannelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `next`, closing the previously attached channel first.
    pub async fn replace(&mut self, next: SessionHandle) -> &mut SessionHandle {
        if let Some(previous) = self.current.take() {
            debug!(target: "tidepool::session", "closing previously attached channel");
            previous.close().await;
        }
        self.current.insert(next)
    }

    /// Detach and close the current channel, if any.
    pub async fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.close().await;
        }
    }

    pub fn current_mut(&mut self) -> Option<&mut SessionHandle> {
        self.current.as_mut()
    }

    /// Detach the current channel without closing it, handing ownership to
    /// the caller.
    pub fn take(&mut self) -> Option<SessionHandle> {
        self.current.take()
    }

    pub fn is_attached(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelController, ChannelEvents, Command};
    use tokio::sync::mpsc;

    fn detached_handle() -> (SessionHandle, mpsc::UnboundedReceiver<Command>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (_payload_tx, payload_rx) = mpsc::unbounded_channel();
        let channel = WebSocketChannel::from_parts(
            ChannelController::new(cmd_tx),
            ChannelEvents::new(payload_rx),
        );
        (SessionHandle::new(channel), cmd_rx)
    }

    #[tokio::test]
    async fn replace_closes_the_previous_channel() {
        let (first, mut first_commands) = detached_handle();
        let (second, mut second_commands) = detached_handle();

        let mut slot = ChannelSlot::new();
        slot.replace(first).await;
        assert!(first_commands.try_recv().is_err());

        slot.replace(second).await;
        assert_eq!(first_commands.try_recv().unwrap(), Command::Close);
        assert!(second_commands.try_recv().is_err());
        assert!(slot.is_attached());
    }

    #[tokio::test]
    async fn clear_closes_and_detaches() {
        let (handle, mut commands) = detached_handle();
        let mut slot = ChannelSlot::new();
        slot.replace(handle).await;

        slot.clear().await;
        assert_eq!(commands.try_recv().unwrap(), Command::Close);
        assert!(!slot.is_attached());

        // Clearing an empty slot is a no-op.
        slot.clear().await;
    }

    #[tokio::test]
    async fn take_detaches_without_closing() {
        let (handle, mut commands) = detached_handle();
        let mut slot = ChannelSlot::new();
        slot.replace(handle).await;

        let detached = slot.take().expect("handle attached");
        assert!(commands.try_recv().is_err());
        assert!(!slot.is_attached());
        detached.close().await;
        assert_eq!(commands.try_recv().unwrap(), Command::Close);
    }
}
