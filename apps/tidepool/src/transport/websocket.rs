use super::{ChannelClosed, ChannelController, ChannelEvents, Command, Payload};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, trace};

/// How long an orderly close waits for the remote side before giving up.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
#[error("websocket open failed: {0}")]
pub struct ChannelOpenError(#[from] tokio_tungstenite::tungstenite::Error);

/// A duplex text channel over a WebSocket connection.
///
/// `connect` resolves only once the transport-level connection is confirmed
/// open; everything after that is frames in, frames out. A spawned pump task
/// owns the socket and feeds both halves through in-process queues, so sends
/// never block the caller and inbound frames are delivered in arrival order.
#[derive(Debug)]
pub struct WebSocketChannel {
    controller: ChannelController,
    events: ChannelEvents,
    pump: Option<tokio::task::JoinHandle<()>>,
}

impl WebSocketChannel {
    /// Open a WebSocket to `url`. Fails if the connection never reaches the
    /// open state.
    pub async fn connect(url: &str) -> Result<Self, ChannelOpenError> {
        let (stream, _) = connect_async(url).await?;
        debug!(target: "tidepool::transport", url = %url, "websocket open");

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        let (payload_tx, payload_rx) = mpsc::unbounded_channel::<Payload>();
        let pump = tokio::spawn(run_pump(stream, cmd_rx, payload_tx));

        Ok(Self {
            controller: ChannelController::new(cmd_tx),
            events: ChannelEvents::new(payload_rx),
            pump: Some(pump),
        })
    }

    /// Assemble a channel from pre-wired halves. Used by tests that script
    /// the remote side without a socket.
    #[cfg(test)]
    pub(crate) fn from_parts(controller: ChannelController, events: ChannelEvents) -> Self {
        Self {
            controller,
            events,
            pump: None,
        }
    }

    /// A cloneable write half, usable from other tasks.
    pub fn controller(&self) -> ChannelController {
        self.controller.clone()
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), ChannelClosed> {
        self.controller.send_text(text)
    }

    /// Next inbound payload, or `None` once the transport has closed.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.events.recv().await
    }

    pub(crate) fn split_mut(&mut self) -> (&ChannelController, &mut ChannelEvents) {
        (&self.controller, &mut self.events)
    }

    /// Actively close the transport and wait (bounded) for the pump to wind
    /// down so the close frame actually reaches the wire.
    pub async fn close(mut self) {
        self.controller.close();
        if let Some(mut pump) = self.pump.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut pump).await.is_err() {
                pump.abort();
            }
        }
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Pump frames between the socket and the in-process queues until either
/// side goes away. Dropping the payload sender is what surfaces the close
/// event to the reader.
async fn run_pump(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    payloads: mpsc::UnboundedSender<Payload>,
) {
    let (mut sink, mut source) = stream.split();
    let mut closing = false;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(text)) => {
                    if closing {
                        continue;
                    }
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Command::Close) => {
                    if !closing {
                        closing = true;
                        // Initiate the close handshake; keep reading until
                        // the remote acknowledges or the stream ends.
                        let _ = sink.send(Message::Close(None)).await;
                    }
                }
                None => break,
            },
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if payloads.send(Payload::Text(text)).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    if payloads.send(Payload::Binary(bytes)).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    trace!(target: "tidepool::transport", ?frame, "close frame received");
                    break;
                }
                Some(Ok(_)) => {} // ping/pong handled by tungstenite
                Some(Err(_)) | None => break,
            },
        }
    }
}
