//! Session-establishment handshake.
//!
//! Turns an opened channel plus a [`SessionRequest`] into a live
//! [`SessionHandle`] or a typed failure. The handshake is modeled as an
//! explicit state machine with a pure transition function, so every illegal
//! transition is a failure settlement instead of a silently-ignored branch.
//! `negotiate` returns exactly once; after it has settled, no further channel
//! event can affect the outcome.

use crate::protocol::{ControlMessage, DecodeError};
use crate::session::handle::SessionHandle;
use crate::session::{SessionConfig, SessionKind, SessionRequest};
use crate::transport::{ChannelController, ChannelEvents, WebSocketChannel};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum NegotiationError {
    /// The channel never reached the open state (bad endpoint, refused
    /// connection, TLS failure).
    #[error("failed to open session channel: {0}")]
    TransportOpen(String),
    /// An inbound frame could not be decoded as a control message.
    #[error("malformed control message: {0}")]
    MalformedMessage(#[from] DecodeError),
    /// The gateway reported an explicit error status.
    #[error("session failed: {detail}")]
    Protocol { detail: String },
    /// The channel closed before a terminal status was reached.
    #[error("channel closed before the session was established")]
    PrematureClose,
    /// A well-formed control message arrived in a state where it is an
    /// illegal transition (e.g. a second `ready`).
    #[error("unexpected '{status}' control message during handshake")]
    UnexpectedMessage { status: &'static str },
}

/// Where the handshake currently stands. `AwaitingReady` only occurs for
/// run sessions; terminal sessions start in `AwaitingRunning`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HandshakePhase {
    AwaitingReady,
    AwaitingRunning,
}

impl HandshakePhase {
    fn initial(kind: SessionKind) -> Self {
        match kind {
            SessionKind::Run => HandshakePhase::AwaitingReady,
            SessionKind::Term => HandshakePhase::AwaitingRunning,
        }
    }
}

/// Outcome of feeding one control message into the state machine.
#[derive(Debug)]
enum Step {
    Stay(HandshakePhase),
    SendCode(HandshakePhase),
    Succeed,
    Fail(NegotiationError),
}

fn step(phase: HandshakePhase, message: ControlMessage) -> Step {
    match (phase, message) {
        // Progress updates from the gateway; keep waiting.
        (_, ControlMessage::Starting) | (_, ControlMessage::Uploading) => Step::Stay(phase),
        // The gateway is ready for the code payload.
        (HandshakePhase::AwaitingReady, ControlMessage::Ready) => {
            Step::SendCode(HandshakePhase::AwaitingRunning)
        }
        // The gateway may begin running without asking for code first.
        (_, ControlMessage::Running) => Step::Succeed,
        (_, ControlMessage::Error(detail)) => Step::Fail(NegotiationError::Protocol { detail }),
        (HandshakePhase::AwaitingRunning, ControlMessage::Ready) => {
            Step::Fail(NegotiationError::UnexpectedMessage { status: "ready" })
        }
    }
}

/// Open a channel to the gateway and run the handshake for `request`.
///
/// On success the returned handle is the same channel, now in pass-through
/// mode; no further control parsing happens. On any failure the channel is
/// actively closed before the error is returned.
pub async fn negotiate(
    config: &SessionConfig,
    request: &SessionRequest,
) -> Result<SessionHandle, NegotiationError> {
    let url = config
        .exec_url(request.kind(), request.language())
        .map_err(|err| NegotiationError::TransportOpen(err.to_string()))?;
    debug!(
        target: "tidepool::session",
        kind = request.kind().label(),
        language = request.language(),
        url = %url,
        "opening session channel"
    );
    let mut channel = WebSocketChannel::connect(url.as_str())
        .await
        .map_err(|err| NegotiationError::TransportOpen(err.to_string()))?;

    let (controller, events) = channel.split_mut();
    match drive(controller, events, request).await {
        Ok(()) => {
            debug!(
                target: "tidepool::session",
                kind = request.kind().label(),
                "session established"
            );
            Ok(SessionHandle::new(channel))
        }
        Err(err) => {
            // A failed handshake must not leak an orphaned transport. On a
            // premature close this is a no-op.
            channel.close().await;
            Err(err)
        }
    }
}

/// Consume channel events until the handshake settles. Returns at most once;
/// events are not consumed past the first terminal transition.
async fn drive(
    controller: &ChannelController,
    events: &mut ChannelEvents,
    request: &SessionRequest,
) -> Result<(), NegotiationError> {
    let mut phase = HandshakePhase::initial(request.kind());

    loop {
        let Some(payload) = events.recv().await else {
            return Err(NegotiationError::PrematureClose);
        };
        let text = payload.as_text().ok_or(DecodeError::BinaryFrame)?;
        let message = ControlMessage::decode(text)?;
        trace!(
            target: "tidepool::session",
            status = message.status_label(),
            ?phase,
            "control message"
        );

        match step(phase, message) {
            Step::Stay(next) => phase = next,
            Step::SendCode(next) => {
                let SessionRequest::Run { code, .. } = request else {
                    // Unreachable: AwaitingReady is only entered for runs.
                    return Err(NegotiationError::UnexpectedMessage { status: "ready" });
                };
                controller
                    .send_text(code.clone())
                    .map_err(|_| NegotiationError::PrematureClose)?;
                phase = next;
            }
            Step::Succeed => return Ok(()),
            Step::Fail(err) => return Err(err),
        }
    }
}
