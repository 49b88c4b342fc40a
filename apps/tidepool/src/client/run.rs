//! Batch-run sink: streams execution output to stdout until the channel
//! closes, with Ctrl-C cancelling the run.

use crate::session::SessionHandle;
use std::io::{self, Write};
use tracing::debug;

/// How a run ended. The wire cannot distinguish a user-requested stop from
/// the remote side finishing on its own; the caller-side flag does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    Stopped,
}

/// Pump execution output to stdout. The first Ctrl-C closes the channel;
/// the resulting close event ends the stream like any other.
pub async fn stream_output(mut handle: SessionHandle) -> io::Result<RunOutcome> {
    let controller = handle.controller();
    let mut stdout = io::stdout();
    let mut stop_requested = false;

    loop {
        tokio::select! {
            payload = handle.recv() => match payload {
                Some(payload) => {
                    stdout.write_all(&payload.into_bytes())?;
                    stdout.flush()?;
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if !stop_requested => {
                signal?;
                debug!(target: "tidepool::client", "stop requested, closing channel");
                stop_requested = true;
                controller.close();
            }
        }
    }

    Ok(if stop_requested {
        RunOutcome::Stopped
    } else {
        RunOutcome::Finished
    })
}
