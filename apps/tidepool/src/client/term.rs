//! Interactive terminal sink: raw-mode pass-through between the local
//! terminal and a negotiated session channel.

use crate::session::{ChannelSlot, SessionHandle};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, IsTerminal, Read, Write};
use std::thread;
use tracing::debug;

/// Attach `handle` to the slot and pump it against the local terminal until
/// either side closes. Attaching through the slot closes any previously
/// attached channel first, so only one sink ever owns the stream.
pub async fn attach(slot: &mut ChannelSlot, handle: SessionHandle) -> io::Result<()> {
    let handle = slot.replace(handle).await;
    let interactive = io::stdin().is_terminal() && io::stdout().is_terminal();
    let _raw_guard = RawModeGuard::new(interactive);

    // Keystrokes flow from a blocking reader thread; the channel queues the
    // sends, so the thread never waits on the network.
    let input = handle.controller();
    thread::spawn(move || {
        let mut stdin = io::stdin().lock();
        let mut buf = [0u8; 1024];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if input.send_text(chunk).is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut stdout = io::stdout();
    while let Some(payload) = handle.recv().await {
        stdout.write_all(&payload.into_bytes())?;
        stdout.flush()?;
    }
    debug!(target: "tidepool::client", "terminal channel closed");

    slot.clear().await;
    Ok(())
}

struct RawModeGuard(bool);

impl RawModeGuard {
    fn new(enable: bool) -> Self {
        if enable {
            match enable_raw_mode() {
                Ok(()) => Self(true),
                Err(err) => {
                    eprintln!("⚠️  failed to enable raw mode: {err}");
                    Self(false)
                }
            }
        } else {
            Self(false)
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.0 {
            let _ = disable_raw_mode();
        }
    }
}
