//! Inbound side of the modem.
//!
//! A single task reads the device line by line. `OK` fires the shared
//! acknowledgement signal directly so a waiting admission cycle resumes
//! without a round trip through the service loop. `RING` and end-of-stream
//! are forwarded as [`ModemEvent`]s.

use crate::errors::DcError;
use crate::signal::AsyncSignal;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Longest line kept from the device. Anything longer is discarded up to
/// the next newline.
pub const MAX_LINE_LEN: usize = 1024;

/// Classification of one line of modem output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Incoming call.
    Ring,
    /// Acknowledgement of the last command.
    Ok,
    /// Blank line (modems pad responses with CRLF).
    Blank,
    /// Anything else: echoes, `NO CARRIER`, `ERROR`, ...
    Other(String),
}

/// Events delivered to the service loop.
#[derive(Debug)]
pub enum ModemEvent {
    /// The phone is ringing.
    Ring,
    /// The device reached end-of-stream.
    Closed,
    /// Reading from the device failed.
    Failed(DcError),
}

/// Classify a raw line of modem output. Surrounding whitespace is ignored.
#[must_use]
pub fn classify_line(raw: &str) -> LineEvent {
    match raw.trim() {
        "RING" => LineEvent::Ring,
        "OK" => LineEvent::Ok,
        "" => LineEvent::Blank,
        other => LineEvent::Other(other.to_string()),
    }
}

/// Spawn the reader task.
///
/// The task ends on end-of-stream, on a read error, on cancellation, or when
/// the event receiver is dropped.
pub fn spawn_line_reader<R>(
    reader: R,
    acknowledged: Arc<AsyncSignal>,
    events: mpsc::Sender<ModemEvent>,
    cancel_token: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(64);
        // Inside an overlong line: drop fragments until its newline.
        let mut discarding = false;

        info!(target: "dc.modem", "Modem reader started");

        loop {
            buf.clear();
            let mut line_reader = (&mut reader).take(MAX_LINE_LEN as u64);
            let read = tokio::select! {
                () = cancel_token.cancelled() => {
                    debug!(target: "dc.modem", "Modem reader cancelled");
                    break;
                }
                read = line_reader.read_until(b'\n', &mut buf) => read,
            };

            let event = match read {
                Ok(0) => {
                    warn!(target: "dc.modem", "Modem device closed");
                    let _ = events.send(ModemEvent::Closed).await;
                    break;
                }
                Ok(_) if !buf.ends_with(b"\n") && buf.len() >= MAX_LINE_LEN => {
                    if !discarding {
                        warn!(target: "dc.modem", limit = MAX_LINE_LEN, "Overlong modem line discarded");
                    }
                    discarding = true;
                    continue;
                }
                Ok(_) if discarding => {
                    discarding = false;
                    continue;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    trace!(target: "dc.modem.tty", line = %line.trim(), "Modem output");
                    classify_line(&line)
                }
                Err(e) => {
                    error!(target: "dc.modem", error = %e, "Modem read failed");
                    let _ = events
                        .send(ModemEvent::Failed(DcError::Device(format!("read failed: {e}"))))
                        .await;
                    break;
                }
            };

            match event {
                LineEvent::Ok => {
                    let released = acknowledged.trigger();
                    debug!(target: "dc.modem", waiters = released, "Modem acknowledged");
                }
                LineEvent::Ring => {
                    debug!(target: "dc.modem", "Ring detected");
                    if events.send(ModemEvent::Ring).await.is_err() {
                        debug!(target: "dc.modem", "Event receiver dropped, stopping reader");
                        break;
                    }
                }
                LineEvent::Blank | LineEvent::Other(_) => {}
            }
        }

        info!(target: "dc.modem", "Modem reader stopped");
    })
}
