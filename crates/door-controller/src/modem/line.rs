//! `ModemLine` - the command side of the modem.
//!
//! Owns the write half of the serial device and the line state. Inbound text
//! is handled by [`super::reader`]; the only coupling between the two is the
//! shared `acknowledged` signal, fired by the reader on every `OK`.

use super::dial::DialSequence;
use crate::errors::DcError;
use crate::signal::AsyncSignal;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

/// Line terminator for every command.
const CRLF: &[u8] = b"\r\n";

/// Modem line state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemState {
    /// Device opened, initialization sequence not sent yet.
    Closed,
    /// On-hook, waiting for a ring.
    Idle,
    /// Off-hook, dialing the trigger sequence.
    Triggering,
    /// A write failed; the line is unusable.
    Failed,
}

impl fmt::Display for ModemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModemState::Closed => "closed",
            ModemState::Idle => "idle",
            ModemState::Triggering => "triggering",
            ModemState::Failed => "failed",
        })
    }
}

/// Commands sent to the modem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModemCommand {
    /// `+++`: escape to command mode.
    Escape,
    /// `ATH0`: go on-hook in case the line was left off-hook.
    OnHook,
    /// `ATX0`: dial without waiting for a dial tone.
    DisableDialToneCheck,
    /// `ATDT<sequence>;`: pick up, tone-dial the sequence, stay in command mode.
    Dial(DialSequence),
    /// `ATH`: hang up.
    HangUp,
}

impl ModemCommand {
    /// The command text, without the line terminator.
    #[must_use]
    pub fn to_wire(&self) -> String {
        match self {
            ModemCommand::Escape => "+++".to_string(),
            ModemCommand::OnHook => "ATH0".to_string(),
            ModemCommand::DisableDialToneCheck => "ATX0".to_string(),
            ModemCommand::Dial(sequence) => format!("ATDT{sequence};"),
            ModemCommand::HangUp => "ATH".to_string(),
        }
    }
}

/// Command side of the modem line.
pub struct ModemLine {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    state: ModemState,
    acknowledged: Arc<AsyncSignal>,
}

impl fmt::Debug for ModemLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModemLine")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ModemLine {
    /// Wrap the write half of an opened device. The line starts `Closed`.
    pub fn new<W>(writer: W, acknowledged: Arc<AsyncSignal>) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: Box::new(writer),
            state: ModemState::Closed,
            acknowledged,
        }
    }

    /// Current line state.
    #[must_use]
    pub fn state(&self) -> ModemState {
        self.state
    }

    /// Signal fired whenever the modem answers `OK`.
    #[must_use]
    pub fn acknowledged(&self) -> &Arc<AsyncSignal> {
        &self.acknowledged
    }

    /// Send the initialization sequence: escape, on-hook, no dial-tone check.
    pub async fn initialize(&mut self) -> Result<(), DcError> {
        self.require(ModemState::Closed, "initialize")?;

        debug!(target: "dc.modem", "Sending initialization sequence");
        self.send(&ModemCommand::Escape).await?;
        self.send(&ModemCommand::OnHook).await?;
        self.send(&ModemCommand::DisableDialToneCheck).await?;

        self.state = ModemState::Idle;
        info!(target: "dc.modem", "Modem ready");
        Ok(())
    }

    /// Answer the ringing line and pulse `sequence`.
    pub async fn trigger_dial(&mut self, sequence: &DialSequence) -> Result<(), DcError> {
        self.require(ModemState::Idle, "dial")?;

        debug!(target: "dc.modem", sequence = %sequence, "Dialing trigger sequence");
        self.send(&ModemCommand::Dial(sequence.clone())).await?;
        self.state = ModemState::Triggering;
        Ok(())
    }

    /// Go back on-hook after the dial was acknowledged.
    pub async fn hangup(&mut self) -> Result<(), DcError> {
        self.require(ModemState::Triggering, "hang up")?;

        debug!(target: "dc.modem", "Hanging up");
        self.send(&ModemCommand::HangUp).await?;
        self.state = ModemState::Idle;
        Ok(())
    }

    fn require(&self, expected: ModemState, operation: &'static str) -> Result<(), DcError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DcError::InvalidModemState {
                operation,
                state: self.state,
            })
        }
    }

    async fn send(&mut self, command: &ModemCommand) -> Result<(), DcError> {
        let mut line = command.to_wire().into_bytes();
        line.extend_from_slice(CRLF);

        let result = async {
            self.writer.write_all(&line).await?;
            self.writer.flush().await
        }
        .await;

        result.map_err(|e| {
            error!(target: "dc.modem", error = %e, "Failed to write modem command");
            self.state = ModemState::Failed;
            DcError::Device(format!("write failed: {e}"))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};

    fn line_with_device() -> (ModemLine, DuplexStream) {
        let (host, device) = duplex(1024);
        (ModemLine::new(host, Arc::new(AsyncSignal::new())), device)
    }

    async fn read_available(device: &mut DuplexStream) -> String {
        let mut buf = vec![0u8; 1024];
        let n = device.read(&mut buf).await.unwrap();
        String::from_utf8(buf.get(..n).unwrap().to_vec()).unwrap()
    }

    fn sequence(s: &str) -> DialSequence {
        s.parse().unwrap()
    }

    #[test]
    fn test_command_wire_format() {
        assert_eq!(ModemCommand::Escape.to_wire(), "+++");
        assert_eq!(ModemCommand::OnHook.to_wire(), "ATH0");
        assert_eq!(ModemCommand::DisableDialToneCheck.to_wire(), "ATX0");
        assert_eq!(ModemCommand::Dial(sequence("9,")).to_wire(), "ATDT9,;");
        assert_eq!(ModemCommand::HangUp.to_wire(), "ATH");
    }

    #[tokio::test]
    async fn test_initialize_sends_sequence_in_order() {
        let (mut line, mut device) = line_with_device();
        assert_eq!(line.state(), ModemState::Closed);

        line.initialize().await.unwrap();

        assert_eq!(read_available(&mut device).await, "+++\r\nATH0\r\nATX0\r\n");
        assert_eq!(line.state(), ModemState::Idle);
    }

    #[tokio::test]
    async fn test_dial_then_hangup_cycle() {
        let (mut line, mut device) = line_with_device();
        line.initialize().await.unwrap();
        read_available(&mut device).await;

        line.trigger_dial(&sequence("9,9,")).await.unwrap();
        assert_eq!(line.state(), ModemState::Triggering);
        assert_eq!(read_available(&mut device).await, "ATDT9,9,;\r\n");

        line.hangup().await.unwrap();
        assert_eq!(line.state(), ModemState::Idle);
        assert_eq!(read_available(&mut device).await, "ATH\r\n");
    }

    #[tokio::test]
    async fn test_hangup_without_dial_is_rejected() {
        let (mut line, _device) = line_with_device();
        line.initialize().await.unwrap();

        let result = line.hangup().await;
        assert!(matches!(
            result,
            Err(DcError::InvalidModemState {
                state: ModemState::Idle,
                ..
            })
        ));
        assert_eq!(line.state(), ModemState::Idle);
    }

    #[tokio::test]
    async fn test_dial_before_initialize_is_rejected() {
        let (mut line, _device) = line_with_device();

        let result = line.trigger_dial(&sequence("9")).await;
        assert!(matches!(
            result,
            Err(DcError::InvalidModemState {
                state: ModemState::Closed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_write_failure_moves_line_to_failed() {
        let (mut line, device) = line_with_device();
        drop(device);

        let result = line.initialize().await;
        assert!(matches!(result, Err(DcError::Device(_))));
        assert_eq!(line.state(), ModemState::Failed);

        // Nothing is accepted once failed.
        assert!(line.trigger_dial(&sequence("9")).await.is_err());
    }
}
