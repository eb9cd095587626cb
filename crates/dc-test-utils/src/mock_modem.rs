//! In-memory modem.
//!
//! [`MockModem::new`] returns the mock plus the host end of an in-memory
//! duplex stream. Hand the host end to the code under test as if it were the
//! serial device; the mock records every command written to it and plays
//! the modem's side of the conversation.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{
    duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, WriteHalf,
};
use tokio::task::JoinHandle;

const BUFFER_SIZE: usize = 4096;

/// Mock modem attached to one end of a duplex stream.
#[derive(Debug)]
pub struct MockModem {
    commands: Arc<Mutex<Vec<String>>>,
    writer: Arc<tokio::sync::Mutex<WriteHalf<DuplexStream>>>,
    task: JoinHandle<()>,
}

impl MockModem {
    /// A modem that answers `OK` to every command when `auto_ack` is set,
    /// and stays silent otherwise (use [`MockModem::ack`]).
    #[must_use]
    pub fn new(auto_ack: bool) -> (Self, DuplexStream) {
        let (host, device) = duplex(BUFFER_SIZE);
        let (device_reader, device_writer) = split(device);

        let commands = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::new(tokio::sync::Mutex::new(device_writer));

        let task = {
            let commands = Arc::clone(&commands);
            let writer = Arc::clone(&writer);
            tokio::spawn(async move {
                let mut lines = BufReader::new(device_reader).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let command = line.trim().to_string();
                    if command.is_empty() {
                        continue;
                    }
                    commands.lock().unwrap().push(command);
                    if auto_ack {
                        let mut writer = writer.lock().await;
                        if writer.write_all(b"\r\nOK\r\n").await.is_err() {
                            break;
                        }
                        let _ = writer.flush().await;
                    }
                }
            })
        };

        (
            Self {
                commands,
                writer,
                task,
            },
            host,
        )
    }

    /// Shorthand for `MockModem::new(true)`.
    #[must_use]
    pub fn auto_ack() -> (Self, DuplexStream) {
        Self::new(true)
    }

    /// Commands received so far, trimmed, without blank lines.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Wait until at least `count` commands arrived. Panics after `timeout`.
    pub async fn wait_for_commands(&self, count: usize, timeout: Duration) -> Vec<String> {
        tokio::time::timeout(timeout, async {
            loop {
                let commands = self.commands();
                if commands.len() >= count {
                    return commands;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {count} commands, got {:?}", self.commands()))
    }

    /// Send `RING`.
    pub async fn ring(&self) {
        self.send_line("RING").await;
    }

    /// Send `OK`.
    pub async fn ack(&self) {
        self.send_line("OK").await;
    }

    /// Send an arbitrary line.
    pub async fn send_line(&self, line: &str) {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(format!("\r\n{line}\r\n").as_bytes())
            .await
            .expect("host end dropped");
        writer.flush().await.expect("host end dropped");
    }

    /// Close the device side; the host sees end-of-stream.
    pub async fn hang_up_device(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

impl Drop for MockModem {
    fn drop(&mut self) {
        self.task.abort();
    }
}
