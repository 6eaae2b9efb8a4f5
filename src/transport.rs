//! Framed command transport
//!
//! Turns a [`ByteChannel`] into request/acknowledge/data exchanges.
//!
//! Wire protocol:
//! - A command is a single printable ASCII code byte, optionally followed by a
//!   parameter string.
//! - Without a parameter: write the code, then (if a response is wanted) read until
//!   ETX (`0x03`).
//! - With a parameter: write the code, read until ACK (`0x06`), write the parameter,
//!   then (if a response is wanted) read until ETX.
//! - Before every command the receive buffer is purged several times, then the
//!   transmit buffer once, so that bytes left over from an exchange that never
//!   terminated cannot be mistaken for the next response.
//!
//! The channel is shared between the foreground caller and the shake loop. Every
//! exchange runs under a single lock acquisition ([`FramedTransport::lock`]), and a
//! caller that needs several commands to run back to back (a full plate read)
//! keeps the same [`Exchange`] for the whole sequence.

use crate::adapters::{ByteChannel, PurgeBuffer};
use crate::config::ProtocolSettings;
use crate::error::{escape, AppResult, DaqError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::debug;

/// Acknowledge: the device is ready for the parameter.
pub const ACK: u8 = 0x06;
/// End of text: the response is complete.
pub const ETX: u8 = 0x03;
/// Response to a measurement trigger that was accepted.
pub const TRIGGER_ACK: &[u8] = b"\x060000\x03";

/// A single-character command with an optional parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    code: u8,
    parameter: Option<String>,
}

impl Command {
    /// Bare command code.
    pub fn new(code: u8) -> Self {
        Self {
            code,
            parameter: None,
        }
    }

    /// Command code followed by a parameter string once acknowledged.
    pub fn with_parameter(code: u8, parameter: impl Into<String>) -> Self {
        Self {
            code,
            parameter: Some(parameter.into()),
        }
    }

    /// Single command byte.
    pub fn code(&self) -> u8 {
        self.code
    }

    /// Parameter sent after the ACK, if any.
    pub fn parameter(&self) -> Option<&str> {
        self.parameter.as_deref()
    }
}

/// Timing knobs of the transport, taken from [`ProtocolSettings`].
#[derive(Debug, Clone)]
pub struct TransportTiming {
    /// Budget for an ordinary terminator read
    pub timeout: Duration,
    /// Receive purges before each command
    pub rx_purge_count: u32,
    /// Pause between empty single-byte reads
    pub poll_interval: Duration,
}

impl From<&ProtocolSettings> for TransportTiming {
    fn from(settings: &ProtocolSettings) -> Self {
        Self {
            timeout: settings.timeout,
            rx_purge_count: settings.rx_purge_count,
            poll_interval: settings.poll_interval,
        }
    }
}

impl Default for TransportTiming {
    fn default() -> Self {
        Self::from(&ProtocolSettings::default())
    }
}

/// Cloneable handle to the shared channel.
#[derive(Clone)]
pub struct FramedTransport {
    channel: Arc<Mutex<Box<dyn ByteChannel>>>,
    timing: TransportTiming,
}

impl FramedTransport {
    /// Wrap `channel` for shared use.
    pub fn new(channel: impl ByteChannel + 'static, timing: TransportTiming) -> Self {
        let channel: Box<dyn ByteChannel> = Box::new(channel);
        Self {
            channel: Arc::new(Mutex::new(channel)),
            timing,
        }
    }

    /// Take exclusive use of the channel until the returned guard is dropped.
    pub async fn lock(&self) -> Exchange<'_> {
        Exchange {
            channel: self.channel.lock().await,
            timing: &self.timing,
        }
    }

    /// Run one command as its own exchange.
    pub async fn send(
        &self,
        command: &Command,
        expect_response: bool,
    ) -> AppResult<Option<Vec<u8>>> {
        self.lock().await.send(command, expect_response).await
    }

    /// Run one command and return its ETX-terminated response.
    pub async fn query(&self, command: &Command) -> AppResult<Vec<u8>> {
        self.lock().await.query(command).await
    }
}

/// Exclusive access to the channel, held for one or more commands.
pub struct Exchange<'a> {
    channel: MutexGuard<'a, Box<dyn ByteChannel>>,
    timing: &'a TransportTiming,
}

impl Exchange<'_> {
    async fn purge(&mut self) -> AppResult<()> {
        for _ in 0..self.timing.rx_purge_count {
            self.channel.purge(PurgeBuffer::Receive).await?;
        }
        self.channel.purge(PurgeBuffer::Transmit).await
    }

    /// Send a command.
    ///
    /// Returns the last response read: the ETX-terminated response when
    /// `expect_response` is set, the ACK when only a parameter handshake took
    /// place, and `None` for a bare fire-and-forget command.
    pub async fn send(
        &mut self,
        command: &Command,
        expect_response: bool,
    ) -> AppResult<Option<Vec<u8>>> {
        self.purge().await?;
        self.channel.write(&[command.code]).await?;
        debug!(command = %char::from(command.code), "Sent command");

        let timeout = self.timing.timeout;
        let mut response = None;
        if let Some(parameter) = command.parameter() {
            response = Some(self.read_until(ACK, timeout).await?);
            self.channel.write(parameter.as_bytes()).await?;
            debug!(parameter = %escape(parameter.as_bytes()), "Sent parameter");
            if expect_response {
                response = Some(self.read_until(ETX, timeout).await?);
            }
        } else if expect_response {
            response = Some(self.read_until(ETX, timeout).await?);
        }
        Ok(response)
    }

    /// Send a command and return its ETX-terminated response.
    pub async fn query(&mut self, command: &Command) -> AppResult<Vec<u8>> {
        self.send(command, true)
            .await?
            .ok_or_else(|| DaqError::Protocol("no response read".to_string()))
    }

    /// Send a command whose response must equal `expected` byte for byte.
    pub async fn send_expecting(&mut self, command: &Command, expected: &[u8]) -> AppResult<()> {
        let received = self.query(command).await?;
        if received != expected {
            return Err(DaqError::UnexpectedAck {
                expected: expected.to_vec(),
                received,
            });
        }
        Ok(())
    }

    /// Read one byte at a time until `terminator` arrives or `timeout` elapses.
    ///
    /// The terminator is included in the returned bytes.
    pub async fn read_until(&mut self, terminator: u8, timeout: Duration) -> AppResult<Vec<u8>> {
        let start = Instant::now();
        let mut received = Vec::new();
        loop {
            let chunk = self.channel.read(1).await?;
            if let Some(&byte) = chunk.first() {
                received.push(byte);
                if byte == terminator {
                    debug!(response = %escape(&received), "Received");
                    return Ok(received);
                }
            }

            let elapsed = start.elapsed();
            if elapsed > timeout {
                debug!(partial = %escape(&received), "Received incomplete response");
                return Err(DaqError::Timeout {
                    terminator,
                    elapsed,
                    partial: received,
                });
            }

            if chunk.is_empty() {
                tokio::time::sleep(self.timing.poll_interval).await;
            }
        }
    }
}
