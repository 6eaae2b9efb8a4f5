//! Serial adapter for the instrument's USB-serial bridge.
//!
//! The Cytation talks through an FTDI bridge that must be configured for
//! 8 data bits, 2 stop bits, no parity and RTS/CTS hardware flow control, with
//! RTS asserted. Those settings are fixed here; only the port and baud rate vary.

use super::{ByteChannel, PurgeBuffer};
use crate::config::SerialSettings;
use crate::error::AppResult;
use async_trait::async_trait;
use futures::FutureExt;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::debug;

/// [`ByteChannel`] over a tokio-serial stream.
pub struct SerialChannel {
    port_name: String,
    stream: SerialStream,
}

impl SerialChannel {
    /// Open and configure the port described by `settings`.
    pub fn open(settings: &SerialSettings) -> AppResult<Self> {
        let mut stream = tokio_serial::new(&settings.port, settings.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::Two)
            .parity(tokio_serial::Parity::None)
            .flow_control(tokio_serial::FlowControl::Hardware)
            .open_native_async()
            .map_err(io::Error::from)?;
        stream
            .write_request_to_send(true)
            .map_err(io::Error::from)?;

        debug!(
            port = %settings.port,
            baud_rate = settings.baud_rate,
            "Serial port opened"
        );
        Ok(Self {
            port_name: settings.port.clone(),
            stream,
        })
    }

    /// Device path the channel was opened on.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[async_trait]
impl ByteChannel for SerialChannel {
    async fn write(&mut self, bytes: &[u8]) -> AppResult<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read(&mut self, max: usize) -> AppResult<Vec<u8>> {
        let mut buf = vec![0u8; max];
        // Poll once; a pending read means nothing is buffered yet.
        match self.stream.read(&mut buf).now_or_never() {
            Some(Ok(n)) => {
                buf.truncate(n);
                Ok(buf)
            }
            Some(Err(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(Vec::new()),
            Some(Err(e)) => Err(e.into()),
            None => Ok(Vec::new()),
        }
    }

    async fn purge(&mut self, buffer: PurgeBuffer) -> AppResult<()> {
        let target = match buffer {
            PurgeBuffer::Receive => ClearBuffer::Input,
            PurgeBuffer::Transmit => ClearBuffer::Output,
        };
        self.stream.clear(target).map_err(io::Error::from)?;
        Ok(())
    }
}
