//! Byte channel adapters
//!
//! A [`ByteChannel`] is the lowest layer of the driver: an unframed, duplex byte
//! pipe to the instrument. It knows nothing about commands or terminators; the
//! [`FramedTransport`](crate::transport::FramedTransport) builds the exchange
//! protocol on top of it.
//!
//! Line settings (baud rate, stop bits, flow control) belong to whoever opens the
//! channel, see [`SerialChannel`].

pub mod mock;
#[cfg(feature = "instrument_serial")]
pub mod serial_adapter;

use crate::error::AppResult;
use async_trait::async_trait;

pub use mock::{MockChannel, MockHandle};
#[cfg(feature = "instrument_serial")]
pub use serial_adapter::SerialChannel;

/// Which hardware buffer a purge applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeBuffer {
    /// Bytes waiting to be read.
    Receive,
    /// Bytes not yet sent.
    Transmit,
}

/// Duplex byte pipe to the instrument.
#[async_trait]
pub trait ByteChannel: Send {
    /// Write all of `bytes` to the device.
    async fn write(&mut self, bytes: &[u8]) -> AppResult<()>;

    /// Read up to `max` bytes that are already available.
    ///
    /// Never waits for data: an empty vector means nothing has arrived yet.
    async fn read(&mut self, max: usize) -> AppResult<Vec<u8>>;

    /// Discard whatever is pending in one of the hardware buffers.
    async fn purge(&mut self, buffer: PurgeBuffer) -> AppResult<()>;
}
