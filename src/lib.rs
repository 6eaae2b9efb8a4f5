//! Core library for the Cytation 5 driver.
//!
//! Layers, from the wire up:
//!
//! - [`adapters`]: duplex byte channels (serial port, in-memory mock)
//! - [`transport`]: command/acknowledge/data framing over a channel
//! - [`payload`]: checksummed command bodies
//! - [`parser`]: plate grid decoding
//! - [`instrument`]: the driver, shake loop and imaging modes
//! - [`hardware`]: the imaging camera capability and its acquisition loop
//!
//! It is used by the `cytation` command-line tool.

pub mod adapters;
pub mod config;
pub mod error;
pub mod error_recovery;
pub mod hardware;
pub mod instrument;
pub mod parser;
pub mod payload;
pub mod transport;

pub use error::{AppResult, DaqError};
pub use instrument::Cytation5;
