//! Custom error types for the driver.
//!
//! This module defines the primary error type, `DaqError`, for the whole crate.
//! Using the `thiserror` crate, it provides a single, consistent way to report
//! everything that can go wrong between a caller and the plate reader.
//!
//! ## Error Hierarchy
//!
//! - **Validation** (`OutOfRange`, `Validation`): the caller asked for something the
//!   instrument cannot do. Raised before any byte is written to the channel.
//! - **Timeout**: a terminator byte was not observed within the read budget. Carries the
//!   partial response that did arrive, for diagnostics.
//!   Image acquisition reports `ImageTimeout` once its attempts are exhausted.
//! - **Protocol** (`UnexpectedAck`, `Protocol`): the instrument answered, but not in the
//!   shape the protocol requires (wrong acknowledgment, malformed plate body).
//! - **NotInitialized**: an imaging operation was requested without a camera attached.
//! - **Io** / **Config** / **Camera**: failures from collaborators (byte channel,
//!   configuration sources, imaging SDK).
//!
//! None of these are retried at the transport layer. Retrying is left to the shake
//! loop and the image acquisition loop, which own a [`RetryPolicy`](crate::error_recovery::RetryPolicy).

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Every failure the driver can report.
#[derive(Error, Debug)]
pub enum DaqError {
    /// A numeric parameter fell outside what the instrument can encode.
    #[error("{parameter} must be between {min} and {max}, got {value}")]
    OutOfRange {
        /// Name of the rejected parameter.
        parameter: &'static str,
        /// The value supplied.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },

    /// A non-numeric argument was rejected before any I/O.
    #[error("Invalid argument: {0}")]
    Validation(String),

    /// A terminator read gave up.
    #[error(
        "Timed out after {elapsed:?} waiting for 0x{terminator:02x} (received {})",
        escape(.partial)
    )]
    Timeout {
        /// Byte that was being waited for.
        terminator: u8,
        /// Time spent waiting.
        elapsed: Duration,
        /// Bytes received before giving up.
        partial: Vec<u8>,
    },

    /// The camera produced no complete frame within the retry budget.
    #[error("No complete image after {attempts} attempts")]
    ImageTimeout {
        /// Trigger/fetch attempts made.
        attempts: u32,
    },

    /// The instrument answered with a different acknowledgment.
    #[error("Unexpected acknowledgment: expected {}, got {}", escape(.expected), escape(.received))]
    UnexpectedAck {
        /// Acknowledgment the command requires.
        expected: Vec<u8>,
        /// What actually arrived.
        received: Vec<u8>,
    },

    /// A response could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A component the call needs is missing.
    #[error("{0} not initialized")]
    NotInitialized(&'static str),

    /// Serial port failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Camera SDK failure.
    #[error("Camera error: {0}")]
    Camera(String),

    /// The background shake task panicked.
    #[error("Shake task failed: {0}")]
    ShakeTask(String),

    /// Built without the `instrument_serial` feature.
    #[error("Serial support not enabled. Rebuild with --features instrument_serial")]
    SerialFeatureDisabled,

    /// Recognised but unsupported feature, with a hint.
    #[error("Feature '{0}' is not yet implemented. {1}")]
    FeatureIncomplete(String, String),
}

impl From<figment::Error> for DaqError {
    fn from(err: figment::Error) -> Self {
        DaqError::Config(Box::new(err))
    }
}

impl DaqError {
    /// Build the bounds error used by every range-checked parameter.
    pub fn out_of_range(parameter: &'static str, value: f64, min: f64, max: f64) -> Self {
        DaqError::OutOfRange {
            parameter,
            value,
            min,
            max,
        }
    }

    /// True for errors raised before any I/O took place.
    pub fn is_validation(&self) -> bool {
        matches!(self, DaqError::OutOfRange { .. } | DaqError::Validation(_))
    }

    /// True for serial and image timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            DaqError::Timeout { .. } | DaqError::ImageTimeout { .. }
        )
    }

    /// True when the instrument answered, but not as expected.
    pub fn is_protocol(&self) -> bool {
        matches!(self, DaqError::UnexpectedAck { .. } | DaqError::Protocol(_))
    }

    /// Bytes received before a terminator read gave up, if this is a timeout.
    pub fn partial_response(&self) -> Option<&[u8]> {
        match self {
            DaqError::Timeout { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

/// Render wire bytes with control characters escaped, for logs and error messages.
pub fn escape(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_display() {
        let err = DaqError::out_of_range("wavelength", 1200.0, 230.0, 999.0);
        assert_eq!(
            err.to_string(),
            "wavelength must be between 230 and 999, got 1200"
        );
        assert!(err.is_validation());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_keeps_partial_bytes() {
        let err = DaqError::Timeout {
            terminator: 0x03,
            elapsed: Duration::from_secs(20),
            partial: b"\x06012".to_vec(),
        };
        assert_eq!(err.partial_response(), Some(&b"\x06012"[..]));
        assert!(err.to_string().contains("\\x06012"));
        assert!(err.to_string().contains("0x03"));
    }

    #[test]
    fn test_unexpected_ack_is_protocol_error() {
        let err = DaqError::UnexpectedAck {
            expected: b"\x060000\x03".to_vec(),
            received: b"\x060021\x03".to_vec(),
        };
        assert!(err.is_protocol());
        assert!(err.partial_response().is_none());
        assert!(err.to_string().contains("0021"));
    }
}
