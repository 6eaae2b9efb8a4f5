//! Configuration using Figment
//!
//! Settings are loaded, lowest priority first, from:
//! 1. Built-in defaults (the values the instrument was characterised with)
//! 2. A TOML file (`cytation.toml` unless another path is given)
//! 3. Environment variables prefixed with `CYTATION_`, `__` separating sections
//!
//! ```text
//! CYTATION_SERIAL__PORT=/dev/ttyUSB1
//! CYTATION_PROTOCOL__TIMEOUT=30s
//! CYTATION_IMAGING__CAMERA_SERIAL=22353124
//! ```
//!
//! Durations use humantime notation (`"20s"`, `"300ms"`, `"16m"`).
//!
//! The serial framing (8 data bits, 2 stop bits, no parity, RTS/CTS) is fixed by
//! the instrument and set in the serial adapter, not here.

use crate::error::{AppResult, DaqError};
use crate::error_recovery::RetryPolicy;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "cytation.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "CYTATION_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Process-wide settings
    pub application: ApplicationSettings,
    /// Serial port
    pub serial: SerialSettings,
    /// Command framing and timeouts
    pub protocol: ProtocolSettings,
    /// Continuous shaking
    pub shake: ShakeSettings,
    /// Microscope camera
    pub imaging: ImagingSettings,
}

/// Settings that are not specific to the instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    /// Logging filter used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Serial port the instrument is attached to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Port path (e.g. "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Line speed; the instrument runs at 38400
    pub baud_rate: u32,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 38400,
        }
    }
}

/// Framing and timing of the command transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSettings {
    /// Budget for an ordinary terminator read
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// How many times the receive buffer is purged before each command
    pub rx_purge_count: u32,
    /// Pause between empty single-byte reads
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Budget for the plate data after an absorbance trigger
    #[serde(with = "humantime_serde")]
    pub absorbance_read_timeout: Duration,
    /// Budget for the plate data after a luminescence trigger
    #[serde(with = "humantime_serde")]
    pub luminescence_read_timeout: Duration,
    /// Budget for the plate data after a fluorescence trigger
    #[serde(with = "humantime_serde")]
    pub fluorescence_read_timeout: Duration,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            rx_purge_count: 6,
            poll_interval: Duration::from_millis(10),
            absorbance_read_timeout: Duration::from_secs(3 * 60),
            luminescence_read_timeout: Duration::from_secs(3 * 60),
            fluorescence_read_timeout: Duration::from_secs(2 * 60),
        }
    }
}

/// Background shake loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShakeSettings {
    /// Duration requested per shake command; the instrument caps this at 16 minutes
    #[serde(with = "humantime_serde")]
    pub max_duration: Duration,
    /// Policy for re-issuing a shake command that failed
    pub retry: RetryPolicy,
}

impl Default for ShakeSettings {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(16 * 60),
            retry: RetryPolicy::shake_reissue(),
        }
    }
}

/// Camera selection and image acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagingSettings {
    /// Camera to use when several are attached; the first one otherwise
    pub camera_serial: Option<String>,
    /// Per-attempt wait for a frame after a software trigger
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    /// Trigger/fetch attempts per image
    pub retry: RetryPolicy,
    /// LED intensity (1-10) applied when switching imaging mode
    pub led_intensity: u8,
}

impl Default for ImagingSettings {
    fn default() -> Self {
        Self {
            camera_serial: None,
            fetch_timeout: Duration::from_millis(1000),
            retry: RetryPolicy::image_acquisition(),
            led_intensity: 10,
        }
    }
}

impl Settings {
    /// Load from `cytation.toml` (if present) and the environment.
    pub fn load() -> AppResult<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load from a specific TOML file (if present) and the environment.
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the protocol cannot encode or the loops cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.protocol.rx_purge_count == 0 {
            return Err(DaqError::Validation(
                "protocol.rx_purge_count must be at least 1".to_string(),
            ));
        }
        if self.protocol.timeout.is_zero() {
            return Err(DaqError::Validation(
                "protocol.timeout must be non-zero".to_string(),
            ));
        }
        let shake_secs = self.shake.max_duration.as_secs();
        if shake_secs == 0 || shake_secs > 999 {
            return Err(DaqError::Validation(format!(
                "shake.max_duration must be between 1 and 999 seconds, got {shake_secs}"
            )));
        }
        if self.shake.retry.max_attempts == 0 || self.imaging.retry.max_attempts == 0 {
            return Err(DaqError::Validation(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(1..=10).contains(&self.imaging.led_intensity) {
            return Err(DaqError::Validation(format!(
                "imaging.led_intensity must be between 1 and 10, got {}",
                self.imaging.led_intensity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.serial.baud_rate, 38400);
        assert_eq!(settings.protocol.rx_purge_count, 6);
        assert_eq!(settings.shake.max_duration, Duration::from_secs(960));
        assert_eq!(settings.imaging.retry.max_attempts, 8);
    }

    #[test]
    fn test_load_file_and_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "cytation.toml",
                r#"
                [serial]
                port = "/dev/ttyUSB3"

                [protocol]
                timeout = "5s"
                rx_purge_count = 2

                [imaging]
                camera_serial = "22353124"
                "#,
            )?;
            jail.set_env("CYTATION_PROTOCOL__TIMEOUT", "30s");

            let settings = Settings::load().map_err(|e| e.to_string())?;
            assert_eq!(settings.serial.port, "/dev/ttyUSB3");
            assert_eq!(settings.serial.baud_rate, 38400);
            assert_eq!(settings.protocol.timeout, Duration::from_secs(30));
            assert_eq!(settings.protocol.rx_purge_count, 2);
            assert_eq!(settings.imaging.camera_serial.as_deref(), Some("22353124"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let settings = Settings::load().map_err(|e| e.to_string())?;
            assert_eq!(settings, Settings::default());
            Ok(())
        });
    }

    #[test]
    fn test_shake_duration_must_fit_three_digits() {
        let mut settings = Settings::default();
        settings.shake.max_duration = Duration::from_secs(1000);
        assert!(settings.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_zero_purge_count_rejected() {
        let mut settings = Settings::default();
        settings.protocol.rx_purge_count = 0;
        assert!(settings.validate().is_err());
    }
}
