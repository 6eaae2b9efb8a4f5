//! Image acquisition retry loop
//!
//! Frames are not always ready on the first software trigger, and the SDK may
//! hand back a partially transferred one. Acquisition therefore triggers and
//! polls up to `retry.max_attempts` times with a fixed backoff, returning the
//! first complete frame.
//!
//! `end_acquisition` runs on every exit path once `begin_acquisition` succeeded.

use super::capabilities::{Camera, ColorProcessing, ImageMatrix, PixelFormat};
use crate::config::ImagingSettings;
use crate::error::{AppResult, DaqError};
use crate::error_recovery::RetryPolicy;
use std::time::Duration;
use tracing::{debug, warn};

/// Parameters of one acquisition.
#[derive(Debug, Clone)]
pub struct AcquisitionOptions {
    /// Trigger/fetch attempts and the pause between them
    pub retry: RetryPolicy,
    /// Per-attempt wait for a frame
    pub fetch_timeout: Duration,
    /// Debayering for the conversion
    pub processing: ColorProcessing,
    /// Pixel format for the conversion
    pub format: PixelFormat,
}

impl Default for AcquisitionOptions {
    fn default() -> Self {
        Self::from(&ImagingSettings::default())
    }
}

impl From<&ImagingSettings> for AcquisitionOptions {
    fn from(settings: &ImagingSettings) -> Self {
        Self {
            retry: settings.retry.clone(),
            fetch_timeout: settings.fetch_timeout,
            processing: ColorProcessing::default(),
            format: PixelFormat::default(),
        }
    }
}

/// Acquire one converted image.
pub async fn acquire_image(
    camera: &dyn Camera,
    options: &AcquisitionOptions,
) -> AppResult<ImageMatrix> {
    camera.begin_acquisition().await?;
    let result = poll_frames(camera, options).await;

    match camera.end_acquisition().await {
        Ok(()) => result,
        Err(e) if result.is_ok() => Err(e),
        Err(e) => {
            warn!(error = %e, "Failed to end acquisition");
            result
        }
    }
}

async fn poll_frames(camera: &dyn Camera, options: &AcquisitionOptions) -> AppResult<ImageMatrix> {
    let mut attempts = 0;
    while options.retry.allows_another(attempts) {
        camera.trigger_software().await?;

        match camera.try_get_image(options.fetch_timeout).await {
            Ok(Some(frame)) if !frame.incomplete => {
                debug!(attempt = attempts + 1, "Image acquired");
                return camera.convert(&frame, options.processing, options.format);
            }
            Ok(Some(_)) => debug!(attempt = attempts + 1, "Image incomplete"),
            Ok(None) => debug!(attempt = attempts + 1, "Image not ready"),
            Err(e) => debug!(attempt = attempts + 1, error = %e, "Failed to get image"),
        }

        attempts += 1;
        if options.retry.allows_another(attempts) {
            tokio::time::sleep(options.retry.backoff_delay).await;
        }
    }
    Err(DaqError::ImageTimeout { attempts })
}
