//! Imaging capability
//!
//! The microscope camera is driven through a vendor SDK that this crate does not
//! link. [`Camera`] describes the operations the driver needs from it; an SDK
//! binding (or [`MockCamera`](super::mock::MockCamera)) implements the trait.
//!
//! The camera is optional hardware. Operations that need it check for it at the
//! call boundary and fail with `DaqError::NotInitialized` when it is absent.

use crate::error::AppResult;
use async_trait::async_trait;
use std::time::Duration;

/// Pixel matrix handed back to callers, row-major.
pub type ImageMatrix = Vec<Vec<f64>>;

/// A raw frame as fetched from the camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Pixels per row
    pub width: usize,
    /// Rows
    pub height: usize,
    /// Raw sensor values, row-major
    pub data: Vec<u16>,
    /// Set when the SDK reports the frame as partially transferred
    pub incomplete: bool,
}

impl Frame {
    /// Complete frame.
    pub fn new(width: usize, height: usize, data: Vec<u16>) -> Self {
        Self {
            width,
            height,
            data,
            incomplete: false,
        }
    }

    /// Frame the SDK flagged as partially transferred, with no data.
    pub fn incomplete(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: Vec::new(),
            incomplete: true,
        }
    }
}

/// Output pixel format requested from the SDK's image processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    #[default]
    /// 8 bits per pixel.
    Mono8,
    /// 16 bits per pixel.
    Mono16,
}

/// Debayering algorithm used during conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorProcessing {
    #[default]
    /// High-quality linear interpolation.
    HqLinear,
    /// Nearest neighbour.
    NearestNeighbor,
    /// Bilinear interpolation.
    Bilinear,
}

/// Camera-side automatic exposure modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoExposure {
    /// Exposure is set explicitly.
    Off,
    /// Adjust once, then hold.
    Once,
    /// Adjust on every frame.
    Continuous,
}

/// Operations the driver needs from the imaging SDK.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Device serial number, used to pick a camera when several are attached.
    fn serial_number(&self) -> String;

    async fn initialize(&self) -> AppResult<()>;

    /// Frame-start trigger selector, software trigger source, trigger mode on.
    ///
    /// Software triggering is needed for exposures longer than ~23 ms.
    async fn configure_software_trigger(&self) -> AppResult<()>;

    async fn deinitialize(&self) -> AppResult<()>;

    async fn begin_acquisition(&self) -> AppResult<()>;

    async fn end_acquisition(&self) -> AppResult<()>;

    async fn trigger_software(&self) -> AppResult<()>;

    /// Wait up to `timeout` for the next frame.
    ///
    /// `Ok(None)` and `Err(_)` both mean no frame was available this time.
    async fn try_get_image(&self, timeout: Duration) -> AppResult<Option<Frame>>;

    /// Convert a complete frame into the requested pixel format.
    fn convert(
        &self,
        frame: &Frame,
        processing: ColorProcessing,
        format: PixelFormat,
    ) -> AppResult<ImageMatrix>;

    async fn set_auto_exposure(&self, mode: AutoExposure) -> AppResult<()>;

    /// Supported exposure range in microseconds.
    async fn exposure_limits_us(&self) -> AppResult<(f64, f64)>;

    async fn set_exposure_time_us(&self, exposure_us: f64) -> AppResult<()>;

    async fn set_auto_gain(&self, continuous: bool) -> AppResult<()>;

    async fn gain_limits(&self) -> AppResult<(f64, f64)>;

    async fn set_gain(&self, gain: f64) -> AppResult<()>;
}
