//! Mock camera
//!
//! Simulated imaging SDK for testing without the microscope attached.
//! All waits use `tokio::time::sleep`, never `std::thread::sleep`, so tests can
//! run with paused time.
//!
//! The outcome of each `try_get_image` call is scripted with [`MockFetch`]; once
//! the script runs out, the fallback outcome is used (complete by default).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use super::capabilities::{AutoExposure, Camera, ColorProcessing, Frame, ImageMatrix, PixelFormat};
use crate::error::{AppResult, DaqError};

/// Scripted result of one frame fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFetch {
    /// A full frame.
    Complete,
    /// A frame flagged as partially transferred.
    Incomplete,
    /// Nothing arrived within the timeout
    NotReady,
    /// The SDK raised an error
    SdkError,
}

#[derive(Default)]
struct Recorded {
    exposures_us: Vec<f64>,
    auto_exposure: Vec<AutoExposure>,
    gains: Vec<f64>,
    auto_gain: Vec<bool>,
}

/// Mock camera with a 64x48 sensor.
pub struct MockCamera {
    serial: String,
    resolution: (usize, usize),
    fetches: Mutex<VecDeque<MockFetch>>,
    fallback: MockFetch,
    fail_trigger: bool,
    triggers: AtomicU32,
    begun: AtomicU32,
    ended: AtomicU32,
    initialized: AtomicBool,
    trigger_configured: AtomicBool,
    recorded: Mutex<Recorded>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockCamera {
    /// Camera that returns complete 64x48 frames.
    pub fn new(serial: &str) -> Self {
        Self {
            serial: serial.to_string(),
            resolution: (64, 48),
            fetches: Mutex::new(VecDeque::new()),
            fallback: MockFetch::Complete,
            fail_trigger: false,
            triggers: AtomicU32::new(0),
            begun: AtomicU32::new(0),
            ended: AtomicU32::new(0),
            initialized: AtomicBool::new(false),
            trigger_configured: AtomicBool::new(false),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    /// Outcomes for the first fetches, in order.
    pub fn with_fetches(self, fetches: impl IntoIterator<Item = MockFetch>) -> Self {
        *lock(&self.fetches) = fetches.into_iter().collect();
        self
    }

    /// Never produce a complete frame.
    pub fn never_ready(mut self) -> Self {
        self.fallback = MockFetch::Incomplete;
        self
    }

    /// Make every software trigger fail.
    pub fn failing_trigger(mut self) -> Self {
        self.fail_trigger = true;
        self
    }

    /// (width, height)
    pub fn resolution(&self) -> (usize, usize) {
        self.resolution
    }

    /// Software triggers executed.
    pub fn triggers(&self) -> u32 {
        self.triggers.load(Ordering::SeqCst)
    }

    /// Calls to begin acquisition.
    pub fn acquisitions_begun(&self) -> u32 {
        self.begun.load(Ordering::SeqCst)
    }

    /// Calls to end acquisition.
    pub fn acquisitions_ended(&self) -> u32 {
        self.ended.load(Ordering::SeqCst)
    }

    /// Whether the camera has been initialised.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Whether software triggering has been set up.
    pub fn is_trigger_configured(&self) -> bool {
        self.trigger_configured.load(Ordering::SeqCst)
    }

    /// Exposure times written, in microseconds.
    pub fn exposures_us(&self) -> Vec<f64> {
        lock(&self.recorded).exposures_us.clone()
    }

    /// Auto-exposure modes written, in order.
    pub fn auto_exposure_modes(&self) -> Vec<AutoExposure> {
        lock(&self.recorded).auto_exposure.clone()
    }

    /// Gain values written, in order.
    pub fn gains(&self) -> Vec<f64> {
        lock(&self.recorded).gains.clone()
    }

    /// Auto-gain switches written, in order.
    pub fn auto_gain_settings(&self) -> Vec<bool> {
        lock(&self.recorded).auto_gain.clone()
    }

    fn frame(&self) -> Frame {
        let (width, height) = self.resolution;
        let data = (0..width * height)
            .map(|i| ((i % width + i / width) % 256) as u16 * 256)
            .collect();
        Frame::new(width, height, data)
    }
}

#[async_trait]
impl Camera for MockCamera {
    fn serial_number(&self) -> String {
        self.serial.clone()
    }

    async fn initialize(&self) -> AppResult<()> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn configure_software_trigger(&self) -> AppResult<()> {
        if !self.is_initialized() {
            return Err(DaqError::Camera("camera not initialized".to_string()));
        }
        self.trigger_configured.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn deinitialize(&self) -> AppResult<()> {
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn begin_acquisition(&self) -> AppResult<()> {
        self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn end_acquisition(&self) -> AppResult<()> {
        self.ended.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn trigger_software(&self) -> AppResult<()> {
        if self.fail_trigger {
            return Err(DaqError::Camera(
                "unable to execute software trigger".to_string(),
            ));
        }
        self.triggers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn try_get_image(&self, timeout: Duration) -> AppResult<Option<Frame>> {
        let outcome = lock(&self.fetches).pop_front().unwrap_or(self.fallback);
        match outcome {
            MockFetch::Complete => Ok(Some(self.frame())),
            MockFetch::Incomplete => {
                let (width, height) = self.resolution;
                Ok(Some(Frame::incomplete(width, height)))
            }
            MockFetch::NotReady => {
                sleep(timeout).await;
                Ok(None)
            }
            MockFetch::SdkError => Err(DaqError::Camera("image not ready".to_string())),
        }
    }

    fn convert(
        &self,
        frame: &Frame,
        _processing: ColorProcessing,
        format: PixelFormat,
    ) -> AppResult<ImageMatrix> {
        if frame.width == 0 || frame.data.len() != frame.width * frame.height {
            return Err(DaqError::Camera(format!(
                "frame has {} values for {}x{} pixels",
                frame.data.len(),
                frame.width,
                frame.height
            )));
        }
        Ok(frame
            .data
            .chunks(frame.width)
            .map(|row| {
                row.iter()
                    .map(|&v| match format {
                        PixelFormat::Mono8 => f64::from(v >> 8),
                        PixelFormat::Mono16 => f64::from(v),
                    })
                    .collect()
            })
            .collect())
    }

    async fn set_auto_exposure(&self, mode: AutoExposure) -> AppResult<()> {
        lock(&self.recorded).auto_exposure.push(mode);
        Ok(())
    }

    async fn exposure_limits_us(&self) -> AppResult<(f64, f64)> {
        Ok((20.0, 30_000_000.0))
    }

    async fn set_exposure_time_us(&self, exposure_us: f64) -> AppResult<()> {
        lock(&self.recorded).exposures_us.push(exposure_us);
        Ok(())
    }

    async fn set_auto_gain(&self, continuous: bool) -> AppResult<()> {
        lock(&self.recorded).auto_gain.push(continuous);
        Ok(())
    }

    async fn gain_limits(&self) -> AppResult<(f64, f64)> {
        Ok((0.0, 47.99))
    }

    async fn set_gain(&self, gain: f64) -> AppResult<()> {
        lock(&self.recorded).gains.push(gain);
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_fetches_then_fallback() {
        let camera = MockCamera::new("1").with_fetches([MockFetch::Incomplete, MockFetch::SdkError]);
        let timeout = Duration::from_millis(1);

        assert!(camera.try_get_image(timeout).await.unwrap().unwrap().incomplete);
        assert!(camera.try_get_image(timeout).await.is_err());
        assert!(!camera.try_get_image(timeout).await.unwrap().unwrap().incomplete);
    }

    #[tokio::test]
    async fn test_convert_mono8_scales_down() {
        let camera = MockCamera::new("1");
        let frame = Frame::new(2, 1, vec![0x0100, 0xff00]);
        let image = camera
            .convert(&frame, ColorProcessing::HqLinear, PixelFormat::Mono8)
            .unwrap();
        assert_eq!(image, vec![vec![1.0, 255.0]]);
    }

    #[tokio::test]
    async fn test_software_trigger_requires_init() {
        let camera = MockCamera::new("1");
        assert!(camera.configure_software_trigger().await.is_err());
        camera.initialize().await.unwrap();
        camera.configure_software_trigger().await.unwrap();
        assert!(camera.is_trigger_configured());
    }
}
