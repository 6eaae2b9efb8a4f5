//! BioTek Cytation 5 driver
//!
//! Sequences the multi-step interactions of the plate reader and its microscope:
//! plate reads, carrier control, continuous shaking, well selection, optics and
//! camera settings.
//!
//! ## Plate reads
//!
//! Every read has the same shape, run under one held [`Exchange`] so the shake
//! loop cannot slip a command in between the steps:
//!
//! 1. (luminescence and fluorescence) `t` sets the read height
//! 2. `y` with the read priming parameter
//! 3. `D` with the checksummed measurement body
//! 4. `O` triggers the scan and must be acknowledged with exactly `\x060000\x03`
//! 5. a long terminator read collects the plate data
//!
//! No step is retried.
//!
//! ## Settings cache
//!
//! The last applied well, imaging mode, exposure, focus and gain are cached.
//! Setting a value equal to the cached one sends nothing.

use crate::adapters::ByteChannel;
use crate::config::Settings;
use crate::error::{escape, AppResult, DaqError};
use crate::hardware::{
    acquire_image, AcquisitionOptions, AutoExposure, Camera, ColorProcessing, ImageMatrix,
    PixelFormat,
};
use crate::instrument::imaging::{self, Exposure, FocalPosition, Gain, ImagingMode};
use crate::instrument::shake::{self, ShakeSession};
use crate::parser::{parse_plate, PlateMatrix};
use crate::payload::{self, ShakeType, LUMINESCENCE_BODY, READ_PRIMING};
use crate::transport::{Command, Exchange, FramedTransport, TransportTiming, ETX, TRIGGER_ACK};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Highest row or column index the well selection field can encode.
pub const MAX_WELL_INDEX: u8 = 99;

/// LED intensity range accepted by the `L` command.
pub const LED_INTENSITY_RANGE: (u8, u8) = (1, 10);

/// Last values applied to the instrument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentState {
    /// Selected well as (row, column)
    pub well: Option<(u8, u8)>,
    /// Current filter/LED configuration
    pub imaging_mode: Option<ImagingMode>,
    /// Exposure last written to the camera
    pub exposure: Option<Exposure>,
    /// Objective focus
    pub focal_position: Option<FocalPosition>,
    /// Gain last written to the camera
    pub gain: Option<Gain>,
}

/// Everything needed to take one microscope image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRequest {
    /// Well row, 0 to 99
    pub row: u8,
    /// Well column, 0 to 99
    pub column: u8,
    /// Filter and LED configuration
    pub mode: ImagingMode,
    /// Camera exposure
    pub exposure: Exposure,
    /// Objective focus
    pub focal_position: FocalPosition,
    /// Camera gain
    pub gain: Gain,
    /// Debayering for the conversion
    pub processing: ColorProcessing,
    /// Output pixel format
    pub format: PixelFormat,
}

impl CaptureRequest {
    /// Request with default colour processing and pixel format.
    pub fn new(
        row: u8,
        column: u8,
        mode: ImagingMode,
        exposure: Exposure,
        focal_position: FocalPosition,
        gain: Gain,
    ) -> Self {
        Self {
            row,
            column,
            mode,
            exposure,
            focal_position,
            gain,
            processing: ColorProcessing::default(),
            format: PixelFormat::default(),
        }
    }
}

/// Cytation 5 plate reader with optional imaging camera.
pub struct Cytation5 {
    transport: FramedTransport,
    settings: Settings,
    camera: Option<Arc<dyn Camera>>,
    state: Mutex<InstrumentState>,
    shake: Mutex<Option<ShakeSession>>,
}

/// Strip the leading control byte and trailing ETX of a response.
fn frame_contents(response: &[u8]) -> AppResult<&[u8]> {
    match response {
        [_, inner @ .., _] => Ok(inner),
        _ => Err(DaqError::Protocol(format!(
            "response too short: {}",
            escape(response)
        ))),
    }
}

fn contents_str(response: &[u8]) -> AppResult<&str> {
    std::str::from_utf8(frame_contents(response)?)
        .map_err(|_| DaqError::Protocol(format!("non-ASCII response: {}", escape(response))))
}

impl Cytation5 {
    /// Driver over an already opened channel.
    pub fn new(channel: impl ByteChannel + 'static, settings: Settings) -> Self {
        let transport = FramedTransport::new(channel, TransportTiming::from(&settings.protocol));
        Self {
            transport,
            settings,
            camera: None,
            state: Mutex::new(InstrumentState::default()),
            shake: Mutex::new(None),
        }
    }

    /// Open the configured serial port and build a driver on it.
    #[cfg(feature = "instrument_serial")]
    pub fn connect(settings: Settings) -> AppResult<Self> {
        let channel = crate::adapters::SerialChannel::open(&settings.serial)?;
        info!(port = %settings.serial.port, "Connected to Cytation 5");
        Ok(Self::new(channel, settings))
    }

    /// Settings the driver was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Snapshot of the settings cache.
    pub async fn state(&self) -> InstrumentState {
        self.state.lock().await.clone()
    }

    fn camera(&self) -> AppResult<&Arc<dyn Camera>> {
        self.camera.as_ref().ok_or(DaqError::NotInitialized("camera"))
    }

    /// Whether a camera has been attached.
    pub fn has_camera(&self) -> bool {
        self.camera.is_some()
    }

    // ---------------------------------------------------------------------
    // Device information and carrier
    // ---------------------------------------------------------------------

    /// Instrument serial number (`C`).
    pub async fn get_serial_number(&self) -> AppResult<String> {
        let response = self.transport.query(&Command::new(b'C')).await?;
        let contents = contents_str(&response)?;
        Ok(contents.split(' ').next().unwrap_or_default().to_string())
    }

    /// Firmware version string (`e`).
    pub async fn get_firmware_version(&self) -> AppResult<String> {
        let response = self.transport.query(&Command::new(b'e')).await?;
        let contents = contents_str(&response)?;
        Ok(contents.split(' ').take(4).collect::<Vec<_>>().join(" "))
    }

    /// Incubation temperature in degrees Celsius.
    pub async fn get_current_temperature(&self) -> AppResult<f64> {
        let response = self.transport.query(&Command::new(b'h')).await?;
        let contents = contents_str(&response)?;
        let raw: i64 = contents.trim().parse().map_err(|_| {
            DaqError::Protocol(format!("invalid temperature response: {}", escape(&response)))
        })?;
        Ok(raw as f64 / 100_000.0)
    }

    /// Move the plate carrier out. Returns the raw response.
    pub async fn open(&self) -> AppResult<Vec<u8>> {
        self.transport.query(&Command::new(b'J')).await
    }

    /// Move the plate carrier in. Returns the raw response.
    pub async fn close(&self) -> AppResult<Vec<u8>> {
        self.transport.query(&Command::new(b'A')).await
    }

    /// Stop whatever the instrument is doing. Does not wait for a response.
    pub async fn abort(&self) -> AppResult<()> {
        shake::send_abort(&self.transport).await
    }

    // ---------------------------------------------------------------------
    // Plate reads
    // ---------------------------------------------------------------------

    /// Absorbance of the whole plate at `wavelength_nm` (230 to 999).
    pub async fn read_absorbance(&self, wavelength_nm: u32) -> AppResult<PlateMatrix> {
        let body = payload::absorbance_body(wavelength_nm)?;
        info!(wavelength_nm, "Reading absorbance");
        self.read_plate(None, body, self.settings.protocol.absorbance_read_timeout)
            .await
    }

    /// Luminescence of the whole plate, read at `focal_height_mm`.
    pub async fn read_luminescence(&self, focal_height_mm: f64) -> AppResult<PlateMatrix> {
        let focus = payload::luminescence_focus(focal_height_mm)?;
        info!(focal_height_mm, "Reading luminescence");
        self.read_plate(
            Some(focus),
            LUMINESCENCE_BODY.to_string(),
            self.settings.protocol.luminescence_read_timeout,
        )
        .await
    }

    /// Fluorescence of the whole plate for one excitation/emission pair.
    pub async fn read_fluorescence(
        &self,
        excitation_nm: u32,
        emission_nm: u32,
        focal_height_mm: f64,
    ) -> AppResult<PlateMatrix> {
        let focus = payload::fluorescence_focus(focal_height_mm)?;
        let body = payload::fluorescence_body(excitation_nm, emission_nm)?;
        info!(
            excitation_nm,
            emission_nm, focal_height_mm, "Reading fluorescence"
        );
        self.read_plate(
            Some(focus),
            body,
            self.settings.protocol.fluorescence_read_timeout,
        )
        .await
    }

    async fn read_plate(
        &self,
        focus: Option<String>,
        body: String,
        read_timeout: Duration,
    ) -> AppResult<PlateMatrix> {
        let data = {
            let mut exchange = self.transport.lock().await;
            if let Some(focus) = focus {
                exchange
                    .send(&Command::with_parameter(b't', focus), true)
                    .await?;
            }
            exchange
                .send(&Command::with_parameter(b'y', READ_PRIMING), true)
                .await?;
            exchange
                .send(&Command::with_parameter(b'D', body), true)
                .await?;
            exchange
                .send_expecting(&Command::new(b'O'), TRIGGER_ACK)
                .await?;
            exchange.read_until(ETX, read_timeout).await?
        };
        let plate = parse_plate(&data)?;
        debug!(columns = plate.columns(), "Plate read complete");
        Ok(plate)
    }

    // ---------------------------------------------------------------------
    // Shaking
    // ---------------------------------------------------------------------

    /// Shake until [`stop_shaking`](Self::stop_shaking) is called.
    ///
    /// Shaking with the same type again is a no-op. A different type stops the
    /// running session before the new one starts. If the old session's loop had
    /// failed, that error is returned and nothing new is started; the slot is
    /// left empty so the next call starts cleanly.
    pub async fn shake(&self, shake_type: ShakeType) -> AppResult<()> {
        let mut slot = self.shake.lock().await;
        if let Some(session) = slot.take() {
            if session.is_running() && session.shake_type() == shake_type {
                debug!(?shake_type, "Already shaking");
                *slot = Some(session);
                return Ok(());
            }
            session.stop(&self.transport).await?;
        }
        *slot = Some(ShakeSession::start(
            self.transport.clone(),
            shake_type,
            &self.settings.shake,
        )?);
        Ok(())
    }

    /// Stop shaking. Does nothing when not shaking.
    ///
    /// Returns the error that ended the shake loop, if it had already given up.
    pub async fn stop_shaking(&self) -> AppResult<()> {
        match self.shake.lock().await.take() {
            Some(session) => session.stop(&self.transport).await,
            None => Ok(()),
        }
    }

    /// Whether a shake loop is still running.
    pub async fn is_shaking(&self) -> bool {
        self.shake
            .lock()
            .await
            .as_ref()
            .is_some_and(ShakeSession::is_running)
    }

    // ---------------------------------------------------------------------
    // Microscope positioning and optics
    // ---------------------------------------------------------------------

    /// Switch the LED of the current imaging mode on at `intensity` (1 to 10).
    pub async fn led_on(&self, intensity: u8) -> AppResult<()> {
        let mode = self.state.lock().await.imaging_mode;
        let mode = mode.ok_or_else(|| {
            DaqError::Validation("imaging mode not set, call set_imaging_mode first".to_string())
        })?;
        let mut exchange = self.transport.lock().await;
        Self::send_led_on(&mut exchange, mode, intensity).await
    }

    async fn send_led_on(
        exchange: &mut Exchange<'_>,
        mode: ImagingMode,
        intensity: u8,
    ) -> AppResult<()> {
        let (min, max) = LED_INTENSITY_RANGE;
        if !(min..=max).contains(&intensity) {
            return Err(DaqError::out_of_range(
                "LED intensity",
                f64::from(intensity),
                f64::from(min),
                f64::from(max),
            ));
        }
        let code = mode.led_code()?;
        exchange
            .send(
                &Command::with_parameter(b'i', format!("L{code}{intensity:02}")),
                true,
            )
            .await?;
        Ok(())
    }

    /// Switch the imaging LED off.
    pub async fn led_off(&self) -> AppResult<()> {
        self.transport
            .send(&Command::with_parameter(b'i', "L0001"), true)
            .await?;
        Ok(())
    }

    /// Move the objective under a well. Indices are those of the plate grid.
    pub async fn select_well(&self, row: u8, column: u8) -> AppResult<()> {
        for (name, index) in [("row", row), ("column", column)] {
            if index > MAX_WELL_INDEX {
                return Err(DaqError::out_of_range(
                    name,
                    f64::from(index),
                    0.0,
                    f64::from(MAX_WELL_INDEX),
                ));
            }
        }

        let mut state = self.state.lock().await;
        if state.well == Some((row, column)) {
            debug!(row, column, "Well already selected");
            return Ok(());
        }

        let mut exchange = self.transport.lock().await;
        exchange
            .send(&Command::with_parameter(b'Y', "Z1260101000000000000"), true)
            .await?;
        exchange
            .send(
                &Command::with_parameter(b'Y', format!("W6{row:02}{column:02}")),
                true,
            )
            .await?;
        state.well = Some((row, column));
        Ok(())
    }

    /// Switch the optical path: LED off, filter sequence, LED back on.
    pub async fn set_imaging_mode(&self, mode: ImagingMode) -> AppResult<()> {
        self.camera()?;
        let mut state = self.state.lock().await;
        if state.imaging_mode == Some(mode) {
            debug!(?mode, "Imaging mode already set");
            return Ok(());
        }
        let filters = mode.filter_commands()?;

        let mut exchange = self.transport.lock().await;
        exchange
            .send(&Command::with_parameter(b'i', "L0001"), true)
            .await?;
        for command in &filters {
            exchange.send(command, true).await?;
        }
        state.imaging_mode = Some(mode);
        Self::send_led_on(&mut exchange, mode, self.settings.imaging.led_intensity).await?;
        info!(?mode, "Imaging mode set");
        Ok(())
    }

    /// Move the objective to `position`.
    ///
    /// Accepts 0 to 9.39 mm. The upper bound comes from the 5-digit motor
    /// field, not from the optics. `FocalPosition::Auto` is not supported.
    pub async fn set_focus(&self, position: FocalPosition) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.focal_position == Some(position) {
            debug!(?position, "Focus already set");
            return Ok(());
        }
        let focal_mm = match position {
            FocalPosition::Millimeters(mm) => mm,
            FocalPosition::Auto => {
                return Err(DaqError::FeatureIncomplete(
                    "auto focus".to_string(),
                    "Pass a focal position in millimetres.".to_string(),
                ))
            }
        };
        let motor = imaging::focus_motor_code(focal_mm)?;

        let mut exchange = self.transport.lock().await;
        exchange
            .send(&Command::with_parameter(b'Y', "Z1560101000000000000"), true)
            .await?;
        exchange
            .send(&Command::with_parameter(b'i', format!("F50{motor:05}")), true)
            .await?;
        state.focal_position = Some(position);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Camera
    // ---------------------------------------------------------------------

    /// Pick, initialise and configure the camera.
    ///
    /// Uses the candidate whose serial matches `imaging.camera_serial` when one is
    /// configured, otherwise the first candidate.
    pub async fn attach_camera(&mut self, candidates: Vec<Arc<dyn Camera>>) -> AppResult<()> {
        let wanted = self.settings.imaging.camera_serial.as_deref();
        let camera = match wanted {
            Some(serial) => candidates
                .iter()
                .find(|c| c.serial_number() == serial)
                .or_else(|| candidates.first()),
            None => candidates.first(),
        }
        .cloned()
        .ok_or(DaqError::NotInitialized("camera"))?;

        camera.initialize().await?;
        camera.configure_software_trigger().await?;
        info!(serial = %camera.serial_number(), "Camera attached");
        self.camera = Some(camera);
        Ok(())
    }

    /// Set the camera's auto-exposure mode.
    pub async fn set_auto_exposure(&self, mode: AutoExposure) -> AppResult<()> {
        self.camera()?.set_auto_exposure(mode).await
    }

    /// Set the integration time (milliseconds) or enable continuous auto exposure.
    pub async fn set_exposure(&self, exposure: Exposure) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.exposure == Some(exposure) {
            debug!(?exposure, "Exposure already set");
            return Ok(());
        }
        let camera = self.camera()?;

        match exposure {
            Exposure::Auto => camera.set_auto_exposure(AutoExposure::Continuous).await?,
            Exposure::Millis(ms) => {
                let exposure_us = (ms * 1000.0).trunc();
                let (min, max) = camera.exposure_limits_us().await?;
                if !(min..=max).contains(&exposure_us) {
                    return Err(DaqError::out_of_range("exposure (us)", exposure_us, min, max));
                }
                camera.set_auto_exposure(AutoExposure::Off).await?;
                camera.set_exposure_time_us(exposure_us).await?;
            }
        }
        state.exposure = Some(exposure);
        Ok(())
    }

    /// Set the gain or enable continuous auto gain.
    pub async fn set_gain(&self, gain: Gain) -> AppResult<()> {
        let camera = self.camera()?;
        let mut state = self.state.lock().await;
        if state.gain == Some(gain) {
            debug!(?gain, "Gain already set");
            return Ok(());
        }

        match gain {
            Gain::Auto => camera.set_auto_gain(true).await?,
            Gain::Value(value) => {
                let (min, max) = imaging::GAIN_RANGE;
                if !(min..=max).contains(&value) {
                    return Err(DaqError::out_of_range("gain", value, min, max));
                }
                let (min, max) = camera.gain_limits().await?;
                if !(min..=max).contains(&value) {
                    return Err(DaqError::out_of_range("gain", value, min, max));
                }
                camera.set_auto_gain(false).await?;
                camera.set_gain(value).await?;
            }
        }
        state.gain = Some(gain);
        Ok(())
    }

    /// Apply every setting of `request`, then acquire one image.
    pub async fn capture(&self, request: CaptureRequest) -> AppResult<ImageMatrix> {
        let camera = self.camera()?.clone();

        self.select_well(request.row, request.column).await?;
        self.set_imaging_mode(request.mode).await?;
        self.set_exposure(request.exposure).await?;
        self.set_focus(request.focal_position).await?;
        self.set_gain(request.gain).await?;

        let options = AcquisitionOptions {
            processing: request.processing,
            format: request.format,
            ..AcquisitionOptions::from(&self.settings.imaging)
        };
        acquire_image(camera.as_ref(), &options).await
    }

    /// Stop shaking and release the camera.
    pub async fn shutdown(&mut self) -> AppResult<()> {
        info!("Shutting down Cytation 5");
        if let Err(e) = self.stop_shaking().await {
            warn!(error = %e, "Failed to stop shaking during shutdown");
        }
        if let Some(camera) = self.camera.take() {
            camera.deinitialize().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockChannel, MockHandle};
    use crate::hardware::mock::MockCamera;

    fn responder(written: &[u8]) -> Vec<u8> {
        match written {
            b"C" => b"\x0612345678 09 extra\x03".to_vec(),
            b"e" => b"\x061320200 Version 1.04 0000 extra fields\x03".to_vec(),
            b"h" => b"\x062350000\x03".to_vec(),
            b"x" => Vec::new(),
            [_] => b"\x06".to_vec(),
            _ => b"\x03".to_vec(),
        }
    }

    fn reader() -> (Cytation5, MockHandle) {
        let (channel, handle) = MockChannel::with_responder(responder);
        (Cytation5::new(channel, Settings::default()), handle)
    }

    fn candidates(cameras: &[&Arc<MockCamera>]) -> Vec<Arc<dyn Camera>> {
        cameras
            .iter()
            .map(|&camera| camera.clone() as Arc<dyn Camera>)
            .collect()
    }

    async fn reader_with_camera() -> (Cytation5, MockHandle, Arc<MockCamera>) {
        let (mut reader, handle) = reader();
        let camera = Arc::new(MockCamera::new("18126491"));
        reader.attach_camera(candidates(&[&camera])).await.unwrap();
        (reader, handle, camera)
    }

    #[tokio::test]
    async fn test_device_info_parsing() {
        let (reader, _handle) = reader();
        assert_eq!(reader.get_serial_number().await.unwrap(), "12345678");
        assert_eq!(
            reader.get_firmware_version().await.unwrap(),
            "1320200 Version 1.04 0000"
        );
        assert!((reader.get_current_temperature().await.unwrap() - 23.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_focus_is_sent_once() {
        let (reader, handle) = reader();
        reader
            .set_focus(FocalPosition::Millimeters(1.0))
            .await
            .unwrap();
        reader
            .set_focus(FocalPosition::Millimeters(1.0))
            .await
            .unwrap();

        assert_eq!(handle.count_writes(b"Z1560101000000000000"), 1);
        assert_eq!(handle.count_writes(b"F5010640"), 1);
    }

    #[tokio::test]
    async fn test_auto_focus_is_incomplete() {
        let (reader, handle) = reader();
        let err = reader.set_focus(FocalPosition::Auto).await.unwrap_err();
        assert!(matches!(err, DaqError::FeatureIncomplete(..)));
        assert_eq!(handle.write_count(), 0);
    }

    #[tokio::test]
    async fn test_led_on_requires_mode() {
        let (reader, handle) = reader();
        assert!(reader.led_on(5).await.unwrap_err().is_validation());
        assert_eq!(handle.write_count(), 0);
    }

    #[tokio::test]
    async fn test_imaging_mode_switch_sequence() {
        let (reader, handle, _camera) = reader_with_camera().await;
        reader.set_imaging_mode(ImagingMode::Gfp).await.unwrap();

        let params: Vec<Vec<u8>> = handle
            .writes()
            .into_iter()
            .filter(|w| w.len() > 1)
            .collect();
        let expected = vec![b"L0001", b"P1101", b"P0d02", b"P1001", b"L0210"];
        assert_eq!(params, expected);

        reader.set_imaging_mode(ImagingMode::Gfp).await.unwrap();
        assert_eq!(handle.count_writes(b"L0210"), 1);
    }

    #[tokio::test]
    async fn test_imaging_mode_requires_camera() {
        let (reader, handle) = reader();
        let err = reader
            .set_imaging_mode(ImagingMode::Brightfield)
            .await
            .unwrap_err();
        assert!(matches!(err, DaqError::NotInitialized("camera")));
        assert_eq!(handle.write_count(), 0);
    }

    #[tokio::test]
    async fn test_gain_limits_and_cache() {
        let (reader, _handle, camera) = reader_with_camera().await;
        assert!(reader.set_gain(Gain::Value(31.0)).await.unwrap_err().is_validation());

        reader.set_gain(Gain::Value(12.0)).await.unwrap();
        reader.set_gain(Gain::Value(12.0)).await.unwrap();
        reader.set_gain(Gain::Auto).await.unwrap();
        assert_eq!(camera.gains(), vec![12.0]);
        assert_eq!(camera.auto_gain_settings(), vec![false, true]);
    }

    #[tokio::test]
    async fn test_exposure_written_in_microseconds() {
        let (reader, _handle, camera) = reader_with_camera().await;
        reader.set_exposure(Exposure::Millis(1.5)).await.unwrap();
        assert_eq!(camera.exposures_us(), vec![1500.0]);
        assert_eq!(camera.auto_exposure_modes(), vec![AutoExposure::Off]);

        let err = reader
            .set_exposure(Exposure::Millis(0.001))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_attach_camera_prefers_configured_serial() {
        let (channel, _handle) = MockChannel::silent();
        let mut settings = Settings::default();
        settings.imaging.camera_serial = Some("B".to_string());
        let mut reader = Cytation5::new(channel, settings);

        let a = Arc::new(MockCamera::new("A"));
        let b = Arc::new(MockCamera::new("B"));
        reader.attach_camera(candidates(&[&a, &b])).await.unwrap();
        assert!(!a.is_initialized());
        assert!(b.is_initialized());
        assert!(b.is_trigger_configured());
    }

    #[tokio::test]
    async fn test_attach_camera_without_candidates() {
        let (channel, _handle) = MockChannel::silent();
        let mut reader = Cytation5::new(channel, Settings::default());
        let err = reader.attach_camera(Vec::new()).await.unwrap_err();
        assert!(matches!(err, DaqError::NotInitialized("camera")));
    }

    #[tokio::test]
    async fn test_shutdown_releases_camera() {
        let (mut reader, _handle, camera) = reader_with_camera().await;
        reader.shutdown().await.unwrap();
        assert!(!camera.is_initialized());
        assert!(!reader.has_camera());
    }
}
