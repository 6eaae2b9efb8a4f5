//! Imaging modes and optics settings
//!
//! Each imaging mode maps to an LED code and a fixed sequence of filter-cube
//! commands. The mapping is a closed table over [`ImagingMode`].

use crate::error::{AppResult, DaqError};
use crate::transport::Command;
use serde::{Deserialize, Serialize};

/// Optical path used for imaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImagingMode {
    /// Transmitted white light.
    Brightfield,
    /// Phase contrast.
    PhaseContrast,
    /// GFP fluorescence cube.
    Gfp,
    /// Texas Red fluorescence cube.
    TexasRed,
    /// Cycles through several filters; not supported yet
    ColorBrightfield,
}

/// One step of a filter sequence: command code and parameter.
type FilterStep = (u8, &'static str);

const BRIGHTFIELD_FILTERS: &[FilterStep] = &[
    (b'Y', "Z1500000000000000000"),
    (b'i', "F5000000"), // reset focus
    (b'i', "W000000"),  // reset well selection
    (b'Y', "P1101"),
    (b'Y', "P0d05"),
    (b'Y', "P1002"),
];
const PHASE_CONTRAST_FILTERS: &[FilterStep] =
    &[(b'Y', "P1120"), (b'Y', "P0d05"), (b'Y', "P1002")];
const GFP_FILTERS: &[FilterStep] = &[(b'Y', "P1101"), (b'Y', "P0d02"), (b'Y', "P1001")];
const TEXAS_RED_FILTERS: &[FilterStep] = &[(b'Y', "P1101"), (b'Y', "P0d03"), (b'Y', "P1001")];

fn color_brightfield_unsupported() -> DaqError {
    DaqError::FeatureIncomplete(
        "color brightfield".to_string(),
        "The filter switching sequence has not been characterised.".to_string(),
    )
}

impl ImagingMode {
    /// LED channel code used by the `L` command.
    pub fn led_code(self) -> AppResult<&'static str> {
        match self {
            ImagingMode::Brightfield => Ok("05"),
            ImagingMode::Gfp => Ok("02"),
            ImagingMode::TexasRed => Ok("03"),
            ImagingMode::PhaseContrast => Ok("07"),
            ImagingMode::ColorBrightfield => Err(color_brightfield_unsupported()),
        }
    }

    /// Commands that move the filter cube into place for this mode.
    pub fn filter_commands(self) -> AppResult<Vec<Command>> {
        let steps = match self {
            ImagingMode::Brightfield => BRIGHTFIELD_FILTERS,
            ImagingMode::PhaseContrast => PHASE_CONTRAST_FILTERS,
            ImagingMode::Gfp => GFP_FILTERS,
            ImagingMode::TexasRed => TEXAS_RED_FILTERS,
            ImagingMode::ColorBrightfield => return Err(color_brightfield_unsupported()),
        };
        Ok(steps
            .iter()
            .map(|&(code, parameter)| Command::with_parameter(code, parameter))
            .collect())
    }
}

/// Camera integration time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exposure {
    /// Camera-controlled exposure
    Auto,
    /// Milliseconds
    Millis(f64),
}

/// Camera gain, in the SDK's (unspecified) units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gain {
    /// Camera-controlled gain
    Auto,
    /// Fixed gain
    Value(f64),
}

/// Objective focal position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocalPosition {
    /// Instrument autofocus
    Auto,
    /// Position in millimetres
    Millimeters(f64),
}

/// Gain range accepted before the camera's own limits are consulted.
pub const GAIN_RANGE: (f64, f64) = (0.0, 30.0);

/// Focus positions whose motor code fits the 5-digit field of the `F50` command.
///
/// The upper bound is the field width, not a limit of the optics: 9.39 mm
/// encodes to 99901 and 9.40 mm would need a sixth digit.
pub const FOCUS_RANGE_MM: (f64, f64) = (0.0, 9.39);

// Vendor software shows millimetres, the motor takes a count. Fitted linear
// relation between the two (R^2 = 0.999999999).
const FOCUS_SLOPE: f64 = 10.637991436186072;
const FOCUS_INTERCEPT: f64 = 1.0243013203461762;

/// Motor count sent for a focal position in millimetres.
pub fn focus_motor_code(focal_mm: f64) -> AppResult<u32> {
    let (min, max) = FOCUS_RANGE_MM;
    if !(min..=max).contains(&focal_mm) {
        return Err(DaqError::out_of_range("focal position", focal_mm, min, max));
    }
    Ok((focal_mm + FOCUS_INTERCEPT + FOCUS_SLOPE * focal_mm * 1000.0) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_led_codes() {
        assert_eq!(ImagingMode::Brightfield.led_code().unwrap(), "05");
        assert_eq!(ImagingMode::Gfp.led_code().unwrap(), "02");
        assert_eq!(ImagingMode::TexasRed.led_code().unwrap(), "03");
        assert_eq!(ImagingMode::PhaseContrast.led_code().unwrap(), "07");
        assert!(ImagingMode::ColorBrightfield.led_code().is_err());
    }

    #[test]
    fn test_gfp_filter_sequence() {
        let commands = ImagingMode::Gfp.filter_commands().unwrap();
        let params: Vec<_> = commands.iter().filter_map(Command::parameter).collect();
        assert_eq!(params, vec!["P1101", "P0d02", "P1001"]);
        assert!(commands.iter().all(|c| c.code() == b'Y'));
    }

    #[test]
    fn test_brightfield_resets_focus_and_selection() {
        let commands = ImagingMode::Brightfield.filter_commands().unwrap();
        assert_eq!(commands.len(), 6);
        assert_eq!(commands[1], Command::with_parameter(b'i', "F5000000"));
        assert_eq!(commands[2], Command::with_parameter(b'i', "W000000"));
    }

    #[test]
    fn test_focus_motor_code() {
        assert_eq!(focus_motor_code(1.0).unwrap(), 10640);
        assert_eq!(focus_motor_code(3.2).unwrap(), 34045);
        assert!(focus_motor_code(-0.1).is_err());
        assert!(focus_motor_code(9.4).is_err());
    }

    #[test]
    fn test_focus_bound_is_field_width() {
        let (min, max) = FOCUS_RANGE_MM;
        assert_eq!(format!("{:05}", focus_motor_code(min).unwrap()).len(), 5);
        assert_eq!(format!("{:05}", focus_motor_code(max).unwrap()).len(), 5);
        // Just past the bound the count no longer fits.
        let next = 9.40;
        assert!((next + FOCUS_INTERCEPT + FOCUS_SLOPE * next * 1000.0) as u32 > 99_999);
        assert!(matches!(
            focus_motor_code(next).unwrap_err(),
            DaqError::OutOfRange { max, .. } if max == 9.39
        ));
    }
}
