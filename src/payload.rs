//! Command payload builders
//!
//! Pure functions that turn typed measurement parameters into the parameter
//! strings the instrument expects. Bodies are fixed-width digit templates with
//! zero-padded fields substituted at fixed offsets, followed by a two-digit
//! checksum and ETX.
//!
//! Checksum: `(sum of the ASCII bytes of the body + offset) mod 100`, rendered as
//! two digits. The per-family offsets were recovered from captured traffic of the
//! vendor software and have no known derivation. They are part of the wire
//! contract and must not be "corrected".
//!
//! Every builder checks its bounds first and never clamps.

use crate::error::{AppResult, DaqError};
use std::time::Duration;

/// Checksum offset for absorbance bodies.
pub const ABSORBANCE_CHECKSUM_OFFSET: u32 = 0;
/// Checksum offset for fluorescence bodies. Empirical, see module docs.
pub const FLUORESCENCE_CHECKSUM_OFFSET: u32 = 7;
/// Checksum offset for shake bodies. Empirical, see module docs.
pub const SHAKE_CHECKSUM_OFFSET: u32 = 73;

/// Parameter for the `y` command that precedes every plate read.
pub const READ_PRIMING: &str = "08120112207434014351135308559127881772\x03";
/// Parameter for the `y` command that precedes a shake.
pub const SHAKE_PRIMING: &str = "08120112207434014351135308559127881422\x03";

/// Luminescence read body. Its trailing digits are already a checksum and the
/// instrument accepts it without ETX.
pub const LUMINESCENCE_BODY: &str =
    "008401010108120001200100001100100000123000500200200-001000-00300000000000000000001351092";

/// Absorbance wavelengths in nanometres.
pub const ABSORBANCE_WAVELENGTH_RANGE: (u32, u32) = (230, 999);
/// Excitation and emission wavelengths in nanometres.
pub const FLUORESCENCE_WAVELENGTH_RANGE: (u32, u32) = (250, 700);
/// Focal height range in millimetres.
pub const FOCAL_HEIGHT_RANGE: (f64, f64) = (4.5, 13.88);
/// The shake duration field is three digits of seconds.
pub const MAX_SHAKE_SECONDS: u64 = 999;

/// Shake motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShakeType {
    /// Back and forth along one axis.
    Linear = 0,
    /// Circular motion.
    Orbital = 1,
}

impl ShakeType {
    fn bit(self) -> u8 {
        self as u8
    }
}

/// `(sum(body) + offset) mod 100` as two digits.
pub fn checksum(body: &str, offset: u32) -> String {
    let sum: u32 = body.bytes().map(u32::from).sum();
    format!("{:02}", (sum + offset) % 100)
}

fn seal(body: String, offset: u32) -> String {
    let checksum = checksum(&body, offset);
    format!("{body}{checksum}\x03")
}

fn check_wavelength(parameter: &'static str, nm: u32, (min, max): (u32, u32)) -> AppResult<()> {
    if !(min..=max).contains(&nm) {
        return Err(DaqError::out_of_range(
            parameter,
            f64::from(nm),
            f64::from(min),
            f64::from(max),
        ));
    }
    Ok(())
}

pub(crate) fn check_focal_height(mm: f64) -> AppResult<()> {
    let (min, max) = FOCAL_HEIGHT_RANGE;
    if !(min..=max).contains(&mm) {
        return Err(DaqError::out_of_range("focal height", mm, min, max));
    }
    Ok(())
}

/// Body of the `D` command for an absorbance read.
pub fn absorbance_body(wavelength_nm: u32) -> AppResult<String> {
    check_wavelength("wavelength", wavelength_nm, ABSORBANCE_WAVELENGTH_RANGE)?;
    let body = format!("00470101010812000120010000110010000010600008{wavelength_nm:04}1");
    Ok(seal(body, ABSORBANCE_CHECKSUM_OFFSET))
}

fn focal_micrometres(focal_height_mm: f64) -> u32 {
    // Bounds were checked, so the truncation is in range.
    (1000.0 * focal_height_mm) as u32
}

/// Parameter of the `t` command that sets the luminescence read height.
pub fn luminescence_focus(focal_height_mm: f64) -> AppResult<String> {
    check_focal_height(focal_height_mm)?;
    Ok(format!("3{}\x03", 14220 + focal_micrometres(focal_height_mm)))
}

/// Parameter of the `t` command that sets the fluorescence read height.
pub fn fluorescence_focus(focal_height_mm: f64) -> AppResult<String> {
    check_focal_height(focal_height_mm)?;
    Ok(format!("{}\x03", 614220 + focal_micrometres(focal_height_mm)))
}

/// Body of the `D` command for a fluorescence read.
pub fn fluorescence_body(excitation_nm: u32, emission_nm: u32) -> AppResult<String> {
    check_wavelength("excitation wavelength", excitation_nm, FLUORESCENCE_WAVELENGTH_RANGE)?;
    check_wavelength("emission wavelength", emission_nm, FLUORESCENCE_WAVELENGTH_RANGE)?;
    let body = format!(
        "008401010108120001200100001100100000135000100200200{excitation_nm:04}000\
         {emission_nm:04}000000000000000000210011"
    );
    Ok(seal(body, FLUORESCENCE_CHECKSUM_OFFSET))
}

/// Body of the `D` command that shakes for `duration`.
pub fn shake_body(shake_type: ShakeType, duration: Duration) -> AppResult<String> {
    let seconds = duration.as_secs();
    if seconds == 0 || seconds > MAX_SHAKE_SECONDS {
        return Err(DaqError::out_of_range(
            "shake duration (s)",
            seconds as f64,
            1.0,
            MAX_SHAKE_SECONDS as f64,
        ));
    }
    let body = format!(
        "0033010101010100002000000013{seconds:03}{}301",
        shake_type.bit()
    );
    Ok(seal(body, SHAKE_CHECKSUM_OFFSET))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIXTEEN_MINUTES: Duration = Duration::from_secs(16 * 60);

    #[test]
    fn test_checksum_is_two_digits() {
        // 0x03 + 0x04 = 7
        assert_eq!(checksum("\x03\x04", 0), "07");
        assert_eq!(checksum("\x03\x04", 95), "02");
    }

    #[test]
    fn test_absorbance_body_500nm() {
        let body = absorbance_body(500).unwrap();
        assert_eq!(
            body,
            "004701010108120001200100001100100000106000080500105\x03"
        );
        let digits = &body[..body.len() - 3];
        let expected = digits.bytes().map(u32::from).sum::<u32>() % 100;
        assert_eq!(&body[body.len() - 3..body.len() - 1], format!("{expected:02}"));
    }

    #[test]
    fn test_absorbance_bounds() {
        assert!(absorbance_body(230).is_ok());
        assert!(absorbance_body(999).is_ok());
        for nm in [0, 229, 1000] {
            let err = absorbance_body(nm).unwrap_err();
            assert!(matches!(
                err,
                DaqError::OutOfRange {
                    parameter: "wavelength",
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_fluorescence_body_uses_offset_7() {
        let body = fluorescence_body(485, 528).unwrap();
        assert!(body.starts_with("008401010108120001200100001100100000135000100200200048500005280"));
        assert!(body.ends_with("21001119\x03"));
    }

    #[test]
    fn test_fluorescence_bounds_name_the_parameter() {
        let err = fluorescence_body(249, 528).unwrap_err();
        assert!(err.to_string().starts_with("excitation wavelength"));
        let err = fluorescence_body(485, 701).unwrap_err();
        assert!(err.to_string().starts_with("emission wavelength"));
    }

    #[test]
    fn test_shake_body_uses_offset_73() {
        assert_eq!(
            shake_body(ShakeType::Linear, SIXTEEN_MINUTES).unwrap(),
            "0033010101010100002000000013960030189\x03"
        );
        assert_eq!(
            shake_body(ShakeType::Orbital, SIXTEEN_MINUTES).unwrap(),
            "0033010101010100002000000013960130190\x03"
        );
    }

    #[test]
    fn test_shake_duration_must_fit_field() {
        assert!(shake_body(ShakeType::Linear, Duration::from_secs(1000)).is_err());
        assert!(shake_body(ShakeType::Linear, Duration::ZERO).is_err());
    }

    #[test]
    fn test_focus_encodings() {
        assert_eq!(luminescence_focus(7.0).unwrap(), "321220\x03");
        assert_eq!(luminescence_focus(4.5).unwrap(), "318720\x03");
        assert_eq!(fluorescence_focus(13.88).unwrap(), "628100\x03");
    }

    #[test]
    fn test_focus_bounds_are_not_clamped() {
        assert!(luminescence_focus(4.49).is_err());
        assert!(luminescence_focus(13.89).is_err());
        assert!(fluorescence_focus(f64::NAN).is_err());
    }
}
