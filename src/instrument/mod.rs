//! Instrument drivers
//!
//! - [`cytation5`]: the plate reader driver and its settings cache
//! - [`imaging`]: imaging modes and the mode to LED/filter table
//! - [`shake`]: background task that keeps the plate shaking

pub mod cytation5;
pub mod imaging;
pub mod shake;

pub use cytation5::{CaptureRequest, Cytation5, InstrumentState};
pub use imaging::{Exposure, FocalPosition, Gain, ImagingMode};
pub use shake::ShakeSession;
