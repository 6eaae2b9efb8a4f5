//! Imaging hardware
//!
//! - [`capabilities`]: the [`Camera`] trait the imaging SDK is driven through
//! - [`acquisition`]: trigger-and-fetch retry loop
//! - [`mock`]: simulated camera for tests

pub mod acquisition;
pub mod capabilities;
pub mod mock;

pub use acquisition::{acquire_image, AcquisitionOptions};
pub use capabilities::{AutoExposure, Camera, ColorProcessing, Frame, ImageMatrix, PixelFormat};
