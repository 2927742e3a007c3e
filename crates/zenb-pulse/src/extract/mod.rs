//! Frame-side helpers for hosts that hand raw frames to the crate
//!
//! - `roi` - ROI mean color and per-frame channel samples
//! - `finger` - fingertip placement from ROI color

pub mod finger;
pub mod roi;

pub use finger::{FingerDetector, FingerDetectorConfig, FingerStatus};
pub use roi::{extract_roi_mean_rgb, ColorChannel, ColorSampleExtractor, Roi};
