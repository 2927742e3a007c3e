//! # zenb-pulse
//!
//! Heart rate from a live fingertip or face video via photoplethysmography.
//!
//! This crate provides:
//! - **SignalRingBuffer**: 20 s duration-bounded window of color samples
//! - **SignalValidityGate**: coverage / level / variance gating of the signal
//! - **BpmEstimator**: detrended spectral or autocorrelation heart-rate search
//!   with rate-limited smoothing
//! - **PpgEngine**: per-frame `submit_sample`, 1 Hz `tick`, `reset`
//! - **SharedPpgEngine**: the same engine behind a single writer lock
//!
//! ## Example
//!
//! ```ignore
//! use zenb_pulse::{PpgEngine, Sample};
//!
//! let mut engine = PpgEngine::new();
//!
//! // Every camera frame: mean red over the fingertip ROI, 0-255
//! engine.submit_sample(Sample::from_byte(frame.timestamp_us, frame.red_mean));
//!
//! // Once a second
//! let estimate = engine.tick();
//! match estimate.ready_value() {
//!     Some(bpm) => println!("BPM: {}", bpm),
//!     None => println!("{:?}", engine.guidance()),
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod estimator;
pub mod extract;
pub mod gate;
pub mod sample;
pub mod shared;

#[cfg(test)]
mod tests_config;
#[cfg(test)]
mod tests_proptest;

pub use buffer::{SignalRingBuffer, SpanStats};
pub use config::{
    BufferConfig, ConfigError, EstimatorConfig, GateConfig, PeriodicityMethod, PulseConfig,
};
pub use engine::{Guidance, PpgEngine};
pub use estimator::{AcceptedEstimate, BpmEstimate, BpmEstimator, RawEstimate, Rejection};
pub use extract::{ColorChannel, ColorSampleExtractor, FingerDetector, Roi};
pub use gate::{GateFailure, SignalValidityGate, ValidityState};
pub use sample::{FrameObservation, Sample};
pub use shared::{Published, SharedPpgEngine};
