//! DSP (Digital Signal Processing) module
//!
//! Signal conditioning and periodicity search used by the BPM estimator.
//!
//! - `spectral` - resampling, detrending, windowed FFT peak search
//! - `autocorr` - autocorrelation period search

pub mod autocorr;
pub mod spectral;

pub use autocorr::{autocorrelation, find_autocorr_peak, AutocorrPeak};
pub use spectral::{
    detrend_linear, find_spectral_peak, hamming_window, remove_moving_average, resample_uniform,
    std, SpectralPeak,
};
