//! BPM estimation from a window of valid PPG samples
//!
//! Pipeline per computation:
//! 1. Resample the timestamped window onto a uniform grid
//! 2. Detrend (linear fit, then centred moving average)
//! 3. Periodicity search restricted to the plausible heart-rate band
//!    (spectral peak or autocorrelation lag)
//! 4. Plausibility / confidence gating
//! 5. Rate-limited exponential smoothing against the previous estimate

use crate::config::{EstimatorConfig, PeriodicityMethod};
use crate::dsp::{
    autocorrelation, detrend_linear, find_autocorr_peak, find_spectral_peak,
    remove_moving_average, resample_uniform, std,
};
use crate::sample::{us_to_sec, Sample};
use rustfft::FftPlanner;

/// Heart-rate estimate as handed to callers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpmEstimate {
    /// Rounded beats per minute (0 before the first accepted estimate)
    pub value: u32,
    /// Smoothed beats per minute
    pub bpm: f32,
    /// Confidence of the last accepted raw estimate (0-1)
    pub confidence: f32,
    /// Whether `value` can be trusted
    pub ready: bool,
    /// Engine time of the last accepted estimate
    pub computed_at_us: Option<i64>,
}

impl BpmEstimate {
    /// Estimate before any accepted computation
    pub const fn not_ready() -> Self {
        Self {
            value: 0,
            bpm: 0.0,
            confidence: 0.0,
            ready: false,
            computed_at_us: None,
        }
    }

    /// `Some(bpm)` only when ready
    pub fn ready_value(&self) -> Option<u32> {
        if self.ready {
            Some(self.value)
        } else {
            None
        }
    }
}

impl Default for BpmEstimate {
    fn default() -> Self {
        Self::not_ready()
    }
}

/// Unsmoothed periodicity result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEstimate {
    pub bpm: f32,
    pub confidence: f32,
}

/// Accepted, smoothed estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptedEstimate {
    pub bpm: f32,
    pub raw_bpm: f32,
    pub confidence: f32,
}

/// Why a computation produced no new estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Window shorter than the minimum analysis duration
    InsufficientHistory { covered_sec: f32 },
    /// No variation left after detrending
    Flat,
    /// No periodic component found in the band
    NoPeak,
    /// Periodic component too weak
    LowConfidence { confidence: f32 },
    /// Raw estimate outside the plausible band
    OutOfBand { bpm: f32 },
}

/// Periodicity-based heart-rate estimator
pub struct BpmEstimator {
    config: EstimatorConfig,
    fft_planner: FftPlanner<f32>,
    smoothed: Option<f32>,
    consecutive_rejections: u32,
}

impl BpmEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            fft_planner: FftPlanner::new(),
            smoothed: None,
            consecutive_rejections: 0,
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Analyse a window and fold an accepted result into the smoothed state.
    ///
    /// On rejection the smoothed state is untouched.
    pub fn compute(&mut self, samples: &[Sample]) -> Result<AcceptedEstimate, Rejection> {
        match self.analyze(samples) {
            Ok(raw) => {
                self.consecutive_rejections = 0;
                let bpm = self.smooth(raw.bpm);
                Ok(AcceptedEstimate {
                    bpm,
                    raw_bpm: raw.bpm,
                    confidence: raw.confidence,
                })
            }
            Err(rejection) => {
                // Short history is expected while a run builds up
                if !matches!(rejection, Rejection::InsufficientHistory { .. }) {
                    self.consecutive_rejections = self.consecutive_rejections.saturating_add(1);
                }
                log::debug!(
                    "estimate rejected ({} in a row): {:?}",
                    self.consecutive_rejections,
                    rejection
                );
                Err(rejection)
            }
        }
    }

    /// Raw periodicity analysis without touching the smoothing state
    pub fn analyze(&mut self, samples: &[Sample]) -> Result<RawEstimate, Rejection> {
        let cfg = &self.config;

        let covered_us = match (samples.first(), samples.last()) {
            (Some(first), Some(last)) => last.timestamp_us.saturating_sub(first.timestamp_us),
            _ => 0,
        };
        let covered_sec = us_to_sec(covered_us);
        if covered_sec < cfg.min_analysis_window_sec {
            return Err(Rejection::InsufficientHistory { covered_sec });
        }

        let fs = cfg.resample_hz;
        let uniform = resample_uniform(samples, fs);
        let detrend_len = ((cfg.detrend_window_sec * fs).round() as usize).max(1) | 1;
        let signal = remove_moving_average(&detrend_linear(&uniform), detrend_len);

        if signal.len() < 32 || std(&signal) < cfg.flat_epsilon {
            return Err(Rejection::Flat);
        }

        let min_hz = cfg.min_bpm / 60.0;
        let max_hz = cfg.max_bpm / 60.0;

        let raw = match cfg.method {
            PeriodicityMethod::Spectral => {
                let peak = find_spectral_peak(&mut self.fft_planner, &signal, fs, min_hz, max_hz)
                    .ok_or(Rejection::NoPeak)?;
                // Map SNR [-5, 10] dB to confidence [0, 1]
                let confidence = ((peak.snr_db + 5.0) / 15.0).clamp(0.0, 1.0);
                RawEstimate {
                    bpm: peak.freq_hz * 60.0,
                    confidence,
                }
            }
            PeriodicityMethod::Autocorrelation => {
                let acf = autocorrelation(&mut self.fft_planner, &signal);
                let min_lag = (fs / max_hz).floor() as usize;
                let max_lag = (fs / min_hz).ceil() as usize;
                let peak = find_autocorr_peak(&acf, min_lag, max_lag).ok_or(Rejection::NoPeak)?;
                if peak.lag <= 0.0 {
                    return Err(Rejection::NoPeak);
                }
                RawEstimate {
                    bpm: 60.0 * fs / peak.lag,
                    confidence: peak.correlation.clamp(0.0, 1.0),
                }
            }
        };

        if !raw.bpm.is_finite() || raw.bpm < cfg.min_bpm || raw.bpm > cfg.max_bpm {
            return Err(Rejection::OutOfBand { bpm: raw.bpm });
        }
        if raw.confidence < cfg.min_confidence {
            return Err(Rejection::LowConfidence {
                confidence: raw.confidence,
            });
        }
        Ok(raw)
    }

    /// Move toward `raw` by `alpha * (raw - prev)`, capped at `max_step_bpm`.
    pub(crate) fn smooth(&mut self, raw: f32) -> f32 {
        let next = match self.smoothed {
            None => raw,
            Some(prev) => {
                let cap = self.config.max_step_bpm;
                let step = (self.config.smoothing_alpha * (raw - prev)).clamp(-cap, cap);
                prev + step
            }
        };
        self.smoothed = Some(next);
        next
    }

    /// Current smoothed value, if any estimate was accepted since the last invalidation
    pub fn smoothed_bpm(&self) -> Option<f32> {
        self.smoothed
    }

    pub fn consecutive_rejections(&self) -> u32 {
        self.consecutive_rejections
    }

    /// Drop the smoothing history (context discontinuity)
    pub fn invalidate(&mut self) {
        self.smoothed = None;
        self.consecutive_rejections = 0;
    }
}
