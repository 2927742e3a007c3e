//! Signal validity gate
//!
//! Decides per frame whether the incoming samples look like a skin-contact
//! PPG signal. Driven by frame coverage, recent level and variance, and an
//! optional external presence confidence.
//!
//! Failures drop straight to `NoSignal` without clearing the sample buffer
//! (soft decay); `NoSignal` is what suppresses estimation.

use crate::buffer::SpanStats;
use crate::config::GateConfig;
use crate::sample::sec_to_us;
use std::collections::VecDeque;

/// Whether the current signal is usable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidityState {
    /// No plausible signal (finger/face absent, dark, saturated, moving)
    NoSignal,
    /// Plausible signal, not yet stable for long enough
    Acquiring,
    /// Stable signal; estimation may run
    Valid,
}

impl Default for ValidityState {
    fn default() -> Self {
        Self::NoSignal
    }
}

/// Why the last evaluation did not pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateFailure {
    /// Too few frame attempts in the coverage window
    TooFewFrames,
    /// Frame stream stalled for longer than the coverage window
    FrameGap,
    /// Too many attempted frames without a usable sample
    Coverage,
    /// No samples available for level / variance checks
    NoSamples,
    /// Mean level dark or saturated
    Level,
    /// Variance below the noise floor
    Flat,
    /// Variance above the motion ceiling
    Motion,
    /// External detector reports nothing in frame
    Presence,
}

/// Validity state machine
#[derive(Debug, Clone)]
pub struct SignalValidityGate {
    config: GateConfig,
    coverage_window_us: i64,
    min_valid_us: i64,
    /// Frame attempts within the coverage window: (timestamp, produced sample)
    attempts: VecDeque<(i64, bool)>,
    covered: usize,
    last_attempt_us: Option<i64>,
    state: ValidityState,
    run_start_us: Option<i64>,
    no_signal_since_us: Option<i64>,
    last_valid_us: Option<i64>,
    presence: Option<f32>,
    last_failure: Option<GateFailure>,
}

impl SignalValidityGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            coverage_window_us: sec_to_us(config.coverage_window_sec).max(1),
            min_valid_us: sec_to_us(config.min_valid_duration_sec),
            config,
            attempts: VecDeque::new(),
            covered: 0,
            last_attempt_us: None,
            state: ValidityState::NoSignal,
            run_start_us: None,
            no_signal_since_us: None,
            last_valid_us: None,
            presence: None,
            last_failure: None,
        }
    }

    /// Fuse an external presence confidence (0..1) into later evaluations
    pub fn set_presence(&mut self, confidence: f32) {
        self.presence = if confidence.is_finite() {
            Some(confidence.clamp(0.0, 1.0))
        } else {
            None
        };
    }

    /// Evaluate one frame attempt.
    ///
    /// # Arguments
    /// * `timestamp_us` - Frame time
    /// * `covered` - Whether the frame produced a usable sample
    /// * `stats` - Level / variance of the recent buffered samples
    pub fn evaluate(
        &mut self,
        timestamp_us: i64,
        covered: bool,
        stats: Option<SpanStats>,
    ) -> ValidityState {
        let gap = self
            .last_attempt_us
            .map(|last| timestamp_us.saturating_sub(last) > self.coverage_window_us)
            .unwrap_or(false);
        if gap {
            self.attempts.clear();
            self.covered = 0;
        }
        self.last_attempt_us = Some(timestamp_us);

        self.attempts.push_back((timestamp_us, covered));
        if covered {
            self.covered += 1;
        }
        let cutoff = timestamp_us.saturating_sub(self.coverage_window_us);
        while let Some(&(ts, was_covered)) = self.attempts.front() {
            if ts >= cutoff {
                break;
            }
            self.attempts.pop_front();
            if was_covered {
                self.covered -= 1;
            }
        }

        let verdict = if gap {
            Err(GateFailure::FrameGap)
        } else {
            self.check(stats)
        };
        self.transition(timestamp_us, verdict);
        if self.state == ValidityState::Valid {
            self.last_valid_us = Some(timestamp_us);
        }
        self.state
    }

    fn check(&self, stats: Option<SpanStats>) -> Result<(), GateFailure> {
        let cfg = &self.config;

        if self.attempts.len() < cfg.min_frames {
            return Err(GateFailure::TooFewFrames);
        }
        if self.coverage_ratio() < cfg.min_coverage {
            return Err(GateFailure::Coverage);
        }
        if let Some(p) = self.presence {
            if p < cfg.min_presence {
                return Err(GateFailure::Presence);
            }
        }

        let stats = stats.ok_or(GateFailure::NoSamples)?;
        if stats.mean <= cfg.dark_level || stats.mean >= cfg.saturation_level {
            return Err(GateFailure::Level);
        }
        if stats.std < cfg.noise_floor {
            return Err(GateFailure::Flat);
        }
        if stats.std > cfg.motion_ceiling {
            return Err(GateFailure::Motion);
        }
        Ok(())
    }

    fn transition(&mut self, timestamp_us: i64, verdict: Result<(), GateFailure>) {
        let prev = self.state;
        match verdict {
            Err(failure) => {
                self.last_failure = Some(failure);
                if prev != ValidityState::NoSignal {
                    log::debug!("validity {:?} -> NoSignal ({:?})", prev, failure);
                    self.no_signal_since_us = Some(timestamp_us);
                } else if self.no_signal_since_us.is_none() {
                    self.no_signal_since_us = Some(timestamp_us);
                }
                self.state = ValidityState::NoSignal;
                self.run_start_us = None;
            }
            Ok(()) => {
                self.last_failure = None;
                match prev {
                    ValidityState::NoSignal => {
                        log::debug!("validity NoSignal -> Acquiring");
                        self.state = ValidityState::Acquiring;
                        self.run_start_us = Some(timestamp_us);
                        self.no_signal_since_us = None;
                        // A zero hold time promotes immediately
                        if self.min_valid_us == 0 {
                            self.state = ValidityState::Valid;
                        }
                    }
                    ValidityState::Acquiring => {
                        let start = self.run_start_us.unwrap_or(timestamp_us);
                        if timestamp_us.saturating_sub(start) >= self.min_valid_us {
                            log::debug!("validity Acquiring -> Valid");
                            self.state = ValidityState::Valid;
                        }
                    }
                    ValidityState::Valid => {}
                }
            }
        }
    }

    pub fn state(&self) -> ValidityState {
        self.state
    }

    /// Start of the current continuous good run, if any
    pub fn run_start_us(&self) -> Option<i64> {
        self.run_start_us
    }

    /// When the gate last entered `NoSignal`, if it is there now
    pub fn no_signal_since_us(&self) -> Option<i64> {
        self.no_signal_since_us
    }

    /// Newest frame evaluated in `Valid`, kept across failures until reset
    pub fn last_valid_us(&self) -> Option<i64> {
        self.last_valid_us
    }

    pub fn last_failure(&self) -> Option<GateFailure> {
        self.last_failure
    }

    /// Fraction of attempted frames in the coverage window that produced a sample
    pub fn coverage_ratio(&self) -> f32 {
        if self.attempts.is_empty() {
            0.0
        } else {
            self.covered as f32 / self.attempts.len() as f32
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}
