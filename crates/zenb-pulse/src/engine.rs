//! PPG engine: per-frame ingestion and once-per-second estimation
//!
//! Single-writer orchestrator. It owns the sample buffer, the validity gate,
//! the estimator and the latest estimate; all mutation goes through
//! `submit*`, `tick` and `reset`. Wrap in [`crate::SharedPpgEngine`] when
//! frames and ticks arrive on different threads.
//!
//! # Usage
//!
//! ```ignore
//! let mut engine = PpgEngine::new();
//!
//! // Every frame
//! engine.submit_sample(Sample::new(frame_ts_us, red_mean / 255.0));
//!
//! // Once per second
//! let estimate = engine.tick();
//! if let Some(bpm) = estimate.ready_value() {
//!     println!("{} BPM", bpm);
//! }
//! ```

use crate::buffer::SignalRingBuffer;
use crate::config::{ConfigError, PulseConfig};
use crate::estimator::{BpmEstimate, BpmEstimator, Rejection};
use crate::gate::{GateFailure, SignalValidityGate, ValidityState};
use crate::sample::{sanitize, sec_to_us, FrameObservation, Sample, Sanitized};

/// What the host UI should tell the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guidance {
    /// No usable signal: place a finger over camera and torch (or face in view)
    PlaceFinger,
    /// Signal found, waiting for it to settle
    HoldStill,
    /// Signal valid, first estimate not available yet
    Measuring,
    /// Trusted reading (BPM)
    Reading(u32),
}

/// Heart-rate engine
pub struct PpgEngine {
    config: PulseConfig,
    buffer: SignalRingBuffer,
    gate: SignalValidityGate,
    estimator: BpmEstimator,
    estimate: BpmEstimate,
    stats_window_us: i64,
    min_analysis_us: i64,
    /// Timestamp of the newest frame attempt (engine clock)
    clock_us: Option<i64>,
    /// Newest sample timestamp seen by the last estimator run
    last_analyzed_us: Option<i64>,
    last_rejection: Option<Rejection>,
}

impl PpgEngine {
    /// Create an engine with default configuration
    pub fn new() -> Self {
        Self::build(PulseConfig::default())
    }

    /// Create an engine with a validated custom configuration
    pub fn with_config(config: PulseConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: PulseConfig) -> Self {
        Self {
            buffer: SignalRingBuffer::new(config.buffer.window_sec),
            gate: SignalValidityGate::new(config.gate.clone()),
            estimator: BpmEstimator::new(config.estimator.clone()),
            estimate: BpmEstimate::not_ready(),
            stats_window_us: sec_to_us(config.gate.stats_window_sec),
            min_analysis_us: sec_to_us(config.estimator.min_analysis_window_sec),
            clock_us: None,
            last_analyzed_us: None,
            last_rejection: None,
            config,
        }
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    /// Record one frame's color sample
    pub fn submit_sample(&mut self, sample: Sample) {
        self.submit(FrameObservation::Sample(sample));
    }

    /// Record a frame that produced no usable sample
    pub fn submit_dropout(&mut self, timestamp_us: i64) {
        self.submit(FrameObservation::Dropout { timestamp_us });
    }

    /// Record one frame attempt.
    ///
    /// Never fails: out-of-order frames are ignored, non-finite or clipped
    /// values are counted as dropouts, out-of-range values are clamped.
    pub fn submit(&mut self, observation: FrameObservation) {
        let timestamp_us = observation.timestamp_us();
        if let Some(clock) = self.clock_us {
            if timestamp_us < clock {
                log::trace!("out-of-order frame at {} (clock {}), ignored", timestamp_us, clock);
                return;
            }
        }
        self.clock_us = Some(timestamp_us);

        let covered = match observation {
            FrameObservation::Sample(sample) => {
                let gate = &self.config.gate;
                match sanitize(sample, gate.dark_level, gate.saturation_level) {
                    Sanitized::Usable(clean) => self.buffer.push(clean),
                    Sanitized::NonFinite => {
                        log::trace!("non-finite sample at {}", timestamp_us);
                        false
                    }
                    Sanitized::Clipped => {
                        log::trace!("clipped sample {} at {}", sample.value, timestamp_us);
                        false
                    }
                }
            }
            FrameObservation::Dropout { .. } => false,
        };

        let stats = self.buffer.recent_stats(self.stats_window_us);
        self.gate.evaluate(timestamp_us, covered, stats);
    }

    /// Fuse an external detector's presence confidence (0-1) into the gate
    pub fn observe_presence(&mut self, confidence: f32) {
        self.gate.set_presence(confidence);
    }

    /// Periodic estimation step (~1 Hz).
    ///
    /// Runs the estimator only when the signal is valid and new samples
    /// arrived since the previous run, so repeated ticks without input
    /// return the same estimate.
    ///
    /// Time only advances with submitted frames. Hosts must report frames
    /// that yield no sample with [`Self::submit_dropout`]; if submissions
    /// stop altogether, validity and readiness stay where they were.
    pub fn tick(&mut self) -> BpmEstimate {
        if self.gate.state() == ValidityState::Valid {
            self.run_estimator();
        }
        self.apply_staleness();
        self.estimate
    }

    fn run_estimator(&mut self) {
        let newest = match self.buffer.latest() {
            Some(s) => s.timestamp_us,
            None => return,
        };
        if self.last_analyzed_us == Some(newest) {
            return;
        }
        self.last_analyzed_us = Some(newest);

        let run_start = self.gate.run_start_us().unwrap_or(newest);
        let window = self.buffer.samples_since(run_start);

        match self.estimator.compute(&window) {
            Ok(accepted) => {
                if !self.estimate.ready {
                    log::info!(
                        "heart rate ready: {:.1} BPM (confidence {:.2})",
                        accepted.bpm,
                        accepted.confidence
                    );
                }
                self.last_rejection = None;
                self.estimate = BpmEstimate {
                    value: accepted.bpm.round().max(0.0) as u32,
                    bpm: accepted.bpm,
                    confidence: accepted.confidence,
                    ready: true,
                    computed_at_us: self.clock_us,
                };
            }
            Err(rejection) => {
                self.last_rejection = Some(rejection);
                let limit = self.config.estimator.max_consecutive_rejections;
                if self.estimate.ready && self.estimator.consecutive_rejections() >= limit {
                    log::debug!("{} consecutive rejections, estimate marked stale", limit);
                    self.estimate.ready = false;
                }
            }
        }
    }

    /// Withdraw readiness once the gate has not been `Valid` for longer
    /// than the minimum analysis window. Counting from the last `Valid`
    /// frame means NoSignal/Acquiring flapping cannot hold a reading.
    fn apply_staleness(&mut self) {
        if self.gate.state() == ValidityState::Valid {
            return;
        }
        let (Some(last_valid), Some(clock)) = (self.gate.last_valid_us(), self.clock_us) else {
            return;
        };
        let invalid_for = clock.saturating_sub(last_valid);
        if invalid_for > self.min_analysis_us
            && (self.estimate.ready || self.estimator.smoothed_bpm().is_some())
        {
            log::debug!("not valid for {} us, estimate stale", invalid_for);
            self.estimate.ready = false;
            self.estimator.invalidate();
        }
    }

    /// Drop all history after a context discontinuity (view change, user request)
    pub fn reset(&mut self) {
        log::info!("ppg engine reset");
        self.buffer.clear();
        self.gate.reset();
        self.estimator.invalidate();
        self.estimate = BpmEstimate::not_ready();
        self.clock_us = None;
        self.last_analyzed_us = None;
        self.last_rejection = None;
    }

    pub fn current_estimate(&self) -> BpmEstimate {
        self.estimate
    }

    pub fn current_validity(&self) -> ValidityState {
        self.gate.state()
    }

    /// Raw channel value of the newest buffered sample
    pub fn latest_value(&self) -> Option<f32> {
        self.buffer.latest().map(|s| s.value)
    }

    pub fn guidance(&self) -> Guidance {
        if let Some(bpm) = self.estimate.ready_value() {
            return Guidance::Reading(bpm);
        }
        match self.gate.state() {
            ValidityState::NoSignal => Guidance::PlaceFinger,
            ValidityState::Acquiring => Guidance::HoldStill,
            ValidityState::Valid => Guidance::Measuring,
        }
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer_duration_sec(&self) -> f32 {
        self.buffer.duration_covered_sec()
    }

    pub fn coverage_ratio(&self) -> f32 {
        self.gate.coverage_ratio()
    }

    pub fn last_rejection(&self) -> Option<Rejection> {
        self.last_rejection
    }

    pub fn last_gate_failure(&self) -> Option<GateFailure> {
        self.gate.last_failure()
    }

    /// Engine clock: timestamp of the newest frame attempt
    pub fn clock_us(&self) -> Option<i64> {
        self.clock_us
    }
}

impl Default for PpgEngine {
    fn default() -> Self {
        Self::new()
    }
}
