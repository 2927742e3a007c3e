//! Duration-bounded signal ring buffer
//!
//! Holds the trailing window of samples. Capacity is a duration, not a
//! count: every push evicts samples older than `newest - window`.

use crate::sample::{sec_to_us, us_to_sec, Sample};
use std::collections::VecDeque;

/// Mean and standard deviation of a sample span
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanStats {
    pub mean: f32,
    pub std: f32,
    pub count: usize,
}

/// Rolling window of timestamped samples
#[derive(Debug, Clone)]
pub struct SignalRingBuffer {
    window_us: i64,
    samples: VecDeque<Sample>,
}

impl SignalRingBuffer {
    /// Create a buffer holding `window_sec` seconds of history
    pub fn new(window_sec: f32) -> Self {
        Self {
            window_us: sec_to_us(window_sec).max(1),
            samples: VecDeque::new(),
        }
    }

    /// Append a sample and evict everything older than the window.
    ///
    /// Returns `false` (and leaves the buffer unchanged) when the sample is
    /// older than the newest one held.
    pub fn push(&mut self, sample: Sample) -> bool {
        if let Some(last) = self.samples.back() {
            if sample.timestamp_us < last.timestamp_us {
                return false;
            }
        }
        self.samples.push_back(sample);

        let cutoff = sample.timestamp_us.saturating_sub(self.window_us);
        while let Some(front) = self.samples.front() {
            if front.timestamp_us < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        true
    }

    /// Ordered copy of the current window
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    /// Ordered copy of samples with `timestamp_us >= since_us`
    pub fn samples_since(&self, since_us: i64) -> Vec<Sample> {
        let start = self.samples.partition_point(|s| s.timestamp_us < since_us);
        self.samples.range(start..).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    pub fn window_us(&self) -> i64 {
        self.window_us
    }

    /// Time between the oldest and newest held sample
    pub fn duration_covered_us(&self) -> i64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => last.timestamp_us.saturating_sub(first.timestamp_us),
            _ => 0,
        }
    }

    pub fn duration_covered_sec(&self) -> f32 {
        us_to_sec(self.duration_covered_us())
    }

    /// Mean / std-dev of samples within `span_us` of the newest sample
    pub fn recent_stats(&self, span_us: i64) -> Option<SpanStats> {
        let last = self.samples.back()?;
        let cutoff = last.timestamp_us.saturating_sub(span_us);

        let mut count = 0usize;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for s in self.samples.iter().rev() {
            if s.timestamp_us < cutoff {
                break;
            }
            let v = s.value as f64;
            sum += v;
            sum_sq += v * v;
            count += 1;
        }

        let mean = sum / count as f64;
        let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
        Some(SpanStats {
            mean: mean as f32,
            std: variance.sqrt() as f32,
            count,
        })
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
