//! Per-frame color samples
//!
//! A `Sample` is one normalized intensity reading for one video frame.
//! A `FrameObservation` additionally records frames that produced no usable
//! sample, so coverage can be computed against frames actually attempted.

/// Microseconds per second
pub const US_PER_SEC: i64 = 1_000_000;

/// Convert a microsecond span to seconds
#[inline]
pub fn us_to_sec(us: i64) -> f32 {
    us as f32 / US_PER_SEC as f32
}

/// Convert seconds to a microsecond span
#[inline]
pub fn sec_to_us(sec: f32) -> i64 {
    (sec as f64 * US_PER_SEC as f64).round() as i64
}

/// Timestamped color-channel intensity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Monotonic capture time in microseconds
    pub timestamp_us: i64,
    /// Normalized intensity in [0, 1]
    pub value: f32,
}

impl Sample {
    pub fn new(timestamp_us: i64, value: f32) -> Self {
        Self { timestamp_us, value }
    }

    /// Build a sample from an 8-bit scale intensity (0-255)
    pub fn from_byte(timestamp_us: i64, value: f32) -> Self {
        Self::new(timestamp_us, value / 255.0)
    }
}

/// One frame attempt as seen by the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameObservation {
    /// Frame produced a sample
    Sample(Sample),
    /// Frame was dropped or yielded nothing usable
    Dropout { timestamp_us: i64 },
}

impl FrameObservation {
    pub fn timestamp_us(&self) -> i64 {
        match self {
            Self::Sample(s) => s.timestamp_us,
            Self::Dropout { timestamp_us } => *timestamp_us,
        }
    }
}

impl From<Sample> for FrameObservation {
    fn from(sample: Sample) -> Self {
        Self::Sample(sample)
    }
}

/// Result of sanitizing a raw sample value
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Sanitized {
    /// Usable sample (possibly clamped into [0, 1])
    Usable(Sample),
    /// Not a number / infinite
    NonFinite,
    /// Uniformly saturated or dark frame
    Clipped,
}

/// Clamp into range and classify clipped or non-finite input.
pub(crate) fn sanitize(sample: Sample, dark_level: f32, saturation_level: f32) -> Sanitized {
    if !sample.value.is_finite() {
        return Sanitized::NonFinite;
    }
    let value = sample.value.clamp(0.0, 1.0);
    if value <= dark_level || value >= saturation_level {
        return Sanitized::Clipped;
    }
    Sanitized::Usable(Sample::new(sample.timestamp_us, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_byte_normalizes() {
        let s = Sample::from_byte(10, 127.5);
        assert_relative_eq!(s.value, 0.5, epsilon = 1e-6);
        assert_eq!(s.timestamp_us, 10);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize(Sample::new(0, f32::NAN), 0.01, 0.99), Sanitized::NonFinite);
        assert_eq!(sanitize(Sample::new(0, 1.7), 0.01, 0.99), Sanitized::Clipped);
        assert_eq!(sanitize(Sample::new(0, 0.0), 0.01, 0.99), Sanitized::Clipped);
        assert_eq!(
            sanitize(Sample::new(5, 0.4), 0.01, 0.99),
            Sanitized::Usable(Sample::new(5, 0.4))
        );
    }

    #[test]
    fn test_time_conversions() {
        assert_eq!(sec_to_us(1.5), 1_500_000);
        assert_relative_eq!(us_to_sec(250_000), 0.25);
    }
}
