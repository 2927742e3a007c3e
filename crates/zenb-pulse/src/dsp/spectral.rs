//! Spectral helpers: uniform resampling, detrending and band-limited
//! FFT peak search.

use crate::sample::{Sample, US_PER_SEC};
use ndarray::Array1;
use num_complex::Complex32;
use rustfft::FftPlanner;
use std::f32::consts::PI;

/// Smallest FFT length used for the zero-padded peak search
const MIN_FFT_LEN: usize = 1024;

/// Dominant in-band spectral component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralPeak {
    /// Peak frequency (Hz), refined by parabolic interpolation
    pub freq_hz: f32,
    /// Power around the peak over remaining in-band power (dB)
    pub snr_db: f32,
}

/// Resample timestamped samples onto a uniform grid by linear interpolation.
///
/// The grid starts at the first sample and never extends past the last one.
/// Returns an empty array for fewer than two samples or zero duration.
pub fn resample_uniform(samples: &[Sample], rate_hz: f32) -> Array1<f32> {
    if samples.len() < 2 || rate_hz <= 0.0 {
        return Array1::zeros(0);
    }
    let t0 = samples[0].timestamp_us;
    let span_us = samples[samples.len() - 1].timestamp_us.saturating_sub(t0);
    if span_us <= 0 {
        return Array1::zeros(0);
    }

    let step_us = US_PER_SEC as f64 / rate_hz as f64;
    let n = (span_us as f64 / step_us).floor() as usize + 1;
    let mut out = Array1::zeros(n);

    let mut j = 0usize;
    for k in 0..n {
        let t = t0 as f64 + k as f64 * step_us;
        while j + 2 < samples.len() && (samples[j + 1].timestamp_us as f64) < t {
            j += 1;
        }
        let a = samples[j];
        let b = samples[j + 1];
        let dt = (b.timestamp_us - a.timestamp_us) as f64;
        out[k] = if dt <= 0.0 {
            b.value
        } else {
            let frac = ((t - a.timestamp_us as f64) / dt).clamp(0.0, 1.0) as f32;
            a.value + (b.value - a.value) * frac
        };
    }
    out
}

/// Remove the least-squares linear trend
pub fn detrend_linear(signal: &Array1<f32>) -> Array1<f32> {
    let n = signal.len();
    if n < 2 {
        return signal.mapv(|_| 0.0);
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = signal.iter().map(|&v| v as f64).sum::<f64>() / n_f;

    let mut sxy = 0.0f64;
    let mut sxx = 0.0f64;
    for (i, &y) in signal.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (y as f64 - mean_y);
        sxx += dx * dx;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    Array1::from_iter(
        signal
            .iter()
            .enumerate()
            .map(|(i, &y)| (y as f64 - mean_y - slope * (i as f64 - mean_x)) as f32),
    )
}

/// Subtract a centred moving average of `window` samples.
///
/// Edges use the truncated window.
pub fn remove_moving_average(signal: &Array1<f32>, window: usize) -> Array1<f32> {
    let n = signal.len();
    if n == 0 || window <= 1 {
        return signal.clone();
    }
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0f64);
    for &v in signal.iter() {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + v as f64);
    }

    let half = window / 2;
    Array1::from_iter((0..n).map(|i| {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        let mean = (prefix[hi] - prefix[lo]) / (hi - lo) as f64;
        (signal[i] as f64 - mean) as f32
    }))
}

/// Hamming window coefficients
pub fn hamming_window(size: usize) -> Array1<f32> {
    if size < 2 {
        return Array1::ones(size);
    }
    Array1::from_iter(
        (0..size).map(|i| 0.54 - 0.46 * ((2.0 * PI * i as f32) / ((size - 1) as f32)).cos()),
    )
}

/// Population standard deviation
pub fn std(arr: &Array1<f32>) -> f32 {
    let mean = arr.mean().unwrap_or(0.0);
    let variance = arr.mapv(|x| (x - mean).powi(2)).mean().unwrap_or(0.0);
    variance.sqrt()
}

/// Find the dominant frequency around `[min_hz, max_hz]`.
///
/// Hamming-windowed, zero-padded FFT with parabolic refinement of the peak
/// bin. The search runs one native bin (`fs / n`) past each edge, so the
/// returned frequency may lie just outside the band and callers check it.
/// SNR compares power within one native bin of the peak to the rest of the
/// searched range.
pub fn find_spectral_peak(
    planner: &mut FftPlanner<f32>,
    signal: &Array1<f32>,
    fs: f32,
    min_hz: f32,
    max_hz: f32,
) -> Option<SpectralPeak> {
    let n = signal.len();
    if n < 32 || fs <= 0.0 || min_hz >= max_hz {
        return None;
    }

    let fft_len = (n * 4).next_power_of_two().max(MIN_FFT_LEN);
    let window = hamming_window(n);
    let mut buffer: Vec<Complex32> = signal
        .iter()
        .zip(window.iter())
        .map(|(s, w)| Complex32::new(s * w, 0.0))
        .chain(std::iter::repeat(Complex32::new(0.0, 0.0)))
        .take(fft_len)
        .collect();

    let fft = planner.plan_fft_forward(fft_len);
    fft.process(&mut buffer);

    let half_n = fft_len / 2;
    let power: Vec<f32> = buffer.iter().take(half_n).map(|c| c.norm_sqr()).collect();

    let bin_res = fs / fft_len as f32;
    // One native resolution bin (`fs / n`) in zero-padded bins
    let lobe_bins = ((fft_len as f32 / n as f32).round() as usize).max(1);
    // Search one native bin past each edge so out-of-band leakage peaks
    // outside the band rather than on its edge
    let min_bin = ((min_hz / bin_res).ceil() as usize)
        .saturating_sub(lobe_bins)
        .max(1);
    let max_bin = ((max_hz / bin_res).floor() as usize + lobe_bins).min(half_n - 2);
    if min_bin >= max_bin {
        return None;
    }

    let mut peak_bin = min_bin;
    let mut peak_power = 0.0f32;
    for (i, &p) in power.iter().enumerate().take(max_bin + 1).skip(min_bin) {
        if p > peak_power {
            peak_power = p;
            peak_bin = i;
        }
    }
    if peak_power <= 0.0 {
        return None;
    }

    let refined_bin = {
        let y_m1 = power[peak_bin - 1];
        let y_0 = power[peak_bin];
        let y_p1 = power[peak_bin + 1];
        let denom = y_m1 - 2.0 * y_0 + y_p1;
        if denom.abs() > 1e-12 {
            let delta = 0.5 * (y_m1 - y_p1) / denom;
            if delta.is_finite() && delta.abs() <= 1.0 {
                peak_bin as f32 + delta
            } else {
                peak_bin as f32
            }
        } else {
            peak_bin as f32
        }
    };

    // Power within one native bin of the peak counts as signal
    let mut signal_power = 0.0f32;
    let mut noise_power = 0.0f32;
    for (i, &p) in power.iter().enumerate().take(max_bin + 1).skip(min_bin) {
        if i.abs_diff(peak_bin) <= lobe_bins {
            signal_power += p;
        } else {
            noise_power += p;
        }
    }
    let snr_db = 10.0 * (signal_power / noise_power.max(1e-12)).log10();

    Some(SpectralPeak {
        freq_hz: refined_bin * bin_res,
        snr_db,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sine(freq: f32, fs: f32, n: usize) -> Array1<f32> {
        Array1::from_iter((0..n).map(|i| (2.0 * PI * freq * i as f32 / fs).sin()))
    }

    #[test]
    fn test_hamming_window() {
        let window = hamming_window(10);
        assert_eq!(window.len(), 10);
        assert_relative_eq!(window[0], 0.08, epsilon = 0.01);
        assert_relative_eq!(window[9], 0.08, epsilon = 0.01);
        assert_relative_eq!(window[4], 1.0, epsilon = 0.03);
    }

    #[test]
    fn test_resample_uniform_jittered() {
        // Ramp sampled with irregular spacing must resample onto the same ramp
        let stamps = [0i64, 30_000, 70_000, 100_000, 135_000, 166_000, 200_000];
        let samples: Vec<Sample> = stamps
            .iter()
            .map(|&t| Sample::new(t, t as f32 / 200_000.0))
            .collect();
        let out = resample_uniform(&samples, 50.0);
        assert_eq!(out.len(), 11);
        for (k, v) in out.iter().enumerate() {
            assert_relative_eq!(*v, k as f32 * 0.1, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_resample_degenerate() {
        assert_eq!(resample_uniform(&[Sample::new(0, 0.5)], 30.0).len(), 0);
        let same = [Sample::new(5, 0.5), Sample::new(5, 0.6)];
        assert_eq!(resample_uniform(&same, 30.0).len(), 0);
    }

    #[test]
    fn test_detrend_linear_removes_ramp() {
        let ramp = Array1::from_iter((0..50).map(|i| 0.3 + 0.01 * i as f32));
        let out = detrend_linear(&ramp);
        assert!(out.iter().all(|v| v.abs() < 1e-5));
    }

    #[test]
    fn test_moving_average_keeps_pulse() {
        let fs = 30.0;
        let drift = Array1::from_iter((0..300).map(|i| 0.05 * (2.0 * PI * 0.05 * i as f32 / fs).sin()));
        let pulse = sine(1.2, fs, 300) * 0.01;
        let out = remove_moving_average(&(drift + &pulse), 45);
        // Pulse amplitude survives, drift is largely gone
        assert!(std(&out) > 0.5 * std(&pulse));
        assert!(std(&out) < 2.0 * std(&pulse));
    }

    #[test]
    fn test_std() {
        let signal = Array1::from(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_relative_eq!(std(&signal), std::f32::consts::SQRT_2, epsilon = 0.001);
    }

    #[test]
    fn test_spectral_peak_synthetic() {
        let mut planner = FftPlanner::new();
        let signal = sine(1.2, 30.0, 150);
        let peak = find_spectral_peak(&mut planner, &signal, 30.0, 0.67, 3.0).unwrap();
        assert!((peak.freq_hz * 60.0 - 72.0).abs() < 1.5, "got {}", peak.freq_hz * 60.0);
        assert!(peak.snr_db > 5.0, "snr {}", peak.snr_db);
    }

    #[test]
    fn test_spectral_peak_ignores_out_of_band() {
        let mut planner = FftPlanner::new();
        // Strong 0.2 Hz drift plus weaker 2 Hz pulse: only the pulse is in band
        let signal = sine(0.2, 30.0, 300) * 5.0 + &sine(2.0, 30.0, 300);
        let peak = find_spectral_peak(&mut planner, &signal, 30.0, 0.67, 3.0).unwrap();
        assert!((peak.freq_hz - 2.0).abs() < 0.05, "got {}", peak.freq_hz);
    }

    #[test]
    fn test_spectral_peak_just_below_band() {
        let mut planner = FftPlanner::new();
        // 1.6 Hz tone, band starts at 1.667 Hz: reported where it is, not on the edge
        let signal = sine(1.6, 30.0, 240);
        let peak = find_spectral_peak(&mut planner, &signal, 30.0, 100.0 / 60.0, 3.0).unwrap();
        assert!(peak.freq_hz < 100.0 / 60.0, "got {}", peak.freq_hz);
        assert!((peak.freq_hz - 1.6).abs() < 0.03, "got {}", peak.freq_hz);
    }

    #[test]
    fn test_spectral_peak_short_signal() {
        let mut planner = FftPlanner::new();
        assert!(find_spectral_peak(&mut planner, &sine(1.0, 30.0, 10), 30.0, 0.67, 3.0).is_none());
    }
}
