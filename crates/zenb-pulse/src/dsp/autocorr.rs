//! Autocorrelation period search (Wiener-Khinchin)

use ndarray::Array1;
use num_complex::Complex32;
use rustfft::FftPlanner;

/// Best in-range autocorrelation peak
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutocorrPeak {
    /// Period in samples, refined by parabolic interpolation
    pub lag: f32,
    /// Normalized correlation at the peak (r[0] = 1)
    pub correlation: f32,
}

/// Normalized autocorrelation of `signal` for lags `0..signal.len()`.
///
/// Zero-pads to twice the length so the result is the linear (not circular)
/// correlation. Returns all zeros for a zero-energy signal.
pub fn autocorrelation(planner: &mut FftPlanner<f32>, signal: &Array1<f32>) -> Vec<f32> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }
    let fft_len = (n * 2).next_power_of_two();
    let fft = planner.plan_fft_forward(fft_len);
    let ifft = planner.plan_fft_inverse(fft_len);

    let mut buffer: Vec<Complex32> = signal
        .iter()
        .map(|&s| Complex32::new(s, 0.0))
        .chain(std::iter::repeat(Complex32::new(0.0, 0.0)))
        .take(fft_len)
        .collect();

    fft.process(&mut buffer);
    for c in buffer.iter_mut() {
        *c = Complex32::new(c.norm_sqr(), 0.0);
    }
    ifft.process(&mut buffer);

    let r0 = buffer[0].re;
    if r0 <= 0.0 {
        return vec![0.0; n];
    }
    buffer.iter().take(n).map(|c| c.re / r0).collect()
}

/// Highest local maximum of the autocorrelation within `[min_lag, max_lag]`.
pub fn find_autocorr_peak(acf: &[f32], min_lag: usize, max_lag: usize) -> Option<AutocorrPeak> {
    let min_lag = min_lag.max(1);
    let max_lag = max_lag.min(acf.len().saturating_sub(2));
    if min_lag > max_lag {
        return None;
    }

    let mut best: Option<usize> = None;
    for k in min_lag..=max_lag {
        let is_local_max = acf[k] >= acf[k - 1] && acf[k] >= acf[k + 1];
        if is_local_max && best.map_or(true, |b| acf[k] > acf[b]) {
            best = Some(k);
        }
    }
    let k = best?;

    let (y_m1, y_0, y_p1) = (acf[k - 1], acf[k], acf[k + 1]);
    let denom = y_m1 - 2.0 * y_0 + y_p1;
    let delta = if denom.abs() > 1e-12 {
        let d = 0.5 * (y_m1 - y_p1) / denom;
        if d.is_finite() && d.abs() <= 1.0 {
            d
        } else {
            0.0
        }
    } else {
        0.0
    };

    Some(AutocorrPeak {
        lag: k as f32 + delta,
        correlation: y_0,
    })
}
