//! Frequency response analysis
//!
//! Evaluates a kernel's transfer function directly on a caller-chosen
//! frequency grid (not necessarily a power of two, so no FFT) and derives
//! unwrapped phase, group delay and phase delay from it.

use std::f64::consts::{PI, TAU};

use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use xo_core::{XoError, XoResult};

use crate::fourier::scale_to_decibels;

/// Offset used for the one-sided DC group delay estimate
const DC_DELTA_HZ: f64 = 0.0001;

/// Frequency response of a FIR kernel sampled from DC to Nyquist.
///
/// All vectors are parallel; delays are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResponse {
    pub sample_rate: f64,
    pub bin_size: f64,
    pub frequency: Vec<f64>,
    pub amplitude_linear: Vec<f64>,
    pub amplitude_db: Vec<f64>,
    pub phase: Vec<f64>,
    pub unwrapped_phase: Vec<f64>,
    pub phase_delay: Vec<f64>,
    pub group_delay: Vec<f64>,
}

impl FilterResponse {
    /// Number of data points
    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }

    /// Index of the data point closest to `hz`
    pub fn nearest_index(&self, hz: f64) -> usize {
        let last = self.len().saturating_sub(1);
        let index = (hz / self.bin_size.max(f64::MIN_POSITIVE)).round();
        if index <= 0.0 {
            0
        } else {
            (index as usize).min(last)
        }
    }
}

/// Σ h[k]·e^{−jkθ} where θ = ωT
#[inline]
pub fn evaluate(kernel: &[f64], omega_t: f64) -> Complex<f64> {
    kernel
        .iter()
        .enumerate()
        .fold(Complex::new(0.0, 0.0), |acc, (k, &h)| {
            acc + Complex::from_polar(h, -omega_t * k as f64)
        })
}

/// Unwrap phase, anchoring the first point at 0
pub fn unwrap_phase(phase: &[f64]) -> Vec<f64> {
    let mut unwrapped = vec![0.0; phase.len()];
    for i in 1..phase.len() {
        let c = ((unwrapped[i - 1] - phase[i]) / TAU).floor();
        unwrapped[i] = phase[i] + c * TAU;
    }
    unwrapped
}

/// Analyze `kernel` at `bin_size` Hz resolution from DC to Nyquist
pub fn analyze(kernel: &[f64], sample_rate: f64, bin_size: f64) -> XoResult<FilterResponse> {
    if kernel.is_empty() {
        return Err(XoError::invalid("kernel must contain at least one tap"));
    }
    if !(sample_rate > 0.0) {
        return Err(XoError::out_of_range("sample_rate", sample_rate));
    }
    if !(bin_size > 0.0 && bin_size <= sample_rate / 4.0) {
        return Err(XoError::out_of_range("bin_size", bin_size));
    }

    let nyquist = 0.5 * sample_rate;
    let points = (nyquist / bin_size).round() as usize + 1;
    if points < 3 {
        return Err(XoError::out_of_range("data_points", points as f64));
    }

    let last = (points - 1) as f64;
    let mut frequency = Vec::with_capacity(points);
    let mut amplitude_linear = Vec::with_capacity(points);
    let mut phase = Vec::with_capacity(points);

    for i in 0..points {
        let h = evaluate(kernel, PI * i as f64 / last);
        frequency.push(i as f64 / last * nyquist);
        amplitude_linear.push(h.norm());
        phase.push(h.arg());
    }

    let amplitude_db = scale_to_decibels(&amplitude_linear);
    let unwrapped_phase = unwrap_phase(&phase);

    // Group delay: negative phase slope; DC via a tiny one-sided step
    let delta_omega = TAU * bin_size;
    let mut group_delay = Vec::with_capacity(points);
    let dc_phase = evaluate(kernel, TAU * DC_DELTA_HZ / sample_rate).arg();
    group_delay.push(-(dc_phase - unwrapped_phase[0]) / (TAU * DC_DELTA_HZ));
    for pair in unwrapped_phase.windows(2) {
        group_delay.push(-(pair[1] - pair[0]) / delta_omega);
    }

    let mut phase_delay = Vec::with_capacity(points);
    phase_delay.push(group_delay[0]);
    for i in 1..points {
        phase_delay.push(unwrapped_phase[i] / (-TAU * frequency[i]));
    }

    Ok(FilterResponse {
        sample_rate,
        bin_size,
        frequency,
        amplitude_linear,
        amplitude_db,
        phase,
        unwrapped_phase,
        phase_delay,
        group_delay,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::design_lowpass;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_point_count_and_grid() {
        let response = analyze(&[1.0], 48000.0, 1000.0).unwrap();
        assert_eq!(response.len(), 25);
        assert_eq!(response.frequency[0], 0.0);
        assert_abs_diff_eq!(response.frequency[24], 24000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(response.frequency[1], 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_identity_is_flat_with_zero_delay() {
        let response = analyze(&[1.0], 44100.0, 441.0).unwrap();
        for i in 0..response.len() {
            assert_abs_diff_eq!(response.amplitude_linear[i], 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(response.amplitude_db[i], 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(response.group_delay[i], 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(response.phase_delay[i], 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pure_delay() {
        // Three-sample delay: h = δ[n − 3]
        let fs = 48000.0;
        let kernel = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let response = analyze(&kernel, fs, fs / 400.0).unwrap();
        let expected = 3.0 / fs;

        assert_abs_diff_eq!(response.group_delay[0], expected, epsilon = 1e-9);
        for i in 1..response.len() {
            assert_abs_diff_eq!(response.group_delay[i], expected, epsilon = 1e-9);
            assert_abs_diff_eq!(response.phase_delay[i], expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_lowpass_passband_and_stopband() {
        let fs = 44100.0;
        let kernel = design_lowpass(2000.0, 1000.0, fs).unwrap();
        let response = analyze(&kernel, fs, 50.0).unwrap();

        assert_abs_diff_eq!(response.amplitude_db[0], 0.0, epsilon = 1e-6);
        assert!(response.amplitude_linear[response.nearest_index(1000.0)] > 0.99);
        assert!(response.amplitude_linear[response.nearest_index(6000.0)] < 1e-3);

        // Symmetric kernel: constant delay of (L − 1) / 2 samples in the passband
        let expected = (kernel.len() - 1) as f64 / 2.0 / fs;
        let bin = response.nearest_index(500.0);
        assert_abs_diff_eq!(response.group_delay[bin], expected, epsilon = 1e-7);
        assert_abs_diff_eq!(response.phase_delay[bin], expected, epsilon = 1e-7);
        assert_abs_diff_eq!(response.group_delay[0], expected, epsilon = 1e-7);
    }

    #[test]
    fn test_zero_magnitude_maps_to_zero_db() {
        let response = analyze(&[0.0, 0.0, 0.0], 48000.0, 12000.0).unwrap();
        assert!(response.amplitude_db.iter().all(|&db| db == 0.0));
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            analyze(&[], 48000.0, 100.0),
            Err(XoError::InvalidArgument(_))
        ));
        assert!(matches!(
            analyze(&[1.0], 0.0, 100.0),
            Err(XoError::OutOfRange { name: "sample_rate", .. })
        ));
        assert!(analyze(&[1.0], 48000.0, 0.0).is_err());
        assert!(analyze(&[1.0], 48000.0, 12001.0).is_err());
        assert!(analyze(&[1.0], 48000.0, 12000.0).is_ok());
    }

    #[test]
    fn test_unwrap_phase() {
        let wrapped = [0.0, -3.0, 3.0, 2.0];
        let unwrapped = unwrap_phase(&wrapped);
        assert_eq!(unwrapped[0], 0.0);
        assert_abs_diff_eq!(unwrapped[1], -3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(unwrapped[2], 3.0 - TAU, epsilon = 1e-12);
        assert_abs_diff_eq!(unwrapped[3], 2.0 - TAU, epsilon = 1e-12);
    }
}
