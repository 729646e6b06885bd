//! Complex Fourier transforms
//!
//! Direct O(n²) DFT/IDFT and in-place radix-2 decimation-in-time FFT/IFFT,
//! each in a scaled (1/N) and unscaled flavour. The convolution engine pairs
//! `fft_unscaled` with the scaled `ifft`, so scaling is applied exactly once
//! per round trip.

use std::f64::consts::{PI, TAU};

use rustfft::num_complex::Complex;
use xo_core::{Decibels, XoError, XoResult};

/// Magnitudes at or below this are treated as zero
pub const ZERO_EPSILON: f64 = 5.36e-12;

/// Phases within this of zero are treated as zero
pub const PHASE_EPSILON: f64 = ZERO_EPSILON;

const ZERO: Complex<f64> = Complex { re: 0.0, im: 0.0 };

// ============ Utility ============

/// True when `value` is an exact power of two (1 excluded)
#[inline]
pub fn is_power_of_two(value: usize) -> bool {
    value >= 2 && value.is_power_of_two()
}

/// Smallest power of two ≥ `value`
pub fn next_power_of_two(value: usize) -> XoResult<usize> {
    if value < 2 {
        return Err(XoError::out_of_range("value", value as f64));
    }
    value
        .checked_next_power_of_two()
        .ok_or_else(|| XoError::out_of_range("value", value as f64))
}

fn check_not_empty(len: usize) -> XoResult<()> {
    if len == 0 {
        return Err(XoError::invalid("transform input must not be empty"));
    }
    Ok(())
}

fn check_fft_len(len: usize) -> XoResult<()> {
    check_not_empty(len)?;
    // A single point is its own transform
    if len != 1 && !len.is_power_of_two() {
        return Err(XoError::InvalidArgument(format!(
            "FFT length must be a power of 2, got {}",
            len
        )));
    }
    Ok(())
}

// ============ Direct Transforms ============

fn direct_transform(x: &[Complex<f64>], sign: f64) -> Vec<Complex<f64>> {
    let n = x.len();
    let omega = sign * TAU / n as f64;

    (0..n)
        .map(|k| {
            x.iter().enumerate().fold(ZERO, |acc, (i, &v)| {
                // i·k reduced modulo n keeps the angle small
                let angle = omega * ((i * k) % n) as f64;
                acc + v * Complex::from_polar(1.0, angle)
            })
        })
        .collect()
}

/// Forward DFT scaled by 1/N
pub fn dft(x: &[Complex<f64>]) -> XoResult<Vec<Complex<f64>>> {
    check_not_empty(x.len())?;
    let scale = 1.0 / x.len() as f64;
    Ok(direct_transform(x, -1.0).into_iter().map(|v| v * scale).collect())
}

/// Forward DFT without scaling
pub fn dft_unscaled(x: &[Complex<f64>]) -> XoResult<Vec<Complex<f64>>> {
    check_not_empty(x.len())?;
    Ok(direct_transform(x, -1.0))
}

/// Inverse DFT without scaling (the textbook pair of the scaled `dft`)
pub fn idft(x: &[Complex<f64>]) -> XoResult<Vec<Complex<f64>>> {
    check_not_empty(x.len())?;
    Ok(direct_transform(x, 1.0))
}

/// Inverse DFT scaled by 1/N
pub fn idft_scaled(x: &[Complex<f64>]) -> XoResult<Vec<Complex<f64>>> {
    check_not_empty(x.len())?;
    let scale = 1.0 / x.len() as f64;
    Ok(direct_transform(x, 1.0).into_iter().map(|v| v * scale).collect())
}

// ============ Radix-2 FFT ============

fn bit_reverse_permute(x: &mut [Complex<f64>]) {
    let n = x.len();
    let half = n >> 1;
    let mut j = 0;

    for i in 0..n.saturating_sub(1) {
        if i < j {
            x.swap(i, j);
        }
        let mut k = half;
        while k <= j {
            j -= k;
            k >>= 1;
        }
        j += k;
    }
}

fn butterflies(x: &mut [Complex<f64>], sign: f64) {
    let n = x.len();
    let mut gap = 1;

    while gap < n {
        let skip = gap << 1;
        let w = Complex::from_polar(1.0, sign * PI / gap as f64);
        let mut u = Complex::new(1.0, 0.0);

        for j in 0..gap {
            let mut i = j;
            while i < n {
                let ip = i + gap;
                let temp = x[ip] * u;
                x[ip] = x[i] - temp;
                x[i] += temp;
                i += skip;
            }
            u *= w;
        }
        gap = skip;
    }
}

fn radix2(x: &mut [Complex<f64>], sign: f64, scaled: bool) -> XoResult<()> {
    check_fft_len(x.len())?;
    bit_reverse_permute(x);
    butterflies(x, sign);

    if scaled {
        let scale = 1.0 / x.len() as f64;
        for v in x.iter_mut() {
            *v *= scale;
        }
    }
    Ok(())
}

/// In-place forward FFT scaled by 1/N
pub fn fft(x: &mut [Complex<f64>]) -> XoResult<()> {
    radix2(x, -1.0, true)
}

/// In-place forward FFT without scaling
pub fn fft_unscaled(x: &mut [Complex<f64>]) -> XoResult<()> {
    radix2(x, -1.0, false)
}

/// In-place inverse FFT scaled by 1/N
pub fn ifft(x: &mut [Complex<f64>]) -> XoResult<()> {
    radix2(x, 1.0, true)
}

/// In-place inverse FFT without scaling
pub fn ifft_unscaled(x: &mut [Complex<f64>]) -> XoResult<()> {
    radix2(x, 1.0, false)
}

// ============ Spectrum Helpers ============

/// Copy a real signal into a complex vector zero-padded to the next power of 2
pub fn pad_to_complex(signal: &[f64]) -> XoResult<Vec<Complex<f64>>> {
    if signal.len() < 2 {
        return Err(XoError::out_of_range("signal.len", signal.len() as f64));
    }
    let len = next_power_of_two(signal.len())?;
    let mut out = vec![ZERO; len];
    for (dst, &src) in out.iter_mut().zip(signal) {
        *dst = Complex::new(src, 0.0);
    }
    Ok(out)
}

/// Single-sided magnitude spectrum of a full complex spectrum.
/// DC and Nyquist appear once; every other bin is summed with its mirror.
pub fn magnitude_spectrum(x: &[Complex<f64>]) -> XoResult<Vec<f64>> {
    if x.len() < 2 || x.len() % 2 != 0 {
        return Err(XoError::InvalidArgument(format!(
            "spectrum length must be even and at least 2, got {}",
            x.len()
        )));
    }

    let nyquist = x.len() / 2;
    let mut out = vec![0.0; nyquist + 1];
    out[0] = x[0].norm();
    out[nyquist] = x[nyquist].norm();
    for i in 1..nyquist {
        out[i] = x[i].norm() + x[x.len() - i].norm();
    }
    Ok(out)
}

/// Phase of each single-sided bin; bins whose magnitude is effectively zero
/// report a phase of 0
pub fn phase_spectrum(x: &[Complex<f64>], magnitude: &[f64]) -> XoResult<Vec<f64>> {
    if x.len() < 2 || x.len() % 2 != 0 {
        return Err(XoError::InvalidArgument(format!(
            "spectrum length must be even and at least 2, got {}",
            x.len()
        )));
    }
    if magnitude.len() != x.len() / 2 + 1 {
        return Err(XoError::InvalidArgument(format!(
            "magnitude spectrum length {} does not match spectrum length {}",
            magnitude.len(),
            x.len()
        )));
    }

    Ok(magnitude
        .iter()
        .zip(x)
        .map(|(&mag, bin)| if mag > ZERO_EPSILON { bin.arg() } else { 0.0 })
        .collect())
}

/// Signed DC offset recovered from single-sided magnitude and phase
pub fn dc_offset(magnitude: &[f64], phase: &[f64]) -> XoResult<f64> {
    match (magnitude.first(), phase.first()) {
        (Some(&mag), Some(&ph)) => Ok(if ph.abs() < PHASE_EPSILON { mag } else { -mag }),
        _ => Err(XoError::invalid("spectra must not be empty")),
    }
}

/// 20·log10 of a linear value (zero maps to 0 dB)
#[inline]
pub fn to_decibels(value: f64) -> f64 {
    Decibels::from_gain(value).0
}

/// Convert a whole vector to decibels
pub fn scale_to_decibels(values: &[f64]) -> Vec<f64> {
    values.iter().map(|&v| to_decibels(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rustfft::FftPlanner;

    fn test_signal(len: usize) -> Vec<Complex<f64>> {
        (0..len)
            .map(|i| {
                let t = i as f64;
                Complex::new((0.3 * t).sin() + 0.25, (0.7 * t).cos() * 0.5)
            })
            .collect()
    }

    fn assert_close(a: &[Complex<f64>], b: &[Complex<f64>], eps: f64) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert_abs_diff_eq!(x.re, y.re, epsilon = eps);
            assert_abs_diff_eq!(x.im, y.im, epsilon = eps);
        }
    }

    #[test]
    fn test_power_of_two_helpers() {
        assert!(is_power_of_two(2));
        assert!(is_power_of_two(4096));
        assert!(!is_power_of_two(1));
        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(12));

        assert_eq!(next_power_of_two(2).unwrap(), 2);
        assert_eq!(next_power_of_two(3530).unwrap(), 4096);
        assert_eq!(next_power_of_two(4096).unwrap(), 4096);
        assert!(next_power_of_two(1).is_err());
    }

    #[test]
    fn test_fft_matches_rustfft() {
        let signal = test_signal(64);

        let mut ours = signal.clone();
        fft_unscaled(&mut ours).unwrap();

        let mut reference = signal;
        FftPlanner::<f64>::new()
            .plan_fft_forward(64)
            .process(&mut reference);

        assert_close(&ours, &reference, 1e-9);
    }

    #[test]
    fn test_fft_round_trip() {
        for &len in &[2usize, 8, 256, 4096] {
            let signal = test_signal(len);
            let mut data = signal.clone();
            fft_unscaled(&mut data).unwrap();
            ifft(&mut data).unwrap();
            assert_close(&data, &signal, 1e-9);

            let mut data = signal.clone();
            fft(&mut data).unwrap();
            ifft_unscaled(&mut data).unwrap();
            assert_close(&data, &signal, 1e-9);
        }
    }

    #[test]
    fn test_dft_agrees_with_fft() {
        let signal = test_signal(32);

        let direct = dft(&signal).unwrap();
        let mut fast = signal.clone();
        fft(&mut fast).unwrap();
        assert_close(&direct, &fast, 1e-9);

        let direct = dft_unscaled(&signal).unwrap();
        let mut fast = signal.clone();
        fft_unscaled(&mut fast).unwrap();
        assert_close(&direct, &fast, 1e-9);
    }

    #[test]
    fn test_dft_round_trip_any_length() {
        let signal = test_signal(12);
        let spectrum = dft(&signal).unwrap();
        let back = idft(&spectrum).unwrap();
        assert_close(&back, &signal, 1e-9);

        let spectrum = dft_unscaled(&signal).unwrap();
        let back = idft_scaled(&spectrum).unwrap();
        assert_close(&back, &signal, 1e-9);
    }

    #[test]
    fn test_fft_rejects_bad_lengths() {
        let mut empty: Vec<Complex<f64>> = Vec::new();
        assert!(matches!(fft(&mut empty), Err(XoError::InvalidArgument(_))));
        assert!(dft(&empty).is_err());
        assert!(idft(&empty).is_err());

        let mut odd = test_signal(12);
        assert!(matches!(
            fft_unscaled(&mut odd),
            Err(XoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_impulse_has_flat_spectrum() {
        let mut data = vec![ZERO; 16];
        data[0] = Complex::new(1.0, 0.0);
        fft_unscaled(&mut data).unwrap();
        for bin in &data {
            assert_abs_diff_eq!(bin.re, 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(bin.im, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_magnitude_and_phase_spectrum() {
        // Cosine at bin 2 plus a negative DC offset
        let n = 16;
        let signal: Vec<f64> = (0..n)
            .map(|i| -0.5 + (TAU * 2.0 * i as f64 / n as f64).cos())
            .collect();
        let mut spectrum = pad_to_complex(&signal).unwrap();
        fft(&mut spectrum).unwrap();

        let magnitude = magnitude_spectrum(&spectrum).unwrap();
        assert_eq!(magnitude.len(), n / 2 + 1);
        assert_abs_diff_eq!(magnitude[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(magnitude[2], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(magnitude[3], 0.0, epsilon = 1e-12);

        let phase = phase_spectrum(&spectrum, &magnitude).unwrap();
        assert_eq!(phase[3], 0.0);
        assert_abs_diff_eq!(dc_offset(&magnitude, &phase).unwrap(), -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_pad_to_complex() {
        let padded = pad_to_complex(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(padded.len(), 4);
        assert_eq!(padded[2], Complex::new(3.0, 0.0));
        assert_eq!(padded[3], ZERO);
        assert!(pad_to_complex(&[1.0]).is_err());
    }

    #[test]
    fn test_decibel_guard() {
        assert_eq!(to_decibels(0.0), 0.0);
        assert_abs_diff_eq!(to_decibels(10.0), 20.0, epsilon = 1e-12);
        assert_eq!(scale_to_decibels(&[1.0, 0.0]), vec![0.0, 0.0]);
    }
}
