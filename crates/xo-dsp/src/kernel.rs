//! FIR kernel synthesis
//!
//! Windowed-sinc lowpass design plus the spectral-inversion family built on
//! it. Every kernel has odd length so the center tap is well defined.

use std::f64::consts::TAU;
use std::ops::{Add, Deref};

use xo_core::{XoError, XoResult};

// ============ Constants ============

/// 4-term Blackman-Harris window coefficients
const BLACKMAN_HARRIS: [f64; 4] = [0.35875, -0.48829, 0.14128, -0.01168];

/// Transition-band shaping constant for the Blackman-Harris window
const LENGTH_FACTOR: f64 = 4.0;

/// Largest kernel `kernel_length` will produce (≈ 24 s of taps at 44.1 kHz)
pub const MAX_KERNEL_LEN: usize = 1 << 20;

// ============ Filter Kernel ============

/// Odd-length sequence of real FIR taps
#[derive(Debug, Clone, PartialEq)]
pub struct FilterKernel(Vec<f64>);

impl FilterKernel {
    /// Wrap taps, rejecting empty or even-length input
    pub fn new(taps: Vec<f64>) -> XoResult<Self> {
        if taps.is_empty() || taps.len() % 2 == 0 {
            return Err(XoError::InvalidArgument(format!(
                "kernel length must be an odd positive integer, got {}",
                taps.len()
            )));
        }
        Ok(Self(taps))
    }

    /// Unit impulse (identity kernel) of odd `len`
    pub fn identity(len: usize) -> XoResult<Self> {
        let mut taps = vec![0.0; len];
        if let Some(center) = taps.get_mut(len / 2) {
            *center = 1.0;
        }
        Self::new(taps)
    }

    /// Index of the center tap
    #[inline]
    pub fn center(&self) -> usize {
        (self.0.len() - 1) / 2
    }

    /// Sum of all taps (the DC gain)
    pub fn dc_gain(&self) -> f64 {
        self.0.iter().sum()
    }

    #[inline]
    pub fn taps(&self) -> &[f64] {
        &self.0
    }

    pub fn into_taps(self) -> Vec<f64> {
        self.0
    }

    /// Multiply every tap by `factor`
    pub fn scaled(mut self, factor: f64) -> Self {
        for tap in &mut self.0 {
            *tap *= factor;
        }
        self
    }

    /// Elementwise sum of two kernels of equal length
    pub fn try_add(&self, other: &FilterKernel) -> XoResult<FilterKernel> {
        if self.len() != other.len() {
            return Err(XoError::InvalidArgument(format!(
                "kernel lengths differ: {} vs {}",
                self.len(),
                other.len()
            )));
        }
        Ok(Self(
            self.0.iter().zip(&other.0).map(|(a, b)| a + b).collect(),
        ))
    }
}

impl Deref for FilterKernel {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl AsRef<[f64]> for FilterKernel {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

impl Add for &FilterKernel {
    type Output = XoResult<FilterKernel>;

    fn add(self, rhs: &FilterKernel) -> Self::Output {
        self.try_add(rhs)
    }
}

// ============ Window / Normalization ============

/// Apply the 4-term Blackman-Harris window (period L − 1) in place
pub fn apply_blackman_harris(taps: &mut [f64]) {
    if taps.len() < 2 {
        return;
    }
    let period = (taps.len() - 1) as f64;
    let [a0, a1, a2, a3] = BLACKMAN_HARRIS;

    for (i, tap) in taps.iter_mut().enumerate() {
        let phase = TAU * i as f64 / period;
        *tap *= a0 + a1 * phase.cos() + a2 * (2.0 * phase).cos() + a3 * (3.0 * phase).cos();
    }
}

/// Scale taps so they sum to 1.0; a non-positive sum leaves them untouched
pub fn normalize(taps: &mut [f64]) {
    let sum: f64 = taps.iter().sum();
    if sum > 0.0 {
        for tap in taps.iter_mut() {
            *tap /= sum;
        }
    } else {
        log::warn!("kernel sum {} is not positive, leaving kernel unnormalized", sum);
    }
}

// ============ Design ============

fn validate_design(cutoff_hz: f64, transition_bw_hz: f64, sample_rate: f64) -> XoResult<()> {
    if !(sample_rate > 0.0) {
        return Err(XoError::out_of_range("sample_rate", sample_rate));
    }
    let nyquist = sample_rate / 2.0;
    if !(cutoff_hz > 0.0 && cutoff_hz <= nyquist) {
        return Err(XoError::out_of_range("cutoff_hz", cutoff_hz));
    }
    if !(transition_bw_hz > 0.0 && transition_bw_hz <= nyquist) {
        return Err(XoError::out_of_range("transition_bw_hz", transition_bw_hz));
    }
    Ok(())
}

/// Kernel length for a transition bandwidth: round(4 / (bw / fs)), made odd.
/// Lengths above `MAX_KERNEL_LEN` are rejected.
pub fn kernel_length(transition_bw_hz: f64, sample_rate: f64) -> XoResult<usize> {
    let len = (LENGTH_FACTOR / (transition_bw_hz / sample_rate)).round();
    if !(len.is_finite() && len < MAX_KERNEL_LEN as f64) {
        return Err(XoError::out_of_range("transition_bw_hz", transition_bw_hz));
    }
    let len = len as usize;
    Ok(if len % 2 == 0 { len + 1 } else { len })
}

fn fill_sinc(taps: &mut [f64], cutoff_hz: f64, sample_rate: f64) {
    let omega = TAU * cutoff_hz / sample_rate;
    let mid = (taps.len() - 1) / 2;

    taps[mid] = omega;
    for d in 1..=mid {
        let value = (omega * d as f64).sin() / d as f64;
        taps[mid - d] = value;
        taps[mid + d] = value;
    }
}

/// Windowed-sinc lowpass normalized to unity DC gain
pub fn design_lowpass(
    cutoff_hz: f64,
    transition_bw_hz: f64,
    sample_rate: f64,
) -> XoResult<FilterKernel> {
    validate_design(cutoff_hz, transition_bw_hz, sample_rate)?;

    let mut taps = vec![0.0; kernel_length(transition_bw_hz, sample_rate)?];
    fill_sinc(&mut taps, cutoff_hz, sample_rate);
    apply_blackman_harris(&mut taps);
    normalize(&mut taps);

    log::debug!(
        "Designed lowpass: fc={:.1}Hz bw={:.1}Hz fs={:.0}Hz taps={}",
        cutoff_hz,
        transition_bw_hz,
        sample_rate,
        taps.len()
    );

    FilterKernel::new(taps)
}

/// Highpass as the spectral inversion of the matching lowpass
pub fn design_highpass(
    cutoff_hz: f64,
    transition_bw_hz: f64,
    sample_rate: f64,
) -> XoResult<FilterKernel> {
    let lowpass = design_lowpass(cutoff_hz, transition_bw_hz, sample_rate)?;
    Ok(spectral_inversion(&lowpass))
}

/// Negate every tap and add 1.0 at the center: the exact complement
pub fn spectral_inversion(kernel: &FilterKernel) -> FilterKernel {
    let mut taps: Vec<f64> = kernel.iter().map(|&t| -t).collect();
    taps[kernel.center()] += 1.0;
    FilterKernel(taps)
}

/// Bandpass as the inversion of the notch `lowpass + highpass`
pub fn design_bandpass(lowpass: &FilterKernel, highpass: &FilterKernel) -> XoResult<FilterKernel> {
    let notch = lowpass.try_add(highpass)?;
    Ok(spectral_inversion(&notch))
}

// ============ Length Equalization ============

/// Zero-pad `kernel` symmetrically to `new_len`
pub fn pad_kernel(kernel: &FilterKernel, new_len: usize) -> XoResult<FilterKernel> {
    if new_len < kernel.len() + 2 || new_len % 2 == 0 {
        return Err(XoError::InvalidArgument(format!(
            "padded length {} must be odd and at least {}",
            new_len,
            kernel.len() + 2
        )));
    }

    let offset = (new_len - kernel.len()) / 2;
    let mut taps = vec![0.0; new_len];
    taps[offset..offset + kernel.len()].copy_from_slice(kernel);
    Ok(FilterKernel(taps))
}

/// Pad the shorter of two kernels so both share the longer length
pub fn equalize_lengths(a: &mut FilterKernel, b: &mut FilterKernel) -> XoResult<()> {
    if a.len() > b.len() {
        *b = pad_kernel(b, a.len())?;
    } else if b.len() > a.len() {
        *a = pad_kernel(a, b.len())?;
    }
    Ok(())
}

/// Pad every kernel to the longest length among them
pub fn equalize_all(kernels: &mut [FilterKernel]) -> XoResult<()> {
    let Some(longest) = kernels.iter().map(|k| k.len()).max() else {
        return Ok(());
    };
    for kernel in kernels.iter_mut() {
        if kernel.len() < longest {
            *kernel = pad_kernel(kernel, longest)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_kernel_rejects_even_length() {
        assert!(FilterKernel::new(vec![]).is_err());
        assert!(FilterKernel::new(vec![0.0; 4]).is_err());
        assert!(FilterKernel::new(vec![0.0; 5]).is_ok());
        assert!(FilterKernel::identity(6).is_err());
    }

    #[test]
    fn test_lowpass_length_and_dc_gain() {
        let kernel = design_lowpass(1000.0, 100.0, 44100.0).unwrap();
        assert_eq!(kernel.len(), 1765);
        assert_abs_diff_eq!(kernel.dc_gain(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_lowpass_is_symmetric() {
        let kernel = design_lowpass(3000.0, 800.0, 48000.0).unwrap();
        let n = kernel.len();
        for i in 0..n / 2 {
            assert_abs_diff_eq!(kernel[i], kernel[n - 1 - i], epsilon = 1e-15);
        }
    }

    #[test]
    fn test_even_length_bumped_to_odd() {
        // 4 / (1000 / 48000) = 192
        assert_eq!(kernel_length(1000.0, 48000.0).unwrap(), 193);
        // 4 / (400 / 44100) = 441 (already odd)
        assert_eq!(kernel_length(400.0, 44100.0).unwrap(), 441);
    }

    #[test]
    fn test_tiny_bandwidth_rejected() {
        assert!(matches!(
            kernel_length(1e-9, 44100.0),
            Err(XoError::OutOfRange { name: "transition_bw_hz", .. })
        ));
        assert!(matches!(
            design_lowpass(1000.0, 1e-9, 44100.0),
            Err(XoError::OutOfRange { name: "transition_bw_hz", .. })
        ));
        // Just inside the limit still designs
        assert!(kernel_length(0.2, 44100.0).unwrap() < MAX_KERNEL_LEN);
    }

    #[test]
    fn test_lowpass_validation() {
        assert!(matches!(
            design_lowpass(1000.0, 100.0, 0.0),
            Err(XoError::OutOfRange { name: "sample_rate", .. })
        ));
        assert!(design_lowpass(0.0, 100.0, 44100.0).is_err());
        assert!(design_lowpass(22051.0, 100.0, 44100.0).is_err());
        assert!(design_lowpass(1000.0, 0.0, 44100.0).is_err());
        assert!(design_lowpass(1000.0, 22051.0, 44100.0).is_err());
    }

    #[test]
    fn test_complementary_sum_is_unit_impulse() {
        let lowpass = design_lowpass(2500.0, 500.0, 44100.0).unwrap();
        let highpass = spectral_inversion(&lowpass);
        let sum = (&lowpass + &highpass).unwrap();
        let center = (sum.len() - 1) / 2;

        for (i, &tap) in sum.iter().enumerate() {
            let expected = if i == center { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(tap, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let highpass = design_highpass(500.0, 200.0, 44100.0).unwrap();
        assert_abs_diff_eq!(highpass.dc_gain(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bandpass_requires_equal_lengths() {
        let lowpass = design_lowpass(500.0, 200.0, 44100.0).unwrap();
        let highpass = design_highpass(4000.0, 400.0, 44100.0).unwrap();
        assert!(matches!(
            design_bandpass(&lowpass, &highpass),
            Err(XoError::InvalidArgument(_))
        ));

        let mut lowpass = lowpass;
        let mut highpass = highpass;
        equalize_lengths(&mut lowpass, &mut highpass).unwrap();
        let bandpass = design_bandpass(&lowpass, &highpass).unwrap();
        assert_eq!(bandpass.len(), lowpass.len());
        assert_abs_diff_eq!(bandpass.dc_gain(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pad_kernel_centers_taps() {
        let kernel = FilterKernel::new(vec![1.0, 2.0, 3.0]).unwrap();
        let padded = pad_kernel(&kernel, 7).unwrap();
        assert_eq!(padded.taps(), &[0.0, 0.0, 1.0, 2.0, 3.0, 0.0, 0.0]);
        assert_eq!(padded.center(), 3);

        assert!(pad_kernel(&kernel, 4).is_err());
        assert!(pad_kernel(&kernel, 3).is_err());
        assert!(pad_kernel(&kernel, 6).is_err());
    }

    #[test]
    fn test_equalize_all() {
        let mut kernels = vec![
            FilterKernel::identity(3).unwrap(),
            FilterKernel::identity(9).unwrap(),
            FilterKernel::identity(5).unwrap(),
        ];
        equalize_all(&mut kernels).unwrap();
        for kernel in &kernels {
            assert_eq!(kernel.len(), 9);
            assert_eq!(kernel[4], 1.0);
        }
    }

    #[test]
    fn test_normalize_skips_non_positive_sum() {
        let mut taps = vec![1.0, -2.0, 1.0];
        normalize(&mut taps);
        assert_eq!(taps, vec![1.0, -2.0, 1.0]);

        let mut taps = vec![1.0, 2.0, 1.0];
        normalize(&mut taps);
        assert_eq!(taps, vec![0.25, 0.5, 0.25]);
    }
}
