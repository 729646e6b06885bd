//! De-emphasis filter design
//!
//! Samples the analog shelving network
//!
//! ```text
//! I(ω) = (1 + jωR1C1) / (1 + jω(R1 + Rf)C1)
//! ```
//!
//! on an FFT grid, inverse transforms it into an FIR kernel and optionally
//! measures how far the result deviates from the analog target.

use std::f64::consts::TAU;

use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use xo_core::{XoError, XoResult};

use crate::fourier::{ifft, is_power_of_two, to_decibels};
use crate::kernel::apply_blackman_harris;
use crate::response::{FilterResponse, analyze};

// ============ Network ============

/// Series resistor (Ω)
pub const R1: f64 = 15_000.0;
/// Shunt resistor (Ω)
pub const RF: f64 = 35_000.0;
/// Capacitor (F)
pub const C1: f64 = 1e-9;

/// Smallest accepted kernel length
pub const MIN_LENGTH: usize = 8;

/// Complex response of the network at `frequency` Hz
pub fn network_response(frequency: f64) -> Complex<f64> {
    let y = R1 * C1;
    let z = (RF + R1) * C1;
    let omega = TAU * frequency;
    let denominator = 1.0 + z * z * omega * omega;

    Complex::new(
        (1.0 + y * z * omega * omega) / denominator,
        (y - z) * omega / denominator,
    )
}

/// Closed-form group delay of the network (seconds)
pub fn network_group_delay(frequency: f64) -> f64 {
    let omega = TAU * frequency;
    let omega2 = omega * omega;
    let c2 = C1 * C1;

    let a = c2 * omega2 * R1 * R1 + c2 * omega2 * R1 * RF + 1.0;
    let a2 = a * a;
    let denominator = c2 * omega2 * RF * RF / a2 + 1.0;
    let b = C1 * omega * RF * (2.0 * c2 * omega * R1 * R1 + 2.0 * c2 * omega * R1 * RF);
    let numerator = C1 * RF / a - b / a2;

    numerator / denominator
}

fn check_length(length: usize, sample_rate: f64) -> XoResult<()> {
    if length < MIN_LENGTH || !is_power_of_two(length) {
        return Err(XoError::out_of_range("length", length as f64));
    }
    if !(sample_rate > 0.0) {
        return Err(XoError::out_of_range("sample_rate", sample_rate));
    }
    Ok(())
}

// ============ Ideal Response ============

/// The analog target sampled at `f_i = fs·(i − (N/2 − 1))/N`.
///
/// Index `dc_index()` holds DC; the last index holds Nyquist.
#[derive(Debug, Clone, PartialEq)]
pub struct IdealResponse {
    pub sample_rate: f64,
    pub bin_size: f64,
    pub frequency: Vec<f64>,
    pub complex_response: Vec<Complex<f64>>,
    pub amplitude_linear: Vec<f64>,
    pub amplitude_db: Vec<f64>,
    pub phase: Vec<f64>,
    pub phase_delay: Vec<f64>,
    pub group_delay: Vec<f64>,
}

impl IdealResponse {
    /// Sample the network on an `length`-point grid
    pub fn calculate(length: usize, sample_rate: f64) -> XoResult<Self> {
        check_length(length, sample_rate)?;

        let offset = length / 2 - 1;
        let frequency: Vec<f64> = (0..length)
            .map(|i| sample_rate * (i as f64 - offset as f64) / length as f64)
            .collect();
        let complex_response: Vec<Complex<f64>> =
            frequency.iter().map(|&f| network_response(f)).collect();

        let amplitude_linear: Vec<f64> = complex_response.iter().map(|h| h.norm()).collect();
        let amplitude_db = amplitude_linear.iter().map(|&a| to_decibels(a)).collect();
        let phase: Vec<f64> = complex_response.iter().map(|h| (h.im / h.re).atan()).collect();
        let phase_delay = frequency
            .iter()
            .zip(&phase)
            .map(|(&f, &p)| if f == 0.0 { C1 * RF } else { p / (-TAU * f) })
            .collect();
        let group_delay = frequency.iter().map(|&f| network_group_delay(f)).collect();

        Ok(Self {
            sample_rate,
            bin_size: sample_rate / length as f64,
            frequency,
            complex_response,
            amplitude_linear,
            amplitude_db,
            phase,
            phase_delay,
            group_delay,
        })
    }

    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }

    /// Index of the DC bin
    #[inline]
    pub fn dc_index(&self) -> usize {
        self.len() / 2 - 1
    }
}

// ============ Deviation ============

/// Designed-minus-ideal response, DC to Nyquist.
///
/// Delays are offset-corrected so both curves agree at DC; the kernel's
/// bulk latency does not show up as deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    pub frequency: Vec<f64>,
    pub amplitude_db: Vec<f64>,
    pub phase_delay: Vec<f64>,
    pub group_delay: Vec<f64>,
    pub amplitude_min: f64,
    pub amplitude_max: f64,
    pub phase_delay_min: f64,
    pub phase_delay_max: f64,
    pub group_delay_min: f64,
    pub group_delay_max: f64,
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

impl Deviation {
    /// Compare `actual` (N/2 + 1 points) against `ideal` (N points)
    pub fn calculate(ideal: &IdealResponse, actual: &FilterResponse) -> XoResult<Self> {
        let dc = ideal.dc_index();
        if actual.is_empty() || dc + actual.len() > ideal.len() {
            return Err(XoError::InvalidArgument(format!(
                "response with {} points does not fit an ideal grid of {}",
                actual.len(),
                ideal.len()
            )));
        }
        let ideal_at = |values: &[f64], i: usize| values[dc + i];

        let amplitude_db: Vec<f64> = (0..actual.len())
            .map(|i| actual.amplitude_db[i] - ideal_at(&ideal.amplitude_db, i))
            .collect();

        let offset = actual.phase_delay[0] - ideal.phase_delay[dc];
        let phase_delay: Vec<f64> = (0..actual.len())
            .map(|i| actual.phase_delay[i] - ideal_at(&ideal.phase_delay, i) - offset)
            .collect();

        let offset = actual.group_delay[0] - ideal.group_delay[dc];
        let group_delay: Vec<f64> = (0..actual.len())
            .map(|i| actual.group_delay[i] - ideal_at(&ideal.group_delay, i) - offset)
            .collect();

        let (amplitude_min, amplitude_max) = min_max(&amplitude_db);
        let (phase_delay_min, phase_delay_max) = min_max(&phase_delay);
        let (group_delay_min, group_delay_max) = min_max(&group_delay);

        Ok(Self {
            frequency: actual.frequency.clone(),
            amplitude_db,
            phase_delay,
            group_delay,
            amplitude_min,
            amplitude_max,
            phase_delay_min,
            phase_delay_max,
            group_delay_min,
            group_delay_max,
        })
    }
}

// ============ Filter ============

/// Actual response of the designed kernel and its deviation from the target
#[derive(Debug, Clone)]
pub struct DeemphasisAnalysis {
    pub actual: FilterResponse,
    pub deviation: Deviation,
}

/// A designed de-emphasis filter
#[derive(Debug, Clone)]
pub struct Deemphasis {
    pub length: usize,
    pub sample_rate: f64,
    pub bin_size: f64,
    pub correct_phase: bool,
    /// Even-length (power of two) kernel centered at `length / 2`
    pub kernel: Vec<f64>,
    pub ideal: IdealResponse,
    analysis: Option<DeemphasisAnalysis>,
}

impl Deemphasis {
    pub fn analysis(&self) -> Option<&DeemphasisAnalysis> {
        self.analysis.as_ref()
    }
}

fn synthesize_kernel(ideal: &IdealResponse, correct_phase: bool) -> XoResult<Vec<f64>> {
    let len = ideal.len();
    let dc = ideal.dc_index();

    // Natural FFT order: DC .. Nyquist, then the negative harmonics
    let mut spectrum = ideal.complex_response.clone();
    spectrum.rotate_left(dc);
    let nyquist = len - dc - 1;

    if !correct_phase {
        for bin in spectrum.iter_mut() {
            *bin = Complex::new(bin.norm(), 0.0);
        }
    }
    spectrum[nyquist] = Complex::new(spectrum[nyquist].norm(), 0.0);

    ifft(&mut spectrum)?;

    let mut kernel: Vec<f64> = spectrum.iter().map(|c| c.re).collect();
    kernel.rotate_left(len / 2);
    apply_blackman_harris(&mut kernel);
    Ok(kernel)
}

/// Design a `length`-tap de-emphasis kernel.
///
/// `correct_phase = false` discards the target's phase for a linear-phase
/// design. `do_analysis` measures the result against the target.
pub fn create_deemphasis_filter(
    length: usize,
    sample_rate: f64,
    correct_phase: bool,
    do_analysis: bool,
) -> XoResult<Deemphasis> {
    check_length(length, sample_rate)?;
    let bin_size = sample_rate / length as f64;
    if !(bin_size > 0.0 && bin_size <= sample_rate / 4.0) {
        return Err(XoError::out_of_range("bin_size", bin_size));
    }

    let ideal = IdealResponse::calculate(length, sample_rate)?;
    let kernel = synthesize_kernel(&ideal, correct_phase)?;

    let analysis = if do_analysis {
        let actual = analyze(&kernel, sample_rate, bin_size)?;
        let deviation = Deviation::calculate(&ideal, &actual)?;
        log::debug!(
            "De-emphasis deviation: amplitude [{:.3}, {:.3}] dB, group delay [{:.2e}, {:.2e}] s",
            deviation.amplitude_min,
            deviation.amplitude_max,
            deviation.group_delay_min,
            deviation.group_delay_max
        );
        Some(DeemphasisAnalysis { actual, deviation })
    } else {
        None
    };

    log::debug!(
        "Designed de-emphasis: {} taps at {:.0}Hz, correct_phase={}",
        length,
        sample_rate,
        correct_phase
    );

    Ok(Deemphasis {
        length,
        sample_rate,
        bin_size,
        correct_phase,
        kernel,
        ideal,
        analysis,
    })
}
