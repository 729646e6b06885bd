//! Crossover design
//!
//! Splits the spectrum into 2, 3 or 4 complementary bands. Every band kernel
//! is derived from windowed-sinc lowpasses through spectral inversion, so the
//! bands sum back to a unit impulse (before headroom scaling).

use serde::{Deserialize, Serialize};
use xo_core::{XoError, XoResult};

use crate::kernel::{
    FilterKernel, design_bandpass, design_highpass, design_lowpass, equalize_all,
    equalize_lengths, spectral_inversion,
};
use crate::response::{FilterResponse, analyze};

/// Gain applied to every band when headroom is requested
pub const HEADROOM_SCALE: f64 = 0.94;

// ============ Types ============

/// Crossover topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossoverType {
    TwoWay,
    ThreeWay,
    FourWay,
}

impl CrossoverType {
    /// Number of output bands
    pub fn band_count(self) -> usize {
        match self {
            Self::TwoWay => 2,
            Self::ThreeWay => 3,
            Self::FourWay => 4,
        }
    }

    /// Band names, lowest first
    pub fn bands(self) -> &'static [Band] {
        match self {
            Self::TwoWay => &[Band::Woofer, Band::Tweeter],
            Self::ThreeWay => &[Band::Woofer, Band::Midrange, Band::Tweeter],
            Self::FourWay => &[Band::Woofer, Band::Midrange, Band::UpperMid, Band::Tweeter],
        }
    }
}

/// Output band of a crossover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Band {
    Woofer,
    Midrange,
    UpperMid,
    Tweeter,
}

impl Band {
    pub fn name(self) -> &'static str {
        match self {
            Self::Woofer => "woofer",
            Self::Midrange => "midrange",
            Self::UpperMid => "upper-mid",
            Self::Tweeter => "tweeter",
        }
    }
}

/// Design-time analysis of a crossover
#[derive(Debug, Clone)]
pub struct CrossoverAnalysis {
    /// Elementwise sum of every band kernel
    pub summed_kernel: FilterKernel,
    /// One response per band, lowest first
    pub band_responses: Vec<FilterResponse>,
    pub summed_response: FilterResponse,
}

/// A fully designed crossover
#[derive(Debug, Clone)]
pub struct Crossover {
    pub crossover_type: CrossoverType,
    /// Crossover frequencies in Hz, ascending
    pub frequencies: Vec<f64>,
    /// Transition bandwidth per crossover frequency, in Hz
    pub transition_bandwidths: Vec<f64>,
    pub sample_rate: f64,
    pub normalized: bool,
    /// 1.0, or `HEADROOM_SCALE` when normalized
    pub scaling_factor: f64,
    /// Latency in samples (kernel length / 2)
    pub output_signal_delay: usize,
    pub bin_size: f64,
    kernels: Vec<FilterKernel>,
    analysis: Option<CrossoverAnalysis>,
}

impl Crossover {
    /// Band kernels, lowest band first. All share one length.
    pub fn kernels(&self) -> &[FilterKernel] {
        &self.kernels
    }

    pub fn into_kernels(self) -> Vec<FilterKernel> {
        self.kernels
    }

    /// Kernel for `band`, if this topology has it
    pub fn kernel(&self, band: Band) -> Option<&FilterKernel> {
        let index = self.crossover_type.bands().iter().position(|&b| b == band)?;
        self.kernels.get(index)
    }

    pub fn kernel_len(&self) -> usize {
        self.kernels.first().map_or(0, |k| k.len())
    }

    pub fn band_count(&self) -> usize {
        self.kernels.len()
    }

    pub fn analysis(&self) -> Option<&CrossoverAnalysis> {
        self.analysis.as_ref()
    }
}

// ============ Validation ============

fn check_sample_rate(sample_rate: f64) -> XoResult<()> {
    if !(sample_rate > 0.0) {
        return Err(XoError::out_of_range("sample_rate", sample_rate));
    }
    Ok(())
}

fn check_bandwidth(name: &'static str, bw: f64, limit: f64) -> XoResult<()> {
    if !(bw > 0.0 && bw <= limit) {
        return Err(XoError::out_of_range(name, bw));
    }
    Ok(())
}

fn check_bin_size(bin_size: f64, sample_rate: f64) -> XoResult<()> {
    if !(bin_size > 0.0 && bin_size <= sample_rate / 4.0) {
        return Err(XoError::out_of_range("bin_size", bin_size));
    }
    Ok(())
}

/// Cutoffs ascending, each transition band clear of its neighbours and of
/// DC and Nyquist
fn check_spacing(frequencies: &[f64], bandwidths: &[f64], sample_rate: f64) -> XoResult<()> {
    let (Some(&first), Some(&last)) = (frequencies.first(), frequencies.last()) else {
        return Err(XoError::invalid("at least one crossover frequency is required"));
    };
    let (Some(&first_bw), Some(&last_bw)) = (bandwidths.first(), bandwidths.last()) else {
        return Err(XoError::invalid("at least one transition bandwidth is required"));
    };

    if first < first_bw / 2.0 {
        return Err(XoError::out_of_range("crossover_frequency_1", first));
    }

    for i in 1..frequencies.len() {
        if frequencies[i - 1] + bandwidths[i - 1] / 2.0 > frequencies[i] - bandwidths[i] / 2.0 {
            return Err(XoError::InvalidArgument(format!(
                "crossover frequencies {} Hz and {} Hz are too close for their transition bands",
                frequencies[i - 1],
                frequencies[i]
            )));
        }
    }

    if last > sample_rate / 2.0 - last_bw / 2.0 {
        return Err(XoError::out_of_range("crossover_frequency", last));
    }
    Ok(())
}

// ============ Assembly ============

struct Design {
    crossover_type: CrossoverType,
    frequencies: Vec<f64>,
    transition_bandwidths: Vec<f64>,
    sample_rate: f64,
    normalized: bool,
    do_analysis: bool,
    bin_size: f64,
}

impl Design {
    fn finish(self, kernels: Vec<FilterKernel>) -> XoResult<Crossover> {
        let scaling_factor = if self.normalized { HEADROOM_SCALE } else { 1.0 };
        let kernels: Vec<FilterKernel> = if self.normalized {
            kernels.into_iter().map(|k| k.scaled(scaling_factor)).collect()
        } else {
            kernels
        };

        let output_signal_delay = kernels.first().map_or(0, |k| k.len() / 2);

        let analysis = if self.do_analysis {
            Some(analyze_bands(&kernels, self.sample_rate, self.bin_size)?)
        } else {
            None
        };

        log::debug!(
            "Designed {:?} crossover at {:?} Hz: {} bands x {} taps, delay {} samples",
            self.crossover_type,
            self.frequencies,
            kernels.len(),
            kernels.first().map_or(0, |k| k.len()),
            output_signal_delay
        );

        Ok(Crossover {
            crossover_type: self.crossover_type,
            frequencies: self.frequencies,
            transition_bandwidths: self.transition_bandwidths,
            sample_rate: self.sample_rate,
            normalized: self.normalized,
            scaling_factor,
            output_signal_delay,
            bin_size: self.bin_size,
            kernels,
            analysis,
        })
    }
}

fn analyze_bands(
    kernels: &[FilterKernel],
    sample_rate: f64,
    bin_size: f64,
) -> XoResult<CrossoverAnalysis> {
    let (first, rest) = kernels
        .split_first()
        .ok_or_else(|| XoError::invalid("crossover has no bands"))?;

    let mut summed_kernel = first.clone();
    for kernel in rest {
        summed_kernel = summed_kernel.try_add(kernel)?;
    }

    let band_responses = kernels
        .iter()
        .map(|k| analyze(k, sample_rate, bin_size))
        .collect::<XoResult<Vec<_>>>()?;
    let summed_response = analyze(&summed_kernel, sample_rate, bin_size)?;

    Ok(CrossoverAnalysis {
        summed_kernel,
        band_responses,
        summed_response,
    })
}

// ============ Factories ============

/// Lowpass woofer and its spectral inversion for the tweeter
pub fn create_two_way(
    crossover_hz: f64,
    transition_bw_hz: f64,
    sample_rate: f64,
    normalized: bool,
    do_analysis: bool,
    bin_size: f64,
) -> XoResult<Crossover> {
    check_sample_rate(sample_rate)?;
    check_bandwidth("transition_bandwidth", transition_bw_hz, sample_rate / 6.0)?;
    check_bin_size(bin_size, sample_rate)?;
    if crossover_hz < transition_bw_hz / 2.0
        || crossover_hz > sample_rate / 2.0 - transition_bw_hz / 2.0
    {
        return Err(XoError::out_of_range("crossover_frequency", crossover_hz));
    }

    let woofer = design_lowpass(crossover_hz, transition_bw_hz, sample_rate)?;
    let tweeter = spectral_inversion(&woofer);

    Design {
        crossover_type: CrossoverType::TwoWay,
        frequencies: vec![crossover_hz],
        transition_bandwidths: vec![transition_bw_hz],
        sample_rate,
        normalized,
        do_analysis,
        bin_size,
    }
    .finish(vec![woofer, tweeter])
}

/// Woofer LP(f1), tweeter HP(f2), midrange = inversion(woofer + tweeter)
#[allow(clippy::too_many_arguments)]
pub fn create_three_way(
    crossover1_hz: f64,
    crossover2_hz: f64,
    transition_bw1_hz: f64,
    transition_bw2_hz: f64,
    sample_rate: f64,
    normalized: bool,
    do_analysis: bool,
    bin_size: f64,
) -> XoResult<Crossover> {
    check_sample_rate(sample_rate)?;
    check_bandwidth("transition_bandwidth_1", transition_bw1_hz, sample_rate / 6.0)?;
    check_bandwidth("transition_bandwidth_2", transition_bw2_hz, sample_rate / 6.0)?;
    check_bin_size(bin_size, sample_rate)?;

    let frequencies = vec![crossover1_hz, crossover2_hz];
    let bandwidths = vec![transition_bw1_hz, transition_bw2_hz];
    check_spacing(&frequencies, &bandwidths, sample_rate)?;

    let mut woofer = design_lowpass(crossover1_hz, transition_bw1_hz, sample_rate)?;
    let mut tweeter = design_highpass(crossover2_hz, transition_bw2_hz, sample_rate)?;
    equalize_lengths(&mut woofer, &mut tweeter)?;
    let midrange = design_bandpass(&woofer, &tweeter)?;

    Design {
        crossover_type: CrossoverType::ThreeWay,
        frequencies,
        transition_bandwidths: bandwidths,
        sample_rate,
        normalized,
        do_analysis,
        bin_size,
    }
    .finish(vec![woofer, midrange, tweeter])
}

/// Woofer LP(f1), midrange BP(f1, f2), upper-mid BP(f2, f3), tweeter HP(f3)
pub fn create_four_way(
    frequencies_hz: [f64; 3],
    transition_bws_hz: [f64; 3],
    sample_rate: f64,
    normalized: bool,
    do_analysis: bool,
    bin_size: f64,
) -> XoResult<Crossover> {
    const BW_NAMES: [&str; 3] = [
        "transition_bandwidth_1",
        "transition_bandwidth_2",
        "transition_bandwidth_3",
    ];

    check_sample_rate(sample_rate)?;
    for (name, bw) in BW_NAMES.into_iter().zip(transition_bws_hz) {
        check_bandwidth(name, bw, sample_rate / 8.0)?;
    }
    check_bin_size(bin_size, sample_rate)?;
    check_spacing(&frequencies_hz, &transition_bws_hz, sample_rate)?;

    let [f1, f2, f3] = frequencies_hz;
    let [bw1, bw2, bw3] = transition_bws_hz;

    let mut woofer = design_lowpass(f1, bw1, sample_rate)?;
    let mut highpass2 = design_highpass(f2, bw2, sample_rate)?;
    equalize_lengths(&mut woofer, &mut highpass2)?;
    let midrange = design_bandpass(&woofer, &highpass2)?;

    let mut tweeter = design_highpass(f3, bw3, sample_rate)?;
    let mut lowpass2 = design_lowpass(f2, bw2, sample_rate)?;
    equalize_lengths(&mut lowpass2, &mut tweeter)?;
    let upper_mid = design_bandpass(&lowpass2, &tweeter)?;

    let mut kernels = vec![woofer, midrange, upper_mid, tweeter];
    equalize_all(&mut kernels)?;

    Design {
        crossover_type: CrossoverType::FourWay,
        frequencies: frequencies_hz.to_vec(),
        transition_bandwidths: transition_bws_hz.to_vec(),
        sample_rate,
        normalized,
        do_analysis,
        bin_size,
    }
    .finish(kernels)
}
