//! xover: FIR crossover and de-emphasis tool
//!
//! Usage:
//!   xover design --kind three-way -f 500,4000 -b 200,800 --bin-size 10
//!   xover deemphasis --length 4096 --correct-phase
//!   xover render --input in.wav --band 0 --output woofer.wav

mod wav;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde::de::DeserializeOwned;

use xo_core::{AudioFilter, MemorySource, Sample, StereoSample, interleave_stereo};
use xo_dsp::config::{CrossoverConfig, DeemphasisConfig};
use xo_dsp::crossover::{Crossover, CrossoverType};
use xo_dsp::deemphasis::{Deemphasis, Deviation};
use xo_dsp::filters::{BandSelect, CrossoverFilter, DeemphasisFilter, VolumeControl};
use xo_dsp::response::FilterResponse;

#[derive(Parser)]
#[command(name = "xover", version, about = "Linear-phase FIR crossover and de-emphasis filters")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Design a crossover and print its band layout
    Design {
        #[command(flatten)]
        crossover: CrossoverArgs,

        /// Analyze band responses at this resolution (Hz)
        #[arg(long)]
        bin_size: Option<f64>,

        /// Write kernels and responses as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Design a de-emphasis filter and report its deviation from the analog network
    Deemphasis {
        #[command(flatten)]
        deemphasis: DeemphasisArgs,

        /// Write the kernel and deviation as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Stream a WAV file (or a test tone) through a filter chain
    Render {
        /// Input WAV (stereo); a test tone is generated when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Test tone frequency (Hz)
        #[arg(long, default_value_t = 1000.0)]
        tone: f64,

        /// Test tone duration (s)
        #[arg(long, default_value_t = 1.0)]
        seconds: f64,

        #[command(flatten)]
        crossover: CrossoverArgs,

        /// Insert a de-emphasis stage ahead of the crossover
        #[arg(long)]
        deemphasis: bool,

        /// JSON de-emphasis config for the inserted stage
        #[arg(long, requires = "deemphasis")]
        deemphasis_config: Option<PathBuf>,

        /// Keep only this band (0 = woofer)
        #[arg(long)]
        band: Option<usize>,

        /// Output volume, 0..1
        #[arg(long, default_value_t = 1.0)]
        volume: f64,

        /// Output WAV (32-bit float)
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    TwoWay,
    ThreeWay,
    FourWay,
}

impl From<Kind> for CrossoverType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::TwoWay => Self::TwoWay,
            Kind::ThreeWay => Self::ThreeWay,
            Kind::FourWay => Self::FourWay,
        }
    }
}

#[derive(Args)]
struct CrossoverArgs {
    /// JSON crossover config; replaces the flags below
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Crossover topology
    #[arg(short, long, value_enum, default_value = "three-way")]
    kind: Kind,

    /// Crossover frequencies (Hz), comma separated
    #[arg(short, long, value_delimiter = ',')]
    freq: Vec<f64>,

    /// Transition bandwidths (Hz), comma separated
    #[arg(short, long, value_delimiter = ',')]
    bandwidth: Vec<f64>,

    /// Sample rate (Hz)
    #[arg(short = 'r', long, default_value_t = 44100.0)]
    sample_rate: f64,

    /// Skip the headroom scaling
    #[arg(long)]
    no_headroom: bool,
}

impl CrossoverArgs {
    fn to_config(&self) -> Result<CrossoverConfig> {
        if let Some(path) = &self.config {
            return load_json(path);
        }

        let mut config = match CrossoverType::from(self.kind) {
            CrossoverType::TwoWay => CrossoverConfig::two_way(),
            CrossoverType::ThreeWay => CrossoverConfig::three_way(),
            CrossoverType::FourWay => CrossoverConfig::four_way(),
        };
        if !self.freq.is_empty() || !self.bandwidth.is_empty() {
            if self.freq.len() != self.bandwidth.len() {
                bail!(
                    "{} frequencies but {} bandwidths",
                    self.freq.len(),
                    self.bandwidth.len()
                );
            }
            let points: Vec<(f64, f64)> = self
                .freq
                .iter()
                .copied()
                .zip(self.bandwidth.iter().copied())
                .collect();
            config = config.with_points(&points);
        }
        Ok(config
            .with_sample_rate(self.sample_rate)
            .with_normalized(!self.no_headroom))
    }
}

#[derive(Args)]
struct DeemphasisArgs {
    /// JSON de-emphasis config; replaces the flags below
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Kernel length (power of two)
    #[arg(short, long, default_value_t = 1024)]
    length: usize,

    /// Sample rate (Hz)
    #[arg(short = 'r', long, default_value_t = 44100.0)]
    sample_rate: f64,

    /// Keep the analog network's phase
    #[arg(long)]
    correct_phase: bool,
}

impl DeemphasisArgs {
    fn to_config(&self) -> Result<DeemphasisConfig> {
        if let Some(path) = &self.config {
            return load_json(path);
        }
        Ok(DeemphasisConfig::default()
            .with_length(self.length)
            .with_sample_rate(self.sample_rate)
            .with_correct_phase(self.correct_phase))
    }
}

// ============ Reports ============

#[derive(Serialize)]
struct BandReport<'a> {
    name: &'static str,
    kernel: &'a [f64],
    response: Option<&'a FilterResponse>,
}

#[derive(Serialize)]
struct CrossoverReport<'a> {
    config: &'a CrossoverConfig,
    kernel_len: usize,
    output_signal_delay: usize,
    scaling_factor: f64,
    bands: Vec<BandReport<'a>>,
    summed_response: Option<&'a FilterResponse>,
}

impl<'a> CrossoverReport<'a> {
    fn new(config: &'a CrossoverConfig, crossover: &'a Crossover) -> Self {
        let analysis = crossover.analysis();
        let bands = crossover
            .crossover_type
            .bands()
            .iter()
            .zip(crossover.kernels())
            .enumerate()
            .map(|(i, (band, kernel))| BandReport {
                name: band.name(),
                kernel: kernel.as_ref(),
                response: analysis.and_then(|a| a.band_responses.get(i)),
            })
            .collect();

        Self {
            config,
            kernel_len: crossover.kernel_len(),
            output_signal_delay: crossover.output_signal_delay,
            scaling_factor: crossover.scaling_factor,
            bands,
            summed_response: analysis.map(|a| &a.summed_response),
        }
    }
}

#[derive(Serialize)]
struct DeemphasisReport<'a> {
    config: &'a DeemphasisConfig,
    kernel: &'a [f64],
    actual: Option<&'a FilterResponse>,
    deviation: Option<&'a Deviation>,
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

// ============ Commands ============

fn design(args: &CrossoverArgs, bin_size: Option<f64>, output: Option<&Path>) -> Result<()> {
    let mut config = args.to_config()?;
    if let Some(bin_size) = bin_size {
        config = config.with_analysis(bin_size);
    }
    let crossover = config.design()?;

    println!(
        "{:?} crossover @ {} Hz: {} taps, delay {} samples, scale {}",
        crossover.crossover_type,
        crossover.sample_rate,
        crossover.kernel_len(),
        crossover.output_signal_delay,
        crossover.scaling_factor
    );
    for (f, bw) in crossover.frequencies.iter().zip(&crossover.transition_bandwidths) {
        println!("  split {:>8.1} Hz  transition {:>7.1} Hz", f, bw);
    }

    if let Some(analysis) = crossover.analysis() {
        for (band, response) in crossover.crossover_type.bands().iter().zip(&analysis.band_responses) {
            let levels: Vec<String> = crossover
                .frequencies
                .iter()
                .map(|&f| format!("{:.2} dB @ {} Hz", response.amplitude_db[response.nearest_index(f)], f))
                .collect();
            println!("  {:<10} {}", band.name(), levels.join(", "));
        }
        let ripple = analysis
            .summed_response
            .amplitude_db
            .iter()
            .fold(0.0_f64, |acc, &db| acc.max(db.abs()));
        println!("  summed    max |deviation| from flat {:.2e} dB", ripple);
    }

    if let Some(path) = output {
        write_json(path, &CrossoverReport::new(&config, &crossover))?;
    }
    Ok(())
}

fn deemphasis(args: &DeemphasisArgs, output: Option<&Path>) -> Result<()> {
    let mut config = args.to_config()?;
    config.do_analysis = true;
    let filter: Deemphasis = config.design()?;

    println!(
        "De-emphasis @ {} Hz: {} taps, {} phase",
        filter.sample_rate,
        filter.length,
        if filter.correct_phase { "network" } else { "linear" }
    );

    let analysis = filter.analysis();
    if let Some(analysis) = analysis {
        let d = &analysis.deviation;
        println!("  amplitude    [{:+.3}, {:+.3}] dB", d.amplitude_min, d.amplitude_max);
        println!("  phase delay  [{:+.3e}, {:+.3e}] s", d.phase_delay_min, d.phase_delay_max);
        println!("  group delay  [{:+.3e}, {:+.3e}] s", d.group_delay_min, d.group_delay_max);
    }

    if let Some(path) = output {
        let report = DeemphasisReport {
            config: &config,
            kernel: &filter.kernel,
            actual: analysis.map(|a| &a.actual),
            deviation: analysis.map(|a| &a.deviation),
        };
        write_json(path, &report)?;
    }
    Ok(())
}

/// Stereo sine at half scale
fn tone_source(frequency: f64, seconds: f64, sample_rate: f64) -> Result<MemorySource> {
    if !(seconds > 0.0) {
        bail!("tone duration must be positive, got {}", seconds);
    }
    let frames = (seconds * sample_rate).round() as usize;
    let omega = std::f64::consts::TAU * frequency / sample_rate;
    let tone: Vec<StereoSample> = (0..frames)
        .map(|i| StereoSample::mono(0.5 * (omega * i as f64).sin()))
        .collect();
    let rate = sample_rate.round() as u32;
    Ok(MemorySource::new(interleave_stereo(&tone), 2, rate)?)
}

fn drain(filter: &mut dyn AudioFilter) -> Result<Vec<Sample>> {
    let channels = filter.channel_count();
    let mut out = Vec::new();
    let mut buf = vec![0.0; channels * 4096];
    loop {
        let n = filter.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn render(
    input: Option<&Path>,
    tone: f64,
    seconds: f64,
    crossover: &CrossoverArgs,
    deemphasis: Option<DeemphasisConfig>,
    band: Option<usize>,
    volume: f64,
    output: &Path,
) -> Result<()> {
    let mut config = crossover.to_config()?;
    let source = match input {
        Some(path) => {
            let source = wav::load_wav(path)?;
            config.sample_rate = f64::from(source.sample_rate());
            source
        }
        None => tone_source(tone, seconds, config.sample_rate)?,
    };
    let crossover = config.design()?;

    let mut chain: Box<dyn AudioFilter> = Box::new(source);
    if let Some(deemphasis) = deemphasis {
        let design = deemphasis.clone().with_sample_rate(config.sample_rate).design()?;
        log::info!("De-emphasis stage: {} taps, enabled {}", design.length, deemphasis.enabled);
        chain = Box::new(DeemphasisFilter::new(chain, &design, deemphasis.enabled)?);
    }
    chain = Box::new(CrossoverFilter::new(chain, &crossover)?);
    if let Some(band) = band {
        chain = Box::new(BandSelect::new(chain, band)?);
    }
    let mut chain = VolumeControl::new(chain);
    chain.set_volume(volume)?;

    let samples = drain(&mut chain)?;
    wav::save_wav(output, &samples, chain.channel_count(), chain.sample_rate())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Design {
            crossover,
            bin_size,
            output,
        } => design(&crossover, bin_size, output.as_deref()),
        Commands::Deemphasis { deemphasis: args, output } => deemphasis(&args, output.as_deref()),
        Commands::Render {
            input,
            tone,
            seconds,
            crossover,
            deemphasis,
            deemphasis_config,
            band,
            volume,
            output,
        } => {
            let stage = match (deemphasis, deemphasis_config) {
                (false, _) => None,
                (true, Some(path)) => Some(load_json(&path)?),
                (true, None) => Some(DeemphasisConfig::default()),
            };
            render(
                input.as_deref(),
                tone,
                seconds,
                &crossover,
                stage,
                band,
                volume,
                &output,
            )
        }
    }
}
