//! Stereo crossover stage: 2 channels in, 2 × bands channels out

use xo_core::{AudioFilter, Sample, XoError, XoResult};

use crate::convolution::{EngineState, OverlapAddEngine};
use crate::crossover::{Crossover, CrossoverType};

/// Splits a stereo source into every band of a designed crossover.
///
/// Output channels are `L_band0, R_band0, L_band1, R_band1, ...`, lowest band
/// first (three-way: `Lw Rw Lm Rm Lt Rt`).
pub struct CrossoverFilter<S> {
    engine: OverlapAddEngine<S>,
    crossover_type: CrossoverType,
    output_signal_delay: usize,
}

/// Reject a source whose format does not match the design
pub(crate) fn check_source<S: AudioFilter>(source: &S, design_rate: f64) -> XoResult<()> {
    if source.channel_count() != 2 {
        return Err(XoError::ChannelMismatch {
            expected: 2,
            actual: source.channel_count(),
        });
    }
    if (f64::from(source.sample_rate()) - design_rate).abs() > 0.5 {
        return Err(XoError::SampleRateMismatch {
            expected: design_rate.round() as u32,
            actual: source.sample_rate(),
        });
    }
    Ok(())
}

impl<S: AudioFilter> CrossoverFilter<S> {
    pub fn new(source: S, crossover: &Crossover) -> XoResult<Self> {
        check_source(&source, crossover.sample_rate)?;
        let engine = OverlapAddEngine::new(source, crossover.kernels())?;

        Ok(Self {
            engine,
            crossover_type: crossover.crossover_type,
            output_signal_delay: crossover.output_signal_delay,
        })
    }

    pub fn crossover_type(&self) -> CrossoverType {
        self.crossover_type
    }

    /// Latency of every band, in frames
    pub fn output_signal_delay(&self) -> usize {
        self.output_signal_delay
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn optimal_read_size(&self) -> usize {
        self.engine.optimal_read_size()
    }

    pub fn engine(&self) -> &OverlapAddEngine<S> {
        &self.engine
    }

    pub fn into_source(self) -> S {
        self.engine.into_source()
    }
}

impl<S: AudioFilter> AudioFilter for CrossoverFilter<S> {
    fn bits_per_sample(&self) -> u32 {
        self.engine.bits_per_sample()
    }

    fn sample_rate(&self) -> u32 {
        self.engine.sample_rate()
    }

    fn channel_count(&self) -> usize {
        self.engine.channel_count()
    }

    fn position(&self) -> u64 {
        self.engine.position()
    }

    fn length(&self) -> u64 {
        self.engine.length()
    }

    fn read(&mut self, buffer: &mut [Sample]) -> XoResult<usize> {
        self.engine.read(buffer)
    }

    fn seek(&mut self, position: u64) -> XoResult<()> {
        self.engine.seek(position)
    }
}
