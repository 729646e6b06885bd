//! Switchable stereo de-emphasis stage

use xo_core::{AudioFilter, Sample, XoResult};

use super::crossover_filter::check_source;
use crate::convolution::{EngineState, OverlapAddEngine};
use crate::deemphasis::Deemphasis;

const FILTER_BANK: usize = 0;
const BYPASS_BANK: usize = 1;

/// Applies a de-emphasis kernel, or a latency-matched passthrough when
/// disabled. Toggling never reallocates.
pub struct DeemphasisFilter<S> {
    engine: OverlapAddEngine<S>,
}

impl<S: AudioFilter> DeemphasisFilter<S> {
    pub fn new(source: S, deemphasis: &Deemphasis, enabled: bool) -> XoResult<Self> {
        check_source(&source, deemphasis.sample_rate)?;

        let kernel = &deemphasis.kernel;
        let mut identity = vec![0.0; kernel.len()];
        identity[kernel.len() / 2] = 1.0;

        let filter = [kernel.as_slice()];
        let bypass = [identity.as_slice()];
        let mut engine = OverlapAddEngine::with_banks(source, &[&filter[..], &bypass[..]])?;
        if !enabled {
            engine.set_active_bank(BYPASS_BANK)?;
        }

        Ok(Self { engine })
    }

    pub fn is_enabled(&self) -> bool {
        self.engine.active_bank() == FILTER_BANK
    }

    /// Switch between filtering and passthrough from the next block on
    pub fn set_enabled(&mut self, enabled: bool) -> XoResult<()> {
        let bank = if enabled { FILTER_BANK } else { BYPASS_BANK };
        self.engine.set_active_bank(bank)
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
}

impl<S: AudioFilter> AudioFilter for DeemphasisFilter<S> {
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
