//! Streaming overlap-add convolution
//!
//! Block FFT convolution of an interleaved source against one or more band
//! kernels:
//! - Every input channel is transformed once per block and shared by all bands
//! - Output is band-major: `ch0_band0, ch1_band0, ch0_band1, ch1_band1, ...`
//! - Several kernel banks can be precomputed and switched between blocks
//! - Explicit end-of-stream state machine drains the convolution tail

use rustfft::num_complex::Complex;

use xo_core::{AudioFilter, Sample, XoError, XoResult, check_read_count, check_whole_frames};

use crate::fourier::{fft_unscaled, ifft, next_power_of_two};

const ZERO: Complex<f64> = Complex { re: 0.0, im: 0.0 };

// ============ State ============

/// End-of-stream state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Pulling full input segments
    Normal,
    /// The last source read came up short
    LastReadIncomplete,
    /// Source exhausted; emitting the remaining overlap tail
    LastOverlapBuffer,
    /// Nothing left until the next seek
    EndOfInput,
}

/// Unscaled spectrum of `kernel` zero-padded to `fft_size`
fn kernel_spectrum(kernel: &[f64], fft_size: usize) -> XoResult<Vec<Complex<f64>>> {
    let mut spectrum = vec![ZERO; fft_size];
    for (bin, &tap) in spectrum.iter_mut().zip(kernel) {
        *bin = Complex::new(tap, 0.0);
    }
    fft_unscaled(&mut spectrum)?;
    Ok(spectrum)
}

// ============ Engine ============

/// Overlap-add FFT convolver wrapping an upstream `AudioFilter`.
///
/// With kernel length L the FFT size is the next power of two ≥ 2L, each
/// block consumes `fft − L + 1` frames and carries an `L − 1` frame tail.
pub struct OverlapAddEngine<S> {
    source: S,
    /// Input channels
    channels: usize,
    /// Kernels per bank
    bands: usize,
    kernel_len: usize,
    fft_size: usize,
    segment_size: usize,
    overlap_size: usize,
    /// `banks[bank][band]` kernel spectra
    banks: Vec<Vec<Vec<Complex<f64>>>>,
    active_bank: usize,
    /// Bank the committed overlap was produced with
    last_bank: usize,
    /// Interleaved read scratch
    input: Vec<Sample>,
    /// Working buffers, indexed `band * channels + channel`
    buffers: Vec<Vec<Complex<f64>>>,
    /// Convolution tails, same indexing as `buffers`
    overlaps: Vec<Vec<Complex<f64>>>,
    /// Valid frames in the current block
    block_frames: usize,
    /// Next frame to emit from the current block; None before the first block
    cursor: Option<usize>,
    /// Whether the short block left a tail beyond its emitted frames
    tail_pending: bool,
    state: EngineState,
    position: u64,
}

impl<S: AudioFilter> OverlapAddEngine<S> {
    /// Single bank of band kernels
    pub fn new<K: AsRef<[f64]>>(source: S, kernels: &[K]) -> XoResult<Self> {
        Self::with_banks(source, &[kernels])
    }

    /// Several switchable banks, each with the same number of equal-length
    /// kernels. Bank 0 starts active.
    pub fn with_banks<K: AsRef<[f64]>>(source: S, banks: &[&[K]]) -> XoResult<Self> {
        let bands = banks.first().map_or(0, |bank| bank.len());
        if bands == 0 {
            return Err(XoError::invalid("at least one kernel is required"));
        }
        if banks.iter().any(|bank| bank.len() != bands) {
            return Err(XoError::invalid("every kernel bank must hold the same number of bands"));
        }

        let kernel_len = banks[0][0].as_ref().len();
        if kernel_len == 0 {
            return Err(XoError::invalid("kernel must contain at least one tap"));
        }
        if banks
            .iter()
            .flat_map(|bank| bank.iter())
            .any(|k| k.as_ref().len() != kernel_len)
        {
            return Err(XoError::invalid("all kernels must share one length"));
        }

        let channels = source.channel_count();
        if channels == 0 {
            return Err(XoError::invalid("source has no channels"));
        }

        let fft_size = next_power_of_two(2 * kernel_len)?;
        let segment_size = fft_size - kernel_len + 1;
        let overlap_size = fft_size - segment_size;

        let banks = banks
            .iter()
            .map(|bank| {
                bank.iter()
                    .map(|k| kernel_spectrum(k.as_ref(), fft_size))
                    .collect::<XoResult<Vec<_>>>()
            })
            .collect::<XoResult<Vec<_>>>()?;

        let lanes = bands * channels;

        log::debug!(
            "Overlap-add engine: {} channels x {} bands, kernel {} taps, fft {}, segment {}",
            channels,
            bands,
            kernel_len,
            fft_size,
            segment_size
        );

        Ok(Self {
            source,
            channels,
            bands,
            kernel_len,
            fft_size,
            segment_size,
            overlap_size,
            banks,
            active_bank: 0,
            last_bank: 0,
            input: vec![0.0; segment_size * channels],
            buffers: vec![vec![ZERO; fft_size]; lanes],
            overlaps: vec![vec![ZERO; overlap_size]; lanes],
            block_frames: 0,
            cursor: None,
            tail_pending: false,
            state: EngineState::Normal,
            position: 0,
        })
    }

    // ============ Accessors ============

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn kernel_len(&self) -> usize {
        self.kernel_len
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Frames consumed from the source per block
    pub fn input_segment_size(&self) -> usize {
        self.segment_size
    }

    /// Frames carried from one block into the next
    pub fn overlap_size(&self) -> usize {
        self.overlap_size
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Read size (in samples) that maps onto exactly one block
    pub fn optimal_read_size(&self) -> usize {
        self.segment_size * self.output_channels()
    }

    #[inline]
    fn output_channels(&self) -> usize {
        self.channels * self.bands
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    pub fn active_bank(&self) -> usize {
        self.active_bank
    }

    /// Select the kernel bank used from the next block on. The first block
    /// after a change drops the tail computed with the previous bank.
    pub fn set_active_bank(&mut self, bank: usize) -> XoResult<()> {
        if bank >= self.banks.len() {
            return Err(XoError::out_of_range("bank", bank as f64));
        }
        if bank != self.active_bank {
            log::debug!("Switching kernel bank {} -> {}", self.active_bank, bank);
        }
        self.active_bank = bank;
        Ok(())
    }

    fn set_state(&mut self, next: EngineState) {
        if self.state != next {
            log::debug!("Engine state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    // ============ Processing ============

    /// Pull one input segment and convolve it into `buffers`
    fn perform_next_convolve(&mut self) -> XoResult<()> {
        if !matches!(
            self.state,
            EngineState::Normal | EngineState::LastReadIncomplete
        ) {
            return Err(XoError::InvalidState(format!(
                "cannot convolve in state {:?}",
                self.state
            )));
        }

        let requested = self.input.len();
        let count = self.source.read(&mut self.input)?;

        if count == 0 {
            if self.state == EngineState::LastReadIncomplete && !self.tail_pending {
                self.set_state(EngineState::EndOfInput);
                return Ok(());
            }
            // Flush the committed tail as the final block
            for (buffer, overlap) in self.buffers.iter_mut().zip(&self.overlaps) {
                buffer[..overlap.len()].copy_from_slice(overlap);
            }
            self.block_frames = self.overlap_size;
            self.set_state(EngineState::LastOverlapBuffer);
            return Ok(());
        }

        check_read_count(count, requested, self.channels)?;

        let frames = count / self.channels;
        if count < requested {
            self.set_state(EngineState::LastReadIncomplete);
        } else {
            self.set_state(EngineState::Normal);
        }
        self.tail_pending = frames + self.overlap_size > self.segment_size;

        // Band 0 lanes hold each channel's spectrum
        for ch in 0..self.channels {
            let lane = &mut self.buffers[ch];
            for (i, slot) in lane.iter_mut().enumerate() {
                *slot = if i < frames {
                    Complex::new(self.input[i * self.channels + ch], 0.0)
                } else {
                    ZERO
                };
            }
            fft_unscaled(lane)?;
        }
        for lane in self.channels..self.buffers.len() {
            let (head, tail) = self.buffers.split_at_mut(lane);
            tail[0].copy_from_slice(&head[lane % self.channels]);
        }

        let add_overlap = self.active_bank == self.last_bank;
        let spectra = &self.banks[self.active_bank];

        for (lane, (buffer, overlap)) in self
            .buffers
            .iter_mut()
            .zip(self.overlaps.iter_mut())
            .enumerate()
        {
            let h = &spectra[lane / self.channels];
            for (x, h) in buffer.iter_mut().zip(h) {
                *x *= h;
            }
            ifft(buffer)?;

            if add_overlap {
                for (y, o) in buffer.iter_mut().zip(overlap.iter()) {
                    *y += o;
                }
            }
            overlap.copy_from_slice(&buffer[self.segment_size..]);
        }

        self.last_bank = self.active_bank;
        self.block_frames = self.segment_size;
        Ok(())
    }

    fn fill(&mut self, buffer: &mut [Sample]) -> XoResult<usize> {
        let out_channels = self.output_channels();
        let mut written = 0;

        while written < buffer.len() {
            let cursor = match self.cursor {
                Some(cursor) if cursor < self.block_frames => cursor,
                _ => {
                    if self.state == EngineState::LastOverlapBuffer {
                        self.set_state(EngineState::EndOfInput);
                        break;
                    }
                    self.perform_next_convolve()?;
                    if self.state == EngineState::EndOfInput {
                        break;
                    }
                    0
                }
            };

            let frames = ((buffer.len() - written) / out_channels).min(self.block_frames - cursor);
            for (f, frame) in buffer[written..written + frames * out_channels]
                .chunks_exact_mut(out_channels)
                .enumerate()
            {
                for (out, lane) in frame.iter_mut().zip(&self.buffers) {
                    *out = lane[cursor + f].re;
                }
            }

            self.cursor = Some(cursor + frames);
            written += frames * out_channels;
        }

        Ok(written)
    }
}

impl<S: AudioFilter> AudioFilter for OverlapAddEngine<S> {
    fn bits_per_sample(&self) -> u32 {
        self.source.bits_per_sample()
    }

    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    fn channel_count(&self) -> usize {
        self.output_channels()
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> u64 {
        self.source.length() * self.bands as u64
    }

    fn read(&mut self, buffer: &mut [Sample]) -> XoResult<usize> {
        check_whole_frames(buffer.len(), self.output_channels())?;
        if self.state == EngineState::EndOfInput {
            return Ok(0);
        }

        let written = self.fill(buffer)?;
        self.position += written as u64;
        Ok(written)
    }

    /// Restart at `position` with empty history. The first block after a
    /// seek carries no tail from before it.
    fn seek(&mut self, position: u64) -> XoResult<()> {
        if position % self.output_channels() as u64 != 0 {
            return Err(XoError::InvalidArgument(format!(
                "seek position {} must be a multiple of {} channels",
                position,
                self.output_channels()
            )));
        }

        self.source.seek(position / self.bands as u64)?;

        for overlap in &mut self.overlaps {
            overlap.fill(ZERO);
        }
        self.cursor = None;
        self.block_frames = 0;
        self.tail_pending = false;
        self.last_bank = self.active_bank;
        self.position = position;
        self.set_state(EngineState::Normal);
        Ok(())
    }
}
