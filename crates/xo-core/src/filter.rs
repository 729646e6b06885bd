//! Pull-based audio stream contract shared by every filter stage
//!
//! Positions, lengths and counts are measured in samples (not frames or
//! bytes). A read count is always a multiple of the stage's channel count,
//! and a read returning 0 means end of stream.

use crate::{Sample, XoError, XoResult};

/// A stage in a filter chain. Every stage both consumes and produces this
/// contract, so stages compose by wrapping.
pub trait AudioFilter {
    /// Bits of data per sample of the original material (e.g. 16, 24)
    fn bits_per_sample(&self) -> u32;

    /// Sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Number of interleaved channels produced by `read`
    fn channel_count(&self) -> usize;

    /// Current position, in samples
    fn position(&self) -> u64;

    /// Total length, in samples
    fn length(&self) -> u64;

    /// Fill `buffer` with the next samples.
    ///
    /// `buffer.len()` is the requested count and must be a multiple of
    /// `channel_count()`. Returns the number of samples written, which is 0
    /// only at end of stream.
    fn read(&mut self, buffer: &mut [Sample]) -> XoResult<usize>;

    /// Move to `position` (in samples)
    fn seek(&mut self, position: u64) -> XoResult<()>;
}

impl<T: AudioFilter + ?Sized> AudioFilter for Box<T> {
    fn bits_per_sample(&self) -> u32 {
        (**self).bits_per_sample()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn channel_count(&self) -> usize {
        (**self).channel_count()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn length(&self) -> u64 {
        (**self).length()
    }

    fn read(&mut self, buffer: &mut [Sample]) -> XoResult<usize> {
        (**self).read(buffer)
    }

    fn seek(&mut self, position: u64) -> XoResult<()> {
        (**self).seek(position)
    }
}

/// Reject counts that would split a frame
#[inline]
pub fn check_whole_frames(count: usize, channels: usize) -> XoResult<()> {
    if channels == 0 || count % channels != 0 {
        return Err(XoError::InvalidArgument(format!(
            "count {} must be a multiple of {} channels",
            count, channels
        )));
    }
    Ok(())
}

/// Reject a read count an upstream stage could not legally return
#[inline]
pub fn check_read_count(count: usize, requested: usize, channels: usize) -> XoResult<()> {
    if count > requested {
        return Err(XoError::SourceProtocol(format!(
            "source returned {} samples for a {} sample request",
            count, requested
        )));
    }
    if channels == 0 || count % channels != 0 {
        return Err(XoError::SourceProtocol(format!(
            "source returned {} samples, not a multiple of {} channels",
            count, channels
        )));
    }
    Ok(())
}

// ============ Memory Source ============

/// Interleaved in-memory sample source
#[derive(Debug, Clone)]
pub struct MemorySource {
    samples: Vec<Sample>,
    channels: usize,
    sample_rate: u32,
    bits_per_sample: u32,
    position: usize,
    /// Largest number of samples handed out per read (None = unlimited)
    max_chunk: Option<usize>,
}

impl MemorySource {
    /// Create a source over interleaved `samples`
    pub fn new(samples: Vec<Sample>, channels: usize, sample_rate: u32) -> XoResult<Self> {
        if channels == 0 {
            return Err(XoError::invalid("channel count must be at least 1"));
        }
        if sample_rate == 0 {
            return Err(XoError::out_of_range("sample_rate", sample_rate));
        }
        if samples.len() % channels != 0 {
            return Err(XoError::InvalidArgument(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }

        Ok(Self {
            samples,
            channels,
            sample_rate,
            bits_per_sample: 16,
            position: 0,
            max_chunk: None,
        })
    }

    /// Set the reported bit depth
    pub fn with_bits_per_sample(mut self, bits: u32) -> Self {
        self.bits_per_sample = bits;
        self
    }

    /// Limit every read to at most `frames` frames, emulating a source that
    /// delivers irregular partial reads
    pub fn with_max_chunk_frames(mut self, frames: usize) -> Self {
        self.max_chunk = Some(frames.max(1) * self.channels);
        self
    }

    /// Borrow the underlying samples
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

impl AudioFilter for MemorySource {
    fn bits_per_sample(&self) -> u32 {
        self.bits_per_sample
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> usize {
        self.channels
    }

    fn position(&self) -> u64 {
        self.position as u64
    }

    fn length(&self) -> u64 {
        self.samples.len() as u64
    }

    fn read(&mut self, buffer: &mut [Sample]) -> XoResult<usize> {
        check_whole_frames(buffer.len(), self.channels)?;

        let remaining = self.samples.len() - self.position;
        let mut count = buffer.len().min(remaining);
        if let Some(max) = self.max_chunk {
            count = count.min(max);
        }

        buffer[..count].copy_from_slice(&self.samples[self.position..self.position + count]);
        self.position += count;
        Ok(count)
    }

    fn seek(&mut self, position: u64) -> XoResult<()> {
        let position = usize::try_from(position)
            .map_err(|_| XoError::out_of_range("position", position as f64))?;
        check_whole_frames(position, self.channels)?;
        if position > self.samples.len() {
            log::warn!(
                "Seek to {} past end of source ({} samples), clamping",
                position,
                self.samples.len()
            );
        }
        self.position = position.min(self.samples.len());
        Ok(())
    }
}
