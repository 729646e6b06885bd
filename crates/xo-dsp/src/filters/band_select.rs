//! Pick one stereo band out of a crossover's output

use xo_core::{AudioFilter, Sample, XoError, XoResult, check_read_count};

/// Reduces a `2 × bands` channel stream to the stereo pair of one band.
///
/// Positions and lengths are reported in the reduced (stereo) domain.
pub struct BandSelect<S> {
    source: S,
    bands: usize,
    band: usize,
    scratch: Vec<Sample>,
}

impl<S: AudioFilter> BandSelect<S> {
    pub fn new(source: S, band: usize) -> XoResult<Self> {
        let channels = source.channel_count();
        if channels < 2 || channels % 2 != 0 {
            return Err(XoError::InvalidArgument(format!(
                "source must carry stereo bands, got {} channels",
                channels
            )));
        }

        let mut select = Self {
            source,
            bands: channels / 2,
            band: 0,
            scratch: Vec::new(),
        };
        select.set_band(band)?;
        Ok(select)
    }

    pub fn band(&self) -> usize {
        self.band
    }

    pub fn set_band(&mut self, band: usize) -> XoResult<()> {
        if band >= self.bands {
            return Err(XoError::out_of_range("band", band as f64));
        }
        self.band = band;
        Ok(())
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

impl<S: AudioFilter> AudioFilter for BandSelect<S> {
    fn bits_per_sample(&self) -> u32 {
        self.source.bits_per_sample()
    }

    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    fn channel_count(&self) -> usize {
        2
    }

    fn position(&self) -> u64 {
        self.source.position() / self.bands as u64
    }

    fn length(&self) -> u64 {
        self.source.length() / self.bands as u64
    }

    fn read(&mut self, buffer: &mut [Sample]) -> XoResult<usize> {
        xo_core::check_whole_frames(buffer.len(), 2)?;

        let wide = buffer.len() * self.bands;
        self.scratch.resize(wide, 0.0);
        let channels = self.bands * 2;
        let count = self.source.read(&mut self.scratch[..wide])?;
        check_read_count(count, wide, channels)?;

        let offset = self.band * 2;
        for (out, frame) in buffer
            .chunks_exact_mut(2)
            .zip(self.scratch[..count].chunks_exact(channels))
        {
            out.copy_from_slice(&frame[offset..offset + 2]);
        }
        Ok(count / self.bands)
    }

    fn seek(&mut self, position: u64) -> XoResult<()> {
        self.source.seek(position * self.bands as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xo_core::MemorySource;

    fn six_channel() -> MemorySource {
        // Two frames of Lw Rw Lm Rm Lt Rt
        let samples = vec![
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, //
            7.0, 8.0, 9.0, 10.0, 11.0, 12.0,
        ];
        MemorySource::new(samples, 6, 48000).unwrap()
    }

    #[test]
    fn test_selects_band_pair() {
        let mut select = BandSelect::new(six_channel(), 1).unwrap();
        assert_eq!(select.channel_count(), 2);
        assert_eq!(select.length(), 4);

        let mut buf = [0.0; 4];
        assert_eq!(select.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [3.0, 4.0, 9.0, 10.0]);
        assert_eq!(select.position(), 4);
        assert_eq!(select.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_seek_and_switch() {
        let mut select = BandSelect::new(six_channel(), 0).unwrap();
        select.seek(2).unwrap();
        select.set_band(2).unwrap();

        let mut buf = [0.0; 2];
        assert_eq!(select.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [11.0, 12.0]);
    }

    #[test]
    fn test_validation() {
        assert!(BandSelect::new(six_channel(), 3).is_err());
        let mono = MemorySource::new(vec![0.0; 3], 1, 48000).unwrap();
        assert!(BandSelect::new(mono, 0).is_err());
    }
}
