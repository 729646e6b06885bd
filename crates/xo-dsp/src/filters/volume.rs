//! Per-channel gain stage

use xo_core::{AudioFilter, Sample, XoError, XoResult, check_read_count};

/// Scales every channel of the source by its own linear volume in [0, 1]
pub struct VolumeControl<S> {
    source: S,
    volumes: Vec<f64>,
}

fn check_volume(volume: f64) -> XoResult<()> {
    if !(0.0..=1.0).contains(&volume) {
        return Err(XoError::out_of_range("volume", volume));
    }
    Ok(())
}

impl<S: AudioFilter> VolumeControl<S> {
    /// Unity gain on every channel
    pub fn new(source: S) -> Self {
        let volumes = vec![1.0; source.channel_count()];
        Self { source, volumes }
    }

    /// Master volume times a per-channel trim, e.g. to balance crossover
    /// bands (`trims[i]` applies to output channel `i`)
    pub fn with_trims(source: S, master: f64, trims: &[f64]) -> XoResult<Self> {
        if trims.len() != source.channel_count() {
            return Err(XoError::ChannelMismatch {
                expected: source.channel_count(),
                actual: trims.len(),
            });
        }
        check_volume(master)?;
        let volumes = trims
            .iter()
            .map(|&trim| {
                let volume = master * trim;
                check_volume(volume).map(|_| volume)
            })
            .collect::<XoResult<Vec<_>>>()?;
        Ok(Self { source, volumes })
    }

    /// Set every channel to `volume`
    pub fn set_volume(&mut self, volume: f64) -> XoResult<()> {
        check_volume(volume)?;
        self.volumes.fill(volume);
        Ok(())
    }

    pub fn set_volume_per_channel(&mut self, channel: usize, volume: f64) -> XoResult<()> {
        check_volume(volume)?;
        let slot = self
            .volumes
            .get_mut(channel)
            .ok_or_else(|| XoError::out_of_range("channel", channel as f64))?;
        *slot = volume;
        Ok(())
    }

    pub fn volume(&self, channel: usize) -> Option<f64> {
        self.volumes.get(channel).copied()
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

impl<S: AudioFilter> AudioFilter for VolumeControl<S> {
    fn bits_per_sample(&self) -> u32 {
        self.source.bits_per_sample()
    }

    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    fn channel_count(&self) -> usize {
        self.volumes.len()
    }

    fn position(&self) -> u64 {
        self.source.position()
    }

    fn length(&self) -> u64 {
        self.source.length()
    }

    fn read(&mut self, buffer: &mut [Sample]) -> XoResult<usize> {
        let count = self.source.read(buffer)?;
        check_read_count(count, buffer.len(), self.volumes.len())?;
        for frame in buffer[..count].chunks_exact_mut(self.volumes.len()) {
            for (sample, &volume) in frame.iter_mut().zip(&self.volumes) {
                *sample *= volume;
            }
        }
        Ok(count)
    }

    fn seek(&mut self, position: u64) -> XoResult<()> {
        self.source.seek(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xo_core::MemorySource;

    fn source() -> MemorySource {
        MemorySource::new(vec![1.0, 1.0, 0.5, 0.5], 2, 44100).unwrap()
    }

    #[test]
    fn test_unity_by_default() {
        let mut volume = VolumeControl::new(source());
        let mut buf = [0.0; 4];
        assert_eq!(volume.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [1.0, 1.0, 0.5, 0.5]);
    }

    #[test]
    fn test_per_channel_volume() {
        let mut volume = VolumeControl::new(source());
        volume.set_volume(0.5).unwrap();
        volume.set_volume_per_channel(1, 0.0).unwrap();
        assert_eq!(volume.volume(0), Some(0.5));

        let mut buf = [0.0; 4];
        volume.read(&mut buf).unwrap();
        assert_eq!(buf, [0.5, 0.0, 0.25, 0.0]);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut volume = VolumeControl::new(source());
        assert!(matches!(
            volume.set_volume(1.5),
            Err(XoError::OutOfRange { name: "volume", .. })
        ));
        assert!(volume.set_volume(-0.1).is_err());
        assert!(volume.set_volume_per_channel(2, 0.5).is_err());
        assert!(VolumeControl::with_trims(source(), 0.8, &[1.0]).is_err());
        assert!(VolumeControl::with_trims(source(), 0.8, &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_trims() {
        let volume = VolumeControl::with_trims(source(), 0.5, &[1.0, 0.5]).unwrap();
        assert_eq!(volume.volume(0), Some(0.5));
        assert_eq!(volume.volume(1), Some(0.25));
    }
}
