//! WAV file I/O for the render command

use std::path::Path;

use anyhow::{Context, Result, bail};
use xo_core::{MemorySource, Sample};

/// Load a WAV file as an interleaved in-memory source, samples scaled to [-1, 1]
pub fn load_wav(path: &Path) -> Result<MemorySource> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let spec = reader.spec();
    let samples: Vec<Sample> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("failed to decode {}", path.display()))?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                bail!("unsupported bit depth {}", spec.bits_per_sample);
            }
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| f64::from(v) / max_val))
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("failed to decode {}", path.display()))?
        }
    };

    log::info!(
        "Loaded {}: {} ch, {} Hz, {} bit, {} frames",
        path.display(),
        spec.channels,
        spec.sample_rate,
        spec.bits_per_sample,
        samples.len() / usize::from(spec.channels.max(1))
    );

    let source = MemorySource::new(samples, usize::from(spec.channels), spec.sample_rate)?
        .with_bits_per_sample(u32::from(spec.bits_per_sample));
    Ok(source)
}

/// Write interleaved samples as 32-bit float WAV
pub fn save_wav(path: &Path, samples: &[Sample], channels: usize, sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: u16::try_from(channels).context("too many channels for WAV")?,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample as f32)?;
    }
    writer.finalize()?;

    log::info!(
        "Wrote {}: {} ch, {} frames",
        path.display(),
        channels,
        samples.len() / channels.max(1)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempfile::TempDir;
    use xo_core::AudioFilter;

    #[test]
    fn test_wav_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("round_trip.wav");

        let samples = vec![0.0, 0.5, -0.25, 1.0, 0.125, -1.0];
        save_wav(&path, &samples, 2, 48000).unwrap();

        let mut source = load_wav(&path).unwrap();
        assert_eq!(source.channel_count(), 2);
        assert_eq!(source.sample_rate(), 48000);
        assert_eq!(source.bits_per_sample(), 32);

        let mut buf = [0.0; 6];
        assert_eq!(source.read(&mut buf).unwrap(), 6);
        for (a, e) in buf.iter().zip(&samples) {
            assert_abs_diff_eq!(a, e, epsilon = 1e-7);
        }
    }
}
