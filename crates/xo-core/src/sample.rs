//! Sample types and interleaved buffer helpers

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Stereo sample pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub const fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub const fn mono(value: Sample) -> Self {
        Self {
            left: value,
            right: value,
        }
    }
}

/// Number of whole frames held by `len` interleaved samples
#[inline]
pub fn frame_count(len: usize, channels: usize) -> usize {
    if channels == 0 { 0 } else { len / channels }
}

/// Interleave stereo frames into `L R L R ...`
pub fn interleave_stereo(frames: &[StereoSample]) -> Vec<Sample> {
    let mut out = Vec::with_capacity(frames.len() * 2);
    for frame in frames {
        out.push(frame.left);
        out.push(frame.right);
    }
    out
}

/// Split one channel out of an interleaved buffer
pub fn extract_channel(interleaved: &[Sample], channels: usize, channel: usize) -> Vec<Sample> {
    if channels == 0 || channel >= channels {
        return Vec::new();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame[channel])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_and_extract() {
        let frames = [
            StereoSample::new(1.0, -1.0),
            StereoSample::new(2.0, -2.0),
            StereoSample::mono(3.0),
        ];
        let data = interleave_stereo(&frames);
        assert_eq!(data, vec![1.0, -1.0, 2.0, -2.0, 3.0, 3.0]);
        assert_eq!(extract_channel(&data, 2, 0), vec![1.0, 2.0, 3.0]);
        assert_eq!(extract_channel(&data, 2, 1), vec![-1.0, -2.0, 3.0]);
        assert!(extract_channel(&data, 2, 2).is_empty());
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(12, 6), 2);
        assert_eq!(frame_count(13, 6), 2);
        assert_eq!(frame_count(4, 0), 0);
    }
}
