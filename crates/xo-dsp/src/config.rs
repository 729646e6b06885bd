//! Serializable design parameters

use serde::{Deserialize, Serialize};
use xo_core::{XoError, XoResult};

use crate::crossover::{Crossover, CrossoverType, create_four_way, create_three_way, create_two_way};
use crate::deemphasis::{Deemphasis, create_deemphasis_filter};

/// Parameters for a crossover design
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    /// Topology; fixes how many frequencies are expected
    pub crossover_type: CrossoverType,

    /// Crossover frequencies in Hz, ascending
    pub frequencies: Vec<f64>,

    /// Transition bandwidth per frequency, in Hz
    pub transition_bandwidths: Vec<f64>,

    /// System sample rate in Hz
    pub sample_rate: f64,

    /// Scale every band for headroom
    pub normalized: bool,

    /// Compute band responses at design time
    pub do_analysis: bool,

    /// Analysis resolution in Hz
    pub bin_size: f64,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            crossover_type: CrossoverType::ThreeWay,
            frequencies: vec![500.0, 4000.0],
            transition_bandwidths: vec![200.0, 800.0],
            sample_rate: 44100.0,
            normalized: true,
            do_analysis: false,
            bin_size: 10.0,
        }
    }
}

impl CrossoverConfig {
    /// Bookshelf two-way split
    pub fn two_way() -> Self {
        Self {
            crossover_type: CrossoverType::TwoWay,
            frequencies: vec![2500.0],
            transition_bandwidths: vec![500.0],
            ..Default::default()
        }
    }

    /// Woofer / midrange / tweeter
    pub fn three_way() -> Self {
        Self::default()
    }

    /// Woofer / midrange / upper-mid / tweeter
    pub fn four_way() -> Self {
        Self {
            crossover_type: CrossoverType::FourWay,
            frequencies: vec![300.0, 2000.0, 8000.0],
            transition_bandwidths: vec![200.0, 500.0, 1000.0],
            ..Default::default()
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    pub fn with_analysis(mut self, bin_size: f64) -> Self {
        self.do_analysis = true;
        self.bin_size = bin_size;
        self
    }

    /// Replace the crossover points (frequency, transition bandwidth)
    pub fn with_points(mut self, points: &[(f64, f64)]) -> Self {
        self.frequencies = points.iter().map(|p| p.0).collect();
        self.transition_bandwidths = points.iter().map(|p| p.1).collect();
        self
    }

    /// Validate and design
    pub fn design(&self) -> XoResult<Crossover> {
        let expected = self.crossover_type.band_count() - 1;
        if self.frequencies.len() != expected || self.transition_bandwidths.len() != expected {
            return Err(XoError::InvalidArgument(format!(
                "{:?} needs {} frequencies and bandwidths, got {} and {}",
                self.crossover_type,
                expected,
                self.frequencies.len(),
                self.transition_bandwidths.len()
            )));
        }

        let f = &self.frequencies;
        let bw = &self.transition_bandwidths;
        match self.crossover_type {
            CrossoverType::TwoWay => create_two_way(
                f[0],
                bw[0],
                self.sample_rate,
                self.normalized,
                self.do_analysis,
                self.bin_size,
            ),
            CrossoverType::ThreeWay => create_three_way(
                f[0],
                f[1],
                bw[0],
                bw[1],
                self.sample_rate,
                self.normalized,
                self.do_analysis,
                self.bin_size,
            ),
            CrossoverType::FourWay => create_four_way(
                [f[0], f[1], f[2]],
                [bw[0], bw[1], bw[2]],
                self.sample_rate,
                self.normalized,
                self.do_analysis,
                self.bin_size,
            ),
        }
    }
}

/// Parameters for a de-emphasis design
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeemphasisConfig {
    /// Kernel length (power of 2, at least 8)
    pub length: usize,

    /// System sample rate in Hz
    pub sample_rate: f64,

    /// Keep the analog network's phase instead of a linear-phase design
    pub correct_phase: bool,

    /// Measure deviation from the analog target
    pub do_analysis: bool,

    /// Start with the filter engaged
    pub enabled: bool,
}

impl Default for DeemphasisConfig {
    fn default() -> Self {
        Self {
            length: 1024,
            sample_rate: 44100.0,
            correct_phase: false,
            do_analysis: false,
            enabled: true,
        }
    }
}

impl DeemphasisConfig {
    /// Phase-accurate design with analysis
    pub fn accurate() -> Self {
        Self {
            length: 4096,
            correct_phase: true,
            do_analysis: true,
            ..Default::default()
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_correct_phase(mut self, correct_phase: bool) -> Self {
        self.correct_phase = correct_phase;
        self
    }

    pub fn design(&self) -> XoResult<Deemphasis> {
        create_deemphasis_filter(
            self.length,
            self.sample_rate,
            self.correct_phase,
            self.do_analysis,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CrossoverConfig::default();
        assert_eq!(config.crossover_type, CrossoverType::ThreeWay);
        assert_eq!(config.frequencies.len(), 2);
        assert!(config.normalized);
    }

    #[test]
    fn test_presets_design() {
        for config in [
            CrossoverConfig::two_way(),
            CrossoverConfig::three_way(),
            CrossoverConfig::four_way(),
        ] {
            let crossover = config.design().unwrap();
            assert_eq!(crossover.band_count(), config.crossover_type.band_count());
        }
    }

    #[test]
    fn test_builder_pattern() {
        let config = CrossoverConfig::two_way()
            .with_sample_rate(48000.0)
            .with_normalized(false)
            .with_points(&[(1200.0, 300.0)])
            .with_analysis(50.0);

        assert_eq!(config.sample_rate, 48000.0);
        assert!(!config.normalized);
        assert!(config.do_analysis);
        assert_eq!(config.frequencies, vec![1200.0]);

        let crossover = config.design().unwrap();
        assert!(crossover.analysis().is_some());
    }

    #[test]
    fn test_point_count_must_match_type() {
        let config = CrossoverConfig::four_way().with_points(&[(1000.0, 200.0)]);
        assert!(matches!(config.design(), Err(XoError::InvalidArgument(_))));
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"{"crossover_type": "two-way", "frequencies": [3000.0], "transition_bandwidths": [600.0]}"#;
        let config: CrossoverConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.crossover_type, CrossoverType::TwoWay);
        assert_eq!(config.sample_rate, 44100.0);

        let text = serde_json::to_string(&config).unwrap();
        let back: CrossoverConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_deemphasis_config() {
        let config = DeemphasisConfig::default()
            .with_length(256)
            .with_sample_rate(48000.0)
            .with_correct_phase(true);
        let filter = config.design().unwrap();
        assert_eq!(filter.kernel.len(), 256);
        assert!(filter.correct_phase);

        assert!(DeemphasisConfig::default().with_length(300).design().is_err());

        let parsed: DeemphasisConfig = serde_json::from_str(r#"{"enabled": false}"#).unwrap();
        assert!(!parsed.enabled);
        assert_eq!(parsed.length, 1024);
    }
}
