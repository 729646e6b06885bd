//! xo-core: Shared types, traits, and utilities for xover
//!
//! This crate provides the foundational types used across all xover crates:
//! the sample type, the error enum, and the `AudioFilter` stream contract
//! every filter stage implements.

mod error;
mod filter;
mod sample;

pub use error::*;
pub use filter::*;
pub use sample::*;

/// Decibel value wrapper (1.0 linear = 0 dB)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Decibels(pub f64);

impl Decibels {
    pub const ZERO: Self = Self(0.0);

    /// Convert a linear gain. A non-positive gain has no logarithm and maps
    /// to 0 dB rather than a non-finite value.
    #[inline]
    pub fn from_gain(gain: f64) -> Self {
        if gain <= 0.0 {
            Self::ZERO
        } else {
            Self(20.0 * gain.log10())
        }
    }

    #[inline]
    pub fn to_gain(self) -> f64 {
        10.0_f64.powf(self.0 / 20.0)
    }
}

impl Default for Decibels {
    fn default() -> Self {
        Self::ZERO
    }
}
