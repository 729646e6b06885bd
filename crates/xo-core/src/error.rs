//! Error types for xover

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XoError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Out of range: {name} = {value}")]
    OutOfRange { name: &'static str, value: f64 },

    #[error("Channel mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("Sample rate mismatch: expected {expected}Hz, got {actual}Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },

    #[error("Source protocol violation: {0}")]
    SourceProtocol(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl XoError {
    /// Shorthand for a numeric parameter outside its valid range
    #[inline]
    pub fn out_of_range(name: &'static str, value: impl Into<f64>) -> Self {
        Self::OutOfRange {
            name,
            value: value.into(),
        }
    }

    /// Shorthand for a malformed argument
    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Result type alias
pub type XoResult<T> = Result<T, XoError>;
