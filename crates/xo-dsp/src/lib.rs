//! xo-dsp: FIR crossover and de-emphasis processing for xover
//!
//! Linear-phase band splitting for multi-way loudspeakers, streamed through
//! an overlap-add FFT convolver.
//!
//! ## Modules
//! - `fourier` - Radix-2 FFT/IFFT, direct DFT, magnitude/phase helpers
//! - `kernel` - Windowed-sinc lowpass, highpass, bandpass design
//! - `response` - Frequency, phase and delay analysis of a kernel
//! - `crossover` - Two/three/four-way crossover designs
//! - `deemphasis` - FIR approximation of the analog de-emphasis network
//! - `convolution` - Streaming overlap-add engine with switchable kernel banks
//! - `filters` - `AudioFilter` stages: crossover, de-emphasis, band select, volume
//! - `config` - Serializable design parameters

pub mod config;
pub mod convolution;
pub mod crossover;
pub mod deemphasis;
pub mod filters;
pub mod fourier;
pub mod kernel;
pub mod response;

pub use config::{CrossoverConfig, DeemphasisConfig};
pub use convolution::{EngineState, OverlapAddEngine};
pub use crossover::{
    Band, Crossover, CrossoverAnalysis, CrossoverType, create_four_way, create_three_way,
    create_two_way,
};
pub use deemphasis::{Deemphasis, DeemphasisAnalysis, Deviation, IdealResponse, create_deemphasis_filter};
pub use filters::{BandSelect, CrossoverFilter, DeemphasisFilter, VolumeControl};
pub use kernel::FilterKernel;
pub use response::FilterResponse;
