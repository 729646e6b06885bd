//! Filter stages implementing `AudioFilter`
//!
//! Stages wrap their upstream source and compose by nesting:
//! `VolumeControl<BandSelect<CrossoverFilter<MemorySource>>>`.

mod band_select;
mod crossover_filter;
mod deemphasis_filter;
mod volume;

pub use band_select::BandSelect;
pub use crossover_filter::CrossoverFilter;
pub use deemphasis_filter::DeemphasisFilter;
pub use volume::VolumeControl;
