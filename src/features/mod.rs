//! Signal computation modules
//!
//! - Reference waveform generation
//! - Time-domain cross-correlation

pub mod correlation;
pub mod waveform;
