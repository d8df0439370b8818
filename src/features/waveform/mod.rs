//! Reference waveform generation
//!
//! Builds the binary square wave the acquired samples are correlated against.

pub mod reference;

pub use reference::{generate_reference_wave, half_period_samples, ReferenceWave};
