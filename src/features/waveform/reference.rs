//! Square reference wave generation
//!
//! The reference wave has unity magnitude: each half period is a run of `1`
//! followed by a run of `0`. The run length is
//!
//! ```text
//! half_period = round(base_sample_rate / (2 * target_frequency))
//! ```
//!
//! and the emitted value flips every time the 1-based sample index is an exact
//! multiple of `half_period`.
//!
//! # Example
//!
//! ```
//! use digital_correlator::features::waveform::reference::generate_reference_wave;
//!
//! // 8 samples per second, 1 Hz target: runs of 4
//! let wave = generate_reference_wave(1.0, 10, 8.0)?;
//! assert_eq!(wave, vec![1, 1, 1, 1, 0, 0, 0, 0, 1, 1]);
//! # Ok::<(), digital_correlator::CorrelatorError>(())
//! ```

use crate::error::CorrelatorError;

/// Number of samples in one half period of the reference wave
///
/// # Errors
///
/// Returns `CorrelatorError::InvalidFrequency` if the frequency is not a
/// positive finite number or is high enough that the half period rounds to 0.
pub fn half_period_samples(
    target_frequency: f64,
    base_sample_rate: f64,
) -> Result<usize, CorrelatorError> {
    if !target_frequency.is_finite() || target_frequency <= 0.0 {
        return Err(CorrelatorError::InvalidFrequency(target_frequency));
    }

    let half_period = (base_sample_rate / (2.0 * target_frequency)).round();
    if !half_period.is_finite() || half_period < 1.0 {
        return Err(CorrelatorError::InvalidFrequency(target_frequency));
    }

    Ok(half_period as usize)
}

/// Generate a 0/1 square wave of `length` samples at `target_frequency`
///
/// # Arguments
///
/// * `target_frequency` - Reference frequency in Hz
/// * `length` - Number of samples to emit (normally the logical buffer length)
/// * `base_sample_rate` - Samples per second of the acquisition clock
///
/// # Errors
///
/// Returns `CorrelatorError::InvalidFrequency` when the half period is degenerate
/// (see [`half_period_samples`]).
pub fn generate_reference_wave(
    target_frequency: f64,
    length: usize,
    base_sample_rate: f64,
) -> Result<Vec<u8>, CorrelatorError> {
    let half_period = half_period_samples(target_frequency, base_sample_rate)?;

    log::debug!(
        "Generating {}-sample reference wave at {:.2} Hz (half period {} samples)",
        length,
        target_frequency,
        half_period
    );

    Ok((0..length)
        .map(|i| if (i / half_period).is_multiple_of(2) { 1 } else { 0 })
        .collect())
}

/// Reference wave cached across runs
///
/// Regenerated only when the target frequency or length changes.
#[derive(Debug, Clone, Default)]
pub struct ReferenceWave {
    frequency: Option<f64>,
    half_period: usize,
    samples: Vec<u8>,
}

impl ReferenceWave {
    /// Empty wave; the first [`update`](Self::update) generates it
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure the wave matches `target_frequency` and `length`
    ///
    /// On error the previous wave is kept.
    pub fn update(
        &mut self,
        target_frequency: f64,
        length: usize,
        base_sample_rate: f64,
    ) -> Result<&[u8], CorrelatorError> {
        let current = self.frequency == Some(target_frequency) && self.samples.len() == length;
        if !current {
            let half_period = half_period_samples(target_frequency, base_sample_rate)?;
            self.samples = generate_reference_wave(target_frequency, length, base_sample_rate)?;
            self.half_period = half_period;
            self.frequency = Some(target_frequency);
        }
        Ok(&self.samples)
    }

    /// Frequency of the current wave, if one has been generated
    pub fn frequency(&self) -> Option<f64> {
        self.frequency
    }

    /// Half period of the current wave in samples
    pub fn half_period(&self) -> usize {
        self.half_period
    }

    /// Current wave values
    pub fn as_slice(&self) -> &[u8] {
        &self.samples
    }
}
