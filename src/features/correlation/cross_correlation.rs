//! Time-domain cross-correlation
//!
//! Slides the reference wave across the acquired samples and reports the
//! strongest overlap sum.
//!
//! # Algorithm
//!
//! For two sequences of length `N` and every offset `k` in `0..N` (lag
//! `N - 1 - k`), two partial sums over the `k + 1` overlapping samples are
//! computed from scratch:
//!
//! ```text
//! sum1(k) = Σ_{j=0..k} samples[j] * wave[j + (N-1-k)]
//! sum2(k) = Σ_{j=0..k} samples[j + (N-1-k)] * wave[j]
//! ```
//!
//! `sum1` is the overlap with the reference leading, `sum2` the mirror image
//! with the samples leading. The larger of the two is the candidate for that
//! offset, and the result is the largest candidate over all offsets.
//!
//! The cost is O(N²). There is no frequency-domain shortcut; the engine runs
//! once per acquisition on a bounded buffer.
//!
//! # Example
//!
//! ```
//! use digital_correlator::features::correlation::cross_correlation::peak_correlation;
//!
//! let wave = [1u8, 1, 0, 0, 1, 1, 0, 0];
//! let samples = [1u16, 1, 0, 0, 1, 1, 0, 0];
//! assert_eq!(peak_correlation(&samples, &wave)?, 4);
//! # Ok::<(), digital_correlator::CorrelatorError>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::error::CorrelatorError;

/// Which mirror-image overlap produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Overlap {
    /// `sum1`: head of the samples against the tail of the wave
    WaveLeads,
    /// `sum2`: tail of the samples against the head of the wave
    SamplesLead,
}

/// Location and magnitude of the correlation peak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationPeak {
    /// Peak overlap sum
    pub magnitude: u64,

    /// Offset `k` at which the peak was first reached (overlap length `k + 1`)
    pub offset: usize,

    /// Lag `N - 1 - k`
    pub lag: usize,

    /// Overlap direction of the winning candidate
    pub overlap: Overlap,
}

/// Peak correlation magnitude between `samples` and `wave`
///
/// # Errors
///
/// Returns `CorrelatorError::LengthMismatch` if the sequences differ in length.
pub fn peak_correlation(samples: &[u16], wave: &[u8]) -> Result<u64, CorrelatorError> {
    Ok(peak_correlation_detailed(samples, wave)?
        .map(|peak| peak.magnitude)
        .unwrap_or(0))
}

/// Peak correlation with the offset, lag and overlap that produced it
///
/// Returns `Ok(None)` when no candidate exceeds zero (empty input, all-zero
/// samples, or an all-zero wave).
///
/// # Errors
///
/// Returns `CorrelatorError::LengthMismatch` if the sequences differ in length.
pub fn peak_correlation_detailed(
    samples: &[u16],
    wave: &[u8],
) -> Result<Option<CorrelationPeak>, CorrelatorError> {
    if samples.len() != wave.len() {
        return Err(CorrelatorError::LengthMismatch {
            samples: samples.len(),
            wave: wave.len(),
        });
    }

    let n = samples.len();
    let mut best: Option<CorrelationPeak> = None;

    for offset in 0..n {
        let (sum1, sum2) = overlap_sums(samples, wave, offset);

        // signed comparison: sum1 wins only when strictly larger
        let (candidate, overlap) = if sum1 > sum2 {
            (sum1, Overlap::WaveLeads)
        } else {
            (sum2, Overlap::SamplesLead)
        };

        let current = best.map(|peak| peak.magnitude).unwrap_or(0);
        if candidate > current {
            best = Some(CorrelationPeak {
                magnitude: candidate,
                offset,
                lag: n - 1 - offset,
                overlap,
            });
        }
    }

    if let Some(peak) = &best {
        log::debug!(
            "Correlation peak {} at lag {} ({:?}) over {} samples",
            peak.magnitude,
            peak.lag,
            peak.overlap,
            n
        );
    }

    Ok(best)
}

/// `(sum1(k), sum2(k))` for offset `k`; callers guarantee equal lengths and `k < N`
fn overlap_sums(samples: &[u16], wave: &[u8], offset: usize) -> (u64, u64) {
    let lag = samples.len() - 1 - offset;
    let width = offset + 1;

    let sum1 = samples[..width]
        .iter()
        .zip(&wave[lag..])
        .map(|(&s, &w)| s as u64 * w as u64)
        .sum();
    let sum2 = samples[lag..]
        .iter()
        .zip(&wave[..width])
        .map(|(&s, &w)| s as u64 * w as u64)
        .sum();

    (sum1, sum2)
}
