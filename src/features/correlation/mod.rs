//! Cross-correlation engine
//!
//! Pure computation over the acquired samples and the reference wave.

pub mod cross_correlation;

pub use cross_correlation::{
    peak_correlation, peak_correlation_detailed, CorrelationPeak, Overlap,
};
