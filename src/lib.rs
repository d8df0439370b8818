//! # Digital Correlator
//!
//! Acquires a block of analog samples through a double-buffered transfer
//! engine, correlates it against a synthetic square reference wave, and
//! reports the averaged peak correlation to a host.
//!
//! ## Features
//!
//! - **Acquisition**: ping-pong refill state machine stitching fixed-size
//!   segment transfers into one large logical buffer
//! - **Reference wave**: 0/1 square wave at any frequency the sampling rate resolves
//! - **Cross-correlation**: direct time-domain peak search over every lag
//! - **Run control**: averaged batches with an explicit completion signal,
//!   bounded waits and overlap rejection
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use digital_correlator::acquisition::SimulatedAdc;
//! use digital_correlator::{Correlator, CorrelatorConfig};
//!
//! let config = CorrelatorConfig::default();
//! let adc = SimulatedAdc::new(config.buffer_len, Arc::new(|i| (i % 256) as u16));
//! let correlator = Correlator::new(
//!     config,
//!     adc.sample_buffer(),
//!     adc.transfer_engine(),
//!     adc.trigger(),
//! )?;
//! adc.attach_handler(correlator.segment_complete_handler());
//!
//! let report = correlator.run_batch(1300.0, 8)?;
//! println!("Average peak: {}", report.average_peak);
//! # Ok::<(), digital_correlator::CorrelatorError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Host request → Run controller → Acquisition (segments) → Completion signal
//!                      ↓                                          ↓
//!               Reference wave ───────────→ Cross-correlation → Average → Host
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod acquisition;
pub mod analysis;
pub mod config;
pub mod error;
pub mod features;
pub mod host;
pub mod io;
pub mod runner;

// Re-export main types
pub use analysis::{BatchReport, RunAccumulator};
pub use config::CorrelatorConfig;
pub use error::CorrelatorError;
pub use features::correlation::{peak_correlation, CorrelationPeak};
pub use features::waveform::generate_reference_wave;
pub use host::{HostLink, HostStatus, RunRequest};
pub use runner::Correlator;

/// Peak correlation of `samples` against a `target_frequency` reference wave
///
/// Convenience for one-off analysis of an already acquired buffer: generates
/// a `samples.len()`-sample reference wave at the sampling rate of `config`
/// and correlates.
///
/// # Errors
///
/// Returns `CorrelatorError::InvalidFrequency` if the reference wave would be
/// degenerate.
///
/// # Example
///
/// ```
/// use digital_correlator::{correlate_buffer, CorrelatorConfig};
///
/// let samples = vec![0u16; 256];
/// assert_eq!(correlate_buffer(&samples, 1300.0, &CorrelatorConfig::default())?, 0);
/// # Ok::<(), digital_correlator::CorrelatorError>(())
/// ```
pub fn correlate_buffer(
    samples: &[u16],
    target_frequency: f64,
    config: &CorrelatorConfig,
) -> Result<u64, CorrelatorError> {
    let wave = generate_reference_wave(target_frequency, samples.len(), config.base_sample_rate())?;
    peak_correlation(samples, &wave)
}
