//! Error types for the correlator

use std::fmt;
use std::time::Duration;

/// Errors that can occur while acquiring or correlating a batch
#[derive(Debug, Clone, PartialEq)]
pub enum CorrelatorError {
    /// Target frequency yields a zero-length half period (or is not a usable number)
    InvalidFrequency(f64),

    /// Sample and reference sequences differ in length
    LengthMismatch {
        /// Length of the sample sequence
        samples: usize,
        /// Length of the reference wave
        wave: usize,
    },

    /// Completion signal not observed within the bounded wait
    AcquisitionTimeout(Duration),

    /// A batch was requested while another one is in progress
    ConcurrentRunRejected,

    /// Invalid configuration or request parameters
    InvalidInput(String),
}

impl fmt::Display for CorrelatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelatorError::InvalidFrequency(freq) => {
                write!(f, "Invalid frequency: {} Hz gives a zero-length half period", freq)
            }
            CorrelatorError::LengthMismatch { samples, wave } => write!(
                f,
                "Length mismatch: {} samples vs {} reference values",
                samples, wave
            ),
            CorrelatorError::AcquisitionTimeout(timeout) => write!(
                f,
                "Acquisition timeout: no completion after {:.1} ms",
                timeout.as_secs_f64() * 1000.0
            ),
            CorrelatorError::ConcurrentRunRejected => {
                write!(f, "Run rejected: a batch is already in progress")
            }
            CorrelatorError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for CorrelatorError {}
