//! Batch metadata structures

use serde::{Deserialize, Serialize};

/// Context a batch was acquired under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    /// Crate version that produced the report
    pub algorithm_version: String,

    /// Sampling rate programmed into the trigger, in Hz
    pub sampling_rate: u32,

    /// Logical buffer length `L`
    pub buffer_len: usize,

    /// Physical segments per logical buffer
    pub segment_count: usize,

    /// Wall-clock time for the whole batch in milliseconds
    pub processing_time_ms: f32,
}

impl Default for BatchMetadata {
    fn default() -> Self {
        Self {
            algorithm_version: env!("CARGO_PKG_VERSION").to_string(),
            sampling_rate: 0,
            buffer_len: 0,
            segment_count: 0,
            processing_time_ms: 0.0,
        }
    }
}
