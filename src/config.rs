//! Configuration parameters and system constants

use std::time::Duration;

use crate::error::CorrelatorError;

/// Logical sample buffer length `L`
pub const ARRAY_SIZE: usize = 4096;

/// Physical transfer segment length `S` (one half of the double buffer)
pub const SEGMENT_SIZE: usize = 1024;

/// Frequency of the signal the buffer is sized around, in Hz
pub const DATA_FREQUENCY_HZ: f64 = 1300.0;

/// Number of reference-wave pulses that fit in one logical buffer
pub const PULSES_PER_BUFFER: u32 = 16;

/// Sampling rate derived from the defaults: `L * DATA_FREQUENCY_HZ / PULSES_PER_BUFFER`
pub const SAMPLING_RATE_HZ: u32 = 332_800;

/// Tail delay before the transfer engine is shut down on the terminal segment
///
/// 40945 delay-loop iterations of 3 cycles each at 80 MHz.
pub const DEFAULT_TERMINAL_SETTLE: Duration = Duration::from_micros(1535);

/// Cadence of the foreground loop polling the host trigger
pub const DEFAULT_HOST_POLL_INTERVAL: Duration = Duration::from_millis(75);

/// Bounded wait for the completion signal of a single acquisition
pub const DEFAULT_ACQUISITION_TIMEOUT: Duration = Duration::from_millis(500);

/// Correlator configuration parameters
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    // Buffer topology
    /// Logical buffer length `L` (default: 4096)
    pub buffer_len: usize,

    /// Physical segment length `S` (default: 1024)
    /// `buffer_len` must be a multiple of this
    pub segment_len: usize,

    // Reference wave
    /// Frequency the buffer is dimensioned for, in Hz (default: 1300.0)
    pub data_frequency_hz: f64,

    /// Pulses of the data frequency per logical buffer (default: 16)
    pub pulses_per_buffer: u32,

    // Timing
    /// Bounded wait for one acquisition to complete (default: 500 ms)
    pub acquisition_timeout: Duration,

    /// Delay held in the terminal branch before disabling hardware (default: ~1.5 ms)
    pub terminal_settle: Duration,

    /// Foreground loop polling cadence (default: 75 ms)
    pub host_poll_interval: Duration,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            buffer_len: ARRAY_SIZE,
            segment_len: SEGMENT_SIZE,
            data_frequency_hz: DATA_FREQUENCY_HZ,
            pulses_per_buffer: PULSES_PER_BUFFER,
            acquisition_timeout: DEFAULT_ACQUISITION_TIMEOUT,
            terminal_settle: DEFAULT_TERMINAL_SETTLE,
            host_poll_interval: DEFAULT_HOST_POLL_INTERVAL,
        }
    }
}

impl CorrelatorConfig {
    /// Check the buffer topology and rate parameters
    ///
    /// # Errors
    ///
    /// Returns `CorrelatorError::InvalidInput` if a segment length is zero, the
    /// logical length is not a whole number of segments, or the rate parameters
    /// do not produce a positive sampling rate.
    pub fn validate(&self) -> Result<(), CorrelatorError> {
        if self.segment_len == 0 {
            return Err(CorrelatorError::InvalidInput(
                "Segment length must be non-zero".to_string(),
            ));
        }

        if self.buffer_len == 0 || !self.buffer_len.is_multiple_of(self.segment_len) {
            return Err(CorrelatorError::InvalidInput(format!(
                "Buffer length {} is not a whole number of {}-sample segments",
                self.buffer_len, self.segment_len
            )));
        }

        if self.pulses_per_buffer == 0 {
            return Err(CorrelatorError::InvalidInput(
                "Pulses per buffer must be non-zero".to_string(),
            ));
        }

        if !self.data_frequency_hz.is_finite() || self.data_frequency_hz <= 0.0 {
            return Err(CorrelatorError::InvalidInput(format!(
                "Invalid data frequency: {}",
                self.data_frequency_hz
            )));
        }

        if self.sampling_rate() == 0 {
            return Err(CorrelatorError::InvalidInput(
                "Sampling rate rounds down to 0 Hz".to_string(),
            ));
        }

        Ok(())
    }

    /// Number of physical segments per logical buffer (`L / S`)
    pub fn segment_count(&self) -> usize {
        self.buffer_len / self.segment_len
    }

    /// Samples per second represented by one logical buffer cycle
    pub fn base_sample_rate(&self) -> f64 {
        self.buffer_len as f64 * self.data_frequency_hz / self.pulses_per_buffer as f64
    }

    /// Sampling rate programmed into the periodic trigger, truncated to whole Hz
    pub fn sampling_rate(&self) -> u32 {
        self.base_sample_rate() as u32
    }

    /// Reload value for a periodic timer clocked at `system_clock_hz`
    ///
    /// Returns `None` when the clock is too slow to reach the sampling rate.
    pub fn timer_load_value(&self, system_clock_hz: u32) -> Option<u32> {
        let rate = self.sampling_rate();
        if rate == 0 {
            return None;
        }
        (system_clock_hz / rate).checked_sub(1)
    }
}
