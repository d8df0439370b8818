//! Batch result types

use serde::{Deserialize, Serialize};

use super::metadata::BatchMetadata;

/// Running totals for one batch of runs
///
/// Reset at the start of every batch and owned by the run controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunAccumulator {
    runs_requested: u32,
    runs_completed: u32,
    sum_of_peaks: u64,
    peaks: Vec<u64>,
}

impl RunAccumulator {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new batch of `runs_requested` runs
    pub fn reset(&mut self, runs_requested: u32) {
        self.runs_requested = runs_requested;
        self.runs_completed = 0;
        self.sum_of_peaks = 0;
        self.peaks.clear();
    }

    /// Add the peak of one completed run
    pub fn record(&mut self, peak: u64) {
        self.runs_completed += 1;
        self.sum_of_peaks += peak;
        self.peaks.push(peak);
    }

    /// `sum_of_peaks / runs_requested`, truncated; 0 before any batch
    pub fn average_peak(&self) -> u64 {
        if self.runs_requested == 0 {
            return 0;
        }
        self.sum_of_peaks / self.runs_requested as u64
    }

    /// Runs requested for the current batch
    pub fn runs_requested(&self) -> u32 {
        self.runs_requested
    }

    /// Runs recorded so far
    pub fn runs_completed(&self) -> u32 {
        self.runs_completed
    }

    /// Sum of the recorded peaks
    pub fn sum_of_peaks(&self) -> u64 {
        self.sum_of_peaks
    }

    /// Whether every requested run has been recorded
    pub fn is_complete(&self) -> bool {
        self.runs_requested > 0 && self.runs_completed == self.runs_requested
    }

    /// Recorded peaks in run order
    pub fn peaks(&self) -> &[u64] {
        &self.peaks
    }
}

/// Result of one completed batch, published to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Reference frequency in Hz
    pub target_frequency: f64,

    /// Half period of the reference wave in samples
    pub half_period_samples: usize,

    /// Number of acquisition + correlation runs
    pub runs: u32,

    /// Peak correlation of each run
    pub peaks: Vec<u64>,

    /// Integer-truncated mean of `peaks`
    pub average_peak: u64,

    /// Acquisition context
    pub metadata: BatchMetadata,
}
