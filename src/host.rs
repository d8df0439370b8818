//! Host-facing mailbox
//!
//! The host (a GUI or controller on the other end of a link) posts run
//! requests and reads back the published average. The foreground loop picks
//! requests up through [`Correlator::poll_host`](crate::Correlator::poll_host).
//! Requests made while a batch is pending or running are rejected.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::analysis::BatchReport;
use crate::error::CorrelatorError;

/// One batch request from the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Reference frequency in Hz
    pub target_frequency: f64,
    /// Number of runs to average
    pub sample_count: u32,
}

/// What the host sees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostStatus {
    /// A request is pending or a batch is running
    pub busy: bool,
    /// Average peak of the last successful batch
    pub average_correlation: u64,
    /// Batches finished, successful or not
    pub completed_batches: u64,
    /// Error text of the last batch, if it failed
    pub last_error: Option<String>,
}

/// Shared mailbox between the host and the foreground loop
#[derive(Debug, Default)]
pub struct HostLink {
    pending: Mutex<Option<RunRequest>>,
    busy: AtomicBool,
    average: AtomicU64,
    completed: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl HostLink {
    /// Idle mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for one batch
    ///
    /// # Errors
    ///
    /// Returns `CorrelatorError::ConcurrentRunRejected` if a request is already
    /// pending or a batch is running, and `CorrelatorError::InvalidInput` if
    /// `sample_count` is 0.
    pub fn request_run(
        &self,
        target_frequency: f64,
        sample_count: u32,
    ) -> Result<(), CorrelatorError> {
        if sample_count == 0 {
            return Err(CorrelatorError::InvalidInput(
                "Sample count must be at least 1".to_string(),
            ));
        }

        let mut pending = self.lock_pending();
        if pending.is_some() || self.busy.load(Ordering::Acquire) {
            return Err(CorrelatorError::ConcurrentRunRejected);
        }
        *pending = Some(RunRequest {
            target_frequency,
            sample_count,
        });
        Ok(())
    }

    /// Take the pending request and mark the link busy
    pub fn take_request(&self) -> Option<RunRequest> {
        let mut pending = self.lock_pending();
        let request = pending.take()?;
        self.busy.store(true, Ordering::Release);
        Some(request)
    }

    /// Publish the outcome of a batch and go idle
    pub fn publish(&self, result: &Result<BatchReport, CorrelatorError>) {
        let mut last_error = self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(report) => {
                self.average.store(report.average_peak, Ordering::Release);
                *last_error = None;
            }
            Err(e) => *last_error = Some(e.to_string()),
        }
        self.completed.fetch_add(1, Ordering::AcqRel);
        self.busy.store(false, Ordering::Release);
    }

    /// Average peak of the last successful batch
    pub fn average_correlation(&self) -> u64 {
        self.average.load(Ordering::Acquire)
    }

    /// Whether a request is pending or running
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire) || self.lock_pending().is_some()
    }

    /// Snapshot for the host
    pub fn status(&self) -> HostStatus {
        HostStatus {
            busy: self.is_busy(),
            average_correlation: self.average_correlation(),
            completed_batches: self.completed.load(Ordering::Acquire),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<RunRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::BatchMetadata;

    fn report(average_peak: u64) -> BatchReport {
        BatchReport {
            target_frequency: 1300.0,
            half_period_samples: 128,
            runs: 1,
            peaks: vec![average_peak],
            average_peak,
            metadata: BatchMetadata::default(),
        }
    }

    #[test]
    fn test_second_request_rejected_until_published() {
        let link = HostLink::new();
        link.request_run(1300.0, 4).unwrap();
        assert_eq!(
            link.request_run(1300.0, 4),
            Err(CorrelatorError::ConcurrentRunRejected)
        );

        let request = link.take_request().unwrap();
        assert_eq!(request.sample_count, 4);
        assert!(link.is_busy());
        assert_eq!(
            link.request_run(500.0, 1),
            Err(CorrelatorError::ConcurrentRunRejected)
        );

        link.publish(&Ok(report(42)));
        assert!(!link.is_busy());
        assert_eq!(link.average_correlation(), 42);
        assert!(link.request_run(500.0, 1).is_ok());
    }

    #[test]
    fn test_failure_recorded_and_average_kept() {
        let link = HostLink::new();
        link.request_run(1300.0, 1).unwrap();
        link.take_request();
        link.publish(&Ok(report(7)));

        link.request_run(1e9, 1).unwrap();
        link.take_request();
        link.publish(&Err(CorrelatorError::InvalidFrequency(1e9)));

        let status = link.status();
        assert!(!status.busy);
        assert_eq!(status.average_correlation, 7);
        assert_eq!(status.completed_batches, 2);
        assert!(status.last_error.unwrap().starts_with("Invalid frequency"));
    }

    #[test]
    fn test_zero_sample_count_rejected() {
        let link = HostLink::new();
        assert!(matches!(
            link.request_run(1300.0, 0),
            Err(CorrelatorError::InvalidInput(_))
        ));
        assert!(link.take_request().is_none());
    }
}
