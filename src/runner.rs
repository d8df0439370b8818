//! Run controller
//!
//! Orchestrates a batch: regenerate the reference wave, then for every run
//! start one acquisition, wait (bounded) for the terminal segment to raise the
//! completion signal, correlate the filled buffer and accumulate the peak. The
//! truncated average is returned in a [`BatchReport`].
//!
//! Only one batch may be in flight; a second request while busy is rejected
//! with `ConcurrentRunRejected`, never queued.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use digital_correlator::acquisition::SimulatedAdc;
//! use digital_correlator::{Correlator, CorrelatorConfig};
//!
//! let config = CorrelatorConfig::default();
//! let adc = SimulatedAdc::new(config.buffer_len, Arc::new(|i| ((i / 128) % 2 * 2000) as u16));
//! let correlator = Correlator::new(
//!     config,
//!     adc.sample_buffer(),
//!     adc.transfer_engine(),
//!     adc.trigger(),
//! )?;
//! adc.attach_handler(correlator.segment_complete_handler());
//!
//! let report = correlator.run_batch(1300.0, 4)?;
//! println!("average peak: {}", report.average_peak);
//! # Ok::<(), digital_correlator::CorrelatorError>(())
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

use crate::acquisition::{
    segment_complete_handler, AcquisitionController, CompletionSignal, SampleTrigger,
    SegmentCompleteHandler, SharedAcquisition, TransferEngine, TransferState,
};
use crate::analysis::{BatchMetadata, BatchReport, RunAccumulator};
use crate::config::CorrelatorConfig;
use crate::error::CorrelatorError;
use crate::features::correlation::peak_correlation;
use crate::features::waveform::ReferenceWave;
use crate::host::HostLink;
use crate::io::SampleBuffer;

/// Working state of the batch in flight; only the busy-flag holder locks it
#[derive(Default)]
struct BatchState {
    reference: ReferenceWave,
    accumulator: RunAccumulator,
}

/// Clears the busy flag when the batch ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn claim(flag: &'a AtomicBool) -> Result<Self, CorrelatorError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CorrelatorError::ConcurrentRunRejected)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Acquisition + correlation run controller
pub struct Correlator<T, G> {
    config: CorrelatorConfig,
    acquisition: SharedAcquisition<T, G>,
    signal: CompletionSignal,
    buffer: SampleBuffer,
    busy: AtomicBool,
    state: Mutex<BatchState>,
    last_report: Mutex<Option<BatchReport>>,
}

impl<T, G> Correlator<T, G>
where
    T: TransferEngine + 'static,
    G: SampleTrigger + 'static,
{
    /// Build a run controller over `buffer` and the given hardware
    ///
    /// The caller must register [`segment_complete_handler`](Self::segment_complete_handler)
    /// with the completion event source before running a batch.
    ///
    /// # Errors
    ///
    /// Returns `CorrelatorError::InvalidInput` if the configuration is invalid or
    /// the buffer length differs from `config.buffer_len`.
    pub fn new(
        config: CorrelatorConfig,
        buffer: SampleBuffer,
        engine: T,
        trigger: G,
    ) -> Result<Self, CorrelatorError> {
        config.validate()?;
        if buffer.len() != config.buffer_len {
            return Err(CorrelatorError::InvalidInput(format!(
                "Sample buffer holds {} samples, configuration expects {}",
                buffer.len(),
                config.buffer_len
            )));
        }

        let controller = AcquisitionController::new(&config, engine, trigger)?;
        let signal = controller.completion_signal();

        Ok(Self {
            config,
            acquisition: controller.into_shared(),
            signal,
            buffer,
            busy: AtomicBool::new(false),
            state: Mutex::new(BatchState::default()),
            last_report: Mutex::new(None),
        })
    }

    /// Callback to register with the completion event source
    pub fn segment_complete_handler(&self) -> SegmentCompleteHandler {
        segment_complete_handler(&self.acquisition)
    }

    /// Active configuration
    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    /// Whether a batch is in progress
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Counters of the acquisition controller
    pub fn transfer_state(&self) -> TransferState {
        self.lock_acquisition().transfer_state()
    }

    /// Report of the most recent successful batch
    ///
    /// Does not wait for a batch in progress.
    pub fn last_report(&self) -> Option<BatchReport> {
        self.last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run `run_count` acquisitions against a `target_frequency` reference wave
    ///
    /// # Errors
    ///
    /// - `ConcurrentRunRejected` if another batch is in progress
    /// - `InvalidInput` if `run_count` is 0
    /// - `InvalidFrequency` if the reference wave would be degenerate; no
    ///   acquisition is started
    /// - `AcquisitionTimeout` if a run never reaches its terminal segment; the
    ///   transfer state is reset and the batch is abandoned
    pub fn run_batch(
        &self,
        target_frequency: f64,
        run_count: u32,
    ) -> Result<BatchReport, CorrelatorError> {
        let _busy = BusyGuard::claim(&self.busy)?;
        let start_time = Instant::now();

        if run_count == 0 {
            return Err(CorrelatorError::InvalidInput(
                "Run count must be at least 1".to_string(),
            ));
        }

        log::debug!(
            "Starting batch: {} runs at {:.2} Hz",
            run_count,
            target_frequency
        );

        let mut guard = self.lock_state();
        let BatchState {
            reference,
            accumulator,
        } = &mut *guard;

        let wave = reference.update(
            target_frequency,
            self.config.buffer_len,
            self.config.base_sample_rate(),
        )?;
        accumulator.reset(run_count);

        for run in 1..=run_count {
            self.acquire_once()?;
            let peak = self.buffer.read(|samples| peak_correlation(samples, wave))?;
            log::debug!("Run {}/{}: peak correlation {}", run, run_count, peak);
            accumulator.record(peak);
        }

        let report = BatchReport {
            target_frequency,
            half_period_samples: reference.half_period(),
            runs: run_count,
            peaks: accumulator.peaks().to_vec(),
            average_peak: accumulator.average_peak(),
            metadata: BatchMetadata {
                sampling_rate: self.config.sampling_rate(),
                buffer_len: self.config.buffer_len,
                segment_count: self.config.segment_count(),
                processing_time_ms: start_time.elapsed().as_secs_f32() * 1000.0,
                ..BatchMetadata::default()
            },
        };

        log::info!(
            "Batch complete: {} runs at {:.2} Hz, average peak {}",
            run_count,
            target_frequency,
            report.average_peak
        );

        *self
            .last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        Ok(report)
    }

    /// Serve one pending host request, if any, and publish its outcome
    pub fn poll_host(&self, link: &HostLink) -> Option<Result<BatchReport, CorrelatorError>> {
        let request = link.take_request()?;
        let result = self.run_batch(request.target_frequency, request.sample_count);
        if let Err(e) = &result {
            log::warn!("Batch failed: {}", e);
        }
        link.publish(&result);
        Some(result)
    }

    /// Foreground loop: poll `link` on the configured cadence until `shutdown` is set
    pub fn run_foreground(&self, link: &HostLink, shutdown: &AtomicBool) {
        log::debug!(
            "Foreground loop polling every {:?}",
            self.config.host_poll_interval
        );
        while !shutdown.load(Ordering::Acquire) {
            if self.poll_host(link).is_none() {
                thread::sleep(self.config.host_poll_interval);
            }
        }
    }

    fn acquire_once(&self) -> Result<(), CorrelatorError> {
        self.lock_acquisition()
            .start(self.config.sampling_rate())?;

        if let Err(e) = self.signal.wait(self.config.acquisition_timeout) {
            log::warn!("{}; resetting transfer state", e);
            self.lock_acquisition().abort();
            return Err(e);
        }
        Ok(())
    }

    fn lock_acquisition(&self) -> MutexGuard<'_, AcquisitionController<T, G>> {
        self.acquisition
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
