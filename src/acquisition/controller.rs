//! Double-buffer refill state machine
//!
//! The transfer engine owns two physical segments. At start they point at
//! logical offsets `0` and `S`. Every completion event frees the segment that
//! just finished; while more than two segments of the logical buffer are still
//! outstanding, the freed half is pointed at the next unfilled region:
//!
//! ```text
//! remaining > 2  -> re-arm freed half at S + S * issued, issued += 1, remaining -= 1
//! remaining == 2 -> both halves already cover the rest,  issued += 1, remaining -= 1
//! remaining == 1 -> terminal: settle, stop trigger, disable engine, reset, signal
//! ```
//!
//! The half to re-arm follows the parity of `issued`: odd re-arms the primary
//! half, even the alternate one, matching the ping-pong completion order.
//!
//! While running, `remaining + issued == total + 1` holds after every event.
//!
//! Each event first reads and clears the engine's transfer-complete flag. An
//! event left over from an aborted acquisition finds the flag cleared by
//! `disable_all` and is ignored.
//!
//! `on_segment_complete` runs in the event context and must stay short; the
//! only blocking step is the bounded settle delay on the terminal segment.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::signal::CompletionSignal;
use super::{SampleTrigger, SegmentCompleteHandler, SegmentHalf, TransferEngine};
use crate::config::CorrelatorConfig;
use crate::error::CorrelatorError;

/// Controller shared between the foreground and the completion event context
pub type SharedAcquisition<T, G> = Arc<Mutex<AcquisitionController<T, G>>>;

/// Snapshot of the transfer counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferState {
    /// Segments of the logical buffer not yet accounted for
    pub segments_remaining: usize,

    /// Segment progress counter; starts at 1 and drives the re-arm offset
    pub segments_issued: usize,

    /// Half re-armed by the most recent event, `None` if it re-armed nothing
    pub active_half: Option<SegmentHalf>,
}

/// Result of handling one completion event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Freed half was pointed at `offset`
    Reprogrammed {
        /// Half that was re-armed
        half: SegmentHalf,
        /// New logical destination offset
        offset: usize,
    },
    /// Counters advanced, hardware untouched
    Advanced,
    /// Terminal segment: hardware stopped, state reset, signal raised
    Completed,
    /// No acquisition in progress
    Ignored,
}

/// Acquisition buffer controller
pub struct AcquisitionController<T, G> {
    engine: T,
    trigger: G,
    segment_len: usize,
    total_segments: usize,
    segments_remaining: usize,
    segments_issued: usize,
    active_half: Option<SegmentHalf>,
    running: bool,
    terminal_settle: Duration,
    signal: CompletionSignal,
    completed: u64,
}

impl<T: TransferEngine, G: SampleTrigger> AcquisitionController<T, G> {
    /// Create a controller for the buffer topology in `config`
    ///
    /// # Errors
    ///
    /// Returns `CorrelatorError::InvalidInput` if the configuration is invalid.
    pub fn new(config: &CorrelatorConfig, engine: T, trigger: G) -> Result<Self, CorrelatorError> {
        config.validate()?;
        let total_segments = config.segment_count();

        Ok(Self {
            engine,
            trigger,
            segment_len: config.segment_len,
            total_segments,
            segments_remaining: total_segments,
            segments_issued: 1,
            active_half: None,
            running: false,
            terminal_settle: config.terminal_settle,
            signal: CompletionSignal::new(),
            completed: 0,
        })
    }

    /// Wrap the controller for sharing with the event context
    pub fn into_shared(self) -> SharedAcquisition<T, G> {
        Arc::new(Mutex::new(self))
    }

    /// Arm both halves and start the sampling clock
    ///
    /// # Errors
    ///
    /// Returns `CorrelatorError::ConcurrentRunRejected` if an acquisition is
    /// already in progress.
    pub fn start(&mut self, sampling_rate: u32) -> Result<(), CorrelatorError> {
        if self.running {
            return Err(CorrelatorError::ConcurrentRunRejected);
        }

        self.reset_counters();
        self.signal.clear();

        self.engine.arm_segment(SegmentHalf::Primary, 0, self.segment_len);
        self.engine.enable_segment(SegmentHalf::Primary);
        if self.total_segments >= 2 {
            self.engine
                .arm_segment(SegmentHalf::Alternate, self.segment_len, self.segment_len);
            self.engine.enable_segment(SegmentHalf::Alternate);
        }

        self.running = true;
        log::debug!(
            "Starting acquisition: {} segments of {} samples at {} Hz",
            self.total_segments,
            self.segment_len,
            sampling_rate
        );
        self.trigger.start_periodic(sampling_rate);
        Ok(())
    }

    /// Handle one physical-segment completion
    pub fn on_segment_complete(&mut self) -> SegmentOutcome {
        if !self.running {
            log::warn!("Segment completion with no acquisition in progress; ignoring");
            return SegmentOutcome::Ignored;
        }
        if !self.engine.take_transfer_complete() {
            log::debug!("Segment completion with no finished transfer; ignoring");
            return SegmentOutcome::Ignored;
        }

        if self.segments_remaining > 2 {
            let half = if self.segments_issued % 2 == 1 {
                SegmentHalf::Primary
            } else {
                SegmentHalf::Alternate
            };
            let offset = self.segment_len + self.segment_len * self.segments_issued;

            self.engine.arm_segment(half, offset, self.segment_len);
            self.engine.enable_segment(half);
            self.segments_issued += 1;
            self.segments_remaining -= 1;
            self.active_half = Some(half);
            return SegmentOutcome::Reprogrammed { half, offset };
        }

        self.active_half = None;

        if self.segments_remaining == 2 {
            self.segments_issued += 1;
            self.segments_remaining -= 1;
            return SegmentOutcome::Advanced;
        }

        if !self.terminal_settle.is_zero() {
            std::thread::sleep(self.terminal_settle);
        }
        self.shutdown_hardware();
        self.completed += 1;
        log::debug!("Acquisition {} complete", self.completed);
        self.signal.notify();
        SegmentOutcome::Completed
    }

    /// Stop the hardware and reset the counters without raising the signal
    pub fn abort(&mut self) {
        if self.running {
            log::warn!(
                "Aborting acquisition with {} of {} segments outstanding",
                self.segments_remaining,
                self.total_segments
            );
        }
        self.shutdown_hardware();
    }

    /// Current counters
    pub fn transfer_state(&self) -> TransferState {
        TransferState {
            segments_remaining: self.segments_remaining,
            segments_issued: self.segments_issued,
            active_half: self.active_half,
        }
    }

    /// Whether an acquisition is in progress
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of physical segments per logical buffer
    pub fn total_segments(&self) -> usize {
        self.total_segments
    }

    /// Acquisitions that reached the terminal segment
    pub fn completed_acquisitions(&self) -> u64 {
        self.completed
    }

    /// Handle on the completion signal raised by the terminal segment
    pub fn completion_signal(&self) -> CompletionSignal {
        self.signal.clone()
    }

    fn shutdown_hardware(&mut self) {
        self.trigger.stop();
        self.engine.disable_all();
        self.running = false;
        self.reset_counters();
    }

    fn reset_counters(&mut self) {
        self.segments_remaining = self.total_segments;
        self.segments_issued = 1;
        self.active_half = None;
    }
}

/// Build the callback a completion event source invokes for `shared`
///
/// The callback holds a weak reference: the event source usually lives inside
/// the controller's own hardware handles. Events after the controller is
/// dropped are ignored.
pub fn segment_complete_handler<T, G>(shared: &SharedAcquisition<T, G>) -> SegmentCompleteHandler
where
    T: TransferEngine + 'static,
    G: SampleTrigger + 'static,
{
    let weak = Arc::downgrade(shared);
    Arc::new(move || {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let outcome = shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_segment_complete();
        log::trace!("Segment completion handled: {:?}", outcome);
    })
}
