//! Double-buffered sample acquisition
//!
//! The hardware exposes two physical segments (primary and alternate) that the
//! transfer engine fills in ping-pong order. The [`controller`] reprograms them
//! on every completion event so that repeated `S`-sample transfers cover one
//! `L`-sample logical buffer, then shuts the hardware down and raises the
//! [`signal`] the foreground waits on.
//!
//! Hardware is reached only through the [`TransferEngine`] and [`SampleTrigger`]
//! traits; [`simulated`] provides a software implementation of both.

use std::sync::Arc;

pub mod controller;
pub mod signal;
pub mod simulated;

pub use controller::{
    segment_complete_handler, AcquisitionController, SegmentOutcome, SharedAcquisition,
    TransferState,
};
pub use signal::CompletionSignal;
pub use simulated::{SignalSource, SimulatedAdc, SimulatedTransferEngine, SimulatedTrigger};

/// One of the two physical segment targets of the double buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentHalf {
    /// Primary control structure
    Primary,
    /// Alternate control structure
    Alternate,
}

impl SegmentHalf {
    /// The other half
    pub fn other(self) -> Self {
        match self {
            SegmentHalf::Primary => SegmentHalf::Alternate,
            SegmentHalf::Alternate => SegmentHalf::Primary,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            SegmentHalf::Primary => 0,
            SegmentHalf::Alternate => 1,
        }
    }
}

/// Programs the double-buffered transfer engine
pub trait TransferEngine: Send {
    /// Point `half` at `destination_offset` of the sample buffer for `segment_len` samples
    fn arm_segment(&mut self, half: SegmentHalf, destination_offset: usize, segment_len: usize);

    /// Let `half` accept transfers
    fn enable_segment(&mut self, half: SegmentHalf);

    /// Stop all transfers and clear any pending transfer-complete flag
    fn disable_all(&mut self);

    /// Read and clear the transfer-complete flag
    ///
    /// `false` means no segment has finished since the flag was last cleared,
    /// so the completion event that prompted the read is stale.
    fn take_transfer_complete(&mut self) -> bool;
}

/// Periodic sampling clock
pub trait SampleTrigger: Send {
    /// Start triggering conversions at `rate_hz`
    fn start_periodic(&mut self, rate_hz: u32);

    /// Stop triggering
    fn stop(&mut self);
}

/// Callback the completion event source invokes once per finished segment
pub type SegmentCompleteHandler = Arc<dyn Fn() + Send + Sync>;
