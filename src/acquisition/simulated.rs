//! Software double-buffered ADC
//!
//! Stands in for the sampling timer, the converter and the ping-pong transfer
//! engine on hosts without the hardware. Starting the trigger spawns a worker
//! thread that plays the part of the transfer engine: it fills whichever half
//! is next in ping-pong order from a deterministic [`SignalSource`], disables
//! that half and invokes the attached completion handler, exactly as the
//! hardware would raise its transfer-complete interrupt. A half that is not
//! re-enabled stalls the worker until the trigger is stopped.
//!
//! Each segment is written under the state lock after checking that its
//! acquisition is still the current one, so once the trigger is stopped a
//! worker left over from that acquisition writes nothing and raises no
//! transfer-complete flag.
//!
//! Completion events can be swallowed with
//! [`lose_completions_after`](SimulatedAdc::lose_completions_after) to exercise
//! the acquisition timeout.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use super::{SampleTrigger, SegmentCompleteHandler, SegmentHalf, TransferEngine};
use crate::io::SampleBuffer;

/// Sample value as a function of its logical buffer position
pub type SignalSource = Arc<dyn Fn(usize) -> u16 + Send + Sync>;

/// Poll period of a stalled worker
const STALL_POLL: Duration = Duration::from_micros(200);

#[derive(Debug, Clone, Copy, Default)]
struct HalfControl {
    offset: usize,
    len: usize,
    enabled: bool,
}

#[derive(Default)]
struct DmaState {
    halves: [HalfControl; 2],
    next: usize,
    generation: u64,
    running: bool,
    rate_hz: u32,
    handler: Option<SegmentCompleteHandler>,
    completion_budget: Option<usize>,
    transfer_complete: usize,
    arm_history: Vec<(SegmentHalf, usize)>,
    segments_transferred: u64,
}

type SharedState = Arc<Mutex<DmaState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, DmaState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated converter plus transfer engine writing into one [`SampleBuffer`]
#[derive(Clone)]
pub struct SimulatedAdc {
    state: SharedState,
    buffer: SampleBuffer,
    source: SignalSource,
    paced: bool,
}

impl SimulatedAdc {
    /// Simulated hardware filling a `buffer_len`-sample buffer from `source`
    pub fn new(buffer_len: usize, source: SignalSource) -> Self {
        Self {
            state: Arc::new(Mutex::new(DmaState::default())),
            buffer: SampleBuffer::new(buffer_len),
            source,
            paced: false,
        }
    }

    /// Sleep for each segment's real sampling time instead of running flat out
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Buffer the transfer engine writes into
    pub fn sample_buffer(&self) -> SampleBuffer {
        self.buffer.clone()
    }

    /// Transfer-programming handle
    pub fn transfer_engine(&self) -> SimulatedTransferEngine {
        SimulatedTransferEngine {
            state: Arc::clone(&self.state),
        }
    }

    /// Sampling clock handle
    pub fn trigger(&self) -> SimulatedTrigger {
        SimulatedTrigger { adc: self.clone() }
    }

    /// Register the completion handler (the "interrupt vector")
    pub fn attach_handler(&self, handler: SegmentCompleteHandler) {
        lock(&self.state).handler = Some(handler);
    }

    /// Deliver `count` more completion events, then drop the rest
    pub fn lose_completions_after(&self, count: usize) {
        lock(&self.state).completion_budget = Some(count);
    }

    /// Deliver every completion event again
    pub fn deliver_all_completions(&self) {
        lock(&self.state).completion_budget = None;
    }

    /// `(half, offset)` of every `arm_segment` call so far
    pub fn arm_history(&self) -> Vec<(SegmentHalf, usize)> {
        lock(&self.state).arm_history.clone()
    }

    /// Whether the sampling clock is running
    pub fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    /// Total segments written into the buffer
    pub fn segments_transferred(&self) -> u64 {
        lock(&self.state).segments_transferred
    }

    fn spawn_worker(&self, generation: u64) {
        let adc = self.clone();
        thread::spawn(move || adc.transfer_loop(generation));
    }

    fn transfer_loop(&self, generation: u64) {
        loop {
            let job = {
                let mut state = lock(&self.state);
                if !state.running || state.generation != generation {
                    break;
                }
                let next = state.next;
                let half = state.halves[next];
                if half.enabled {
                    state.halves[next].enabled = false;
                    state.next = 1 - next;
                    Some((half.offset, half.len, state.rate_hz))
                } else {
                    None
                }
            };

            let Some((offset, len, rate_hz)) = job else {
                thread::sleep(STALL_POLL);
                continue;
            };

            let samples: Vec<u16> = (offset..offset + len).map(|i| (self.source)(i)).collect();
            if self.paced && rate_hz > 0 {
                thread::sleep(Duration::from_secs_f64(len as f64 / rate_hz as f64));
            }

            let handler = {
                let mut state = lock(&self.state);
                if !state.running || state.generation != generation {
                    log::trace!(
                        "Discarding segment at offset {} from a stopped acquisition",
                        offset
                    );
                    break;
                }
                self.buffer.write_segment(offset, &samples);
                state.segments_transferred += 1;

                let deliver = match state.completion_budget.as_mut() {
                    Some(0) => false,
                    Some(budget) => {
                        *budget -= 1;
                        true
                    }
                    None => true,
                };
                if deliver {
                    state.transfer_complete += 1;
                    state.handler.clone()
                } else {
                    log::trace!("Dropping completion for segment at offset {}", offset);
                    None
                }
            };

            // handler takes the controller lock and re-enters the engine
            if let Some(handler) = handler {
                handler();
            }
        }
    }
}

/// [`TransferEngine`] half of the simulated hardware
pub struct SimulatedTransferEngine {
    state: SharedState,
}

impl TransferEngine for SimulatedTransferEngine {
    fn arm_segment(&mut self, half: SegmentHalf, destination_offset: usize, segment_len: usize) {
        let mut state = lock(&self.state);
        let control = &mut state.halves[half.index()];
        control.offset = destination_offset;
        control.len = segment_len;
        state.arm_history.push((half, destination_offset));
    }

    fn enable_segment(&mut self, half: SegmentHalf) {
        lock(&self.state).halves[half.index()].enabled = true;
    }

    fn disable_all(&mut self) {
        let mut state = lock(&self.state);
        for control in &mut state.halves {
            control.enabled = false;
        }
        state.next = SegmentHalf::Primary.index();
        state.transfer_complete = 0;
    }

    fn take_transfer_complete(&mut self) -> bool {
        let mut state = lock(&self.state);
        if state.transfer_complete == 0 {
            return false;
        }
        state.transfer_complete -= 1;
        true
    }
}

/// [`SampleTrigger`] half of the simulated hardware
pub struct SimulatedTrigger {
    adc: SimulatedAdc,
}

impl SampleTrigger for SimulatedTrigger {
    fn start_periodic(&mut self, rate_hz: u32) {
        let generation = {
            let mut state = lock(&self.adc.state);
            state.generation += 1;
            state.running = true;
            state.rate_hz = rate_hz;
            state.generation
        };
        self.adc.spawn_worker(generation);
    }

    fn stop(&mut self) {
        lock(&self.adc.state).running = false;
    }
}
