//! Example: run batches against simulated hardware
//!
//! Feeds a noisy 1300 Hz square wave through the simulated double-buffered ADC
//! and correlates it against a few reference frequencies.
//!
//! Run with `RUST_LOG=debug cargo run --example run_batch` for per-run detail.

use std::sync::Arc;

use digital_correlator::acquisition::SimulatedAdc;
use digital_correlator::{Correlator, CorrelatorConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    let config = CorrelatorConfig::default();
    let half_period = 128;
    let adc = SimulatedAdc::new(
        config.buffer_len,
        Arc::new(move |i| {
            let level = if (i / half_period) % 2 == 0 { 3000 } else { 200 };
            level + ((i * 7919) % 250) as u16
        }),
    );

    let correlator = Correlator::new(
        config,
        adc.sample_buffer(),
        adc.transfer_engine(),
        adc.trigger(),
    )?;
    adc.attach_handler(correlator.segment_complete_handler());

    println!("Correlation Results:");
    for frequency in [650.0, 1300.0, 2600.0] {
        match correlator.run_batch(frequency, 4) {
            Ok(report) => println!(
                "  {:>7.1} Hz: average peak {} ({} runs, {:.2} ms)",
                frequency, report.average_peak, report.runs, report.metadata.processing_time_ms
            ),
            Err(e) => eprintln!("  {:>7.1} Hz: {}", frequency, e),
        }
    }

    Ok(())
}
