//! Integration tests for the correlator running on simulated hardware

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use digital_correlator::acquisition::{
    SegmentHalf, SignalSource, SimulatedAdc, SimulatedTransferEngine, SimulatedTrigger,
};
use digital_correlator::config::{ARRAY_SIZE, SAMPLING_RATE_HZ, SEGMENT_SIZE};
use digital_correlator::features::waveform::half_period_samples;
use digital_correlator::{
    correlate_buffer, Correlator, CorrelatorConfig, CorrelatorError, HostLink,
};

type SimCorrelator = Correlator<SimulatedTransferEngine, SimulatedTrigger>;

/// Square wave of `amplitude` with the given half period, as the ADC would see it
fn square_source(half_period: usize, amplitude: u16) -> SignalSource {
    Arc::new(move |i| if (i / half_period) % 2 == 0 { amplitude } else { 0 })
}

fn test_config() -> CorrelatorConfig {
    CorrelatorConfig {
        buffer_len: 256,
        segment_len: 32,
        data_frequency_hz: 1300.0,
        pulses_per_buffer: 16,
        acquisition_timeout: Duration::from_secs(5),
        terminal_settle: Duration::ZERO,
        host_poll_interval: Duration::from_millis(1),
    }
}

fn build(config: CorrelatorConfig, source: SignalSource) -> (Arc<SimCorrelator>, SimulatedAdc) {
    let adc = SimulatedAdc::new(config.buffer_len, source);
    let correlator = Correlator::new(
        config,
        adc.sample_buffer(),
        adc.transfer_engine(),
        adc.trigger(),
    )
    .expect("valid configuration");
    adc.attach_handler(correlator.segment_complete_handler());
    (Arc::new(correlator), adc)
}

/// Paced hardware at 800 Hz sampling: 40 ms per 32-sample segment
fn build_paced(
    acquisition_timeout: Duration,
    source: SignalSource,
) -> (Arc<SimCorrelator>, SimulatedAdc) {
    let config = CorrelatorConfig {
        data_frequency_hz: 50.0,
        acquisition_timeout,
        ..test_config()
    };
    let adc = SimulatedAdc::new(config.buffer_len, source).paced(true);
    let correlator = Correlator::new(
        config,
        adc.sample_buffer(),
        adc.transfer_engine(),
        adc.trigger(),
    )
    .expect("valid configuration");
    adc.attach_handler(correlator.segment_complete_handler());
    (Arc::new(correlator), adc)
}

fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_topology_fills_whole_buffer() {
        let config = CorrelatorConfig {
            terminal_settle: Duration::ZERO,
            ..CorrelatorConfig::default()
        };
        let (correlator, adc) = build(config, Arc::new(|i| (i % 4096) as u16 + 1));

        let report = correlator.run_batch(1300.0, 1).expect("batch should succeed");
        assert_eq!(report.metadata.buffer_len, ARRAY_SIZE);
        assert_eq!(report.metadata.sampling_rate, SAMPLING_RATE_HZ);
        assert_eq!(report.half_period_samples, 128);

        // every sample written exactly where the source says
        let samples = adc.sample_buffer().snapshot();
        assert!(samples.iter().enumerate().all(|(i, &s)| s == i as u16 + 1));

        assert_eq!(
            adc.arm_history(),
            vec![
                (SegmentHalf::Primary, 0),
                (SegmentHalf::Alternate, SEGMENT_SIZE),
                (SegmentHalf::Primary, 2 * SEGMENT_SIZE),
                (SegmentHalf::Alternate, 3 * SEGMENT_SIZE),
            ]
        );
        assert_eq!(adc.segments_transferred(), 4);
        assert_eq!(correlator.transfer_state().segments_remaining, 4);
    }

    #[test]
    fn test_matched_signal_beats_mismatched_reference() {
        let config = test_config();
        let half_period = half_period_samples(1300.0, config.base_sample_rate()).unwrap();
        let (correlator, _adc) = build(config, square_source(half_period, 1000));

        let matched = correlator.run_batch(1300.0, 2).unwrap();
        let mismatched = correlator.run_batch(97.0, 2).unwrap();

        // 256 samples, half of them high at 1000
        assert_eq!(matched.average_peak, 128 * 1000);
        assert!(matched.average_peak > mismatched.average_peak);
    }

    #[test]
    fn test_batch_matches_direct_correlation() {
        let config = test_config();
        let source: SignalSource = Arc::new(|i| ((i * 37) % 4096) as u16);
        let expected: Vec<u16> = (0..config.buffer_len).map(|i| source(i)).collect();
        let direct = correlate_buffer(&expected, 650.0, &config).unwrap();
        let (correlator, _adc) = build(config, source);

        let report = correlator.run_batch(650.0, 3).unwrap();
        assert_eq!(report.peaks, vec![direct; 3]);
        assert_eq!(report.average_peak, direct);
    }

    #[test]
    fn test_repeated_batches_are_identical() {
        let (correlator, _adc) = build(test_config(), Arc::new(|i| ((i * i) % 977) as u16));

        let first = correlator.run_batch(800.0, 4).unwrap();
        let second = correlator.run_batch(800.0, 4).unwrap();
        assert_eq!(first.average_peak, second.average_peak);
        assert_eq!(first.peaks, second.peaks);
    }

    #[test]
    fn test_two_segment_buffer_needs_no_reprogramming() {
        let config = CorrelatorConfig {
            buffer_len: 64,
            segment_len: 32,
            ..test_config()
        };
        let (correlator, adc) = build(config, Arc::new(|_| 2));

        correlator.run_batch(1300.0, 2).unwrap();
        assert_eq!(
            adc.arm_history(),
            vec![
                (SegmentHalf::Primary, 0),
                (SegmentHalf::Alternate, 32),
                (SegmentHalf::Primary, 0),
                (SegmentHalf::Alternate, 32),
            ]
        );
    }

    #[test]
    fn test_invalid_frequency_reported() {
        let (correlator, adc) = build(test_config(), Arc::new(|_| 1));
        let result = correlator.run_batch(1e9, 1);
        assert_eq!(result, Err(CorrelatorError::InvalidFrequency(1e9)));
        assert_eq!(adc.segments_transferred(), 0);
    }

    #[test]
    fn test_lost_completion_times_out_then_recovers() {
        let config = CorrelatorConfig {
            acquisition_timeout: Duration::from_millis(100),
            ..test_config()
        };
        let (correlator, adc) = build(config, Arc::new(|_| 1));

        adc.lose_completions_after(3);
        let started = Instant::now();
        let result = correlator.run_batch(1300.0, 1);
        assert!(matches!(result, Err(CorrelatorError::AcquisitionTimeout(_))));
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(!correlator.is_busy());

        let state = correlator.transfer_state();
        assert_eq!(state.segments_remaining, 8);
        assert_eq!(state.segments_issued, 1);

        adc.deliver_all_completions();
        let report = correlator.run_batch(1300.0, 1).unwrap();
        assert_eq!(report.runs, 1);
    }

    #[test]
    fn test_overlapping_batches_rejected() {
        let (correlator, _adc) = build_paced(Duration::from_secs(5), Arc::new(|_| 1));

        let background = Arc::clone(&correlator);
        let handle = thread::spawn(move || background.run_batch(20.0, 1));

        wait_for(|| correlator.is_busy());
        assert!(correlator.is_busy());
        assert_eq!(
            correlator.run_batch(20.0, 1),
            Err(CorrelatorError::ConcurrentRunRejected)
        );

        assert!(handle.join().unwrap().is_ok());
        assert!(!correlator.is_busy());
    }

    #[test]
    fn test_last_report_available_during_batch() {
        let (correlator, _adc) = build_paced(Duration::from_secs(5), Arc::new(|_| 1));
        let first = correlator.run_batch(50.0, 1).unwrap();

        let background = Arc::clone(&correlator);
        let handle = thread::spawn(move || background.run_batch(50.0, 2));
        wait_for(|| correlator.is_busy());

        assert_eq!(correlator.last_report(), Some(first));
        // two paced runs take 640 ms, so the batch is still going
        assert!(correlator.is_busy());

        let second = handle.join().unwrap().unwrap();
        assert_eq!(correlator.last_report(), Some(second));
    }

    #[test]
    fn test_timed_out_run_does_not_leak_into_next_run() {
        // every sample carries the id of the run that acquired it
        let run_id = Arc::new(AtomicU16::new(1));
        let source_id = Arc::clone(&run_id);
        let source: SignalSource = Arc::new(move |i| {
            let id = source_id.load(Ordering::SeqCst);
            if id == 1 && i == 64 {
                // run 1 stalls in its third segment until run 2 is under way
                while source_id.load(Ordering::SeqCst) == 1 {
                    thread::sleep(Duration::from_millis(1));
                }
                thread::sleep(Duration::from_millis(150));
            }
            id
        });
        let (correlator, adc) = build_paced(Duration::from_millis(500), source);

        let result = correlator.run_batch(50.0, 1);
        assert!(matches!(result, Err(CorrelatorError::AcquisitionTimeout(_))));

        run_id.store(2, Ordering::SeqCst);
        let report = correlator.run_batch(50.0, 1).unwrap();

        // 128 high reference samples, all from run 2
        assert_eq!(report.peaks, vec![2 * 128]);
        assert!(adc.sample_buffer().snapshot().iter().all(|&s| s == 2));
        assert_eq!(correlator.transfer_state().segments_remaining, 8);
    }

    #[test]
    fn test_foreground_loop_serves_host_requests() {
        let config = test_config();
        let half_period = half_period_samples(1300.0, config.base_sample_rate()).unwrap();
        let (correlator, _adc) = build(config, square_source(half_period, 10));

        let link = Arc::new(HostLink::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let loop_correlator = Arc::clone(&correlator);
        let loop_link = Arc::clone(&link);
        let loop_shutdown = Arc::clone(&shutdown);
        let foreground = thread::spawn(move || {
            loop_correlator.run_foreground(&loop_link, &loop_shutdown);
        });

        link.request_run(1300.0, 3).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while link.status().completed_batches == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        let status = link.status();
        assert_eq!(status.completed_batches, 1);
        assert_eq!(status.average_correlation, 128 * 10);
        assert!(status.last_error.is_none());

        link.request_run(1e9, 1).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while link.status().completed_batches < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        let status = link.status();
        assert!(status.last_error.is_some());
        assert_eq!(status.average_correlation, 128 * 10);

        shutdown.store(true, Ordering::Release);
        foreground.join().unwrap();
    }
}
