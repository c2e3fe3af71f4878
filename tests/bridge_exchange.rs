mod common;

use std::io;
use std::time::{Duration, Instant};

use common::{bridge_over, model_pixels};
use mask_bridge_lib::serial::transmit::TransmitError;
use mask_bridge_lib::serial::{ClassificationResult, ProtocolBridge, ScriptedLink, SerialInterface};
use mask_bridge_lib::{BridgeConfig, ExchangeError, ExchangeOutcome};

// Typical board output around one prediction (ESP-IDF logs plus the result line)
const BOARD_REPLY: [&str; 4] = [
    "I (10234) MASK_DETECTOR: Cabeçalho recebido! Lendo imagem...",
    "",
    "M:180 S:60",
    "I (10412) MASK_DETECTOR: Predição: M:180 S:60",
];

#[test]
fn test_exchange_success_among_logs() {
    let link = ScriptedLink::new();
    link.queue_reply(&BOARD_REPLY);
    let mut bridge = bridge_over(&link, 500);

    let outcome = bridge.exchange(&model_pixels(), 96, 96, 3);
    assert_eq!(outcome, ExchangeOutcome::Success(ClassificationResult::new(180, 60)));

    let summary = outcome.summary().expect("summary");
    assert!(summary.mask);
    assert_eq!(summary.confidence, 0.75);
}

#[test]
fn test_result_logged_before_result_line_is_not_taken() {
    // The echoed prediction log carries different numbers than the real line
    let link = ScriptedLink::new();
    link.queue_reply(&["I (1) MASK_DETECTOR: Predição: M:1 S:99", "noise", "S:30 M:10"]);
    let mut bridge = bridge_over(&link, 500);

    let result = bridge.exchange(&model_pixels(), 96, 96, 3).into_result().unwrap();
    assert_eq!(result, ClassificationResult::new(10, 30));
    assert!(!result.dominant());
}

#[test]
fn test_stops_reading_at_first_candidate() {
    // Longer than one read so some of it is still queued after the match
    let trailing = "I (2) MASK_DETECTOR: trailing log output ".repeat(4);
    let link = ScriptedLink::new();
    link.queue_reply(&["M:5 S:1", "M:1 S:5", trailing.as_str()]);
    let mut bridge = bridge_over(&link, 500);

    let outcome = bridge.exchange(&model_pixels(), 96, 96, 3);
    assert_eq!(outcome, ExchangeOutcome::Success(ClassificationResult::new(5, 1)));
    assert!(link.unread() > 0, "later lines must be left in the buffer");
}

#[test]
fn test_stale_input_is_discarded_before_sending() {
    let link = ScriptedLink::new().with_stale_input(b"M:999 S:1\n");
    link.queue_reply(&["M:2 S:8"]);
    let mut bridge = bridge_over(&link, 500);

    let outcome = bridge.exchange(&model_pixels(), 96, 96, 3);
    assert_eq!(outcome, ExchangeOutcome::Success(ClassificationResult::new(2, 8)));
    assert_eq!(link.clears(), 1);
}

#[test]
fn test_timeout_carries_last_non_empty_line() {
    let link = ScriptedLink::new();
    link.queue_reply(&["I (1) boot", "unexpected chatter", "", "I (2) still waiting"]);
    let mut bridge = bridge_over(&link, 100);

    let started = Instant::now();
    let outcome = bridge.exchange(&model_pixels(), 96, 96, 3);
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(outcome, ExchangeOutcome::Timeout { last_line: Some("I (2) still waiting".to_string()) });
}

#[test]
fn test_timeout_with_silent_board() {
    let link = ScriptedLink::new();
    let mut bridge = bridge_over(&link, 50);

    let outcome = bridge.exchange(&model_pixels(), 96, 96, 3);
    assert_eq!(outcome, ExchangeOutcome::Timeout { last_line: None });

    let err = outcome.into_result().unwrap_err();
    assert!(matches!(err, ExchangeError::Timeout { last_line: None }));
}

#[test]
fn test_timeout_reports_unterminated_line() {
    let link = ScriptedLink::new();
    link.queue_raw_reply(b"I (1) boot\nM:18");
    let mut bridge = bridge_over(&link, 60);

    let outcome = bridge.exchange(&model_pixels(), 96, 96, 3);
    assert_eq!(outcome, ExchangeOutcome::Timeout { last_line: Some("M:18".to_string()) });
}

#[test]
fn test_overflowing_score_is_malformed_result() {
    let link = ScriptedLink::new();
    link.queue_reply(&["I (1) boot", "M:4294967296 S:60"]);
    let mut bridge = bridge_over(&link, 500);

    match bridge.exchange(&model_pixels(), 96, 96, 3) {
        ExchangeOutcome::ProtocolError(ExchangeError::MalformedResult(err)) => {
            assert_eq!(err.digits, "4294967296");
        }
        other => panic!("expected malformed result, got {:?}", other),
    }
}

#[test]
fn test_wrong_buffer_size_rejected_before_io() {
    let link = ScriptedLink::new();
    let mut bridge = bridge_over(&link, 500);

    let outcome = bridge.exchange(&[0u8; 100], 96, 96, 3);
    assert!(matches!(outcome, ExchangeOutcome::ProtocolError(ExchangeError::InvalidBufferShape(_))));
    assert!(link.written().is_empty());
    assert_eq!(link.clears(), 0);
}

#[test]
fn test_disconnected_interface_is_stream_unavailable() {
    let mut bridge = ProtocolBridge::new(SerialInterface::new(), BridgeConfig::default());
    let outcome = bridge.exchange(&model_pixels(), 96, 96, 3);
    assert!(matches!(outcome, ExchangeOutcome::ProtocolError(ExchangeError::StreamUnavailable(_))));
}

#[test]
fn test_short_write_fails_exchange_without_reading() {
    let link = ScriptedLink::new();
    link.queue_reply(&["M:1 S:2"]);
    link.limit_writes(3000);
    let mut bridge = bridge_over(&link, 500);

    match bridge.exchange(&model_pixels(), 96, 96, 3) {
        ExchangeOutcome::ProtocolError(ExchangeError::Transmission(err)) => {
            assert_eq!(err.bytes_sent(), 3000);
            assert!(matches!(err, TransmitError::ShortWrite { .. }));
        }
        other => panic!("expected transmission error, got {:?}", other),
    }
    assert_eq!(link.flushes(), 0, "a failed frame is never flushed");
    assert!(link.read_timeouts().is_empty(), "no response wait after a failed send");
}

#[test]
fn test_zero_chunk_size_is_transmission_error() {
    let link = ScriptedLink::new();
    let config = BridgeConfig { chunk_size: 0, settle_delay: Duration::ZERO, ..BridgeConfig::default() };
    let mut bridge = ProtocolBridge::new(SerialInterface::from_link(Box::new(link.clone())), config);

    let outcome = bridge.exchange(&model_pixels(), 96, 96, 3);
    assert!(matches!(
        outcome,
        ExchangeOutcome::ProtocolError(ExchangeError::Transmission(TransmitError::InvalidChunkSize))
    ));
}

#[test]
fn test_hard_read_error_ends_exchange() {
    let link = ScriptedLink::new();
    link.fail_next_read(io::ErrorKind::BrokenPipe);
    let mut bridge = bridge_over(&link, 500);

    let outcome = bridge.exchange(&model_pixels(), 96, 96, 3);
    assert!(matches!(outcome, ExchangeOutcome::ProtocolError(ExchangeError::Io(_))));
}

#[test]
fn test_idle_read_errors_keep_waiting() {
    let link = ScriptedLink::new();
    link.fail_next_read(io::ErrorKind::TimedOut);
    link.fail_next_read(io::ErrorKind::WouldBlock);
    link.queue_reply(&["M:3 S:1"]);
    let mut bridge = bridge_over(&link, 500);

    let outcome = bridge.exchange(&model_pixels(), 96, 96, 3);
    assert_eq!(outcome, ExchangeOutcome::Success(ClassificationResult::new(3, 1)));
}

#[test]
fn test_progress_reported_per_chunk() {
    let link = ScriptedLink::new();
    link.queue_reply(&["M:1 S:1"]);
    let mut bridge = bridge_over(&link, 500);

    let pixels = model_pixels();
    let mut reports = Vec::new();
    bridge.exchange_with_progress(&pixels, 96, 96, 3, |p| reports.push(p));

    let total = 5 + pixels.len();
    assert_eq!(reports.len(), total.div_ceil(1024));
    assert!(reports.windows(2).all(|w| w[0].sent < w[1].sent));
    assert_eq!(reports.last().map(|p| (p.sent, p.total)), Some((total, total)));
}

#[test]
fn test_repeated_exchanges_are_identical() {
    let run = || {
        let link = ScriptedLink::new();
        link.queue_reply(&BOARD_REPLY);
        let mut bridge = bridge_over(&link, 500);
        (bridge.exchange(&model_pixels(), 96, 96, 3), link.written())
    };

    let (first, first_bytes) = run();
    let (second, second_bytes) = run();
    assert_eq!(first, second);
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn test_same_bridge_serves_consecutive_exchanges() {
    let link = ScriptedLink::new();
    link.queue_reply(&["M:180 S:60", "I (3) late log from first exchange"]);
    link.queue_reply(&["M:20 S:80"]);
    let mut bridge = bridge_over(&link, 500);

    assert_eq!(
        bridge.exchange(&model_pixels(), 96, 96, 3),
        ExchangeOutcome::Success(ClassificationResult::new(180, 60))
    );
    assert_eq!(
        bridge.exchange(&model_pixels(), 96, 96, 3),
        ExchangeOutcome::Success(ClassificationResult::new(20, 80))
    );
    assert_eq!(link.clears(), 2);
}
