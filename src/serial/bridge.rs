use std::thread;
use std::time::{Duration, Instant};

use super::classifier::{LineKind, ResponseClassifier, DEFAULT_HEADER_ECHO_MARKER, DEFAULT_LOG_PREFIX};
use super::frame::{self, ImageBuffer};
use super::lines::LineAssembler;
use super::link::SerialLink;
use super::transmit::{self, TransmissionProgress, DEFAULT_CHUNK_SIZE};
use super::types::{ClassificationResult, ExchangeOutcome};
use super::{ExchangeError, SerialInterface};

/// Per-exchange protocol settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub chunk_size: usize,
    /// Pause between clearing stale buffers and writing the frame, so a
    /// board still printing from the last exchange can finish.
    pub settle_delay: Duration,
    /// Overall wait for the result line after the frame went out.
    pub response_timeout: Duration,
    /// Cap on a single blocking read inside the response loop.
    pub read_timeout: Duration,
    pub log_prefixes: Vec<String>,
    pub header_echo_marker: String,
}

impl BridgeConfig {
    /// Budget used by the one-shot command line tool; the board may still be
    /// booting when the first frame arrives.
    pub const STANDALONE_RESPONSE_TIMEOUT: Duration = Duration::from_secs(20);

    pub fn standalone() -> Self {
        Self {
            response_timeout: Self::STANDALONE_RESPONSE_TIMEOUT,
            ..Self::default()
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn classifier(&self) -> ResponseClassifier {
        ResponseClassifier::new(self.log_prefixes.clone(), self.header_echo_marker.clone())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            settle_delay: Duration::from_millis(50),
            response_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_millis(1000),
            log_prefixes: vec![DEFAULT_LOG_PREFIX.to_string()],
            header_echo_marker: DEFAULT_HEADER_ECHO_MARKER.to_string(),
        }
    }
}

/// Where an exchange currently is. Header and payload go out as one
/// transmission, so there is no separate "header sent" stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExchangeState {
    Idle,
    Transmitting,
    AwaitingResponse,
    Matched,
    TimedOut,
    Failed,
}

fn advance(state: &mut ExchangeState, next: ExchangeState) {
    log::debug!("Exchange {:?} -> {:?}", state, next);
    *state = next;
}

/// Request/response driver for the classifier board.
///
/// Owns its serial interface; one exchange at a time (`&mut self`). Callers
/// sharing a board must serialize access themselves, see
/// [`crate::device::DeviceSession`].
pub struct ProtocolBridge {
    interface: SerialInterface,
    classifier: ResponseClassifier,
    config: BridgeConfig,
}

impl ProtocolBridge {
    pub fn new(interface: SerialInterface, config: BridgeConfig) -> Self {
        let classifier = config.classifier();
        Self { interface, classifier, config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn interface(&self) -> &SerialInterface {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut SerialInterface {
        &mut self.interface
    }

    /// Send one image and wait for the board's verdict.
    pub fn exchange(&mut self, pixels: &[u8], width: u16, height: u16, channels: u8) -> ExchangeOutcome {
        self.exchange_with_progress(pixels, width, height, channels, |_| {})
    }

    /// Exchange for an already validated buffer; skips the shape check.
    pub fn exchange_image(&mut self, image: &ImageBuffer) -> ExchangeOutcome {
        let frame = frame::encode_buffer(image);
        let mut state = ExchangeState::Idle;
        let result = self.send_frame(&mut state, &frame, |_| {});
        self.finish(&mut state, result)
    }

    /// Like [`exchange`](Self::exchange), reporting progress after every chunk.
    pub fn exchange_with_progress<F>(
        &mut self,
        pixels: &[u8],
        width: u16,
        height: u16,
        channels: u8,
        on_progress: F,
    ) -> ExchangeOutcome
    where
        F: FnMut(TransmissionProgress),
    {
        let mut state = ExchangeState::Idle;
        let result = self.run(&mut state, pixels, width, height, channels, on_progress);
        self.finish(&mut state, result)
    }

    fn finish(&self, state: &mut ExchangeState, result: Result<ClassificationResult, ExchangeError>) -> ExchangeOutcome {
        match result {
            Ok(result) => {
                advance(state, ExchangeState::Matched);
                ExchangeOutcome::Success(result)
            }
            Err(ExchangeError::Timeout { last_line }) => {
                advance(state, ExchangeState::TimedOut);
                log::warn!(
                    "No result from board within {:?}; last line: {:?}",
                    self.config.response_timeout,
                    last_line
                );
                ExchangeOutcome::Timeout { last_line }
            }
            Err(err) => {
                advance(state, ExchangeState::Failed);
                log::warn!("Exchange failed: {}", err);
                ExchangeOutcome::ProtocolError(err)
            }
        }
    }

    fn run<F>(
        &mut self,
        state: &mut ExchangeState,
        pixels: &[u8],
        width: u16,
        height: u16,
        channels: u8,
        on_progress: F,
    ) -> Result<ClassificationResult, ExchangeError>
    where
        F: FnMut(TransmissionProgress),
    {
        // Shape problems are caught before touching the port.
        let frame = frame::encode(width, height, channels, pixels)?;
        self.send_frame(state, &frame, on_progress)
    }

    fn send_frame<F>(
        &mut self,
        state: &mut ExchangeState,
        frame: &[u8],
        on_progress: F,
    ) -> Result<ClassificationResult, ExchangeError>
    where
        F: FnMut(TransmissionProgress),
    {
        let link = self
            .interface
            .link_mut()
            .map_err(|e| ExchangeError::StreamUnavailable(e.to_string()))?;

        link.clear_buffers()
            .map_err(|e| ExchangeError::StreamUnavailable(format!("failed to clear buffers: {}", e)))?;
        if !self.config.settle_delay.is_zero() {
            thread::sleep(self.config.settle_delay);
        }

        advance(state, ExchangeState::Transmitting);
        log::debug!("Sending frame ({} bytes)", frame.len());
        transmit::transmit(link, frame, self.config.chunk_size, on_progress)?;

        advance(state, ExchangeState::AwaitingResponse);
        await_result(link, &self.classifier, &self.config)
    }
}

/// Read lines until a result line shows up or the budget runs out.
///
/// Stops at the first candidate; anything after it stays unread and is
/// cleared at the start of the next exchange.
fn await_result(
    link: &mut dyn SerialLink,
    classifier: &ResponseClassifier,
    config: &BridgeConfig,
) -> Result<ClassificationResult, ExchangeError> {
    let deadline = Instant::now() + config.response_timeout;
    let mut lines = LineAssembler::new();
    let mut last_line: Option<String> = None;

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        link.set_read_timeout(config.read_timeout.min(deadline - now))?;

        let Some(line) = lines.read_line(link)? else {
            continue;
        };

        match classifier.classify(&line) {
            LineKind::Candidate(result) => {
                log::info!("Board result: {}", line.trim());
                return result.map_err(ExchangeError::from);
            }
            LineKind::Empty => {}
            LineKind::Log => {
                log::debug!("[board] {}", line.trim());
                last_line = Some(line.trim().to_string());
            }
            LineKind::Unrecognized => {
                log::debug!("Ignoring unrecognized line: {:?}", line.trim());
                last_line = Some(line.trim().to_string());
            }
        }
    }

    Err(ExchangeError::Timeout {
        last_line: lines.pending().or(last_line),
    })
}
