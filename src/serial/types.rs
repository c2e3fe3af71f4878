//! Results handed back to callers of the bridge.
use serde::{Deserialize, Serialize};

use super::ExchangeError;

/// Raw scores reported by the board on its result line (`M:<masked> S:<unmasked>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub masked: u32,
    pub unmasked: u32,
}

impl ClassificationResult {
    pub fn new(masked: u32, unmasked: u32) -> Self {
        Self { masked, unmasked }
    }

    /// True when the "mask" score beats the "no mask" score. Ties lose.
    pub fn dominant(&self) -> bool {
        self.masked > self.unmasked
    }

    /// Share of the winning score in the total, in `[0, 1]`; 0 when both are 0.
    pub fn confidence(&self) -> f64 {
        let total = self.masked as u64 + self.unmasked as u64;
        if total == 0 {
            return 0.0;
        }
        self.masked.max(self.unmasked) as f64 / total as f64
    }

    pub fn summary(&self) -> ClassificationSummary {
        ClassificationSummary {
            mask: self.dominant(),
            confidence: round3(self.confidence()),
        }
    }
}

/// Display form returned to front ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub mask: bool,
    pub confidence: f64,
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Result of one exchange. Exactly one variant is produced per call.
///
/// `ProtocolError` never carries [`ExchangeError::Timeout`]; timeouts always
/// come back as the `Timeout` variant.
#[derive(Debug)]
pub enum ExchangeOutcome {
    Success(ClassificationResult),
    Timeout { last_line: Option<String> },
    ProtocolError(ExchangeError),
}

impl ExchangeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExchangeOutcome::Success(_))
    }

    pub fn summary(&self) -> Option<ClassificationSummary> {
        match self {
            ExchangeOutcome::Success(result) => Some(result.summary()),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<ClassificationResult, ExchangeError> {
        match self {
            ExchangeOutcome::Success(result) => Ok(result),
            ExchangeOutcome::Timeout { last_line } => Err(ExchangeError::Timeout { last_line }),
            ExchangeOutcome::ProtocolError(err) => Err(err),
        }
    }
}

impl From<ExchangeError> for ExchangeOutcome {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Timeout { last_line } => ExchangeOutcome::Timeout { last_line },
            other => ExchangeOutcome::ProtocolError(other),
        }
    }
}

impl PartialEq for ExchangeOutcome {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ExchangeOutcome::Success(a), ExchangeOutcome::Success(b)) => a == b,
            (ExchangeOutcome::Timeout { last_line: a }, ExchangeOutcome::Timeout { last_line: b }) => a == b,
            // io::Error has no PartialEq; compare the rendered errors instead
            (ExchangeOutcome::ProtocolError(a), ExchangeOutcome::ProtocolError(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
