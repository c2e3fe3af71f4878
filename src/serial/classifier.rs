//! Classification of lines coming back from the board.
//!
//! The firmware interleaves ESP-IDF log output with the single result line
//! `M:<masked> S:<unmasked>`. Its own "Predição: M:.. S:.." log line carries
//! the same tokens, so the log filter must run before the result match.

use super::types::ClassificationResult;

/// ESP-IDF info-level log prefix, e.g. `I (1234) MASK_DETECTOR: ...`.
pub const DEFAULT_LOG_PREFIX: &str = "I (";
/// Logged by the firmware when it has read a frame header.
pub const DEFAULT_HEADER_ECHO_MARKER: &str = "Cabeçalho";

const MASKED_KEY: &str = "M:";
const UNMASKED_KEY: &str = "S:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed result line {line:?}: {key}{digits} is out of range")]
pub struct MalformedResult {
    pub line: String,
    pub key: &'static str,
    pub digits: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Nothing but whitespace.
    Empty,
    /// Device diagnostic output; never ends the wait.
    Log,
    /// Both result tokens present. Terminal either way.
    Candidate(Result<ClassificationResult, MalformedResult>),
    /// Anything else; observed but not terminal.
    Unrecognized,
}

#[derive(Debug, Clone)]
pub struct ResponseClassifier {
    log_prefixes: Vec<String>,
    header_echo_marker: String,
}

impl ResponseClassifier {
    /// Empty prefixes and an empty marker are ignored, otherwise they would
    /// swallow every line.
    pub fn new(log_prefixes: Vec<String>, header_echo_marker: impl Into<String>) -> Self {
        Self {
            log_prefixes: log_prefixes.into_iter().filter(|p| !p.is_empty()).collect(),
            header_echo_marker: header_echo_marker.into(),
        }
    }

    pub fn classify(&self, line: &str) -> LineKind {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return LineKind::Empty;
        }
        if self.is_log(trimmed) {
            return LineKind::Log;
        }

        match (find_token(trimmed, MASKED_KEY), find_token(trimmed, UNMASKED_KEY)) {
            (Some(masked), Some(unmasked)) => LineKind::Candidate(parse_scores(trimmed, masked, unmasked)),
            _ => LineKind::Unrecognized,
        }
    }

    fn is_log(&self, line: &str) -> bool {
        let plain = strip_ansi_prefix(line);
        if self.log_prefixes.iter().any(|p| plain.starts_with(p.as_str())) {
            return true;
        }
        !self.header_echo_marker.is_empty() && line.contains(&self.header_echo_marker)
    }
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::new(vec![DEFAULT_LOG_PREFIX.to_string()], DEFAULT_HEADER_ECHO_MARKER)
    }
}

fn parse_scores(line: &str, masked: &str, unmasked: &str) -> Result<ClassificationResult, MalformedResult> {
    let parse = |key: &'static str, digits: &str| {
        digits.parse::<u32>().map_err(|_| MalformedResult {
            line: line.to_string(),
            key,
            digits: digits.to_string(),
        })
    };
    Ok(ClassificationResult::new(parse(MASKED_KEY, masked)?, parse(UNMASKED_KEY, unmasked)?))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// First `<key><digits>` token that stands on word boundaries on both sides.
/// Returns the digit run.
fn find_token<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    for (idx, _) in line.match_indices(key) {
        if line[..idx].chars().next_back().is_some_and(is_word_char) {
            continue;
        }
        let rest = &line[idx + key.len()..];
        let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits_len == 0 {
            continue;
        }
        if rest[digits_len..].chars().next().is_some_and(is_word_char) {
            continue;
        }
        return Some(&rest[..digits_len]);
    }
    None
}

/// Drop leading `ESC [ ... <final>` colour sequences that ESP-IDF puts in
/// front of its log lines.
fn strip_ansi_prefix(mut line: &str) -> &str {
    while let Some(rest) = line.strip_prefix("\u{1b}[") {
        match rest.find(|c: char| ('@'..='~').contains(&c)) {
            Some(end) => line = &rest[end + 1..],
            None => return line,
        }
    }
    line
}
