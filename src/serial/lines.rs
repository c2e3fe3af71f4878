//! Line assembly on top of a read-with-timeout byte stream.
use std::io::{self, Read};

const READ_CHUNK: usize = 512;
// A board stuck printing without newlines must not grow the buffer forever.
const MAX_PARTIAL: usize = 8192;
const KEEP_ON_TRIM: usize = 4096;

/// Accumulates bytes across reads and hands out complete lines.
///
/// Bytes are decoded only once a full line is available, so multi-byte
/// UTF-8 sequences split across reads survive intact. Invalid sequences are
/// replaced with U+FFFD.
#[derive(Debug, Default)]
pub struct LineAssembler {
    partial: Vec<u8>,
    trims: u64,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Perform at most one read and return the next complete line, if any.
    ///
    /// `Ok(None)` means nothing complete yet: the read timed out, would
    /// block, was interrupted, returned zero bytes, or ended mid-line.
    pub fn read_line<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<Option<String>> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }

        let mut buf = [0u8; READ_CHUNK];
        match reader.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(n) => {
                self.partial.extend_from_slice(&buf[..n]);
                if self.partial.len() > MAX_PARTIAL {
                    let excess = self.partial.len() - KEEP_ON_TRIM;
                    self.partial.drain(..excess);
                    self.trims += 1;
                    log::debug!("Dropped {} bytes of unterminated device output", excess);
                }
                Ok(self.take_line())
            }
            Err(e) if is_idle(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Bytes received after the last newline, decoded; `None` when blank.
    pub fn pending(&self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.partial);
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    /// How many times unterminated output had to be cut back.
    pub fn trims(&self) -> u64 {
        self.trims
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.partial.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.partial.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&raw[..pos]);
        Some(line.trim_end_matches('\r').to_string())
    }
}

fn is_idle(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
