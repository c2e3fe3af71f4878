use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// Chunk size used by the board's USB Serial/JTAG driver buffers.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Bytes handed to the stream so far during one transmission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmissionProgress {
    pub sent: usize,
    pub total: usize,
}

impl TransmissionProgress {
    pub fn is_complete(&self) -> bool {
        self.sent == self.total
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    #[error("Chunk size must be positive")]
    InvalidChunkSize,

    #[error("Short write after {sent}/{total} bytes: stream accepted {accepted} of {requested}")]
    ShortWrite {
        sent: usize,
        total: usize,
        accepted: usize,
        requested: usize,
    },

    #[error("Write failed after {sent}/{total} bytes: {source}")]
    Write {
        sent: usize,
        total: usize,
        #[source]
        source: io::Error,
    },

    #[error("Flush failed after {sent}/{total} bytes: {source}")]
    Flush {
        sent: usize,
        total: usize,
        #[source]
        source: io::Error,
    },
}

impl TransmitError {
    /// Bytes that reached the stream before the failure.
    pub fn bytes_sent(&self) -> usize {
        match self {
            TransmitError::InvalidChunkSize => 0,
            TransmitError::ShortWrite { sent, .. }
            | TransmitError::Write { sent, .. }
            | TransmitError::Flush { sent, .. } => *sent,
        }
    }
}

/// Write `payload` in chunks of at most `chunk_size` bytes, then flush.
///
/// Each chunk goes out in a single `write` call. A write that accepts fewer
/// bytes than offered is reported as [`TransmitError::ShortWrite`] and the
/// transmission stops there; the caller must treat the whole frame as lost.
pub fn transmit<W, F>(
    stream: &mut W,
    payload: &[u8],
    chunk_size: usize,
    mut on_progress: F,
) -> Result<TransmissionProgress, TransmitError>
where
    W: Write + ?Sized,
    F: FnMut(TransmissionProgress),
{
    if chunk_size == 0 {
        return Err(TransmitError::InvalidChunkSize);
    }

    let mut progress = TransmissionProgress { sent: 0, total: payload.len() };

    for chunk in payload.chunks(chunk_size) {
        let accepted = stream.write(chunk).map_err(|source| TransmitError::Write {
            sent: progress.sent,
            total: progress.total,
            source,
        })?;

        progress.sent += accepted;
        if accepted < chunk.len() {
            return Err(TransmitError::ShortWrite {
                sent: progress.sent,
                total: progress.total,
                accepted,
                requested: chunk.len(),
            });
        }

        log::debug!("Sent {}/{} bytes", progress.sent, progress.total);
        on_progress(progress);
    }

    stream.flush().map_err(|source| TransmitError::Flush {
        sent: progress.sent,
        total: progress.total,
        source,
    })?;

    Ok(progress)
}
