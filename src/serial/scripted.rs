//! In-memory stand-in for the board (test helper exposed unconditionally).
//!
//! Every flush is treated as the end of a frame and releases the next
//! queued reply into the input buffer, the way the firmware answers once
//! it has read a whole image.
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::link::SerialLink;

#[derive(Debug, Default)]
struct ScriptState {
    inbound: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    written: Vec<u8>,
    write_calls: Vec<usize>,
    flushes: usize,
    clears: usize,
    read_timeouts: Vec<Duration>,
    write_limit: Option<usize>,
    read_errors: VecDeque<io::ErrorKind>,
}

/// Cloneable handle; clones share the same script so a test can keep one
/// for inspection after handing another to the bridge.
#[derive(Debug, Clone)]
pub struct ScriptedLink {
    state: Arc<Mutex<ScriptState>>,
    max_read: usize,
    idle_delay: Duration,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState::default())),
            max_read: 64,
            idle_delay: Duration::from_millis(1),
        }
    }

    /// Bytes already waiting before the exchange starts (left over from an
    /// earlier, abandoned exchange).
    pub fn with_stale_input(self, bytes: &[u8]) -> Self {
        self.lock().inbound.extend(bytes.iter().copied());
        self
    }

    /// Queue the lines the board prints after the next frame.
    pub fn queue_reply(&self, lines: &[&str]) -> &Self {
        let mut reply = String::new();
        for line in lines {
            reply.push_str(line);
            reply.push('\n');
        }
        self.queue_raw_reply(reply.as_bytes())
    }

    pub fn queue_raw_reply(&self, bytes: &[u8]) -> &Self {
        self.lock().replies.push_back(bytes.to_vec());
        self
    }

    /// Accept at most `limit` bytes in total; later writes come up short.
    pub fn limit_writes(&self, limit: usize) -> &Self {
        self.lock().write_limit = Some(limit);
        self
    }

    /// Make the next read fail with `kind` instead of returning data.
    pub fn fail_next_read(&self, kind: io::ErrorKind) -> &Self {
        self.lock().read_errors.push_back(kind);
        self
    }

    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    pub fn write_calls(&self) -> Vec<usize> {
        self.lock().write_calls.clone()
    }

    pub fn flushes(&self) -> usize {
        self.lock().flushes
    }

    pub fn clears(&self) -> usize {
        self.lock().clears
    }

    pub fn read_timeouts(&self) -> Vec<Duration> {
        self.lock().read_timeouts.clone()
    }

    /// Bytes still unread in the input buffer.
    pub fn unread(&self) -> usize {
        self.lock().inbound.len()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ScriptedLink {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for ScriptedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if let Some(kind) = state.read_errors.pop_front() {
            return Err(io::Error::new(kind, "scripted read failure"));
        }
        if state.inbound.is_empty() {
            drop(state);
            std::thread::sleep(self.idle_delay);
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(self.max_read).min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for ScriptedLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        let room = match state.write_limit {
            Some(limit) => limit.saturating_sub(state.written.len()),
            None => buf.len(),
        };
        let accepted = buf.len().min(room);
        state.written.extend_from_slice(&buf[..accepted]);
        state.write_calls.push(accepted);
        Ok(accepted)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.lock();
        state.flushes += 1;
        if let Some(reply) = state.replies.pop_front() {
            state.inbound.extend(reply);
        }
        Ok(())
    }
}

impl SerialLink for ScriptedLink {
    fn clear_buffers(&mut self) -> io::Result<()> {
        let mut state = self.lock();
        state.clears += 1;
        state.inbound.clear();
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.lock().read_timeouts.push(timeout);
        Ok(())
    }
}
