use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};

/// Duplex byte stream the bridge talks over.
///
/// Reads must honour the configured read timeout and report an elapsed
/// timeout as `io::ErrorKind::TimedOut`, which is what `serialport` does.
pub trait SerialLink: Read + Write + Send {
    /// Discard anything sitting in the input and output buffers.
    fn clear_buffers(&mut self) -> io::Result<()>;

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn clear_buffers(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::All).map_err(io::Error::from)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }
}
