//! Serial transport
//!
//! Owns one open serial device and provides the raw write/flush/read-line
//! operations the session builds on. [`Link`] is the seam the tests mock.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::{debug, trace};

use crate::error::ProtocolError;

/// One open, exclusively owned serial channel to a board.
///
/// All operations fail with [`ProtocolError::NotConnected`] after
/// [`Link::close`]; `close` itself is idempotent.
pub trait Link {
    /// Write all bytes to the device
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ProtocolError>;

    /// Push any buffered output to the device
    fn flush(&mut self) -> Result<(), ProtocolError>;

    /// Discard unread input
    fn clear_input(&mut self) -> Result<(), ProtocolError>;

    /// Read one line, blocking up to the configured timeout.
    ///
    /// Returns the accumulated bytes up to and including the newline, or
    /// whatever arrived before the timeout (possibly nothing).
    fn read_line(&mut self) -> Result<String, ProtocolError>;

    /// Whether the underlying device is still open
    fn is_open(&self) -> bool;

    /// Flush pending output and release the device. No-op when closed.
    fn close(&mut self) -> Result<(), ProtocolError>;
}

/// [`Link`] over a real serial port
pub struct SerialLink {
    port: Option<Box<dyn SerialPort>>,
    timeout: Duration,
}

impl SerialLink {
    /// Open `path` at `baud` with the given per-read timeout.
    ///
    /// The port is configured 8N1 with no flow control, the framing the
    /// sketch expects.
    pub fn open(path: &str, baud: u32, timeout: Duration) -> Result<Self, ProtocolError> {
        // Short port-level timeout; read_line enforces the real deadline
        let mut port = serialport::new(path, baud)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| ProtocolError::ConnectionFailed(e.to_string()))?;

        port.set_data_bits(serialport::DataBits::Eight)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
        port.set_parity(serialport::Parity::None)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
        port.set_stop_bits(serialport::StopBits::One)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
        port.set_flow_control(serialport::FlowControl::None)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))?;

        debug!(path, baud, "serial port opened");

        Ok(Self {
            port: Some(port),
            timeout,
        })
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, ProtocolError> {
        self.port.as_mut().ok_or(ProtocolError::NotConnected)
    }
}

impl Link for SerialLink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        trace!(len = bytes.len(), "tx {:?}", String::from_utf8_lossy(bytes));
        self.port_mut()?
            .write_all(bytes)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))
    }

    fn flush(&mut self) -> Result<(), ProtocolError> {
        self.port_mut()?
            .flush()
            .map_err(|e| ProtocolError::SerialError(e.to_string()))
    }

    fn clear_input(&mut self) -> Result<(), ProtocolError> {
        self.port_mut()?
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))
    }

    fn read_line(&mut self) -> Result<String, ProtocolError> {
        let timeout = self.timeout;
        let port = self.port_mut()?;

        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        let start = Instant::now();

        // Poll bytes_to_read() so a silent device cannot block past the
        // deadline; the port-level timeout only covers single reads.
        while start.elapsed() < timeout {
            let available = port
                .bytes_to_read()
                .map_err(|e| ProtocolError::SerialError(e.to_string()))?;

            if available == 0 {
                std::thread::sleep(Duration::from_millis(2));
                continue;
            }

            match port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    continue;
                }
                Err(e) => return Err(ProtocolError::SerialError(e.to_string())),
            }
        }

        let text = String::from_utf8_lossy(&line).into_owned();
        trace!(len = line.len(), "rx {:?}", text);
        Ok(text)
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) -> Result<(), ProtocolError> {
        if let Some(mut port) = self.port.take() {
            port.flush()
                .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
            debug!("serial port closed");
        }
        Ok(())
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Strip one trailing CR/LF pair (or bare terminator) from a reply line
pub(crate) fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}
