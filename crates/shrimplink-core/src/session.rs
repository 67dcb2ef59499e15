//! Device session
//!
//! Owns the serial link to one board and exposes the typed command set.
//! Handles the connection lifecycle: discovery over candidate ports,
//! explicit open by path, or adoption of a pre-opened link.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ProtocolError;
use crate::frame::{Command, LogicLevel, PinMode};
use crate::link::{strip_line_ending, Link, SerialLink};
use crate::ports::{host_scan, PortScan};
use crate::{DEFAULT_BAUD_RATE, DEFAULT_SETTLE_DELAY_MS, DEFAULT_TIMEOUT_MS, VERSION_MARKER};

/// Sentinel line terminating an I2C scan reply
const SCAN_DONE: &str = "done";

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No link yet
    Unbound,
    /// Candidate ports are being probed
    Probing,
    /// A verified link is held and ready for command traffic
    Bound,
    /// The link has been released; the session cannot be rebound
    Closed,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Explicit port path; skips discovery (and its handshake check)
    pub port: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    /// Reply timeout in milliseconds
    pub timeout_ms: u64,
    /// Delay after opening a port before the handshake, in milliseconds.
    /// The board resets on open and needs warm-up time.
    pub settle_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

/// A session with one board.
///
/// Strictly one request in flight at a time; the link is exclusively
/// owned and every operation is a blocking write-then-read exchange.
pub struct Session {
    link: Option<Box<dyn Link>>,
    state: SessionState,
    config: SessionConfig,
}

impl Session {
    /// Create an unbound session; call [`Session::connect`] to bind it
    pub fn new(config: SessionConfig) -> Self {
        Self {
            link: None,
            state: SessionState::Unbound,
            config,
        }
    }

    /// Adopt a caller-supplied pre-opened link, skipping discovery and
    /// the handshake check. Pending output is flushed first.
    pub fn with_link(mut link: Box<dyn Link>) -> Result<Self, ProtocolError> {
        link.flush()?;
        Ok(Self {
            link: Some(link),
            state: SessionState::Bound,
            config: SessionConfig::default(),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session holds a link ready for command traffic
    pub fn is_bound(&self) -> bool {
        self.state == SessionState::Bound
    }

    /// Bind the session to a board.
    ///
    /// With `config.port` set, opens that path directly; an open failure
    /// is fatal and no handshake is verified. Otherwise every candidate
    /// from the host port enumerator is probed in turn and the first one
    /// answering the version handshake is kept; exhausting the
    /// candidates fails with [`ProtocolError::NoDeviceFound`].
    pub fn connect(&mut self) -> Result<(), ProtocolError> {
        if self.state != SessionState::Unbound {
            return Err(ProtocolError::AlreadyConnected);
        }

        let baud = self.config.baud_rate;
        let timeout = Duration::from_millis(self.config.timeout_ms);

        if let Some(path) = self.config.port.clone() {
            let mut link = SerialLink::open(&path, baud, timeout)?;
            link.flush()?;
            info!(port = %path, "using explicitly named port");
            self.link = Some(Box::new(link));
            self.state = SessionState::Bound;
            return Ok(());
        }

        let scan = host_scan();
        self.connect_with(scan.as_ref(), |path| {
            SerialLink::open(path, baud, timeout).map(|l| Box::new(l) as Box<dyn Link>)
        })
    }

    /// Discovery with an injected port enumerator and link opener.
    ///
    /// This is the seam [`Session::connect`] runs through; it is public
    /// so callers with exotic transports (or tests) can supply their own
    /// candidates and open function.
    pub fn connect_with<F>(
        &mut self,
        scan: &dyn PortScan,
        mut open_link: F,
    ) -> Result<(), ProtocolError>
    where
        F: FnMut(&str) -> Result<Box<dyn Link>, ProtocolError>,
    {
        if self.state != SessionState::Unbound {
            return Err(ProtocolError::AlreadyConnected);
        }

        let candidates = scan.list_candidate_ports()?;
        self.state = SessionState::Probing;
        let settle = Duration::from_millis(self.config.settle_delay_ms);

        for path in &candidates {
            debug!(port = %path, "probing candidate");
            let mut link = match open_link(path.as_str()) {
                Ok(link) => link,
                Err(e) => {
                    debug!(port = %path, error = %e, "open failed, trying next");
                    continue;
                }
            };

            // The board resets on open; give the sketch time to come up
            std::thread::sleep(settle);

            let verified = handshake(&mut *link).and_then(|reply| {
                if reply == VERSION_MARKER {
                    Ok(())
                } else {
                    Err(ProtocolError::HandshakeMismatch {
                        expected: VERSION_MARKER.to_string(),
                        actual: reply,
                    })
                }
            });

            match verified {
                Ok(()) => {
                    info!(port = %path, "board answered handshake");
                    self.link = Some(link);
                    self.state = SessionState::Bound;
                    return Ok(());
                }
                Err(e) => {
                    debug!(port = %path, error = %e, "not a board, trying next");
                    let _ = link.close();
                }
            }
        }

        self.state = SessionState::Unbound;
        Err(ProtocolError::NoDeviceFound)
    }

    /// Re-run the version handshake on the bound link.
    ///
    /// Returns `None` instead of an error when the session is unbound or
    /// the exchange fails.
    pub fn version(&mut self) -> Option<String> {
        let link = self.link.as_mut()?;
        match handshake(&mut **link) {
            Ok(reply) => Some(reply),
            Err(_) => None,
        }
    }

    /// Drive a digital pin high or low
    pub fn digital_write(&mut self, pin: i32, level: LogicLevel) -> Result<(), ProtocolError> {
        self.send(&Command::DigitalWrite { pin, level })
    }

    /// PWM output on a pin; `duty` is clamped to 0..=255
    pub fn analog_write(&mut self, pin: i32, duty: i32) -> Result<(), ProtocolError> {
        self.send(&Command::AnalogWrite { pin, duty })
    }

    /// Sample an analog input pin, nominally 0..=1023
    pub fn analog_read(&mut self, pin: i32) -> Result<i32, ProtocolError> {
        let reply = self.query(&Command::AnalogRead { pin })?;
        reply
            .parse::<i32>()
            .map_err(|_| ProtocolError::BadReply(reply.clone()))
    }

    /// Read a digital pin; the sketch answers `"0"` or `"1"`
    pub fn digital_read(&mut self, pin: i32) -> Result<String, ProtocolError> {
        self.query(&Command::DigitalRead { pin })
    }

    /// Set the I/O mode of a pin.
    ///
    /// `InputPullup` is carried by the dedicated pull-up command; the
    /// sketch's mode command only distinguishes input from output.
    pub fn pin_mode(&mut self, pin: i32, mode: PinMode) -> Result<(), ProtocolError> {
        match mode {
            PinMode::InputPullup => self.send(&Command::PinModePullUp { pin }),
            mode => self.send(&Command::PinMode { pin, mode }),
        }
    }

    /// Set a pin to input with the internal pull-up enabled
    pub fn pin_mode_pull_up(&mut self, pin: i32) -> Result<(), ProtocolError> {
        self.send(&Command::PinModePullUp { pin })
    }

    /// Initialize the I2C bridge for a device address
    pub fn i2c_setup(&mut self, addr: i32) -> Result<(), ProtocolError> {
        self.send(&Command::I2cSetup { addr })
    }

    /// Drive the bridged I2C line high for an address
    pub fn i2c_write_high(&mut self, addr: i32) -> Result<(), ProtocolError> {
        self.send(&Command::I2cWriteHigh { addr })
    }

    /// Drive the bridged I2C line low for an address
    pub fn i2c_write_low(&mut self, addr: i32) -> Result<(), ProtocolError> {
        self.send(&Command::I2cWriteLow { addr })
    }

    /// Clock the bus free of a stuck slave; reply line verbatim
    pub fn i2c_unstick(&mut self) -> Result<String, ProtocolError> {
        self.query(&Command::I2cUnstick)
    }

    /// Scan the I2C bus.
    ///
    /// The sketch answers one line per responding address followed by a
    /// `done` sentinel, which is excluded from the returned list. A
    /// timed-out empty line fails with [`ProtocolError::Timeout`] so a
    /// silent device cannot hang the scan.
    pub fn i2c_scan(&mut self) -> Result<Vec<String>, ProtocolError> {
        self.send(&Command::I2cScan)?;
        let link = self.link.as_mut().ok_or(ProtocolError::NotConnected)?;

        let mut addresses = Vec::new();
        loop {
            let line = link.read_line()?;
            if line.is_empty() {
                return Err(ProtocolError::Timeout);
            }
            let entry = strip_line_ending(&line);
            if entry == SCAN_DONE {
                break;
            }
            addresses.push(entry.to_string());
        }
        Ok(addresses)
    }

    /// Write a two-byte configuration value to a register
    pub fn i2c_configure(
        &mut self,
        addr: i32,
        reg: i32,
        high: i32,
        low: i32,
    ) -> Result<(), ProtocolError> {
        self.send(&Command::I2cConfigure {
            addr,
            reg,
            high,
            low,
        })
    }

    /// Write one byte to a register
    pub fn i2c_write_register(
        &mut self,
        addr: i32,
        reg: i32,
        data: i32,
    ) -> Result<(), ProtocolError> {
        self.send(&Command::I2cWriteRegister { addr, reg, data })
    }

    /// Read a register; reply line verbatim
    pub fn i2c_read_register_raw(&mut self, addr: i32, reg: i32) -> Result<String, ProtocolError> {
        self.query(&Command::I2cReadRegisterRaw { addr, reg })
    }

    /// Soft-reset the sketch
    pub fn soft_reset(&mut self) -> Result<(), ProtocolError> {
        self.send(&Command::SoftReset)
    }

    /// Flush and release the link. Idempotent; a second call is a no-op.
    pub fn close(&mut self) -> Result<(), ProtocolError> {
        if let Some(link) = self.link.as_mut() {
            if link.is_open() {
                link.flush()?;
                link.close()?;
            }
        }
        self.state = SessionState::Closed;
        Ok(())
    }

    /// Encode and send a command: clear pending input, write, flush
    fn send(&mut self, cmd: &Command) -> Result<(), ProtocolError> {
        let link = self.link.as_mut().ok_or(ProtocolError::NotConnected)?;
        let frame = cmd.encode();
        debug!(cmd = cmd.name(), frame = %frame, "sending command");
        link.clear_input()?;
        link.write_all(frame.as_bytes())?;
        link.flush()
    }

    /// Send a command and read one stripped reply line
    fn query(&mut self, cmd: &Command) -> Result<String, ProtocolError> {
        self.send(cmd)?;
        let link = self.link.as_mut().ok_or(ProtocolError::NotConnected)?;
        let line = link.read_line()?;
        Ok(strip_line_ending(&line).to_string())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Send the version query on a link and return the stripped reply line
fn handshake(link: &mut dyn Link) -> Result<String, ProtocolError> {
    let frame = Command::Version.encode();
    link.write_all(frame.as_bytes())?;
    link.flush()?;
    let line = link.read_line()?;
    Ok(strip_line_ending(&line).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
        assert!(config.port.is_none());
    }

    #[test]
    fn test_new_session_is_unbound() {
        let session = Session::new(SessionConfig::default());
        assert_eq!(session.state(), SessionState::Unbound);
        assert!(!session.is_bound());
    }

    #[test]
    fn test_unbound_session_rejects_commands() {
        let mut session = Session::new(SessionConfig::default());
        let err = session.digital_write(13, LogicLevel::High).unwrap_err();
        assert!(matches!(err, ProtocolError::NotConnected));
        assert!(session.version().is_none());
    }
}
