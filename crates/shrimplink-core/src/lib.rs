//! # ShrimpLink Core Library
//!
//! Host-side client for Shrimp/Arduino boards running the companion
//! command sketch, speaking a small textual protocol over a serial link.
//!
//! This library provides:
//! - Candidate serial port enumeration per host platform
//! - Device discovery with a version handshake
//! - Digital/analog pin I/O and pin mode control
//! - A bit-banged I2C bridge (setup, scan, register read/write)
//!
//! ## Example
//!
//! ```rust,ignore
//! use shrimplink_core::{LogicLevel, PinMode, Session, SessionConfig};
//!
//! // Scan serial ports for a board answering the version handshake
//! let mut session = Session::new(SessionConfig::default());
//! session.connect()?;
//!
//! session.pin_mode(13, PinMode::Output)?;
//! session.digital_write(13, LogicLevel::High)?;
//! let light = session.analog_read(0)?;
//! session.close()?;
//! ```
//!
//! All I/O is synchronous and blocking; one request is in flight at a
//! time and a [`Session`] owns its serial connection exclusively.

#![warn(missing_docs)]

pub mod error;
pub mod frame;
pub mod link;
pub mod ports;
pub mod session;

pub use error::ProtocolError;
pub use frame::{build_frame, Command, LogicLevel, PinMode};
pub use link::{Link, SerialLink};
pub use ports::{host_scan, PortScan};
pub use session::{Session, SessionConfig, SessionState};

/// Default baud rate for board communication
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default timeout for a reply line in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Default settle delay after opening a port in milliseconds.
/// Opening the port resets Arduino-style boards; the sketch is not
/// listening until the bootloader hands over.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2000;

/// Literal exchanged in both directions during the version handshake
pub const VERSION_MARKER: &str = "version";

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
