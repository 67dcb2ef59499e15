//! Command framing
//!
//! Builds the wire frames understood by the command sketch:
//! `@<name>%<arg1>%...%<argN>$!` with no checksum and no length prefix.
//!
//! Neither command names nor argument text are escaped against the
//! `@`/`%`/`$` framing characters; an argument whose string form
//! contains `%` breaks the frame. Known limitation of the sketch
//! protocol, kept as-is.

use serde::{Deserialize, Serialize};

/// Logic level of a digital pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicLevel {
    /// Pin driven high
    High,
    /// Pin driven low
    Low,
}

/// I/O mode of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinMode {
    /// High-impedance input
    Input,
    /// Driven output
    Output,
    /// Input with the internal pull-up resistor enabled
    InputPullup,
}

/// Build a wire frame from a command name and pre-stringified arguments.
///
/// An empty argument list produces an empty argument segment:
/// `build_frame("version", &[])` is `"@version%$!"`.
pub fn build_frame(name: &str, args: &[String]) -> String {
    format!("@{}%{}$!", name, args.join("%"))
}

/// A single request to the board.
///
/// One variant per wire command, with typed arguments so argument counts
/// are checked at compile time. [`Command::encode`] produces the exact
/// frame the sketch parses.
///
/// Digital level and input mode are encoded by negating the pin number
/// instead of sending a separate flag, which the sketch relies on. Pin 0
/// therefore cannot be expressed as LOW/INPUT; callers driving pin 0
/// must not rely on those combinations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Version handshake query
    Version,
    /// Drive a digital pin high or low
    DigitalWrite {
        /// Digital pin number
        pin: i32,
        /// Level to drive
        level: LogicLevel,
    },
    /// PWM output on a pin, duty 0 (off) to 255 (always on)
    AnalogWrite {
        /// PWM-capable pin number
        pin: i32,
        /// Duty cycle, clamped to 0..=255 on encode
        duty: i32,
    },
    /// Sample an analog input pin
    AnalogRead {
        /// Analog pin number
        pin: i32,
    },
    /// Read a digital pin
    DigitalRead {
        /// Digital pin number
        pin: i32,
    },
    /// Set a pin to input or output
    PinMode {
        /// Pin number
        pin: i32,
        /// Desired mode; `InputPullup` is carried by the dedicated
        /// pull-up command, see [`Command::PinModePullUp`]
        mode: PinMode,
    },
    /// Set a pin to input with the pull-up enabled
    PinModePullUp {
        /// Pin number
        pin: i32,
    },
    /// Initialize the I2C bridge for a device address
    I2cSetup {
        /// 7-bit I2C address
        addr: i32,
    },
    /// Drive the bridged I2C line high for an address
    I2cWriteHigh {
        /// 7-bit I2C address
        addr: i32,
    },
    /// Drive the bridged I2C line low for an address
    I2cWriteLow {
        /// 7-bit I2C address
        addr: i32,
    },
    /// Clock the bus free of a stuck slave
    I2cUnstick,
    /// Scan the bus, one reply line per responding address
    I2cScan,
    /// Write a two-byte configuration value to a register
    I2cConfigure {
        /// 7-bit I2C address
        addr: i32,
        /// Register number
        reg: i32,
        /// High data byte
        high: i32,
        /// Low data byte
        low: i32,
    },
    /// Write one byte to a register
    I2cWriteRegister {
        /// 7-bit I2C address
        addr: i32,
        /// Register number
        reg: i32,
        /// Data byte
        data: i32,
    },
    /// Read a register, reply line verbatim
    I2cReadRegisterRaw {
        /// 7-bit I2C address
        addr: i32,
        /// Register number
        reg: i32,
    },
    /// Soft-reset the sketch
    SoftReset,
}

impl Command {
    /// The short wire name of this command
    pub fn name(&self) -> &'static str {
        match self {
            Command::Version => "version",
            Command::DigitalWrite { .. } => "dw",
            Command::AnalogWrite { .. } => "aw",
            Command::AnalogRead { .. } => "ar",
            Command::DigitalRead { .. } => "dr",
            Command::PinMode { .. } => "pm",
            Command::PinModePullUp { .. } => "pp",
            Command::I2cSetup { .. } => "ac",
            Command::I2cWriteHigh { .. } => "hc",
            Command::I2cWriteLow { .. } => "ic",
            Command::I2cUnstick => "un",
            Command::I2cScan => "ick",
            Command::I2cConfigure { .. } => "cic",
            Command::I2cWriteRegister { .. } => "wic",
            Command::I2cReadRegisterRaw { .. } => "grr",
            Command::SoftReset => "res",
        }
    }

    /// The encoded argument list, with the sign and clamping rules applied
    pub fn args(&self) -> Vec<String> {
        match *self {
            Command::Version
            | Command::I2cUnstick
            | Command::I2cScan
            | Command::SoftReset => Vec::new(),
            Command::DigitalWrite { pin, level } => {
                let pin = match level {
                    LogicLevel::Low => -pin,
                    LogicLevel::High => pin,
                };
                vec![pin.to_string()]
            }
            Command::AnalogWrite { pin, duty } => {
                vec![pin.to_string(), duty.clamp(0, 255).to_string()]
            }
            Command::AnalogRead { pin } | Command::DigitalRead { pin } => {
                vec![pin.to_string()]
            }
            Command::PinMode { pin, mode } => {
                let pin = match mode {
                    PinMode::Input => -pin,
                    PinMode::Output | PinMode::InputPullup => pin,
                };
                vec![pin.to_string()]
            }
            Command::PinModePullUp { pin } => vec![pin.to_string()],
            Command::I2cSetup { addr }
            | Command::I2cWriteHigh { addr }
            | Command::I2cWriteLow { addr } => vec![addr.to_string()],
            Command::I2cConfigure {
                addr,
                reg,
                high,
                low,
            } => vec![
                addr.to_string(),
                reg.to_string(),
                high.to_string(),
                low.to_string(),
            ],
            Command::I2cWriteRegister { addr, reg, data } => {
                vec![addr.to_string(), reg.to_string(), data.to_string()]
            }
            Command::I2cReadRegisterRaw { addr, reg } => {
                vec![addr.to_string(), reg.to_string()]
            }
        }
    }

    /// Encode this command into its wire frame
    pub fn encode(&self) -> String {
        build_frame(self.name(), &self.args())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Inverse of `build_frame`, for round-trip checks
    fn parse_frame(frame: &str) -> (String, Vec<String>) {
        let body = frame
            .strip_prefix('@')
            .and_then(|f| f.strip_suffix("$!"))
            .expect("frame delimiters");
        let (name, args) = body.split_once('%').expect("name separator");
        let args = if args.is_empty() {
            Vec::new()
        } else {
            args.split('%').map(str::to_string).collect()
        };
        (name.to_string(), args)
    }

    #[test]
    fn test_version_frame() {
        assert_eq!(Command::Version.encode(), "@version%$!");
    }

    #[test]
    fn test_no_arg_commands_have_empty_segment() {
        assert_eq!(Command::I2cUnstick.encode(), "@un%$!");
        assert_eq!(Command::I2cScan.encode(), "@ick%$!");
        assert_eq!(Command::SoftReset.encode(), "@res%$!");
    }

    #[test]
    fn test_frame_round_trip() {
        let cases: Vec<(&str, Vec<String>)> = vec![
            ("version", vec![]),
            ("aw", vec!["9".into(), "128".into()]),
            ("cic", vec!["64".into(), "2".into(), "255".into(), "0".into()]),
            ("dw", vec!["-13".into()]),
        ];
        for (name, args) in cases {
            let frame = build_frame(name, &args);
            assert_eq!(parse_frame(&frame), (name.to_string(), args));
        }
    }

    #[test]
    fn test_digital_write_sign_encoding() {
        let low = Command::DigitalWrite {
            pin: 13,
            level: LogicLevel::Low,
        };
        assert_eq!(low.encode(), "@dw%-13$!");

        let high = Command::DigitalWrite {
            pin: 13,
            level: LogicLevel::High,
        };
        assert_eq!(high.encode(), "@dw%13$!");
    }

    #[test]
    fn test_pin_mode_sign_encoding() {
        let input = Command::PinMode {
            pin: 7,
            mode: PinMode::Input,
        };
        assert_eq!(input.encode(), "@pm%-7$!");

        let output = Command::PinMode {
            pin: 7,
            mode: PinMode::Output,
        };
        assert_eq!(output.encode(), "@pm%7$!");
    }

    #[test]
    fn test_analog_write_clamps_duty() {
        let over = Command::AnalogWrite { pin: 3, duty: 300 };
        assert_eq!(over.encode(), "@aw%3%255$!");

        let under = Command::AnalogWrite { pin: 3, duty: -5 };
        assert_eq!(under.encode(), "@aw%3%0$!");

        let nominal = Command::AnalogWrite { pin: 3, duty: 128 };
        assert_eq!(nominal.encode(), "@aw%3%128$!");
    }

    #[test]
    fn test_multi_arg_order() {
        let cmd = Command::I2cWriteRegister {
            addr: 64,
            reg: 2,
            data: 17,
        };
        assert_eq!(cmd.encode(), "@wic%64%2%17$!");
    }
}
