//! Command grammar: parsing, encoding, and range validation.

use core::fmt::{self, Write};

use heapless::String;

use crate::line::MAX_LINE_LEN;

/// Keyword for the "all joints to neutral" command
pub const NEUTRAL_KEYWORD: &str = "set";

/// Separator between the index and the value of `s`/`m` commands
pub const VALUE_DELIMITER: char = '-';

/// A single servo board command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Drive every joint to neutral + trim (`set`)
    Neutral,
    /// Set one joint to an absolute pulse (`s<joint>-<pulse>`)
    SetJoint {
        /// 1-indexed joint number
        joint: u8,
        /// Pulse width in microseconds
        pulse: u16,
    },
    /// Set a binary actuator (`m<magnet>-<0|1>`)
    SetMagnet {
        /// 1-indexed magnet number
        magnet: u8,
        /// true = engaged
        engaged: bool,
    },
}

/// Errors produced while parsing or validating a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Line was empty after trimming
    Empty,
    /// Leading keyword is not `set`, `s` or `m`
    UnknownCommand,
    /// `s`/`m` command without the `-` separator
    MissingDelimiter,
    /// Index or value is not a decimal number
    InvalidNumber,
    /// Magnet state other than 0 or 1
    InvalidState,
    /// Joint number outside 1..=joints
    JointOutOfRange(u32),
    /// Magnet number outside 1..=magnets
    MagnetOutOfRange(u32),
    /// Pulse outside the configured pulse window
    PulseOutOfRange(u32),
    /// Encoded line does not fit the line buffer
    BufferTooSmall,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => f.write_str("empty command"),
            CommandError::UnknownCommand => f.write_str("unknown command"),
            CommandError::MissingDelimiter => f.write_str("missing '-' delimiter"),
            CommandError::InvalidNumber => f.write_str("invalid number"),
            CommandError::InvalidState => f.write_str("magnet state must be 0 or 1"),
            CommandError::JointOutOfRange(j) => write!(f, "joint {} out of range", j),
            CommandError::MagnetOutOfRange(m) => write!(f, "magnet {} out of range", m),
            CommandError::PulseOutOfRange(p) => write!(f, "pulse {} out of range", p),
            CommandError::BufferTooSmall => f.write_str("command does not fit line buffer"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CommandError {}

impl Command {
    /// Parse a single command line.
    ///
    /// Surrounding whitespace and the line terminator are ignored. Indices
    /// and values are checked structurally only; use [`Limits::check`] for
    /// range validation.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }

        if line.eq_ignore_ascii_case(NEUTRAL_KEYWORD) {
            return Ok(Command::Neutral);
        }

        let mut chars = line.chars();
        let kind = chars.next().map(|c| c.to_ascii_lowercase());
        let rest = chars.as_str();

        match kind {
            Some('s') => {
                let (joint, pulse) = split_pair(rest)?;
                let joint = u8::try_from(joint).map_err(|_| CommandError::JointOutOfRange(joint))?;
                let pulse = u16::try_from(pulse).map_err(|_| CommandError::PulseOutOfRange(pulse))?;
                Ok(Command::SetJoint { joint, pulse })
            }
            Some('m') => {
                let (magnet, state) = split_pair(rest)?;
                let magnet =
                    u8::try_from(magnet).map_err(|_| CommandError::MagnetOutOfRange(magnet))?;
                let engaged = match state {
                    0 => false,
                    1 => true,
                    _ => return Err(CommandError::InvalidState),
                };
                Ok(Command::SetMagnet { magnet, engaged })
            }
            _ => Err(CommandError::UnknownCommand),
        }
    }

    /// Encode this command as a newline-terminated line
    pub fn to_line(&self) -> Result<String<MAX_LINE_LEN>, CommandError> {
        let mut line = String::new();
        writeln!(line, "{}", self).map_err(|_| CommandError::BufferTooSmall)?;
        Ok(line)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Neutral => f.write_str(NEUTRAL_KEYWORD),
            Command::SetJoint { joint, pulse } => write!(f, "s{}-{}", joint, pulse),
            Command::SetMagnet { magnet, engaged } => {
                write!(f, "m{}-{}", magnet, if *engaged { 1 } else { 0 })
            }
        }
    }
}

/// Split `<a>-<b>` into two decimal numbers
fn split_pair(s: &str) -> Result<(u32, u32), CommandError> {
    let (a, b) = s
        .split_once(VALUE_DELIMITER)
        .ok_or(CommandError::MissingDelimiter)?;
    Ok((parse_decimal(a)?, parse_decimal(b)?))
}

fn parse_decimal(s: &str) -> Result<u32, CommandError> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommandError::InvalidNumber);
    }
    s.parse::<u32>().map_err(|_| CommandError::InvalidNumber)
}

/// Range limits of a servo board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Limits {
    /// Number of joints (valid joint numbers are 1..=joints)
    pub joints: u8,
    /// Number of magnets (valid magnet numbers are 1..=magnets)
    pub magnets: u8,
    /// Lowest accepted pulse
    pub pulse_min: u16,
    /// Highest accepted pulse
    pub pulse_max: u16,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            joints: 4,
            magnets: 2,
            pulse_min: 500,
            pulse_max: 2500,
        }
    }
}

impl Limits {
    /// Validate a parsed command against these limits
    pub fn check(&self, command: &Command) -> Result<(), CommandError> {
        match *command {
            Command::Neutral => Ok(()),
            Command::SetJoint { joint, pulse } => {
                if joint == 0 || joint > self.joints {
                    return Err(CommandError::JointOutOfRange(joint as u32));
                }
                if pulse < self.pulse_min || pulse > self.pulse_max {
                    return Err(CommandError::PulseOutOfRange(pulse as u32));
                }
                Ok(())
            }
            Command::SetMagnet { magnet, .. } => {
                if magnet == 0 || magnet > self.magnets {
                    return Err(CommandError::MagnetOutOfRange(magnet as u32));
                }
                Ok(())
            }
        }
    }

    /// Parse and validate in one step
    pub fn parse(&self, line: &str) -> Result<Command, CommandError> {
        let command = Command::parse(line)?;
        self.check(&command)?;
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_neutral_any_case() {
        assert_eq!(Command::parse("set"), Ok(Command::Neutral));
        assert_eq!(Command::parse("SET\n"), Ok(Command::Neutral));
        assert_eq!(Command::parse("  Set  "), Ok(Command::Neutral));
    }

    #[test]
    fn test_parse_set_joint() {
        assert_eq!(
            Command::parse("s2-1450"),
            Ok(Command::SetJoint { joint: 2, pulse: 1450 })
        );
        assert_eq!(
            Command::parse("S4-2500\r\n"),
            Ok(Command::SetJoint { joint: 4, pulse: 2500 })
        );
    }

    #[test]
    fn test_parse_set_magnet() {
        assert_eq!(
            Command::parse("m1-1"),
            Ok(Command::SetMagnet { magnet: 1, engaged: true })
        );
        assert_eq!(
            Command::parse("M2-0"),
            Ok(Command::SetMagnet { magnet: 2, engaged: false })
        );
        assert_eq!(Command::parse("m1-2"), Err(CommandError::InvalidState));
    }

    #[test]
    fn test_malformed_commands() {
        assert_eq!(Command::parse(""), Err(CommandError::Empty));
        assert_eq!(Command::parse("   "), Err(CommandError::Empty));
        assert_eq!(Command::parse("x1-1500"), Err(CommandError::UnknownCommand));
        assert_eq!(Command::parse("s11500"), Err(CommandError::MissingDelimiter));
        assert_eq!(Command::parse("s1-"), Err(CommandError::InvalidNumber));
        assert_eq!(Command::parse("s-1500"), Err(CommandError::InvalidNumber));
        assert_eq!(Command::parse("s1-15a0"), Err(CommandError::InvalidNumber));
        assert_eq!(Command::parse("s1--1500"), Err(CommandError::InvalidNumber));
    }

    #[test]
    fn test_oversized_numbers_are_range_errors() {
        assert_eq!(
            Command::parse("s300-1500"),
            Err(CommandError::JointOutOfRange(300))
        );
        assert_eq!(
            Command::parse("s1-70000"),
            Err(CommandError::PulseOutOfRange(70000))
        );
    }

    #[test]
    fn test_limits_check() {
        let limits = Limits::default();
        assert!(limits.parse("s4-500").is_ok());
        assert_eq!(limits.parse("s0-1500"), Err(CommandError::JointOutOfRange(0)));
        assert_eq!(limits.parse("s5-1500"), Err(CommandError::JointOutOfRange(5)));
        assert_eq!(limits.parse("s1-499"), Err(CommandError::PulseOutOfRange(499)));
        assert_eq!(limits.parse("s1-2501"), Err(CommandError::PulseOutOfRange(2501)));
        assert_eq!(limits.parse("m3-1"), Err(CommandError::MagnetOutOfRange(3)));
        assert_eq!(limits.parse("set"), Ok(Command::Neutral));
    }

    #[test]
    fn test_to_line() {
        let line = Command::SetJoint { joint: 3, pulse: 1833 }.to_line().unwrap();
        assert_eq!(line.as_str(), "s3-1833\n");
        let line = Command::SetMagnet { magnet: 2, engaged: true }.to_line().unwrap();
        assert_eq!(line.as_str(), "m2-1\n");
        assert_eq!(Command::Neutral.to_line().unwrap().as_str(), "set\n");
    }

    proptest! {
        #[test]
        fn prop_encoded_joint_commands_parse_back(joint in 1u8..=255, pulse in any::<u16>()) {
            let cmd = Command::SetJoint { joint, pulse };
            let line = cmd.to_line().unwrap();
            prop_assert_eq!(Command::parse(&line), Ok(cmd));
        }
    }
}
