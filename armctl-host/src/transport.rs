//! Line-protocol link to the servo board
//!
//! Encodes poses as grammar lines and writes each pose with a single
//! `write_all`. Magnet commands are only sent when a magnet changes.

use std::io::{self, Read, Write};
use std::time::Duration;

use armctl_core::motion::Pose;
use armctl_core::traits::{Actuator, ActuatorError};
use armctl_protocol::{Command, CommandError, LineParser, Response};
use tracing::{debug, info, warn};

/// Default serial baud rate of the servo board
pub const DEFAULT_BAUD: u32 = 115_200;

/// Read timeout used when draining board responses
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(50);

/// Errors raised by the board link
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("board I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Byte stream to a board
pub trait Link: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> Link for T {}

/// Open a serial port to the board
pub fn open_serial(port: &str, baud: u32) -> Result<Box<dyn serialport::SerialPort>, TransportError> {
    let serial = serialport::new(port, baud)
        .timeout(RESPONSE_TIMEOUT)
        .open()
        .map_err(|source| TransportError::Open {
            port: port.to_string(),
            source,
        })?;
    info!("Opened {} at {} baud", port, baud);
    Ok(serial)
}

/// Actuator speaking the line grammar over a byte link
#[derive(Debug)]
pub struct LineActuator<P> {
    port: P,
    /// Magnet states last sent, unknown until the first pose
    magnets: Option<Vec<bool>>,
    parser: LineParser,
}

impl<P> LineActuator<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            magnets: None,
            parser: LineParser::new(),
        }
    }

    /// Actuator for a board whose magnets are known to be in `magnets`
    pub fn with_magnets(port: P, magnets: &[bool]) -> Self {
        Self {
            magnets: Some(magnets.to_vec()),
            ..Self::new(port)
        }
    }

    pub fn get_ref(&self) -> &P {
        &self.port
    }

    pub fn get_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    /// Encode a pose: every joint, then the magnets that changed
    pub fn encode_pose(&self, pose: &Pose) -> Result<Vec<u8>, CommandError> {
        let mut bytes = Vec::new();
        for (index, &pulse) in pose.pulses().iter().enumerate() {
            let command = Command::SetJoint {
                joint: index as u8 + 1,
                pulse,
            };
            bytes.extend_from_slice(command.to_line()?.as_bytes());
        }

        for (index, &engaged) in pose.magnets().iter().enumerate() {
            let sent = self.magnets.as_ref().and_then(|m| m.get(index).copied());
            if sent == Some(engaged) {
                continue;
            }
            let command = Command::SetMagnet {
                magnet: index as u8 + 1,
                engaged,
            };
            bytes.extend_from_slice(command.to_line()?.as_bytes());
        }
        Ok(bytes)
    }
}

impl<P: Read> LineActuator<P> {
    /// Read and log every response line the board has sent so far
    ///
    /// Stops at the first read that returns no data or times out.
    pub fn drain_responses(&mut self) -> Result<Vec<String>, TransportError> {
        let mut lines = Vec::new();
        let mut buf = [0u8; 256];

        loop {
            let n = match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    break
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            for &byte in &buf[..n] {
                match self.parser.feed(byte) {
                    Ok(Some(line)) if !line.trim().is_empty() => {
                        let response = Response::classify(&line);
                        if response.is_error() {
                            warn!("Board: {}", response.text());
                        } else {
                            debug!("Board: {}", response.text());
                        }
                        lines.push(line.to_string());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Dropped board output: {}", e),
                }
            }
        }
        Ok(lines)
    }
}

impl<P: Write> Actuator for LineActuator<P> {
    fn apply(&mut self, pose: &Pose) -> Result<(), ActuatorError> {
        let bytes = self.encode_pose(pose).map_err(|e| {
            warn!("Cannot encode pose: {}", e);
            ActuatorError::Encoding
        })?;

        let written = self
            .port
            .write_all(&bytes)
            .and_then(|_| self.port.flush());
        if let Err(e) = written {
            warn!("Pose write failed: {}", e);
            return Err(match e.kind() {
                io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected => {
                    ActuatorError::Disconnected
                }
                _ => ActuatorError::Io,
            });
        }

        debug!("-> pose {:?} magnets {:?}", pose.pulses(), pose.magnets());
        self.magnets = Some(pose.magnets().to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(actuator: &LineActuator<Vec<u8>>) -> &str {
        std::str::from_utf8(actuator.get_ref()).unwrap()
    }

    #[test]
    fn test_pose_is_one_block() {
        let mut actuator = LineActuator::new(Vec::new());
        let pose = Pose::new(&[1500, 1450, 1600, 1500], &[true, false]).unwrap();
        actuator.apply(&pose).unwrap();
        assert_eq!(
            text(&actuator),
            "s1-1500\ns2-1450\ns3-1600\ns4-1500\nm1-1\nm2-0\n"
        );
    }

    #[test]
    fn test_magnets_only_on_change() {
        let mut actuator = LineActuator::with_magnets(Vec::new(), &[false, false]);
        let pose = Pose::new(&[1500], &[false, false]).unwrap();
        actuator.apply(&pose).unwrap();
        assert_eq!(text(&actuator), "s1-1500\n");

        let grab = Pose::new(&[1500], &[false, true]).unwrap();
        actuator.apply(&grab).unwrap();
        actuator.apply(&grab).unwrap();
        assert_eq!(text(&actuator), "s1-1500\ns1-1500\nm2-1\ns1-1500\n");
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_keeps_magnet_state() {
        let mut actuator = LineActuator::with_magnets(Broken, &[false]);
        let pose = Pose::new(&[1500], &[true]).unwrap();
        assert_eq!(actuator.apply(&pose), Err(ActuatorError::Disconnected));
        assert_eq!(actuator.encode_pose(&pose).unwrap(), b"s1-1500\nm1-1\n");
    }

    #[test]
    fn test_drain_classifies_lines() {
        let board = io::Cursor::new(b"servo 1 -> 1500\r\nInvalid command: x\n\npartial".to_vec());
        let mut actuator = LineActuator::new(board);
        let lines = actuator.drain_responses().unwrap();
        assert_eq!(lines, ["servo 1 -> 1500", "Invalid command: x"]);
    }
}
