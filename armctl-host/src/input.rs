//! Operator input lines
//!
//! Manual control while recording is read one line at a time. Besides the
//! board grammar (`set`, `s<joint>-<pulse>`, `m<magnet>-<0|1>`) the operator
//! can jog a joint (`j2+10`, `j3-5`), pause (`wait 250`) and finish
//! (`stop`). Blank lines and `#` comments are skipped. For two arms a line
//! is prefixed with the arm number: `1:s1-1600`, `2:j4+20`.

use armctl_core::scheduler::ArmId;
use armctl_protocol::{Command, CommandError};

/// One parsed input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualInput {
    /// Board grammar command
    Command(Command),
    /// Relative joint move in pulse units
    Jog { joint: u8, step: i32 },
    /// Let time pass
    Wait { ms: u32 },
    /// End the session
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("{0}")]
    Command(#[from] CommandError),

    #[error("invalid jog '{0}' (expected j<joint>+<step> or j<joint>-<step>)")]
    Jog(String),

    #[error("invalid wait '{0}' (expected wait <ms>)")]
    Wait(String),

    #[error("unknown arm '{0}' (expected 1 or 2)")]
    Arm(String),

    #[error("'{0}' needs an arm prefix")]
    MissingArm(String),
}

fn parse_jog(body: &str, line: &str) -> Result<ManualInput, InputError> {
    let bad = || InputError::Jog(line.to_string());
    let split = body.find(['+', '-']).ok_or_else(bad)?;
    let (joint, step) = body.split_at(split);
    let joint = joint.trim().parse::<u8>().map_err(|_| bad())?;
    let step = step.trim().parse::<i32>().map_err(|_| bad())?;
    Ok(ManualInput::Jog { joint, step })
}

/// Parse one input line; `None` for blank lines and comments
pub fn parse_input(line: &str) -> Result<Option<ManualInput>, InputError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let lower = trimmed.to_ascii_lowercase();

    if lower == "stop" || lower == "quit" {
        return Ok(Some(ManualInput::Stop));
    }
    if let Some(ms) = lower.strip_prefix("wait") {
        let ms = ms
            .trim()
            .parse::<u32>()
            .map_err(|_| InputError::Wait(trimmed.to_string()))?;
        return Ok(Some(ManualInput::Wait { ms }));
    }
    if let Some(body) = lower.strip_prefix('j') {
        return parse_jog(body, trimmed).map(Some);
    }
    Ok(Some(ManualInput::Command(Command::parse(trimmed)?)))
}

/// Parse a two-arm input line
///
/// `wait` and `stop` apply to both arms and carry no prefix; everything else
/// names its arm.
pub fn parse_dual_input(line: &str) -> Result<Option<(Option<ArmId>, ManualInput)>, InputError> {
    let trimmed = line.trim();
    if trimmed.starts_with('#') {
        return Ok(None);
    }
    let (arm, body) = match trimmed.split_once(':') {
        Some((prefix, body)) => {
            let arm = match prefix.trim() {
                "1" => ArmId::A,
                "2" => ArmId::B,
                other => return Err(InputError::Arm(other.to_string())),
            };
            (Some(arm), body)
        }
        None => (None, trimmed),
    };

    let Some(input) = parse_input(body)? else {
        return Ok(None);
    };
    match (arm, input) {
        (None, ManualInput::Command(_) | ManualInput::Jog { .. }) => {
            Err(InputError::MissingArm(trimmed.to_string()))
        }
        (arm, input) => Ok(Some((arm, input))),
    }
}
