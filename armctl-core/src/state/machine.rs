//! Control state machine
//!
//! One control holder per arm: manual input (optionally recorded) or
//! playback, never both.

use super::events::Event;

/// Who currently controls the arm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlState {
    /// Manual control, not recording
    #[default]
    Idle,
    /// Manual control, changes are recorded
    Recording,
    /// Playback requested, checking the start pose
    Verifying,
    /// Playback streaming poses
    Playing,
}

impl ControlState {
    /// Check if manual input may move the arm
    pub fn manual_allowed(&self) -> bool {
        matches!(self, ControlState::Idle | ControlState::Recording)
    }

    /// Process an event and return the next state
    ///
    /// Events that do not apply leave the state unchanged.
    pub fn transition(self, event: Event) -> Self {
        use ControlState::*;
        use Event::*;

        match (self, event) {
            // Idle transitions
            (Idle, StartRecording) => Recording,
            (Idle, StartPlayback) => Verifying,

            // Recording transitions; playback cannot preempt a recording
            (Recording, StopRecording) => Idle,

            // Verifying transitions
            (Verifying, VerifyPassed) => Playing,
            (Verifying, VerifyFailed) => Idle,
            (Verifying, Cancel) => Idle,

            // Playing transitions
            (Playing, PlaybackFinished) => Idle,
            (Playing, Cancel) => Idle,

            // Default: stay in current state
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_cycle() {
        let state = ControlState::Idle.transition(Event::StartRecording);
        assert_eq!(state, ControlState::Recording);
        assert!(state.manual_allowed());
        assert_eq!(state.transition(Event::StopRecording), ControlState::Idle);
    }

    #[test]
    fn test_playback_flow() {
        let verifying = ControlState::Idle.transition(Event::StartPlayback);
        assert_eq!(verifying, ControlState::Verifying);
        assert!(!verifying.manual_allowed());

        let playing = verifying.transition(Event::VerifyPassed);
        assert_eq!(playing, ControlState::Playing);
        assert!(!playing.manual_allowed());

        assert_eq!(playing.transition(Event::PlaybackFinished), ControlState::Idle);
    }

    #[test]
    fn test_failed_verification_returns_to_idle() {
        let state = ControlState::Verifying.transition(Event::VerifyFailed);
        assert_eq!(state, ControlState::Idle);
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        for state in [ControlState::Verifying, ControlState::Playing] {
            assert_eq!(state.transition(Event::Cancel), ControlState::Idle);
        }
    }

    #[test]
    fn test_no_concurrent_record_and_play() {
        assert_eq!(
            ControlState::Recording.transition(Event::StartPlayback),
            ControlState::Recording
        );
        assert_eq!(
            ControlState::Playing.transition(Event::StartRecording),
            ControlState::Playing
        );
    }
}
