//! Playlist executor
//!
//! Runs playlist entries back to back through the player. Each entry is
//! verified against the pose the previous entry left behind (the live pose
//! for the first). The first failure halts the run; later entries are never
//! loaded.

use core::fmt;

use super::player::{PlaybackError, PlaybackOutcome, Player};
use crate::config::ArmConfig;
use crate::motion::{Playlist, Pose, Sequence};
use crate::traits::{Actuator, Pacer};

/// Source of sequences by name
pub trait SequenceLibrary {
    type Error;

    /// Load a sequence
    fn load(&mut self, name: &str) -> Result<Sequence, Self::Error>;
}

/// Why an entry failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryFailure<E> {
    /// Sequence could not be loaded
    Load(E),
    /// Playback was refused or failed
    Playback(PlaybackError),
}

/// Playlist halted at `index`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistError<E> {
    /// 0-based index of the failing entry
    pub index: usize,
    /// Arm pose when the run halted
    pub live: Pose,
    pub failure: EntryFailure<E>,
}

impl<E: fmt::Display> fmt::Display for PlaylistError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            EntryFailure::Load(e) => write!(f, "entry {}: load failed: {}", self.index + 1, e),
            EntryFailure::Playback(e) => write!(f, "entry {}: {}", self.index + 1, e),
        }
    }
}

/// Result of a playlist run that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistReport {
    /// Entries played to completion
    pub completed: usize,
    /// Run stopped by cancellation
    pub cancelled: bool,
    /// Arm pose after the run
    pub live: Pose,
}

/// Runs playlists through a [`Player`]
#[derive(Debug, Default)]
pub struct PlaylistExecutor {
    player: Player,
}

impl PlaylistExecutor {
    pub fn new(player: Player) -> Self {
        Self { player }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Run every entry in order, halting at the first failure
    pub fn run<L, A, P>(
        &mut self,
        config: &ArmConfig,
        playlist: &Playlist,
        library: &mut L,
        live: &Pose,
        actuator: &mut A,
        pacer: &mut P,
    ) -> Result<PlaylistReport, PlaylistError<L::Error>>
    where
        L: SequenceLibrary,
        A: Actuator,
        P: Pacer,
    {
        let mut live = live.clone();

        for (index, name) in playlist.entries().iter().enumerate() {
            let sequence = match library.load(name) {
                Ok(sequence) => sequence,
                Err(e) => {
                    return Err(PlaylistError {
                        index,
                        live,
                        failure: EntryFailure::Load(e),
                    })
                }
            };

            match self.player.play(config, &sequence, &live, actuator, pacer) {
                Ok(report) => {
                    if let Some(pose) = report.last_pose {
                        live = pose;
                    }
                    if report.outcome == PlaybackOutcome::Cancelled {
                        return Ok(PlaylistReport {
                            completed: index,
                            cancelled: true,
                            live,
                        });
                    }
                }
                Err(error) => {
                    if let PlaybackError::Actuator {
                        last_pose: Some(pose),
                        ..
                    } = &error
                    {
                        live = pose.clone();
                    }
                    return Err(PlaylistError {
                        index,
                        live,
                        failure: EntryFailure::Playback(error),
                    });
                }
            }
        }

        Ok(PlaylistReport {
            completed: playlist.len(),
            cancelled: false,
            live,
        })
    }
}
