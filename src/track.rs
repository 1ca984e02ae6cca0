// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::config::{PlaybackConfig, Sound, TrackInput};

/// Validation failures raised while compiling a track.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("track input does not have a name")]
    MissingName,

    #[error("track input does not have number of steps")]
    MissingStepCount,

    #[error("found step {index} which is outside of the track's {max} steps")]
    StepIndexOutOfRange { index: usize, max: usize },

    #[error("track input must have a tempo of at least 1 BPM")]
    ZeroTempo,

    #[error("track input has too many steps ({steps})")]
    TooManySteps { steps: usize },
}

/// One position in a track's timeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    /// The 1-based ID of the step.
    pub id: usize,
    /// The sounds to play on this step, in pattern declaration order.
    pub sounds: Vec<Sound>,
}

/// A compiled track with exactly one step per step ID. Read-only after compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    /// The name of the track.
    name: String,
    /// The steps, IDs 1 through the number of steps in order.
    steps: Vec<Step>,
    /// The definition used to create this track.
    input: TrackInput,
}

impl Track {
    /// Validates the track definition and materializes its steps. No partial track is
    /// produced on failure.
    pub fn compile(input: TrackInput) -> Result<Track, CompileError> {
        if input.name.is_empty() {
            return Err(CompileError::MissingName);
        }
        if input.number_of_steps < 1 {
            return Err(CompileError::MissingStepCount);
        }

        let mut sounds_by_step = group_by_step_id(&input)?;

        if input.playback_config.bpm < 1 {
            return Err(CompileError::ZeroTempo);
        }

        let mut steps = Vec::new();
        steps
            .try_reserve_exact(input.number_of_steps)
            .map_err(|_| CompileError::TooManySteps {
                steps: input.number_of_steps,
            })?;
        steps.extend((1..=input.number_of_steps).map(|id| Step {
            id,
            sounds: sounds_by_step.remove(&id).unwrap_or_default(),
        }));

        Ok(Track {
            name: input.name.clone(),
            steps,
            input,
        })
    }

    /// Gets the name of the track.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the steps of the track.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Gets the number of steps in the track.
    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    /// Gets the track definition this track was compiled from.
    pub fn input(&self) -> &TrackInput {
        &self.input
    }

    /// Gets the playback configuration.
    pub fn playback_config(&self) -> PlaybackConfig {
        self.input.playback_config
    }

    /// The nominal duration of one step, 60000 / BPM milliseconds rounded down.
    /// Very fast tempos floor to zero.
    pub fn step_duration(&self) -> Duration {
        step_duration(self.input.playback_config.bpm)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Steps: {}, BPM: {}, Loop: {})",
            self.name,
            self.steps.len(),
            self.input.playback_config.bpm,
            self.input.playback_config.looping,
        )
    }
}

/// Returns the nominal duration of a step at the given tempo.
pub fn step_duration(bpm: u32) -> Duration {
    match bpm {
        0 => Duration::ZERO,
        bpm => Duration::from_millis(u64::from(60_000 / bpm)),
    }
}

/// Groups the sounds in the track input by step ID, e.g. {1 -> [Kick], 5 -> [Snare, Kick]}.
/// Sounds accumulate in declaration order; a sound assigned twice to one step plays twice.
fn group_by_step_id(input: &TrackInput) -> Result<HashMap<usize, Vec<Sound>>, CompileError> {
    let max = input.number_of_steps;
    let mut sounds_by_step: HashMap<usize, Vec<Sound>> = HashMap::new();

    for pattern in input.patterns.iter() {
        for &index in pattern.steps.iter() {
            if index < 1 || index > max {
                return Err(CompileError::StepIndexOutOfRange { index, max });
            }
            sounds_by_step
                .entry(index)
                .or_default()
                .push(pattern.sound.clone());
        }
    }

    Ok(sounds_by_step)
}
