// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use serde::Deserialize;

/// A JSON representation of a track. Absent fields fall back to their zero values so
/// that the track compiler, not the parser, reports what's missing.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct TrackInput {
    /// The name of the track.
    pub name: String,
    /// The number of steps in the track.
    pub number_of_steps: usize,
    /// The tempo and looping configuration.
    pub playback_config: PlaybackConfig,
    /// The sound patterns, in declaration order.
    pub patterns: Vec<Pattern>,
}

/// Configuration for playing a track back.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct PlaybackConfig {
    /// The beats per minute. Each step lasts one beat.
    pub bpm: u32,
    /// Whether to continuously loop the track.
    #[serde(rename = "Loop")]
    pub looping: bool,
}

/// A sound and the 1-based steps it triggers on.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct Pattern {
    /// The sound to trigger.
    pub sound: Sound,
    /// The steps to trigger the sound on.
    pub steps: Vec<usize>,
}

/// A named sound and the path to its audio file.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[serde(default, rename_all = "PascalCase")]
pub struct Sound {
    /// The name of the sound, e.g. "Hi Hat".
    pub name: String,
    /// The path to the audio file, relative to the base directory.
    pub path_to_file: String,
}

impl Sound {
    /// Creates a new sound.
    pub fn new(name: &str, path_to_file: &str) -> Sound {
        Sound {
            name: name.to_string(),
            path_to_file: path_to_file.to_string(),
        }
    }
}

impl Pattern {
    /// Returns true if the pattern triggers on the given step.
    pub fn triggers_on(&self, step_id: usize) -> bool {
        self.steps.contains(&step_id)
    }
}
