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

use std::{error::Error, path::Path};

use crate::audio::OUTPUT_SAMPLE_RATE;
use crate::config::{Pattern, PlaybackConfig, Sound, TrackInput};

use super::write_wav;

/// Builds a track input from (sound name, path, steps) triples.
pub fn track_input(
    name: &str,
    number_of_steps: usize,
    bpm: u32,
    looping: bool,
    patterns: &[(&str, &str, &[usize])],
) -> TrackInput {
    TrackInput {
        name: name.to_string(),
        number_of_steps,
        playback_config: PlaybackConfig { bpm, looping },
        patterns: patterns
            .iter()
            .map(|(sound, path, steps)| Pattern {
                sound: Sound::new(sound, path),
                steps: steps.to_vec(),
            })
            .collect(),
    }
}

/// Writes a short mono float click made of a constant sample value.
pub fn write_click(
    dir: &Path,
    file_name: &str,
    value: f32,
    frames: usize,
) -> Result<(), Box<dyn Error>> {
    write_wav(
        dir.join(file_name),
        vec![vec![value; frames]],
        OUTPUT_SAMPLE_RATE,
    )
}
