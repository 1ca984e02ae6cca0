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
use std::fs;
use std::path::Path;

use tracing::debug;

mod error;
mod settings;
mod track;

pub use error::ConfigError;
pub use settings::Settings;
pub use track::{Pattern, PlaybackConfig, Sound, TrackInput};

/// Parses a track definition from a JSON file.
pub fn parse_track(file: &Path) -> Result<TrackInput, ConfigError> {
    let contents = fs::read(file).map_err(|source| ConfigError::Io {
        path: file.to_path_buf(),
        source,
    })?;

    let track: TrackInput =
        serde_json::from_slice(&contents).map_err(|source| ConfigError::Format {
            path: file.to_path_buf(),
            source,
        })?;

    debug!(
        file = %file.display(),
        name = track.name,
        patterns = track.patterns.len(),
        "Parsed track definition."
    );
    Ok(track)
}

/// Parses a track definition from a JSON string.
pub fn parse_track_str(contents: &str) -> Result<TrackInput, serde_json::Error> {
    serde_json::from_str(contents)
}
