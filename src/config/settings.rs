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
use config::{Config, Environment};
use serde::Deserialize;

use super::error::ConfigError;

const ENV_PREFIX: &str = "DRUMSEQ";
const DEFAULT_DEVICE: &str = "default";
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Player settings, read from DRUMSEQ_* environment variables.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// The audio device. "default" uses the host's default output device, and any name
    /// starting with "mock" selects the mock device.
    device: String,

    /// Chunk size in frames that devices read sounds in (default: 1024).
    buffer_size: usize,
}

impl Settings {
    /// Creates settings for the given device with default values everywhere else.
    pub fn new(device: &str) -> Settings {
        Settings {
            device: device.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Replaces the buffer size.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Settings {
        self.buffer_size = buffer_size;
        self
    }

    /// Loads the settings from the process environment.
    pub fn load() -> Result<Settings, ConfigError> {
        Settings::load_from(Environment::with_prefix(ENV_PREFIX))
    }

    fn load_from(environment: Environment) -> Result<Settings, ConfigError> {
        Ok(Config::builder()
            .set_default("device", DEFAULT_DEVICE)?
            .set_default("buffer_size", DEFAULT_BUFFER_SIZE as i64)?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize::<Settings>()?)
    }

    /// Returns the device name.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the chunk size in frames. Never zero.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size.max(1)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new(DEFAULT_DEVICE)
    }
}
