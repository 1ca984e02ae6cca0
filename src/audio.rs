// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
use std::any::Any;
use std::{error::Error, fmt, sync::Arc};

use crate::config::Settings;
use crate::playsync::CancelHandle;

pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod sample_source;

pub use mixer::{AudioMixer, MixerError, StepOutcome};
pub use sample_source::SampleSource;

/// The sample rate every sound is assumed to be recorded at. Sources are not resampled.
pub const OUTPUT_SAMPLE_RATE: u32 = 44100;

/// Composite signals are always stereo.
pub const OUTPUT_CHANNELS: u16 = 2;

/// An audio output device. Initialized once per process and shared by reference.
pub trait Device: Any + fmt::Display + std::marker::Send + std::marker::Sync {
    /// Plays the given source through the audio interface, blocking until it has played out
    /// completely or until the cancel handle is cancelled. The source is released by the
    /// time this returns.
    fn play(
        &self,
        source: Box<dyn SampleSource>,
        cancel_handle: &CancelHandle,
    ) -> Result<(), Box<dyn Error>>;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Gets the device named in the settings. Devices read sources in chunks of the configured
/// buffer size.
pub fn get_device(settings: &Settings) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = settings.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device, settings.buffer_size())));
    };

    Ok(Arc::new(cpal::Device::get(device, settings.buffer_size())?))
}
