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
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, span, warn, Level};

use crate::audio::sample_source::{create_sample_source_from_file, SampleSourceError};
use crate::audio::{Device, SampleSource, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::config::Sound;
use crate::playsync::CancelHandle;
use crate::util;

/// Errors produced while playing a single step. None of them are fatal to playback.
#[derive(Debug, thiserror::Error)]
pub enum MixerError {
    #[error("unable to open sound {name} ({}): {source}", path.display())]
    Open {
        name: String,
        path: PathBuf,
        #[source]
        source: SampleSourceError,
    },

    #[error("audio device failed: {0}")]
    Device(String),
}

/// The result of playing a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step had no sounds, so nothing was sent to the device.
    Silent,
    /// The given number of sounds were mixed and played.
    Played { sounds: usize },
}

/// Plays the sounds of a step simultaneously through an audio device.
pub struct AudioMixer {
    device: Arc<dyn Device>,
    base_directory: PathBuf,
    buffer_size: usize,
}

impl AudioMixer {
    /// Creates a new mixer. Sound paths are resolved against the base directory.
    pub fn new(
        device: Arc<dyn Device>,
        base_directory: &Path,
        buffer_size: usize,
    ) -> AudioMixer {
        AudioMixer {
            device,
            base_directory: base_directory.to_path_buf(),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Opens every sound, mixes them into one composite signal and blocks until the device
    /// has played it out. All opened files are released before this returns, whether or not
    /// playback succeeded.
    pub fn play_step(
        &self,
        sounds: &[Sound],
        cancel_handle: &CancelHandle,
    ) -> Result<StepOutcome, MixerError> {
        if sounds.is_empty() {
            return Ok(StepOutcome::Silent);
        }

        let span = span!(Level::DEBUG, "play step", sounds = sounds.len());
        let _enter = span.enter();

        // If any sound fails to open, the ones already opened are dropped with the vec.
        let sources = sounds
            .iter()
            .map(|sound| self.open(sound))
            .collect::<Result<Vec<_>, _>>()?;

        let composite = CompositeSource::new(sources);
        debug!(
            duration = format!("{:?}", composite.duration().unwrap_or_default()),
            "Mixed step."
        );
        self.device
            .play(Box::new(composite), cancel_handle)
            .map_err(|e| MixerError::Device(e.to_string()))?;

        Ok(StepOutcome::Played {
            sounds: sounds.len(),
        })
    }

    fn open(&self, sound: &Sound) -> Result<Box<dyn SampleSource>, MixerError> {
        let path = util::resolve(&self.base_directory, &sound.path_to_file);
        let source = create_sample_source_from_file(&path, self.buffer_size).map_err(|source| {
            MixerError::Open {
                name: sound.name.clone(),
                path: path.clone(),
                source,
            }
        })?;

        if source.sample_rate() != OUTPUT_SAMPLE_RATE {
            debug!(
                sound = sound.name,
                sample_rate = source.sample_rate(),
                "Sound will play without resampling."
            );
        }
        Ok(source)
    }
}

/// A source being summed into the composite signal.
struct MixedSource {
    source: Box<dyn SampleSource>,
    /// Scratch space for one chunk, one vec per source channel.
    buffer: Vec<Vec<f32>>,
    /// Precomputed output channels for each source channel. Mono feeds both outputs, and
    /// anything past the second channel is dropped.
    channel_mappings: Vec<Vec<usize>>,
    is_finished: bool,
}

impl MixedSource {
    fn new(source: Box<dyn SampleSource>) -> MixedSource {
        let source_channels = source.channel_count() as usize;
        let channel_mappings = (0..source_channels)
            .map(|channel| {
                if source_channels == 1 {
                    (0..OUTPUT_CHANNELS as usize).collect()
                } else if channel < OUTPUT_CHANNELS as usize {
                    vec![channel]
                } else {
                    Vec::new()
                }
            })
            .collect();

        MixedSource {
            source,
            buffer: vec![Vec::new(); source_channels],
            channel_mappings,
            is_finished: false,
        }
    }
}

/// Sums several sources into a single stereo signal. The composite ends once every
/// source has ended.
pub struct CompositeSource {
    sources: Vec<MixedSource>,
}

impl CompositeSource {
    pub fn new(sources: Vec<Box<dyn SampleSource>>) -> CompositeSource {
        CompositeSource {
            sources: sources.into_iter().map(MixedSource::new).collect(),
        }
    }
}

impl SampleSource for CompositeSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        if output.len() != OUTPUT_CHANNELS as usize {
            return Err(SampleSourceError::SampleConversionFailed(format!(
                "Output has {} channels, expected {}",
                output.len(),
                OUTPUT_CHANNELS
            )));
        }
        for channel in output.iter_mut() {
            channel.clear();
            channel.resize(max_frames, 0.0);
        }

        let mut frames = 0;
        for mixed in self.sources.iter_mut().filter(|mixed| !mixed.is_finished) {
            let read = match mixed.source.next_chunk(&mut mixed.buffer, max_frames) {
                Ok(read) => read,
                Err(e) => {
                    warn!(err = e.to_string(), "Sound failed mid-step, dropping it.");
                    0
                }
            };
            if read == 0 {
                mixed.is_finished = true;
                continue;
            }

            frames = frames.max(read);
            for (source_channel, output_channels) in mixed.channel_mappings.iter().enumerate() {
                let input = &mixed.buffer[source_channel][..read];
                for &output_channel in output_channels {
                    for (out, sample) in output[output_channel].iter_mut().zip(input) {
                        *out += *sample;
                    }
                }
            }
        }

        for channel in output.iter_mut() {
            channel.truncate(frames);
        }
        Ok(frames)
    }

    fn channel_count(&self) -> u16 {
        OUTPUT_CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        OUTPUT_SAMPLE_RATE
    }

    fn duration(&self) -> Option<Duration> {
        self.sources
            .iter()
            .map(|mixed| mixed.source.duration())
            .try_fold(Duration::ZERO, |longest, duration| {
                duration.map(|duration| longest.max(duration))
            })
    }
}
