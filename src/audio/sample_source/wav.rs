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
use hound::WavReader;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use super::error::SampleSourceError;
use super::traits::{deinterleave_into, prepare_output, SampleSource};

/// A sample source that reads WAV files and provides scaled samples.
pub struct WavSampleSource {
    wav_reader: WavReader<BufReader<std::fs::File>>,
    is_finished: bool,
    // Interleaved scratch space for a single chunk.
    interleaved: Vec<f32>,
    bits_per_sample: u16,
    channels: u16,
    sample_rate: u32,
    sample_format: hound::SampleFormat,
    duration: Duration,
}

impl SampleSource for WavSampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        prepare_output(output, self.channels)?;
        if self.is_finished || max_frames == 0 {
            return Ok(0);
        }

        let wanted = max_frames * self.channels as usize;
        self.interleaved.clear();

        // Read samples in the correct format based on the WAV file's actual format
        match self.sample_format {
            hound::SampleFormat::Float => {
                for sample in self.wav_reader.samples::<f32>().take(wanted) {
                    self.interleaved.push(sample?);
                }
            }
            hound::SampleFormat::Int => {
                // Use i64 to avoid overflow for 32-bit samples
                let scale_factor = 1.0 / (1i64 << (self.bits_per_sample - 1)) as f32;
                for sample in self.wav_reader.samples::<i32>().take(wanted) {
                    self.interleaved.push(sample? as f32 * scale_factor);
                }
            }
        }

        let frames = deinterleave_into(&self.interleaved, output);
        if frames == 0 {
            self.is_finished = true;
        }
        Ok(frames)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        Some(self.duration)
    }
}

impl WavSampleSource {
    /// Creates a new WAV sample source from a file path
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> Result<Self, SampleSourceError> {
        let wav_reader = WavReader::open(&path)?;
        let spec = wav_reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(SampleSourceError::SampleConversionFailed(format!(
                "'{}': invalid WAV header",
                path.as_ref().display()
            )));
        }
        let duration = Duration::from_secs_f64(
            f64::from(wav_reader.duration()) / f64::from(spec.sample_rate),
        );

        Ok(Self {
            wav_reader,
            is_finished: false,
            interleaved: Vec::with_capacity(buffer_size * spec.channels as usize),
            bits_per_sample: spec.bits_per_sample,
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            sample_format: spec.sample_format,
            duration,
        })
    }
}
