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
use std::time::Duration;

use super::error::SampleSourceError;

/// A source of audio samples that produces chunks in planar format.
/// Planar format stores all samples for channel 0, then all samples for channel 1, etc.
pub trait SampleSource: Send + Sync {
    /// Get the next chunk of samples from the source in planar format.
    /// Each inner Vec corresponds to one channel and is cleared before being filled with
    /// up to max_frames samples. All channels receive the same number of samples.
    /// Returns the number of frames written (0 = EOF).
    ///
    /// The output slice must have exactly channel_count() elements.
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError>;

    /// Get the number of channels in this source
    fn channel_count(&self) -> u16;

    /// Get the sample rate of this source
    fn sample_rate(&self) -> u32;

    /// Get the duration of this source (if known)
    fn duration(&self) -> Option<Duration>;
}

/// Blanket implementation for Box<dyn SampleSource> so boxed sources can be used with
/// generic functions that require S: SampleSource.
impl SampleSource for Box<dyn SampleSource> {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        (**self).next_chunk(output, max_frames)
    }

    fn channel_count(&self) -> u16 {
        (**self).channel_count()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn duration(&self) -> Option<Duration> {
        (**self).duration()
    }
}

/// Checks that the caller passed one output buffer per channel and clears them.
pub(super) fn prepare_output(
    output: &mut [Vec<f32>],
    channel_count: u16,
) -> Result<(), SampleSourceError> {
    if output.len() != channel_count as usize {
        return Err(SampleSourceError::SampleConversionFailed(format!(
            "Output has {} channels, expected {}",
            output.len(),
            channel_count
        )));
    }
    for channel in output.iter_mut() {
        channel.clear();
    }
    Ok(())
}

/// Splits interleaved samples into the planar output buffers. Returns the number of frames.
pub(super) fn deinterleave_into(interleaved: &[f32], output: &mut [Vec<f32>]) -> usize {
    let channels = output.len();
    if channels == 0 {
        return 0;
    }
    let mut frames = 0;
    for frame in interleaved.chunks_exact(channels) {
        for (channel, sample) in output.iter_mut().zip(frame) {
            channel.push(*sample);
        }
        frames += 1;
    }
    frames
}
