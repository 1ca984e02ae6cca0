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
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::warn;

use super::error::SampleSourceError;
use super::traits::{deinterleave_into, prepare_output, SampleSource};

/// A sample source that decodes audio files (MP3, FLAC, OGG, etc.) through symphonia.
pub struct AudioSampleSource {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    is_finished: bool,
    // Interleaved samples decoded but not yet handed out.
    pending: Vec<f32>,
    channels: u16,
    sample_rate: u32,
    duration: Option<Duration>,
}

impl SampleSource for AudioSampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        prepare_output(output, self.channels)?;

        let channels = self.channels as usize;
        let wanted = max_frames * channels;
        while !self.is_finished && self.pending.len() < wanted {
            if !self.decode_next_packet()? {
                self.is_finished = true;
            }
        }

        let available = self.pending.len() - self.pending.len() % channels;
        let take = wanted.min(available);
        let frames = deinterleave_into(&self.pending[..take], output);
        self.pending.drain(..take);
        Ok(frames)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

impl AudioSampleSource {
    /// Opens and probes an audio file.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> Result<Self, SampleSourceError> {
        // Include the path in the error so the user sees which file failed.
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            SampleSourceError::IoError(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                SampleSourceError::SampleConversionFailed(format!("'{}': {}", path.display(), e))
            })?;
        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                SampleSourceError::SampleConversionFailed(format!(
                    "'{}': no audio track found",
                    path.display()
                ))
            })?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params.sample_rate.ok_or_else(|| {
            SampleSourceError::SampleConversionFailed(format!(
                "'{}': sample rate not specified",
                path.display()
            ))
        })?;
        let duration = params
            .n_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / f64::from(sample_rate)));
        let decoder = get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| {
                SampleSourceError::SampleConversionFailed(format!("'{}': {}", path.display(), e))
            })?;

        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);
        let mut source = Self {
            format_reader,
            decoder,
            track_id,
            is_finished: false,
            pending: Vec::with_capacity(buffer_size * usize::from(channels.max(1))),
            channels,
            sample_rate,
            duration,
        };

        // Some containers don't report a channel layout. Decode the first packet to find out.
        if source.channels == 0 && !source.decode_next_packet()? {
            source.is_finished = true;
        }
        if source.channels == 0 {
            return Err(SampleSourceError::SampleConversionFailed(format!(
                "'{}': unable to determine channel count",
                path.display()
            )));
        }

        Ok(source)
    }

    /// Decodes the next packet of this source's track into the pending buffer. Returns
    /// false at the end of the stream.
    fn decode_next_packet(&mut self) -> Result<bool, SampleSourceError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(err)) => {
                    warn!(err, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            if self.channels == 0 {
                self.channels = spec.channels.count() as u16;
            }
            self.pending.extend_from_slice(buffer.samples());
            return Ok(true);
        }
    }
}
