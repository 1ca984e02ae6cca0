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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, span, Level};

use crate::audio::{Device as AudioDevice, SampleSource, OUTPUT_SAMPLE_RATE};
use crate::playsync::CancelHandle;

/// Blocks that may be queued ahead of the stream.
const QUEUED_BLOCKS: usize = 8;

/// A small wrapper around a cpal::Device that owns a running output stream.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The number of channels the output stream was opened with.
    channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The output stream manager for continuous playback.
    output_manager: OutputManager,
}

/// A source handed to the producer thread, along with where to report completion.
struct PlayRequest {
    source: Box<dyn SampleSource>,
    cancel_handle: CancelHandle,
    done_tx: Sender<Result<(), String>>,
}

/// Manages the continuous output stream. Sources are submitted to a producer thread that
/// converts them into interleaved blocks for the stream callback.
struct OutputManager {
    /// Channel for submitting new sources to play.
    request_tx: Option<Sender<PlayRequest>>,
    /// Dropping this tells the output thread to close the stream.
    shutdown_tx: Option<Sender<()>>,
    /// Handle to the output thread (keeps the stream alive).
    output_thread: Option<thread::JoinHandle<()>>,
    /// Handle to the producer thread.
    producer_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.channels,
            self.host_id.name()
        )
    }
}

/// Creates a stream callback that copies queued blocks into the device buffer, converting
/// to the device's sample type and zero filling any shortfall.
fn create_output_callback<T>(
    block_rx: Receiver<Vec<f32>>,
    consumed: Arc<AtomicU64>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    let mut pending: Vec<f32> = Vec::new();
    let mut position = 0;
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        let mut written = 0;
        while written < data.len() {
            if position >= pending.len() {
                match block_rx.try_recv() {
                    Ok(block) => {
                        pending = block;
                        position = 0;
                        continue;
                    }
                    Err(_) => break,
                }
            }

            let count = (pending.len() - position).min(data.len() - written);
            for (dst, src) in data[written..written + count]
                .iter_mut()
                .zip(&pending[position..position + count])
            {
                *dst = T::from_sample(*src);
            }
            written += count;
            position += count;
        }

        data[written..].fill(T::EQUILIBRIUM);
        consumed.fetch_add(written as u64, Ordering::Release);
    }
}

/// Spreads one planar chunk across the device's channels. Mono sources play on both
/// sides, mono devices get the average of left and right, and device channels past the
/// second stay silent.
fn interleave_block(chunk: &[Vec<f32>], frames: usize, device_channels: usize) -> Vec<f32> {
    let mut block = vec![0.0f32; frames * device_channels];
    let Some(left_channel) = chunk.first() else {
        return block;
    };
    let right_channel = chunk.get(1).unwrap_or(left_channel);
    for (frame, samples) in block.chunks_exact_mut(device_channels).enumerate() {
        let left = left_channel[frame];
        let right = right_channel[frame];
        if device_channels == 1 {
            samples[0] = (left + right) / 2.0;
        } else {
            samples[0] = left;
            samples[1] = right;
        }
    }
    block
}

impl Drop for OutputManager {
    fn drop(&mut self) {
        // Closing the request channel stops the producer once it's idle, and closing the
        // shutdown channel makes the output thread drop the stream.
        self.request_tx.take();
        self.shutdown_tx.take();

        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
        if let Some(thread) = self.producer_thread.take() {
            let _ = thread.join();
        }
    }
}

impl OutputManager {
    /// Opens the output stream on the device and starts the producer and output threads.
    fn start(
        device: cpal::Device,
        config: cpal::SupportedStreamConfig,
        block_frames: usize,
    ) -> Result<Self, Box<dyn Error>> {
        let sample_format = config.sample_format();
        let mut stream_config: cpal::StreamConfig = config.config();
        stream_config.sample_rate = OUTPUT_SAMPLE_RATE;
        let device_channels = stream_config.channels as usize;

        let (request_tx, request_rx) = crossbeam_channel::unbounded::<PlayRequest>();
        let (block_tx, block_rx) = crossbeam_channel::bounded::<Vec<f32>>(QUEUED_BLOCKS);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let consumed = Arc::new(AtomicU64::new(0));

        // The stream is not Send on every platform, so it's created and kept on its own
        // thread.
        let output_thread = {
            let consumed = consumed.clone();
            thread::spawn(move || {
                let err_fn = |err: cpal::StreamError| error!("CPAL output stream error: {}", err);
                let stream_result = match sample_format {
                    cpal::SampleFormat::F32 => device.build_output_stream(
                        &stream_config,
                        create_output_callback::<f32>(block_rx, consumed),
                        err_fn,
                        None,
                    ),
                    cpal::SampleFormat::I16 => device.build_output_stream(
                        &stream_config,
                        create_output_callback::<i16>(block_rx, consumed),
                        err_fn,
                        None,
                    ),
                    cpal::SampleFormat::I32 => device.build_output_stream(
                        &stream_config,
                        create_output_callback::<i32>(block_rx, consumed),
                        err_fn,
                        None,
                    ),
                    cpal::SampleFormat::U16 => device.build_output_stream(
                        &stream_config,
                        create_output_callback::<u16>(block_rx, consumed),
                        err_fn,
                        None,
                    ),
                    other => {
                        let _ = ready_tx.send(Err(format!("unsupported sample format {:?}", other)));
                        return;
                    }
                };

                let stream = match stream_result {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("failed to create CPAL stream: {}", e)));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(format!("failed to start CPAL stream: {}", e)));
                    return;
                }
                info!("CPAL output stream started successfully");
                let _ = ready_tx.send(Ok(()));

                // Keep the stream alive until the manager goes away.
                let _ = shutdown_rx.recv();
            })
        };

        if let Err(e) = ready_rx.recv()? {
            let _ = output_thread.join();
            return Err(e.into());
        }

        let producer_thread = thread::spawn(move || {
            let mut produced: u64 = 0;
            for request in request_rx.iter() {
                let result = Self::produce(
                    request.source,
                    &request.cancel_handle,
                    device_channels,
                    block_frames,
                    &block_tx,
                    &mut produced,
                );
                // The source has been dropped by now, so wait for the queued audio to drain.
                while result.is_ok()
                    && consumed.load(Ordering::Acquire) < produced
                    && !request.cancel_handle.is_cancelled()
                {
                    thread::sleep(Duration::from_millis(1));
                }
                let _ = request.done_tx.send(result);
            }
        });

        Ok(OutputManager {
            request_tx: Some(request_tx),
            shutdown_tx: Some(shutdown_tx),
            output_thread: Some(output_thread),
            producer_thread: Some(producer_thread),
        })
    }

    /// Reads the source to the end, queueing blocks for the stream. Consumes the source so
    /// that it's released as soon as it's exhausted.
    fn produce(
        mut source: Box<dyn SampleSource>,
        cancel_handle: &CancelHandle,
        device_channels: usize,
        block_frames: usize,
        block_tx: &Sender<Vec<f32>>,
        produced: &mut u64,
    ) -> Result<(), String> {
        let mut chunk = vec![Vec::new(); source.channel_count() as usize];
        while !cancel_handle.is_cancelled() {
            let frames = source
                .next_chunk(&mut chunk, block_frames)
                .map_err(|e| e.to_string())?;
            if frames == 0 {
                break;
            }

            let block = interleave_block(&chunk, frames, device_channels);
            *produced += block.len() as u64;
            block_tx
                .send(block)
                .map_err(|_| "output stream has stopped".to_string())?;
        }
        Ok(())
    }

    /// Submits a source and blocks until it has played out or been cancelled.
    fn play(
        &self,
        source: Box<dyn SampleSource>,
        cancel_handle: &CancelHandle,
    ) -> Result<(), Box<dyn Error>> {
        let request_tx = self
            .request_tx
            .as_ref()
            .ok_or("output manager is shut down")?;
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        request_tx.send(PlayRequest {
            source,
            cancel_handle: cancel_handle.clone(),
            done_tx,
        })?;

        done_rx.recv()?.map_err(|e| e.into())
    }
}

impl Device {
    /// Gets the given cpal device. "default" selects the default output device of the
    /// default host. Sources are read and queued in blocks of buffer_size frames.
    pub fn get(name: &str, buffer_size: usize) -> Result<Device, Box<dyn Error>> {
        let (host_id, device) = if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device found")?;
            (host.id(), device)
        } else {
            Device::find_cpal_device(name)?
                .ok_or_else(|| format!("no device found with name {}", name))?
        };

        let config = device.default_output_config()?;
        let device_name = device.name().unwrap_or_else(|_| name.to_string());
        let channels = config.channels();
        info!(
            device = device_name,
            host = host_id.name(),
            channels,
            buffer_size,
            "Opening audio device."
        );

        Ok(Device {
            name: device_name,
            channels,
            host_id,
            output_manager: OutputManager::start(device, config, buffer_size.max(1))?,
        })
    }

    /// Searches every host for an output device with the given name.
    fn find_cpal_device(
        name: &str,
    ) -> Result<Option<(cpal::HostId, cpal::Device)>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                if device.name().is_ok_and(|device_name| device_name.trim() == name) {
                    return Ok(Some((host_id, device)));
                }
            }
        }

        Ok(None)
    }
}

impl AudioDevice for Device {
    fn play(
        &self,
        source: Box<dyn SampleSource>,
        cancel_handle: &CancelHandle,
    ) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::DEBUG, "play (cpal)");
        let _enter = span.enter();

        self.output_manager.play(source, cancel_handle)
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}
