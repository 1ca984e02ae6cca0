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
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc, Arc, Mutex,
    },
    thread,
    time::Duration,
};

use tracing::{info, span, Level};

use crate::audio::SampleSource;
use crate::playsync::CancelHandle;

/// What the mock device saw of a single played source.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayRecord {
    pub channels: u16,
    pub frames: usize,
    /// The number of non-empty chunks the source was read in.
    pub chunks: usize,
    /// The largest absolute sample value across all channels.
    pub peak: f32,
}

/// A mock device. Drains each source without producing any sound.
#[derive(Clone)]
pub struct Device {
    name: String,
    /// Frames read from the source per chunk.
    buffer_size: usize,
    is_playing: Arc<AtomicBool>,
    plays: Arc<Mutex<Vec<PlayRecord>>>,
    /// How long each play call blocks for, in milliseconds.
    play_millis: Arc<AtomicU64>,
    failing: Arc<AtomicBool>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, buffer_size: usize) -> Device {
        Device {
            name: name.to_string(),
            buffer_size: buffer_size.max(1),
            is_playing: Arc::new(AtomicBool::new(false)),
            plays: Arc::new(Mutex::new(Vec::new())),
            play_millis: Arc::new(AtomicU64::new(0)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true if the device is currently playing.
    #[cfg(test)]
    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }

    /// Returns the number of sources played so far.
    #[cfg(test)]
    pub fn play_count(&self) -> usize {
        self.plays.lock().expect("Error getting lock").len()
    }

    /// Returns a record of every source played so far.
    #[cfg(test)]
    pub fn records(&self) -> Vec<PlayRecord> {
        self.plays.lock().expect("Error getting lock").clone()
    }

    /// Makes every play call block for the given duration, as a real device would while
    /// the audio drains.
    #[cfg(test)]
    pub fn set_play_duration(&self, duration: Duration) {
        self.play_millis
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Makes every play call fail.
    #[cfg(test)]
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

impl crate::audio::Device for Device {
    /// Reads the source to the end, then sleeps for the configured play duration or until
    /// cancelled.
    fn play(
        &self,
        mut source: Box<dyn SampleSource>,
        cancel_handle: &CancelHandle,
    ) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "play (mock)");
        let _enter = span.enter();

        if self.failing.load(Ordering::Relaxed) {
            return Err(format!("{} is failing", self).into());
        }

        let channels = source.channel_count();
        let mut output = vec![Vec::new(); channels as usize];
        let mut record = PlayRecord {
            channels,
            frames: 0,
            chunks: 0,
            peak: 0.0,
        };
        loop {
            let frames = source.next_chunk(&mut output, self.buffer_size)?;
            if frames == 0 {
                break;
            }
            record.frames += frames;
            record.chunks += 1;
            record.peak = output
                .iter()
                .flatten()
                .fold(record.peak, |peak, sample| peak.max(sample.abs()));
        }
        drop(source);

        info!(
            device = self.name,
            channels = record.channels,
            frames = record.frames,
            "Playing source."
        );
        self.plays
            .lock()
            .expect("Error getting lock")
            .push(record);

        let play_duration = Duration::from_millis(self.play_millis.load(Ordering::Relaxed));
        let (sleep_tx, sleep_rx) = mpsc::channel::<()>();

        self.is_playing.store(true, Ordering::Relaxed);
        let finished = Arc::new(AtomicBool::new(false));
        let join_handle = {
            let cancel_handle = cancel_handle.clone();
            let finished = finished.clone();
            // Wait until playback is cancelled or until the play duration has passed.
            thread::spawn(move || {
                let _ = sleep_rx.recv_timeout(play_duration);

                finished.store(true, Ordering::Relaxed);
                cancel_handle.notify();
            })
        };

        cancel_handle.wait(finished);
        // The sleeper may already be gone, in which case there's nothing to wake.
        let _ = sleep_tx.send(());
        let join_result = join_handle.join();

        self.is_playing.store(false, Ordering::Relaxed);

        if join_result.is_err() {
            return Err("Error while joining thread!".into());
        }

        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
