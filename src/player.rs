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
    io::Write,
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{info, span, warn, Level};

use crate::audio::{AudioMixer, StepOutcome};
use crate::playsync::CancelHandle;
use crate::timeline::StepTimeline;
use crate::track::Track;
use crate::visualizer::Visualizer;

/// Where the player is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Running,
    /// Playback stopped because a frame couldn't be drawn.
    Failed,
    /// A one-shot track played its last step.
    Finished,
    /// Playback was stopped through the cancel handle.
    Cancelled,
}

/// A summary of a playback session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackReport {
    /// The number of steps rendered and triggered.
    pub iterations: usize,
    /// Steps that sent audio to the device.
    pub played: usize,
    /// Steps that were silenced because their audio failed.
    pub skipped: usize,
    pub state: PlayerState,
}

/// Plays a compiled track in real time, keeping the visualizer in step with the audio.
pub struct Player<W: Write> {
    mixer: AudioMixer,
    visualizer: Visualizer<W>,
    state: PlayerState,
}

impl<W: Write> Player<W> {
    /// Creates a new player.
    pub fn new(mixer: AudioMixer, visualizer: Visualizer<W>) -> Player<W> {
        Player {
            mixer,
            visualizer,
            state: PlayerState::Idle,
        }
    }

    /// Gets the current state of the player.
    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// Plays the track. One-shot tracks return after their last step; looping tracks
    /// return only once the cancel handle is cancelled. Audio failures silence their step
    /// and playback carries on, while a failure to draw the frame ends playback.
    pub fn play(
        &mut self,
        track: Arc<Track>,
        cancel_handle: &CancelHandle,
    ) -> Result<PlaybackReport, Box<dyn Error>> {
        let span = span!(Level::INFO, "play track", track = track.name());
        let _enter = span.enter();

        let playback_config = track.playback_config();
        let nominal = track.step_duration();
        info!(
            steps = track.num_steps(),
            bpm = playback_config.bpm,
            looping = playback_config.looping,
            "Playing track."
        );

        let mut report = PlaybackReport {
            iterations: 0,
            played: 0,
            skipped: 0,
            state: PlayerState::Running,
        };
        self.state = PlayerState::Running;

        let mut timeline = StepTimeline::new(track.clone());
        let mut step = timeline.current();
        loop {
            if cancel_handle.is_cancelled() {
                report.state = PlayerState::Cancelled;
                break;
            }

            let start = Instant::now();
            report.iterations += 1;

            if let Err(e) = self.visualizer.render(&track, step.id) {
                self.state = PlayerState::Failed;
                return Err(e.into());
            }

            match self.mixer.play_step(&step.sounds, cancel_handle) {
                Ok(StepOutcome::Played { .. }) => report.played += 1,
                Ok(StepOutcome::Silent) => {}
                Err(e) => {
                    warn!(step = step.id, err = e.to_string(), "Step skipped.");
                    report.skipped += 1;
                }
            }

            if !playback_config.looping && step.id == track.num_steps() {
                report.state = PlayerState::Finished;
                break;
            }

            step = timeline.advance();
            let remaining = sleep_for(nominal, start.elapsed());
            if !remaining.is_zero() {
                spin_sleep::sleep(remaining);
            }
        }

        self.state = report.state;
        info!(
            iterations = report.iterations,
            played = report.played,
            skipped = report.skipped,
            state = format!("{:?}", report.state),
            "Playback stopped."
        );
        Ok(report)
    }
}

/// Returns how long to sleep so that a step lasts its nominal duration, given how long
/// rendering and triggering already took.
pub fn sleep_for(nominal: Duration, elapsed: Duration) -> Duration {
    nominal.saturating_sub(elapsed)
}

#[cfg(test)]
mod test {
    use std::{
        error::Error,
        io,
        path::Path,
        sync::{Arc, Mutex},
        thread,
        time::{Duration, Instant},
    };

    use crate::audio::{self, mock, AudioMixer};
    use crate::config::Settings;
    use crate::playsync::CancelHandle;
    use crate::testutil::{eventually, track_input, write_click};
    use crate::track::Track;
    use crate::visualizer::Visualizer;

    use super::*;

    fn player(device: Arc<dyn audio::Device>, base: &Path) -> Player<Vec<u8>> {
        Player::new(
            AudioMixer::new(device, base, 256),
            Visualizer::new(Vec::new()),
        )
    }

    #[test]
    fn test_sleep_for() {
        let nominal = Duration::from_millis(1000);
        assert_eq!(
            Duration::from_millis(750),
            sleep_for(nominal, Duration::from_millis(250))
        );
        assert_eq!(Duration::ZERO, sleep_for(nominal, Duration::from_millis(1000)));
        assert_eq!(Duration::ZERO, sleep_for(nominal, Duration::from_millis(1200)));
        assert_eq!(Duration::ZERO, sleep_for(Duration::ZERO, Duration::ZERO));
    }

    #[test]
    fn test_play_one_shot() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        write_click(tempdir.path(), "kick.wav", 0.5, 64)?;
        let track = Arc::new(Track::compile(track_input(
            "One Shot",
            4,
            60_000,
            false,
            &[("Kick", "/kick.wav", &[1, 3])],
        ))?);

        let device = audio::get_device(&Settings::new("mock-one-shot"))?;
        let mut player = player(device.clone(), tempdir.path());
        assert_eq!(PlayerState::Idle, player.state());

        let report = player.play(track, &CancelHandle::new())?;
        assert_eq!(
            PlaybackReport {
                iterations: 4,
                played: 2,
                skipped: 0,
                state: PlayerState::Finished,
            },
            report
        );
        assert_eq!(PlayerState::Finished, player.state());
        assert_eq!(2, device.to_mock()?.play_count());
        Ok(())
    }

    #[test]
    fn test_play_skips_missing_sound() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        write_click(tempdir.path(), "kick.wav", 0.5, 64)?;
        let track = Arc::new(Track::compile(track_input(
            "Missing",
            3,
            60_000,
            false,
            &[
                ("Kick", "kick.wav", &[1, 3]),
                ("Cowbell", "cowbell.wav", &[2]),
            ],
        ))?);

        let device = audio::get_device(&Settings::new("mock-missing"))?;
        let report = player(device.clone(), tempdir.path()).play(track, &CancelHandle::new())?;

        assert_eq!(3, report.iterations);
        assert_eq!(2, report.played);
        assert_eq!(1, report.skipped);
        assert_eq!(PlayerState::Finished, report.state);
        assert_eq!(2, device.to_mock()?.play_count());
        Ok(())
    }

    #[test]
    fn test_play_device_failure_continues() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        write_click(tempdir.path(), "kick.wav", 0.5, 64)?;
        let track = Arc::new(Track::compile(track_input(
            "Broken",
            2,
            60_000,
            false,
            &[("Kick", "kick.wav", &[1, 2])],
        ))?);

        let device = Arc::new(mock::Device::get("mock-broken", 256));
        device.set_failing(true);
        let report = player(device, tempdir.path()).play(track, &CancelHandle::new())?;

        assert_eq!(2, report.iterations);
        assert_eq!(2, report.skipped);
        assert_eq!(PlayerState::Finished, report.state);
        Ok(())
    }

    #[test]
    fn test_play_looping_until_cancelled() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        write_click(tempdir.path(), "kick.wav", 0.5, 64)?;
        let track = Arc::new(Track::compile(track_input(
            "Loop",
            2,
            6_000,
            true,
            &[("Kick", "kick.wav", &[1])],
        ))?);

        let device = audio::get_device(&Settings::new("mock-loop"))?;
        let mock = device.to_mock()?;
        let cancel_handle = CancelHandle::new();
        let join_handle = {
            let mut player = player(device, tempdir.path());
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                player
                    .play(track, &cancel_handle)
                    .map_err(|e| e.to_string())
            })
        };

        // Three plays of step one means the track wrapped at least twice.
        eventually(|| mock.play_count() >= 3, "Track never looped");
        cancel_handle.cancel();

        let report = join_handle.join().expect("join")?;
        assert_eq!(PlayerState::Cancelled, report.state);
        assert!(report.iterations >= 5);
        assert_eq!(report.played, mock.play_count());
        Ok(())
    }

    #[test]
    fn test_play_cancelled_before_start() -> Result<(), Box<dyn Error>> {
        let track = Arc::new(Track::compile(track_input("Idle", 2, 120, true, &[]))?);
        let device = audio::get_device(&Settings::new("mock-idle"))?;
        let cancel_handle = CancelHandle::new();
        cancel_handle.cancel();

        let report = player(device, Path::new("/")).play(track, &cancel_handle)?;
        assert_eq!(0, report.iterations);
        assert_eq!(PlayerState::Cancelled, report.state);
        Ok(())
    }

    #[test]
    fn test_play_corrects_drift() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        write_click(tempdir.path(), "kick.wav", 0.5, 64)?;
        // 200ms steps, each spending 100ms blocked on the device.
        let track = Arc::new(Track::compile(track_input(
            "Drift",
            3,
            300,
            false,
            &[("Kick", "kick.wav", &[1, 2, 3])],
        ))?);

        let device = Arc::new(mock::Device::get("mock-drift", 256));
        device.set_play_duration(Duration::from_millis(100));

        let start = Instant::now();
        let report = player(device, tempdir.path()).play(track, &CancelHandle::new())?;
        let elapsed = start.elapsed();

        assert_eq!(3, report.played);
        // Two full steps plus the last step's audio; no sleep after the last step.
        assert!(elapsed >= Duration::from_millis(480), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(650), "{:?}", elapsed);
        Ok(())
    }

    #[test]
    fn test_play_one_shot_ends_without_sleeping() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        write_click(tempdir.path(), "kick.wav", 0.5, 64)?;
        // A single one second step.
        let track = Arc::new(Track::compile(track_input(
            "Single",
            1,
            60,
            false,
            &[("Kick", "kick.wav", &[1])],
        ))?);

        let device = audio::get_device(&Settings::new("mock-single"))?;
        let start = Instant::now();
        let report = player(device, tempdir.path()).play(track, &CancelHandle::new())?;
        let elapsed = start.elapsed();

        assert_eq!(1, report.iterations);
        assert_eq!(PlayerState::Finished, report.state);
        assert!(elapsed < Duration::from_millis(500), "{:?}", elapsed);
        Ok(())
    }

    /// A terminal that can be inspected after the player that owns it is gone.
    #[derive(Clone, Default)]
    struct SharedTerminal(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedTerminal {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("Error getting lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_cancelled_loop_restores_cursor() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        write_click(tempdir.path(), "kick.wav", 0.5, 64)?;
        let track = Arc::new(Track::compile(track_input(
            "Forever",
            2,
            6_000,
            true,
            &[("Kick", "kick.wav", &[1, 2])],
        ))?);

        let device = audio::get_device(&Settings::new("mock-forever"))?;
        let mock = device.to_mock()?;
        let terminal = SharedTerminal::default();
        let cancel_handle = CancelHandle::new();
        let join_handle = {
            let mut player = Player::new(
                AudioMixer::new(device, tempdir.path(), 256),
                Visualizer::new(terminal.clone()),
            );
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                player
                    .play(track, &cancel_handle)
                    .map(|report| report.state)
                    .map_err(|e| e.to_string())
            })
        };

        eventually(|| mock.play_count() >= 2, "Track never played");
        cancel_handle.cancel();
        assert_eq!(PlayerState::Cancelled, join_handle.join().expect("join")?);

        let written = String::from_utf8(terminal.0.lock().expect("Error getting lock").clone())?;
        assert!(written.contains("\x1b[?25l"));
        assert!(written.ends_with("\x1b[?25h"));
        Ok(())
    }

    struct BrokenTerminal;

    impl io::Write for BrokenTerminal {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_play_render_failure_is_fatal() -> Result<(), Box<dyn Error>> {
        let track = Arc::new(Track::compile(track_input("Dark", 2, 120, true, &[]))?);
        let device = audio::get_device(&Settings::new("mock-dark"))?;
        let mut player = Player::new(
            AudioMixer::new(device.clone(), Path::new("/"), 256),
            Visualizer::new(BrokenTerminal),
        );

        assert!(player.play(track, &CancelHandle::new()).is_err());
        assert_eq!(PlayerState::Failed, player.state());
        assert_eq!(0, device.to_mock()?.play_count());
        Ok(())
    }
}
