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
use std::sync::Arc;

use crate::track::{Step, Track};

/// Circular view over a track's steps. Advancing past the last step wraps back to the first.
pub struct StepTimeline {
    /// The track being traversed.
    track: Arc<Track>,
    /// Index of the current step.
    position: usize,
}

impl StepTimeline {
    /// Creates a new timeline positioned at the first step.
    pub fn new(track: Arc<Track>) -> Self {
        Self { track, position: 0 }
    }

    /// Returns the current step.
    pub fn current(&self) -> &Step {
        &self.track.steps()[self.position]
    }

    /// Moves one step forward, wrapping at the end, and returns the new current step.
    pub fn advance(&mut self) -> &Step {
        self.position += 1;
        if self.position >= self.track.num_steps() {
            self.position = 0;
        }
        self.current()
    }

    /// Returns the track this timeline traverses.
    pub fn track(&self) -> &Arc<Track> {
        &self.track
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::config::{PlaybackConfig, TrackInput};
    use crate::track::Track;

    use super::StepTimeline;

    fn track(number_of_steps: usize) -> Arc<Track> {
        Arc::new(
            Track::compile(TrackInput {
                name: "Timeline".to_string(),
                number_of_steps,
                playback_config: PlaybackConfig {
                    bpm: 120,
                    looping: true,
                },
                patterns: vec![],
            })
            .expect("track should compile"),
        )
    }

    #[test]
    fn test_wraps_around() {
        let mut timeline = StepTimeline::new(track(3));
        assert_eq!(1, timeline.current().id);

        let ids: Vec<usize> = (0..7).map(|_| timeline.advance().id).collect();
        assert_eq!(vec![2, 3, 1, 2, 3, 1, 2], ids);
        assert_eq!(2, timeline.current().id);
    }

    #[test]
    fn test_single_step() {
        let mut timeline = StepTimeline::new(track(1));
        assert_eq!(1, timeline.current().id);
        for _ in 0..5 {
            assert_eq!(1, timeline.advance().id);
        }
    }
}
