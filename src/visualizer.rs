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
use std::fmt::Write as _;
use std::io::{self, Write};

use crossterm::{cursor, queue, terminal};

use crate::config::TrackInput;
use crate::track::Track;

/// The static part of the pattern grid: header, one row per pattern and column widths.
struct Grid {
    /// The definition the grid was drawn from.
    input: TrackInput,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    widths: Vec<usize>,
}

impl Grid {
    fn new(input: &TrackInput) -> Grid {
        let header: Vec<String> = std::iter::once("STEP".to_string())
            .chain((1..=input.number_of_steps).map(|step| step.to_string()))
            .collect();
        let rows: Vec<Vec<String>> = input
            .patterns
            .iter()
            .map(|pattern| {
                std::iter::once(pattern.sound.name.clone())
                    .chain((1..=input.number_of_steps).map(|step| {
                        let cell = if pattern.triggers_on(step) { "X" } else { "_" };
                        cell.to_string()
                    }))
                    .collect()
            })
            .collect();

        let widths = (0..header.len())
            .map(|column| {
                rows.iter()
                    .map(|row| row[column].chars().count())
                    .chain([header[column].chars().count(), 1])
                    .max()
                    .unwrap_or(1)
            })
            .collect();

        Grid {
            input: input.clone(),
            header,
            rows,
            widths,
        }
    }

    fn separator(&self, frame: &mut String) {
        for width in &self.widths {
            frame.push('+');
            frame.push_str(&"-".repeat(width + 2));
        }
        frame.push_str("+\n");
    }

    fn row<S: AsRef<str>>(&self, frame: &mut String, cells: &[S]) {
        for (cell, width) in cells.iter().zip(&self.widths) {
            let _ = write!(frame, "| {:<width$} ", cell.as_ref(), width = width);
        }
        frame.push_str("|\n");
    }
}

/// Draws the track and a playhead to a terminal, one full frame per step.
pub struct Visualizer<W: Write> {
    out: W,
    grid: Option<Grid>,
    cursor_hidden: bool,
}

impl Visualizer<io::Stdout> {
    /// Creates a visualizer that draws to stdout.
    pub fn stdout() -> Visualizer<io::Stdout> {
        Visualizer::new(io::stdout())
    }
}

impl<W: Write> Visualizer<W> {
    pub fn new(out: W) -> Visualizer<W> {
        Visualizer {
            out,
            grid: None,
            cursor_hidden: false,
        }
    }

    /// Builds the text of a frame with the playhead under the given step.
    pub fn frame(&mut self, track: &Track, current_step_id: usize) -> String {
        // The grid only changes when a different track comes in.
        let grid = match self.grid.take() {
            Some(grid) if grid.input == *track.input() => grid,
            _ => Grid::new(track.input()),
        };
        let grid = &*self.grid.insert(grid);

        let footer: Vec<&str> = (0..grid.header.len())
            .map(|column| if column == current_step_id { "^" } else { "" })
            .collect();

        let mut frame = String::new();
        let _ = writeln!(frame, "Name: {}", track.name());
        let _ = writeln!(frame, "BPM: {}", track.playback_config().bpm);
        grid.separator(&mut frame);
        grid.row(&mut frame, &grid.header);
        grid.separator(&mut frame);
        for row in &grid.rows {
            grid.row(&mut frame, row);
        }
        grid.separator(&mut frame);
        grid.row(&mut frame, &footer);
        grid.separator(&mut frame);
        frame
    }

    /// Redraws the whole frame in place.
    pub fn render(&mut self, track: &Track, current_step_id: usize) -> io::Result<()> {
        let frame = self.frame(track, current_step_id);

        if !self.cursor_hidden {
            queue!(self.out, cursor::Hide)?;
            self.cursor_hidden = true;
        }
        queue!(
            self.out,
            cursor::MoveTo(0, 0),
            terminal::Clear(terminal::ClearType::FromCursorDown)
        )?;
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()
    }
}

impl<W: Write> Drop for Visualizer<W> {
    fn drop(&mut self) {
        if self.cursor_hidden {
            let _ = queue!(self.out, cursor::Show);
            let _ = self.out.flush();
        }
    }
}
