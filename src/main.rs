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
use std::error::Error;
use std::sync::Arc;

use clap::{crate_version, Parser};
use drumseq::audio::{self, AudioMixer};
use drumseq::config::{self, Settings};
use drumseq::player::Player;
use drumseq::playsync::CancelHandle;
use drumseq::track::Track;
use drumseq::util;
use drumseq::visualizer::Visualizer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A step sequencer drum machine."
)]
struct Cli {
    /// The path to the track file, relative to the directory above the current one.
    path: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Logs go to stderr so they don't draw over the sequencer on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let base_directory = util::base_directory()?;
    let track_path = util::resolve(&base_directory, &cli.path);
    let track = Arc::new(Track::compile(config::parse_track(&track_path)?)?);
    info!(track = %track, "Compiled track.");

    let settings = Settings::load()?;
    let device = audio::get_device(&settings)?;
    info!(device = %device, "Using audio device.");

    let mixer = AudioMixer::new(device, &base_directory, settings.buffer_size());
    let mut player = Player::new(mixer, Visualizer::stdout());

    // Ctrl-C stops playback so the visualizer can put the cursor back on the way out.
    let cancel_handle = CancelHandle::new();
    {
        let cancel_handle = cancel_handle.clone();
        ctrlc::set_handler(move || cancel_handle.cancel())?;
    }
    let report = player.play(track, &cancel_handle)?;
    info!(
        iterations = report.iterations,
        skipped = report.skipped,
        "Done."
    );

    Ok(())
}
