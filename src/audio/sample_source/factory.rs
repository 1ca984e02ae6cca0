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
use std::path::Path;

use super::audio::AudioSampleSource;
use super::error::SampleSourceError;
use super::traits::SampleSource;
use super::wav::WavSampleSource;

/// Create a SampleSource from a file. WAV files are read directly, everything else is
/// decoded through symphonia.
pub fn create_sample_source_from_file<P: AsRef<Path>>(
    path: P,
    buffer_size: usize,
) -> Result<Box<dyn SampleSource>, SampleSourceError> {
    let path = path.as_ref();
    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));

    if is_wav {
        Ok(Box::new(WavSampleSource::from_file(path, buffer_size)?))
    } else {
        Ok(Box::new(AudioSampleSource::from_file(path, buffer_size)?))
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use crate::testutil::write_click;

    use super::create_sample_source_from_file;

    #[test]
    fn test_create_from_wav() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        write_click(tempdir.path(), "kick.WAV", 0.5, 10)?;

        let source = create_sample_source_from_file(tempdir.path().join("kick.WAV"), 64)?;
        assert_eq!(1, source.channel_count());
        Ok(())
    }

    #[test]
    fn test_create_missing() {
        assert!(create_sample_source_from_file("/not/here/kick.wav", 64).is_err());
        assert!(create_sample_source_from_file("/not/here/kick.mp3", 64).is_err());
    }
}
