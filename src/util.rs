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

use std::io;
use std::path::{Component, Path, PathBuf};

/// Extracts a displayable file name from a path, returning a fallback if the name is unreadable.
pub fn filename_display(path: &Path) -> &str {
    path.file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("unreadable file name")
}

/// Returns the directory that track files and sound files are resolved against: one level
/// above the directory the player was started from.
pub fn base_directory() -> io::Result<PathBuf> {
    Ok(normalize(&std::env::current_dir()?.join("..")))
}

/// Resolves a track or sound path against the base directory. Leading separators are
/// ignored, so "/samples/kick.wav" and "samples/kick.wav" resolve to the same file.
pub fn resolve(base: &Path, raw: &str) -> PathBuf {
    let relative = raw.trim_start_matches(['/', '\\']);
    normalize(&base.join(relative))
}

/// Lexically removes "." and ".." components without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if normalized.file_name().is_some() {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}
