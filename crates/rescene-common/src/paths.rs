//! Path utilities for locating source files and placing rebuilt output.
//!
//! Names recorded inside SRR/SRS files come from Windows tooling and may use
//! backslashes, drive-relative prefixes or `..` components. They are turned
//! into safe relative paths before touching the filesystem.

use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Turn a stored name into a relative path that cannot escape its base
/// directory.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use rescene_common::paths::sanitize_relative;
///
/// assert_eq!(sanitize_relative("CD1\\movie.avi"), PathBuf::from("CD1/movie.avi"));
/// assert_eq!(sanitize_relative("../../etc/passwd"), PathBuf::from("etc/passwd"));
/// ```
pub fn sanitize_relative(name: &str) -> PathBuf {
    let unified = name.replace('\\', "/");
    Path::new(&unified)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// Final path component of a stored name.
pub fn file_name_of(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Locate the file named `name` under `search_root`.
///
/// The direct path `search_root/name` is tried first. Otherwise the tree is
/// walked for a file whose name matches case-insensitively. When
/// `expected_size` is given, a candidate of that size wins over other
/// candidates; a name match of the wrong size is still returned so the
/// caller can report the mismatch.
pub fn find_file(name: &str, search_root: &Path, expected_size: Option<u64>) -> Option<PathBuf> {
    let direct = search_root.join(sanitize_relative(name));
    if direct.is_file() {
        return Some(direct);
    }

    let wanted = file_name_of(name).to_lowercase();
    let mut fallback = None;

    for entry in WalkDir::new(search_root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .map(|n| n.to_lowercase() == wanted)
            .unwrap_or(false);
        if !matches {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).ok();
        match expected_size {
            Some(expected) if size == Some(expected) => {
                debug!("Found {} at {:?}", name, entry.path());
                return Some(entry.into_path());
            }
            Some(_) => {
                if fallback.is_none() {
                    fallback = Some(entry.into_path());
                }
            }
            None => return Some(entry.into_path()),
        }
    }

    fallback
}
