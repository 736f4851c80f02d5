//! Extraction of files embedded in an SRR.

use crate::volume::SrrFile;
use crate::Result;
use rescene_common::paths::sanitize_relative;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Write every stored file of `srr` below `out_dir`, returning the paths
/// written.
///
/// Stored names are sanitized so they stay inside `out_dir`. Existing files
/// are replaced only when `overwrite` is set.
pub fn extract_stored_files(
    srr: &SrrFile,
    out_dir: &Path,
    overwrite: bool,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(srr.stored_files.len());

    for stored in &srr.stored_files {
        let relative = sanitize_relative(&stored.name);
        if relative.as_os_str().is_empty() {
            warn!("Stored file name {:?} has no usable components, skipped", stored.name);
            continue;
        }

        let path = out_dir.join(relative);
        if path.exists() && !overwrite {
            warn!("{:?} already exists, skipped", path);
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &stored.data)?;
        debug!("Extracted {} ({} bytes)", stored.name, stored.data.len());
        written.push(path);
    }

    Ok(written)
}
