//! Command implementations behind the CLI.
//!
//! Each command returns a report instead of printing, so the binary decides
//! on presentation and exit status.

pub mod info;
pub mod rar;
pub mod sample;

pub use info::{inspect, FileInfo};
pub use rar::{extract_stored, rebuild_rar, RarOptions, SfvStatus, VolumeReport};
pub use sample::{rebuild_sample, SampleRun};

use anyhow::Result;
use std::path::Path;

/// Refuse to replace `path` unless `overwrite` is set.
fn check_overwrite(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        anyhow::bail!(
            "Output file already exists: {:?} (set output.overwrite to replace it)",
            path
        );
    }
    Ok(())
}
