use super::check_overwrite;
use anyhow::{Context, Result};
use rescene_common::paths::{file_name_of, sanitize_relative};
use rescene_common::sfv::{lookup_crc, parse_sfv};
use rescene_srr::{extract_stored_files, RarRebuilder, RebuildOptions, SrrFile};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct RarOptions {
    pub skip_validation: bool,
    pub verify_sfv: bool,
    pub overwrite: bool,
}

/// Outcome of checking one volume against the SRR's SFV listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SfvStatus {
    Match,
    Mismatch { expected: u32 },
    NotListed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeReport {
    pub name: String,
    pub path: PathBuf,
    pub size: Option<u64>,
    pub crc32: Option<u32>,
    pub sfv: SfvStatus,
    pub error: Option<String>,
}

impl VolumeReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && !matches!(self.sfv, SfvStatus::Mismatch { .. })
    }
}

/// Rebuild every volume of `srr_path` from the files under `input_dir`.
pub fn rebuild_rar(
    srr_path: &Path,
    input_dir: &Path,
    output_dir: &Path,
    options: &RarOptions,
) -> Result<Vec<VolumeReport>> {
    let srr = SrrFile::open(srr_path)
        .with_context(|| format!("Failed to read SRR file: {:?}", srr_path))?;
    if srr.volumes.is_empty() {
        anyhow::bail!("SRR file lists no RAR volumes: {:?}", srr_path);
    }

    for volume in &srr.volumes {
        check_overwrite(&output_dir.join(sanitize_relative(&volume.name)), options.overwrite)?;
    }

    let checksums = if options.verify_sfv {
        sfv_checksums(&srr)
    } else {
        BTreeMap::new()
    };

    tracing::info!(
        "Rebuilding {} volumes from {:?} into {:?}",
        srr.volumes.len(),
        input_dir,
        output_dir
    );
    let mut rebuilder = RarRebuilder::new(
        input_dir,
        RebuildOptions {
            skip_validation: options.skip_validation,
        },
    );

    let reports = rebuilder
        .rebuild_to_dir(&srr, output_dir)
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(stats) => {
                let sfv = if !options.verify_sfv {
                    SfvStatus::Skipped
                } else {
                    match lookup_crc(&checksums, file_name_of(&outcome.name)) {
                        Some(expected) if expected == stats.crc32 => SfvStatus::Match,
                        Some(expected) => {
                            tracing::warn!(
                                "{}: CRC {:08X} does not match SFV {:08X}",
                                outcome.name,
                                stats.crc32,
                                expected
                            );
                            SfvStatus::Mismatch { expected }
                        }
                        None => SfvStatus::NotListed,
                    }
                };
                VolumeReport {
                    name: outcome.name,
                    path: outcome.path,
                    size: Some(stats.size),
                    crc32: Some(stats.crc32),
                    sfv,
                    error: None,
                }
            }
            Err(e) => VolumeReport {
                name: outcome.name,
                path: outcome.path,
                size: None,
                crc32: None,
                sfv: SfvStatus::Skipped,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(reports)
}

/// Volume checksums from every SFV stored in the SRR.
fn sfv_checksums(srr: &SrrFile) -> BTreeMap<String, u32> {
    let mut checksums = BTreeMap::new();
    for stored in srr.sfv_files() {
        tracing::debug!("Reading checksums from {}", stored.name);
        let text = String::from_utf8_lossy(&stored.data);
        checksums.extend(parse_sfv(&text));
    }
    checksums
}

/// Write the files stored inside `srr_path` to `output_dir`.
pub fn extract_stored(srr_path: &Path, output_dir: &Path, overwrite: bool) -> Result<Vec<PathBuf>> {
    let srr = SrrFile::open(srr_path)
        .with_context(|| format!("Failed to read SRR file: {:?}", srr_path))?;
    let written = extract_stored_files(&srr, output_dir, overwrite)
        .with_context(|| format!("Failed to extract stored files to {:?}", output_dir))?;
    Ok(written)
}
