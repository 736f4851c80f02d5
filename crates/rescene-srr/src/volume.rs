//! Grouping of parsed blocks into SRR metadata and RAR volumes.

use crate::block::{is_srr_kind, Block};
use crate::reader::BlockReader;
use crate::Result;
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, warn};

/// A file embedded in the SRR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// The blocks of one RAR volume, in file order.
#[derive(Debug, Clone)]
pub struct Volume {
    /// Name from the introducing `SrrRarFile` block.
    pub name: String,
    /// RAR blocks to re-serialize.
    pub blocks: Vec<Block>,
}

impl Volume {
    /// Sum of header sizes plus packed data sizes: the rebuilt volume size.
    pub fn expected_size(&self) -> u64 {
        self.blocks
            .iter()
            .map(|b| {
                let header = b.header().size as u64;
                match b {
                    Block::RarPackedFile { file, .. } => header + file.full_packed_size,
                    _ => header,
                }
            })
            .sum()
    }
}

/// Parsed SRR file.
#[derive(Debug, Clone, Default)]
pub struct SrrFile {
    /// Application that created the SRR.
    pub app_name: Option<String>,
    /// Files embedded in the SRR (NFO, SFV, ...).
    pub stored_files: Vec<StoredFile>,
    /// RAR volumes, `.rar` first then `.rNN` by number.
    pub volumes: Vec<Volume>,
}

impl SrrFile {
    /// Parse an SRR file from the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BlockReader::open(path)?;
        Ok(Self::from_blocks(reader.all_blocks()?))
    }

    /// Group a block sequence by the `SrrRarFile` block that introduces
    /// each volume.
    pub fn from_blocks<I: IntoIterator<Item = Block>>(blocks: I) -> Self {
        let mut srr = SrrFile::default();
        let mut current: Option<Volume> = None;

        for block in blocks {
            match block {
                Block::SrrHeader { app_name, .. } => {
                    srr.app_name = app_name;
                }
                Block::SrrStoredFile {
                    file_name, data, ..
                } => {
                    srr.stored_files.push(StoredFile {
                        name: file_name,
                        data,
                    });
                }
                Block::SrrRarFile { file_name, .. } => {
                    if let Some(volume) = current.take() {
                        srr.volumes.push(volume);
                    }
                    current = Some(Volume {
                        name: file_name,
                        blocks: Vec::new(),
                    });
                }
                other if is_srr_kind(other.kind()) => {
                    debug!("Skipping SRR-only block {}", other.type_name());
                }
                other => match current.as_mut() {
                    Some(volume) => volume.blocks.push(other),
                    None => warn!(
                        "{} block at offset {} precedes any RAR volume, ignored",
                        other.type_name(),
                        other.header().offset
                    ),
                },
            }
        }

        if let Some(volume) = current {
            srr.volumes.push(volume);
        }
        srr.volumes
            .sort_by(|a, b| compare_volume_names(&a.name, &b.name));
        srr
    }

    /// Find a stored file by name, ignoring case.
    pub fn stored_file(&self, name: &str) -> Option<&StoredFile> {
        self.stored_files
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Stored files with an `.sfv` extension.
    pub fn sfv_files(&self) -> impl Iterator<Item = &StoredFile> {
        self.stored_files
            .iter()
            .filter(|f| f.name.to_lowercase().ends_with(".sfv"))
    }
}

/// Sort key for a volume name: `.rar` (or `.partN.rar`) first, then
/// `.rNN`, then `.sNN`, then numbered `.NNN` extensions.
pub fn volume_sort_key(name: &str) -> (u8, u32) {
    let lower = name.to_lowercase();
    let Some((stem, ext)) = lower.rsplit_once('.') else {
        return (4, 0);
    };

    if ext == "rar" {
        let part = stem
            .rsplit_once(".part")
            .and_then(|(_, n)| n.parse::<u32>().ok())
            .unwrap_or(0);
        return (0, part);
    }

    let mut chars = ext.chars();
    match (chars.next(), chars.as_str().parse::<u32>()) {
        (Some('r'), Ok(n)) if ext.len() > 1 => (1, n),
        (Some('s'), Ok(n)) if ext.len() > 1 => (2, n),
        _ => match ext.parse::<u32>() {
            Ok(n) => (3, n),
            Err(_) => (4, 0),
        },
    }
}

fn compare_volume_names(a: &str, b: &str) -> Ordering {
    volume_sort_key(a).cmp(&volume_sort_key(b))
}
