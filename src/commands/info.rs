use anyhow::{Context, Result};
use rescene_srr::reader::SRR_MAGIC;
use rescene_srr::{Block, BlockReader, SrrFile};
use rescene_srs::{SampleKind, SampleMeta, SrsFile};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct VolumeSummary {
    pub name: String,
    pub expected_size: u64,
    pub blocks: usize,
    pub packed_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredSummary {
    pub name: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum FileInfo {
    Srr {
        app_name: Option<String>,
        stored_files: Vec<StoredSummary>,
        volumes: Vec<VolumeSummary>,
        blocks: Vec<Block>,
    },
    Srs {
        kind: SampleKind,
        meta: SampleMeta,
    },
}

/// Describe an SRR or SRS file, detected from its first bytes.
pub fn inspect(path: &Path) -> Result<FileInfo> {
    let mut magic = [0u8; 4];
    let read = File::open(path)
        .and_then(|mut f| f.read(&mut magic))
        .with_context(|| format!("Failed to open {:?}", path))?;
    let magic = &magic[..read];

    if magic.starts_with(&SRR_MAGIC) {
        let blocks = BlockReader::open(path)
            .and_then(|reader| reader.all_blocks())
            .with_context(|| format!("Failed to read SRR file: {:?}", path))?;
        let srr = SrrFile::from_blocks(blocks.clone());
        Ok(FileInfo::Srr {
            app_name: srr.app_name,
            stored_files: srr
                .stored_files
                .iter()
                .map(|f| StoredSummary {
                    name: f.name.clone(),
                    size: f.data.len(),
                })
                .collect(),
            volumes: srr
                .volumes
                .iter()
                .map(|v| VolumeSummary {
                    name: v.name.clone(),
                    expected_size: v.expected_size(),
                    blocks: v.blocks.len(),
                    packed_files: v
                        .blocks
                        .iter()
                        .filter_map(|b| match b {
                            Block::RarPackedFile { file, .. } => Some(file.file_name.clone()),
                            _ => None,
                        })
                        .collect(),
                })
                .collect(),
            blocks,
        })
    } else if SampleKind::detect(magic).is_some() {
        let srs = SrsFile::open(path)
            .with_context(|| format!("Failed to read SRS file: {:?}", path))?;
        Ok(FileInfo::Srs {
            kind: srs.kind,
            meta: srs.meta,
        })
    } else {
        anyhow::bail!("Not an SRR or SRS file: {:?}", path)
    }
}
