//! RAR volume reconstruction.
//!
//! Each volume is rebuilt by writing its block headers verbatim and, after
//! every packed-file header, the packed span of the named source file. A
//! source file split across volumes is read through one cursor that only
//! moves forward, so consecutive spans come from consecutive offsets no
//! matter which volume they land in.

use crate::block::{Block, PackedFile};
use crate::volume::{SrrFile, Volume};
use crate::{Error, Result};
use rescene_common::checksum::CrcWriter;
use rescene_common::paths::{find_file, sanitize_relative};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Caller-controlled knobs for RAR reconstruction.
#[derive(Debug, Clone, Default)]
pub struct RebuildOptions {
    /// Accept source files whose size differs from the archived size.
    pub skip_validation: bool,
}

/// Size and CRC-32 of a rebuilt volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeStats {
    pub size: u64,
    pub crc32: u32,
}

/// Result of rebuilding one volume.
#[derive(Debug)]
pub struct VolumeOutcome {
    pub name: String,
    pub path: PathBuf,
    pub result: Result<VolumeStats>,
}

/// The source file currently being copied from.
struct OpenSource {
    name: String,
    /// `None` when the file could not be opened; the cursor still advances.
    file: Option<BufReader<File>>,
    /// Why `file` is `None`, reported for every span of this source.
    error: Option<Error>,
    cursor: u64,
}

/// Rebuilds RAR volumes from an [`SrrFile`] and a directory of source files.
pub struct RarRebuilder {
    search_root: PathBuf,
    options: RebuildOptions,
    source: Option<OpenSource>,
}

impl RarRebuilder {
    /// Create a rebuilder that looks up source files under `search_root`.
    pub fn new<P: Into<PathBuf>>(search_root: P, options: RebuildOptions) -> Self {
        Self {
            search_root: search_root.into(),
            options,
            source: None,
        }
    }

    /// Rebuild every volume into `out_dir`.
    ///
    /// A failing volume does not stop the others; its partial output is
    /// removed and the error is reported in its [`VolumeOutcome`].
    pub fn rebuild_to_dir(&mut self, srr: &SrrFile, out_dir: &Path) -> Vec<VolumeOutcome> {
        srr.volumes
            .iter()
            .map(|volume| {
                let path = out_dir.join(sanitize_relative(&volume.name));
                let result = self.rebuild_volume_file(volume, &path);
                match &result {
                    Ok(stats) => info!(
                        "Rebuilt {} ({} bytes, CRC {:08X})",
                        volume.name, stats.size, stats.crc32
                    ),
                    Err(e) => {
                        warn!("Failed to rebuild {}: {}", volume.name, e);
                        let _ = fs::remove_file(&path);
                    }
                }
                VolumeOutcome {
                    name: volume.name.clone(),
                    path,
                    result,
                }
            })
            .collect()
    }

    fn rebuild_volume_file(&mut self, volume: &Volume, path: &Path) -> Result<VolumeStats> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut out = CrcWriter::new(BufWriter::new(file));
        self.rebuild_volume(volume, &mut out)?;
        out.flush()?;
        Ok(VolumeStats {
            size: out.written(),
            crc32: out.crc32(),
        })
    }

    /// Write one volume to `out`, returning the number of bytes written.
    ///
    /// After the first error the remaining packed-file blocks of the volume
    /// are still accounted against their source cursors, so later volumes
    /// copy from the right offsets.
    pub fn rebuild_volume<W: Write>(&mut self, volume: &Volume, out: &mut W) -> Result<u64> {
        debug!("Rebuilding volume {}", volume.name);
        let mut written = 0u64;
        let mut first_error = None;

        for block in &volume.blocks {
            if first_error.is_some() {
                if let Block::RarPackedFile { file, .. } = block {
                    if file.full_packed_size > 0 {
                        self.reserve_span(file);
                    }
                }
                continue;
            }

            let step = self.write_block(block, out);
            match step {
                Ok(n) => written += n,
                Err(e) => first_error = Some(e),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    fn write_block<W: Write>(&mut self, block: &Block, out: &mut W) -> Result<u64> {
        let raw = block.header().raw();
        out.write_all(raw)?;
        let mut written = raw.len() as u64;

        if let Block::RarPackedFile { file, .. } = block {
            written += self.copy_packed(file, out)?;
        }
        Ok(written)
    }

    fn copy_packed<W: Write>(&mut self, file: &PackedFile, out: &mut W) -> Result<u64> {
        if file.full_packed_size == 0 {
            return Ok(0);
        }
        if !file.is_stored() {
            return Err(Error::CompressedNotSupported {
                name: file.file_name.clone(),
                method: file.method,
            });
        }

        // The span is reserved before the source is checked so a missing
        // or short source does not shift later spans.
        let offset = self.reserve_span(file);
        let Some(source) = self.source.as_mut() else {
            return Err(Error::SourceNotFound(file.file_name.clone()));
        };
        let reader = match source.file.as_mut() {
            Some(reader) => reader,
            None => {
                return Err(match &source.error {
                    Some(e) => repeat_error(e),
                    None => Error::SourceNotFound(file.file_name.clone()),
                })
            }
        };

        debug!(
            "Copying {} bytes of {} from offset {}",
            file.full_packed_size, file.file_name, offset
        );
        reader.seek(SeekFrom::Start(offset))?;
        let copied = io::copy(&mut reader.take(file.full_packed_size), out)?;
        if copied != file.full_packed_size {
            return Err(Error::UnexpectedEof {
                name: file.file_name.clone(),
                needed: file.full_packed_size,
                copied,
            });
        }
        Ok(copied)
    }

    /// Switch to the block's source file if the name changed, then return the
    /// span start and advance the cursor past it.
    fn reserve_span(&mut self, file: &PackedFile) -> u64 {
        let same = self
            .source
            .as_ref()
            .map(|s| s.name == file.file_name)
            .unwrap_or(false);
        if !same {
            // Dropping the previous OpenSource closes its handle.
            self.source = None;
            let (reader, error) = match self.open_source(file) {
                Ok(reader) => (Some(reader), None),
                Err(e) => {
                    warn!("{}", e);
                    (None, Some(e))
                }
            };
            self.source = Some(OpenSource {
                name: file.file_name.clone(),
                file: reader,
                error,
                cursor: 0,
            });
        }

        match self.source.as_mut() {
            Some(source) => {
                let offset = source.cursor;
                source.cursor += file.full_packed_size;
                offset
            }
            None => 0,
        }
    }

    fn open_source(&self, file: &PackedFile) -> Result<BufReader<File>> {
        let path = find_file(
            &file.file_name,
            &self.search_root,
            Some(file.full_unpacked_size),
        )
        .ok_or_else(|| Error::SourceNotFound(file.file_name.clone()))?;

        let actual = fs::metadata(&path)?.len();
        if actual != file.full_unpacked_size {
            if self.options.skip_validation {
                warn!(
                    "Source {} has size {} (expected {}), continuing without validation",
                    file.file_name, actual, file.full_unpacked_size
                );
            } else {
                return Err(Error::SourceSizeMismatch {
                    name: file.file_name.clone(),
                    expected: file.full_unpacked_size,
                    actual,
                });
            }
        }

        debug!("Opened source {} at {:?}", file.file_name, path);
        Ok(BufReader::new(File::open(path)?))
    }
}

/// A copy of a stored source error, for every span that needs the source.
fn repeat_error(e: &Error) -> Error {
    match e {
        Error::SourceNotFound(name) => Error::SourceNotFound(name.clone()),
        Error::SourceSizeMismatch {
            name,
            expected,
            actual,
        } => Error::SourceSizeMismatch {
            name: name.clone(),
            expected: *expected,
            actual: *actual,
        },
        Error::Io(io_err) => Error::Io(io::Error::new(io_err.kind(), io_err.to_string())),
        other => Error::format(other.to_string()),
    }
}
