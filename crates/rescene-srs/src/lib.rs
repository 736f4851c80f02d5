//! Rescene-SRS: MKV and AVI sample reconstruction
//!
//! An SRS file is a media sample with every frame's payload removed: the
//! container structure is kept and a small metadata record describes the
//! original sample (name, size, CRC-32) and, per track, where its data
//! starts in the full-length release file.
//!
//! # Modules
//!
//! - `meta` - `FileData`/`TrackData` records and the legacy tag scan
//! - `track` - Source spans and extracted per-track data
//! - `ebml` - Matroska skeleton, demuxer and rebuilder
//! - `riff` - AVI skeleton, demuxer and rebuilder
//!
//! # Architecture
//!
//! 1. [`SrsFile::open`] detects the container from its magic, parses the
//!    skeleton tree and locates the metadata
//! 2. [`SrsFile::plan`] walks the full source file and records the byte
//!    ranges of each track's sample data
//! 3. [`TrackStreams::extract`] copies those ranges into spooled buffers
//! 4. [`SrsFile::rebuild`] writes the skeleton back out, pulling each frame
//!    from its track buffer
//!
//! # Example
//!
//! ```no_run
//! use rescene_srs::{SampleOptions, SrsFile};
//! use std::path::Path;
//!
//! let srs = SrsFile::open(Path::new("sample.srs"))?;
//! let report = srs.rebuild_to_file(
//!     Path::new("movie.mkv"),
//!     Path::new("sample.mkv"),
//!     &SampleOptions::default(),
//! )?;
//! assert!(report.is_match());
//! # Ok::<(), rescene_srs::Error>(())
//! ```

pub mod ebml;
pub mod error;
pub mod meta;
pub mod riff;
pub mod track;

pub use error::{Error, Result};
pub use meta::{FileMeta, SampleMeta, TrackMeta};
pub use track::{MissingTrackPolicy, SourceSpan, SpanReader, TrackPlan, TrackStreams};

use rescene_common::checksum::CrcWriter;
use rescene_common::paths::sanitize_relative;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Container format of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum SampleKind {
    Mkv,
    Avi,
}

impl SampleKind {
    /// Detect the container from the first bytes of a file.
    pub fn detect(magic: &[u8]) -> Option<Self> {
        if magic.starts_with(&ebml::EBML_MAGIC) {
            Some(Self::Mkv)
        } else if magic.starts_with(&riff::RIFF_MAGIC) {
            Some(Self::Avi)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mkv => "mkv",
            Self::Avi => "avi",
        }
    }
}

/// Parsed skeleton tree.
#[derive(Debug, Clone)]
pub enum Skeleton {
    Ebml(Vec<ebml::Element>),
    Riff(Vec<riff::Chunk>),
}

/// Options for a sample rebuild.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleOptions {
    pub missing_tracks: MissingTrackPolicy,
}

/// Result of writing a sample to disk.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SampleReport {
    pub path: PathBuf,
    pub size: u64,
    pub crc32: u32,
    pub expected_size: u64,
    pub expected_crc32: u32,
    /// Bytes written as zeros because track data ran out.
    pub zero_filled: u64,
}

impl SampleReport {
    /// Whether size and CRC-32 equal the values recorded in the SRS.
    pub fn is_match(&self) -> bool {
        self.size == self.expected_size && self.crc32 == self.expected_crc32
    }
}

/// A parsed SRS file.
#[derive(Debug, Clone)]
pub struct SrsFile {
    pub kind: SampleKind,
    pub meta: SampleMeta,
    pub skeleton: Skeleton,
}

impl SrsFile {
    /// Read and parse an SRS file.
    pub fn open(path: &Path) -> Result<Self> {
        debug!("Reading SRS {:?}", path);
        let buf = fs::read(path)?;
        Self::parse(&buf)
    }

    /// Parse SRS bytes.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let kind = SampleKind::detect(buf).ok_or_else(|| {
            let magic = buf.iter().take(4).map(|b| format!("{:02X}", b)).collect::<String>();
            Error::UnsupportedContainer(format!("magic {}", magic))
        })?;

        let (skeleton, meta) = match kind {
            SampleKind::Mkv => {
                let elements = ebml::parse_elements(buf, 0, buf.len())?;
                let meta = ebml::find_meta(&elements)?;
                (Skeleton::Ebml(elements), meta)
            }
            SampleKind::Avi => {
                let chunks = riff::parse_chunks(buf, 0, buf.len())?;
                let meta = riff::find_meta(&chunks)?;
                (Skeleton::Riff(chunks), meta)
            }
        };

        let meta = match meta {
            Some(meta) => meta,
            None => {
                debug!("No structured metadata, scanning for legacy records");
                meta::scan_legacy(buf).ok_or(Error::NoMetadata)?
            }
        };

        info!(
            "SRS for {} ({} bytes, {} tracks, {})",
            meta.file.sample_name,
            meta.file.original_size,
            meta.tracks.len(),
            kind.extension()
        );
        Ok(Self {
            kind,
            meta,
            skeleton,
        })
    }

    /// Output file name, reduced to a path inside the output directory.
    pub fn output_name(&self) -> PathBuf {
        sanitize_relative(&self.meta.file.sample_name)
    }

    /// Locate every track's sample data in `source`.
    pub fn plan(&self, source: &Path) -> Result<TrackPlan> {
        let reader = BufReader::new(File::open(source)?);
        match self.kind {
            SampleKind::Mkv => ebml::EbmlDemuxer::new(reader)?.plan(&self.meta.tracks),
            SampleKind::Avi => riff::RiffDemuxer::new(reader)?.plan(&self.meta.tracks),
        }
    }

    /// Plan and copy out every track's sample data from `source`.
    pub fn extract_tracks(&self, source: &Path) -> Result<TrackStreams> {
        let plan = self.plan(source)?;
        TrackStreams::extract(source, &plan)
    }

    /// Write the sample to `out` using extracted track data.
    pub fn rebuild<W: Write>(
        &self,
        tracks: &mut TrackStreams,
        policy: MissingTrackPolicy,
        out: &mut W,
    ) -> Result<()> {
        match &self.skeleton {
            Skeleton::Ebml(elements) => ebml::write_elements(elements, tracks, policy, out),
            Skeleton::Riff(chunks) => riff::write_chunks(chunks, tracks, policy, out),
        }
    }

    /// Rebuild the sample from `source` into `out_path`.
    ///
    /// A partially written file is removed when the rebuild fails.
    pub fn rebuild_to_file(
        &self,
        source: &Path,
        out_path: &Path,
        options: &SampleOptions,
    ) -> Result<SampleReport> {
        let result = self.write_sample(source, out_path, options);
        if result.is_err() && out_path.exists() {
            if let Err(e) = fs::remove_file(out_path) {
                warn!("Could not remove partial sample {:?}: {}", out_path, e);
            }
        }
        result
    }

    fn write_sample(
        &self,
        source: &Path,
        out_path: &Path,
        options: &SampleOptions,
    ) -> Result<SampleReport> {
        let mut tracks = self.extract_tracks(source)?;

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = CrcWriter::new(BufWriter::new(File::create(out_path)?));
        self.rebuild(&mut tracks, options.missing_tracks, &mut writer)?;
        writer.flush()?;

        for (track, left) in tracks.unread() {
            warn!("Track {}: {} extracted bytes were not used", track, left);
        }

        let report = SampleReport {
            path: out_path.to_path_buf(),
            size: writer.written(),
            crc32: writer.crc32(),
            expected_size: self.meta.file.original_size,
            expected_crc32: self.meta.file.crc32,
            zero_filled: tracks.zero_filled(),
        };
        if report.is_match() {
            info!("Rebuilt {:?} ({} bytes, CRC {:08X})", out_path, report.size, report.crc32);
        } else {
            warn!(
                "Rebuilt {:?} does not match: {} bytes CRC {:08X}, expected {} bytes CRC {:08X}",
                out_path, report.size, report.crc32, report.expected_size, report.expected_crc32
            );
        }
        Ok(report)
    }
}
