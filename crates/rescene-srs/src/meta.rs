//! Sample metadata records stored in an SRS.
//!
//! Both containers carry the same two little-endian records, wrapped in
//! EBML elements (`FileData` / `TrackData`) or RIFF chunks (`SRSF` /
//! `SRST`):
//!
//! ```text
//! FileData:  flags:u16  app_name:u16+bytes  sample_name:u16+bytes
//!            original_size:u32|u64  crc32:u32
//! TrackData: flags:u16  track_number:u16|u32  data_length:u32|u64
//!            match_offset:u64  sig_len:u16  signature
//! ```

use crate::Result;
use bytes::{BufMut, BytesMut};
use rescene_common::fields::FieldReader;
use rescene_common::vint;
use std::collections::BTreeMap;
use tracing::debug;

/// Record flag bits.
pub mod flags {
    /// `original_size` is 64-bit.
    pub const FILE_BIG_SIZE: u16 = 0x0001;
    /// `data_length` is 64-bit.
    pub const TRACK_BIG_LENGTH: u16 = 0x0004;
    /// `track_number` is 32-bit.
    pub const TRACK_BIG_NUMBER: u16 = 0x0008;
}

/// Legacy single-byte element IDs used by early SRS writers.
pub const LEGACY_FILE_ID: u8 = 0xC1;
pub const LEGACY_TRACK_ID: u8 = 0xC2;

/// Description of the sample file the SRS rebuilds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct FileMeta {
    pub flags: u16,
    pub app_name: String,
    pub sample_name: String,
    pub original_size: u64,
    pub crc32: u32,
}

impl FileMeta {
    pub fn parse(body: &[u8]) -> Result<Self> {
        Self::read_from(&mut FieldReader::new(body))
    }

    fn read_from(fields: &mut FieldReader<'_>) -> Result<Self> {
        let flag_bits = fields.u16()?;
        let app_name = fields.prefixed_string()?;
        let sample_name = fields.prefixed_string()?;
        let original_size = if flag_bits & flags::FILE_BIG_SIZE != 0 {
            fields.u64()?
        } else {
            fields.u32()? as u64
        };
        let crc32 = fields.u32()?;

        Ok(Self {
            flags: flag_bits,
            app_name,
            sample_name,
            original_size,
            crc32,
        })
    }

    /// Serialize the record body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let big = self.original_size > u32::MAX as u64;
        let flag_bits = if big {
            self.flags | flags::FILE_BIG_SIZE
        } else {
            self.flags & !flags::FILE_BIG_SIZE
        };

        let mut buf = BytesMut::new();
        buf.put_u16_le(flag_bits);
        put_prefixed(&mut buf, &self.app_name);
        put_prefixed(&mut buf, &self.sample_name);
        if big {
            buf.put_u64_le(self.original_size);
        } else {
            buf.put_u32_le(self.original_size as u32);
        }
        buf.put_u32_le(self.crc32);
        buf.to_vec()
    }
}

/// Where one track's sample data lives in the full source file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct TrackMeta {
    pub flags: u16,
    pub track_number: u32,
    /// Bytes of frame data the sample holds for this track.
    pub data_length: u64,
    /// Absolute offset in the source file where the sample's data starts.
    pub match_offset: u64,
    /// First bytes of the track data, kept for diagnostics.
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub signature: Vec<u8>,
}

impl TrackMeta {
    pub fn parse(body: &[u8]) -> Result<Self> {
        Self::read_from(&mut FieldReader::new(body))
    }

    fn read_from(fields: &mut FieldReader<'_>) -> Result<Self> {
        let flag_bits = fields.u16()?;
        let track_number = if flag_bits & flags::TRACK_BIG_NUMBER != 0 {
            fields.u32()?
        } else {
            fields.u16()? as u32
        };
        let data_length = if flag_bits & flags::TRACK_BIG_LENGTH != 0 {
            fields.u64()?
        } else {
            fields.u32()? as u64
        };
        let match_offset = fields.u64()?;
        let sig_len = fields.u16()? as usize;
        let signature = fields.bytes(sig_len)?.to_vec();

        Ok(Self {
            flags: flag_bits,
            track_number,
            data_length,
            match_offset,
            signature,
        })
    }

    /// Serialize the record body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let big_number = self.track_number > u16::MAX as u32;
        let big_length = self.data_length > u32::MAX as u64;
        let mut flag_bits = self.flags & !(flags::TRACK_BIG_NUMBER | flags::TRACK_BIG_LENGTH);
        if big_number {
            flag_bits |= flags::TRACK_BIG_NUMBER;
        }
        if big_length {
            flag_bits |= flags::TRACK_BIG_LENGTH;
        }

        let mut buf = BytesMut::new();
        buf.put_u16_le(flag_bits);
        if big_number {
            buf.put_u32_le(self.track_number);
        } else {
            buf.put_u16_le(self.track_number as u16);
        }
        if big_length {
            buf.put_u64_le(self.data_length);
        } else {
            buf.put_u32_le(self.data_length as u32);
        }
        buf.put_u64_le(self.match_offset);
        buf.put_u16_le(self.signature.len() as u16);
        buf.put_slice(&self.signature);
        buf.to_vec()
    }
}

fn put_prefixed(buf: &mut BytesMut, s: &str) {
    buf.put_u16_le(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

/// File record plus track records keyed by track number.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SampleMeta {
    pub file: FileMeta,
    pub tracks: BTreeMap<u32, TrackMeta>,
}

impl SampleMeta {
    /// Combine records found in a skeleton. The file record is required;
    /// a repeated track number keeps the first record.
    pub fn from_records(file: Option<FileMeta>, tracks: Vec<TrackMeta>) -> Option<Self> {
        let file = file?;
        let mut by_number = BTreeMap::new();
        for track in tracks {
            by_number.entry(track.track_number).or_insert(track);
        }
        Some(Self {
            file,
            tracks: by_number,
        })
    }

    /// Smallest match offset over all tracks.
    pub fn min_match_offset(&self) -> u64 {
        min_match_offset(&self.tracks)
    }
}

/// Smallest match offset in `tracks`, or 0 when there are none.
pub fn min_match_offset(tracks: &BTreeMap<u32, TrackMeta>) -> u64 {
    tracks.values().map(|t| t.match_offset).min().unwrap_or(0)
}

/// Scan raw skeleton bytes for legacy `0xC1`/`0xC2` records.
///
/// A candidate counts only when its VarInt size frames a body that parses
/// completely, which keeps stray `0xC1` bytes inside other data from
/// matching.
pub fn scan_legacy(buf: &[u8]) -> Option<SampleMeta> {
    let mut file = None;
    let mut tracks = Vec::new();

    for (pos, &byte) in buf.iter().enumerate() {
        if byte != LEGACY_FILE_ID && byte != LEGACY_TRACK_ID {
            continue;
        }
        let Some(body) = legacy_body(buf, pos + 1) else {
            continue;
        };

        if byte == LEGACY_FILE_ID && file.is_none() {
            if let Some(meta) = parse_exact(body, FileMeta::read_from) {
                debug!("Legacy file record at offset {}", pos);
                file = Some(meta);
            }
        } else if byte == LEGACY_TRACK_ID {
            if let Some(meta) = parse_exact(body, TrackMeta::read_from) {
                debug!("Legacy track record at offset {}", pos);
                tracks.push(meta);
            }
        }
    }

    SampleMeta::from_records(file, tracks)
}

fn legacy_body(buf: &[u8], size_offset: usize) -> Option<&[u8]> {
    let (size, width) = vint::decode_at(buf, size_offset).ok()?;
    let start = size_offset + width;
    let end = start.checked_add(usize::try_from(size).ok()?)?;
    buf.get(start..end)
}

/// Parse `body` and accept the record only if every byte was consumed.
fn parse_exact<T>(body: &[u8], read: fn(&mut FieldReader<'_>) -> Result<T>) -> Option<T> {
    let mut fields = FieldReader::new(body);
    let record = read(&mut fields).ok()?;
    (fields.remaining() == 0).then_some(record)
}
