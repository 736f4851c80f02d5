//! RIFF chunk headers and the skeleton chunk tree.
//!
//! Every chunk is `fourcc:[u8;4] size:u32le data`, padded to an even
//! length. `RIFF` and `LIST` chunks start their data with a 4-byte list
//! type and hold child chunks.

use crate::{Error, Result};
use bytes::{BufMut, BytesMut};
use std::io::Read;
use tracing::debug;

/// Four-character chunk code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const RIFF: Self = Self(*b"RIFF");
    pub const LIST: Self = Self(*b"LIST");
    pub const AVI: Self = Self(*b"AVI ");
    pub const MOVI: Self = Self(*b"movi");
    pub const IDX1: Self = Self(*b"idx1");
    /// SRS file record.
    pub const SRSF: Self = Self(*b"SRSF");
    /// SRS track record.
    pub const SRST: Self = Self(*b"SRST");

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    pub fn is_list(&self) -> bool {
        *self == Self::RIFF || *self == Self::LIST
    }

    /// Stream number of a movi data chunk (`NNdc`, `NNdb` or `NNwb`).
    pub fn stream_number(&self) -> Option<u32> {
        let [a, b, c, d] = self.0;
        if !a.is_ascii_digit() || !b.is_ascii_digit() {
            return None;
        }
        match &[c, d] {
            b"dc" | b"db" | b"wb" => Some(((a - b'0') * 10 + (b - b'0')) as u32),
            _ => None,
        }
    }
}

impl std::fmt::Display for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub fourcc: FourCc,
    /// Data size, excluding the header and pad byte.
    pub size: u32,
    /// List type for `RIFF`/`LIST` chunks.
    pub list_type: Option<FourCc>,
    /// Offset of the fourcc.
    pub offset: u64,
}

impl ChunkHeader {
    pub const BASE_SIZE: usize = 8;

    /// Parse a header from `buf` at `offset`; `None` when the buffer ends
    /// inside the header.
    pub fn parse(buf: &[u8], offset: usize) -> Option<Self> {
        let base = buf.get(offset..offset + Self::BASE_SIZE)?;
        let fourcc = FourCc([base[0], base[1], base[2], base[3]]);
        let size = u32::from_le_bytes([base[4], base[5], base[6], base[7]]);
        let list_type = if fourcc.is_list() {
            let lt = buf.get(offset + 8..offset + 12)?;
            Some(FourCc([lt[0], lt[1], lt[2], lt[3]]))
        } else {
            None
        };
        Some(Self {
            fourcc,
            size,
            list_type,
            offset: offset as u64,
        })
    }

    /// Read a header from a stream positioned at `offset`; `None` at end of
    /// stream.
    pub fn read<R: Read>(reader: &mut R, offset: u64) -> Result<Option<Self>> {
        let mut base = [0u8; 12];
        if !read_full(reader, &mut base[..8])? {
            return Ok(None);
        }
        let fourcc = FourCc([base[0], base[1], base[2], base[3]]);
        if fourcc.is_list() && !read_full(reader, &mut base[8..])? {
            return Ok(None);
        }
        Ok(Self::parse(&base, 0).map(|h| Self { offset, ..h }))
    }

    pub fn header_len(&self) -> u64 {
        if self.list_type.is_some() {
            12
        } else {
            8
        }
    }

    pub fn data_offset(&self) -> u64 {
        self.offset + self.header_len()
    }

    /// Data size rounded up to an even length.
    pub fn padded_size(&self) -> u64 {
        let size = self.size as u64;
        size + (size & 1)
    }

    /// End of the chunk including padding, clamped to `scope_end`.
    pub fn end_within(&self, scope_end: u64) -> u64 {
        (self.offset + Self::BASE_SIZE as u64 + self.padded_size()).min(scope_end)
    }

    /// Header bytes as stored.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(12);
        buf.put_slice(&self.fourcc.0);
        buf.put_u32_le(self.size);
        if let Some(list_type) = self.list_type {
            buf.put_slice(&list_type.0);
        }
        buf.to_vec()
    }
}

/// Fill `buf`, returning `false` if the stream ended first.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Body of a skeleton chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkBody {
    /// `RIFF`/`LIST` header only; its children follow as siblings.
    List,
    /// Stream data chunk whose data was stripped.
    Stream { track: u32 },
    /// Data bytes present in the skeleton (at most the padded size).
    Data(Vec<u8>),
}

/// A chunk of an SRS skeleton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub header: ChunkHeader,
    pub body: ChunkBody,
}

impl Chunk {
    pub fn fourcc(&self) -> FourCc {
        self.header.fourcc
    }

    /// Data bytes with any pad byte removed.
    pub fn data(&self) -> &[u8] {
        match &self.body {
            ChunkBody::Data(data) => &data[..data.len().min(self.header.size as usize)],
            _ => &[],
        }
    }

    /// Whether this chunk is SRS metadata.
    pub fn is_meta(&self) -> bool {
        self.fourcc() == FourCc::SRSF || self.fourcc() == FourCc::SRST
    }
}

/// Parse the skeleton bytes in `buf[start..end]` into a flat chunk list.
///
/// List sizes in a skeleton describe the original file and stream chunks
/// carry only their 8-byte header, so no declared size is used to skip
/// ahead: lists are opened in place and stream chunks end at their header.
pub fn parse_chunks(buf: &[u8], start: usize, end: usize) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    let mut pos = start;

    while pos < end {
        let Some(header) = ChunkHeader::parse(&buf[..end], pos) else {
            debug!("Truncated chunk header at offset {}, stopping", pos);
            break;
        };
        let data_start = header.data_offset() as usize;
        let chunk_end = header.end_within(end as u64) as usize;

        let (body, next) = if header.list_type.is_some() {
            (ChunkBody::List, data_start)
        } else if let Some(track) = header.fourcc.stream_number() {
            (ChunkBody::Stream { track }, data_start)
        } else {
            (ChunkBody::Data(buf[data_start..chunk_end].to_vec()), chunk_end)
        };

        debug!("Chunk {} at offset {} ({} bytes declared)", header.fourcc, pos, header.size);
        chunks.push(Chunk { header, body });
        pos = next;
    }

    Ok(chunks)
}
