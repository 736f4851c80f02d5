//! Matroska Block/SimpleBlock headers and frame lacing.
//!
//! ```text
//! [track_number: vint] [timecode: i16 BE] [flags: u8] [lace header] [frames...]
//! ```
//!
//! Flag bits 1-2 select the lacing scheme. With lacing, the lace header
//! starts with `frame_count - 1` and, for Xiph and EBML lacing, lists every
//! frame size but the last; the last frame takes the remaining bytes.

use crate::{Error, Result};
use rescene_common::vint;

/// Frame lacing scheme of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Lacing {
    None,
    Xiph,
    Fixed,
    Ebml,
}

impl Lacing {
    pub fn from_flags(flags: u8) -> Self {
        match (flags >> 1) & 0x03 {
            0b00 => Self::None,
            0b01 => Self::Xiph,
            0b10 => Self::Fixed,
            _ => Self::Ebml,
        }
    }

    /// Flag bits selecting this scheme.
    pub fn flag_bits(self) -> u8 {
        let bits = match self {
            Self::None => 0b00,
            Self::Xiph => 0b01,
            Self::Fixed => 0b10,
            Self::Ebml => 0b11,
        };
        bits << 1
    }

    /// Decode frame sizes from a lace header.
    ///
    /// `buf` starts at the lace header and `payload_len` counts every byte
    /// from there to the end of the block. Returns the frame sizes and the
    /// lace header length.
    pub fn decode_sizes(self, buf: &[u8], payload_len: u64) -> Result<(Vec<u64>, usize)> {
        if self == Self::None {
            return Ok((vec![payload_len], 0));
        }

        let count = *buf
            .first()
            .ok_or_else(|| Error::format("laced block has no frame count"))? as usize
            + 1;
        let mut pos = 1;
        let mut sizes = Vec::with_capacity(count);

        match self {
            Self::None => {}
            Self::Xiph => {
                for _ in 1..count {
                    let mut size = 0u64;
                    loop {
                        let byte = *buf
                            .get(pos)
                            .ok_or_else(|| Error::format("truncated Xiph lace header"))?;
                        pos += 1;
                        size += byte as u64;
                        if byte != 0xFF {
                            break;
                        }
                    }
                    sizes.push(size);
                }
            }
            Self::Fixed => {
                let each = payload_len.saturating_sub(1) / count as u64;
                sizes.extend(std::iter::repeat(each).take(count - 1));
            }
            Self::Ebml => {
                if count > 1 {
                    let (first, width) = vint::decode_at(buf, pos)?;
                    pos += width;
                    sizes.push(first);
                    let mut previous = first as i64;
                    for _ in 2..count {
                        let (delta, width) = vint::decode_signed_at(buf, pos)?;
                        pos += width;
                        previous += delta;
                        if previous < 0 {
                            return Err(Error::format("EBML lace size went negative"));
                        }
                        sizes.push(previous as u64);
                    }
                }
            }
        }

        let listed: u64 = sizes.iter().sum::<u64>() + pos as u64;
        let last = payload_len.checked_sub(listed).ok_or_else(|| {
            Error::format(format!(
                "lace sizes total {listed} bytes, block holds only {payload_len}"
            ))
        })?;
        sizes.push(last);
        Ok((sizes, pos))
    }

    /// Encode the lace header for the given frame sizes.
    pub fn encode_header(self, sizes: &[u64]) -> Result<Vec<u8>> {
        if sizes.is_empty() || sizes.len() > 256 {
            return Err(Error::format(format!(
                "cannot lace {} frames into one block",
                sizes.len()
            )));
        }
        let listed = &sizes[..sizes.len() - 1];
        let mut out = Vec::new();

        match self {
            Self::None => {
                if sizes.len() != 1 {
                    return Err(Error::format("an unlaced block holds exactly one frame"));
                }
                return Ok(out);
            }
            Self::Xiph => {
                out.push(listed.len() as u8);
                for &size in listed {
                    out.extend(std::iter::repeat(0xFF).take((size / 255) as usize));
                    out.push((size % 255) as u8);
                }
            }
            Self::Fixed => {
                if sizes.iter().any(|&s| s != sizes[0]) {
                    return Err(Error::format("fixed lacing needs equal frame sizes"));
                }
                out.push(listed.len() as u8);
            }
            Self::Ebml => {
                out.push(listed.len() as u8);
                if let Some((&first, rest)) = listed.split_first() {
                    out.extend(vint::encode(first));
                    let mut previous = first as i64;
                    for &size in rest {
                        out.extend(vint::encode_signed(size as i64 - previous));
                        previous = size as i64;
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Decoded header of a Block or SimpleBlock.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct BlockLayout {
    pub track_number: u64,
    pub timecode: i16,
    pub flags: u8,
    pub lacing: Lacing,
    /// Bytes from the start of the block body to the first frame.
    pub header_len: usize,
    pub frame_sizes: Vec<u64>,
}

impl BlockLayout {
    /// Parse the block header at the start of `data`; `body_size` is the
    /// full size of the block body, frames included, even when `data` holds
    /// only the header.
    pub fn parse(data: &[u8], body_size: u64) -> Result<Self> {
        let (track_number, width) = vint::decode_at(data, 0)?;
        let fixed = data.get(width..width + 3).ok_or_else(|| {
            Error::format(format!("block header truncated at {} bytes", data.len()))
        })?;
        let timecode = i16::from_be_bytes([fixed[0], fixed[1]]);
        let flags = fixed[2];
        let lacing = Lacing::from_flags(flags);

        let lace_start = width + 3;
        let payload_len = body_size.checked_sub(lace_start as u64).ok_or_else(|| {
            Error::format(format!("block body of {body_size} bytes is smaller than its header"))
        })?;
        let (frame_sizes, lace_len) = lacing.decode_sizes(&data[lace_start..], payload_len)?;

        Ok(Self {
            track_number,
            timecode,
            flags,
            lacing,
            header_len: lace_start + lace_len,
            frame_sizes,
        })
    }

    /// Total frame bytes.
    pub fn data_len(&self) -> u64 {
        self.frame_sizes.iter().sum()
    }
}
