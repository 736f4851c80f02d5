//! EBML variable-length integers.
//!
//! The position of the highest set bit in the first byte gives the total
//! width (1 to 8 bytes). That marker bit is masked out and the remaining
//! bits are accumulated big-endian:
//!
//! - 1 byte:  `1xxx xxxx`
//! - 2 bytes: `01xx xxxx xxxx xxxx`
//! - 8 bytes: `0000 0001 xxxx xxxx ...`
//!
//! A value with every data bit set is the "unknown size" sentinel.

use crate::{Error, Result};
use bytes::{BufMut, BytesMut};
use std::io::Read;

/// Widest VarInt EBML allows.
pub const MAX_WIDTH: usize = 8;

/// Total byte count of a VarInt, read from its first byte.
pub fn length_of(first: u8) -> Result<usize> {
    if first == 0 {
        return Err(Error::NoMarkerBit(first));
    }
    Ok(first.leading_zeros() as usize + 1)
}

/// Largest value (all data bits set) that fits in `width` bytes.
pub fn max_value(width: usize) -> u64 {
    (1u64 << (7 * width)) - 1
}

/// Whether `value` decoded from `width` bytes is the unknown-size sentinel.
pub fn is_unknown(value: u64, width: usize) -> bool {
    value == max_value(width)
}

/// Decode a VarInt of known `width` starting at `offset`.
pub fn decode(buf: &[u8], offset: usize, width: usize) -> Result<u64> {
    if width == 0 || width > MAX_WIDTH {
        return Err(Error::format(format!("invalid VarInt width {width}")));
    }
    let end = offset + width;
    if end > buf.len() {
        return Err(Error::UnexpectedEof {
            needed: end,
            have: buf.len(),
        });
    }

    let mask = (0xFFu16 >> width) as u8;
    let mut value = (buf[offset] & mask) as u64;
    for &b in &buf[offset + 1..end] {
        value = (value << 8) | b as u64;
    }
    Ok(value)
}

/// Decode a VarInt at `offset`, returning `(value, width)`.
pub fn decode_at(buf: &[u8], offset: usize) -> Result<(u64, usize)> {
    let first = *buf.get(offset).ok_or(Error::UnexpectedEof {
        needed: offset + 1,
        have: buf.len(),
    })?;
    let width = length_of(first)?;
    Ok((decode(buf, offset, width)?, width))
}

/// Read a VarInt byte-by-byte, returning `(value, bytes_consumed)`.
pub fn read<R: Read>(reader: &mut R) -> Result<(u64, usize)> {
    let first = read_byte(reader)?;
    let width = length_of(first)?;

    let mask = (0xFFu16 >> width) as u8;
    let mut value = (first & mask) as u64;
    for _ in 1..width {
        value = (value << 8) | read_byte(reader)? as u64;
    }
    Ok((value, width))
}

/// Read an element ID. IDs keep their marker bit, so the raw bytes are
/// returned as well as the packed value.
pub fn read_id<R: Read>(reader: &mut R) -> Result<(u32, usize)> {
    let first = read_byte(reader)?;
    let width = length_of(first)?;
    if width > 4 {
        return Err(Error::format(format!(
            "element ID wider than 4 bytes (first byte 0x{first:02x})"
        )));
    }

    let mut id = first as u32;
    for _ in 1..width {
        id = (id << 8) | read_byte(reader)? as u32;
    }
    Ok((id, width))
}

/// Smallest width that can carry `value` without colliding with the
/// unknown-size sentinel.
pub fn width_for(value: u64) -> usize {
    (1..=MAX_WIDTH)
        .find(|&w| value < max_value(w))
        .unwrap_or(MAX_WIDTH)
}

/// Encode `value` using the minimal width.
pub fn encode(value: u64) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(MAX_WIDTH);
    put(&mut buf, value, width_for(value));
    buf.to_vec()
}

/// Encode `value` into exactly `width` bytes.
pub fn encode_with_width(value: u64, width: usize) -> Result<Vec<u8>> {
    if width == 0 || width > MAX_WIDTH {
        return Err(Error::format(format!("invalid VarInt width {width}")));
    }
    if value > max_value(width) {
        return Err(Error::format(format!(
            "value {value} does not fit in a {width}-byte VarInt"
        )));
    }
    let mut buf = BytesMut::with_capacity(width);
    put(&mut buf, value, width);
    Ok(buf.to_vec())
}

fn put(buf: &mut BytesMut, value: u64, width: usize) {
    let marked = value | (1u64 << (7 * width));
    let bytes = marked.to_be_bytes();
    buf.put_slice(&bytes[MAX_WIDTH - width..]);
}

/// Bias applied to signed VarInts (EBML lacing deltas).
pub fn signed_bias(width: usize) -> i64 {
    (1i64 << (7 * width - 1)) - 1
}

/// Decode a signed VarInt at `offset`, returning `(value, width)`.
pub fn decode_signed_at(buf: &[u8], offset: usize) -> Result<(i64, usize)> {
    let (raw, width) = decode_at(buf, offset)?;
    Ok((raw as i64 - signed_bias(width), width))
}

/// Encode a signed VarInt using the minimal width.
pub fn encode_signed(value: i64) -> Vec<u8> {
    let width = (1..=MAX_WIDTH)
        .find(|&w| value.unsigned_abs() <= signed_bias(w) as u64)
        .unwrap_or(MAX_WIDTH);
    let mut buf = BytesMut::with_capacity(width);
    put(&mut buf, (value + signed_bias(width)) as u64, width);
    buf.to_vec()
}

fn read_byte<R: Read>(reader: &mut R) -> Result<u8> {
    let mut byte = [0u8; 1];
    match reader.read_exact(&mut byte) {
        Ok(()) => Ok(byte[0]),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(Error::UnexpectedEof { needed: 1, have: 0 })
        }
        Err(e) => Err(e.into()),
    }
}
