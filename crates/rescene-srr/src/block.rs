//! SRR and RAR block definitions and decoding.
//!
//! Every block starts with the 7-byte RAR 2.x-4.x common header:
//!
//! ```text
//! crc:u16  kind:u8  flags:u16  size:u16      (little-endian)
//! ```
//!
//! `size` covers the whole header including those 7 bytes. A 4-byte
//! `add_size` follows when `flags & 0x8000` is set or the kind is a file or
//! new-style sub-block; for SRR stored files it is the length of the
//! embedded payload, for RAR packed files it is the (stripped) data size.

use crate::{Error, Result};
use rescene_common::fields::FieldReader;

/// SRR container header ("ii" magic block).
pub const SRR_HEADER: u8 = 0x69;
/// File stored inline in the SRR (NFO, SFV, ...).
pub const SRR_STORED_FILE: u8 = 0x6A;
pub const SRR_OSO_HASH: u8 = 0x6B;
pub const SRR_RAR_PADDING: u8 = 0x6C;
/// Introduces the blocks of one RAR volume.
pub const SRR_RAR_FILE: u8 = 0x71;
pub const RAR_MARKER: u8 = 0x72;
pub const RAR_VOLUME_HEADER: u8 = 0x73;
pub const RAR_PACKED_FILE: u8 = 0x74;
pub const RAR_OLD_COMMENT: u8 = 0x75;
pub const RAR_OLD_AUTHENTICITY: u8 = 0x76;
pub const RAR_OLD_SUBBLOCK: u8 = 0x77;
pub const RAR_OLD_RECOVERY: u8 = 0x78;
pub const RAR_OLD_AUTHENTICITY2: u8 = 0x79;
pub const RAR_NEW_SUBBLOCK: u8 = 0x7A;
pub const RAR_END_ARCHIVE: u8 = 0x7B;

/// The RAR 1.5-4.x signature, itself a 7-byte block.
pub const RAR_MARKER_BYTES: [u8; 7] = [0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x00];

/// Header flag bits.
pub mod flags {
    /// `add_size` field present.
    pub const LONG_BLOCK: u16 = 0x8000;
    /// SRR header carries an application name.
    pub const SRR_APP_NAME: u16 = 0x0001;
    /// Packed file continues from the previous volume.
    pub const FILE_SPLIT_BEFORE: u16 = 0x0001;
    /// Packed file continues in the next volume.
    pub const FILE_SPLIT_AFTER: u16 = 0x0002;
    /// Directory entry (all three dictionary bits set).
    pub const FILE_DIRECTORY: u16 = 0x00E0;
    /// 64-bit high size fields present.
    pub const FILE_LARGE: u16 = 0x0100;
    /// File name is UTF-8.
    pub const FILE_UNICODE: u16 = 0x0200;
    /// 8-byte salt present.
    pub const FILE_SALT: u16 = 0x0400;
    /// End-of-archive block carries the archive data CRC.
    pub const END_DATA_CRC: u16 = 0x0002;
    /// End-of-archive block carries the volume number.
    pub const END_VOLUME_NUMBER: u16 = 0x0008;
}

/// RAR "store" compression method.
pub const METHOD_STORE: u8 = 0x30;

static BLOCK_TYPE_NAMES: [(u8, &str); 15] = [
    (SRR_HEADER, "SRR Volume Header"),
    (SRR_STORED_FILE, "SRR Stored File"),
    (SRR_OSO_HASH, "SRR OSO Hash"),
    (SRR_RAR_PADDING, "SRR RAR Padding"),
    (SRR_RAR_FILE, "SRR RAR File"),
    (RAR_MARKER, "RAR Marker"),
    (RAR_VOLUME_HEADER, "RAR Archive Header"),
    (RAR_PACKED_FILE, "RAR File"),
    (RAR_OLD_COMMENT, "RAR Old Comment"),
    (RAR_OLD_AUTHENTICITY, "RAR Old Authenticity"),
    (RAR_OLD_SUBBLOCK, "RAR Old Subblock"),
    (RAR_OLD_RECOVERY, "RAR Old Recovery"),
    (RAR_OLD_AUTHENTICITY2, "RAR Old Authenticity 2"),
    (RAR_NEW_SUBBLOCK, "RAR New Subblock"),
    (RAR_END_ARCHIVE, "RAR Archive End"),
];

/// Human-readable name of a block kind.
pub fn block_type_name(kind: u8) -> &'static str {
    BLOCK_TYPE_NAMES
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, name)| *name)
        .unwrap_or("Unknown")
}

/// Whether a block kind belongs to the SRR layer (never written to a volume).
pub fn is_srr_kind(kind: u8) -> bool {
    (SRR_HEADER..=SRR_RAR_FILE).contains(&kind)
}

/// Common 7-byte header plus the raw header bytes it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct BlockHeader {
    pub crc: u16,
    pub kind: u8,
    pub flags: u16,
    /// Header size, including the 7 common bytes.
    pub size: u16,
    pub add_size: Option<u32>,
    /// Offset of the header within the SRR stream.
    pub offset: u64,
    #[cfg_attr(feature = "serialize", serde(skip))]
    raw: Vec<u8>,
}

impl BlockHeader {
    /// Size of the common header.
    pub const BASE_SIZE: usize = 7;

    /// Whether a block of this kind/flags carries the `add_size` field.
    pub fn has_add_size(kind: u8, flag_bits: u16) -> bool {
        flag_bits & flags::LONG_BLOCK != 0
            || matches!(kind, SRR_STORED_FILE | RAR_PACKED_FILE | RAR_NEW_SUBBLOCK)
    }

    /// Decode the common header from the complete raw header bytes.
    pub fn parse(raw: Vec<u8>, offset: u64) -> Result<Self> {
        let mut fields = FieldReader::new(&raw);
        let crc = fields.u16()?;
        let kind = fields.u8()?;
        let flag_bits = fields.u16()?;
        let size = fields.u16()?;

        if (size as usize) < Self::BASE_SIZE {
            return Err(Error::format(format!(
                "block at offset {offset} declares header size {size}, minimum is 7"
            )));
        }
        if raw.len() != size as usize {
            return Err(Error::format(format!(
                "block at offset {offset} has {} header bytes, declared {size}",
                raw.len()
            )));
        }

        let add_size = if Self::has_add_size(kind, flag_bits) {
            Some(fields.u32().map_err(|_| {
                Error::format(format!(
                    "block at offset {offset} is too short for its add_size field"
                ))
            })?)
        } else {
            None
        };

        Ok(Self {
            crc,
            kind,
            flags: flag_bits,
            size,
            add_size,
            offset,
            raw,
        })
    }

    /// The header bytes exactly as stored.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Header bytes following the common 7-byte header (and `add_size`).
    pub fn body(&self) -> &[u8] {
        let start = Self::BASE_SIZE + if self.add_size.is_some() { 4 } else { 0 };
        &self.raw[start.min(self.raw.len())..]
    }

    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag == flag
    }
}

/// Header fields of a RAR file entry whose data was stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct PackedFile {
    pub packed_size: u32,
    pub unpacked_size: u32,
    pub host_os: u8,
    pub file_crc: u32,
    pub file_time: u32,
    pub version: u8,
    pub method: u8,
    pub name_size: u16,
    pub attributes: u32,
    /// Packed size including the high 32 bits.
    pub full_packed_size: u64,
    /// Unpacked size including the high 32 bits.
    pub full_unpacked_size: u64,
    pub file_name: String,
    pub salt: Option<[u8; 8]>,
    pub split_before: bool,
    pub split_after: bool,
    pub is_directory: bool,
}

impl PackedFile {
    fn decode(header: &BlockHeader) -> Result<Self> {
        let mut fields = FieldReader::new(header.raw());
        fields.skip(BlockHeader::BASE_SIZE)?;

        let packed_size = fields.u32()?;
        let unpacked_size = fields.u32()?;
        let host_os = fields.u8()?;
        let file_crc = fields.u32()?;
        let file_time = fields.u32()?;
        let version = fields.u8()?;
        let method = fields.u8()?;
        let name_size = fields.u16()?;
        let attributes = fields.u32()?;

        let (high_packed, high_unpacked) = if header.has_flag(flags::FILE_LARGE) {
            (fields.u32()? as u64, fields.u32()? as u64)
        } else {
            (0, 0)
        };

        let name_bytes = fields.bytes(name_size as usize)?;
        let file_name = decode_file_name(name_bytes, header.has_flag(flags::FILE_UNICODE));

        let salt = if header.has_flag(flags::FILE_SALT) {
            let mut salt = [0u8; 8];
            salt.copy_from_slice(fields.bytes(8)?);
            Some(salt)
        } else {
            None
        };

        Ok(Self {
            packed_size,
            unpacked_size,
            host_os,
            file_crc,
            file_time,
            version,
            method,
            name_size,
            attributes,
            full_packed_size: (high_packed << 32) | packed_size as u64,
            full_unpacked_size: (high_unpacked << 32) | unpacked_size as u64,
            file_name,
            salt,
            split_before: header.has_flag(flags::FILE_SPLIT_BEFORE),
            split_after: header.has_flag(flags::FILE_SPLIT_AFTER),
            is_directory: header.flags & flags::FILE_DIRECTORY == flags::FILE_DIRECTORY,
        })
    }

    pub fn is_stored(&self) -> bool {
        self.method == METHOD_STORE
    }
}

/// RAR names with the unicode flag hold `ascii\0encoded`; only the part
/// before the NUL is kept.
fn decode_file_name(bytes: &[u8], unicode: bool) -> String {
    let bytes = if unicode {
        bytes.split(|&b| b == 0).next().unwrap_or(bytes)
    } else {
        bytes
    };
    String::from_utf8_lossy(bytes).into_owned()
}

/// A decoded SRR or RAR block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(tag = "type"))]
pub enum Block {
    SrrHeader {
        header: BlockHeader,
        app_name: Option<String>,
    },
    /// A file embedded in the SRR; its payload follows the header inline.
    SrrStoredFile {
        header: BlockHeader,
        file_size: u32,
        file_name: String,
        #[cfg_attr(feature = "serialize", serde(skip))]
        data: Vec<u8>,
    },
    /// Names the RAR volume whose blocks follow.
    SrrRarFile {
        header: BlockHeader,
        file_name: String,
    },
    RarMarker {
        header: BlockHeader,
    },
    RarVolumeHeader {
        header: BlockHeader,
        reserved1: u16,
        reserved2: u32,
    },
    /// A RAR file entry; only the header survives in the SRR.
    RarPackedFile {
        header: BlockHeader,
        file: PackedFile,
    },
    RarEndArchive {
        header: BlockHeader,
        archive_crc: Option<u32>,
        volume_number: Option<u16>,
    },
    /// Any other kind, preserved opaquely.
    Other {
        header: BlockHeader,
    },
}

impl Block {
    /// Decode the variant selected by `header.kind`.
    ///
    /// Stored-file payloads are not part of the header; the reader attaches
    /// them with [`Block::with_stored_data`].
    pub fn decode(header: BlockHeader) -> Result<Self> {
        let block = match header.kind {
            SRR_HEADER => {
                let app_name = if header.has_flag(flags::SRR_APP_NAME) {
                    let mut fields = FieldReader::new(header.body());
                    Some(fields.prefixed_string()?)
                } else {
                    None
                };
                Self::SrrHeader { header, app_name }
            }
            SRR_STORED_FILE => {
                let mut fields = FieldReader::new(header.body());
                let file_name = fields.prefixed_string()?;
                let file_size = header.add_size.unwrap_or(0);
                Self::SrrStoredFile {
                    header,
                    file_size,
                    file_name,
                    data: Vec::new(),
                }
            }
            SRR_RAR_FILE => {
                let mut fields = FieldReader::new(header.body());
                let file_name = fields.prefixed_string()?;
                Self::SrrRarFile { header, file_name }
            }
            RAR_MARKER => Self::RarMarker { header },
            RAR_VOLUME_HEADER => {
                let mut fields = FieldReader::new(header.body());
                let reserved1 = fields.u16()?;
                let reserved2 = fields.u32()?;
                Self::RarVolumeHeader {
                    header,
                    reserved1,
                    reserved2,
                }
            }
            RAR_PACKED_FILE => {
                let file = PackedFile::decode(&header)?;
                Self::RarPackedFile { header, file }
            }
            RAR_END_ARCHIVE => {
                let mut fields = FieldReader::new(header.body());
                let archive_crc = if header.has_flag(flags::END_DATA_CRC) {
                    Some(fields.u32()?)
                } else {
                    None
                };
                let volume_number = if header.has_flag(flags::END_VOLUME_NUMBER) {
                    Some(fields.u16()?)
                } else {
                    None
                };
                Self::RarEndArchive {
                    header,
                    archive_crc,
                    volume_number,
                }
            }
            _ => Self::Other { header },
        };
        Ok(block)
    }

    /// Attach the inline payload of a stored file.
    pub fn with_stored_data(mut self, payload: Vec<u8>) -> Self {
        if let Self::SrrStoredFile { data, .. } = &mut self {
            *data = payload;
        }
        self
    }

    pub fn header(&self) -> &BlockHeader {
        match self {
            Self::SrrHeader { header, .. }
            | Self::SrrStoredFile { header, .. }
            | Self::SrrRarFile { header, .. }
            | Self::RarMarker { header }
            | Self::RarVolumeHeader { header, .. }
            | Self::RarPackedFile { header, .. }
            | Self::RarEndArchive { header, .. }
            | Self::Other { header } => header,
        }
    }

    pub fn kind(&self) -> u8 {
        self.header().kind
    }

    pub fn type_name(&self) -> &'static str {
        block_type_name(self.kind())
    }
}
