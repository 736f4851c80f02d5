//! EBML element IDs, headers and the skeleton element tree.

use super::lacing::BlockLayout;
use crate::{Error, Result};
use rescene_common::vint;
use std::io::Read;
use tracing::debug;

/// EBML element ID, marker bits included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ElementId(pub u32);

impl ElementId {
    pub const EBML: Self = Self(0x1A45_DFA3);
    pub const SEGMENT: Self = Self(0x1853_8067);
    pub const CLUSTER: Self = Self(0x1F43_B675);
    pub const BLOCK_GROUP: Self = Self(0xA0);
    pub const BLOCK: Self = Self(0xA1);
    pub const SIMPLE_BLOCK: Self = Self(0xA3);
    pub const ATTACHMENT_LIST: Self = Self(0x1941_A469);
    pub const ATTACHMENT: Self = Self(0x61A7);
    pub const RESAMPLE: Self = Self(0x1F69_7576);
    pub const RESAMPLE_FILE: Self = Self(0x6A75);
    pub const RESAMPLE_TRACK: Self = Self(0x6B75);
    pub const LEGACY_RESAMPLE: Self = Self(0xC0);
    pub const LEGACY_RESAMPLE_FILE: Self = Self(0xC1);
    pub const LEGACY_RESAMPLE_TRACK: Self = Self(0xC2);

    pub fn kind(self) -> ElementKind {
        match self {
            Self::RESAMPLE | Self::LEGACY_RESAMPLE => ElementKind::ReSample,
            Self::SEGMENT
            | Self::CLUSTER
            | Self::BLOCK_GROUP
            | Self::ATTACHMENT_LIST
            | Self::ATTACHMENT => ElementKind::Container,
            Self::BLOCK | Self::SIMPLE_BLOCK => ElementKind::Block,
            _ => ElementKind::Leaf,
        }
    }

    /// Raw ID bytes as they appear in the stream.
    pub fn to_bytes(self) -> Vec<u8> {
        let bytes = self.0.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count().min(3);
        bytes[skip..].to_vec()
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// How an element takes part in reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// SRS metadata, never written to the sample.
    ReSample,
    /// Holds child elements.
    Container,
    /// Block or SimpleBlock with stripped frame data.
    Block,
    /// Anything else; its body is copied as far as it is present.
    Leaf,
}

/// Element ID and size, with the exact bytes they were read from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ElementHeader {
    pub id: ElementId,
    /// Declared body size; `None` for the unknown-size sentinel.
    pub size: Option<u64>,
    /// Offset of the first ID byte.
    pub offset: u64,
    #[cfg_attr(feature = "serialize", serde(skip))]
    raw: Vec<u8>,
}

impl ElementHeader {
    /// Parse a header from `buf` at `offset`.
    pub fn parse(buf: &[u8], offset: usize) -> Result<Self> {
        let first = *buf.get(offset).ok_or(rescene_common::Error::UnexpectedEof {
            needed: offset + 1,
            have: buf.len(),
        })?;
        let id_len = vint::length_of(first)?;
        if id_len > 4 {
            return Err(Error::format(format!(
                "element ID at offset {offset} is {id_len} bytes wide"
            )));
        }
        let id_bytes = buf.get(offset..offset + id_len).ok_or(
            rescene_common::Error::UnexpectedEof {
                needed: offset + id_len,
                have: buf.len(),
            },
        )?;
        let id = id_bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);

        let (size, size_len) = vint::decode_at(buf, offset + id_len)?;
        let header_len = id_len + size_len;
        Ok(Self {
            id: ElementId(id),
            size: (!vint::is_unknown(size, size_len)).then_some(size),
            offset: offset as u64,
            raw: buf[offset..offset + header_len].to_vec(),
        })
    }

    /// Read a header from a stream positioned at `offset`.
    pub fn read<R: Read>(reader: &mut R, offset: u64) -> Result<Self> {
        let (id, _) = vint::read_id(reader)?;
        let (size, size_len) = vint::read(reader)?;

        // Re-encoding at the same width gives back the stored bytes.
        let mut raw = ElementId(id).to_bytes();
        raw.extend(vint::encode_with_width(size, size_len)?);

        Ok(Self {
            id: ElementId(id),
            size: (!vint::is_unknown(size, size_len)).then_some(size),
            offset,
            raw,
        })
    }

    /// Header bytes exactly as stored.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn header_len(&self) -> u64 {
        self.raw.len() as u64
    }

    pub fn data_offset(&self) -> u64 {
        self.offset + self.header_len()
    }

    /// Where the body ends: the declared end, clamped to `scope_end`. An
    /// unknown size runs to `scope_end`.
    pub fn end_within(&self, scope_end: u64) -> u64 {
        match self.size {
            Some(size) => self.data_offset().saturating_add(size).min(scope_end),
            None => scope_end,
        }
    }
}

/// Body of a parsed skeleton element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementBody {
    /// ReSample metadata and its records.
    Container(Vec<Element>),
    /// Container header only; its children follow as siblings.
    Open,
    /// Block header bytes as stored, plus the decoded layout.
    Block { header: Vec<u8>, layout: BlockLayout },
    /// Leaf bytes present in the stream (at most the declared size).
    Leaf(Vec<u8>),
}

/// An element of an SRS skeleton.
///
/// Container sizes in a skeleton describe the original file and cannot be
/// used to find where the container ends in the skeleton. Containers are
/// therefore opened in place ([`ElementBody::Open`]) and the skeleton is a
/// flat sequence in file order. Only ReSample elements, whose sizes are
/// exact, keep their records as children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub header: ElementHeader,
    pub body: ElementBody,
}

impl Element {
    pub fn id(&self) -> ElementId {
        self.header.id
    }

    pub fn children(&self) -> &[Element] {
        match &self.body {
            ElementBody::Container(children) => children,
            _ => &[],
        }
    }

    /// Leaf body bytes, empty for containers and blocks.
    pub fn data(&self) -> &[u8] {
        match &self.body {
            ElementBody::Leaf(data) => data,
            _ => &[],
        }
    }

    /// Depth-first search for the first element with `id`.
    pub fn find(&self, id: ElementId) -> Option<&Element> {
        if self.id() == id {
            return Some(self);
        }
        self.children().iter().find_map(|c| c.find(id))
    }
}

/// Parse the skeleton bytes in `buf[start..end]` into elements.
///
/// Parsing stops at `end` or at a header truncated by the end of the
/// stream; a zero byte where an ID should start is a format error. Leaf
/// bodies are cut at `end`.
pub fn parse_elements(buf: &[u8], start: usize, end: usize) -> Result<Vec<Element>> {
    let mut elements = Vec::new();
    let mut pos = start;

    while pos < end {
        let header = match ElementHeader::parse(&buf[..end], pos) {
            Ok(header) => header,
            Err(Error::Common(rescene_common::Error::UnexpectedEof { .. })) => {
                debug!("Truncated element header at offset {}, stopping", pos);
                break;
            }
            Err(e) => return Err(e),
        };
        let data_start = header.data_offset() as usize;
        let body_end = header.end_within(end as u64) as usize;

        let (body, next) = match header.id.kind() {
            ElementKind::ReSample => {
                let children = parse_elements(buf, data_start, body_end)?;
                (ElementBody::Container(children), body_end)
            }
            ElementKind::Container => (ElementBody::Open, data_start),
            ElementKind::Block => {
                let body_size = header.size.unwrap_or((body_end - data_start) as u64);
                let layout = BlockLayout::parse(&buf[data_start..body_end], body_size)?;
                let header_end = data_start + layout.header_len;
                let block_header = buf[data_start..header_end].to_vec();
                (
                    ElementBody::Block {
                        header: block_header,
                        layout,
                    },
                    header_end,
                )
            }
            ElementKind::Leaf => (ElementBody::Leaf(buf[data_start..body_end].to_vec()), body_end),
        };

        debug!(
            "Element {} at offset {} ({:?} bytes declared)",
            header.id, header.offset, header.size
        );
        elements.push(Element { header, body });
        pos = next;
    }

    Ok(elements)
}
