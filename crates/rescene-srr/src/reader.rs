//! Sequential SRR block reader.

use crate::block::{Block, BlockHeader, SRR_STORED_FILE};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// First three bytes of every SRR file (CRC `0x6969` + kind `0x69`).
pub const SRR_MAGIC: [u8; 3] = [0x69, 0x69, 0x69];

/// Smallest possible SRR file.
pub const MIN_SRR_SIZE: u64 = 20;

/// Reads [`Block`]s from an SRR stream in file order.
///
/// Stored-file payloads are consumed together with their header so the
/// stream stays aligned; RAR packed-file headers are followed directly by the
/// next header because their data was never written to the SRR.
pub struct BlockReader<R> {
    reader: R,
    position: u64,
    len: u64,
    failed: bool,
}

impl BlockReader<BufReader<File>> {
    /// Open an SRR file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> BlockReader<R> {
    /// Validate the magic and minimum size, then position at the first block.
    pub fn new(mut reader: R) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        if len < MIN_SRR_SIZE {
            return Err(Error::format(format!(
                "file is {len} bytes, an SRR needs at least {MIN_SRR_SIZE}"
            )));
        }

        reader.seek(SeekFrom::Start(0))?;
        let mut magic = [0u8; 3];
        reader.read_exact(&mut magic)?;
        if magic != SRR_MAGIC {
            return Err(Error::format(format!(
                "bad magic {:02x} {:02x} {:02x}",
                magic[0], magic[1], magic[2]
            )));
        }
        reader.seek(SeekFrom::Start(0))?;

        Ok(Self {
            reader,
            position: 0,
            len,
            failed: false,
        })
    }

    /// Current offset in the SRR stream.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next block, or `None` at end of stream.
    pub fn next_block(&mut self) -> Result<Option<Block>> {
        if self.failed || self.position >= self.len {
            return Ok(None);
        }
        let result = self.read_block();
        if result.is_err() {
            self.failed = true;
        }
        result.map(Some)
    }

    /// Drain the stream into a vector, failing on the first bad block.
    pub fn all_blocks(mut self) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        while let Some(block) = self.next_block()? {
            blocks.push(block);
        }
        Ok(blocks)
    }

    fn read_block(&mut self) -> Result<Block> {
        let offset = self.position;
        let available = self.len - offset;
        if available < BlockHeader::BASE_SIZE as u64 {
            return Err(Error::format(format!(
                "truncated block header at offset {offset} ({available} bytes left)"
            )));
        }

        // Peek the common header: the kind selects the decoder and the size
        // says how much header follows.
        let mut base = [0u8; BlockHeader::BASE_SIZE];
        self.reader.read_exact(&mut base)?;
        let kind = base[2];
        let size = u16::from_le_bytes([base[5], base[6]]) as u64;
        if size < BlockHeader::BASE_SIZE as u64 {
            return Err(Error::format(format!(
                "block 0x{kind:02x} at offset {offset} declares header size {size}, minimum is 7"
            )));
        }
        if size > available {
            return Err(Error::format(format!(
                "block 0x{kind:02x} at offset {offset} declares header size {size}, only {available} bytes left"
            )));
        }

        let mut raw = vec![0u8; size as usize];
        raw[..BlockHeader::BASE_SIZE].copy_from_slice(&base);
        self.reader.read_exact(&mut raw[BlockHeader::BASE_SIZE..])?;
        self.position += size;

        let header = BlockHeader::parse(raw, offset)?;
        let mut block = Block::decode(header)?;

        if kind == SRR_STORED_FILE {
            let payload_len = block.header().add_size.unwrap_or(0) as u64;
            if payload_len > self.len - self.position {
                return Err(Error::format(format!(
                    "stored file at offset {offset} declares {payload_len} bytes, only {} left",
                    self.len - self.position
                )));
            }
            let mut payload = vec![0u8; payload_len as usize];
            self.reader.read_exact(&mut payload)?;
            self.position += payload_len;
            block = block.with_stored_data(payload);
        }

        debug!(
            "Block {} at offset {} (header {} bytes)",
            block.type_name(),
            offset,
            size
        );
        Ok(block)
    }
}

impl<R: Read + Seek> Iterator for BlockReader<R> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_block().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{flags, RAR_MARKER_BYTES, RAR_PACKED_FILE, SRR_HEADER, SRR_RAR_FILE};
    use std::io::Cursor;

    fn block(kind: u8, flag_bits: u16, body: &[u8]) -> Vec<u8> {
        let size = (7 + body.len()) as u16;
        let mut raw = vec![0x69, 0x69, kind];
        raw.extend_from_slice(&flag_bits.to_le_bytes());
        raw.extend_from_slice(&size.to_le_bytes());
        raw.extend_from_slice(body);
        raw
    }

    fn srr_header() -> Vec<u8> {
        let mut body = 4u16.to_le_bytes().to_vec();
        body.extend_from_slice(b"test");
        block(SRR_HEADER, flags::SRR_APP_NAME, &body)
    }

    fn rar_file(name: &str) -> Vec<u8> {
        let mut body = (name.len() as u16).to_le_bytes().to_vec();
        body.extend_from_slice(name.as_bytes());
        block(SRR_RAR_FILE, 0, &body)
    }

    #[test]
    fn test_rejects_bad_magic() {
        let data = vec![0x52u8; 32];
        assert!(matches!(
            BlockReader::new(Cursor::new(data)),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_rejects_short_file() {
        let data = vec![0x69u8; 10];
        assert!(matches!(
            BlockReader::new(Cursor::new(data)),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_reads_blocks_in_order() {
        let mut data = srr_header();
        data.extend(rar_file("a.rar"));
        data.extend_from_slice(&RAR_MARKER_BYTES);

        let blocks = BlockReader::new(Cursor::new(data)).unwrap().all_blocks().unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(matches!(&blocks[0], Block::SrrHeader { app_name: Some(n), .. } if n == "test"));
        assert!(matches!(&blocks[1], Block::SrrRarFile { file_name, .. } if file_name == "a.rar"));
        assert!(matches!(&blocks[2], Block::RarMarker { .. }));
    }

    #[test]
    fn test_small_header_size_aborts() {
        let mut data = srr_header();
        data.extend_from_slice(&[0x00, 0x00, 0x72, 0x00, 0x00, 0x03, 0x00]);
        data.extend_from_slice(&RAR_MARKER_BYTES);

        let mut reader = BlockReader::new(Cursor::new(data)).unwrap();
        assert!(reader.next_block().unwrap().is_some());
        assert!(matches!(reader.next_block(), Err(Error::Format(_))));
        // The parse is aborted, not resumed
        assert!(reader.next_block().unwrap().is_none());
    }

    #[test]
    fn test_truncated_trailing_header() {
        let mut data = srr_header();
        data.extend(rar_file("a.rar"));
        data.extend_from_slice(&[0x00, 0x00, 0x72]);
        let result = BlockReader::new(Cursor::new(data)).unwrap().all_blocks();
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_packed_file_kind_requires_add_size() {
        let mut data = srr_header();
        data.extend(block(RAR_PACKED_FILE, 0, &[0, 0]));
        let result = BlockReader::new(Cursor::new(data)).unwrap().all_blocks();
        assert!(matches!(result, Err(Error::Format(_))));
    }
}
