//! AVI (RIFF) samples.
//!
//! - `chunk` - Chunk headers and the skeleton chunk tree
//! - `demux` - Source-side search for each stream's chunks
//! - `rebuild` - Skeleton-side reassembly

pub mod chunk;
pub mod demux;
pub mod rebuild;

pub use chunk::{parse_chunks, Chunk, ChunkBody, ChunkHeader, FourCc};
pub use demux::RiffDemuxer;
pub use rebuild::write_chunks;

use crate::meta::{FileMeta, SampleMeta, TrackMeta};
use crate::Result;

/// RIFF magic.
pub const RIFF_MAGIC: [u8; 4] = *b"RIFF";

/// Collect the `SRSF` and `SRST` records of a skeleton.
pub fn find_meta(chunks: &[Chunk]) -> Result<Option<SampleMeta>> {
    let mut file = None;
    let mut tracks = Vec::new();
    for chunk in chunks {
        match chunk.fourcc() {
            FourCc::SRSF if file.is_none() => file = Some(FileMeta::parse(chunk.data())?),
            FourCc::SRST => tracks.push(TrackMeta::parse(chunk.data())?),
            _ => {}
        }
    }
    Ok(SampleMeta::from_records(file, tracks))
}
