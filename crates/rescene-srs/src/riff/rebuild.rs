//! Writing an AVI sample from its skeleton and extracted stream data.

use super::chunk::{Chunk, ChunkBody};
use crate::track::{MissingTrackPolicy, TrackStreams};
use crate::Result;
use std::io::Write;
use tracing::debug;

/// Write `chunks` in order to `out`.
///
/// `SRSF`/`SRST` chunks are dropped. Each stream chunk gets `size` bytes
/// of its stream's data plus a zero pad byte when `size` is odd.
pub fn write_chunks<W: Write>(
    chunks: &[Chunk],
    tracks: &mut TrackStreams,
    policy: MissingTrackPolicy,
    out: &mut W,
) -> Result<()> {
    for chunk in chunks {
        if chunk.is_meta() {
            debug!("Dropping {} chunk at offset {}", chunk.fourcc(), chunk.header.offset);
            continue;
        }

        out.write_all(&chunk.header.to_bytes())?;
        match &chunk.body {
            ChunkBody::List => {}
            ChunkBody::Stream { track } => {
                let size = chunk.header.size as u64;
                tracks.copy_frame(*track, size, policy, out)?;
                if size % 2 == 1 {
                    out.write_all(&[0])?;
                }
            }
            ChunkBody::Data(data) => out.write_all(data)?,
        }
    }
    Ok(())
}
