//! Locating sample track data inside a full AVI file.

use super::chunk::ChunkHeader;
use crate::meta::TrackMeta;
use crate::track::{SourceSpan, TrackPlan};
use crate::Result;
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, warn};

/// Walks the chunk structure of a source AVI and records, per stream, the
/// byte ranges holding the sample's chunk data.
pub struct RiffDemuxer<R> {
    reader: R,
    file_size: u64,
}

impl<R: Read + Seek> RiffDemuxer<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self { reader, file_size })
    }

    /// Build the extraction plan for `tracks`.
    ///
    /// Stream chunks whose data ends at or before a track's match offset are
    /// ignored. The first chunk straddling the match offset contributes only
    /// the bytes after it (the initial skip); later chunks contribute in
    /// full until `data_length` is reached.
    pub fn plan(&mut self, tracks: &BTreeMap<u32, TrackMeta>) -> Result<TrackPlan> {
        let mut remaining: BTreeMap<u32, u64> =
            tracks.iter().map(|(&n, t)| (n, t.data_length)).collect();
        let mut plan: TrackPlan = tracks.keys().map(|&n| (n, Vec::new())).collect();

        self.walk(0, self.file_size, tracks, &mut remaining, &mut plan)?;

        for (track, left) in &remaining {
            if *left > 0 {
                warn!("Stream {}: source ended with {} bytes not found", track, left);
            }
        }
        Ok(plan)
    }

    fn walk(
        &mut self,
        start: u64,
        end: u64,
        tracks: &BTreeMap<u32, TrackMeta>,
        remaining: &mut BTreeMap<u32, u64>,
        plan: &mut TrackPlan,
    ) -> Result<()> {
        let mut pos = start;

        while pos < end && remaining.values().any(|&r| r > 0) {
            self.reader.seek(SeekFrom::Start(pos))?;
            let Some(header) = ChunkHeader::read(&mut self.reader, pos)? else {
                break;
            };
            let chunk_end = header.end_within(end);

            if header.list_type.is_some() {
                self.walk(header.data_offset(), chunk_end, tracks, remaining, plan)?;
            } else if let Some(track) = header.fourcc.stream_number() {
                if let (Some(meta), Some(left)) = (tracks.get(&track), remaining.get_mut(&track)) {
                    let data_start = header.data_offset();
                    let data_end = data_start + header.size as u64;
                    if *left > 0 && data_end > meta.match_offset {
                        let skip = meta.match_offset.saturating_sub(data_start);
                        let len = (header.size as u64 - skip).min(*left);
                        *left -= len;
                        if let Some(spans) = plan.get_mut(&track) {
                            spans.push(SourceSpan {
                                offset: data_start + skip,
                                len,
                            });
                        }
                        debug!(
                            "Stream {}: {} bytes at offset {} (skip {})",
                            track,
                            len,
                            data_start + skip,
                            skip
                        );
                    }
                }
            }

            pos = chunk_end;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn chunk(fourcc: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut out = fourcc.to_vec();
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        if data.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn list(fourcc: &[u8; 4], list_type: &[u8; 4], children: &[u8]) -> Vec<u8> {
        let mut out = fourcc.to_vec();
        out.extend_from_slice(&(children.len() as u32 + 4).to_le_bytes());
        out.extend_from_slice(list_type);
        out.extend_from_slice(children);
        out
    }

    fn track(number: u32, data_length: u64, match_offset: u64) -> (u32, TrackMeta) {
        (
            number,
            TrackMeta {
                flags: 0,
                track_number: number,
                data_length,
                match_offset,
                signature: Vec::new(),
            },
        )
    }

    #[test]
    fn test_plan_with_initial_skip() {
        let mut movi = chunk(b"00dc", &[1u8; 10]);
        movi.extend(chunk(b"01wb", &[2u8; 7]));
        movi.extend(chunk(b"00dc", &[3u8; 10]));
        let file = list(b"RIFF", b"AVI ", &list(b"LIST", b"movi", &movi));

        // RIFF(12) + LIST(12) + first 00dc header(8) = 32; start 4 bytes in.
        let tracks: BTreeMap<_, _> = [track(0, 12, 36), track(1, 7, 0)].into();
        let plan = RiffDemuxer::new(Cursor::new(&file)).unwrap().plan(&tracks).unwrap();

        assert_eq!(
            plan[&0],
            vec![
                SourceSpan { offset: 36, len: 6 },
                SourceSpan { offset: 32 + 10 + 8 + 8 + 8, len: 6 },
            ]
        );
        assert_eq!(plan[&1], vec![SourceSpan { offset: 50, len: 7 }]);
    }

    #[test]
    fn test_chunks_before_match_offset_are_ignored() {
        let mut movi = chunk(b"00dc", &[1u8; 4]);
        movi.extend(chunk(b"00dc", &[2u8; 4]));
        let file = list(b"LIST", b"movi", &movi);

        // Match at the second chunk's header.
        let tracks: BTreeMap<_, _> = [track(0, 4, 12 + 12)].into();
        let plan = RiffDemuxer::new(Cursor::new(&file)).unwrap().plan(&tracks).unwrap();
        assert_eq!(plan[&0], vec![SourceSpan { offset: 32, len: 4 }]);
    }
}
