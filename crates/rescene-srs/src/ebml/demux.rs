//! Locating sample track data inside a full Matroska file.

use super::element::{ElementHeader, ElementId, ElementKind};
use super::lacing::BlockLayout;
use crate::meta::{self, TrackMeta};
use crate::track::{SourceSpan, TrackPlan};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, warn};

/// Block header bytes read before falling back to reading the whole body.
const BLOCK_HEADER_PROBE: u64 = 4096;

/// Largest block body read in full to decode an oversized lace header.
const MAX_BLOCK_SIZE: u64 = 64 * 1024 * 1024;

struct PlanState<'a> {
    tracks: &'a BTreeMap<u32, TrackMeta>,
    remaining: BTreeMap<u32, u64>,
    plan: TrackPlan,
    min_offset: u64,
}

/// Byte range of a container being walked.
struct Scope {
    end: u64,
    /// ID of an unknown-size container, closed by the next element with the same ID.
    open_id: Option<ElementId>,
}

impl PlanState<'_> {
    fn done(&self) -> bool {
        self.remaining.values().all(|&r| r == 0)
    }
}

/// Walks the element structure of a source MKV and records, per track, the
/// byte ranges holding the sample's frames.
pub struct EbmlDemuxer<R> {
    reader: R,
    file_size: u64,
}

impl<R: Read + Seek> EbmlDemuxer<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self { reader, file_size })
    }

    /// Build the extraction plan for `tracks`.
    ///
    /// A block contributes to its track when its first frame starts at or
    /// after the track's match offset; frames are taken until the track's
    /// `data_length` is reached. Clusters ending before the smallest match
    /// offset are skipped without being read.
    pub fn plan(&mut self, tracks: &BTreeMap<u32, TrackMeta>) -> Result<TrackPlan> {
        let mut state = PlanState {
            tracks,
            remaining: tracks
                .iter()
                .map(|(&n, t)| (n, t.data_length))
                .collect(),
            plan: tracks.keys().map(|&n| (n, Vec::new())).collect(),
            min_offset: meta::min_match_offset(tracks),
        };

        self.walk(&mut state)?;

        for (track, left) in &state.remaining {
            if *left > 0 {
                warn!("Track {}: source ended with {} bytes not found", track, left);
            }
        }
        Ok(state.plan)
    }

    fn walk(&mut self, state: &mut PlanState<'_>) -> Result<()> {
        let mut scopes = vec![Scope {
            end: self.file_size,
            open_id: None,
        }];
        let mut pos = 0;

        while !state.done() {
            while scopes.len() > 1 && scopes.last().is_some_and(|s| pos >= s.end) {
                scopes.pop();
            }
            let end = scopes.last().map_or(self.file_size, |s| s.end);
            if pos >= end {
                break;
            }

            self.reader.seek(SeekFrom::Start(pos))?;
            let header = match ElementHeader::read(&mut self.reader, pos) {
                Ok(header) => header,
                Err(Error::Common(rescene_common::Error::UnexpectedEof { .. })) => break,
                Err(e) => return Err(e),
            };

            // An unknown-size element ends where the next element with its own ID starts.
            if let Some(i) = scopes.iter().rposition(|s| s.open_id == Some(header.id)) {
                scopes.truncate(i);
            }
            let end = scopes.last().map_or(self.file_size, |s| s.end);
            let elem_end = header.end_within(end);

            match header.id.kind() {
                ElementKind::Container => {
                    let before_samples = header.id == ElementId::CLUSTER
                        && header.size.is_some()
                        && elem_end <= state.min_offset;
                    if before_samples {
                        debug!("Skipping cluster at offset {}", pos);
                    } else {
                        scopes.push(Scope {
                            end: elem_end,
                            open_id: header.size.is_none().then_some(header.id),
                        });
                        pos = header.data_offset();
                        continue;
                    }
                }
                ElementKind::Block => self.plan_block(&header, elem_end, state)?,
                ElementKind::ReSample | ElementKind::Leaf => {}
            }

            pos = elem_end;
        }
        Ok(())
    }

    fn plan_block(
        &mut self,
        header: &ElementHeader,
        elem_end: u64,
        state: &mut PlanState<'_>,
    ) -> Result<()> {
        let data_start = header.data_offset();
        let body_size = elem_end.saturating_sub(data_start);
        let layout = self.read_layout(data_start, body_size)?;

        let Ok(track) = u32::try_from(layout.track_number) else {
            return Ok(());
        };
        let Some(meta) = state.tracks.get(&track) else {
            return Ok(());
        };
        let frames_start = data_start + layout.header_len as u64;
        if frames_start < meta.match_offset {
            return Ok(());
        }
        let Some(left) = state.remaining.get_mut(&track) else {
            return Ok(());
        };
        if *left == 0 {
            return Ok(());
        }

        let len = layout.data_len().min(*left);
        *left -= len;
        if let Some(spans) = state.plan.get_mut(&track) {
            spans.push(SourceSpan {
                offset: frames_start,
                len,
            });
        }
        debug!(
            "Track {}: {} bytes at offset {} ({} frames)",
            track,
            len,
            frames_start,
            layout.frame_sizes.len()
        );
        Ok(())
    }

    fn read_layout(&mut self, data_start: u64, body_size: u64) -> Result<BlockLayout> {
        let probe = body_size.min(BLOCK_HEADER_PROBE);
        let data = self.read_at(data_start, probe)?;
        match BlockLayout::parse(&data, body_size) {
            Ok(layout) => Ok(layout),
            Err(_) if probe < body_size && body_size <= MAX_BLOCK_SIZE => {
                let data = self.read_at(data_start, body_size)?;
                BlockLayout::parse(&data, body_size)
            }
            Err(e) => Err(e),
        }
    }

    fn read_at(&mut self, offset: u64, len: u64) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut data = Vec::with_capacity(len as usize);
        (&mut self.reader).take(len).read_to_end(&mut data)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rescene_common::vint;
    use std::io::Cursor;

    fn element(id: ElementId, body: &[u8]) -> Vec<u8> {
        let mut out = id.to_bytes();
        out.extend(vint::encode(body.len() as u64));
        out.extend_from_slice(body);
        out
    }

    fn simple_block(track: u8, frame: &[u8]) -> Vec<u8> {
        let mut body = vec![0x80 | track, 0x00, 0x00, 0x80];
        body.extend_from_slice(frame);
        element(ElementId::SIMPLE_BLOCK, &body)
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
    fn test_plan_skips_early_blocks_and_caps_length() {
        let mut clusters = Vec::new();
        let early = element(ElementId::CLUSTER, &simple_block(1, &[1u8; 10]));
        clusters.extend(&early);
        let mut second = simple_block(1, &[2u8; 10]);
        second.extend(simple_block(2, &[3u8; 6]));
        second.extend(simple_block(1, &[4u8; 10]));
        clusters.extend(element(ElementId::CLUSTER, &second));
        let file = element(ElementId::SEGMENT, &clusters);

        // Segment header 4+1, first cluster is `early.len()` bytes.
        let second_cluster = 5 + early.len() as u64;
        let tracks: BTreeMap<_, _> = [track(1, 15, second_cluster), track(2, 6, 0)].into();

        let plan = EbmlDemuxer::new(Cursor::new(file)).unwrap().plan(&tracks).unwrap();
        let spans_1 = &plan[&1];
        assert_eq!(spans_1.len(), 2);
        assert_eq!(spans_1[0].len, 10);
        assert_eq!(spans_1[1].len, 5);
        assert!(spans_1[0].offset > second_cluster);
        assert_eq!(plan[&2].iter().map(|s| s.len).sum::<u64>(), 6);
    }

    #[test]
    fn test_unrequested_tracks_are_ignored() {
        let cluster = element(ElementId::CLUSTER, &simple_block(3, &[9u8; 4]));
        let tracks: BTreeMap<_, _> = [track(1, 4, 0)].into();
        let plan = EbmlDemuxer::new(Cursor::new(cluster)).unwrap().plan(&tracks).unwrap();
        assert!(plan[&1].is_empty());
    }

    fn unknown_size(id: ElementId, body: &[u8]) -> Vec<u8> {
        let mut out = id.to_bytes();
        out.push(0xFF);
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_unknown_size_clusters_are_siblings() {
        let timecode = [0xE7, 0x81, 0x00];
        let mut clusters = Vec::new();
        for _ in 0..20_000 {
            clusters.extend(unknown_size(ElementId::CLUSTER, &timecode));
        }
        let last_cluster = 5 + clusters.len() as u64;
        let mut last = timecode.to_vec();
        last.extend(simple_block(1, &[7u8; 10]));
        clusters.extend(unknown_size(ElementId::CLUSTER, &last));
        let file = unknown_size(ElementId::SEGMENT, &clusters);

        let tracks: BTreeMap<_, _> = [track(1, 10, 0)].into();
        let plan = EbmlDemuxer::new(Cursor::new(file)).unwrap().plan(&tracks).unwrap();

        // Cluster header 4+1, timecode 3, SimpleBlock header 1+1+4.
        assert_eq!(
            plan[&1],
            vec![SourceSpan {
                offset: last_cluster + 5 + 3 + 6,
                len: 10,
            }]
        );
    }

    #[test]
    fn test_unknown_size_cluster_followed_by_sized_cluster() {
        let mut clusters = unknown_size(ElementId::CLUSTER, &simple_block(1, &[1u8; 4]));
        clusters.extend(element(ElementId::CLUSTER, &simple_block(1, &[2u8; 4])));
        let file = element(ElementId::SEGMENT, &clusters);

        let tracks: BTreeMap<_, _> = [track(1, 8, 0)].into();
        let plan = EbmlDemuxer::new(Cursor::new(file)).unwrap().plan(&tracks).unwrap();
        assert_eq!(plan[&1].len(), 2);
        assert_eq!(plan[&1].iter().map(|s| s.len).sum::<u64>(), 8);
    }
}
