//! Per-track sample data pulled out of the full source file.
//!
//! A demuxer produces, for every requested track, the list of source byte
//! ranges that make up the sample's frames in file order. [`TrackStreams`]
//! copies those ranges into one spooled buffer per track; the rebuilders
//! then read frames back out in the same order.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::SpooledTempFile;
use tracing::{debug, warn};

/// Track data kept in memory up to this size before spilling to disk.
const SPOOL_LIMIT: usize = 16 * 1024 * 1024;

/// What to do when a frame needs more track data than was extracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "kebab-case"))]
pub enum MissingTrackPolicy {
    /// Write zero bytes so the output keeps its declared shape.
    #[default]
    ZeroFill,
    /// Abort the rebuild with [`Error::MissingTrackData`].
    Fail,
}

/// A contiguous byte range in the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub offset: u64,
    pub len: u64,
}

/// Source spans per track number, in file order.
pub type TrackPlan = BTreeMap<u32, Vec<SourceSpan>>;

/// Reads a list of spans of a seekable source as one continuous stream.
pub struct SpanReader<R> {
    inner: R,
    spans: Vec<SourceSpan>,
    index: usize,
    /// Bytes already read from `spans[index]`.
    consumed: u64,
}

impl<R: Read + Seek> SpanReader<R> {
    pub fn new(inner: R, spans: Vec<SourceSpan>) -> Self {
        Self {
            inner,
            spans,
            index: 0,
            consumed: 0,
        }
    }

    /// Total length of all spans.
    pub fn len(&self) -> u64 {
        self.spans.iter().map(|s| s.len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: Read + Seek> Read for SpanReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while let Some(span) = self.spans.get(self.index) {
            let left = span.len - self.consumed;
            if left == 0 {
                self.index += 1;
                self.consumed = 0;
                continue;
            }
            if self.consumed == 0 {
                self.inner.seek(SeekFrom::Start(span.offset))?;
            }

            let want = buf.len().min(usize::try_from(left).unwrap_or(usize::MAX));
            let n = self.inner.read(&mut buf[..want])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("source ended inside span at offset {}", span.offset),
                ));
            }
            self.consumed += n as u64;
            return Ok(n);
        }
        Ok(0)
    }
}

struct TrackStream {
    data: SpooledTempFile,
    len: u64,
    read: u64,
    /// Zero bytes already written for this track; logged once.
    warned: bool,
}

/// Extracted data of every track, ready to be read back frame by frame.
pub struct TrackStreams {
    tracks: BTreeMap<u32, TrackStream>,
    zero_filled: u64,
}

impl TrackStreams {
    /// Streams with no track data at all; every frame falls to the policy.
    pub fn empty() -> Self {
        Self {
            tracks: BTreeMap::new(),
            zero_filled: 0,
        }
    }

    /// Copy every planned span out of the source file.
    pub fn extract(source: &Path, plan: &TrackPlan) -> Result<Self> {
        let mut streams = Self::empty();
        for (&track, spans) in plan {
            let file = BufReader::new(File::open(source)?);
            let reader = SpanReader::new(file, spans.clone());
            streams.insert_reader(track, reader)?;
        }
        Ok(streams)
    }

    /// Add a track's data from any reader.
    pub fn insert_reader<R: Read>(&mut self, track: u32, mut reader: R) -> Result<u64> {
        let mut data = SpooledTempFile::new(SPOOL_LIMIT);
        let len = io::copy(&mut reader, &mut data)?;
        data.seek(SeekFrom::Start(0))?;
        debug!("Track {}: {} bytes extracted", track, len);
        self.tracks.insert(
            track,
            TrackStream {
                data,
                len,
                read: 0,
                warned: false,
            },
        );
        Ok(len)
    }

    /// Add a track's data from memory.
    pub fn insert_bytes(&mut self, track: u32, bytes: &[u8]) -> Result<u64> {
        self.insert_reader(track, bytes)
    }

    pub fn contains(&self, track: u32) -> bool {
        self.tracks.contains_key(&track)
    }

    /// Bytes extracted for a track.
    pub fn len_of(&self, track: u32) -> Option<u64> {
        self.tracks.get(&track).map(|t| t.len)
    }

    /// Zero bytes written in place of missing track data so far.
    pub fn zero_filled(&self) -> u64 {
        self.zero_filled
    }

    /// Write the next `len` bytes of `track` to `out`, applying `policy`
    /// when the track is unknown or exhausted.
    pub fn copy_frame<W: Write>(
        &mut self,
        track: u32,
        len: u64,
        policy: MissingTrackPolicy,
        out: &mut W,
    ) -> Result<()> {
        let copied = match self.tracks.get_mut(&track) {
            Some(stream) => {
                let n = io::copy(&mut (&mut stream.data).take(len), out)?;
                stream.read += n;
                n
            }
            None => 0,
        };
        if copied == len {
            return Ok(());
        }

        let missing = len - copied;
        if policy == MissingTrackPolicy::Fail {
            return Err(Error::MissingTrackData {
                track,
                needed: missing,
            });
        }

        let first_time = match self.tracks.get_mut(&track) {
            Some(stream) => !std::mem::replace(&mut stream.warned, true),
            None => {
                // Remember unknown tracks so the warning is not repeated.
                self.tracks.insert(
                    track,
                    TrackStream {
                        data: SpooledTempFile::new(0),
                        len: 0,
                        read: 0,
                        warned: true,
                    },
                );
                true
            }
        };
        if first_time {
            warn!("Track {} data exhausted, zero-filling", track);
        }

        io::copy(&mut io::repeat(0).take(missing), out)?;
        self.zero_filled += missing;
        Ok(())
    }

    /// Tracks whose extracted data was not fully consumed by the rebuild.
    pub fn unread(&self) -> Vec<(u32, u64)> {
        self.tracks
            .iter()
            .filter(|(_, t)| t.read < t.len)
            .map(|(&n, t)| (n, t.len - t.read))
            .collect()
    }
}
