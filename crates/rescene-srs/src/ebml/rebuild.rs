//! Writing a Matroska sample from its skeleton and extracted track data.

use super::element::{Element, ElementBody, ElementKind};
use crate::track::{MissingTrackPolicy, TrackStreams};
use crate::Result;
use std::io::Write;
use tracing::debug;

/// Write `elements` depth-first to `out`.
///
/// ReSample metadata is dropped and container headers are written verbatim
/// with their original sizes. Block headers are followed by their frames
/// pulled from `tracks`. Other leaves keep whatever body bytes the skeleton
/// holds.
pub fn write_elements<W: Write>(
    elements: &[Element],
    tracks: &mut TrackStreams,
    policy: MissingTrackPolicy,
    out: &mut W,
) -> Result<()> {
    for element in elements {
        if element.id().kind() == ElementKind::ReSample {
            debug!("Dropping ReSample element at offset {}", element.header.offset);
            continue;
        }

        out.write_all(element.header.raw())?;
        match &element.body {
            ElementBody::Container(children) => {
                write_elements(children, tracks, policy, out)?;
            }
            ElementBody::Open => {}
            ElementBody::Block { header, layout } => {
                out.write_all(header)?;
                let track = u32::try_from(layout.track_number).unwrap_or(u32::MAX);
                for &size in &layout.frame_sizes {
                    tracks.copy_frame(track, size, policy, out)?;
                }
            }
            ElementBody::Leaf(data) => out.write_all(data)?,
        }
    }
    Ok(())
}
