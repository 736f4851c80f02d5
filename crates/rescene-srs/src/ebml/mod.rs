//! Matroska (EBML) samples.
//!
//! - `element` - Element IDs, headers and the skeleton tree
//! - `lacing` - Block headers and the four lacing schemes
//! - `demux` - Source-side search for each track's sample data
//! - `rebuild` - Skeleton-side reassembly

pub mod demux;
pub mod element;
pub mod lacing;
pub mod rebuild;

pub use demux::EbmlDemuxer;
pub use element::{parse_elements, Element, ElementBody, ElementHeader, ElementId, ElementKind};
pub use lacing::{BlockLayout, Lacing};
pub use rebuild::write_elements;

use crate::meta::{FileMeta, SampleMeta, TrackMeta};
use crate::Result;

/// EBML magic (`EBML` header element ID).
pub const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Collect the file and track records from every ReSample element.
pub fn find_meta(elements: &[Element]) -> Result<Option<SampleMeta>> {
    let mut file = None;
    let mut tracks = Vec::new();
    collect_meta(elements, &mut file, &mut tracks)?;
    Ok(SampleMeta::from_records(file, tracks))
}

fn collect_meta(
    elements: &[Element],
    file: &mut Option<FileMeta>,
    tracks: &mut Vec<TrackMeta>,
) -> Result<()> {
    for element in elements {
        if element.id().kind() == ElementKind::ReSample {
            for record in element.children() {
                match record.id() {
                    ElementId::RESAMPLE_FILE | ElementId::LEGACY_RESAMPLE_FILE => {
                        if file.is_none() {
                            *file = Some(FileMeta::parse(record.data())?);
                        }
                    }
                    ElementId::RESAMPLE_TRACK | ElementId::LEGACY_RESAMPLE_TRACK => {
                        tracks.push(TrackMeta::parse(record.data())?);
                    }
                    _ => {}
                }
            }
        } else {
            collect_meta(element.children(), file, tracks)?;
        }
    }
    Ok(())
}
