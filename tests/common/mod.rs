//! Shared fixtures for the CLI tests.
//!
//! Builds a small SRR (one stored-method volume plus an SFV) and a small
//! Matroska SRS together with the files they rebuild from.

#![allow(dead_code)]

use rescene_common::checksum::crc32;
use rescene_common::vint;
use rescene_srr::block::{flags, METHOD_STORE, RAR_MARKER_BYTES};
use rescene_srs::ebml::ElementId;
use rescene_srs::{FileMeta, TrackMeta};
use std::fs;
use std::path::{Path, PathBuf};

fn block(crc: u16, kind: u8, flag_bits: u16, body: &[u8]) -> Vec<u8> {
    let size = (7 + body.len()) as u16;
    let mut raw = crc.to_le_bytes().to_vec();
    raw.push(kind);
    raw.extend_from_slice(&flag_bits.to_le_bytes());
    raw.extend_from_slice(&size.to_le_bytes());
    raw.extend_from_slice(body);
    raw
}

fn prefixed(name: &str) -> Vec<u8> {
    let mut out = (name.len() as u16).to_le_bytes().to_vec();
    out.extend_from_slice(name.as_bytes());
    out
}

fn stored_file(name: &str, data: &[u8]) -> Vec<u8> {
    let mut body = (data.len() as u32).to_le_bytes().to_vec();
    body.extend(prefixed(name));
    let mut out = block(0x6A6A, 0x6A, flags::LONG_BLOCK, &body);
    out.extend_from_slice(data);
    out
}

fn packed_file(name: &str, size: u32) -> Vec<u8> {
    let mut body = size.to_le_bytes().to_vec();
    body.extend_from_slice(&size.to_le_bytes());
    body.push(2);
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    body.push(29);
    body.push(METHOD_STORE);
    body.extend_from_slice(&(name.len() as u16).to_le_bytes());
    body.extend_from_slice(&0x20u32.to_le_bytes());
    body.extend_from_slice(name.as_bytes());
    block(0x1234, 0x74, flags::LONG_BLOCK, &body)
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 13 % 251) as u8).collect()
}

/// A release with one volume `release.rar` storing `movie.mkv`.
pub struct Release {
    pub srr: PathBuf,
    pub source_dir: PathBuf,
    pub volume: Vec<u8>,
}

/// Write `release.srr` into `dir` and `movie.mkv` into `dir/source`.
///
/// With `bad_sfv` the stored SFV lists a wrong checksum for the volume.
pub fn write_release(dir: &Path, bad_sfv: bool) -> Release {
    let source = pattern(4000);
    let headers_before = [
        RAR_MARKER_BYTES.to_vec(),
        block(0x90CF, 0x73, 0x0001, &[0u8; 6]),
        packed_file("movie.mkv", source.len() as u32),
    ]
    .concat();
    let end = block(0x3DC4, 0x7B, 0, &[]);
    let volume = [headers_before.clone(), source.clone(), end.clone()].concat();

    let crc = if bad_sfv {
        !crc32(&volume)
    } else {
        crc32(&volume)
    };
    let sfv = format!("; release\nrelease.rar {:08x}\n", crc);

    let mut srr = block(0x6969, 0x69, flags::SRR_APP_NAME, &prefixed("rescene-test"));
    srr.extend(stored_file("release.nfo", b"nfo text"));
    srr.extend(stored_file("release.sfv", sfv.as_bytes()));
    srr.extend(block(0x7171, 0x71, 0, &prefixed("release.rar")));
    srr.extend(headers_before);
    srr.extend(end);

    let source_dir = dir.join("source");
    fs::create_dir_all(&source_dir).unwrap();
    fs::write(source_dir.join("movie.mkv"), &source).unwrap();
    let srr_path = dir.join("release.srr");
    fs::write(&srr_path, srr).unwrap();

    Release {
        srr: srr_path,
        source_dir,
        volume,
    }
}

fn element(id: ElementId, size: usize, body: &[u8]) -> Vec<u8> {
    let mut out = id.to_bytes();
    out.extend(vint::encode(size as u64));
    out.extend_from_slice(body);
    out
}

fn cluster(track: u8, frame: &[u8], stripped: bool) -> Vec<u8> {
    let block_header = [0x80 | track, 0x00, 0x00, 0x80];
    let block_size = block_header.len() + frame.len();
    let block = if stripped {
        element(ElementId::SIMPLE_BLOCK, block_size, &block_header)
    } else {
        element(
            ElementId::SIMPLE_BLOCK,
            block_size,
            &[block_header.as_slice(), frame].concat(),
        )
    };
    let timecode = element(ElementId(0xE7), 1, &[0]);
    let full_size = timecode.len() + element(ElementId::SIMPLE_BLOCK, block_size, &[]).len()
        + block_size;
    element(ElementId::CLUSTER, full_size, &[timecode, block].concat())
}

/// A sample set: the SRS, the full source and the expected sample bytes.
pub struct SampleSet {
    pub srs: PathBuf,
    pub source: PathBuf,
    pub sample: Vec<u8>,
}

/// Write `sample.srs` and `movie.mkv` into `dir`.
pub fn write_sample_set(dir: &Path) -> SampleSet {
    let ebml = element(ElementId::EBML, 4, &[0x42, 0x86, 0x81, 0x01]);
    let lead_in = pattern(90);
    let frame = pattern(300)[100..].to_vec();

    let source_clusters = [cluster(1, &lead_in, false), cluster(1, &frame, false)].concat();
    let source_segment = element(ElementId::SEGMENT, source_clusters.len(), &source_clusters);
    let source = [ebml.clone(), source_segment].concat();
    let match_offset = (ebml.len()
        + element(ElementId::SEGMENT, source_clusters.len(), &[]).len()
        + cluster(1, &lead_in, false).len()) as u64;

    let sample_cluster = cluster(1, &frame, false);
    let sample_segment = element(ElementId::SEGMENT, sample_cluster.len(), &sample_cluster);
    let sample = [ebml.clone(), sample_segment].concat();

    let file_meta = FileMeta {
        flags: 0,
        app_name: "rescene-test".to_string(),
        sample_name: "sample.mkv".to_string(),
        original_size: sample.len() as u64,
        crc32: crc32(&sample),
    }
    .to_bytes();
    let track_meta = TrackMeta {
        flags: 0,
        track_number: 1,
        data_length: frame.len() as u64,
        match_offset,
        signature: Vec::new(),
    }
    .to_bytes();
    let records = [
        element(ElementId::RESAMPLE_FILE, file_meta.len(), &file_meta),
        element(ElementId::RESAMPLE_TRACK, track_meta.len(), &track_meta),
    ]
    .concat();
    let resample = element(ElementId::RESAMPLE, records.len(), &records);

    let mut srs = ebml;
    srs.extend(element(ElementId::SEGMENT, sample_cluster.len(), &[]));
    srs.extend(resample);
    srs.extend(cluster(1, &frame, true));

    let srs_path = dir.join("sample.srs");
    let source_path = dir.join("movie.mkv");
    fs::write(&srs_path, srs).unwrap();
    fs::write(&source_path, source).unwrap();

    SampleSet {
        srs: srs_path,
        source: source_path,
        sample,
    }
}
