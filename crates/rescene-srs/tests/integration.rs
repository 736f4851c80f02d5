//! Integration tests for rescene-srs

use rescene_common::checksum::crc32;
use rescene_common::vint;
use rescene_srs::ebml::{ElementId, Lacing};
use rescene_srs::{
    Error, FileMeta, MissingTrackPolicy, SampleKind, SampleOptions, SrsFile, TrackMeta,
};
use std::fs;
use tempfile::tempdir;

fn header(id: ElementId, size: usize) -> Vec<u8> {
    let mut out = id.to_bytes();
    out.extend(vint::encode(size as u64));
    out
}

fn frame(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| seed.wrapping_mul(31).wrapping_add(i as u8))
        .collect()
}

/// Matroska element tree that can be written in full or with frame data
/// stripped, the way an SRS stores it.
#[derive(Clone)]
enum Node {
    Leaf(ElementId, Vec<u8>),
    Master(ElementId, Vec<Node>),
    Block(ElementId, u8, Lacing, Vec<Vec<u8>>),
}

impl Node {
    fn simple_block(track: u8, lacing: Lacing, frames: Vec<Vec<u8>>) -> Self {
        Node::Block(ElementId::SIMPLE_BLOCK, track, lacing, frames)
    }

    fn block_parts(&self) -> (Vec<u8>, Vec<u8>) {
        let Node::Block(_, track, lacing, frames) = self else {
            panic!("not a block");
        };
        let sizes: Vec<u64> = frames.iter().map(|f| f.len() as u64).collect();
        let mut head = vec![0x80 | track, 0x00, 0x00, 0x80 | lacing.flag_bits()];
        head.extend(lacing.encode_header(&sizes).unwrap());
        (head, frames.concat())
    }

    fn body_len(&self) -> usize {
        match self {
            Node::Leaf(_, data) => data.len(),
            Node::Master(_, children) => children.iter().map(|c| c.full().len()).sum(),
            Node::Block(..) => {
                let (head, frames) = self.block_parts();
                head.len() + frames.len()
            }
        }
    }

    fn id(&self) -> ElementId {
        match self {
            Node::Leaf(id, _) | Node::Master(id, _) | Node::Block(id, ..) => *id,
        }
    }

    fn full(&self) -> Vec<u8> {
        let mut out = header(self.id(), self.body_len());
        match self {
            Node::Leaf(_, data) => out.extend(data),
            Node::Master(_, children) => out.extend(children.iter().flat_map(Node::full)),
            Node::Block(..) => {
                let (head, frames) = self.block_parts();
                out.extend(head);
                out.extend(frames);
            }
        }
        out
    }

    fn stripped(&self) -> Vec<u8> {
        let mut out = header(self.id(), self.body_len());
        match self {
            Node::Leaf(_, data) => out.extend(data),
            Node::Master(_, children) => out.extend(children.iter().flat_map(Node::stripped)),
            Node::Block(..) => out.extend(self.block_parts().0),
        }
        out
    }
}

fn cluster(timecode: u8, blocks: Vec<Node>) -> Node {
    let mut children = vec![Node::Leaf(ElementId(0xE7), vec![timecode])];
    children.extend(blocks);
    Node::Master(ElementId::CLUSTER, children)
}

struct MkvFixture {
    source: Vec<u8>,
    sample: Vec<u8>,
    srs: Vec<u8>,
    match_offset: u64,
}

const TRACK_1_LEN: u64 = 365 + 170 + 48;
const TRACK_2_LEN: u64 = 33 + 21;

/// Four clusters in the source; the sample holds clusters two and three.
/// `ids` are the ReSample, FileData and TrackData element IDs to use.
fn mkv_fixture(ids: [ElementId; 3]) -> MkvFixture {
    let ebml = Node::Leaf(ElementId::EBML, vec![0x42, 0x86, 0x81, 0x01]);
    let info = Node::Leaf(ElementId(0x1549_A966), b"info".to_vec());
    let tracks = Node::Leaf(ElementId(0x1654_AE6B), b"tracks".to_vec());

    let c1 = cluster(
        0,
        vec![
            Node::simple_block(1, Lacing::None, vec![frame(1, 100)]),
            Node::simple_block(2, Lacing::None, vec![frame(2, 30)]),
        ],
    );
    let c2 = cluster(
        1,
        vec![
            Node::simple_block(
                1,
                Lacing::Xiph,
                vec![frame(3, 40), frame(4, 300), frame(5, 25)],
            ),
            Node::simple_block(2, Lacing::None, vec![frame(6, 33)]),
            Node::Master(
                ElementId::BLOCK_GROUP,
                vec![
                    Node::Block(
                        ElementId::BLOCK,
                        1,
                        Lacing::Ebml,
                        vec![frame(7, 70), frame(8, 10), frame(9, 90)],
                    ),
                    Node::Leaf(ElementId(0x9B), vec![5]),
                ],
            ),
        ],
    );
    let c3 = cluster(
        2,
        vec![
            Node::simple_block(
                1,
                Lacing::Fixed,
                vec![frame(10, 16), frame(11, 16), frame(12, 16)],
            ),
            Node::simple_block(2, Lacing::None, vec![frame(13, 21)]),
        ],
    );
    let c4 = cluster(
        3,
        vec![
            Node::simple_block(1, Lacing::None, vec![frame(14, 50)]),
            Node::simple_block(2, Lacing::None, vec![frame(15, 10)]),
        ],
    );

    let source_segment = Node::Master(
        ElementId::SEGMENT,
        vec![info.clone(), tracks.clone(), c1.clone(), c2.clone(), c3.clone(), c4],
    );
    let source = [ebml.full(), source_segment.full()].concat();
    let match_offset = (ebml.full().len()
        + header(ElementId::SEGMENT, source_segment.body_len()).len()
        + info.full().len()
        + tracks.full().len()
        + c1.full().len()) as u64;

    let sample_segment = Node::Master(ElementId::SEGMENT, vec![info, tracks, c2, c3]);
    let sample = [ebml.full(), sample_segment.full()].concat();

    let [resample_id, file_id, track_id] = ids;
    let file_meta = FileMeta {
        flags: 0,
        app_name: "rescene-test".to_string(),
        sample_name: "sample.mkv".to_string(),
        original_size: sample.len() as u64,
        crc32: crc32(&sample),
    };
    let mut records = Vec::new();
    let file_bytes = file_meta.to_bytes();
    records.extend(header(file_id, file_bytes.len()));
    records.extend(file_bytes);
    for (number, len) in [(1, TRACK_1_LEN), (2, TRACK_2_LEN)] {
        let track = TrackMeta {
            flags: 0,
            track_number: number,
            data_length: len,
            match_offset,
            signature: Vec::new(),
        };
        let bytes = track.to_bytes();
        records.extend(header(track_id, bytes.len()));
        records.extend(bytes);
    }
    let resample = [header(resample_id, records.len()), records].concat();

    let Node::Master(_, sample_children) = &sample_segment else {
        unreachable!()
    };
    let mut srs = ebml.full();
    srs.extend(header(ElementId::SEGMENT, sample_segment.body_len()));
    srs.extend(resample);
    srs.extend(sample_children.iter().flat_map(Node::stripped));

    MkvFixture {
        source,
        sample,
        srs,
        match_offset,
    }
}

fn standard_ids() -> [ElementId; 3] {
    [
        ElementId::RESAMPLE,
        ElementId::RESAMPLE_FILE,
        ElementId::RESAMPLE_TRACK,
    ]
}

#[test]
fn test_mkv_sample_round_trip() {
    let fixture = mkv_fixture(standard_ids());
    let dir = tempdir().unwrap();
    let source = dir.path().join("movie.mkv");
    fs::write(&source, &fixture.source).unwrap();

    let srs = SrsFile::parse(&fixture.srs).unwrap();
    assert_eq!(srs.kind, SampleKind::Mkv);
    assert_eq!(srs.meta.file.sample_name, "sample.mkv");
    assert_eq!(srs.meta.tracks.len(), 2);
    assert_eq!(srs.meta.min_match_offset(), fixture.match_offset);

    let out = dir.path().join("out").join(srs.output_name());
    let report = srs
        .rebuild_to_file(&source, &out, &SampleOptions::default())
        .unwrap();

    assert!(report.is_match());
    assert_eq!(report.size, fixture.sample.len() as u64);
    assert_eq!(report.zero_filled, 0);
    assert_eq!(fs::read(&out).unwrap(), fixture.sample);
}

#[test]
fn test_plan_follows_lacing() {
    let fixture = mkv_fixture(standard_ids());
    let dir = tempdir().unwrap();
    let source = dir.path().join("movie.mkv");
    fs::write(&source, &fixture.source).unwrap();

    let srs = SrsFile::parse(&fixture.srs).unwrap();
    let plan = srs.plan(&source).unwrap();

    let lens: Vec<u64> = plan[&1].iter().map(|s| s.len).collect();
    assert_eq!(lens, vec![365, 170, 48]);
    assert_eq!(plan[&2].iter().map(|s| s.len).sum::<u64>(), TRACK_2_LEN);
    assert!(plan
        .values()
        .flatten()
        .all(|span| span.offset >= fixture.match_offset));
}

#[test]
fn test_legacy_resample_ids() {
    let fixture = mkv_fixture([
        ElementId::LEGACY_RESAMPLE,
        ElementId::LEGACY_RESAMPLE_FILE,
        ElementId::LEGACY_RESAMPLE_TRACK,
    ]);
    let dir = tempdir().unwrap();
    let source = dir.path().join("movie.mkv");
    fs::write(&source, &fixture.source).unwrap();

    let srs = SrsFile::parse(&fixture.srs).unwrap();
    assert_eq!(srs.meta.tracks[&1].data_length, TRACK_1_LEN);

    let out = dir.path().join("sample.mkv");
    let report = srs
        .rebuild_to_file(&source, &out, &SampleOptions::default())
        .unwrap();
    assert!(report.is_match());
}

#[test]
fn test_missing_track_data_is_zero_filled() {
    let fixture = mkv_fixture(standard_ids());
    let dir = tempdir().unwrap();
    let source = dir.path().join("movie.mkv");

    // Cut the source right after the first sample block of track 1.
    let srs = SrsFile::parse(&fixture.srs).unwrap();
    fs::write(&source, &fixture.source).unwrap();
    let first_span = srs.plan(&source).unwrap()[&1][0];
    let cut = (first_span.offset + first_span.len) as usize;
    fs::write(&source, &fixture.source[..cut]).unwrap();

    let out = dir.path().join("sample.mkv");
    let report = srs
        .rebuild_to_file(&source, &out, &SampleOptions::default())
        .unwrap();

    assert_eq!(report.size, report.expected_size);
    assert_ne!(report.crc32, report.expected_crc32);
    assert!(!report.is_match());
    assert_eq!(report.zero_filled, TRACK_1_LEN - 365 + TRACK_2_LEN);
    assert_eq!(fs::metadata(&out).unwrap().len(), fixture.sample.len() as u64);
}

#[test]
fn test_strict_policy_fails_and_removes_output() {
    let fixture = mkv_fixture(standard_ids());
    let dir = tempdir().unwrap();
    let source = dir.path().join("movie.mkv");
    fs::write(&source, &fixture.source[..fixture.match_offset as usize]).unwrap();

    let srs = SrsFile::parse(&fixture.srs).unwrap();
    let out = dir.path().join("sample.mkv");
    let options = SampleOptions {
        missing_tracks: MissingTrackPolicy::Fail,
    };
    let err = srs.rebuild_to_file(&source, &out, &options).unwrap_err();

    assert!(matches!(err, Error::MissingTrackData { track: 1, .. }));
    assert!(!out.exists());
}

#[test]
fn test_srs_without_metadata() {
    let mut srs = header(ElementId::EBML, 1);
    srs.push(0);
    let err = SrsFile::parse(&srs).unwrap_err();
    assert!(matches!(err, Error::NoMetadata));
}

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

fn stream_header(fourcc: &[u8; 4], len: usize) -> Vec<u8> {
    let mut out = fourcc.to_vec();
    out.extend_from_slice(&(len as u32).to_le_bytes());
    out
}

#[test]
fn test_avi_sample_round_trip() {
    let hdrl = list(b"LIST", b"hdrl", &chunk(b"avih", &frame(20, 56)));
    let streams: Vec<(&[u8; 4], Vec<u8>)> = vec![
        (b"00dc", frame(21, 120)),
        (b"01wb", frame(22, 40)),
        (b"00dc", frame(23, 33)),
        (b"01wb", frame(24, 41)),
        (b"00dc", frame(25, 80)),
        (b"01wb", frame(26, 12)),
    ];
    let source_movi: Vec<u8> = streams.iter().flat_map(|(cc, d)| chunk(cc, d)).collect();
    let source_body = [
        hdrl.clone(),
        list(b"LIST", b"movi", &source_movi),
        chunk(b"idx1", &[1u8; 32]),
    ]
    .concat();
    let source = list(b"RIFF", b"AVI ", &source_body);

    // The sample holds stream chunks 2..=4 of the source.
    let sample_streams = &streams[2..5];
    let sample_movi: Vec<u8> = sample_streams
        .iter()
        .flat_map(|(cc, d)| chunk(cc, d))
        .collect();
    let sample_idx1 = chunk(b"idx1", &[2u8; 48]);
    let sample_body = [
        hdrl.clone(),
        list(b"LIST", b"movi", &sample_movi),
        sample_idx1.clone(),
    ]
    .concat();
    let sample = list(b"RIFF", b"AVI ", &sample_body);

    // Source offsets of the first sample chunk of each stream.
    let movi_data = 12 + hdrl.len() + 12;
    let first_video = movi_data
        + chunk(b"00dc", &streams[0].1).len()
        + chunk(b"01wb", &streams[1].1).len();
    let first_audio = first_video + chunk(b"00dc", &streams[2].1).len();

    let file_meta = FileMeta {
        flags: 0,
        app_name: "rescene-test".to_string(),
        sample_name: "sample.avi".to_string(),
        original_size: sample.len() as u64,
        crc32: crc32(&sample),
    };
    let tracks = [
        TrackMeta {
            flags: 0,
            track_number: 0,
            data_length: 33 + 80,
            match_offset: first_video as u64,
            signature: Vec::new(),
        },
        TrackMeta {
            flags: 0,
            track_number: 1,
            data_length: 41,
            match_offset: first_audio as u64,
            signature: Vec::new(),
        },
    ];

    let mut srs_movi = b"movi".to_vec();
    srs_movi.extend(chunk(b"SRSF", &file_meta.to_bytes()));
    for track in &tracks {
        srs_movi.extend(chunk(b"SRST", &track.to_bytes()));
    }
    for (cc, data) in sample_streams {
        srs_movi.extend(stream_header(cc, data.len()));
    }
    let mut srs = b"RIFF".to_vec();
    srs.extend_from_slice(&(sample.len() as u32 - 8).to_le_bytes());
    srs.extend_from_slice(b"AVI ");
    srs.extend(&hdrl);
    srs.extend_from_slice(b"LIST");
    srs.extend_from_slice(&(sample_movi.len() as u32 + 4).to_le_bytes());
    srs.extend(srs_movi);
    srs.extend(sample_idx1);

    let dir = tempdir().unwrap();
    let source_path = dir.path().join("movie.avi");
    fs::write(&source_path, &source).unwrap();

    let srs = SrsFile::parse(&srs).unwrap();
    assert_eq!(srs.kind, SampleKind::Avi);
    assert_eq!(srs.meta.tracks.len(), 2);

    let out = dir.path().join("sample.avi");
    let report = srs
        .rebuild_to_file(&source_path, &out, &SampleOptions::default())
        .unwrap();
    assert!(report.is_match());
    assert_eq!(fs::read(&out).unwrap(), sample);
}
