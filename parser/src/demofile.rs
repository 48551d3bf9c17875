//! Demo container reading and writing.
//!
//! A demo starts with a fixed header followed by a flat run of tagged
//! chunks. Snapshot and delta payloads are zlib-deflated; deltas encode
//! removals plus per-word diffs against the previously decoded snapshot,
//! which the reader keeps as its reference state.

use std::io::{Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use nom::bytes::complete::take;
use nom::combinator::cond;
use nom::number::complete::{le_i32, le_u16, le_u32, le_u8};
use serde::Serialize;
use strum_macros::FromRepr;
use tracing::trace;

use crate::error::ErrorKind;
use crate::snapshot::{MAX_SNAPSHOT_SIZE, SnapItem, Snapshot, parse_item};
use crate::types::{MapChecksum, SlotId, Tick};

pub const DEMO_MAGIC: &[u8; 7] = b"TWDEMO\0";
pub const DEMO_VERSION: u8 = 6;

/// The fixed demo header: recording metadata plus the map identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoHeader {
    pub net_version: String,
    pub map_name: String,
    pub map_crc: u32,
    /// Recording kind, "client" or "server".
    pub kind: String,
    /// Demo length in seconds.
    pub length: i32,
    pub timestamp: String,
    pub map_sha256: Option<[u8; 32]>,
}

impl DemoHeader {
    /// The strongest map checksum the header carries.
    pub fn checksum(&self) -> MapChecksum {
        match self.map_sha256 {
            Some(sha) => MapChecksum::Sha256(sha),
            None => MapChecksum::Crc32(self.map_crc),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum ChunkKind {
    Snapshot = 0,
    SnapshotDelta = 1,
    Message = 2,
    TickMarker = 3,
}

/// One record pulled from the demo stream.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A fully buffered demo file.
pub struct DemoFile {
    pub header: DemoHeader,
    data: Vec<u8>,
    offset: usize,
    reference: Snapshot,
}

impl DemoFile {
    pub fn from_file(path: &Path) -> Result<Self, ErrorKind> {
        Self::from_bytes(std::fs::read(path)?)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ErrorKind> {
        let (header, offset) = parse_header(&data)?;
        Ok(DemoFile {
            header,
            data,
            offset,
            reference: Snapshot::default(),
        })
    }

    /// Pulls the next chunk, or `None` at a clean end of stream. A torn
    /// tail is a read error, not an end of stream.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, ErrorKind> {
        let rest = &self.data[self.offset..];
        if rest.is_empty() {
            return Ok(None);
        }
        if rest.len() < 5 {
            return Err(ErrorKind::TruncatedChunk);
        }
        let tag = rest[0];
        let kind = ChunkKind::from_repr(tag).ok_or(ErrorKind::UnknownChunkTag(tag))?;
        let size = u32::from_le_bytes([rest[1], rest[2], rest[3], rest[4]]) as usize;
        if rest.len() < 5 + size {
            return Err(ErrorKind::TruncatedChunk);
        }
        let data = rest[5..5 + size].to_vec();
        self.offset += 5 + size;
        trace!(kind = ?kind, size, "demo chunk");
        Ok(Some(Chunk { kind, data }))
    }

    /// Decodes a full snapshot chunk into `out` and adopts it as the new
    /// delta reference.
    pub fn read_snapshot(&mut self, chunk: &Chunk, out: &mut Snapshot) -> Result<usize, ErrorKind> {
        let payload = inflate(&chunk.data)?;
        out.parse_into(&payload)?;
        self.reference.clone_from(out);
        Ok(out.num_items())
    }

    /// Reconstructs a delta chunk against the reference snapshot into
    /// `out`, then adopts the result as the new reference. Any failure
    /// leaves the reference untouched, so the stream stays recoverable.
    pub fn unpack_delta(&mut self, chunk: &Chunk, out: &mut Snapshot) -> Result<usize, ErrorKind> {
        let payload = inflate(&chunk.data)?;
        let delta = SnapshotDelta::parse(&payload)?;
        delta.apply(&self.reference, out)?;
        self.reference.clone_from(out);
        Ok(out.num_items())
    }
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, ErrorKind> {
    let mut out = Vec::new();
    let mut dec = ZlibDecoder::new(data).take(MAX_SNAPSHOT_SIZE as u64 + 1);
    dec.read_to_end(&mut out)?;
    if out.len() > MAX_SNAPSHOT_SIZE {
        return Err(ErrorKind::OversizedSnapshot(out.len()));
    }
    Ok(out)
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).expect("in-memory deflate");
    enc.finish().expect("in-memory deflate")
}

fn parse_header(data: &[u8]) -> Result<(DemoHeader, usize), ErrorKind> {
    if data.len() < DEMO_MAGIC.len() + 1 {
        return Err(if data.starts_with(&DEMO_MAGIC[..data.len().min(DEMO_MAGIC.len())]) {
            ErrorKind::TruncatedHeader
        } else {
            ErrorKind::BadMagic
        });
    }
    if &data[..DEMO_MAGIC.len()] != DEMO_MAGIC {
        return Err(ErrorKind::BadMagic);
    }
    let version = data[DEMO_MAGIC.len()];
    if version != DEMO_VERSION {
        return Err(ErrorKind::UnsupportedVersion(version));
    }

    let body = &data[DEMO_MAGIC.len() + 1..];
    let (rest, header) = header_body(body).map_err(|_| ErrorKind::TruncatedHeader)?;
    Ok((header, data.len() - rest.len()))
}

fn header_body(input: &[u8]) -> crate::IResult<&[u8], DemoHeader> {
    let (input, net_version) = fixed_str(64)(input)?;
    let (input, map_name) = fixed_str(64)(input)?;
    let (input, map_crc) = le_u32(input)?;
    let (input, kind) = fixed_str(8)(input)?;
    let (input, length) = le_i32(input)?;
    let (input, timestamp) = fixed_str(20)(input)?;
    let (input, has_sha256) = le_u8(input)?;
    let (input, map_sha256) = cond(has_sha256 != 0, take(32usize))(input)?;
    Ok((
        input,
        DemoHeader {
            net_version,
            map_name,
            map_crc,
            kind,
            length,
            timestamp,
            map_sha256: map_sha256.map(|raw| {
                let mut sha = [0u8; 32];
                sha.copy_from_slice(raw);
                sha
            }),
        },
    ))
}

/// NUL-padded fixed-width string field.
fn fixed_str(len: usize) -> impl Fn(&[u8]) -> crate::IResult<&[u8], String> {
    move |input| {
        let (input, raw) = take(len)(input)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok((input, String::from_utf8_lossy(&raw[..end]).into_owned()))
    }
}

/// Parsed delta payload: removals, then per-item diffs against the
/// reference snapshot. Diff data for an item absent from the reference is
/// taken as absolute.
#[derive(Debug, Default, Clone)]
pub struct SnapshotDelta {
    pub tick: Tick,
    pub deleted: Vec<(u16, SlotId)>,
    pub updated: Vec<SnapItem>,
}

impl SnapshotDelta {
    pub fn parse(payload: &[u8]) -> Result<Self, ErrorKind> {
        let (rest, tick) = le_i32::<_, nom::error::Error<&[u8]>>(payload)
            .map_err(|_| ErrorKind::MalformedSnapshot("missing delta tick"))?;
        let (mut rest, num_deleted) = le_u32::<_, nom::error::Error<&[u8]>>(rest)
            .map_err(|_| ErrorKind::MalformedSnapshot("missing deletion count"))?;
        let mut deleted = Vec::new();
        for _ in 0..num_deleted {
            let (r, key) =
                deleted_key(rest).map_err(|_| ErrorKind::MalformedSnapshot("truncated deletion"))?;
            rest = r;
            deleted.push(key);
        }
        let (mut rest, num_updated) = le_u32::<_, nom::error::Error<&[u8]>>(rest)
            .map_err(|_| ErrorKind::MalformedSnapshot("missing update count"))?;
        let mut updated = Vec::new();
        for _ in 0..num_updated {
            let (r, item) =
                parse_item(rest).map_err(|_| ErrorKind::MalformedSnapshot("truncated update"))?;
            rest = r;
            updated.push(item);
        }
        if !rest.is_empty() {
            return Err(ErrorKind::MalformedSnapshot("trailing bytes"));
        }
        Ok(SnapshotDelta {
            tick: Tick(tick),
            deleted,
            updated,
        })
    }

    /// Reconstructs a full snapshot from `reference` into `out`.
    pub fn apply(&self, reference: &Snapshot, out: &mut Snapshot) -> Result<(), ErrorKind> {
        out.clear();
        out.tick = self.tick;
        for item in reference.items() {
            let key = (item.type_id, item.id);
            if self.deleted.contains(&key) {
                continue;
            }
            match self.updated.iter().find(|u| (u.type_id, u.id) == key) {
                Some(diff) => {
                    if diff.data.len() != item.data.len() {
                        return Err(ErrorKind::DeltaMismatch {
                            type_id: item.type_id,
                            id: item.id,
                        });
                    }
                    let data = item
                        .data
                        .iter()
                        .zip(&diff.data)
                        .map(|(a, b)| a.wrapping_add(*b))
                        .collect();
                    out.push(SnapItem {
                        type_id: item.type_id,
                        id: item.id,
                        data,
                    });
                }
                None => out.push(item.clone()),
            }
        }
        // Items with no reference counterpart (new, or resized and
        // re-added) carry absolute data.
        for upd in &self.updated {
            let key = (upd.type_id, upd.id);
            if reference.find(upd.type_id, upd.id).is_none() || self.deleted.contains(&key) {
                out.push(upd.clone());
            }
        }
        Ok(())
    }
}

fn deleted_key(input: &[u8]) -> crate::IResult<&[u8], (u16, SlotId)> {
    let (input, type_id) = le_u16(input)?;
    let (input, id) = le_u16(input)?;
    Ok((input, (type_id, SlotId(id))))
}

fn encode_snapshot(snap: &Snapshot) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&snap.tick.raw().to_le_bytes());
    out.extend_from_slice(&(snap.num_items() as u32).to_le_bytes());
    for item in snap.items() {
        encode_item(&mut out, item);
    }
    out
}

fn encode_item(out: &mut Vec<u8>, item: &SnapItem) {
    out.extend_from_slice(&item.type_id.to_le_bytes());
    out.extend_from_slice(&item.id.raw().to_le_bytes());
    out.extend_from_slice(&(item.data.len() as u32).to_le_bytes());
    for word in &item.data {
        out.extend_from_slice(&word.to_le_bytes());
    }
}

fn encode_delta(delta: &SnapshotDelta) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&delta.tick.raw().to_le_bytes());
    out.extend_from_slice(&(delta.deleted.len() as u32).to_le_bytes());
    for (type_id, id) in &delta.deleted {
        out.extend_from_slice(&type_id.to_le_bytes());
        out.extend_from_slice(&id.raw().to_le_bytes());
    }
    out.extend_from_slice(&(delta.updated.len() as u32).to_le_bytes());
    for item in &delta.updated {
        encode_item(&mut out, item);
    }
    out
}

fn diff_snapshots(reference: &Snapshot, snap: &Snapshot) -> SnapshotDelta {
    let mut delta = SnapshotDelta {
        tick: snap.tick,
        ..Default::default()
    };
    for old in reference.items() {
        match snap.find(old.type_id, old.id) {
            None => delta.deleted.push((old.type_id, old.id)),
            // A resized item cannot be expressed as a diff.
            Some(new) if new.data.len() != old.data.len() => {
                delta.deleted.push((old.type_id, old.id));
            }
            Some(_) => {}
        }
    }
    for new in snap.items() {
        match reference.find(new.type_id, new.id) {
            Some(old) if old.data.len() == new.data.len() => {
                if old.data != new.data {
                    let data = new
                        .data
                        .iter()
                        .zip(&old.data)
                        .map(|(n, o)| n.wrapping_sub(*o))
                        .collect();
                    delta.updated.push(SnapItem {
                        type_id: new.type_id,
                        id: new.id,
                        data,
                    });
                }
            }
            _ => delta.updated.push(new.clone()),
        }
    }
    delta
}

/// Writes demos in the container format [`DemoFile`] reads.
pub struct DemoWriter {
    out: Vec<u8>,
    reference: Snapshot,
}

impl DemoWriter {
    pub fn new(header: &DemoHeader) -> Self {
        let mut out = Vec::new();
        out.extend_from_slice(DEMO_MAGIC);
        out.push(DEMO_VERSION);
        push_fixed(&mut out, &header.net_version, 64);
        push_fixed(&mut out, &header.map_name, 64);
        out.extend_from_slice(&header.map_crc.to_le_bytes());
        push_fixed(&mut out, &header.kind, 8);
        out.extend_from_slice(&header.length.to_le_bytes());
        push_fixed(&mut out, &header.timestamp, 20);
        match header.map_sha256 {
            Some(sha) => {
                out.push(1);
                out.extend_from_slice(&sha);
            }
            None => out.push(0),
        }
        DemoWriter {
            out,
            reference: Snapshot::default(),
        }
    }

    /// Appends a full snapshot chunk.
    pub fn write_snapshot(&mut self, snap: &Snapshot) {
        let payload = encode_snapshot(snap);
        self.push_chunk(ChunkKind::Snapshot, &deflate(&payload));
        self.reference.clone_from(snap);
    }

    /// Appends `snap` encoded as a delta against the previously written
    /// snapshot.
    pub fn write_delta(&mut self, snap: &Snapshot) {
        let delta = diff_snapshots(&self.reference, snap);
        let payload = encode_delta(&delta);
        self.push_chunk(ChunkKind::SnapshotDelta, &deflate(&payload));
        self.reference.clone_from(snap);
    }

    pub fn write_message(&mut self, data: &[u8]) {
        self.push_chunk(ChunkKind::Message, data);
    }

    pub fn write_tick_marker(&mut self, tick: Tick) {
        self.push_chunk(ChunkKind::TickMarker, &tick.raw().to_le_bytes());
    }

    /// Raw chunk escape hatch, mainly for exercising malformed input.
    pub fn write_raw_chunk(&mut self, kind: ChunkKind, data: &[u8]) {
        self.push_chunk(kind, data);
    }

    fn push_chunk(&mut self, kind: ChunkKind, data: &[u8]) {
        self.out.push(kind as u8);
        self.out
            .extend_from_slice(&(data.len() as u32).to_le_bytes());
        self.out.extend_from_slice(data);
    }

    pub fn finish(self) -> Vec<u8> {
        self.out
    }
}

fn push_fixed(out: &mut Vec<u8>, s: &str, len: usize) {
    let bytes = s.as_bytes();
    let take = bytes.len().min(len.saturating_sub(1));
    out.extend_from_slice(&bytes[..take]);
    out.resize(out.len() + (len - take), 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{CHARACTER, CLIENT_INFO};

    fn header() -> DemoHeader {
        DemoHeader {
            net_version: "0.6 626fce9a778df4d4".to_owned(),
            map_name: "Multeasymap".to_owned(),
            map_crc: 0xdeadbeef,
            kind: "client".to_owned(),
            length: 62,
            timestamp: "2024-01-01 12:00:00".to_owned(),
            map_sha256: None,
        }
    }

    fn item(type_id: u16, id: u16, data: Vec<i32>) -> SnapItem {
        SnapItem {
            type_id,
            id: SlotId(id),
            data,
        }
    }

    fn snap(tick: i32, items: Vec<SnapItem>) -> Snapshot {
        let mut snap = Snapshot::new(Tick(tick));
        for it in items {
            snap.push(it);
        }
        snap
    }

    #[test]
    fn header_roundtrip() {
        let demo = DemoFile::from_bytes(DemoWriter::new(&header()).finish()).unwrap();
        assert_eq!(demo.header, header());
        assert_eq!(demo.header.checksum(), MapChecksum::Crc32(0xdeadbeef));
    }

    #[test]
    fn sha256_header_roundtrip() {
        let mut hdr = header();
        hdr.map_sha256 = Some([0x5a; 32]);
        let demo = DemoFile::from_bytes(DemoWriter::new(&hdr).finish()).unwrap();
        assert_eq!(demo.header.map_sha256, Some([0x5a; 32]));
        assert_eq!(demo.header.checksum(), MapChecksum::Sha256([0x5a; 32]));
    }

    #[test]
    fn bad_magic_is_terminal() {
        assert!(matches!(
            DemoFile::from_bytes(b"NOTDEMO\x06rest".to_vec()),
            Err(ErrorKind::BadMagic)
        ));
    }

    #[test]
    fn unsupported_version_is_terminal() {
        let mut bytes = DemoWriter::new(&header()).finish();
        bytes[DEMO_MAGIC.len()] = 9;
        assert!(matches!(
            DemoFile::from_bytes(bytes),
            Err(ErrorKind::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn truncated_header_is_terminal() {
        let bytes = DemoWriter::new(&header()).finish();
        assert!(matches!(
            DemoFile::from_bytes(bytes[..40].to_vec()),
            Err(ErrorKind::TruncatedHeader)
        ));
    }

    #[test]
    fn empty_stream_ends_cleanly() {
        let mut demo = DemoFile::from_bytes(DemoWriter::new(&header()).finish()).unwrap();
        assert!(demo.next_chunk().unwrap().is_none());
    }

    #[test]
    fn torn_chunk_is_a_read_error() {
        let mut writer = DemoWriter::new(&header());
        writer.write_message(b"hello");
        let mut bytes = writer.finish();
        bytes.truncate(bytes.len() - 2);
        let mut demo = DemoFile::from_bytes(bytes).unwrap();
        assert!(matches!(demo.next_chunk(), Err(ErrorKind::TruncatedChunk)));
    }

    #[test]
    fn full_snapshot_roundtrip() {
        let original = snap(
            10,
            vec![
                item(CLIENT_INFO, 3, vec![1; 17]),
                item(CHARACTER, 3, vec![2; 22]),
            ],
        );
        let mut writer = DemoWriter::new(&header());
        writer.write_message(b"skipped by ghost extraction");
        writer.write_snapshot(&original);
        let mut demo = DemoFile::from_bytes(writer.finish()).unwrap();

        let msg = demo.next_chunk().unwrap().unwrap();
        assert_eq!(msg.kind, ChunkKind::Message);

        let chunk = demo.next_chunk().unwrap().unwrap();
        assert_eq!(chunk.kind, ChunkKind::Snapshot);
        let mut decoded = Snapshot::default();
        demo.read_snapshot(&chunk, &mut decoded).unwrap();
        assert_eq!(decoded, original);
        assert!(demo.next_chunk().unwrap().is_none());
    }

    #[test]
    fn delta_reconstructs_updates_insertions_and_deletions() {
        let first = snap(
            10,
            vec![
                item(CLIENT_INFO, 3, vec![1; 17]),
                item(CHARACTER, 3, vec![5; 22]),
                item(CHARACTER, 7, vec![9; 22]),
            ],
        );
        let second = snap(
            12,
            vec![
                item(CLIENT_INFO, 3, vec![1; 17]), // unchanged, carried over
                item(CHARACTER, 3, vec![6; 22]),   // diffed
                item(CHARACTER, 9, vec![4; 22]),   // new, absolute
            ],
        );

        let mut writer = DemoWriter::new(&header());
        writer.write_snapshot(&first);
        writer.write_delta(&second);
        let mut demo = DemoFile::from_bytes(writer.finish()).unwrap();

        let mut scratch = Snapshot::default();
        let full = demo.next_chunk().unwrap().unwrap();
        demo.read_snapshot(&full, &mut scratch).unwrap();

        let delta = demo.next_chunk().unwrap().unwrap();
        assert_eq!(delta.kind, ChunkKind::SnapshotDelta);
        demo.unpack_delta(&delta, &mut scratch).unwrap();

        assert_eq!(scratch.tick, Tick(12));
        assert_eq!(scratch.num_items(), 3);
        for it in second.items() {
            assert_eq!(scratch.find(it.type_id, it.id), Some(it));
        }
        // Character 7 was deleted.
        assert!(scratch.find(CHARACTER, SlotId(7)).is_none());
    }

    #[test]
    fn corrupt_delta_is_recoverable() {
        let first = snap(10, vec![item(CHARACTER, 3, vec![5; 22])]);
        let second = snap(12, vec![item(CHARACTER, 3, vec![6; 22])]);
        let mut writer = DemoWriter::new(&header());
        writer.write_snapshot(&first);
        writer.write_raw_chunk(ChunkKind::SnapshotDelta, b"not zlib at all");
        writer.write_delta(&second);
        let mut demo = DemoFile::from_bytes(writer.finish()).unwrap();

        let mut scratch = Snapshot::default();
        let full = demo.next_chunk().unwrap().unwrap();
        demo.read_snapshot(&full, &mut scratch).unwrap();

        let bad = demo.next_chunk().unwrap().unwrap();
        assert!(demo.unpack_delta(&bad, &mut scratch).is_err());

        // The stream and the reference both survive the bad chunk.
        let good = demo.next_chunk().unwrap().unwrap();
        demo.unpack_delta(&good, &mut scratch).unwrap();
        assert_eq!(scratch.find(CHARACTER, SlotId(3)), Some(&item(CHARACTER, 3, vec![6; 22])));
    }
}
