//! Shared helpers for building synthetic WEM fixtures and inspecting OGG
//! output at the page level.
#![allow(dead_code)]

use wwtools::bitio::BitWriter;

/// A minimal packed codebook library: one codebook, 1 dimension, 2 entries,
/// unordered dense lengths, no lookup table.
pub fn tiny_codebook_library() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(1, 4); // dimensions
    bw.write_bits(2, 14); // entries
    bw.write_bits(0, 1); // ordered flag
    bw.write_bits(3, 3); // codeword length width
    bw.write_bits(0, 1); // sparse flag
    bw.write_bits(0, 3); // entry 0 length-1
    bw.write_bits(0, 3); // entry 1 length-1
    bw.write_bits(0, 1); // lookup type
    let body = bw.into_bytes();

    let mut blob = body.clone();
    let table_offset = blob.len() as u32;
    blob.extend_from_slice(&0u32.to_le_bytes());
    blob.extend_from_slice(&(body.len() as u32).to_le_bytes());
    blob.extend_from_slice(&table_offset.to_le_bytes());
    blob
}

/// Compact (stripped) setup packet payload referencing external codebook 0,
/// with one trivial floor/residue/mapping and two modes (short, long).
pub fn compact_setup_payload() -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bits(0, 8); // codebook count - 1
    w.write_bits(0, 10); // external codebook id

    // floors
    w.write_bits(0, 6); // floor count - 1
    w.write_bits(0, 5); // partitions
    w.write_bits(0, 3); // class dimensions - 1
    w.write_bits(0, 2); // class subclasses
    w.write_bits(0, 8); // subclass book
    w.write_bits(0, 2); // multiplier - 1
    w.write_bits(0, 4); // rangebits

    // residues
    w.write_bits(0, 6); // residue count - 1
    w.write_bits(0, 2); // residue type
    w.write_bits(0, 24); // begin
    w.write_bits(0, 24); // end
    w.write_bits(0, 24); // partition size - 1
    w.write_bits(0, 6); // classifications - 1
    w.write_bits(0, 8); // classbook
    w.write_bits(0, 3); // cascade low bits
    w.write_bits(0, 1); // cascade flag

    // mappings
    w.write_bits(0, 6); // mapping count - 1
    w.write_bits(0, 1); // submaps flag
    w.write_bits(0, 1); // square polar flag
    w.write_bits(0, 2); // reserved
    w.write_bits(0, 8); // time configuration
    w.write_bits(0, 8); // floor number
    w.write_bits(0, 8); // residue number

    // modes: short then long
    w.write_bits(1, 6); // mode count - 1
    w.write_bits(0, 1); // mode 0 block flag
    w.write_bits(0, 8); // mode 0 mapping
    w.write_bits(1, 1); // mode 1 block flag
    w.write_bits(0, 8); // mode 1 mapping

    w.into_bytes()
}

/// Canonical-form setup packet payload: one canonical codebook, trivial
/// floor/residue/mapping, two modes, framing bit.
///
/// `with_time` includes the 22-bit time-domain section. Header-triad WEMs
/// carry it (their packets are complete); full-setup WEMs do not, since the
/// converter re-emits the time placeholder itself.
pub fn canonical_setup_payload(with_time: bool) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bits(0, 8); // codebook count - 1

    // canonical codebook
    w.write_bits(0x564342, 24); // sync
    w.write_bits(1, 16); // dimensions
    w.write_bits(2, 24); // entries
    w.write_bits(0, 1); // ordered
    w.write_bits(0, 1); // sparse
    w.write_bits(0, 5); // entry 0 length - 1
    w.write_bits(0, 5); // entry 1 length - 1
    w.write_bits(0, 4); // lookup type

    if with_time {
        w.write_bits(0, 6); // time count - 1
        w.write_bits(0, 16); // dummy time value
    }

    // floor
    w.write_bits(0, 6);
    w.write_bits(1, 16); // floor type 1
    w.write_bits(0, 5);
    w.write_bits(0, 3);
    w.write_bits(0, 2);
    w.write_bits(0, 8);
    w.write_bits(0, 2);
    w.write_bits(0, 4);

    // residue
    w.write_bits(0, 6);
    w.write_bits(0, 16); // residue type 0
    w.write_bits(0, 24);
    w.write_bits(0, 24);
    w.write_bits(0, 24);
    w.write_bits(0, 6);
    w.write_bits(0, 8);
    w.write_bits(0, 3);
    w.write_bits(0, 1);

    // mapping
    w.write_bits(0, 6);
    w.write_bits(0, 16); // mapping type 0
    w.write_bits(0, 1);
    w.write_bits(0, 1);
    w.write_bits(0, 2);
    w.write_bits(0, 8);
    w.write_bits(0, 8);
    w.write_bits(0, 8);

    // modes
    w.write_bits(1, 6);
    w.write_bits(0, 1);
    w.write_bits(0, 16);
    w.write_bits(0, 16);
    w.write_bits(0, 8);
    w.write_bits(1, 1);
    w.write_bits(0, 16);
    w.write_bits(0, 16);
    w.write_bits(0, 8);

    w.write_bits(1, 1); // framing
    w.into_bytes()
}

/// A Wwise 6-byte-header packet: `[size][granule][payload]`.
pub fn wwise_packet(granule: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(&granule.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

pub struct WemSpec<'a> {
    pub channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_second: u32,
    pub sample_count: u32,
    pub blocksize_pows: (u8, u8),
    pub setup_payload: Vec<u8>,
    /// Audio packet payloads, framed with 6-byte Wwise headers
    pub audio_payloads: &'a [&'a [u8]],
    /// Optional smpl loop points (loop_start, loop_end as stored)
    pub loop_points: Option<(u32, u32)>,
}

/// Assemble a complete RIFF/vorb WEM (vorb size 0x34, 6-byte packet
/// headers) around the given setup and audio packets.
pub fn build_wem(spec: &WemSpec) -> Vec<u8> {
    // data chunk: setup packet followed by the audio packets
    let mut data = wwise_packet(0, &spec.setup_payload);
    let first_audio_packet_offset = data.len() as u32;
    for payload in spec.audio_payloads {
        data.extend_from_slice(&wwise_packet(0x0BAD, payload));
    }

    // fmt chunk, 0x18 bytes
    let mut fmt = Vec::new();
    fmt.extend_from_slice(&0xFFFFu16.to_le_bytes());
    fmt.extend_from_slice(&spec.channels.to_le_bytes());
    fmt.extend_from_slice(&spec.sample_rate.to_le_bytes());
    fmt.extend_from_slice(&spec.avg_bytes_per_second.to_le_bytes());
    fmt.extend_from_slice(&0u16.to_le_bytes());
    fmt.extend_from_slice(&0u16.to_le_bytes());
    fmt.extend_from_slice(&6u16.to_le_bytes()); // extra size
    fmt.resize(0x18, 0);

    // vorb chunk, 0x34 bytes
    let mut vorb = vec![0u8; 0x34];
    vorb[0..4].copy_from_slice(&spec.sample_count.to_le_bytes());
    vorb[0x18..0x1C].copy_from_slice(&0u32.to_le_bytes()); // setup packet offset
    vorb[0x1C..0x20].copy_from_slice(&first_audio_packet_offset.to_le_bytes());
    vorb[0x2C..0x30].copy_from_slice(&1u32.to_le_bytes()); // uid
    vorb[0x30] = spec.blocksize_pows.0;
    vorb[0x31] = spec.blocksize_pows.1;

    let mut chunks: Vec<(&[u8; 4], Vec<u8>)> = vec![(b"fmt ", fmt), (b"vorb", vorb)];

    if let Some((loop_start, loop_end)) = spec.loop_points {
        let mut smpl = vec![0u8; 0x34];
        smpl[0x1C..0x20].copy_from_slice(&1u32.to_le_bytes());
        smpl[0x2C..0x30].copy_from_slice(&loop_start.to_le_bytes());
        smpl[0x30..0x34].copy_from_slice(&loop_end.to_le_bytes());
        chunks.push((b"smpl", smpl));
    }

    chunks.push((b"data", data));

    let mut body = Vec::new();
    body.extend_from_slice(b"WAVE");
    for (tag, payload) in &chunks {
        body.extend_from_slice(*tag);
        body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        body.extend_from_slice(payload);
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// Split an OGG byte stream into pages as (flags, granule, payload).
pub fn split_pages(stream: &[u8]) -> Vec<(u8, u64, Vec<u8>)> {
    let mut pages = Vec::new();
    let mut pos = 0;
    while pos + 27 <= stream.len() {
        assert_eq!(&stream[pos..pos + 4], b"OggS", "bad capture pattern");
        let flags = stream[pos + 5];
        let granule = u64::from_le_bytes(stream[pos + 6..pos + 14].try_into().unwrap());
        let nsegs = stream[pos + 26] as usize;
        let lacing = &stream[pos + 27..pos + 27 + nsegs];
        let body_len: usize = lacing.iter().map(|&l| l as usize).sum();
        let body_start = pos + 27 + nsegs;
        pages.push((flags, granule, stream[body_start..body_start + body_len].to_vec()));
        pos = body_start + body_len;
    }
    assert_eq!(pos, stream.len(), "trailing bytes after last page");
    pages
}

/// Extract packets from an OGG byte stream with the ogg crate's reader.
pub fn read_packets(stream: &[u8]) -> Vec<Vec<u8>> {
    let mut reader = ogg::PacketReader::new(std::io::Cursor::new(stream));
    let mut packets = Vec::new();
    while let Some(packet) = reader.read_packet().expect("valid ogg stream") {
        packets.push(packet.data);
    }
    packets
}
