//! End-to-end tests of the WEM to OGG pipeline on synthetic fixtures.

mod common;

use common::*;
use wwtools::{
    wem_to_ogg, CodebookLibrary, ConversionOptions, PacketFormat, WwiseRiffVorbis,
};

fn library() -> CodebookLibrary {
    CodebookLibrary::from_packed(&tiny_codebook_library()).unwrap()
}

/// Stripped WEM, external codebooks, standard packets: two channels at
/// 48 kHz, block sizes 256/2048, four audio packets (short, long, long,
/// short).
fn standard_wem() -> Vec<u8> {
    build_wem(&WemSpec {
        channels: 2,
        sample_rate: 48000,
        avg_bytes_per_second: 6000,
        sample_count: 2176,
        blocksize_pows: (8, 11),
        setup_payload: compact_setup_payload(),
        audio_payloads: &[&[0x00, 0x77], &[0x02, 0x77], &[0x02, 0x77], &[0x00, 0x77]],
        loop_points: None,
    })
}

#[test]
fn converts_stripped_wem_with_external_codebooks() {
    let ogg = wem_to_ogg(&standard_wem(), library(), ConversionOptions::default()).unwrap();

    let packets = read_packets(&ogg);
    assert_eq!(packets.len(), 7, "three headers plus four audio packets");

    // Identification packet reports the source format
    let ident = &packets[0];
    assert_eq!(ident[0], 1);
    assert_eq!(&ident[1..7], b"vorbis");
    assert_eq!(ident[11], 2); // channels
    assert_eq!(u32::from_le_bytes(ident[12..16].try_into().unwrap()), 48000);

    // Setup packet type
    assert_eq!(packets[2][0], 5);
}

#[test]
fn output_pages_have_valid_structure_and_final_granule() {
    let ogg = wem_to_ogg(&standard_wem(), library(), ConversionOptions::default()).unwrap();

    let pages = split_pages(&ogg);
    assert!(pages.len() >= 3);

    // BOS on the first page, EOS on the last, serial checks live in
    // split_pages via the capture pattern assertions
    assert_eq!(pages[0].0 & 2, 2);
    assert_eq!(pages.last().unwrap().0 & 4, 4);

    // Cumulative samples: 0, (256+2048)/4, (2048+2048)/4, (2048+256)/4
    // => final granule 576 + 1024 + 576 = 2176 == vorb sample count
    assert_eq!(pages.last().unwrap().1, 2176);
}

#[test]
fn vendor_comment_without_loops() {
    let ogg = wem_to_ogg(&standard_wem(), library(), ConversionOptions::default()).unwrap();

    let packets = read_packets(&ogg);
    let comment = &packets[1];
    assert_eq!(comment[0], 3);

    let vendor_len = u32::from_le_bytes(comment[7..11].try_into().unwrap()) as usize;
    let vendor = &comment[11..11 + vendor_len];
    assert_eq!(vendor, b"converted from Audiokinetic Wwise by ww2ogg 0.24");

    let comment_count_at = 11 + vendor_len;
    let count =
        u32::from_le_bytes(comment[comment_count_at..comment_count_at + 4].try_into().unwrap());
    assert_eq!(count, 0);
}

#[test]
fn loop_points_become_user_comments() {
    let wem = build_wem(&WemSpec {
        channels: 2,
        sample_rate: 48000,
        avg_bytes_per_second: 6000,
        sample_count: 2176,
        blocksize_pows: (8, 11),
        setup_payload: compact_setup_payload(),
        audio_payloads: &[&[0x00, 0x77], &[0x02, 0x77], &[0x02, 0x77], &[0x00, 0x77]],
        loop_points: Some((100, 1999)),
    });
    let ogg = wem_to_ogg(&wem, library(), ConversionOptions::default()).unwrap();

    let packets = read_packets(&ogg);
    let comment = &packets[1];
    let vendor_len = u32::from_le_bytes(comment[7..11].try_into().unwrap()) as usize;
    let mut at = 11 + vendor_len;

    let count = u32::from_le_bytes(comment[at..at + 4].try_into().unwrap());
    assert_eq!(count, 2);
    at += 4;

    let mut comments = Vec::new();
    for _ in 0..count {
        let len = u32::from_le_bytes(comment[at..at + 4].try_into().unwrap()) as usize;
        at += 4;
        comments.push(String::from_utf8(comment[at..at + len].to_vec()).unwrap());
        at += len;
    }

    // LoopEnd is stored inclusive in the WEM and adjusted by one
    assert_eq!(comments, vec!["LoopStart=100".to_string(), "LoopEnd=2000".to_string()]);
}

#[test]
fn modified_packets_first_byte_reconstruction() {
    // Two modified packets: mode 1 (long window) then mode 0 (short).
    // mode_bits = 1, so the input first byte holds [mode:1][remainder:7].
    let wem = build_wem(&WemSpec {
        channels: 2,
        sample_rate: 48000,
        avg_bytes_per_second: 6000,
        sample_count: 576,
        blocksize_pows: (8, 11),
        setup_payload: compact_setup_payload(),
        audio_payloads: &[&[0x01, 0xAB], &[0x00, 0xCD]],
        loop_points: None,
    });
    let options = ConversionOptions {
        packet_format: PacketFormat::ForceMod,
        ..Default::default()
    };

    let parsed = WwiseRiffVorbis::parse(&wem, library(), options).unwrap();
    let stream = parsed.generate_ogg().unwrap();
    let packets = read_packets(&stream);
    assert_eq!(packets.len(), 5);

    // Packet 1: type 0, mode 1, prev-window 0, next-window 0 (next packet is
    // a short mode), 7 remainder bits, then 0xAB.
    assert_eq!(packets[3], vec![0x02, 0x58, 0x05]);

    // Packet 2: type 0, mode 0, 7 remainder bits, then 0xCD.
    assert_eq!(packets[4], vec![0x00, 0x9A, 0x01]);
}

#[test]
fn modified_packet_stream_survives_regranulation() {
    let wem = build_wem(&WemSpec {
        channels: 2,
        sample_rate: 48000,
        avg_bytes_per_second: 6000,
        sample_count: 576,
        blocksize_pows: (8, 11),
        setup_payload: compact_setup_payload(),
        audio_payloads: &[&[0x01, 0xAB], &[0x00, 0xCD]],
        loop_points: None,
    });
    let options = ConversionOptions {
        packet_format: PacketFormat::ForceMod,
        ..Default::default()
    };

    let ogg = wem_to_ogg(&wem, library(), options).unwrap();
    let pages = split_pages(&ogg);

    // long then short: final granule (2048 + 256) / 4
    assert_eq!(pages.last().unwrap().1, 576);
}

#[test]
fn full_setup_copies_bits_after_inserting_time_section() {
    use wwtools::bitio::{BitReader, BitWriter};

    // Full-setup payload: canonical codebooks and setup, minus the time
    // section which the converter re-emits itself.
    let payload = canonical_setup_payload(false);
    let wem = build_wem(&WemSpec {
        channels: 2,
        sample_rate: 48000,
        avg_bytes_per_second: 6000,
        sample_count: 576,
        blocksize_pows: (8, 11),
        setup_payload: payload.clone(),
        audio_payloads: &[&[0x02, 0x77], &[0x00, 0x77]],
        loop_points: None,
    });
    let options = ConversionOptions {
        inline_codebooks: true,
        full_setup: true,
        ..Default::default()
    };

    let parsed = WwiseRiffVorbis::parse(&wem, CodebookLibrary::empty(), options).unwrap();
    let stream = parsed.generate_ogg().unwrap();
    let packets = read_packets(&stream);

    // Expected output: packet header, the payload's count + codebook bits
    // (88 of them), the 22-bit time placeholder, then every remaining
    // payload bit verbatim.
    let mut w = BitWriter::new();
    w.write_bits(5, 8);
    for &b in b"vorbis" {
        w.write_bits(u32::from(b), 8);
    }
    let mut r = BitReader::new(&payload);
    for _ in 0..88 {
        w.write_bit(r.read_bit().unwrap());
    }
    w.write_bits(0, 22);
    while r.remaining() > 0 {
        w.write_bit(r.read_bit().unwrap());
    }
    assert_eq!(packets[2], w.into_bytes());

    // The copied stream also survives the second pass
    let finished = wem_to_ogg(&wem, CodebookLibrary::empty(), options).unwrap();
    let pages = split_pages(&finished);
    assert_eq!(pages.last().unwrap().1, 576);
}

/// Header-triad WEM: the three Vorbis packets are stored verbatim inside
/// 8-byte Wwise framing, and the output setup packet must byte-match the
/// input's.
#[test]
fn header_triad_packets_copied_verbatim() {
    use wwtools::bitio::BitWriter;

    let ident = {
        let mut w = BitWriter::new();
        w.write_bits(1, 8);
        for &b in b"vorbis" {
            w.write_bits(u32::from(b), 8);
        }
        w.write_bits(0, 32); // version
        w.write_bits(2, 8); // channels
        w.write_bits(48000, 32);
        w.write_bits(0, 32);
        w.write_bits(48000 * 4, 32);
        w.write_bits(0, 32);
        w.write_bits(8, 4);
        w.write_bits(11, 4);
        w.write_bits(1, 1);
        w.into_bytes()
    };

    let comment = {
        let mut w = BitWriter::new();
        w.write_bits(3, 8);
        for &b in b"vorbis" {
            w.write_bits(u32::from(b), 8);
        }
        w.write_bits(0, 32); // empty vendor
        w.write_bits(0, 32); // no comments
        w.write_bits(1, 1);
        w.into_bytes()
    };

    let setup = {
        let mut packet = vec![5u8];
        packet.extend_from_slice(b"vorbis");
        packet.extend_from_slice(&canonical_setup_payload(true));
        packet
    };

    // 8-byte framed packet
    fn old_packet(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    let mut data = Vec::new();
    data.extend_from_slice(&old_packet(&ident));
    data.extend_from_slice(&old_packet(&comment));
    data.extend_from_slice(&old_packet(&setup));
    let first_audio = data.len() as u32;
    for payload in [&[0x02u8, 0x77][..], &[0x00, 0x77][..]] {
        let mut packet = Vec::new();
        packet.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        packet.extend_from_slice(&0x0BADu32.to_le_bytes());
        packet.extend_from_slice(payload);
        data.extend_from_slice(&packet);
    }

    let mut fmt = Vec::new();
    fmt.extend_from_slice(&0xFFFFu16.to_le_bytes());
    fmt.extend_from_slice(&2u16.to_le_bytes());
    fmt.extend_from_slice(&48000u32.to_le_bytes());
    fmt.extend_from_slice(&6000u32.to_le_bytes());
    fmt.extend_from_slice(&0u16.to_le_bytes());
    fmt.extend_from_slice(&0u16.to_le_bytes());
    fmt.extend_from_slice(&6u16.to_le_bytes());
    fmt.resize(0x18, 0);

    let mut vorb = vec![0u8; 0x28];
    vorb[0..4].copy_from_slice(&576u32.to_le_bytes());
    vorb[0x18..0x1C].copy_from_slice(&0u32.to_le_bytes()); // setup packet offset
    vorb[0x1C..0x20].copy_from_slice(&first_audio.to_le_bytes());

    let mut body = Vec::new();
    body.extend_from_slice(b"WAVE");
    for (tag, payload) in [(b"fmt ", &fmt), (b"vorb", &vorb), (b"data", &data)] {
        body.extend_from_slice(tag);
        body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        body.extend_from_slice(payload);
    }
    let mut wem = Vec::new();
    wem.extend_from_slice(b"RIFF");
    wem.extend_from_slice(&(body.len() as u32).to_le_bytes());
    wem.extend_from_slice(&body);

    let parsed =
        WwiseRiffVorbis::parse(&wem, CodebookLibrary::empty(), ConversionOptions::default())
            .unwrap();
    let stream = parsed.generate_ogg().unwrap();
    let packets = read_packets(&stream);

    assert_eq!(packets[0], ident);
    assert_eq!(packets[1], comment);
    assert_eq!(packets[2], setup);

    // And the full pipeline regranulates it: long then short window
    let finished =
        wem_to_ogg(&wem, CodebookLibrary::empty(), ConversionOptions::default()).unwrap();
    assert_eq!(split_pages(&finished).last().unwrap().1, 576);
}

#[test]
fn truncated_wem_reports_prefetch() {
    let mut wem = standard_wem();
    wem[4..8].copy_from_slice(&20000u32.to_le_bytes());
    wem.truncate(wem.len().min(5000));

    let err = wem_to_ogg(&wem, library(), ConversionOptions::default()).unwrap_err();
    assert!(err.to_string().contains("streaming/prefetch"), "{err}");
}

#[test]
fn unknown_codebook_id_is_reported() {
    // Point the setup at codebook id 1, which the tiny library lacks
    let mut setup = compact_setup_payload();
    // codebook id is the 10-bit field after the 8-bit count; id 1 sets bit 8
    setup[1] |= 0x01;

    let wem = build_wem(&WemSpec {
        channels: 2,
        sample_rate: 48000,
        avg_bytes_per_second: 6000,
        sample_count: 2176,
        blocksize_pows: (8, 11),
        setup_payload: setup,
        audio_payloads: &[&[0x00, 0x77]],
        loop_points: None,
    });

    let err = wem_to_ogg(&wem, library(), ConversionOptions::default()).unwrap_err();
    assert!(err.to_string().contains("invalid codebook id 1"), "{err}");
}
