//! Wwise RIFF/RIFX Vorbis converter.
//!
//! Parses the WEM container (fmt/vorb/smpl/cue/data chunks), then rebuilds
//! the three Vorbis header packets and re-frames every audio packet as an
//! OGG page:
//!
//! 1. Identification packet - regenerated from `fmt `/`vorb` metadata
//! 2. Comment packet - regenerated (vendor string plus loop points)
//! 3. Setup packet - decoded from the Wwise compact encoding and re-emitted
//!    in canonical Vorbis form, expanding external codebook references
//!
//! For WEMs with "modified" audio packets the first byte of every packet is
//! reconstructed: Wwise drops the packet-type bit and the two window flags,
//! so the converter reads the mode number, looks up its block flag, and peeks
//! at the following packet to recover the next-window flag.

use tracing::debug;

use crate::bitio::{BitReader, OggPageWriter};
use crate::codebook::{copy_codebook, ilog, rebuild_codebook, CodebookLibrary};
use crate::error::{Error, Result};
use crate::wem::packet::PacketHeader;

/// Vendor string emitted in the comment header.
const VENDOR: &str = "converted from Audiokinetic Wwise by ww2ogg 0.24";

/// GUID expected in the extra fmt data of 0x28-byte fmt chunks.
const EXTRA_FMT_SIGNATURE: [u8; 16] = [
    1, 0, 0, 0, 0, 0, 0x10, 0, 0x80, 0, 0, 0xAA, 0, 0x38, 0x9B, 0x71,
];

/// Accepted values of the mod-packets sentinel in no-granule vorb chunks.
const MOD_SIGNALS: [u32; 4] = [0x4A, 0x4B, 0x69, 0x70];

/// How to treat the Wwise modified-packet format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PacketFormat {
    /// Detect from the vorb chunk metadata
    #[default]
    Auto,
    /// Force modified Vorbis packets
    ForceMod,
    /// Force standard Vorbis packets
    ForceStandard,
}

/// Conversion options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionOptions {
    /// Codebooks are embedded in the WEM rather than referenced by ID
    pub inline_codebooks: bool,
    /// The setup packet is full canonical Vorbis, not the stripped form
    pub full_setup: bool,
    /// Modified-packet handling override
    pub packet_format: PacketFormat,
}

/// Location of a RIFF chunk's data (past the 8-byte tag/size header).
#[derive(Debug, Clone, Copy)]
struct ChunkLocation {
    offset: usize,
    size: usize,
}

/// Index of recognised chunks found in the container. LIST chunks carry no
/// information the converter needs and are skipped with the unknown ones.
#[derive(Debug, Clone, Copy, Default)]
struct ChunkIndex {
    fmt: Option<ChunkLocation>,
    cue: Option<ChunkLocation>,
    smpl: Option<ChunkLocation>,
    vorb: Option<ChunkLocation>,
    data: Option<ChunkLocation>,
}

/// Parsed Wwise RIFF/RIFX Vorbis file.
///
/// Construction parses and validates the whole container; `generate_ogg`
/// performs the first-pass conversion into an in-memory OGG stream.
#[derive(Debug)]
pub struct WwiseRiffVorbis<'a> {
    data: &'a [u8],
    codebooks: CodebookLibrary,
    inline_codebooks: bool,
    full_setup: bool,

    little_endian: bool,
    chunks: ChunkIndex,
    /// Declared vorb chunk size; -1 when the vorb block is embedded in a
    /// 0x42-byte fmt chunk
    vorb_size: i64,

    // fmt fields
    channels: u16,
    sample_rate: u32,
    avg_bytes_per_second: u32,
    ext_unk: u16,
    subtype: u32,

    // cue
    cue_count: u32,

    // smpl loop points
    loop_count: u32,
    loop_start: u32,
    loop_end: u32,

    // vorb fields
    sample_count: u32,
    uid: u32,
    blocksize_0_pow: u8,
    blocksize_1_pow: u8,
    setup_packet_offset: u32,
    first_audio_packet_offset: u32,

    // packet framing flags
    header_triad_present: bool,
    old_packet_headers: bool,
    no_granule: bool,
    mod_packets: bool,
}

impl<'a> WwiseRiffVorbis<'a> {
    /// Parse a WEM buffer.
    ///
    /// `codebooks` is the packed external codebook library; pass
    /// [`CodebookLibrary::empty`] together with `opts.inline_codebooks` for
    /// WEMs that embed their codebooks.
    pub fn parse(
        data: &'a [u8],
        codebooks: CodebookLibrary,
        opts: ConversionOptions,
    ) -> Result<Self> {
        let mut wem = WwiseRiffVorbis {
            data,
            codebooks,
            inline_codebooks: opts.inline_codebooks,
            full_setup: opts.full_setup,
            little_endian: true,
            chunks: ChunkIndex::default(),
            vorb_size: 0,
            channels: 0,
            sample_rate: 0,
            avg_bytes_per_second: 0,
            ext_unk: 0,
            subtype: 0,
            cue_count: 0,
            loop_count: 0,
            loop_start: 0,
            loop_end: 0,
            sample_count: 0,
            uid: 0,
            blocksize_0_pow: 0,
            blocksize_1_pow: 0,
            setup_packet_offset: 0,
            first_audio_packet_offset: 0,
            header_triad_present: false,
            old_packet_headers: false,
            no_granule: false,
            mod_packets: false,
        };

        let riff_size = wem.parse_riff_header()?;
        wem.walk_chunks(riff_size)?;
        wem.parse_fmt()?;
        wem.parse_cue()?;
        wem.parse_smpl()?;
        wem.parse_vorb(opts.packet_format)?;
        wem.validate_loops()?;

        debug!(
            channels = wem.channels,
            sample_rate = wem.sample_rate,
            sample_count = wem.sample_count,
            uid = wem.uid,
            subtype = wem.subtype,
            ext_unk = wem.ext_unk,
            cue_points = wem.cue_count,
            mod_packets = wem.mod_packets,
            "parsed WEM"
        );

        Ok(wem)
    }

    fn read_u16(&self, offset: usize) -> Result<u16> {
        let bytes: [u8; 2] = self
            .data
            .get(offset..offset + 2)
            .ok_or_else(|| Error::truncated("unexpected end of WEM data"))?
            .try_into()
            .unwrap();
        Ok(if self.little_endian {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        })
    }

    fn read_u32(&self, offset: usize) -> Result<u32> {
        let bytes: [u8; 4] = self
            .data
            .get(offset..offset + 4)
            .ok_or_else(|| Error::truncated("unexpected end of WEM data"))?
            .try_into()
            .unwrap();
        Ok(if self.little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }

    fn read_u8(&self, offset: usize) -> Result<u8> {
        self.data
            .get(offset)
            .copied()
            .ok_or_else(|| Error::truncated("unexpected end of WEM data"))
    }

    /// Validate the RIFF/RIFX magic and declared size; returns the container
    /// size (magic through last chunk).
    fn parse_riff_header(&mut self) -> Result<usize> {
        let magic = self
            .data
            .get(0..4)
            .ok_or_else(|| Error::truncated("missing RIFF header"))?;

        self.little_endian = match magic {
            b"RIFF" => true,
            b"RIFX" => false,
            _ => return Err(Error::parse("missing RIFF")),
        };

        let riff_size = self.read_u32(4)? as usize + 8;
        if riff_size > self.data.len() {
            return Err(Error::parse(format!(
                "RIFF truncated (header claims {} bytes but only {} available, \
                 this is likely a streaming/prefetch WEM that requires the full .wem file)",
                riff_size,
                self.data.len()
            )));
        }

        if self.data.get(8..12) != Some(b"WAVE".as_slice()) {
            return Err(Error::parse("missing WAVE"));
        }

        Ok(riff_size)
    }

    fn walk_chunks(&mut self, riff_size: usize) -> Result<()> {
        let mut chunk_offset = 12usize;

        while chunk_offset < riff_size {
            if chunk_offset + 8 > riff_size {
                return Err(Error::parse("chunk header truncated"));
            }

            let tag = &self.data[chunk_offset..chunk_offset + 4];
            let chunk_size = self.read_u32(chunk_offset + 4)? as usize;
            let location = ChunkLocation {
                offset: chunk_offset + 8,
                size: chunk_size,
            };

            match tag {
                b"fmt " => self.chunks.fmt = Some(location),
                b"cue " => self.chunks.cue = Some(location),
                b"smpl" => self.chunks.smpl = Some(location),
                b"vorb" => self.chunks.vorb = Some(location),
                b"data" => self.chunks.data = Some(location),
                _ => {}
            }

            chunk_offset = chunk_offset + 8 + chunk_size;
        }

        if chunk_offset > riff_size {
            return Err(Error::parse("chunk truncated"));
        }

        if self.chunks.fmt.is_none() || self.chunks.data.is_none() {
            return Err(Error::parse("expected fmt, data chunks"));
        }

        Ok(())
    }

    fn parse_fmt(&mut self) -> Result<()> {
        let fmt = self.chunks.fmt.expect("fmt presence checked in walk_chunks");
        let fmt_size = fmt.size as i64;

        if self.chunks.vorb.is_none() && fmt_size != 0x42 {
            return Err(Error::parse("expected 0x42 fmt if vorb missing"));
        }

        if self.chunks.vorb.is_some()
            && fmt_size != 0x28
            && fmt_size != 0x18
            && fmt_size != 0x12
        {
            return Err(Error::parse("bad fmt size"));
        }

        if self.chunks.vorb.is_none() && fmt_size == 0x42 {
            // The vorb block is embedded past the fmt fields.
            self.chunks.vorb = Some(ChunkLocation {
                offset: fmt.offset + 0x18,
                size: 0,
            });
            self.vorb_size = -1;
        } else {
            self.vorb_size = self.chunks.vorb.expect("vorb checked above").size as i64;
        }

        if self.read_u16(fmt.offset)? != 0xFFFF {
            return Err(Error::parse("bad codec id"));
        }
        self.channels = self.read_u16(fmt.offset + 2)?;
        self.sample_rate = self.read_u32(fmt.offset + 4)?;
        self.avg_bytes_per_second = self.read_u32(fmt.offset + 8)?;
        if self.read_u16(fmt.offset + 12)? != 0 {
            return Err(Error::parse("bad block align"));
        }
        if self.read_u16(fmt.offset + 14)? != 0 {
            return Err(Error::parse("expected 0 bps"));
        }
        if i64::from(self.read_u16(fmt.offset + 16)?) != fmt_size - 0x12 {
            return Err(Error::parse("bad extra fmt length"));
        }

        if fmt_size - 0x12 >= 2 {
            self.ext_unk = self.read_u16(fmt.offset + 18)?;
            if fmt_size - 0x12 >= 6 {
                self.subtype = self.read_u32(fmt.offset + 20)?;
            }
        }

        if fmt_size == 0x28 {
            let signature = self
                .data
                .get(fmt.offset + 24..fmt.offset + 40)
                .ok_or_else(|| Error::truncated("extra fmt signature"))?;
            if signature != EXTRA_FMT_SIGNATURE {
                return Err(Error::parse("expected signature in extra fmt?"));
            }
        }

        Ok(())
    }

    fn parse_cue(&mut self) -> Result<()> {
        if let Some(cue) = self.chunks.cue {
            self.cue_count = self.read_u32(cue.offset)?;
        }
        Ok(())
    }

    fn parse_smpl(&mut self) -> Result<()> {
        if let Some(smpl) = self.chunks.smpl {
            self.loop_count = self.read_u32(smpl.offset + 0x1C)?;
            if self.loop_count != 1 {
                return Err(Error::parse("expected one loop"));
            }
            self.loop_start = self.read_u32(smpl.offset + 0x2C)?;
            self.loop_end = self.read_u32(smpl.offset + 0x30)?;
        }
        Ok(())
    }

    fn parse_vorb(&mut self, packet_format: PacketFormat) -> Result<()> {
        let vorb = self.chunks.vorb.expect("vorb resolved in parse_fmt");

        match self.vorb_size {
            -1 | 0x28 | 0x2A | 0x2C | 0x32 | 0x34 => {}
            _ => return Err(Error::Unsupported(format!("bad vorb size {:#x}", self.vorb_size))),
        }

        self.sample_count = self.read_u32(vorb.offset)?;

        let offsets_at = match self.vorb_size {
            -1 | 0x2A => {
                self.no_granule = true;

                let mod_signal = self.read_u32(vorb.offset + 0x4)?;
                if !MOD_SIGNALS.contains(&mod_signal) {
                    self.mod_packets = true;
                }
                vorb.offset + 0x10
            }
            _ => vorb.offset + 0x18,
        };

        match packet_format {
            PacketFormat::ForceStandard => self.mod_packets = false,
            PacketFormat::ForceMod => self.mod_packets = true,
            PacketFormat::Auto => {}
        }

        self.setup_packet_offset = self.read_u32(offsets_at)?;
        self.first_audio_packet_offset = self.read_u32(offsets_at + 4)?;

        match self.vorb_size {
            0x28 | 0x2C => {
                // uid and block sizes stay unset; the header triad carries them
                self.header_triad_present = true;
                self.old_packet_headers = true;
            }
            -1 | 0x2A => {
                self.uid = self.read_u32(vorb.offset + 0x24)?;
                self.blocksize_0_pow = self.read_u8(vorb.offset + 0x28)?;
                self.blocksize_1_pow = self.read_u8(vorb.offset + 0x29)?;
            }
            _ => {
                self.uid = self.read_u32(vorb.offset + 0x2C)?;
                self.blocksize_0_pow = self.read_u8(vorb.offset + 0x30)?;
                self.blocksize_1_pow = self.read_u8(vorb.offset + 0x31)?;
            }
        }

        Ok(())
    }

    /// Adjust and range-check loop points once the sample count is known.
    /// Wwise stores an inclusive loop end; 0 means "to the end".
    fn validate_loops(&mut self) -> Result<()> {
        if self.loop_count != 0 {
            if self.loop_end == 0 {
                self.loop_end = self.sample_count;
            } else {
                self.loop_end += 1;
            }

            if self.loop_start >= self.sample_count
                || self.loop_end > self.sample_count
                || self.loop_start > self.loop_end
            {
                return Err(Error::parse("loops out of range"));
            }
        }
        Ok(())
    }

    /// Number of channels declared by the fmt chunk.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Sample rate declared by the fmt chunk.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total sample count declared by the vorb chunk.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Human-readable summary of the parsed WEM metadata.
    pub fn info(&self) -> String {
        let mut out = String::new();

        out.push_str(if self.little_endian { "RIFF WAVE" } else { "RIFX WAVE" });
        out.push_str(&format!(
            " {} channel{} {} Hz {} bps\n",
            self.channels,
            if self.channels != 1 { "s" } else { "" },
            self.sample_rate,
            self.avg_bytes_per_second.wrapping_mul(8)
        ));
        out.push_str(&format!("{} samples\n", self.sample_count));

        if self.loop_count != 0 {
            out.push_str(&format!(
                "loop from {} to {}\n",
                self.loop_start, self.loop_end
            ));
        }

        if self.old_packet_headers {
            out.push_str("- 8 byte (old) packet headers\n");
        } else if self.no_granule {
            out.push_str("- 2 byte packet headers, no granule\n");
        } else {
            out.push_str("- 6 byte packet headers\n");
        }

        if self.header_triad_present {
            out.push_str("- Vorbis header triad present\n");
        }

        if self.full_setup || self.header_triad_present {
            out.push_str("- full setup header\n");
        } else {
            out.push_str("- stripped setup header\n");
        }

        if self.inline_codebooks || self.header_triad_present {
            out.push_str("- inline codebooks\n");
        }

        if self.mod_packets {
            out.push_str("- modified Vorbis packets\n");
        } else {
            out.push_str("- standard Vorbis packets\n");
        }

        out
    }

    /// Generate the reconstructed OGG Vorbis stream (first pass).
    ///
    /// Granule positions in the result come straight from the Wwise packet
    /// headers and are unreliable; run [`crate::revorb::regranulate`] on the
    /// returned bytes to correct them.
    pub fn generate_ogg(&self) -> Result<Vec<u8>> {
        let mut writer = OggPageWriter::new();

        let (mode_blockflag, mode_bits) = if self.header_triad_present {
            self.generate_header_triad(&mut writer)?;
            (Vec::new(), 0)
        } else {
            self.generate_header(&mut writer)?
        };

        let data = self.chunks.data.expect("data presence checked in walk_chunks");
        let data_end = data.offset + data.size;

        let mut prev_blockflag = false;
        let mut offset = data.offset + self.first_audio_packet_offset as usize;

        while offset < data_end {
            let packet = if self.old_packet_headers {
                PacketHeader::read_old(self.data, offset, self.little_endian)?
            } else {
                PacketHeader::read(self.data, offset, self.little_endian, self.no_granule)?
            };

            if offset + packet.header_size > data_end {
                return Err(Error::parse("page header truncated"));
            }

            let payload_offset = packet.payload_offset();
            let next_offset = packet.next_offset();

            // 0xFFFFFFFF would be read back as a negative granule; substitute
            // a placeholder, the regranulation pass rewrites it anyway.
            writer.set_granule(if packet.granule == u32::MAX {
                1
            } else {
                packet.granule
            });

            let payload = self
                .data
                .get(payload_offset..payload_offset + packet.size as usize)
                .ok_or_else(|| Error::truncated("audio packet payload"))?;

            if self.mod_packets {
                if mode_blockflag.is_empty() {
                    return Err(Error::parse("didn't load mode_blockflag"));
                }

                if !payload.is_empty() {
                    // OUT: 1 bit packet type (0 == audio)
                    writer.write_bits(0, 1)?;

                    let mut reader = BitReader::new(payload);

                    // IN/OUT: mode number
                    let mode_number = reader.read_bits(mode_bits)?;
                    writer.write_bits(mode_number, mode_bits)?;

                    // IN: remaining bits of the first input byte, held aside
                    let remainder = reader.read_bits(8 - mode_bits)?;

                    let blockflag = *mode_blockflag
                        .get(mode_number as usize)
                        .ok_or_else(|| Error::parse("invalid mode number in audio packet"))?;

                    if blockflag {
                        // Long window: the window flags were stripped, so peek
                        // at the next packet's mode to recover them.
                        let mut next_blockflag = false;
                        if next_offset + packet.header_size <= data_end {
                            let next_packet = PacketHeader::read(
                                self.data,
                                next_offset,
                                self.little_endian,
                                self.no_granule,
                            )?;
                            if next_packet.size > 0 {
                                let next_payload = self
                                    .data
                                    .get(
                                        next_packet.payload_offset()
                                            ..next_packet.payload_offset()
                                                + next_packet.size as usize,
                                    )
                                    .ok_or_else(|| Error::truncated("audio packet payload"))?;
                                let mut next_reader = BitReader::new(next_payload);
                                let next_mode = next_reader.read_bits(mode_bits)?;
                                next_blockflag = *mode_blockflag
                                    .get(next_mode as usize)
                                    .ok_or_else(|| {
                                        Error::parse("invalid mode number in audio packet")
                                    })?;
                            }
                        }

                        writer.write_bits(u32::from(prev_blockflag), 1)?;
                        writer.write_bits(u32::from(next_blockflag), 1)?;
                    }

                    prev_blockflag = blockflag;

                    // OUT: the held-aside remainder, then the rest verbatim
                    writer.write_bits(remainder, 8 - mode_bits)?;
                    for &b in &payload[1..] {
                        writer.write_bits(u32::from(b), 8)?;
                    }
                }
            } else {
                for &b in payload {
                    writer.write_bits(u32::from(b), 8)?;
                }
            }

            offset = next_offset;
            writer.flush_page(false, offset == data_end)?;
        }

        if offset > data_end {
            return Err(Error::parse("page truncated"));
        }

        writer.finish()
    }

    fn write_vorbis_packet_header(
        &self,
        writer: &mut OggPageWriter,
        packet_type: u8,
    ) -> Result<()> {
        writer.write_bits(u32::from(packet_type), 8)?;
        for &b in b"vorbis" {
            writer.write_bits(u32::from(b), 8)?;
        }
        Ok(())
    }

    /// Rebuild the identification, comment, and setup packets for WEMs with
    /// stripped headers. Returns the mode block flags and mode bit width
    /// needed to reconstruct modified audio packets.
    fn generate_header(&self, writer: &mut OggPageWriter) -> Result<(Vec<bool>, u32)> {
        // Identification packet
        self.write_vorbis_packet_header(writer, 1)?;
        writer.write_bits(0, 32)?; // version
        writer.write_bits(u32::from(self.channels), 8)?;
        writer.write_bits(self.sample_rate, 32)?;
        writer.write_bits(0, 32)?; // bitrate maximum
        writer.write_bits(self.avg_bytes_per_second.wrapping_mul(8), 32)?; // bitrate nominal
        writer.write_bits(0, 32)?; // bitrate minimum
        writer.write_bits(u32::from(self.blocksize_0_pow), 4)?;
        writer.write_bits(u32::from(self.blocksize_1_pow), 4)?;
        writer.write_bits(1, 1)?; // framing
        writer.flush_page(false, false)?;

        // Comment packet
        self.write_vorbis_packet_header(writer, 3)?;
        writer.write_bits(VENDOR.len() as u32, 32)?;
        for b in VENDOR.bytes() {
            writer.write_bits(u32::from(b), 8)?;
        }

        if self.loop_count == 0 {
            writer.write_bits(0, 32)?; // no user comments
        } else {
            writer.write_bits(2, 32)?;
            for comment in [
                format!("LoopStart={}", self.loop_start),
                format!("LoopEnd={}", self.loop_end),
            ] {
                writer.write_bits(comment.len() as u32, 32)?;
                for b in comment.bytes() {
                    writer.write_bits(u32::from(b), 8)?;
                }
            }
        }
        writer.write_bits(1, 1)?; // framing
        writer.flush_page(false, false)?;

        // Setup packet
        self.write_vorbis_packet_header(writer, 5)?;

        let data = self.chunks.data.expect("data presence checked in walk_chunks");
        let data_end = data.offset + data.size;

        let setup_packet = PacketHeader::read(
            self.data,
            data.offset + self.setup_packet_offset as usize,
            self.little_endian,
            self.no_granule,
        )?;

        if setup_packet.granule != 0 {
            return Err(Error::parse("setup packet granule != 0"));
        }

        let setup_slice = self
            .data
            .get(setup_packet.payload_offset()..data_end)
            .ok_or_else(|| Error::truncated("setup packet"))?;
        let mut reader = BitReader::new(setup_slice);

        let codebook_count_less1 = reader.read_bits(8)?;
        let codebook_count = codebook_count_less1 + 1;
        writer.write_bits(codebook_count_less1, 8)?;

        if self.inline_codebooks {
            for _ in 0..codebook_count {
                if self.full_setup {
                    copy_codebook(&mut reader, writer)?;
                } else {
                    rebuild_codebook(&mut reader, 0, writer)?;
                }
            }
        } else {
            for _ in 0..codebook_count {
                let codebook_id = reader.read_bits(10)?;
                match self.codebooks.rebuild_by_id(codebook_id, writer) {
                    Err(Error::InvalidCodebookId { id }) => {
                        if id == 0x342 && reader.read_bits(14)? == 0x1590 {
                            // The stream continues with a BCV sync pattern;
                            // this is a full canonical setup.
                            return Err(Error::parse(
                                "invalid codebook id 0x342, try --full-setup",
                            ));
                        }
                        return Err(Error::InvalidCodebookId { id });
                    }
                    other => other?,
                }
            }
        }

        // Time domain transform placeholder
        writer.write_bits(0, 6)?; // time_count_less1
        writer.write_bits(0, 16)?; // dummy time value

        let result = if self.full_setup {
            // Remaining setup bits are already canonical; copy verbatim.
            while reader.total_bits_read() < u64::from(setup_packet.size) * 8 {
                let bit = reader.read_bits(1)?;
                writer.write_bits(bit, 1)?;
            }
            (Vec::new(), 0)
        } else {
            let result = self.rebuild_setup_body(&mut reader, writer, codebook_count)?;
            writer.write_bits(1, 1)?; // framing
            result
        };

        writer.flush_page(false, false)?;

        if (reader.total_bits_read() + 7) / 8 != u64::from(setup_packet.size) {
            return Err(Error::parse("didn't read exactly setup packet"));
        }

        if setup_packet.next_offset() != data.offset + self.first_audio_packet_offset as usize {
            return Err(Error::parse("first audio packet doesn't follow setup packet"));
        }

        Ok(result)
    }

    /// Rebuild floors, residues, mappings, and modes from the stripped setup.
    fn rebuild_setup_body(
        &self,
        reader: &mut BitReader,
        writer: &mut OggPageWriter,
        codebook_count: u32,
    ) -> Result<(Vec<bool>, u32)> {
        // Floors, always type 1
        let floor_count_less1 = reader.read_bits(6)?;
        let floor_count = floor_count_less1 + 1;
        writer.write_bits(floor_count_less1, 6)?;

        for _ in 0..floor_count {
            writer.write_bits(1, 16)?; // floor type
            self.rebuild_floor(reader, writer, codebook_count)?;
        }

        // Residues
        let residue_count_less1 = reader.read_bits(6)?;
        let residue_count = residue_count_less1 + 1;
        writer.write_bits(residue_count_less1, 6)?;

        for _ in 0..residue_count {
            self.rebuild_residue(reader, writer, codebook_count)?;
        }

        // Mappings, always type 0
        let mapping_count_less1 = reader.read_bits(6)?;
        let mapping_count = mapping_count_less1 + 1;
        writer.write_bits(mapping_count_less1, 6)?;

        for _ in 0..mapping_count {
            self.rebuild_mapping(reader, writer, floor_count, residue_count)?;
        }

        // Modes
        let mode_count_less1 = reader.read_bits(6)?;
        let mode_count = mode_count_less1 + 1;
        writer.write_bits(mode_count_less1, 6)?;

        let mode_bits = ilog(mode_count - 1);
        let mut mode_blockflag = Vec::with_capacity(mode_count as usize);

        for _ in 0..mode_count {
            let block_flag = reader.read_bits(1)?;
            writer.write_bits(block_flag, 1)?;
            mode_blockflag.push(block_flag != 0);

            // Only 0 is valid for window type and transform type
            writer.write_bits(0, 16)?;
            writer.write_bits(0, 16)?;

            let mapping = reader.read_bits(8)?;
            writer.write_bits(mapping, 8)?;
            if mapping >= mapping_count {
                return Err(Error::parse("invalid mode mapping"));
            }
        }

        Ok((mode_blockflag, mode_bits))
    }

    fn rebuild_floor(
        &self,
        reader: &mut BitReader,
        writer: &mut OggPageWriter,
        codebook_count: u32,
    ) -> Result<()> {
        let floor1_partitions = reader.read_bits(5)?;
        writer.write_bits(floor1_partitions, 5)?;

        let mut partition_class_list = Vec::with_capacity(floor1_partitions as usize);
        let mut maximum_class = 0u32;

        for _ in 0..floor1_partitions {
            let partition_class = reader.read_bits(4)?;
            writer.write_bits(partition_class, 4)?;
            maximum_class = maximum_class.max(partition_class);
            partition_class_list.push(partition_class);
        }

        let mut class_dimensions_list = Vec::with_capacity(maximum_class as usize + 1);

        for _ in 0..=maximum_class {
            let class_dimensions_less1 = reader.read_bits(3)?;
            writer.write_bits(class_dimensions_less1, 3)?;
            class_dimensions_list.push(class_dimensions_less1 + 1);

            let class_subclasses = reader.read_bits(2)?;
            writer.write_bits(class_subclasses, 2)?;

            if class_subclasses != 0 {
                let masterbook = reader.read_bits(8)?;
                writer.write_bits(masterbook, 8)?;
                if masterbook >= codebook_count {
                    return Err(Error::parse("invalid floor1 masterbook"));
                }
            }

            for _ in 0..(1u32 << class_subclasses) {
                let subclass_book_plus1 = reader.read_bits(8)?;
                writer.write_bits(subclass_book_plus1, 8)?;
                if subclass_book_plus1 > codebook_count {
                    return Err(Error::parse("invalid floor1 subclass book"));
                }
            }
        }

        let multiplier_less1 = reader.read_bits(2)?;
        writer.write_bits(multiplier_less1, 2)?;

        let rangebits = reader.read_bits(4)?;
        writer.write_bits(rangebits, 4)?;

        for &class_number in &partition_class_list {
            for _ in 0..class_dimensions_list[class_number as usize] {
                let x = reader.read_bits(rangebits)?;
                writer.write_bits(x, rangebits)?;
            }
        }

        Ok(())
    }

    fn rebuild_residue(
        &self,
        reader: &mut BitReader,
        writer: &mut OggPageWriter,
        codebook_count: u32,
    ) -> Result<()> {
        // IN: 2 bit residue type, OUT: 16 bits
        let residue_type = reader.read_bits(2)?;
        writer.write_bits(residue_type, 16)?;

        if residue_type > 2 {
            return Err(Error::parse("invalid residue type"));
        }

        let residue_begin = reader.read_bits(24)?;
        let residue_end = reader.read_bits(24)?;
        let partition_size_less1 = reader.read_bits(24)?;
        let classifications_less1 = reader.read_bits(6)?;
        let classbook = reader.read_bits(8)?;
        let classifications = classifications_less1 + 1;

        writer.write_bits(residue_begin, 24)?;
        writer.write_bits(residue_end, 24)?;
        writer.write_bits(partition_size_less1, 24)?;
        writer.write_bits(classifications_less1, 6)?;
        writer.write_bits(classbook, 8)?;

        if classbook >= codebook_count {
            return Err(Error::parse("invalid residue classbook"));
        }

        let mut cascade = Vec::with_capacity(classifications as usize);

        for _ in 0..classifications {
            let low_bits = reader.read_bits(3)?;
            writer.write_bits(low_bits, 3)?;

            let bitflag = reader.read_bits(1)?;
            writer.write_bits(bitflag, 1)?;

            let high_bits = if bitflag != 0 {
                let high = reader.read_bits(5)?;
                writer.write_bits(high, 5)?;
                high
            } else {
                0
            };

            cascade.push(high_bits * 8 + low_bits);
        }

        for &c in &cascade {
            for k in 0..8 {
                if c & (1 << k) != 0 {
                    let residue_book = reader.read_bits(8)?;
                    writer.write_bits(residue_book, 8)?;
                    if residue_book >= codebook_count {
                        return Err(Error::parse("invalid residue book"));
                    }
                }
            }
        }

        Ok(())
    }

    fn rebuild_mapping(
        &self,
        reader: &mut BitReader,
        writer: &mut OggPageWriter,
        floor_count: u32,
        residue_count: u32,
    ) -> Result<()> {
        writer.write_bits(0, 16)?; // mapping type 0, the only one

        let submaps_flag = reader.read_bits(1)?;
        writer.write_bits(submaps_flag, 1)?;

        let submaps = if submaps_flag != 0 {
            let submaps_less1 = reader.read_bits(4)?;
            writer.write_bits(submaps_less1, 4)?;
            submaps_less1 + 1
        } else {
            1
        };

        let square_polar_flag = reader.read_bits(1)?;
        writer.write_bits(square_polar_flag, 1)?;

        if square_polar_flag != 0 {
            let coupling_steps_less1 = reader.read_bits(8)?;
            let coupling_steps = coupling_steps_less1 + 1;
            writer.write_bits(coupling_steps_less1, 8)?;

            let coupling_bits = ilog(u32::from(self.channels) - 1);

            for _ in 0..coupling_steps {
                let magnitude = reader.read_bits(coupling_bits)?;
                let angle = reader.read_bits(coupling_bits)?;
                writer.write_bits(magnitude, coupling_bits)?;
                writer.write_bits(angle, coupling_bits)?;

                if angle == magnitude
                    || magnitude >= u32::from(self.channels)
                    || angle >= u32::from(self.channels)
                {
                    return Err(Error::parse("invalid coupling"));
                }
            }
        }

        // A reserved field not removed by the Wwise encoder
        let mapping_reserved = reader.read_bits(2)?;
        writer.write_bits(mapping_reserved, 2)?;
        if mapping_reserved != 0 {
            return Err(Error::parse("mapping reserved field nonzero"));
        }

        if submaps > 1 {
            for _ in 0..self.channels {
                let mapping_mux = reader.read_bits(4)?;
                writer.write_bits(mapping_mux, 4)?;
                if mapping_mux >= submaps {
                    return Err(Error::parse("mapping_mux >= submaps"));
                }
            }
        }

        for _ in 0..submaps {
            // Unused time domain transform configuration placeholder
            let time_config = reader.read_bits(8)?;
            writer.write_bits(time_config, 8)?;

            let floor_number = reader.read_bits(8)?;
            writer.write_bits(floor_number, 8)?;
            if floor_number >= floor_count {
                return Err(Error::parse("invalid floor mapping"));
            }

            let residue_number = reader.read_bits(8)?;
            writer.write_bits(residue_number, 8)?;
            if residue_number >= residue_count {
                return Err(Error::parse("invalid residue mapping"));
            }
        }

        Ok(())
    }

    /// Copy the Vorbis header triad from older WEMs that carry the three
    /// packets verbatim inside 8-byte Wwise packet framing.
    fn generate_header_triad(&self, writer: &mut OggPageWriter) -> Result<()> {
        let data = self.chunks.data.expect("data presence checked in walk_chunks");
        let data_end = data.offset + data.size;

        let mut offset = data.offset + self.setup_packet_offset as usize;

        // Identification and comment packets: verify the type byte, copy
        for (expected_type, label) in [(1u8, "information"), (3u8, "comment")] {
            let packet = PacketHeader::read_old(self.data, offset, self.little_endian)?;
            if packet.granule != 0 {
                return Err(Error::parse(format!("{label} packet granule != 0")));
            }

            let payload = self
                .data
                .get(packet.payload_offset()..packet.payload_offset() + packet.size as usize)
                .ok_or_else(|| Error::truncated("header triad packet"))?;

            if payload.first() != Some(&expected_type) {
                return Err(Error::parse(format!("wrong type for {label} packet")));
            }

            for &b in payload {
                writer.write_bits(u32::from(b), 8)?;
            }
            writer.flush_page(false, false)?;

            offset = packet.next_offset();
        }

        // Setup packet: copy bit-by-bit, validating codebook sync patterns
        {
            let packet = PacketHeader::read_old(self.data, offset, self.little_endian)?;
            if packet.granule != 0 {
                return Err(Error::parse("setup packet granule != 0"));
            }

            let payload = self
                .data
                .get(packet.payload_offset()..data_end)
                .ok_or_else(|| Error::truncated("header triad packet"))?;
            let mut reader = BitReader::new(payload);

            let packet_type = reader.read_bits(8)?;
            if packet_type != 5 {
                return Err(Error::parse("wrong type for setup packet"));
            }
            writer.write_bits(packet_type, 8)?;

            for _ in 0..6 {
                let c = reader.read_bits(8)?;
                writer.write_bits(c, 8)?;
            }

            let codebook_count_less1 = reader.read_bits(8)?;
            writer.write_bits(codebook_count_less1, 8)?;

            for _ in 0..codebook_count_less1 + 1 {
                copy_codebook(&mut reader, writer)?;
            }

            while reader.total_bits_read() < u64::from(packet.size) * 8 {
                let bit = reader.read_bits(1)?;
                writer.write_bits(bit, 1)?;
            }

            writer.flush_page(false, false)?;
            offset = packet.next_offset();
        }

        if offset != data.offset + self.first_audio_packet_offset as usize {
            return Err(Error::parse("first audio packet doesn't follow setup packet"));
        }

        Ok(())
    }
}
