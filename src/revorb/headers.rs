//! Vorbis header parsing for the regranulation pass.
//!
//! The regranulator needs exactly one piece of decoder knowledge: the block
//! size of every audio packet. That is determined by the packet's mode
//! number, so this module skims the identification and setup headers of a
//! canonical Vorbis stream to recover the block-size exponents and the mode
//! block-flag table. No codebook or floor data is retained; those sections
//! are parsed only to advance the bit cursor.

use crate::bitio::BitReader;
use crate::codebook::{ilog, maptype1_quantvals};
use crate::error::{Error, Result};

/// Block-size oracle extracted from a stream's Vorbis headers.
#[derive(Debug, Clone)]
pub struct VorbisStreamInfo {
    /// Number of audio channels
    pub channels: u8,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Short block size in samples
    pub blocksize_0: u32,
    /// Long block size in samples
    pub blocksize_1: u32,
    /// Per-mode long-window flag
    mode_blockflag: Vec<bool>,
    /// Bits used to encode a mode number in audio packets
    mode_bits: u32,
}

impl VorbisStreamInfo {
    /// Parse the identification and setup header packets.
    pub fn from_headers(ident: &[u8], setup: &[u8]) -> Result<Self> {
        let (channels, sample_rate, blocksize_0, blocksize_1) = parse_ident(ident)?;
        let (mode_blockflag, mode_bits) = parse_setup(setup, channels)?;

        Ok(VorbisStreamInfo {
            channels,
            sample_rate,
            blocksize_0,
            blocksize_1,
            mode_blockflag,
            mode_bits,
        })
    }

    /// Block size of an audio packet, from its mode number.
    ///
    /// # Errors
    /// Fails when the packet is a header packet, is empty, or references a
    /// mode outside the table.
    pub fn packet_blocksize(&self, packet: &[u8]) -> Result<u32> {
        let mut reader = BitReader::new(packet);

        if reader.read_bit()? {
            return Err(Error::regranulation("header packet in audio stream"));
        }

        let mode_number = reader.read_bits(self.mode_bits)?;
        let long_window = *self
            .mode_blockflag
            .get(mode_number as usize)
            .ok_or_else(|| Error::regranulation("packet references unknown mode"))?;

        Ok(if long_window {
            self.blocksize_1
        } else {
            self.blocksize_0
        })
    }
}

fn expect_header(reader: &mut BitReader, packet_type: u32) -> Result<()> {
    if reader.read_bits(8)? != packet_type {
        return Err(Error::regranulation("wrong Vorbis header packet type"));
    }
    for &b in b"vorbis" {
        if reader.read_bits(8)? != u32::from(b) {
            return Err(Error::regranulation("missing vorbis capture pattern"));
        }
    }
    Ok(())
}

fn parse_ident(packet: &[u8]) -> Result<(u8, u32, u32, u32)> {
    let mut reader = BitReader::new(packet);
    expect_header(&mut reader, 1)?;

    if reader.read_bits(32)? != 0 {
        return Err(Error::regranulation("unsupported Vorbis version"));
    }

    let channels = reader.read_bits(8)? as u8;
    let sample_rate = reader.read_bits(32)?;
    if channels == 0 || sample_rate == 0 {
        return Err(Error::regranulation("bad identification header"));
    }

    reader.read_bits(32)?; // bitrate maximum
    reader.read_bits(32)?; // bitrate nominal
    reader.read_bits(32)?; // bitrate minimum

    let blocksize_0_pow = reader.read_bits(4)?;
    let blocksize_1_pow = reader.read_bits(4)?;
    if blocksize_1_pow < blocksize_0_pow {
        return Err(Error::regranulation("block sizes out of order"));
    }

    if reader.read_bits(1)? != 1 {
        return Err(Error::regranulation("identification framing bit missing"));
    }

    Ok((channels, sample_rate, 1 << blocksize_0_pow, 1 << blocksize_1_pow))
}

fn parse_setup(packet: &[u8], channels: u8) -> Result<(Vec<bool>, u32)> {
    let mut r = BitReader::new(packet);
    expect_header(&mut r, 5)?;

    let codebook_count = r.read_bits(8)? + 1;
    for _ in 0..codebook_count {
        skim_codebook(&mut r)?;
    }

    // Time domain transforms (placeholders, 16 bits each)
    let time_count = r.read_bits(6)? + 1;
    for _ in 0..time_count {
        r.read_bits(16)?;
    }

    let floor_count = r.read_bits(6)? + 1;
    for _ in 0..floor_count {
        match r.read_bits(16)? {
            1 => skim_floor1(&mut r)?,
            other => {
                return Err(Error::unsupported(format!("floor type {other} in setup header")))
            }
        }
    }

    let residue_count = r.read_bits(6)? + 1;
    for _ in 0..residue_count {
        let residue_type = r.read_bits(16)?;
        if residue_type > 2 {
            return Err(Error::regranulation("invalid residue type"));
        }
        skim_residue(&mut r)?;
    }

    let mapping_count = r.read_bits(6)? + 1;
    for _ in 0..mapping_count {
        if r.read_bits(16)? != 0 {
            return Err(Error::regranulation("invalid mapping type"));
        }
        skim_mapping(&mut r, channels)?;
    }

    let mode_count = r.read_bits(6)? + 1;
    let mode_bits = ilog(mode_count - 1);
    let mut mode_blockflag = Vec::with_capacity(mode_count as usize);

    for _ in 0..mode_count {
        mode_blockflag.push(r.read_bit()?);
        r.read_bits(16)?; // window type
        r.read_bits(16)?; // transform type
        r.read_bits(8)?; // mapping number
    }

    if r.read_bits(1)? != 1 {
        return Err(Error::regranulation("setup framing bit missing"));
    }

    Ok((mode_blockflag, mode_bits))
}

/// Advance past one canonical codebook without retaining it.
fn skim_codebook(r: &mut BitReader) -> Result<()> {
    if r.read_bits(24)? != 0x564342 {
        return Err(Error::regranulation("invalid codebook identifier"));
    }
    let dimensions = r.read_bits(16)?;
    let entries = r.read_bits(24)?;

    if r.read_bit()? {
        // ordered
        r.read_bits(5)?;
        let mut current_entry = 0u32;
        while current_entry < entries {
            let number = r.read_bits(ilog(entries - current_entry))?;
            current_entry += number;
        }
        if current_entry > entries {
            return Err(Error::regranulation("current_entry out of range"));
        }
    } else {
        let sparse = r.read_bit()?;
        for _ in 0..entries {
            if !sparse || r.read_bit()? {
                r.read_bits(5)?;
            }
        }
    }

    match r.read_bits(4)? {
        0 => {}
        1 => {
            r.read_bits(32)?; // minimum
            r.read_bits(32)?; // delta
            let value_length = r.read_bits(4)?;
            r.read_bits(1)?; // sequence flag
            for _ in 0..maptype1_quantvals(entries, dimensions) {
                r.read_bits(value_length + 1)?;
            }
        }
        _ => return Err(Error::regranulation("unsupported codebook lookup type")),
    }

    Ok(())
}

fn skim_floor1(r: &mut BitReader) -> Result<()> {
    let partitions = r.read_bits(5)?;
    let mut classes = Vec::with_capacity(partitions as usize);
    let mut maximum_class = 0u32;
    for _ in 0..partitions {
        let class = r.read_bits(4)?;
        maximum_class = maximum_class.max(class);
        classes.push(class);
    }

    let mut dimensions = vec![0u32; maximum_class as usize + 1];
    for dim in dimensions.iter_mut() {
        *dim = r.read_bits(3)? + 1;
        let subclasses = r.read_bits(2)?;
        if subclasses != 0 {
            r.read_bits(8)?; // masterbook
        }
        for _ in 0..(1u32 << subclasses) {
            r.read_bits(8)?; // subclass book
        }
    }

    r.read_bits(2)?; // multiplier
    let rangebits = r.read_bits(4)?;
    for &class in &classes {
        for _ in 0..dimensions[class as usize] {
            r.read_bits(rangebits)?;
        }
    }

    Ok(())
}

fn skim_residue(r: &mut BitReader) -> Result<()> {
    r.read_bits(24)?; // begin
    r.read_bits(24)?; // end
    r.read_bits(24)?; // partition size
    let classifications = r.read_bits(6)? + 1;
    r.read_bits(8)?; // classbook

    let mut cascade = Vec::with_capacity(classifications as usize);
    for _ in 0..classifications {
        let low = r.read_bits(3)?;
        let high = if r.read_bit()? { r.read_bits(5)? } else { 0 };
        cascade.push(high * 8 + low);
    }

    for &c in &cascade {
        for k in 0..8 {
            if c & (1 << k) != 0 {
                r.read_bits(8)?;
            }
        }
    }

    Ok(())
}

fn skim_mapping(r: &mut BitReader, channels: u8) -> Result<()> {
    let submaps = if r.read_bit()? { r.read_bits(4)? + 1 } else { 1 };

    if r.read_bit()? {
        // square polar coupling
        let coupling_steps = r.read_bits(8)? + 1;
        let coupling_bits = ilog(u32::from(channels) - 1);
        for _ in 0..coupling_steps {
            r.read_bits(coupling_bits)?; // magnitude
            r.read_bits(coupling_bits)?; // angle
        }
    }

    if r.read_bits(2)? != 0 {
        return Err(Error::regranulation("mapping reserved field nonzero"));
    }

    if submaps > 1 {
        for _ in 0..channels {
            r.read_bits(4)?;
        }
    }

    for _ in 0..submaps {
        r.read_bits(8)?; // time configuration
        r.read_bits(8)?; // floor number
        r.read_bits(8)?; // residue number
    }

    Ok(())
}
