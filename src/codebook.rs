//! Vorbis codebook library.
//!
//! Wwise strips codebooks out of the Vorbis setup header and either stores
//! them inline in a compact encoding or replaces them with 10-bit IDs into an
//! external packed codebook file. This module decodes both forms and re-emits
//! codebooks in the canonical Vorbis wire format.
//!
//! The packed file layout is: concatenated compact codebooks, a table of
//! 32-bit LE offsets (one per codebook plus a sentinel), and a final 32-bit
//! LE value giving the offset of that table.

use crate::bitio::{BitReader, OggPageWriter};
use crate::error::{Error, Result};

/// Codebook sync pattern, "BCV" as a 24-bit little-endian field.
const CODEBOOK_SYNC: u32 = 0x564342;

/// Number of bits required to represent `v` (integer log2 + 1, 0 for v == 0).
pub fn ilog(v: u32) -> u32 {
    32 - v.leading_zeros()
}

/// Number of quantization values for a Vorbis maptype-1 codebook:
/// floor(entries^(1/dimensions)), computed with the exact integer search
/// used by Tremor.
pub fn maptype1_quantvals(entries: u32, dimensions: u32) -> u32 {
    if entries == 0 || dimensions == 0 {
        return 0;
    }

    // Starting hint, polished below
    let bits = ilog(entries);
    let mut vals = u64::from(entries >> ((bits - 1) * (dimensions - 1) / dimensions));

    loop {
        let mut acc: u64 = 1;
        let mut acc1: u64 = 1;
        for _ in 0..dimensions {
            acc = acc.saturating_mul(vals);
            acc1 = acc1.saturating_mul(vals + 1);
        }
        if acc <= u64::from(entries) && acc1 > u64::from(entries) {
            return vals as u32;
        }
        if acc > u64::from(entries) {
            vals -= 1;
        } else {
            vals += 1;
        }
    }
}

/// Library of packed Vorbis codebooks.
///
/// Constructed either from the external packed codebook blob (for WEMs that
/// reference codebooks by ID) or empty (for WEMs with inline codebooks).
#[derive(Debug, Clone, Default)]
pub struct CodebookLibrary {
    data: Vec<u8>,
    offsets: Vec<u32>,
}

impl CodebookLibrary {
    /// Create an empty library for inline-codebook conversions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a packed codebook blob.
    ///
    /// The final 4 bytes give the offset of the ID-to-offset table; each
    /// table entry is a 32-bit LE offset into the blob. The last entry is a
    /// sentinel marking the end of the final codebook.
    pub fn from_packed(blob: &[u8]) -> Result<Self> {
        if blob.len() < 4 {
            return Err(Error::parse("packed codebook file too small"));
        }

        let table_offset =
            u32::from_le_bytes(blob[blob.len() - 4..].try_into().unwrap()) as usize;
        if table_offset > blob.len() - 4 {
            return Err(Error::parse("packed codebook offset table out of range"));
        }

        let table = &blob[table_offset..blob.len() - 4];
        if table.len() % 4 != 0 {
            return Err(Error::parse("packed codebook offset table misaligned"));
        }

        let offsets: Vec<u32> = table
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();

        for window in offsets.windows(2) {
            if window[0] > window[1] || window[1] as usize > table_offset {
                return Err(Error::parse("packed codebook offsets not monotonic"));
            }
        }

        Ok(CodebookLibrary {
            data: blob[..table_offset].to_vec(),
            offsets,
        })
    }

    /// Number of codebooks in the library (the last offset is a sentinel).
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// True when the library holds no codebooks (inline mode).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes of codebook `id`, or None when the id is out of range.
    pub fn codebook(&self, id: u32) -> Option<&[u8]> {
        let i = id as usize;
        if i + 1 >= self.offsets.len() {
            return None;
        }
        self.data
            .get(self.offsets[i] as usize..self.offsets[i + 1] as usize)
    }

    /// Rebuild codebook `id` from the packed library into canonical form.
    ///
    /// # Errors
    /// `Error::InvalidCodebookId` when the id is not in the library.
    pub fn rebuild_by_id(&self, id: u32, out: &mut OggPageWriter) -> Result<()> {
        if self.offsets.is_empty() {
            return Err(Error::parse("codebook library not loaded"));
        }

        let cb = self
            .codebook(id)
            .ok_or(Error::InvalidCodebookId { id })?;

        let mut reader = BitReader::new(cb);
        rebuild_codebook(&mut reader, cb.len() as u64, out)
    }
}

/// Translate one codebook from the Wwise compact encoding into the canonical
/// Vorbis encoding.
///
/// `cb_size` is the compact codebook's byte length; pass 0 to skip the
/// exact-size check (inline bitstreams have no per-codebook framing).
pub fn rebuild_codebook(
    reader: &mut BitReader,
    cb_size: u64,
    out: &mut OggPageWriter,
) -> Result<()> {
    // IN: 4 bit dimensions, 14 bit entry count
    let dimensions = reader.read_bits(4)?;
    let entries = reader.read_bits(14)?;

    // OUT: 24 bit sync pattern, 16 bit dimensions, 24 bit entry count
    out.write_bits(CODEBOOK_SYNC, 24)?;
    out.write_bits(dimensions, 16)?;
    out.write_bits(entries, 24)?;

    // Codeword lengths
    let ordered = reader.read_bits(1)?;
    out.write_bits(ordered, 1)?;

    if ordered != 0 {
        let initial_length = reader.read_bits(5)?;
        out.write_bits(initial_length, 5)?;

        let mut current_entry = 0u32;
        while current_entry < entries {
            // IN/OUT: ilog(entries - current_entry) bit count with given length
            let number = reader.read_bits(ilog(entries - current_entry))?;
            out.write_bits(number, ilog(entries - current_entry))?;
            current_entry += number;
        }
        if current_entry > entries {
            return Err(Error::parse("current_entry out of range"));
        }
    } else {
        // IN: 3 bit codeword length width, 1 bit sparse flag
        let codeword_length_length = reader.read_bits(3)?;
        let sparse = reader.read_bits(1)?;

        if codeword_length_length == 0 || codeword_length_length > 5 {
            return Err(Error::parse("nonsense codeword length"));
        }

        // OUT: 1 bit sparse flag
        out.write_bits(sparse, 1)?;

        for _ in 0..entries {
            let mut present = true;

            if sparse != 0 {
                let present_bit = reader.read_bits(1)?;
                out.write_bits(present_bit, 1)?;
                present = present_bit != 0;
            }

            if present {
                // IN: narrow codeword length-1, OUT: 5 bit codeword length-1
                let codeword_length = reader.read_bits(codeword_length_length)?;
                out.write_bits(codeword_length, 5)?;
            }
        }
    }

    // Lookup table: IN 1 bit type, OUT 4 bit type
    let lookup_type = reader.read_bits(1)?;
    out.write_bits(lookup_type, 4)?;

    match lookup_type {
        0 => {}
        1 => {
            let min = reader.read_bits(32)?;
            let max = reader.read_bits(32)?;
            let value_length = reader.read_bits(4)?;
            let sequence_flag = reader.read_bits(1)?;
            out.write_bits(min, 32)?;
            out.write_bits(max, 32)?;
            out.write_bits(value_length, 4)?;
            out.write_bits(sequence_flag, 1)?;

            let quantvals = maptype1_quantvals(entries, dimensions);
            for _ in 0..quantvals {
                let val = reader.read_bits(value_length + 1)?;
                out.write_bits(val, value_length + 1)?;
            }
        }
        _ => return Err(Error::parse("didn't expect lookup type 2")),
    }

    // Wwise pads each packed codebook to a whole byte.
    if cb_size != 0 && reader.total_bits_read() / 8 + 1 != cb_size {
        return Err(Error::CodebookSizeMismatch {
            expected: cb_size,
            actual: reader.total_bits_read() / 8 + 1,
        });
    }

    Ok(())
}

/// Copy one canonical-form codebook from the input bitstream to the output,
/// validating the sync pattern. Used for full-setup WEMs whose codebooks are
/// already in Vorbis wire format.
pub fn copy_codebook(reader: &mut BitReader, out: &mut OggPageWriter) -> Result<()> {
    // IN/OUT: 24 bit sync pattern, 16 bit dimensions, 24 bit entry count
    let sync = reader.read_bits(24)?;
    let dimensions = reader.read_bits(16)?;
    let entries = reader.read_bits(24)?;

    if sync != CODEBOOK_SYNC {
        return Err(Error::parse("invalid codebook identifier"));
    }

    out.write_bits(sync, 24)?;
    out.write_bits(dimensions, 16)?;
    out.write_bits(entries, 24)?;

    let ordered = reader.read_bits(1)?;
    out.write_bits(ordered, 1)?;

    if ordered != 0 {
        let initial_length = reader.read_bits(5)?;
        out.write_bits(initial_length, 5)?;

        let mut current_entry = 0u32;
        while current_entry < entries {
            let number = reader.read_bits(ilog(entries - current_entry))?;
            out.write_bits(number, ilog(entries - current_entry))?;
            current_entry += number;
        }
        if current_entry > entries {
            return Err(Error::parse("current_entry out of range"));
        }
    } else {
        let sparse = reader.read_bits(1)?;
        out.write_bits(sparse, 1)?;

        for _ in 0..entries {
            let mut present = true;

            if sparse != 0 {
                let present_bit = reader.read_bits(1)?;
                out.write_bits(present_bit, 1)?;
                present = present_bit != 0;
            }

            if present {
                let codeword_length = reader.read_bits(5)?;
                out.write_bits(codeword_length, 5)?;
            }
        }
    }

    let lookup_type = reader.read_bits(4)?;
    out.write_bits(lookup_type, 4)?;

    match lookup_type {
        0 => {}
        1 => {
            let min = reader.read_bits(32)?;
            let max = reader.read_bits(32)?;
            let value_length = reader.read_bits(4)?;
            let sequence_flag = reader.read_bits(1)?;
            out.write_bits(min, 32)?;
            out.write_bits(max, 32)?;
            out.write_bits(value_length, 4)?;
            out.write_bits(sequence_flag, 1)?;

            let quantvals = maptype1_quantvals(entries, dimensions);
            for _ in 0..quantvals {
                let val = reader.read_bits(value_length + 1)?;
                out.write_bits(val, value_length + 1)?;
            }
        }
        2 => return Err(Error::parse("didn't expect lookup type 2")),
        _ => return Err(Error::parse("invalid lookup type")),
    }

    Ok(())
}
