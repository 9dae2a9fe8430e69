//! Wwise BNK soundbank parsing.
//!
//! A BNK file is a flat sequence of sections, each `[4-byte tag][u32 LE
//! size][payload]`. The sections of interest:
//!
//! - `BKHD` - bank header (version, soundbank id)
//! - `DIDX` - data index: `{id, offset, size}` per embedded WEM
//! - `DATA` - concatenated WEM payloads, sliced by DIDX
//! - `HIRC` - object hierarchy (events, actions, sounds, containers)
//! - `STID` - id-to-name string table
//!
//! Unrecognised sections are skipped. [`Soundbank`] borrows the input buffer
//! and hands out embedded WEM payloads as slices of it.

pub mod hirc;
pub mod report;

pub use hirc::{parent_id, ActionKind, EventAction, HircKind, HircObject, Sound};

use std::collections::HashSet;
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use crate::error::{Error, Result};

/// BKHD section contents.
#[derive(Debug, Clone, Copy)]
pub struct BankHeader {
    pub version: u32,
    pub id: u32,
}

/// One DIDX entry describing an embedded WEM.
#[derive(Debug, Clone, Copy)]
pub struct DidxEntry {
    /// WEM id (also its conventional file name, `<id>.wem`)
    pub id: u32,
    /// Byte offset into the DATA payload
    pub offset: u32,
    /// Payload length in bytes
    pub size: u32,
}

/// One STID entry mapping an object id to a name.
#[derive(Debug, Clone)]
pub struct StringEntry {
    pub id: u32,
    pub name: String,
}

/// An embedded WEM resolved from DIDX/DATA.
///
/// When `streamed` is set, `data` holds only the prefetch stub stored in the
/// bank; the full audio lives in an external `<id>.wem` the caller must
/// supply.
#[derive(Debug, Clone, Copy)]
pub struct BnkEntry<'a> {
    pub id: u32,
    pub streamed: bool,
    pub data: &'a [u8],
}

/// A parsed BNK soundbank.
#[derive(Debug, Default)]
pub struct Soundbank<'a> {
    pub header: Option<BankHeader>,
    pub didx: Vec<DidxEntry>,
    data: Option<&'a [u8]>,
    /// HIRC objects; None when the bank has no HIRC section at all
    pub objects: Option<Vec<HircObject>>,
    pub names: Vec<StringEntry>,
}

impl<'a> Soundbank<'a> {
    /// Parse a BNK buffer, indexing all recognised sections.
    pub fn parse(input: &'a [u8]) -> Result<Self> {
        let mut bank = Soundbank::default();
        let mut pos = 0usize;

        while pos + 8 <= input.len() {
            let tag: [u8; 4] = input[pos..pos + 4].try_into().unwrap();
            let size =
                u32::from_le_bytes(input[pos + 4..pos + 8].try_into().unwrap()) as usize;

            let payload = input
                .get(pos + 8..pos + 8 + size)
                .ok_or_else(|| Error::truncated("BNK section payload"))?;

            match &tag {
                b"BKHD" => bank.header = Some(parse_bkhd(payload)?),
                b"DIDX" => bank.didx = parse_didx(payload)?,
                b"DATA" => bank.data = Some(payload),
                b"HIRC" => bank.objects = Some(hirc::parse_hirc(payload)?),
                b"STID" => bank.names = parse_stid(payload)?,
                _ => {}
            }

            pos += 8 + size;
        }

        if pos != input.len() {
            return Err(Error::truncated("BNK section header"));
        }

        debug!(
            wems = bank.didx.len(),
            objects = bank.objects.as_ref().map_or(0, Vec::len),
            names = bank.names.len(),
            "parsed BNK"
        );

        Ok(bank)
    }

    /// Embedded WEM payloads in DIDX order.
    pub fn extract(&self) -> Result<Vec<&'a [u8]>> {
        if self.didx.is_empty() {
            return Ok(Vec::new());
        }

        let data = self
            .data
            .ok_or_else(|| Error::parse("BNK has a DIDX but no DATA section"))?;

        self.didx
            .iter()
            .map(|entry| {
                data.get(entry.offset as usize..(entry.offset + entry.size) as usize)
                    .ok_or_else(|| {
                        Error::parse(format!("DIDX entry {} out of DATA range", entry.id))
                    })
            })
            .collect()
    }

    /// WEM ids in DIDX order.
    pub fn wem_ids(&self) -> Vec<u32> {
        self.didx.iter().map(|entry| entry.id).collect()
    }

    /// Audio file ids of sounds flagged as streamed in HIRC.
    pub fn streamed_ids(&self) -> Vec<u32> {
        self.objects
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|obj| match &obj.kind {
                HircKind::Sound(sound) if sound.included_or_streamed != 0 => {
                    Some(sound.audio_file_id)
                }
                _ => None,
            })
            .collect()
    }

    /// Embedded WEMs zipped with their ids and streamed flags.
    pub fn entries(&self) -> Result<Vec<BnkEntry<'a>>> {
        let streamed: HashSet<u32> = self.streamed_ids().into_iter().collect();
        let payloads = self.extract()?;

        Ok(self
            .didx
            .iter()
            .zip(payloads)
            .map(|(entry, data)| BnkEntry {
                id: entry.id,
                streamed: streamed.contains(&entry.id),
                data,
            })
            .collect())
    }

    /// Name from the STID table, if the bank has one for this id.
    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.names
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.name.as_str())
    }

    /// Human-readable bank summary: header fields and embedded WEM ids.
    pub fn info(&self) -> String {
        let mut out = String::new();

        if let Some(header) = self.header {
            out.push_str(&format!("Version: {}\n", header.version));
            out.push_str(&format!("Soundbank ID: {}\n", header.id));
        }

        if !self.didx.is_empty() {
            out.push_str(&format!("{} embedded WEM files:\n", self.didx.len()));
            for entry in &self.didx {
                out.push_str(&format!("\t{}\n", entry.id));
            }
        }

        out
    }
}

fn parse_bkhd(payload: &[u8]) -> Result<BankHeader> {
    let mut cursor = Cursor::new(payload);
    let version = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::truncated("BKHD section"))?;
    let id = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::truncated("BKHD section"))?;
    Ok(BankHeader { version, id })
}

fn parse_didx(payload: &[u8]) -> Result<Vec<DidxEntry>> {
    if payload.len() % 12 != 0 {
        return Err(Error::parse("DIDX section size not a multiple of 12"));
    }

    Ok(payload
        .chunks_exact(12)
        .map(|chunk| DidxEntry {
            id: u32::from_le_bytes(chunk[0..4].try_into().unwrap()),
            offset: u32::from_le_bytes(chunk[4..8].try_into().unwrap()),
            size: u32::from_le_bytes(chunk[8..12].try_into().unwrap()),
        })
        .collect())
}

fn parse_stid(payload: &[u8]) -> Result<Vec<StringEntry>> {
    let mut cursor = Cursor::new(payload);
    let _string_type = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::truncated("STID section"))?;
    let count = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::truncated("STID section"))?;

    let mut names = Vec::with_capacity(count.min(0x10000) as usize);
    for _ in 0..count {
        let id = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::truncated("STID entry"))?;
        let len = cursor
            .read_u8()
            .map_err(|_| Error::truncated("STID entry"))? as usize;

        let start = cursor.position() as usize;
        let bytes = payload
            .get(start..start + len)
            .ok_or_else(|| Error::truncated("STID entry name"))?;
        cursor.set_position((start + len) as u64);

        names.push(StringEntry {
            id,
            name: String::from_utf8_lossy(bytes).into_owned(),
        });
    }

    Ok(names)
}
