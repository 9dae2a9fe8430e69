//! Wwise audio packet headers.
//!
//! Wwise frames Vorbis packets with its own short headers instead of OGG
//! pages. Three layouts exist:
//!
//! - 6-byte: `[size:u16][granule:u32]` (the common modern form)
//! - 2-byte: `[size:u16]` (`no_granule` WEMs)
//! - 8-byte: `[size:u32][granule:u32]` (older WEMs with the header triad)
//!
//! Multi-byte fields follow the container's RIFF/RIFX endianness.

use crate::error::{Error, Result};

fn read_u16(data: &[u8], offset: usize, little_endian: bool) -> Result<u16> {
    let bytes: [u8; 2] = data
        .get(offset..offset + 2)
        .ok_or_else(|| Error::truncated("packet header"))?
        .try_into()
        .unwrap();
    Ok(if little_endian {
        u16::from_le_bytes(bytes)
    } else {
        u16::from_be_bytes(bytes)
    })
}

fn read_u32(data: &[u8], offset: usize, little_endian: bool) -> Result<u32> {
    let bytes: [u8; 4] = data
        .get(offset..offset + 4)
        .ok_or_else(|| Error::truncated("packet header"))?
        .try_into()
        .unwrap();
    Ok(if little_endian {
        u32::from_le_bytes(bytes)
    } else {
        u32::from_be_bytes(bytes)
    })
}

/// A decoded Wwise packet header.
#[derive(Debug, Clone, Copy)]
pub struct PacketHeader {
    /// Offset of the header itself within the buffer
    pub offset: usize,
    /// Payload length in bytes
    pub size: u32,
    /// Absolute granule position (0 when the header has no granule field)
    pub granule: u32,
    /// Header length: 2, 6, or 8 bytes
    pub header_size: usize,
}

impl PacketHeader {
    /// Read a modern 6-byte (or 2-byte when `no_granule`) packet header.
    pub fn read(
        data: &[u8],
        offset: usize,
        little_endian: bool,
        no_granule: bool,
    ) -> Result<Self> {
        let size = u32::from(read_u16(data, offset, little_endian)?);
        let granule = if no_granule {
            0
        } else {
            read_u32(data, offset + 2, little_endian)?
        };
        Ok(PacketHeader {
            offset,
            size,
            granule,
            header_size: if no_granule { 2 } else { 6 },
        })
    }

    /// Read an old-style 8-byte packet header.
    pub fn read_old(data: &[u8], offset: usize, little_endian: bool) -> Result<Self> {
        let size = read_u32(data, offset, little_endian)?;
        let granule = read_u32(data, offset + 4, little_endian)?;
        Ok(PacketHeader {
            offset,
            size,
            granule,
            header_size: 8,
        })
    }

    /// Offset of the packet payload.
    pub fn payload_offset(&self) -> usize {
        self.offset + self.header_size
    }

    /// Offset of the next packet header.
    pub fn next_offset(&self) -> usize {
        self.offset + self.header_size + self.size as usize
    }
}
