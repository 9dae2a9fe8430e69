//! OGG page regranulation.
//!
//! The stream produced by the WEM converter is well-formed except for its
//! granule positions, which come straight from Wwise packet headers and do
//! not reflect cumulative sample counts. This pass reads the stream back
//! packet by packet, recomputes every granule from Vorbis block-size overlap
//! arithmetic, and re-pages the result.
//!
//! Each Vorbis packet contributes `blocksize / 2` samples, overlap-added
//! with its neighbour, so the stream advances `(prev + cur) / 4` samples per
//! packet after the first.

pub mod headers;

pub use headers::VorbisStreamInfo;

use std::io::Cursor;

use ogg::{PacketWriteEndInfo, PacketWriter};
use tracing::debug;

use crate::error::{Error, Result};

/// Rewrite a Vorbis OGG stream with corrected granule positions.
///
/// The first three packets (identification, comment, setup) are copied
/// verbatim; every audio packet is assigned the cumulative sample position
/// after its completed block, and the final packet carries EOS.
pub fn regranulate(input: &[u8]) -> Result<Vec<u8>> {
    let mut reader = ogg::PacketReader::new(Cursor::new(input));

    let mut packets = Vec::new();
    loop {
        match reader.read_packet() {
            Ok(Some(packet)) => packets.push(packet),
            Ok(None) => break,
            Err(e) => return Err(Error::regranulation(format!("malformed OGG page: {e}"))),
        }
    }

    if packets.len() < 3 {
        return Err(Error::regranulation("missing Vorbis header packets"));
    }

    let info = VorbisStreamInfo::from_headers(&packets[0].data, &packets[2].data)?;
    let serial = packets[0].stream_serial();

    debug!(
        packets = packets.len(),
        blocksize_0 = info.blocksize_0,
        blocksize_1 = info.blocksize_1,
        "regranulating stream"
    );

    let mut writer = PacketWriter::new(Vec::new());
    let count = packets.len();
    let mut granule: u64 = 0;
    let mut last_blocksize: u32 = 0;

    for (i, packet) in packets.into_iter().enumerate() {
        // Identification must end its page; comment and setup share one.
        let (end_info, absgp) = match i {
            0 | 2 => (PacketWriteEndInfo::EndPage, 0),
            1 => (PacketWriteEndInfo::NormalPacket, 0),
            _ => {
                if !packet.data.is_empty() {
                    let blocksize = info.packet_blocksize(&packet.data)?;
                    if last_blocksize != 0 {
                        granule += u64::from((last_blocksize + blocksize) / 4);
                    }
                    last_blocksize = blocksize;
                }

                if i + 1 == count {
                    (PacketWriteEndInfo::EndStream, granule)
                } else {
                    (PacketWriteEndInfo::NormalPacket, granule)
                }
            }
        };

        writer
            .write_packet(packet.data, serial, end_info, absgp)
            .map_err(|e| Error::regranulation(format!("page write failed: {e}")))?;
    }

    Ok(writer.into_inner())
}
