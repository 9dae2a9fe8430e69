//! Wwise WEM (RIFF/RIFX Vorbis) parsing and OGG reconstruction.
//!
//! A WEM file is a RIFF container wrapping a Vorbis bitstream that Wwise has
//! stripped down: the identification and comment headers are gone, the setup
//! header is re-encoded (with codebooks possibly moved to an external packed
//! file), and audio packets are framed with short Wwise headers instead of
//! OGG pages.
//!
//! [`WwiseRiffVorbis`] parses the container and re-emits a syntactically
//! valid OGG Vorbis stream. Granule positions in that stream are provisional;
//! the [`crate::revorb`] pass corrects them.

pub mod converter;
pub mod packet;

pub use converter::{ConversionOptions, PacketFormat, WwiseRiffVorbis};
pub use packet::PacketHeader;
