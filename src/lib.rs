//! wwtools - Wwise audio asset tools in Rust
//!
//! wwtools converts audio assets from the Wwise middleware's proprietary
//! formats into standard ones: WEM files become playable OGG Vorbis streams,
//! and BNK soundbanks can be inspected and their embedded WEMs extracted.
//!
//! # Architecture
//!
//! The crate is organised into several key modules:
//!
//! - `bitio`: LSB-first bit-level I/O and the OGG page assembler
//! - `codebook`: Vorbis codebook decoding/re-encoding (packed and inline)
//! - `wem`: WEM container parsing and OGG stream reconstruction
//! - `revorb`: second-pass granule position correction
//! - `bnk`: BNK soundbank parsing, extraction, and event reporting
//!
//! Conversion is a two-stage pipeline: [`wem::WwiseRiffVorbis`] rebuilds a
//! syntactically valid Vorbis stream from the Wwise container, then
//! [`revorb::regranulate`] re-pages it with granule positions derived from
//! block-size overlap arithmetic. [`wem_to_ogg`] runs both stages.

pub mod bitio;
pub mod bnk;
pub mod codebook;
pub mod error;
pub mod revorb;
pub mod wem;

pub use codebook::CodebookLibrary;
pub use error::{Error, Result};
pub use wem::{ConversionOptions, PacketFormat, WwiseRiffVorbis};

/// wwtools version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration for the wwtools library
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Enable verbose logging
    pub verbose: bool,
    /// Enable debug output
    pub debug: bool,
}

/// Initialize library logging with the given configuration
pub fn init(config: Config) {
    if config.verbose || config.debug {
        let level = if config.debug { "debug" } else { "info" };
        tracing_subscriber::fmt().with_env_filter(level).init();
    }
}

/// Convert a WEM buffer to a finished OGG Vorbis stream.
///
/// Runs both pipeline stages: header/packet reconstruction followed by
/// granule regranulation. `codebooks` is the packed external codebook
/// library; WEMs with inline codebooks may pass
/// [`CodebookLibrary::empty`] together with the matching option.
pub fn wem_to_ogg(
    indata: &[u8],
    codebooks: CodebookLibrary,
    options: ConversionOptions,
) -> Result<Vec<u8>> {
    let wem = WwiseRiffVorbis::parse(indata, codebooks, options)?;
    let intermediate = wem.generate_ogg()?;
    revorb::regranulate(&intermediate)
}
