//! Error types for wwtools

use thiserror::Error;

/// Result type alias for wwtools operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for wwtools
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input data
    #[error("Parse error: {0}")]
    Parse(String),

    /// Recognised structure, unrecognised version or variant
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A codebook ID referenced by the setup packet is not in the library
    #[error("invalid codebook id {id}, try --inline-codebooks")]
    InvalidCodebookId { id: u32 },

    /// A codebook did not occupy exactly its declared byte count
    #[error("codebook size mismatch: expected {expected} bytes, read {actual}")]
    CodebookSizeMismatch { expected: u64, actual: u64 },

    /// Input buffer ended in the middle of a structure
    #[error("input truncated: {0}")]
    Truncated(String),

    /// The second pass could not reproduce a valid OGG stream
    #[error("regranulation failed: {0}")]
    RegranulationFailed(String),

    /// A streamed BNK entry has no external .wem file to read from
    #[error("streamed WEM {id} requires an external {id}.wem file")]
    StreamedWemMissing { id: u32 },
}

impl Error {
    /// Create a parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Error::Parse(msg.into())
    }

    /// Create an unsupported error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create a truncation error
    pub fn truncated<S: Into<String>>(msg: S) -> Self {
        Error::Truncated(msg.into())
    }

    /// Create a regranulation error
    pub fn regranulation<S: Into<String>>(msg: S) -> Self {
        Error::RegranulationFailed(msg.into())
    }
}
