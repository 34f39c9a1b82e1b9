//! Error types for the upkg library.

use thiserror::Error;

/// Main error type for package operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid magic bytes at start of file
    #[error("Invalid package file: bad magic {0:#010x}")]
    InvalidMagic(u32),

    /// Unrecognized (version, licensee) pair
    #[error("Unsupported package version: {version}/{licensee}")]
    UnsupportedVersion { version: u16, licensee: u16 },

    /// Malformed or truncated data structure in the file
    #[error("Malformed package data: {0}")]
    Format(String),

    /// Following link indices revisited an entry
    #[error("Cycle in entry links at {0}")]
    GraphCycle(String),

    /// Property type name not known to the codec
    #[error("Unsupported property type: {0}")]
    UnsupportedPropertyType(String),

    /// A full path could not be located in the source graph
    #[error("Unresolvable reference: {0}")]
    UnresolvableReference(String),

    /// A UIndex that does not belong to the graph was passed in
    #[error("UIndex {index} out of range (exports: {exports}, imports: {imports})")]
    IndexOutOfRange {
        index: i32,
        exports: usize,
        imports: usize,
    },

    /// Entry kind mismatch (e.g. expected an export, got an import)
    #[error("Entry kind mismatch: {0}")]
    WrongEntryKind(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Create a format error from a string.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}

/// Result type alias for package operations.
pub type Result<T> = std::result::Result<T, Error>;
