//! Error types for format parsing.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FormatError>;

/// Errors that can occur while reading or writing game data formats.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Reading from or writing to the underlying source failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the expected signature.
    #[error("Invalid magic: expected {expected}, found {found:?}")]
    InvalidMagic { expected: &'static str, found: String },

    /// The signature is known but the version is not supported.
    #[error("Unsupported {format} version: {version}")]
    UnsupportedVersion { format: &'static str, version: String },

    /// The data ends before a structure that the header promises.
    #[error("Truncated data: {0}")]
    Truncated(&'static str),

    /// The data is structurally invalid.
    #[error("Malformed data: {0}")]
    Malformed(String),

    /// A table is missing a column that its schema requires.
    #[error("Missing required column '{column}' for schema '{schema}'")]
    MissingColumn {
        schema: &'static str,
        column: &'static str,
    },
}
