//! Error types for resource resolution.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses [`Error`]
//! as the error type. External error types (`std::io::Error`, `serde_json::Error`,
//! format errors, archive errors) are converted automatically via `From` impls.
//!
//! Most lookup paths never surface these errors to the caller: a missing or corrupt
//! resource is logged and reported as "not found". Errors are reserved for the
//! places where the caller has to act, such as an unreadable base installation or a
//! module that cannot be activated.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while locating, loading or caching resources.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize JSON (manifests, precompiled metadata).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to parse a TOML configuration file.
    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// Failed to serialize a TOML configuration file.
    #[error("Config write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Error from the `zip` crate when reading a base archive.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A resource was read but its codec rejected the bytes.
    #[error("Format error: {0}")]
    Format(#[from] nwn2_formats::FormatError),

    /// MessagePack encoding of a cached or precompiled value failed.
    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding of a cached or precompiled value failed.
    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Zstd compression or decompression failed.
    #[error("Compression error: {0}")]
    Compression(String),

    /// Remote metadata request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured installation directory does not look like a game install.
    #[error("Invalid installation directory: {0}")]
    InvalidInstallDir(Utf8PathBuf),

    /// A base installation archive exists but cannot be opened.
    ///
    /// This is the only startup failure that is raised instead of logged.
    #[error("Base archive '{path}' is unreadable: {reason}")]
    BaseArchiveUnreadable { path: Utf8PathBuf, reason: String },

    /// No module with the given name or path exists.
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// A module exists but its manifest is missing or malformed.
    #[error("Invalid module '{path}': {reason}")]
    InvalidModule { path: Utf8PathBuf, reason: String },

    /// A codec rejected the bytes of a resource.
    #[error("Corrupt resource '{name}': {reason}")]
    CorruptResource { name: String, reason: String },

    /// A container or directory backing a layer could not be read.
    #[error("Layer source '{path}' unavailable: {reason}")]
    LayerUnavailable { path: Utf8PathBuf, reason: String },

    /// The entry named by a resource location is not in its container.
    #[error("Entry '{entry}' not found in '{path}'")]
    EntryNotFound { path: Utf8PathBuf, entry: String },

    /// Catch-all for errors from codecs and metadata providers.
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
