//! Error types for page metadata operations.

use std::path::PathBuf;

/// Errors that can occur while loading page metadata and side-data.
///
/// Freshness probing never produces one of these: a resource whose
/// modification time cannot be established is treated as unchanged.
/// Static HTML data that is simply absent is not an error either.
#[derive(Debug, thiserror::Error)]
pub enum MetaInfoError {
    /// An I/O error occurred while reading or writing a file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A side-data resource exists but could not be opened or read.
    #[error("side-data resource {name} is unreadable: {source}")]
    ResourceUnreadable {
        /// The resource name within the artifact namespace.
        name: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A side-data resource that must exist was not found.
    #[error("side-data resource {name} not found")]
    MissingResource {
        /// The resource name within the artifact namespace.
        name: String,
    },

    /// A side-data payload ended early or contained malformed data.
    #[error("corrupt side-data in {name}: {reason}")]
    CorruptSideData {
        /// The resource name within the artifact namespace.
        name: String,
        /// Description of the corruption.
        reason: String,
    },

    /// A string is too long for its 2-byte length prefix.
    #[error("encoded string of {len} bytes exceeds 65535")]
    StringTooLong {
        /// The encoded length in bytes.
        len: usize,
    },

    /// The artifact descriptor could not be parsed as valid JSON.
    #[error("failed to parse artifact descriptor: {reason}")]
    ManifestParse {
        /// Description of the parse failure.
        reason: String,
    },

    /// A serialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

impl MetaInfoError {
    pub(crate) fn corrupt(name: &str, reason: impl Into<String>) -> Self {
        Self::CorruptSideData {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
