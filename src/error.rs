//! Error types for registry conversion operations.
//!
//! Structural problems in any input format abort the whole conversion and
//! carry enough context (key path, value name, offset) to locate the
//! offending item. I/O failures are passed through unchanged.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while reading or writing registry data.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// I/O error occurred while reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Input is not well-formed UTF-16LE text.
    #[error("Invalid UTF-16 text: {0}")]
    InvalidEncoding(String),

    /// The `.reg` preamble (byte-order mark and header line) is missing.
    #[error("Registry file preamble not found")]
    MissingPreamble,

    /// Malformed `.reg` content.
    #[error("Key {key}: {message}")]
    Syntax {
        /// Full path (or path prefix) of the key being read.
        key: String,
        /// Description of the violation.
        message: String,
    },

    /// Malformed value line inside a `.reg` key block.
    #[error("Key {key}, value {value}: {message}")]
    ValueSyntax {
        /// Full path of the key owning the value.
        key: String,
        /// Name of the value (`@` for the default value).
        value: String,
        /// Description of the violation.
        message: String,
    },

    /// A registry file must hold exactly one top-level key.
    #[error("Expected exactly one root key, found {0}")]
    RootKeyCount(usize),

    /// Input was left over after the last key block.
    #[error("Conversion left {remaining} code units unparsed")]
    TrailingData {
        /// Number of UTF-16 code units left over.
        remaining: usize,
    },

    /// Key nesting exceeds the configured limit.
    #[error("Key {path}: nesting deeper than {limit} levels")]
    DepthLimitExceeded {
        /// Path of the key at which the limit was hit.
        path: String,
        /// Configured maximum depth.
        limit: usize,
    },

    /// The key tree violates a structural invariant.
    #[error("Invalid key tree at {path}: {message}")]
    InvalidTree {
        /// Path of the offending key.
        path: String,
        /// Description of the violation.
        message: String,
    },

    /// Malformed `.pol` (PReg) content.
    #[error("Invalid policy file at byte {offset:#x}: {message}")]
    InvalidPolicy {
        /// Byte offset of the entry being read.
        offset: usize,
        /// Description of the violation.
        message: String,
    },

    /// The requested conversion is not available.
    #[error("Unsupported conversion: {0}")]
    Unsupported(String),

    /// Invalid magic signature in a hive structure.
    #[error("Invalid signature: expected {expected:?}, found {found:?}")]
    InvalidSignature {
        /// Expected signature bytes.
        expected: Vec<u8>,
        /// Signature bytes actually found.
        found: Vec<u8>,
    },

    /// Invalid hive format or corrupted data.
    #[error("Invalid hive format: {0}")]
    InvalidFormat(String),

    /// Cell offset is out of bounds.
    #[error("Invalid cell offset: {offset:#x} (hive size: {hive_size:#x})")]
    InvalidOffset {
        /// Offending cell offset.
        offset: u32,
        /// Size of the hive data.
        hive_size: usize,
    },

    /// Cell size is invalid or corrupted.
    #[error("Invalid cell size: {size} at offset {offset:#x}")]
    InvalidCellSize {
        /// Raw cell size.
        size: i32,
        /// Offset of the cell.
        offset: u32,
    },

    /// Hive is too small to be valid.
    #[error("Hive too small: {size} bytes (minimum: {minimum} bytes)")]
    HiveTooSmall {
        /// Actual size.
        size: usize,
        /// Minimum size of a hive.
        minimum: usize,
    },

    /// Checksum mismatch in hive header.
    #[error("Checksum mismatch: expected {expected:#x}, calculated {calculated:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the base block.
        expected: u32,
        /// Checksum computed over the base block.
        calculated: u32,
    },

    /// Unsupported hive version.
    #[error("Unsupported hive version: {major}.{minor}")]
    UnsupportedVersion {
        /// Major version.
        major: u32,
        /// Minor version.
        minor: u32,
    },

    /// Data truncated or incomplete.
    #[error("Truncated data at offset {offset:#x}: expected {expected} bytes, got {actual} bytes")]
    TruncatedData {
        /// Offset of the structure being read.
        offset: u32,
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Invalid subkey list type.
    #[error("Invalid subkey list type: {list_type:?}")]
    InvalidSubkeyList {
        /// Signature found in place of a list signature.
        list_type: [u8; 2],
    },
}

impl RegistryError {
    /// Creates a key-level syntax error.
    ///
    /// An empty `key` is reported as `<empty>` so top-level failures stay readable.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use reg_convert::error::RegistryError;
    /// let err = RegistryError::syntax("HKLM\\Software\\", "Line does not begin with opening bracket");
    /// assert!(err.to_string().contains("HKLM\\Software\\"));
    /// ```
    pub fn syntax(key: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::Syntax {
            key: display_path(key),
            message: message.into(),
        }
    }

    /// Creates a value-level syntax error.
    ///
    /// # Arguments
    ///
    /// * `key` - Full path of the key owning the value
    /// * `value` - Value name, empty for the default value
    /// * `message` - Description of the violation
    pub fn value_syntax(key: impl fmt::Display, value: impl fmt::Display, message: impl Into<String>) -> Self {
        let value = value.to_string();
        Self::ValueSyntax {
            key: display_path(key),
            value: if value.is_empty() { String::from("@") } else { value },
            message: message.into(),
        }
    }

    /// Creates a tree invariant error.
    pub fn invalid_tree(path: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::InvalidTree {
            path: display_path(path),
            message: message.into(),
        }
    }

    /// Creates a policy file error at the given byte offset.
    pub fn invalid_policy(offset: usize, message: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid signature error with context.
    pub fn invalid_signature(expected: &[u8], found: &[u8]) -> Self {
        Self::InvalidSignature {
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }

    /// Creates an invalid offset error with context.
    pub fn invalid_offset(offset: u32, hive_size: usize) -> Self {
        Self::InvalidOffset { offset, hive_size }
    }

    /// Creates an invalid cell size error with context.
    pub fn invalid_cell_size(size: i32, offset: u32) -> Self {
        Self::InvalidCellSize { size, offset }
    }

    /// Returns true for errors caused by malformed input rather than I/O.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Unsupported(_))
    }
}

fn display_path(path: impl fmt::Display) -> String {
    let path = path.to_string();
    if path.is_empty() {
        String::from("<empty>")
    } else {
        path
    }
}
