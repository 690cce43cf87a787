//! Conversion formats and load/store dispatch.

use crate::error::{RegistryError, Result};
use crate::model::RegistryKey;
use crate::regfile::{RegFileOptions, DEFAULT_MAX_DEPTH};
use crate::{hive, polfile, regfile};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Root key name used for formats that do not store one.
pub const DEFAULT_ROOT_NAME: &str = "(HiveRoot)";

/// A serialized form of a key tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Binary `regf` hive. Read only.
    Hive,
    /// `.reg` export as the registry editor writes it.
    Reg,
    /// `.reg` export with the `qword`, `multi_sz` and `expand_sz` forms.
    RegExtended,
    /// `.pol` policy file.
    Pol,
}

impl Format {
    /// All formats, in command-line order.
    pub const ALL: [Format; 4] = [Format::Hive, Format::Reg, Format::RegExtended, Format::Pol];

    /// Name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Format::Hive => "hive",
            Format::Reg => "reg",
            Format::RegExtended => "reg+",
            Format::Pol => "pol",
        }
    }

    /// Returns true if trees can be written in this format.
    pub fn is_writable(self) -> bool {
        self != Format::Hive
    }

    fn reg_options(self, max_depth: usize) -> RegFileOptions {
        let options = if self == Format::RegExtended {
            RegFileOptions::extended()
        } else {
            RegFileOptions::standard()
        };
        options.with_max_depth(max_depth)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognized format name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFormatError(String);

impl std::error::Error for ParseFormatError {}

impl fmt::Display for ParseFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown format: {} (expected hive, reg, reg+ or pol)", self.0)
    }
}

impl FromStr for Format {
    type Err = ParseFormatError;

    fn from_str(src: &str) -> std::result::Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(src))
            .ok_or_else(|| ParseFormatError(src.to_string()))
    }
}

/// Settings shared by every conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Root key name for hive and policy input.
    pub root_name: String,
    /// Maximum key nesting depth below the root.
    pub max_depth: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            root_name: DEFAULT_ROOT_NAME.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Reads a key tree from `path` in the given format.
pub fn load<P: AsRef<Path>>(format: Format, path: P, options: &ConvertOptions) -> Result<RegistryKey> {
    match format {
        Format::Hive => hive::read_file(path, &options.root_name, options.max_depth),
        Format::Reg | Format::RegExtended => regfile::read_file(path, &format.reg_options(options.max_depth)),
        Format::Pol => polfile::read_file(path, &options.root_name),
    }
}

/// Writes a key tree to `path` in the given format.
///
/// # Errors
///
/// Returns [`RegistryError::Unsupported`] for [`Format::Hive`].
pub fn store<P: AsRef<Path>>(format: Format, path: P, root: &RegistryKey, options: &ConvertOptions) -> Result<()> {
    match format {
        Format::Hive => Err(RegistryError::Unsupported(String::from("writing binary hives"))),
        Format::Reg | Format::RegExtended => regfile::write_file(path, root, &format.reg_options(options.max_depth)),
        Format::Pol => polfile::write_file(path, root, options.max_depth),
    }
}

/// Converts the file at `input` from one format to another.
///
/// The target format is checked before the input is read.
pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
    from: Format,
    to: Format,
    input: P,
    output: Q,
    options: &ConvertOptions,
) -> Result<()> {
    if !to.is_writable() {
        return Err(RegistryError::Unsupported(format!("writing {} files", to)));
    }

    let root = load(from, input, options)?;
    info!(from = %from, to = %to, keys = root.key_count(), values = root.value_count(), "Converting");
    store(to, output, &root, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        for format in Format::ALL {
            assert_eq!(format.name().parse::<Format>().unwrap(), format);
            assert_eq!(format.to_string(), format.name());
        }
        assert_eq!("REG+".parse::<Format>().unwrap(), Format::RegExtended);
    }

    #[test]
    fn test_unknown_format() {
        let err = "regf".parse::<Format>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown format: regf (expected hive, reg, reg+ or pol)");
    }

    #[test]
    fn test_hive_is_read_only() {
        assert!(!Format::Hive.is_writable());
        let err = store(Format::Hive, "unused", &RegistryKey::new("r"), &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, RegistryError::Unsupported(_)));
    }

    #[test]
    fn test_reg_options() {
        assert!(Format::RegExtended.reg_options(4).extensions);
        assert!(!Format::Reg.reg_options(4).extensions);
        assert_eq!(Format::Reg.reg_options(4).max_depth, 4);
    }
}
