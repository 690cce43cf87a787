//! # Windows Registry Converter
//!
//! Reads and writes registry key trees in three serialized forms:
//!
//! - **`.reg` exports**: UTF-16LE text as produced by the registry editor,
//!   rendered byte-for-byte the way the editor does, including line wrapping
//! - **`.pol` policy files**: the flat `PReg` records of Group Policy
//! - **Binary hives**: `regf` files, read only, through a memory map
//!
//! Every format produces or consumes the same [`RegistryKey`] tree, so any
//! readable format converts to any writable one.
//!
//! ## `.reg` layout
//!
//! ```text
//! Windows Registry Editor Version 5.00
//!
//! [HKEY_CURRENT_USER\Software\Example]
//! @="default value"
//! "Count"=dword:0000002a
//! "Blob"=hex:00,01,02,03,04,05,06,07,08,09,0a,0b,0c,0d,0e,0f,10,11,12,13,14,15,\
//!   16,17,18
//!
//! [HKEY_CURRENT_USER\Software\Example\Child]
//!
//! ```
//!
//! Keys appear in pre-order with their full paths; the nesting is rebuilt
//! from the path prefixes when reading.
//!
//! ## Examples
//!
//! ```rust
//! use reg_convert::regfile::{self, RegFileOptions};
//! use reg_convert::{RegistryKey, RegistryValue};
//!
//! # fn main() -> reg_convert::Result<()> {
//! let root = RegistryKey::new("HKEY_LOCAL_MACHINE\\SOFTWARE\\Example")
//!     .with_value(RegistryValue::string("Path", "C:\\Program Files\\Example"))
//!     .with_subkey(RegistryKey::new("Settings").with_value(RegistryValue::dword("Level", 3)));
//!
//! let text = regfile::render_string(&root, &RegFileOptions::default())?;
//! assert!(text.contains("[HKEY_LOCAL_MACHINE\\SOFTWARE\\Example\\Settings]\r\n"));
//! assert!(text.contains("\"Path\"=\"C:\\\\Program Files\\\\Example\"\r\n"));
//! # Ok(())
//! # }
//! ```
//!
//! Converting files:
//!
//! ```no_run
//! use reg_convert::format::{convert, ConvertOptions, Format};
//!
//! # fn main() -> reg_convert::Result<()> {
//! convert(Format::Hive, Format::Reg, "NTUSER.DAT", "ntuser.reg", &ConvertOptions::default())?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod format;
pub mod hive;
pub mod model;
pub mod parser;
pub mod polfile;
pub mod regfile;
pub mod renderer;
pub mod scanner;
pub mod text;
pub mod utils;
pub mod value_codec;

pub use error::{RegistryError, Result};
pub use format::{ConvertOptions, Format};
pub use hive::Hive;
pub use model::{RegistryKey, RegistryValue, ValueType};
pub use regfile::RegFileOptions;
pub use text::RegString;
pub use value_codec::Rendition;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
