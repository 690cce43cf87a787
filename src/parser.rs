//! Reconstruction of the key tree from flat `.reg` key blocks.
//!
//! A `.reg` file names every key by its full path and never states nesting
//! explicitly:
//!
//! ```text
//! [Root]
//! "Value"=dword:00000001
//!
//! [Root\Child]
//!
//! [Root\Child\Grandchild]
//!
//! ```
//!
//! Nesting is recovered by a prefix walk. Each level collects blocks whose
//! path strictly extends the level's prefix and hands control back to its
//! caller at the first block that does not. Descendants must therefore
//! directly follow their ancestor; anything else is rejected.

use crate::error::{RegistryError, Result};
use crate::model::{RegistryKey, RegistryValue, PATH_SEPARATOR};
use crate::regfile::RegFileOptions;
use crate::scanner::{Scanner, CR, LF};
use crate::text::RegString;
use crate::value_codec::parse_value_data;
use tracing::trace;

const HEADER_END: &str = "]\r\n";

/// Parses consecutive key blocks whose paths extend `prefix`.
///
/// `prefix` is empty for the top level and otherwise ends with the path
/// separator. `depth` is the nesting level of the keys being collected,
/// zero for the top level.
///
/// # Errors
///
/// Returns a syntax error for malformed headers or value lines, for an empty
/// document, and for blocks whose parent block is missing or misplaced.
/// Returns [`RegistryError::DepthLimitExceeded`] past
/// [`RegFileOptions::depth_limit`].
pub fn parse_key_list(
    scanner: &mut Scanner<'_>,
    prefix: &RegString,
    depth: usize,
    options: &RegFileOptions,
) -> Result<Vec<RegistryKey>> {
    let mut keys = Vec::new();

    loop {
        scanner.skip_blank_lines();
        if scanner.is_empty() {
            if depth == 0 && keys.is_empty() {
                return Err(RegistryError::syntax(prefix, "Expecting content"));
            }
            break;
        }

        let path = peek_header(scanner, prefix)?;
        if path.len() <= prefix.len() || !path.starts_with(prefix) {
            break;
        }

        let name = RegString::from_units(path.as_units()[prefix.len()..].to_vec());
        if depth > 0 && name.contains_char(PATH_SEPARATOR) {
            return Err(RegistryError::syntax(&path, "Key appears before its parent key"));
        }
        let limit = options.depth_limit();
        if depth > limit {
            return Err(RegistryError::DepthLimitExceeded {
                path: path.to_string(),
                limit,
            });
        }

        trace!(path = %path, depth, "Parsing key block");
        let values = parse_value_list(scanner, &path, options.extensions)?;

        let mut child_prefix = path.clone();
        child_prefix.push(PATH_SEPARATOR);
        let subkeys = parse_key_list(scanner, &child_prefix, depth + 1, options)?;

        keys.push(RegistryKey { name, subkeys, values });
    }

    Ok(keys)
}

/// Reads the path of the key header at the cursor.
///
/// The header is consumed only if it belongs to the current level, so a
/// caller that stops at the returned path leaves it for an outer level.
fn peek_header(scanner: &mut Scanner<'_>, prefix: &RegString) -> Result<RegString> {
    if !scanner.starts_with("[") {
        return Err(RegistryError::syntax(prefix, "Line does not begin with opening bracket"));
    }
    let close = scanner
        .find(HEADER_END)
        .ok_or_else(|| RegistryError::syntax(prefix, "Could not find closing bracket"))?;

    let raw = &scanner.rest()[1..close];
    let mut path = RegString::new();
    for (index, &unit) in raw.iter().enumerate() {
        if unit == CR && raw.get(index + 1) == Some(&LF) {
            continue;
        }
        path.push_unit(unit);
    }

    if path.len() > prefix.len() && path.starts_with(prefix) {
        scanner.advance(close + HEADER_END.len());
    }
    Ok(path)
}

/// Parses the value lines of one key block through the blank line that
/// ends it.
///
/// # Errors
///
/// Returns a syntax error if a line is malformed or the input ends before
/// the blank line.
pub fn parse_value_list(
    scanner: &mut Scanner<'_>,
    key_path: &RegString,
    extensions: bool,
) -> Result<Vec<RegistryValue>> {
    let mut values = Vec::new();

    loop {
        if scanner.eat_newline() {
            return Ok(values);
        }
        if scanner.is_empty() {
            return Err(RegistryError::syntax(key_path, "Unexpected end of data while reading values"));
        }

        let name = if scanner.eat('@') {
            RegString::new()
        } else if scanner.eat('"') {
            scanner
                .read_quoted()
                .ok_or_else(|| RegistryError::syntax(key_path, "Could not find end of value name"))?
        } else {
            return Err(RegistryError::syntax(key_path, "Expecting value name"));
        };

        if !scanner.eat('=') {
            return Err(RegistryError::value_syntax(key_path, &name, "Missing = sign"));
        }

        let (value_type, data) = parse_value_data(scanner, key_path, &name, extensions)?;
        values.push(RegistryValue::new(name, value_type, data));
    }
}
