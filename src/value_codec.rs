//! Textual rendering of registry values in `.reg` files, both directions.
//!
//! # Encoding
//!
//! Each specific renderer checks its own preconditions and answers with a
//! [`Rendition`]. When a precondition fails the dispatcher silently falls
//! back to the generic hexadecimal form, which can represent any data:
//!
//! ```text
//! "Count"=dword:0000002a
//! "Path"="C:\\Windows"
//! "Blob"=hex:de,ad,be,ef
//! "Env"=hex(2):25,00,50,00,41,00,54,00,48,00,25,00,00,00
//! ```
//!
//! With extensions enabled, `qword:`, `multi_sz:` and `expand_sz:` forms are
//! also produced.
//!
//! # Decoding
//!
//! Decoding is strict: the type prefix selects exactly one grammar and any
//! deviation is an error. Continuation markers (`\` + CRLF + indentation)
//! are accepted wherever a hex byte or list separator may appear.

use crate::error::{RegistryError, Result};
use crate::model::{RegistryValue, ValueType};
use crate::scanner::{Scanner, BACKSLASH, CONTINUATION, LF, NEWLINE, QUOTE};
use crate::text::RegString;
use crate::utils::units_from_utf16le;
use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

/// Column after which hexadecimal renditions wrap.
pub const HEX_WRAP_LIMIT: usize = 80;

/// Column after which multi-string renditions wrap.
pub const MULTI_SZ_WRAP_LIMIT: usize = 80;

/// Leading spaces on continuation lines of hexadecimal renditions.
pub const HEX_CONTINUATION_INDENT: usize = 2;

/// Marker used in place of a quoted name for the default value.
pub const DEFAULT_VALUE_NAME: &str = "@";

const DWORD_PREFIX: &str = "dword:";
const QWORD_PREFIX: &str = "qword:";
const HEX_PREFIX: &str = "hex";
const MULTI_SZ_KEYWORD: &str = "multi_sz";
const EXPAND_SZ_KEYWORD: &str = "expand_sz";

/// Outcome of a type-specific renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendition {
    /// The value was rendered in the renderer's own form.
    Rendered(RegString),
    /// The data does not fit the renderer's form; use hexadecimal instead.
    FallbackToHex,
}

/// Escapes a name or string for use between double quotes.
///
/// Backslashes and quotes gain a backslash, newlines become CRLF. Every
/// other code unit, unpaired surrogates included, is copied as is.
pub fn escape_quoted(text: &[u16]) -> RegString {
    let mut escaped = RegString::new();
    for &unit in text {
        match unit {
            BACKSLASH => escaped.push_str("\\\\"),
            QUOTE => escaped.push_str("\\\""),
            LF => escaped.push_str(NEWLINE),
            _ => escaped.push_unit(unit),
        }
    }
    escaped
}

fn quoted(text: &[u16]) -> RegString {
    let mut out = RegString::from("\"");
    out.push_units(escape_quoted(text).as_units());
    out.push('"');
    out
}

/// Renders the `name=` part of a value line.
pub fn render_value_name(name: &RegString) -> RegString {
    let mut out = if name.is_empty() {
        RegString::from(DEFAULT_VALUE_NAME)
    } else {
        quoted(name.as_units())
    };
    out.push('=');
    out
}

/// Renders a REG_DWORD holding exactly four bytes as `dword:xxxxxxxx`.
pub fn render_dword(value: &RegistryValue) -> Rendition {
    if value.value_type != ValueType::Dword || value.data.len() != 4 {
        return Rendition::FallbackToHex;
    }
    let text = format!("{}{:08x}", DWORD_PREFIX, LittleEndian::read_u32(&value.data));
    Rendition::Rendered(text.into())
}

/// Renders a REG_QWORD holding exactly eight bytes as `qword:` plus 16 digits.
pub fn render_qword(value: &RegistryValue) -> Rendition {
    if value.value_type != ValueType::Qword || value.data.len() != 8 {
        return Rendition::FallbackToHex;
    }
    let text = format!("{}{:016x}", QWORD_PREFIX, LittleEndian::read_u64(&value.data));
    Rendition::Rendered(text.into())
}

/// Splits even-length UTF-16LE data into code units and drops the final
/// null terminator. `None` if either is missing.
fn terminated_units(data: &[u8]) -> Option<Vec<u16>> {
    let mut units = units_from_utf16le(data)?;
    match units.pop() {
        Some(0) => Some(units),
        _ => None,
    }
}

/// Renders a REG_SZ as a quoted string.
///
/// The data must be non-empty UTF-16LE whose only null code unit is the
/// final terminator.
pub fn render_string(value: &RegistryValue) -> Rendition {
    if value.value_type != ValueType::String {
        return Rendition::FallbackToHex;
    }
    match terminated_units(&value.data) {
        Some(body) if !body.contains(&0) => Rendition::Rendered(quoted(&body)),
        _ => Rendition::FallbackToHex,
    }
}

/// Renders null-terminated UTF-16 strings as a comma-separated list of
/// quoted strings introduced by `keyword:`.
///
/// `first_line_len` is the length of the `name=` prefix already on the line;
/// continuation lines are indented by the same amount. A line is wrapped
/// before a string (with its trailing comma) that would otherwise leave no
/// room for the continuation marker within [`MULTI_SZ_WRAP_LIMIT`].
pub fn render_multi_string(keyword: &str, value: &RegistryValue, first_line_len: usize) -> Rendition {
    let body = match terminated_units(&value.data) {
        Some(body) => body,
        None => return Rendition::FallbackToHex,
    };

    let mut out = RegString::from(format!("{}:", keyword));
    let mut column = first_line_len + out.len();
    let strings: Vec<&[u16]> = body.split(|&unit| unit == 0).collect();

    for (index, s) in strings.iter().enumerate() {
        let mut item = quoted(s);
        if index + 1 < strings.len() {
            item.push(',');
        }

        if index > 0 && column + item.len() + 1 > MULTI_SZ_WRAP_LIMIT {
            out.push_str(CONTINUATION);
            out.push_str(&" ".repeat(first_line_len));
            column = first_line_len;
        }

        column += item.len();
        out.push_units(item.as_units());
    }

    Rendition::Rendered(out)
}

/// Renders any value as `hex:` (REG_BINARY) or `hex(t):` followed by
/// comma-separated byte pairs.
///
/// After each pair and its comma, the line is continued on the next one if
/// another pair, its comma and the continuation backslash would no longer
/// fit within [`HEX_WRAP_LIMIT`] columns. This reproduces the line breaks of
/// the registry editor's own exports.
pub fn render_hex(value: &RegistryValue, first_line_len: usize) -> RegString {
    let mut out = String::from(HEX_PREFIX);
    if value.value_type != ValueType::Binary {
        out.push_str(&format!("({:x})", value.value_type.as_u32()));
    }
    out.push(':');

    let mut column = first_line_len + out.len();
    let digits = hex::encode(&value.data);
    let pair_count = value.data.len();

    for (index, pair) in digits.as_bytes().chunks(2).enumerate() {
        out.extend(pair.iter().map(|&b| char::from(b)));
        column += 2;

        if index + 1 < pair_count {
            out.push(',');
            column += 1;
            if column > HEX_WRAP_LIMIT - 4 {
                out.push_str(CONTINUATION);
                out.push_str(&" ".repeat(HEX_CONTINUATION_INDENT));
                column = HEX_CONTINUATION_INDENT;
            }
        }
    }

    out.into()
}

/// Renders the data part of a value line, choosing the most specific form
/// whose preconditions hold.
pub fn render_data(value: &RegistryValue, first_line_len: usize, extensions: bool) -> RegString {
    // `Unknown(4)` and friends are dispatched by their tag.
    let rendition = match ValueType::from_u32(value.value_type.as_u32()) {
        ValueType::Dword => render_dword(value),
        ValueType::String => render_string(value),
        ValueType::Qword if extensions => render_qword(value),
        ValueType::MultiString if extensions => render_multi_string(MULTI_SZ_KEYWORD, value, first_line_len),
        ValueType::ExpandString if extensions => render_multi_string(EXPAND_SZ_KEYWORD, value, first_line_len),
        _ => return render_hex(value, first_line_len),
    };

    match rendition {
        Rendition::Rendered(text) => text,
        Rendition::FallbackToHex => {
            trace!(
                value = %value.name,
                value_type = %value.value_type.name(),
                len = value.data.len(),
                "Rendering value as hexadecimal"
            );
            render_hex(value, first_line_len)
        }
    }
}

/// Renders a complete value line, including its CRLF terminator.
pub fn render_value_line(value: &RegistryValue, extensions: bool) -> RegString {
    let mut line = render_value_name(&value.name);
    let data = render_data(value, line.len(), extensions);
    line.push_units(data.as_units());
    line.push_str(NEWLINE);
    line
}

/// Parses the data part of a value line, after the `=` sign, through the
/// terminating CRLF.
///
/// `key_path` and `name` only serve error messages. Extension forms are
/// rejected unless `extensions` is set.
pub fn parse_value_data(
    scanner: &mut Scanner<'_>,
    key_path: &RegString,
    name: &RegString,
    extensions: bool,
) -> Result<(ValueType, Vec<u8>)> {
    let fail = |message: &str| RegistryError::value_syntax(key_path, name, message);

    let (value_type, data) = if scanner.eat_str(DWORD_PREFIX) {
        let dword = parse_fixed_hex(scanner, 8).ok_or_else(|| fail("Could not parse dword"))?;
        (ValueType::Dword, (dword as u32).to_le_bytes().to_vec())
    } else if scanner.eat_str(QWORD_PREFIX) {
        if !extensions {
            return Err(fail("qword values require extensions"));
        }
        let qword = parse_fixed_hex(scanner, 16).ok_or_else(|| fail("Could not parse qword"))?;
        (ValueType::Qword, qword.to_le_bytes().to_vec())
    } else if scanner.eat_str(HEX_PREFIX) {
        let value_type = parse_hex_type(scanner).map_err(|message| fail(message))?;
        let data = parse_hex_bytes(scanner).map_err(|message| fail(message))?;
        return Ok((value_type, data));
    } else if let Some(value_type) = eat_string_list_keyword(scanner) {
        if !extensions {
            return Err(fail("string list values require extensions"));
        }
        let data = parse_string_list(scanner).map_err(|message| fail(message))?;
        return Ok((value_type, data));
    } else if scanner.eat('"') {
        let text = scanner
            .read_quoted()
            .ok_or_else(|| fail("Could not find end of string value"))?;
        let mut data = text.to_utf16le();
        data.extend([0, 0]);
        (ValueType::String, data)
    } else {
        return Err(fail("Unrecognized value data"));
    };

    if !scanner.eat_newline() {
        return Err(fail("Value not followed by new line"));
    }
    Ok((value_type, data))
}

/// Reads exactly `digits` hex digits and checks that re-encoding the number
/// reproduces them (ignoring case).
fn parse_fixed_hex(scanner: &mut Scanner<'_>, digits: usize) -> Option<u64> {
    let literal = scanner.take_ascii(digits)?;
    let number = u64::from_str_radix(&literal, 16).ok()?;
    let reencoded = format!("{:0width$x}", number, width = digits);
    reencoded.eq_ignore_ascii_case(&literal).then_some(number)
}

/// Parses the optional `(t)` type tag and the `:` after `hex`.
fn parse_hex_type(scanner: &mut Scanner<'_>) -> std::result::Result<ValueType, &'static str> {
    let value_type = if scanner.eat('(') {
        let digits = scanner.take_ascii_while(|c| c.is_ascii_hexdigit());
        if digits.is_empty() || !scanner.eat(')') {
            return Err("Could not find closing parenthesis");
        }
        let tag = u32::from_str_radix(&digits, 16).map_err(|_| "Value type out of range")?;
        ValueType::from_u32(tag)
    } else {
        ValueType::Binary
    };

    if !scanner.eat(':') {
        return Err("Missing : sign after hex declaration");
    }
    Ok(value_type)
}

/// Parses comma-separated byte pairs through the terminating CRLF.
fn parse_hex_bytes(scanner: &mut Scanner<'_>) -> std::result::Result<Vec<u8>, &'static str> {
    let mut data = Vec::new();
    if scanner.eat_newline() {
        return Ok(data);
    }

    loop {
        scanner.eat_continuation();
        if scanner.is_empty() {
            return Err("End of data while reading binary value");
        }

        let mut byte = [0u8; 1];
        let decoded = scanner
            .take_ascii(2)
            .map_or(false, |pair| hex::decode_to_slice(pair, &mut byte).is_ok());
        if !decoded {
            return Err("Expecting two hexadecimal digits");
        }
        data.push(byte[0]);

        if scanner.eat_newline() {
            return Ok(data);
        }
        if !scanner.eat(',') {
            return Err("Expecting comma or end of line after hexadecimal byte");
        }
    }
}

fn eat_string_list_keyword(scanner: &mut Scanner<'_>) -> Option<ValueType> {
    [
        (MULTI_SZ_KEYWORD, ValueType::MultiString),
        (EXPAND_SZ_KEYWORD, ValueType::ExpandString),
    ]
    .into_iter()
    .find(|(keyword, _)| scanner.eat_str(&format!("{}:", keyword)))
    .map(|(_, value_type)| value_type)
}

/// Parses quoted strings separated by commas through the terminating CRLF,
/// appending a null terminator after each one.
fn parse_string_list(scanner: &mut Scanner<'_>) -> std::result::Result<Vec<u8>, &'static str> {
    let mut data = Vec::new();
    loop {
        if !scanner.eat('"') {
            return Err("Expecting quoted string");
        }
        let text = scanner.read_quoted().ok_or("Could not find end of string")?;
        data.extend(text.to_utf16le());
        data.extend([0, 0]);

        if scanner.eat_newline() {
            return Ok(data);
        }
        if !scanner.eat(',') {
            return Err("Expecting comma or end of line after string");
        }
        scanner.eat_continuation();
    }
}
