//! Behavior of the `.reg` export codec on concrete documents.

use reg_convert::regfile::{self, RegFileOptions, PREAMBLE};
use reg_convert::{RegistryError, RegistryKey, RegistryValue, ValueType};

fn document(body: &str) -> String {
    format!("{}{}", PREAMBLE, body)
}

fn parse(body: &str) -> reg_convert::Result<RegistryKey> {
    regfile::parse_str(&document(body), &RegFileOptions::default())
}

fn render(root: &RegistryKey) -> String {
    regfile::render_string(root, &RegFileOptions::default()).unwrap()
}

#[test]
fn test_preamble_is_exact() {
    let text = render(&RegistryKey::new("Root"));
    assert_eq!(text, "\u{feff}Windows Registry Editor Version 5.00\r\n\r\n[Root]\r\n\r\n");

    let bytes = regfile::render_bytes(&RegistryKey::new("Root"), &RegFileOptions::default()).unwrap();
    assert_eq!(&bytes[..6], &[0xff, 0xfe, b'W', 0x00, b'i', 0x00]);
}

#[test]
fn test_nested_reconstruction() {
    let root = parse("[Root]\r\n\r\n[Root\\A]\r\n\r\n[Root\\A\\B]\r\n\r\n").unwrap();
    assert_eq!(root.name, "Root");
    assert_eq!(root.subkeys.len(), 1);

    let a = &root.subkeys[0];
    assert_eq!(a.name, "A");
    assert_eq!(a.subkeys.len(), 1);
    assert_eq!(a.subkeys[0].name, "B");
    assert!(a.subkeys[0].subkeys.is_empty());
}

#[test]
fn test_dword_round_trip() {
    let root = RegistryKey::new("Root").with_value(RegistryValue::new(
        "v",
        ValueType::Dword,
        vec![0x78, 0x56, 0x34, 0x12],
    ));
    let text = render(&root);
    assert!(text.contains("\"v\"=dword:12345678\r\n"));

    let parsed = regfile::parse_str(&text, &RegFileOptions::default()).unwrap();
    assert_eq!(parsed.values[0].data, vec![0x78, 0x56, 0x34, 0x12]);
}

#[test]
fn test_unterminated_string_renders_as_hex() {
    let root = RegistryKey::new("Root").with_value(RegistryValue::new(
        "s",
        ValueType::String,
        vec![0x41, 0x00, 0x42, 0x00],
    ));
    let text = render(&root);
    assert!(text.contains("\"s\"=hex(1):41,00,42,00\r\n"), "{}", text);
    assert!(!text.contains("\"AB\""));

    let parsed = regfile::parse_str(&text, &RegFileOptions::default()).unwrap();
    assert_eq!(parsed, root);
}

#[test]
fn test_binary_line_wrap() {
    let value = RegistryValue::binary("", vec![0; 41]);
    let bare = reg_convert::value_codec::render_hex(&value, 0);
    assert_eq!(bare, format!("hex:{}\\\r\n  {}00", "00,".repeat(25), "00,".repeat(15)));

    // The "@=" prefix takes two columns from the first line.
    let root = RegistryKey::new("Root").with_value(value);
    let text = render(&root);
    let expected = format!(
        "[Root]\r\n@=hex:{}\\\r\n  {}00\r\n\r\n",
        "00,".repeat(24),
        "00,".repeat(16)
    );
    assert!(text.ends_with(&expected), "{}", text);

    let parsed = regfile::parse_str(&text, &RegFileOptions::default()).unwrap();
    assert_eq!(parsed, root);
}

#[test]
fn test_embedded_newline_in_key_name() {
    let root = RegistryKey::new("Root")
        .with_subkey(RegistryKey::new("first\nsecond").with_subkey(RegistryKey::new("leaf")))
        .with_subkey(RegistryKey::new("other"));
    let text = render(&root);
    assert!(text.contains("[Root\\first\r\nsecond]\r\n"));
    assert!(text.contains("[Root\\first\r\nsecond\\leaf]\r\n"));

    let parsed = regfile::parse_str(&text, &RegFileOptions::default()).unwrap();
    assert_eq!(parsed, root);
    assert_eq!(parsed.subkeys.len(), 2);
}

#[test]
fn test_embedded_newline_in_value_name_and_data() {
    let root = RegistryKey::new("Root").with_value(RegistryValue::string("two\nlines", "a\nb\r\nc"));
    let text = render(&root);
    assert!(text.contains("\"two\r\nlines\"=\"a\r\nb\r\r\nc\"\r\n"));
    assert_eq!(regfile::parse_str(&text, &RegFileOptions::default()).unwrap(), root);
}

#[test]
fn test_missing_blank_line_is_rejected() {
    let err = parse("[Root]\r\n\"v\"=dword:00000001\r\n").unwrap_err();
    assert!(matches!(err, RegistryError::Syntax { .. }), "{:?}", err);
    assert!(err.to_string().contains("Root"));
}

#[test]
fn test_blank_lines_between_blocks_are_skipped() {
    let root = parse("\r\n[Root]\r\n\r\n\r\n\r\n[Root\\A]\r\n\r\n\r\n").unwrap();
    assert_eq!(root.subkeys[0].name, "A");
}

#[test]
fn test_out_of_order_block_is_rejected() {
    let err = parse("[Root]\r\n\r\n[Root\\A\\B]\r\n\r\n[Root\\A]\r\n\r\n").unwrap_err();
    assert!(err.to_string().contains("Root\\A\\B"));
}

#[test]
fn test_foreign_block_is_rejected() {
    let err = parse("[Root]\r\n\r\n[Elsewhere]\r\n\r\n").unwrap_err();
    assert!(matches!(err, RegistryError::RootKeyCount(2)));
}

#[test]
fn test_bad_dword_literal_is_an_error() {
    let err = parse("[Root]\r\n\"v\"=dword:1234567\r\n\r\n").unwrap_err();
    assert!(matches!(err, RegistryError::ValueSyntax { .. }));
    assert!(err.to_string().contains("Key Root, value v"));
}

#[test]
fn test_extension_tokens_need_extended_mode() {
    let body = "[Root]\r\n\"q\"=qword:00000000000000ff\r\n\r\n";
    assert!(parse(body).is_err());

    let root = regfile::parse_str(&document(body), &RegFileOptions::extended()).unwrap();
    assert_eq!(root.values[0], RegistryValue::qword("q", 0xff));
}

#[test]
fn test_standard_mode_writes_extension_types_as_hex() {
    let root = RegistryKey::new("Root")
        .with_value(RegistryValue::qword("q", 1))
        .with_value(RegistryValue::multi_string("m", ["a"]))
        .with_value(RegistryValue::expand_string("e", "%x%"));

    let standard = render(&root);
    assert!(standard.contains("\"q\"=hex(b):01,00,00,00,00,00,00,00\r\n"));
    assert!(standard.contains("\"m\"=hex(7):61,00,00,00,00,00\r\n"));
    assert!(standard.contains("\"e\"=hex(2):25,00,78,00,25,00,00,00\r\n"));

    let extended = regfile::render_string(&root, &RegFileOptions::extended()).unwrap();
    assert!(extended.contains("\"q\"=qword:0000000000000001\r\n"));
    assert!(extended.contains("\"m\"=multi_sz:\"a\",\"\"\r\n"));
    assert!(extended.contains("\"e\"=expand_sz:\"%x%\"\r\n"));

    assert_eq!(regfile::parse_str(&standard, &RegFileOptions::default()).unwrap(), root);
    assert_eq!(regfile::parse_str(&extended, &RegFileOptions::extended()).unwrap(), root);
}

#[test]
fn test_invalid_tree_is_not_rendered() {
    let root = RegistryKey::new("Root")
        .with_value(RegistryValue::dword("x", 1))
        .with_value(RegistryValue::dword("x", 2));
    assert!(regfile::render_string(&root, &RegFileOptions::default()).is_err());

    let root = RegistryKey::new("Root").with_subkey(RegistryKey::new("a\\b"));
    assert!(regfile::render_string(&root, &RegFileOptions::default()).is_err());
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.reg");
    let root = RegistryKey::new("HKEY_CURRENT_USER\\Software\\Test")
        .with_value(RegistryValue::string("", "default"))
        .with_subkey(RegistryKey::new("Child").with_value(RegistryValue::binary("b", vec![1, 2, 3])));

    regfile::write_file(&path, &root, &RegFileOptions::default()).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &[0xff, 0xfe]);
    assert_eq!(regfile::read_file(&path, &RegFileOptions::default()).unwrap(), root);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = regfile::read_file(dir.path().join("absent.reg"), &RegFileOptions::default()).unwrap_err();
    assert!(matches!(err, RegistryError::Io(_)));
    assert!(!err.is_structural());
}

fn utf16le(units: &[u16]) -> Vec<u8> {
    units.iter().flat_map(|u| u.to_le_bytes()).collect()
}

fn units(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

#[test]
fn test_lone_surrogates_in_names_and_strings_round_trip() {
    let mut text = units(PREAMBLE);
    text.extend(units("[R]\r\n\r\n[R\\"));
    text.push(0xDC00);
    text.extend(units("]\r\n\"v\"=\""));
    text.push(0xD800);
    text.extend(units("\"\r\n\""));
    text.push(0xD800);
    text.extend(units("n\"=dword:00000001\r\n\r\n"));
    let bytes = utf16le(&text);

    let root = regfile::parse_bytes(&bytes, &RegFileOptions::default()).unwrap();
    let child = &root.subkeys[0];
    assert_eq!(child.name.as_units(), &[0xDC00]);
    assert_eq!(child.values[0].name, "v");
    assert_eq!(child.values[0].data, vec![0x00, 0xD8, 0x00, 0x00]);
    assert_eq!(child.values[1].name.as_units(), &[0xD800, 0x6E]);
    assert_eq!(child.values[1].value_type, ValueType::Dword);

    assert_eq!(regfile::render_bytes(&root, &RegFileOptions::default()).unwrap(), bytes);
}

#[test]
fn test_errors_below_lone_surrogate_name_the_key() {
    let mut text = units(PREAMBLE);
    text.extend(units("[R]\r\n\r\n[R\\"));
    text.push(0xDC00);
    text.extend(units("]\r\n\"v\"=bogus\r\n\r\n"));

    let err = regfile::parse_bytes(&utf16le(&text), &RegFileOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "Key R\\\\u{dc00}, value v: Unrecognized value data");
}
