//! Round-trip properties over generated key trees.

use proptest::prelude::*;
use reg_convert::regfile::{self, RegFileOptions};
use reg_convert::{polfile, value_codec, RegString, RegistryKey, RegistryValue, ValueType};
use std::collections::HashSet;

/// Code units that are not valid text on their own or that need escaping.
const AWKWARD_UNITS: [u16; 7] = [0x22, 0x0A, 0x0D, 0xD800, 0xDBFF, 0xDC00, 0xDFFF];

fn arb_units(len: std::ops::Range<usize>) -> impl Strategy<Value = RegString> {
    let unit = prop_oneof![
        3 => (0x20u16..0x7F).prop_filter("no separators", |u| *u != 0x5C && *u != 0x5D),
        1 => prop::sample::select(AWKWARD_UNITS.to_vec()),
    ];
    prop::collection::vec(unit, len).prop_map(RegString::from_units)
}

fn arb_value_name() -> impl Strategy<Value = RegString> {
    prop_oneof![
        "[a-zA-Z0-9 _.@\"\\\\\\[\\]\r\n\u{e9}\u{1F600}-]{0,12}".prop_map(RegString::from),
        arb_units(0..12),
    ]
}

fn arb_key_name() -> impl Strategy<Value = RegString> {
    prop_oneof![
        "[a-zA-Z0-9 _.@\"\r\n\u{e9}\u{1F600}-]{1,12}".prop_map(RegString::from),
        arb_units(1..12),
    ]
}

fn arb_root_name() -> impl Strategy<Value = String> {
    "[A-Za-z_]{1,8}(\\\\[A-Za-z_]{1,8}){0,2}"
}

fn utf16_with_null(text: &str) -> Vec<u8> {
    let mut data: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
    data.extend([0, 0]);
    data
}

fn arb_data() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..48),
        "[ -~\r\n\u{e9}]{0,30}".prop_map(|s| utf16_with_null(&s)),
        prop::collection::vec("[a-z\\\\\"]{0,6}", 0..4).prop_map(|parts| {
            let mut data = Vec::new();
            for part in parts {
                data.extend(utf16_with_null(&part));
            }
            data.extend([0, 0]);
            data
        }),
        any::<u32>().prop_map(|v| v.to_le_bytes().to_vec()),
        any::<u64>().prop_map(|v| v.to_le_bytes().to_vec()),
    ]
}

fn arb_value() -> impl Strategy<Value = RegistryValue> {
    let tag = prop_oneof![
        Just(1u32),
        Just(2u32),
        Just(3u32),
        Just(4u32),
        Just(7u32),
        Just(11u32),
        0u32..16,
        any::<u32>(),
    ];
    (arb_value_name(), tag, arb_data())
        .prop_map(|(name, tag, data)| RegistryValue::new(name, ValueType::from_u32(tag), data))
}

/// Builds a key, dropping values and subkeys whose names repeat (ignoring case).
fn make_key(name: RegString, values: Vec<RegistryValue>, subkeys: Vec<RegistryKey>) -> RegistryKey {
    let mut seen = HashSet::new();
    let values = values.into_iter().filter(|v| seen.insert(v.name.fold_case())).collect();
    let mut seen = HashSet::new();
    let subkeys = subkeys.into_iter().filter(|k| seen.insert(k.name.fold_case())).collect();
    RegistryKey { name, subkeys, values }
}

fn arb_subtree() -> impl Strategy<Value = RegistryKey> {
    let leaf = (arb_key_name(), prop::collection::vec(arb_value(), 0..4))
        .prop_map(|(name, values)| make_key(name, values, Vec::new()));
    leaf.prop_recursive(3, 24, 4, |inner| {
        (
            arb_key_name(),
            prop::collection::vec(arb_value(), 0..4),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(name, values, subkeys)| make_key(name, values, subkeys))
    })
}

fn arb_tree() -> impl Strategy<Value = RegistryKey> {
    (arb_root_name(), arb_subtree()).prop_map(|(name, mut root)| {
        root.name = RegString::from(name);
        root
    })
}

/// Removes values a policy file cannot tell apart from a key-only entry.
fn without_marker_values(mut key: RegistryKey) -> RegistryKey {
    key.values
        .retain(|v| !(v.name.is_empty() && v.value_type == ValueType::None && v.data.is_empty()));
    key.subkeys = key.subkeys.into_iter().map(without_marker_values).collect();
    key
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_standard_round_trip(tree in arb_tree()) {
        let options = RegFileOptions::standard();
        let bytes = regfile::render_bytes(&tree, &options).unwrap();
        let parsed = regfile::parse_bytes(&bytes, &options).unwrap();
        prop_assert_eq!(parsed, tree);
    }

    #[test]
    fn test_extended_round_trip(tree in arb_tree()) {
        let options = RegFileOptions::extended();
        let bytes = regfile::render_bytes(&tree, &options).unwrap();
        let parsed = regfile::parse_bytes(&bytes, &options).unwrap();
        prop_assert_eq!(parsed, tree);
    }

    #[test]
    fn test_rendering_is_idempotent(tree in arb_tree(), extensions in any::<bool>()) {
        let options = RegFileOptions { extensions, ..RegFileOptions::default() };
        let first = regfile::render_bytes(&tree, &options).unwrap();
        let reparsed = regfile::parse_bytes(&first, &options).unwrap();
        let second = regfile::render_bytes(&reparsed, &options).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_hex_lines_fit_in_eighty_columns(
        name in "[a-zA-Z0-9 _\"\u{1F600}]{0,20}",
        tag in (0u32..16).prop_filter("rendered as hex", |t| *t != 1 && *t != 4),
        data in prop::collection::vec(any::<u8>(), 0..200),
    ) {
        let value = RegistryValue::new(name, ValueType::from_u32(tag), data);
        let line = value_codec::render_value_line(&value, false).to_string();
        let lines: Vec<&str> = line.trim_end_matches("\r\n").split("\r\n").collect();
        for (index, l) in lines.iter().enumerate() {
            prop_assert!(l.encode_utf16().count() <= 80, "{:?}", l);
            prop_assert_eq!(l.ends_with('\\'), index + 1 < lines.len());
        }
    }

    #[test]
    fn test_policy_round_trip(tree in arb_subtree()) {
        let tree = without_marker_values(tree);
        let root = RegistryKey::new("(HiveRoot)").with_subkey(tree);
        let bytes = polfile::render_bytes(&root, 512).unwrap();
        prop_assert_eq!(polfile::parse_bytes(&bytes, "(HiveRoot)").unwrap(), root);
    }
}
