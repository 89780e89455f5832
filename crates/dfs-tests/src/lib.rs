//! Test utilities for the `dfs*` crates.
//!
//! Provides hex helpers and the `test_binrw!` macro family for byte-exact
//! codec round-trip tests. This crate is a dev-dependency only and must not
//! be used outside of tests.

/// Decodes a hex string into bytes, ignoring ASCII whitespace.
///
/// Panics on invalid input; this is a test helper.
pub fn decode_hex(hex: &str) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .map(|b| match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => panic!("invalid hex digit {:?}", b as char),
        })
        .collect();
    assert!(
        digits.len() % 2 == 0,
        "hex string has an odd number of digits"
    );
    digits.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect()
}

/// Generates a test that reads `$hex` and expects it to parse into `$value`.
#[macro_export]
macro_rules! test_binrw_read {
    ($ty:ident => $name:tt: $value:expr => $hex:expr) => {
        pastey::paste! {
            #[test]
            fn [<test_binrw_ $ty:snake _ $name:snake _read>]() {
                use ::binrw::{io::Cursor, BinReaderExt};

                let bytes = $crate::decode_hex($hex);
                let mut cursor = Cursor::new(&bytes);
                let parsed: $ty = cursor.read_le().unwrap();
                assert_eq!(parsed, $value);
                assert_eq!(
                    cursor.position() as usize,
                    bytes.len(),
                    "trailing bytes left after read"
                );
            }
        }
    };
}

/// Generates a test that writes `$value` and expects the bytes `$hex`.
#[macro_export]
macro_rules! test_binrw_write {
    ($ty:ident => $name:tt: $value:expr => $hex:expr) => {
        pastey::paste! {
            #[test]
            fn [<test_binrw_ $ty:snake _ $name:snake _write>]() {
                use ::binrw::{io::Cursor, BinWriterExt};

                let mut cursor = Cursor::new(Vec::new());
                let value: $ty = $value;
                cursor.write_le(&value).unwrap();
                assert_eq!(cursor.into_inner(), $crate::decode_hex($hex));
            }
        }
    };
}

/// Generates both a read and a write test for the same value/bytes pair.
#[macro_export]
macro_rules! test_binrw {
    ($ty:ident => $name:tt: $value:expr => $hex:expr) => {
        $crate::test_binrw_read! { $ty => $name: $value => $hex }
        $crate::test_binrw_write! { $ty => $name: $value => $hex }
    };
}
