//! `.inf` sidecar parsing and synthesis.
//!
//! One line of whitespace-separated tokens: `name load exec length [L]`,
//! addresses in bare hex. The engine only consumes the parsed record; this
//! module owns the text format.

use dfs::FileMeta;

use crate::cli::parse_file_arg;

/// Parses a sidecar line. Returns `None` when the line does not carry the
/// minimal `name load exec` shape.
pub fn parse_inf(line: &str) -> Option<FileMeta> {
    let mut tokens = line.split_whitespace();
    let (dir, name) = parse_file_arg(tokens.next()?);
    let load_addr = u32::from_str_radix(tokens.next()?, 16).ok()?;
    let exec_addr = u32::from_str_radix(tokens.next()?, 16).ok()?;
    // Length is informational; the payload length wins.
    let _length = tokens.next().map(|t| u32::from_str_radix(t, 16));
    let locked = tokens
        .next()
        .is_some_and(|t| t.eq_ignore_ascii_case("L") || t.eq_ignore_ascii_case("Locked"));
    Some(FileMeta {
        name: name.to_string(),
        dir,
        load_addr,
        exec_addr,
        locked,
    })
}

/// Renders the sidecar line for an exported file.
pub fn format_inf(meta: &FileMeta, length: u32) -> String {
    let access = if meta.locked { " L" } else { "" };
    format!(
        "{}.{} {:06X} {:06X} {:06X}{access}",
        meta.dir as char, meta.name, meta.load_addr, meta.exec_addr, length
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let meta = parse_inf("$.DUMP FF1900 FF8023 000064 L").unwrap();
        assert_eq!(meta.name, "DUMP");
        assert_eq!(meta.dir, b'$');
        assert_eq!(meta.load_addr, 0xFF1900);
        assert_eq!(meta.exec_addr, 0xFF8023);
        assert!(meta.locked);

        let meta = parse_inf("B.GAME 1900 8023").unwrap();
        assert_eq!(meta.dir, b'B');
        assert!(!meta.locked);

        assert!(parse_inf("JUSTANAME").is_none());
        assert!(parse_inf("NAME nothex 8023").is_none());
    }

    #[test]
    fn test_roundtrip() {
        let meta = FileMeta {
            name: "DUMP".into(),
            dir: b'$',
            load_addr: 0xFF1900,
            exec_addr: 0xFF8023,
            locked: true,
        };
        let line = format_inf(&meta, 100);
        assert_eq!(line, "$.DUMP FF1900 FF8023 000064 L");
        assert_eq!(parse_inf(&line).unwrap(), meta);
    }
}
