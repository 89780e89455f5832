//! Host filename translation and DFS wildcard matching.
//!
//! DFS names allow characters most host filesystems reject, so exported
//! names escape anything outside a safe set as `#xx` (two hex digits), and
//! imports reverse the escaping. A non-`$` directory becomes a `d.` prefix
//! on the host name.

use dfs::Entry;

fn is_host_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'+' | b'!')
}

/// Translates a DFS `(dir, name)` pair into a host-safe file name.
pub fn dfs_to_host(dir: u8, name: &str) -> String {
    let mut out = String::new();
    if dir != b'$' {
        escape_into(&mut out, dir);
        out.push('.');
    }
    for b in name.bytes() {
        escape_into(&mut out, b);
    }
    out
}

fn escape_into(out: &mut String, b: u8) {
    if is_host_safe(b) {
        out.push(b as char);
    } else {
        out.push_str(&format!("#{b:02x}"));
    }
}

/// Reverses [`dfs_to_host`]: unescapes `#xx` sequences and splits a leading
/// `d.` directory prefix.
pub fn host_to_dfs(host: &str) -> (u8, String) {
    let unescaped = unescape(host);
    if unescaped.len() >= 2 && unescaped.as_bytes()[1] == b'.' {
        (unescaped.as_bytes()[0], unescaped[2..].to_string())
    } else {
        (b'$', unescaped)
    }
}

fn unescape(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' && i + 2 < bytes.len() {
            if let Ok(value) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                out.push(value as char);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

/// DFS-style wildcard match: `*` spans any run, `#` one character. The
/// pattern may carry a `D.` directory part; without one it matches `$`.
pub fn matches_pattern(pattern: &str, entry: &Entry) -> bool {
    let (dir_pat, name_pat) = split_pattern(pattern);
    glob_match(dir_pat.as_bytes(), &[entry.dir.to_ascii_uppercase()])
        && glob_match(
            name_pat.to_ascii_uppercase().as_bytes(),
            entry.name.to_ascii_uppercase().as_bytes(),
        )
}

fn split_pattern(pattern: &str) -> (String, &str) {
    let bytes = pattern.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b'.' {
        (
            (bytes[0] as char).to_ascii_uppercase().to_string(),
            &pattern[2..],
        )
    } else {
        ("$".into(), pattern)
    }
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            glob_match(&pattern[1..], text)
                || (!text.is_empty() && glob_match(pattern, &text[1..]))
        }
        (Some(b'#'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(&p), Some(&t)) => p == t && glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(dir: u8, name: &str) -> Entry {
        Entry {
            name: name.into(),
            dir,
            locked: false,
            load_addr: 0,
            exec_addr: 0,
            length: 0,
            start_sector: 2,
        }
    }

    #[test]
    fn test_host_translation_roundtrip() {
        assert_eq!(dfs_to_host(b'$', "MENU"), "MENU");
        assert_eq!(dfs_to_host(b'A', "MENU"), "A.MENU");
        assert_eq!(dfs_to_host(b'$', "!BOOT"), "!BOOT");
        let odd = dfs_to_host(b'$', "A<B>");
        assert_eq!(odd, "A#3cB#3e");
        assert_eq!(host_to_dfs(&odd), (b'$', "A<B>".into()));
        assert_eq!(host_to_dfs("A.MENU"), (b'A', "MENU".into()));
        assert_eq!(host_to_dfs("MENU"), (b'$', "MENU".into()));
    }

    #[test]
    fn test_wildcards() {
        assert!(matches_pattern("*", &entry(b'$', "MENU")));
        assert!(matches_pattern("M*", &entry(b'$', "MENU")));
        assert!(matches_pattern("menu", &entry(b'$', "MENU")));
        assert!(matches_pattern("M#N#", &entry(b'$', "MENU")));
        assert!(!matches_pattern("M#", &entry(b'$', "MENU")));
        assert!(!matches_pattern("*", &entry(b'A', "MENU")));
        assert!(matches_pattern("A.*", &entry(b'A', "MENU")));
        assert!(matches_pattern("#.MENU", &entry(b'A', "MENU")));
    }
}
