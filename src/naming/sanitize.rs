//! Filename and directory-name sanitization

/// Longest final filename, in characters, extension included
pub const MAX_FILENAME_CHARS: usize = 200;

/// Characters Windows forbids in names
const WINDOWS_RESERVED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Which naming rules apply on top of the always-on ones
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NamingRules {
    /// Windows rules (forced on when running on Windows)
    pub windows: bool,
    /// Printable-ASCII only
    pub restrict: bool,
}

impl NamingRules {
    /// Rules for the host platform with the given switches
    #[must_use]
    pub fn new(windows: bool, restrict: bool) -> Self {
        Self {
            windows: windows || cfg!(windows),
            restrict,
        }
    }
}

/// Replace characters that cannot appear in a single filename with `_`
///
/// Always: path separators and ASCII control characters. Windows rules add
/// `<>:"/\|?*`; restrict mode replaces everything outside `0x21..=0x7E`.
#[must_use]
pub fn sanitize_filename(name: &str, rules: NamingRules) -> String {
    name.chars()
        .map(|c| {
            let replace = c == '/'
                || std::path::is_separator(c)
                || (c as u32) < 0x20
                || rules.windows && WINDOWS_RESERVED.contains(&c)
                || rules.restrict && !('\x21'..='\x7e').contains(&c);
            if replace { '_' } else { c }
        })
        .collect()
}

/// Sanitize a directory component
///
/// Same as [`sanitize_filename`], and under Windows rules trailing spaces and
/// periods are stripped.
#[must_use]
pub fn sanitize_dirname(name: &str, rules: NamingRules) -> String {
    let name = sanitize_filename(name, rules);
    if rules.windows {
        name.trim_end_matches([' ', '.']).to_string()
    } else {
        name
    }
}

/// Bound a filename to [`MAX_FILENAME_CHARS`] characters, keeping its extension
///
/// When too long, the stem is cut so stem + `.` + extension is exactly the limit.
#[must_use]
pub fn truncate_filename(name: &str) -> String {
    if name.chars().count() <= MAX_FILENAME_CHARS {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };
    let ext_len = ext.chars().count();
    if ext_len >= MAX_FILENAME_CHARS {
        return name.chars().take(MAX_FILENAME_CHARS).collect();
    }

    let mut out: String = stem.chars().take(MAX_FILENAME_CHARS - ext_len).collect();
    out.push_str(ext);
    out
}
