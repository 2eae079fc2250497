use unicode_normalization::UnicodeNormalization;

/// Longest path component we produce, in characters.
pub const MAX_NAME_LEN: usize = 200;

const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Make a title safe to use as a single directory or file name on Windows,
/// macOS and Linux.
///
/// Colons become `" -"` and slashes become `-` so the result still reads well,
/// the remaining reserved characters and control characters are dropped,
/// leading/trailing spaces and dots are trimmed, whitespace runs collapse to
/// one space, and a Windows device name (`CON`, `COM1`, ...) is wrapped as
/// `_CON_`. Text is NFC-normalized first so accented titles compare equal
/// regardless of how the site encoded them.
pub fn sanitize_filename(raw: &str) -> String {
    let nfc: String = raw.nfc().collect();
    if nfc.trim().is_empty() {
        return "Untitled_Book".to_string();
    }

    let replaced = nfc.replace(':', " -").replace(['/', '\\'], "-");
    let cleaned: String = replaced
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '|' | '?' | '*') && !c.is_control())
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == ' ' || c == '.');

    let wrapped = if RESERVED_NAMES.contains(&trimmed.to_uppercase().as_str()) {
        format!("_{trimmed}_")
    } else {
        trimmed.to_string()
    };

    let collapsed = wrapped.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_NAME_LEN).collect();
    let truncated = truncated.trim();

    if truncated.is_empty() {
        "Unknown_Title".to_string()
    } else {
        truncated.to_string()
    }
}

/// Collapse all whitespace runs (including newlines from HTML text nodes) to single spaces.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
