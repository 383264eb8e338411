//! Filename sanitization for recording names.
//!
//! Titles and channel names come straight from the metadata source and may
//! contain path separators, control characters or names that are reserved on
//! some filesystems. Korean, Japanese and Chinese text is kept as-is.

/// Characters rejected by at least one common filesystem.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Reserved device names on Windows (case-insensitive).
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const FALLBACK: &str = "unnamed";

/// Sanitize one filename component.
///
/// Invalid and control characters become `_` (runs collapse to one), leading and
/// trailing spaces and dots are trimmed, reserved names get a `_` prefix and an
/// empty result becomes `"unnamed"`.
///
/// ```
/// use chzzk_srec::utils::filename::sanitize_filename;
///
/// assert_eq!(sanitize_filename("talk / chill?"), "talk _ chill_");
/// assert_eq!(sanitize_filename("오늘의 방송"), "오늘의 방송");
/// assert_eq!(sanitize_filename(""), "unnamed");
/// ```
pub fn sanitize_filename(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut last_was_replacement = false;

    for c in input.chars() {
        if c.is_control() || INVALID_CHARS.contains(&c) {
            if !last_was_replacement {
                result.push('_');
                last_was_replacement = true;
            }
        } else {
            result.push(c);
            last_was_replacement = false;
        }
    }

    let trimmed = result.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return FALLBACK.to_string();
    }

    let upper = trimmed.to_uppercase();
    let stem = upper.split('.').next().unwrap_or_default();
    if RESERVED_NAMES.contains(&stem) {
        return format!("_{trimmed}");
    }

    trimmed.to_string()
}

/// Sanitize `input` and cut it to at most `max_bytes` bytes on a char boundary.
pub fn sanitize_component(input: &str, max_bytes: usize) -> String {
    let sanitized = sanitize_filename(input);
    if sanitized.len() <= max_bytes {
        return sanitized;
    }

    let mut end = max_bytes;
    while end > 0 && !sanitized.is_char_boundary(end) {
        end -= 1;
    }
    let cut = sanitized[..end].trim_end_matches(|c| c == ' ' || c == '.');
    if cut.is_empty() {
        FALLBACK.to_string()
    } else {
        cut.to_string()
    }
}
