//! Key Sanitization
//!
//! Maps arbitrary cache keys onto tokens that are safe as a single
//! filesystem path segment. The same mapping is used on every read and write
//! path, so one logical key always lands on one physical file. Distinct keys
//! may collapse onto the same token.

/// Longest token kept, in bytes. Leaves room for the record and temp
/// extensions within a 255-byte file name.
pub const MAX_TOKEN_LENGTH: usize = 240;

const ILLEGAL: &[char] = &['/', '?', '<', '>', '\\', ':', '*', '|', '"'];

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Strips characters unsafe for a path segment.
///
/// Removes path separators and other reserved punctuation, control
/// characters, trailing dots and spaces, and rejects `.`/`..` and device
/// names such as `CON` or `lpt1.txt`. Returns an empty string when nothing
/// usable remains.
pub fn sanitize_key(key: &str) -> String {
    let stripped: String = key
        .chars()
        .filter(|c| !ILLEGAL.contains(c) && !c.is_control())
        .collect();

    let trimmed = stripped.trim_end_matches(['.', ' ']);

    // `.` and `..` trim down to nothing here
    if trimmed.is_empty() || is_reserved(trimmed) {
        return String::new();
    }

    truncate(trimmed, MAX_TOKEN_LENGTH).to_string()
}

fn is_reserved(token: &str) -> bool {
    let stem = token.split('.').next().unwrap_or(token);
    RESERVED_NAMES
        .iter()
        .any(|name| name.eq_ignore_ascii_case(stem))
}

fn truncate(token: &str, max: usize) -> &str {
    if token.len() <= max {
        return token;
    }
    let mut end = max;
    while !token.is_char_boundary(end) {
        end -= 1;
    }
    &token[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_keys_unchanged() {
        assert_eq!(sanitize_key("foo"), "foo");
        assert_eq!(sanitize_key("pattern_foo2"), "pattern_foo2");
        assert_eq!(sanitize_key("user-42.profile"), "user-42.profile");
    }

    #[test]
    fn test_path_traversal_stripped() {
        assert_eq!(sanitize_key("../../etc/passwd"), "....etcpasswd");
        assert_eq!(sanitize_key("a/b\\c"), "abc");
        assert_eq!(sanitize_key("/api/users?page=2"), "apiuserspage=2");
    }

    #[test]
    fn test_relative_markers_rejected() {
        assert_eq!(sanitize_key("."), "");
        assert_eq!(sanitize_key(".."), "");
        assert_eq!(sanitize_key("/../"), "");
    }

    #[test]
    fn test_reserved_names_rejected() {
        assert_eq!(sanitize_key("CON"), "");
        assert_eq!(sanitize_key("lpt1.txt"), "");
        assert_eq!(sanitize_key("console"), "console");
    }

    #[test]
    fn test_control_and_trailing_chars() {
        assert_eq!(sanitize_key("foo\u{0}\n"), "foo");
        assert_eq!(sanitize_key("foo. . "), "foo");
    }

    #[test]
    fn test_long_key_truncated_on_char_boundary() {
        let key = "é".repeat(200);
        let token = sanitize_key(&key);
        assert!(token.len() <= MAX_TOKEN_LENGTH);
        assert!(token.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_colliding_keys_share_token() {
        assert_eq!(sanitize_key("a:b"), sanitize_key("ab"));
    }
}
