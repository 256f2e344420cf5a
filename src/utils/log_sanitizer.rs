// ============================================================================
// Log Sanitization
// ============================================================================
//
// Error bodies returned by marketplaces and the ERP are untrusted text. They are
// logged and copied into sync reports, so they pass through here first:
// control characters and ANSI sequences are stripped and length is capped.
//
// ============================================================================

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum number of characters kept from a remote message.
pub const MAX_LOG_LENGTH: usize = 200;

static ANSI_ESCAPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").expect("ANSI escape pattern is valid")
});

/// Flatten untrusted text onto a single printable line.
///
/// ```
/// use omnistock::utils::log_sanitizer::sanitize_for_log;
///
/// assert_eq!(sanitize_for_log("bad\nrequest"), "bad request");
/// assert_eq!(sanitize_for_log("test\x1b[31mred\x1b[0m"), "testred");
/// ```
pub fn sanitize_for_log(input: &str) -> String {
    let no_ansi = ANSI_ESCAPE_REGEX.replace_all(input, "");

    let cleaned: String = no_ansi
        .chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    let cleaned = cleaned.trim();
    match cleaned.char_indices().nth(MAX_LOG_LENGTH) {
        Some((cut, _)) => format!("{}...", &cleaned[..cut]),
        None => cleaned.to_string(),
    }
}

/// Mask a credential so only its length is visible.
pub fn redact_sensitive(input: &str) -> String {
    format!("[REDACTED-{}]", input.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newlines_and_tabs_become_spaces() {
        assert_eq!(
            sanitize_for_log("item\tSKU-1\r\nINFO: Fake log entry"),
            "item SKU-1  INFO: Fake log entry"
        );
    }

    #[test]
    fn test_control_chars_removed() {
        assert_eq!(sanitize_for_log("test\x00\x01\x02data"), "testdata");
    }

    #[test]
    fn test_ansi_removed() {
        let result = sanitize_for_log("\x1b[2K\rcleared");
        assert!(!result.contains('\x1b'));
        assert_eq!(result, "cleared");
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        let long_input = "库".repeat(300);
        let result = sanitize_for_log(&long_input);
        assert!(result.ends_with("..."));
        assert_eq!(result.chars().count(), MAX_LOG_LENGTH + 3);
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(sanitize_for_log("Item SKU-A not found"), "Item SKU-A not found");
    }

    #[test]
    fn test_redact_sensitive() {
        let result = redact_sensitive("super_secret_password_123");
        assert!(!result.contains("secret"));
        assert_eq!(result, "[REDACTED-25]");
    }
}
