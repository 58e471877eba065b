//! Redaction of credentials and personal data before logging.

use regex::Regex;
use std::sync::LazyLock;

/// Sensitive JSON fields whose values are masked
static SENSITIVE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"(password|token|access_token|api[_-]?key|secret|authorization)"\s*:\s*"[^"]*""#)
        .expect("valid sensitive field pattern")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email pattern")
});

static BEARER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/=-]+").expect("valid bearer pattern"));

/// Redact sensitive data from a payload or message about to be logged
pub fn redact_sensitive_data(input: &str) -> String {
    let result = SENSITIVE_FIELD.replace_all(input, r#""$1": "[REDACTED]""#);
    let result = BEARER.replace_all(&result, "Bearer [REDACTED]");
    EMAIL.replace_all(&result, "[EMAIL]").into_owned()
}

/// Truncate a body for logging, respecting char boundaries
pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &input[..idx]),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_data_redaction() {
        let input = r#"{"password": "secret123", "email": "user@example.com", "access_token": "abc123"}"#;
        let redacted = redact_sensitive_data(input);

        assert!(!redacted.contains("secret123"));
        assert!(!redacted.contains("user@example.com"));
        assert!(!redacted.contains("abc123"));
        assert!(redacted.contains(r#""password": "[REDACTED]""#));
        assert!(redacted.contains(r#""access_token": "[REDACTED]""#));
    }

    #[test]
    fn test_bearer_redaction() {
        let redacted = redact_sensitive_data("Authorization: Bearer eyJhbGciOi.xyz");
        assert_eq!(redacted, "Authorization: Bearer [REDACTED]");
    }

    #[test]
    fn test_plain_text_untouched() {
        let input = r#"{"detail": "Prediction not found"}"#;
        assert_eq!(redact_sensitive_data(input), input);
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        assert_eq!(truncate_for_log("abc", 3), "abc");
        assert_eq!(truncate_for_log("héllo", 2), "hé...");
    }
}
