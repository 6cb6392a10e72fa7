//! Scrubbing of operator-facing error text.

use std::sync::LazyLock;

use regex::Regex;

/// Longest redacted message surfaced to operators or logs.
pub const MAX_MESSAGE_CHARS: usize = 300;

static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/=-]+").expect("valid regex"));

static KEY_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(api[_-]?key|key|token|access_token|secret)=([^&\s"']+)"#)
        .expect("valid regex")
});

static PROVIDER_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(sk|tvly|pk|rk)-[A-Za-z0-9_-]{6,}").expect("valid regex")
});

/// Removes credentials from `message` and bounds its length.
///
/// Strips bearer tokens, credential-bearing query parameters, and provider
/// key prefixes (`sk-`, `tvly-`, ...). The result is a single line of at most
/// [`MAX_MESSAGE_CHARS`] characters.
#[must_use]
pub fn redact_secrets(message: &str) -> String {
    let scrubbed = BEARER_RE.replace_all(message, "Bearer [redacted]");
    let scrubbed = KEY_PARAM_RE.replace_all(&scrubbed, "$1=[redacted]");
    let scrubbed = PROVIDER_KEY_RE.replace_all(&scrubbed, "[redacted]");

    let single_line = scrubbed.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= MAX_MESSAGE_CHARS {
        return single_line;
    }
    let mut truncated: String = single_line.chars().take(MAX_MESSAGE_CHARS).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bearer_tokens() {
        let out = redact_secrets("401 for Authorization: Bearer abc.def-123");
        assert_eq!(out, "401 for Authorization: Bearer [redacted]");
    }

    #[test]
    fn strips_key_query_parameters() {
        let out = redact_secrets("GET https://api.example.com/?api_key=hunter2&op=x failed");
        assert!(!out.contains("hunter2"), "{out}");
        assert!(out.contains("api_key=[redacted]"));
        assert!(out.contains("op=x"));
    }

    #[test]
    fn strips_provider_key_prefixes() {
        let out = redact_secrets("invalid key tvly-ABCDEF123456 and sk-proj_abcdefgh");
        assert!(!out.contains("ABCDEF123456"), "{out}");
        assert!(!out.contains("abcdefgh"), "{out}");
    }

    #[test]
    fn collapses_to_one_bounded_line() {
        let long = format!("line one\nline two {}", "x".repeat(1_000));
        let out = redact_secrets(&long);
        assert!(!out.contains('\n'));
        assert_eq!(out.chars().count(), MAX_MESSAGE_CHARS + 1);
    }
}
