//! Deterministic cleanup of extracted page text before it reaches the model.
//!
//! The pass strips markup, keeps only the commerce-relevant neighbourhood of
//! the page, and bounds the result to a token budget of roughly four
//! characters per token.

use std::sync::LazyLock;

use regex::Regex;

const CHARS_PER_TOKEN: usize = 4;
/// Lines of context kept on each side of a keyword hit.
const WINDOW: usize = 2;

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<!--.*?-->",
    )
    .expect("valid regex")
});

static BREAK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(?:br|/p|/div|/li|/tr|/h[1-6]|/section|/article)\b[^>]*>")
        .expect("valid regex")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static MD_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));

static MD_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));

/// A line made only of links and separators, e.g. `[Home](/) | [Shop](/s)`.
static NAV_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•>|]\s*)?(?:\[[^\]]*\]\([^)]*\)\s*[|·•/,>-]?\s*)+$")
        .expect("valid regex")
});

static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[$€£¥₹]|\b(?:price|prices|priced|msrp|sale|discount|save|off|deal|stock|availability|available|unavailable|shipping|delivery|ships|sku|model|rating|rated|reviews?|stars?|size|sizes|colou?rs?|variant|options?|warranty|seller|sold by|usd|eur|gbp|cad|aud|jpy|inr)\b",
    )
    .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentSanitizer {
    token_budget: usize,
}

impl ContentSanitizer {
    #[must_use]
    pub fn new(token_budget: usize) -> Self {
        Self { token_budget }
    }

    /// Character ceiling implied by the token budget.
    #[must_use]
    pub fn char_budget(&self) -> usize {
        self.token_budget.saturating_mul(CHARS_PER_TOKEN)
    }

    /// Cleans `raw`. `subject_terms` are lower-cased words that count as
    /// keywords in addition to the built-in commerce vocabulary.
    #[must_use]
    pub fn sanitize(&self, raw: &str, subject_terms: &[String]) -> String {
        let text = strip_markup(raw);
        let lines = clean_lines(&text);
        let kept = keyword_window(&lines, subject_terms);
        truncate_on_line(&kept.join("\n"), self.char_budget())
    }
}

fn strip_markup(raw: &str) -> String {
    let text = BLOCK_RE.replace_all(raw, " ");
    let text = BREAK_TAG_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, " ");
    decode_entities(&text)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&euro;", "€")
        .replace("&pound;", "£")
        .replace("&amp;", "&")
}

fn clean_lines(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in text.lines() {
        if NAV_LINE_RE.is_match(line) {
            continue;
        }
        let line = MD_IMAGE_RE.replace_all(line, " ");
        let line = MD_LINK_RE.replace_all(&line, "$1");
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() || !collapsed.chars().any(char::is_alphanumeric) {
            continue;
        }
        if out.last().is_some_and(|prev| *prev == collapsed) {
            continue;
        }
        out.push(collapsed);
    }
    out
}

fn keyword_window(lines: &[String], subject_terms: &[String]) -> Vec<String> {
    let is_hit = |line: &str| {
        if KEYWORD_RE.is_match(line) {
            return true;
        }
        let lower = line.to_lowercase();
        subject_terms.iter().any(|t| !t.is_empty() && lower.contains(t.as_str()))
    };

    let mut keep = vec![false; lines.len()];
    let mut any = false;
    for (i, line) in lines.iter().enumerate() {
        if is_hit(line) {
            any = true;
            let start = i.saturating_sub(WINDOW);
            let end = (i + WINDOW).min(lines.len().saturating_sub(1));
            for flag in &mut keep[start..=end] {
                *flag = true;
            }
        }
    }

    if !any {
        return lines.to_vec();
    }
    lines
        .iter()
        .zip(keep)
        .filter_map(|(line, kept)| kept.then(|| line.clone()))
        .collect()
}

/// Cuts `text` to at most `max_chars` characters, ending at the last line
/// break when one falls in the second half of the allowance.
fn truncate_on_line(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    match cut.rfind('\n') {
        Some(pos) if cut[..pos].chars().count() >= max_chars / 2 => cut[..pos].to_string(),
        _ => cut,
    }
}
