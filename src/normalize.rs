//! Inbound/outbound text normalization.

use std::sync::LazyLock;

use regex::Regex;

/// `<@U12345>`-style mention tokens in inbound Slack text.
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@[A-Z0-9]+>").expect("mention regex"));

/// File-citation markers the Assistants API embeds in responses:
/// `【8†file.pdf】`, `【8:0†file.pdf】`, `【20:0-3†People & Talent_v099.pdf】`.
static CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"【\d+(?::\d+(?:-\d+)?)?†[^】]+】").expect("citation regex"));

/// Remove bot-mention tokens and trim. An empty result means the
/// message carried no actionable content.
pub fn strip_mentions(text: &str) -> String {
    MENTION_RE.replace_all(text, "").trim().to_string()
}

/// Remove file-citation markers and trim. Idempotent.
pub fn strip_citations(text: &str) -> String {
    CITATION_RE.replace_all(text, "").trim().to_string()
}
