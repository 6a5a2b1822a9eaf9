//! Size-aware response splitting for Slack delivery.
//!
//! Slack truncates messages past ~4000 bytes and the desktop client
//! degrades past ~3000 characters, so every outbound chunk must satisfy
//! both ceilings at once. Splitting prefers line boundaries so replies
//! read naturally across messages.

/// Per-message byte ceiling (UTF-8 encoded).
pub const MAX_MESSAGE_BYTES: usize = 4000;

/// Per-message character ceiling.
pub const MAX_MESSAGE_CHARS: usize = 3000;

/// Split `text` into ordered chunks, each within both ceilings.
///
/// Concatenating the chunks reproduces the input exactly: line-break
/// snapping moves boundaries but never drops or duplicates characters.
pub fn chunk_text(text: &str) -> Vec<String> {
    if fits(text) {
        return vec![text.to_string()];
    }

    let chunks = scan_chunks(text, true);

    // Defensive post-pass: pathological inputs with no usable line
    // breaks could still leave an over-ceiling chunk; re-split those
    // without the line-break search.
    let mut safe = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if fits(&chunk) {
            safe.push(chunk);
        } else {
            safe.extend(scan_chunks(&chunk, false));
        }
    }
    safe
}

fn fits(text: &str) -> bool {
    text.len() <= MAX_MESSAGE_BYTES && text.chars().count() <= MAX_MESSAGE_CHARS
}

/// Forward scan accumulating characters while both ceilings hold.
/// With `snap_to_newline`, a boundary that is not end-of-text moves back
/// to just after the most recent line break strictly inside the chunk.
fn scan_chunks(text: &str, snap_to_newline: bool) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = start;
        let mut chars = 0;
        for (offset, ch) in text[start..].char_indices() {
            // Per-character byte accounting: one character may be multi-byte.
            if offset + ch.len_utf8() > MAX_MESSAGE_BYTES || chars + 1 > MAX_MESSAGE_CHARS {
                break;
            }
            end = start + offset + ch.len_utf8();
            chars += 1;
        }
        if end == start {
            // A single character exceeding the byte ceiling cannot occur
            // with 4-byte-max UTF-8, but guard against an infinite loop.
            break;
        }

        if snap_to_newline && end < text.len() {
            if let Some(pos) = text[start..end].rfind('\n') {
                if pos > 0 {
                    end = start + pos + 1;
                }
            }
        }

        chunks.push(text[start..end].to_string());
        start = end;
    }

    chunks
}
