//! Small text helpers shared across parsers.

use serde_json::Value;

/// Collapse whitespace and truncate at a word boundary.
///
/// The result is at most `width` characters; truncated text ends in `...`.
/// Scanner titles regularly exceed what downstream systems accept, so titles
/// and component names pass through this before they leave a parser.
pub(crate) fn shorten(text: &str, width: usize) -> String {
    const PLACEHOLDER: &str = "...";

    let words: Vec<&str> = text.split_whitespace().collect();
    let collapsed = words.join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let budget = width.saturating_sub(PLACEHOLDER.len());
    let mut kept = String::new();
    let mut kept_chars = 0;
    for word in words {
        let word_chars = word.chars().count();
        let next = if kept.is_empty() {
            word_chars
        } else {
            kept_chars + 1 + word_chars
        };
        if next > budget {
            break;
        }
        if !kept.is_empty() {
            kept.push(' ');
            kept_chars += 1;
        }
        kept.push_str(word);
        kept_chars += word_chars;
    }
    kept.push_str(PLACEHOLDER);
    kept
}

/// Uppercase the first letter of every word, lowercase the rest.
pub(crate) fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Render a JSON value the way it should read inside prose.
///
/// Strings lose their quotes, numbers and booleans keep their literal form,
/// null renders empty, and composite values fall back to compact JSON.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
