use std::borrow::Cow;

/// Prepare a feed-supplied title for a chat message.
///
/// Control characters (including ANSI escapes and newlines) are replaced by
/// spaces and surrounding whitespace is trimmed. An empty result becomes
/// `"Untitled"`.
pub fn clean_title(s: &str) -> Cow<'_, str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Cow::Borrowed("Untitled");
    }
    if !trimmed.chars().any(char::is_control) {
        return Cow::Borrowed(trimmed);
    }

    let replaced: String = trimmed
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let replaced = replaced.trim();
    if replaced.is_empty() {
        Cow::Borrowed("Untitled")
    } else {
        Cow::Owned(replaced.to_string())
    }
}

/// Ellipsis appended when text is cut
const ELLIPSIS: &str = "...";

/// Truncate `s` to at most `max_chars` characters, ending in `...` when cut.
///
/// Counts `char`s rather than bytes, so multi-byte text is never split
/// mid-codepoint.
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_chars {
        return Cow::Borrowed(s);
    }
    if max_chars <= ELLIPSIS.len() {
        return Cow::Owned(s.chars().take(max_chars).collect());
    }
    let mut out: String = s.chars().take(max_chars - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    Cow::Owned(out)
}
