//! UTF-8 safe string helpers.
//!
//! Never slice by byte index here: user text routinely contains multibyte
//! characters and a byte slice on a char boundary panics.

/// Return the first `n` characters of `s` as a `String` (no ellipsis).
pub fn prefix_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Return a preview of `s` up to `n` characters, with a trailing `...` when
/// the input was longer.
pub fn preview(s: &str, n: usize) -> String {
    let mut prefix = prefix_chars(s, n);
    if s.chars().count() > n {
        prefix.push_str("...");
    }
    prefix
}

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Prefers to break after the last newline inside the window, then after the
/// last space, and only cuts mid-word when a window has neither. Empty input
/// yields no pieces.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut rest: Vec<char> = text.chars().collect();

    while !rest.is_empty() {
        if rest.len() <= max_chars {
            pieces.push(rest.iter().collect());
            break;
        }
        let window = &rest[..max_chars];
        let cut = window
            .iter()
            .rposition(|c| *c == '\n')
            .or_else(|| window.iter().rposition(|c| *c == ' '))
            .map(|i| i + 1)
            .filter(|i| *i > 0)
            .unwrap_or(max_chars);
        pieces.push(rest[..cut].iter().collect());
        rest = rest.split_off(cut);
    }
    pieces
}
