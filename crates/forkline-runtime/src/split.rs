/// Split `text` into parts of at most `limit` characters.
///
/// Cuts prefer the last newline inside the window, then the last whitespace,
/// and only then fall back to a hard cut. Cut whitespace is dropped.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut parts = Vec::new();
    let mut rest = text.trim();

    while rest.chars().count() > limit {
        let window_end = char_boundary(rest, limit);
        // A break directly after the window still yields a fitting head
        let search = &rest[..char_boundary(rest, limit + 1)];

        let cut = search
            .rfind('\n')
            .or_else(|| search.rfind(char::is_whitespace))
            .filter(|&i| i > 0)
            .unwrap_or(window_end);

        let (head, tail) = rest.split_at(cut);
        let head = head.trim_end();
        if !head.is_empty() {
            parts.push(head.to_string());
        }
        rest = tail.trim_start();
    }

    if !rest.is_empty() || parts.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

/// Byte index of the `n`-th char, or the end of `text`
fn char_boundary(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
