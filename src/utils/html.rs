//! HTML attribute escaping for emitted head markup.

use std::borrow::Cow;

const SPECIAL: [char; 5] = ['<', '>', '&', '"', '\''];

/// Escape a value for use inside a double-quoted attribute.
///
/// Borrows when nothing needs escaping.
pub fn escape_attr(s: &str) -> Cow<'_, str> {
    if !s.contains(SPECIAL) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_attr() {
        assert!(matches!(escape_attr("/static/a.css"), Cow::Borrowed(_)));
        assert_eq!(
            escape_attr("/x\"><script>&'"),
            "/x&quot;&gt;&lt;script&gt;&amp;&#39;"
        );
    }
}
