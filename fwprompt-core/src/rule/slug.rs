//! Rule name slugs

use deunicode::deunicode;

/// Lowercase ASCII alphanumerics joined by single hyphens.
///
/// Non-ASCII text is transliterated first (`jürgen` becomes `jurgen`).
/// Apostrophes and commas between digits are dropped; every other run of
/// non-alphanumerics becomes one hyphen, and leading and trailing runs are
/// trimmed.
pub fn slugify(input: &str) -> String {
    let text = deunicode(input);
    let mut out = String::with_capacity(text.len());
    let mut separator = false;
    let mut chars = text.chars().peekable();
    let mut prev = None;

    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        let digit_comma = c == ',' && is_digit(prev) && is_digit(next);
        prev = Some(c);

        if c == '\'' || digit_comma {
            continue;
        }
        if c.is_ascii_alphanumeric() {
            if separator && !out.is_empty() {
                out.push('-');
            }
            separator = false;
            out.push(c.to_ascii_lowercase());
        } else {
            separator = true;
        }
    }

    out
}

fn is_digit(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_ascii_digit())
}

/// Append `text` to an existing slug, re-slugging the result
pub(crate) fn append_slug(slug: &str, text: &str) -> String {
    slugify(&format!("{} {}", slug, text))
}
