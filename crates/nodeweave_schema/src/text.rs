// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bracket-aware text helpers shared by the type and declaration scanners.
//!
//! Everything here treats quoted strings as opaque, so commas, brackets or
//! `#` characters inside a literal never influence splitting.

/// Walk `s` and call `visit(byte_index, char, depth)` for every character
/// outside a string literal. Returns the final bracket depth.
fn walk_unquoted(s: &str, mut visit: impl FnMut(usize, char, i32) -> bool) -> i32 {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => {
                if !visit(i, c, depth) {
                    break;
                }
                depth += 1;
                continue;
            }
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }

        if !visit(i, c, depth) {
            break;
        }
    }

    depth
}

/// Net change in bracket depth contributed by `line`.
pub(crate) fn bracket_delta(line: &str) -> i32 {
    walk_unquoted(line, |_, _, _| true)
}

/// Remove a trailing `# comment`, respecting string literals.
pub(crate) fn strip_comment(line: &str) -> &str {
    let mut cut = None;
    walk_unquoted(line, |i, c, _| {
        if c == '#' {
            cut = Some(i);
            false
        } else {
            true
        }
    });
    match cut {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Split `s` on `sep` occurrences at bracket depth zero.
pub(crate) fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    walk_unquoted(s, |i, c, depth| {
        if c == sep && depth == 0 {
            parts.push(s[start..i].trim());
            start = i + c.len_utf8();
        }
        true
    });
    parts.push(s[start..].trim());
    parts
}

/// Byte index of the first top-level assignment `=` (not `==`, `<=`, `>=`, `!=`, `->`).
pub(crate) fn find_top_level_assign(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut found = None;
    walk_unquoted(s, |i, c, depth| {
        if c != '=' || depth != 0 {
            return true;
        }
        let prev = if i > 0 { bytes[i - 1] } else { b' ' };
        let next = bytes.get(i + 1).copied().unwrap_or(b' ');
        if next == b'=' || matches!(prev, b'=' | b'<' | b'>' | b'!') {
            return true;
        }
        found = Some(i);
        false
    });
    found
}

/// If `s` has the shape `head[...]` (or `head(...)` with `open = '('`) with
/// the final character closing the first opener, return `(head, inner)`.
pub(crate) fn split_call(s: &str, open: char) -> Option<(&str, &str)> {
    let close = match open {
        '[' => ']',
        '(' => ')',
        _ => return None,
    };
    let s = s.trim();
    let start = s.find(open)?;
    if !s.ends_with(close) {
        return None;
    }

    // The opener must not close before the final character.
    let mut closes_early = false;
    let body = &s[start..];
    let last = body.len() - close.len_utf8();
    walk_unquoted(body, |i, c, depth| {
        if (c == ')' || c == ']' || c == '}') && depth == 0 && i != last {
            closes_early = true;
            return false;
        }
        true
    });
    if closes_early {
        return None;
    }

    Some((s[..start].trim(), &s[start + 1..s.len() - 1]))
}

/// Parse one or more adjacent string literals (`"a" 'b'`) into their
/// concatenated contents. Returns `None` if `s` is not purely literals.
pub(crate) fn unquote(s: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = s.trim().chars().peekable();
    let mut any = false;

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(q) = chars.next() else { break };
        if q != '"' && q != '\'' {
            return None;
        }
        any = true;
        let mut closed = false;
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(other) => out.push(other),
                    None => return None,
                }
            } else if c == q {
                closed = true;
                break;
            } else {
                out.push(c);
            }
        }
        if !closed {
            return None;
        }
    }

    any.then_some(out)
}

/// Leading whitespace width (tabs and spaces count as one column each).
pub(crate) fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}
