//! SQL text normalization.
//!
//! Strips comments, collapses whitespace, and locates the first statement.
//! All functions here are pure.

/// Removes comments and collapses every whitespace run to a single space.
///
/// `--` comments run to the end of the line and `/* ... */` comments may
/// span lines. Markers inside single-quoted literals or double-quoted
/// identifiers are left alone. An unterminated `/*` is kept as text. Comments
/// are removed without leaving a gap, so `DR/**/OP` becomes `DROP`.
///
/// The output is a fixed point: cleaning it again returns it unchanged.
pub fn clean_query(raw: &str) -> String {
    let mut text = strip_comments(raw);
    // Removing a comment can splice two halves of a new marker together
    loop {
        let next = strip_comments(&text);
        if next == text {
            break;
        }
        text = next;
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the text before the first `;`, trimmed, if a separator exists.
///
/// Quoting is not considered: nothing after the first `;` ever runs.
pub fn first_statement(cleaned: &str) -> Option<&str> {
    cleaned.find(';').map(|end| cleaned[..end].trim())
}

fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    let mut quote: Option<char> = None;

    while let Some(c) = rest.chars().next() {
        if let Some(q) = quote {
            out.push(c);
            rest = &rest[c.len_utf8()..];
            if c == q {
                // A doubled quote is an escaped quote, not a terminator
                if rest.starts_with(q) {
                    out.push(q);
                    rest = &rest[q.len_utf8()..];
                } else {
                    quote = None;
                }
            }
            continue;
        }

        if rest.starts_with("--") {
            rest = match rest.find('\n') {
                Some(end) => &rest[end..],
                None => "",
            };
        } else if rest.starts_with("/*") {
            match rest[2..].find("*/") {
                Some(end) => rest = &rest[end + 4..],
                None => {
                    out.push_str("/*");
                    rest = &rest[2..];
                }
            }
        } else {
            if c == '\'' || c == '"' {
                quote = Some(c);
            }
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }

    out
}
