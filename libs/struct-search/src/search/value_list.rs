//! Parser for parenthesised filter value lists such as `("a", 'b', 3)`.

use std::iter::Peekable;
use std::str::Chars;

use crate::{Error, Result};

fn malformed(input: &str, reason: &str) -> Error {
    Error::config(format!("malformed value list {input}: {reason}"))
}

/// Split a value list into its unquoted, unescaped elements.
///
/// Elements are bare words/numbers or strings in single or double quotes.
/// Inside quotes a backslash escapes the quote character and itself; any
/// other backslash is kept literally.
pub fn parse_filter_value_list(input: &str) -> Result<Vec<String>> {
    let trimmed = input.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| malformed(input, "expected a list in parentheses"))?;

    let mut chars = inner.chars().peekable();
    let mut values = Vec::new();

    skip_whitespace(&mut chars);
    if chars.peek().is_none() {
        return Ok(values);
    }

    loop {
        skip_whitespace(&mut chars);
        let value = match chars.peek() {
            Some(&quote @ ('"' | '\'')) => {
                chars.next();
                quoted(&mut chars, quote).ok_or_else(|| malformed(input, "unterminated quote"))?
            }
            Some(_) => bare(&mut chars, input)?,
            None => return Err(malformed(input, "missing element after ','")),
        };
        values.push(value);

        skip_whitespace(&mut chars);
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(c) => return Err(malformed(input, &format!("unexpected '{c}'"))),
        }
    }

    Ok(values)
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}

fn quoted(chars: &mut Peekable<Chars<'_>>, quote: char) -> Option<String> {
    let mut out = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                escaped if escaped == quote || escaped == '\\' => out.push(escaped),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            },
            c if c == quote => return Some(out),
            c => out.push(c),
        }
    }
    None
}

fn bare(chars: &mut Peekable<Chars<'_>>, input: &str) -> Result<String> {
    let mut out = String::new();
    while let Some(c) = chars.next_if(|c| *c != ',') {
        if matches!(c, '"' | '\'' | '(' | ')') {
            return Err(malformed(input, &format!("unexpected '{c}' in bare value")));
        }
        out.push(c);
    }
    let out = out.trim_end().to_string();
    if out.is_empty() {
        return Err(malformed(input, "empty element"));
    }
    Ok(out)
}
