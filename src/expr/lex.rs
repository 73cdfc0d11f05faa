//! Expression pre-tokenizer
//!
//! `[...]` spans, string literals and character literals are kept atomic so
//! that commas and operators inside them never split the surrounding atom.
//! The remaining text is split at single-character operators, parentheses
//! and commas.

use crate::diagnostics::{Result, TurtleError};

/// Single-character operators
pub const OPERATORS: &[char] = &['+', '-', '*', '/', '<', '>', '=', '&', '|', '!', ':', '%'];

/// Split an expression into atoms and single-character punctuation
pub fn split(expr: &str) -> Result<Vec<String>> {
    let chars: Vec<char> = expr.chars().collect();
    let mut out = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let span_end = match c {
            '"' => Some(string_end(&chars, i).ok_or_else(|| malformed(expr, "unterminated string"))?),
            '\'' => Some(char_literal_end(&chars, i).ok_or_else(|| malformed(expr, "empty character literal"))?),
            '[' => Some(matching_bracket(&chars, i).ok_or_else(|| unbalanced(expr))?),
            '.' if chars.get(i + 1) == Some(&'<') => Some(
                chars[i..]
                    .iter()
                    .position(|&c| c == '>')
                    .map(|offset| i + offset)
                    .ok_or_else(|| malformed(expr, "unclosed `<name>`"))?,
            ),
            ']' => return Err(unbalanced(expr)),
            _ => None,
        };

        if let Some(end) = span_end {
            current.extend(&chars[i..=end]);
            i = end + 1;
            continue;
        }

        if c.is_whitespace() {
            flush(&mut current, &mut out);
        } else if OPERATORS.contains(&c) || matches!(c, '(' | ')' | ',') {
            flush(&mut current, &mut out);
            out.push(c.to_string());
        } else {
            current.push(c);
        }
        i += 1;
    }

    flush(&mut current, &mut out);
    Ok(out)
}

fn flush(current: &mut String, out: &mut Vec<String>) {
    if !current.is_empty() {
        out.push(std::mem::take(current));
    }
}

/// Index of the `"` closing the string literal opened at `open`
pub fn string_end(chars: &[char], open: usize) -> Option<usize> {
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate().skip(open + 1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Some(i);
        }
    }
    None
}

/// Index of the last character of the character literal opened at `open`
pub fn char_literal_end(chars: &[char], open: usize) -> Option<usize> {
    match chars.get(open + 1)? {
        '\\' => chars.get(open + 2).map(|_| open + 2),
        _ => Some(open + 1),
    }
}

/// Index of the `]` matching the `[` at `open`, skipping literals
pub fn matching_bracket(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '"' => i = string_end(chars, i)?,
            '\'' => i = char_literal_end(chars, i)?,
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split `text` at `separator` where it is not nested in brackets or literals
pub fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    let mut depth = 0usize;

    while i < chars.len() {
        match chars[i] {
            '"' => i = string_end(&chars, i).unwrap_or(chars.len()),
            '\'' => i = char_literal_end(&chars, i).unwrap_or(chars.len()),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                parts.push(chars[start..i].iter().collect());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(chars[start.min(chars.len())..].iter().collect());
    parts
}

/// Decode the body of a string literal (without its quotes)
pub fn unescape(body: &str, expr: &str) -> Result<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                return Err(malformed(expr, &format!("unknown escape `\\{}`", other)));
            }
            None => return Err(malformed(expr, "dangling `\\`")),
        }
    }
    Ok(out)
}

pub fn malformed(expr: &str, reason: &str) -> TurtleError {
    TurtleError::MalformedExpression {
        expr: expr.to_string(),
        reason: reason.to_string(),
    }
}

pub fn unbalanced(expr: &str) -> TurtleError {
    TurtleError::UnbalancedGrouping {
        expr: expr.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_brackets_atomic() {
        assert_eq!(
            split("a[i+1]*2").unwrap(),
            vec!["a[i+1]", "*", "2"]
        );
        assert_eq!(split("[1, 2] + x").unwrap(), vec!["[1, 2]", "+", "x"]);
    }

    #[test]
    fn test_split_literals() {
        assert_eq!(split("\"a+b\" = s").unwrap(), vec!["\"a+b\"", "=", "s"]);
        assert_eq!(split("'+ = c").unwrap(), vec!["'+", "=", "c"]);
        assert_eq!(split("obj.<key>+1").unwrap(), vec!["obj.<key>", "+", "1"]);
    }

    #[test]
    fn test_split_functions() {
        assert_eq!(
            split("pow(2, 3)").unwrap(),
            vec!["pow", "(", "2", ",", "3", ")"]
        );
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("1, [2, 3], f(4, 5), \"a,b\"", ','),
            vec!["1", " [2, 3]", " f(4, 5)", " \"a,b\""]
        );
    }

    #[test]
    fn test_stray_close_bracket() {
        assert!(matches!(
            split("a]"),
            Err(TurtleError::UnbalancedGrouping { .. })
        ));
    }
}
