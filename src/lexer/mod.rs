//! Lexer for TurtleScript source text
//!
//! A single left-to-right pass that splits source into whitespace-separated
//! tokens. Whitespace only separates tokens outside `(...)` and `[...]`, so
//! `a (b c)` yields `a` and `(b c)`. Newlines and `;` become a synthetic
//! separator token, and `{`/`}` at bracket depth 0 are emitted on their own
//! as block delimiters.

mod tokens;

pub use tokens::{BLOCK_CLOSE, BLOCK_OPEN, SEPARATOR, Token};

use crate::common::Position;
use crate::diagnostics::{Result, TurtleError};

/// Tokenize source text
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let raw = Lexer::new(source).run()?;
    let tokens = normalize(raw);
    tracing::trace!("Lexed {} tokens", tokens.len());
    Ok(tokens)
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    current: String,
    start: Position,
    /// Open `(` positions, innermost last
    parens: Vec<Position>,
    /// Open `[` positions, innermost last
    brackets: Vec<Position>,
    /// Open `{` positions at bracket depth 0
    braces: Vec<Position>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            current: String::new(),
            start: Position::start(),
            parens: Vec::new(),
            brackets: Vec::new(),
            braces: Vec::new(),
        }
    }

    /// Consume one character, returning it with its position
    fn bump(&mut self) -> Option<(char, Position)> {
        let c = *self.chars.get(self.pos)?;
        let at = Position::new(self.line, self.column);
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some((c, at))
    }

    fn grouped(&self) -> bool {
        !self.parens.is_empty() || !self.brackets.is_empty()
    }

    fn push_char(&mut self, c: char, at: Position) {
        if self.current.is_empty() {
            self.start = at;
        }
        self.current.push(c);
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            let value = std::mem::take(&mut self.current);
            self.tokens.push(Token::new(value, self.start));
        }
    }

    fn emit(&mut self, value: &str, at: Position) {
        self.flush();
        self.tokens.push(Token::new(value, at));
    }

    fn unclosed_group(&self) -> Option<TurtleError> {
        let paren = self.parens.last().map(|p| ('(', *p));
        let bracket = self.brackets.last().map(|p| ('[', *p));
        paren
            .or(bracket)
            .map(|(bracket, at)| TurtleError::UnclosedBracket {
                bracket,
                line: at.line,
                column: at.column,
            })
    }

    fn run(mut self) -> Result<Vec<Token>> {
        let mut string_start: Option<Position> = None;
        let mut escaped = false;
        let mut in_comment = false;

        while let Some((c, at)) = self.bump() {
            if in_comment {
                if c != '\n' {
                    continue;
                }
                in_comment = false;
            }

            if string_start.is_some() {
                self.push_char(c, at);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    string_start = None;
                }
                continue;
            }

            match c {
                '#' => {
                    if !self.grouped() {
                        self.flush();
                    }
                    in_comment = true;
                }
                '"' => {
                    string_start = Some(at);
                    self.push_char(c, at);
                }
                '\'' => {
                    // Character literal: the next character is taken verbatim
                    self.push_char(c, at);
                    if let Some((next, next_at)) = self.bump() {
                        self.push_char(next, next_at);
                        if next == '\\' {
                            if let Some((escape, escape_at)) = self.bump() {
                                self.push_char(escape, escape_at);
                            }
                        }
                    }
                }
                ' ' | '\t' | '\r' => {
                    if self.grouped() {
                        self.push_char(c, at);
                    } else {
                        self.flush();
                    }
                }
                '\n' | ';' => {
                    if let Some(err) = self.unclosed_group() {
                        return Err(err);
                    }
                    self.emit(SEPARATOR, at);
                }
                '{' | '}' if !self.grouped() => {
                    if c == '{' {
                        self.braces.push(at);
                    } else if self.braces.pop().is_none() {
                        return Err(TurtleError::ExcessBracket {
                            bracket: '}',
                            line: at.line,
                            column: at.column,
                        });
                    }
                    let delimiter = if c == '{' { BLOCK_OPEN } else { BLOCK_CLOSE };
                    self.emit(delimiter, at);
                }
                '(' => {
                    self.parens.push(at);
                    self.push_char(c, at);
                }
                '[' => {
                    self.brackets.push(at);
                    self.push_char(c, at);
                }
                ')' | ']' => {
                    let stack = if c == ')' {
                        &mut self.parens
                    } else {
                        &mut self.brackets
                    };
                    if stack.pop().is_none() {
                        return Err(TurtleError::ExcessBracket {
                            bracket: c,
                            line: at.line,
                            column: at.column,
                        });
                    }
                    self.push_char(c, at);
                }
                _ => self.push_char(c, at),
            }
        }

        if let Some(at) = string_start {
            return Err(TurtleError::UnterminatedString {
                line: at.line,
                column: at.column,
            });
        }
        if let Some(err) = self.unclosed_group() {
            return Err(err);
        }
        if let Some(at) = self.braces.last() {
            return Err(TurtleError::UnclosedBracket {
                bracket: '{',
                line: at.line,
                column: at.column,
            });
        }

        self.flush();
        Ok(self.tokens)
    }
}

/// Drop empty tokens, collapse runs of separators and strip a trailing one
fn normalize(raw: Vec<Token>) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::with_capacity(raw.len());
    for token in raw {
        if token.value.is_empty() {
            continue;
        }
        if token.is_separator() && tokens.last().is_some_and(Token::is_separator) {
            continue;
        }
        tokens.push(token);
    }
    if tokens.last().is_some_and(Token::is_separator) {
        tokens.pop();
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_separators() {
        let at = Position::start();
        let raw = vec![
            Token::new("a", at),
            Token::new(SEPARATOR, at),
            Token::new(SEPARATOR, at),
            Token::new("", at),
            Token::new("b", at),
            Token::new(SEPARATOR, at),
        ];
        let values: Vec<_> = normalize(raw).into_iter().map(|t| t.value).collect();
        assert_eq!(values, vec!["a", "\n", "b"]);
    }
}
