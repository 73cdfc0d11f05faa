//! Token definitions for the TurtleScript lexer

use serde::{Deserialize, Serialize};

use crate::common::Position;

/// Synthetic statement separator emitted for `\n` and `;`
pub const SEPARATOR: &str = "\n";
/// Block opening delimiter
pub const BLOCK_OPEN: &str = "{";
/// Block closing delimiter
pub const BLOCK_CLOSE: &str = "}";

/// A token with its text and the 1-based position of its first character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub value: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(value: impl Into<String>, position: Position) -> Self {
        Self {
            value: value.into(),
            line: position.line,
            column: position.column,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    pub fn is_separator(&self) -> bool {
        self.value == SEPARATOR
    }

    pub fn is_block_open(&self) -> bool {
        self.value == BLOCK_OPEN
    }

    pub fn is_block_close(&self) -> bool {
        self.value == BLOCK_CLOSE
    }

    /// Separators and block delimiters carry structure, not content
    pub fn is_structural(&self) -> bool {
        self.is_separator() || self.is_block_open() || self.is_block_close()
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_separator() {
            write!(f, "<separator>")
        } else {
            write!(f, "{}", self.value)
        }
    }
}
