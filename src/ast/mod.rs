//! Statement tree produced by the parser
//!
//! A program is a sequence of [`Command`]s. Arguments are either raw text
//! (classified later, at execution time) or a nested block of commands.
//! The tree is built once and then only read, e.g. once per loop iteration.

use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::common::Position;

/// An ordered sequence of statements
pub type Commands = Vec<Command>;

/// A nested block shared between the tree and the code values built from it
pub type Block = Rc<Commands>;

/// A single command argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    /// Raw argument text, e.g. `10`, `x*2`, `[1, 2]`
    Text(String),
    /// A `{ ... }` block
    Block(Block),
}

impl Argument {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Argument::Text(s) => Some(s),
            Argument::Block(_) => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Argument::Block(b) => Some(b),
            Argument::Text(_) => None,
        }
    }
}

/// One statement: a label followed by its arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub label: String,
    pub arguments: Vec<Argument>,
    /// Target of a `name := ...` binding
    pub return_variable: Option<String>,
    /// `new name := ...` creates the target instead of rebinding it
    pub creates_new_return_var: bool,
    pub line: usize,
    pub column: usize,
}

impl Command {
    pub fn new(label: impl Into<String>, position: Position) -> Self {
        Self {
            label: label.into(),
            arguments: Vec::new(),
            return_variable: None,
            creates_new_return_var: false,
            line: position.line,
            column: position.column,
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Argument>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// Number of nested blocks among the arguments
    pub fn block_count(&self) -> usize {
        self.arguments
            .iter()
            .filter(|a| matches!(a, Argument::Block(_)))
            .count()
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(var) = &self.return_variable {
            if self.creates_new_return_var {
                write!(f, "new ")?;
            }
            write!(f, "{} := ", var)?;
        }
        write!(f, "{}", self.label)?;
        for arg in &self.arguments {
            match arg {
                Argument::Text(s) => write!(f, " {}", s)?,
                Argument::Block(b) => write!(f, " {{ {} command(s) }}", b.len())?,
            }
        }
        Ok(())
    }
}
