//! Arithmetic/logic expressions
//!
//! An expression is compiled once into a [`Program`] and cached, then run on
//! a small value stack against whatever scope supplies its variables.
//!
//! | Precedence | Operators | Meaning |
//! |---|---|---|
//! | 7 | `!` `+` `-` (prefix) | not, identity, negation |
//! | 6 | `*` `/` `%` | |
//! | 5 | `+` `-` | `+` also concatenates arrays |
//! | 4 | `=` `<` `>` | `=` is deep equality |
//! | 3 | `&` | |
//! | 2 | `\|` | |
//! | 1 | `:` | `a:b` is the range `[a, b)` |

pub mod compile;
pub mod eval;
pub mod functions;
pub mod lex;

use std::sync::Arc;

pub use compile::{BinaryOp, Instruction, Program, UnaryOp, compile};
pub use functions::Function;

use crate::diagnostics::{Result, TurtleError};
use crate::interp::value::ParamType;

/// Source of variable values for an expression
pub trait VariableLookup {
    fn lookup(&self, path: &str) -> Result<ParamType>;
}

/// A scope with no variables, for constant expressions
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVariables;

impl VariableLookup for NoVariables {
    fn lookup(&self, path: &str) -> Result<ParamType> {
        Err(TurtleError::NonExistingVariable {
            name: path.to_string(),
        })
    }
}

/// Evaluate `expr` against `scope`
pub fn evaluate(expr: &str, scope: &dyn VariableLookup) -> Result<ParamType> {
    let program: Arc<Program> = compile(expr)?;
    eval::run(&program, scope)
}
