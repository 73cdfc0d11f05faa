//! TurtleScript interpreter core
//!
//! A small procedural, Logo-style language:
//! - Whitespace-separated commands with `{ ... }` blocks
//! - Operator-precedence expressions compiled once and cached
//! - Nested array/object data addressed by `.field` and `[index]` paths
//! - User procedures via `learn`, with early `return`
//! - Side effects published as messages for a host to render
//!
//! # Architecture
//!
//! ```text
//! Source → Lexer → Parser → Commands → Interpreter ─→ Bus
//!                                         │
//!                      Expressions ← Argument Validator → Memory
//! ```
//!
//! # Example
//!
//! ```text
//! learn square size {
//!     rep 4 { fd size; rt 90 }
//! }
//! rep k 6 { square 10*k; rt 60 }
//! ```

pub mod ast;
pub mod common;
pub mod config;
pub mod diagnostics;
pub mod expr;
pub mod interp;
pub mod lexer;
pub mod parser;

// Re-export diagnostics for convenience
pub use diagnostics::{ErrorKind, Result, TurtleError};

// Re-exports for convenience
pub use ast::{Argument, Command, Commands};
pub use config::Config;
pub use interp::{Interpreter, Memory, ParamType, StructuredMemoryData};
pub use lexer::Token;

/// Interpreter version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Split source text into tokens
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    lexer::tokenize(source)
}

/// Parse source text into a command tree
pub fn parse(source: &str) -> Result<Commands> {
    let tokens = lexer::tokenize(source)?;
    parser::parse(&tokens)
}

/// Evaluate an expression against a scope
pub fn evaluate(expr: &str, scope: &Memory) -> Result<ParamType> {
    expr::evaluate(expr, scope)
}

/// Run a program with default settings and no host collaborators
pub async fn execute(source: &str) -> Result<()> {
    Interpreter::new().execute(source).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
