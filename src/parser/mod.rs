//! Parser for TurtleScript
//!
//! A recursive descent parser over the flat token stream. Every statement is
//! a label followed by raw arguments; `{ ... }` opens a nested block that is
//! attached as the last argument of the statement being built.

use std::rc::Rc;

use crate::ast::*;
use crate::common::{Position, is_identifier};
use crate::diagnostics::{Result, TurtleError};
use crate::lexer::Token;

/// Return-binding operator
const BIND: &str = ":=";
/// Prefix that makes a return binding create its target
const NEW: &str = "new";

/// Parse a token stream into a command tree
pub fn parse(tokens: &[Token]) -> Result<Commands> {
    let mut parser = Parser::new(tokens);
    let commands = parser.parse_level(None)?;
    tracing::trace!("Parsed {} top-level statement(s)", commands.len());
    Ok(commands)
}

/// Parser state
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok)
    }

    /// Look `n` tokens past the current position without consuming
    fn peek_n(&self, n: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + n)
    }

    fn peek_is(&self, n: usize, value: &str) -> bool {
        self.peek_n(n).is_some_and(|t| t.value == value)
    }

    // ==================== BLOCKS ====================

    /// Parse statements until the matching `}` (or end of input at top level).
    ///
    /// `opened_at` is the position of the `{` that opened this level.
    fn parse_level(&mut self, opened_at: Option<Position>) -> Result<Commands> {
        let mut commands = Commands::new();
        let mut pending: Option<Command> = None;

        while let Some(token) = self.advance() {
            if token.is_block_open() {
                let block = self.parse_level(Some(token.position()))?;
                match pending.as_mut() {
                    Some(cmd) => cmd.arguments.push(Argument::Block(Rc::new(block))),
                    // Anonymous block: its statements belong to this level
                    None => commands.extend(block),
                }
            } else if token.is_block_close() {
                if opened_at.is_none() {
                    return Err(TurtleError::UnmatchedBlock {
                        line: token.line,
                        column: token.column,
                    });
                }
                commands.extend(pending.take());
                return Ok(commands);
            } else if token.is_separator() {
                commands.extend(pending.take());
            } else if let Some(cmd) = pending.as_mut() {
                cmd.arguments.push(Argument::Text(token.value.clone()));
            } else {
                pending = Some(self.start_command(token)?);
            }
        }

        if let Some(at) = opened_at {
            return Err(TurtleError::UnmatchedBlock {
                line: at.line,
                column: at.column,
            });
        }

        commands.extend(pending.take());
        Ok(commands)
    }

    // ==================== STATEMENTS ====================

    /// Begin a statement at `first`, consuming an optional `[new] NAME :=` prefix
    fn start_command(&mut self, first: &'a Token) -> Result<Command> {
        let creates = first.value == NEW && self.peek_is(1, BIND);
        let name = if creates {
            self.peek_n(0)
        } else if self.peek_is(0, BIND) {
            Some(first)
        } else {
            None
        };

        let Some(name) = name else {
            return Ok(Command::new(first.value.clone(), first.position()));
        };

        if !is_identifier(&name.value) {
            return Err(malformed_binding(name));
        }
        // Skip the name (when `new` came first) and the `:=`
        self.pos += if creates { 2 } else { 1 };

        let label = match self.advance() {
            Some(label) if !label.is_structural() => label,
            Some(other) => return Err(malformed_binding(other)),
            None => {
                return Err(TurtleError::MalformedReturnBinding {
                    found: BIND.to_string(),
                    line: first.line,
                    column: first.column,
                });
            }
        };

        let mut cmd = Command::new(label.value.clone(), first.position());
        cmd.return_variable = Some(name.value.clone());
        cmd.creates_new_return_var = creates;
        Ok(cmd)
    }
}

fn malformed_binding(token: &Token) -> TurtleError {
    TurtleError::MalformedReturnBinding {
        found: token.to_string(),
        line: token.line,
        column: token.column,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_source(source: &str) -> Commands {
        parse(&tokenize(source).unwrap()).unwrap()
    }

    #[test]
    fn test_binding_prefix() {
        let cmds = parse_source("new r := square 4");
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].label, "square");
        assert_eq!(cmds[0].return_variable.as_deref(), Some("r"));
        assert!(cmds[0].creates_new_return_var);
        assert_eq!(cmds[0].arguments, vec![Argument::Text("4".into())]);
    }

    #[test]
    fn test_new_without_binding_is_a_command() {
        let cmds = parse_source("new x 5");
        assert_eq!(cmds[0].label, "new");
        assert_eq!(cmds[0].return_variable, None);
        assert_eq!(cmds[0].arguments.len(), 2);
    }
}
