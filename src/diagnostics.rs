//! Diagnostic reporting for the interpreter core
//!
//! Every failure the core can raise is a variant of [`TurtleError`]. The
//! variants carry a `miette` diagnostic code whose prefix names the stage
//! that produced them, so hosts can render them with `miette::Report` or
//! branch on [`TurtleError::kind`].

use miette::Diagnostic;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T, E = TurtleError> = std::result::Result<T, E>;

/// Broad error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bracket/brace mismatch or unterminated literal in source text
    Lexical,
    /// Malformed return binding or unmatched block
    Parse,
    /// Operator/function type mismatch, unbalanced grouping
    Expression,
    /// Unresolvable or read-only variable
    Variable,
    /// Arity or category violation
    Argument,
    /// Malformed branch chain, recursion limit, unknown command
    ControlFlow,
    /// Raised by a host hook
    Host,
    /// Invalid configuration
    Config,
}

/// Interpreter diagnostic
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum TurtleError {
    // === Lexical Errors ===
    #[error("Unclosed `{bracket}` at line {line}, char {column}")]
    #[diagnostic(
        code(lex::unclosed_bracket),
        help("statement separators are not allowed inside `(...)` or `[...]`")
    )]
    UnclosedBracket {
        bracket: char,
        line: usize,
        column: usize,
    },

    #[error("Excess `{bracket}` at line {line}, char {column}")]
    #[diagnostic(code(lex::excess_bracket))]
    ExcessBracket {
        bracket: char,
        line: usize,
        column: usize,
    },

    #[error("Unterminated string literal starting at line {line}, char {column}")]
    #[diagnostic(code(lex::unterminated_string))]
    UnterminatedString { line: usize, column: usize },

    // === Parse Errors ===
    #[error("Malformed return binding near `{found}` at line {line}, char {column}")]
    #[diagnostic(
        code(parse::malformed_return_binding),
        help("write `name := command ...` or `new name := command ...`")
    )]
    MalformedReturnBinding {
        found: String,
        line: usize,
        column: usize,
    },

    #[error("Unmatched block delimiter at line {line}, char {column}")]
    #[diagnostic(code(parse::unmatched_block))]
    UnmatchedBlock { line: usize, column: usize },

    // === Expression Errors ===
    #[error("Operator `{op}` expects {expected}, found {found}")]
    #[diagnostic(code(expr::type_mismatch))]
    TypeMismatch {
        op: String,
        expected: String,
        found: String,
    },

    #[error("Unbalanced grouping in `{expr}`")]
    #[diagnostic(code(expr::unbalanced_grouping))]
    UnbalancedGrouping { expr: String },

    #[error("Malformed expression `{expr}`: {reason}")]
    #[diagnostic(code(expr::malformed))]
    MalformedExpression { expr: String, reason: String },

    #[error("Unknown function `{name}`")]
    #[diagnostic(code(expr::unknown_function))]
    UnknownFunction { name: String },

    #[error("Function `{name}` expects {expected} argument(s), got {got}")]
    #[diagnostic(code(expr::function_arity))]
    FunctionArity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Division by zero")]
    #[diagnostic(code(expr::division_by_zero))]
    DivisionByZero,

    #[error("Literal `{literal}` mixes `key: value` entries with bare elements")]
    #[diagnostic(
        code(expr::mixed_literal),
        help("a literal is either an array `[1, 2]` or an object `[a: 1, b: 2]`")
    )]
    MixedLiteral { literal: String },

    // === Variable Errors ===
    #[error("Variable `{name}` does not exist")]
    #[diagnostic(
        code(var::non_existing),
        help("did you mean to declare this variable with `new`?")
    )]
    NonExistingVariable { name: String },

    #[error("Variable `{name}` is a read-only parameter")]
    #[diagnostic(code(var::read_only))]
    ReadOnlyVariable { name: String },

    #[error("Invalid path `{path}`: {reason}")]
    #[diagnostic(code(var::invalid_path))]
    InvalidPath { path: String, reason: String },

    // === Argument Errors ===
    #[error("`{command}` expects {expected} argument(s), got {got}")]
    #[diagnostic(code(arg::count))]
    ArgumentCount {
        command: String,
        expected: String,
        got: usize,
    },

    #[error("Argument {index} of `{command}` must be {permitted}, found {found}")]
    #[diagnostic(code(arg::category))]
    ArgumentCategory {
        command: String,
        index: usize,
        permitted: String,
        found: String,
    },

    // === Control Flow Errors ===
    #[error("Malformed branch: {reason}")]
    #[diagnostic(code(flow::malformed_branch))]
    MalformedBranch { reason: String },

    #[error("Nested invocation depth exceeded the limit of {limit}")]
    #[diagnostic(
        code(flow::recursion_limit),
        help("raise `max_call_depth` in the interpreter configuration")
    )]
    RecursionLimit { limit: usize },

    #[error("Unknown command `{label}`")]
    #[diagnostic(code(flow::unknown_command))]
    UnknownCommand { label: String },

    #[error("`{command}` produced no value")]
    #[diagnostic(code(flow::missing_value))]
    MissingValue { command: String },

    #[error("Code block outlived the scope that defined it")]
    #[diagnostic(code(flow::scope_expired))]
    ScopeExpired,

    // === Host Errors ===
    #[error("Aborted by host: {message}")]
    #[diagnostic(code(host::aborted))]
    Host { message: String },

    // === Configuration Errors ===
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(config::invalid))]
    InvalidConfig { message: String },

    // === Context ===
    #[error("line {line}: {source}")]
    #[diagnostic(code(exec::at_line))]
    AtLine {
        line: usize,
        source: Box<TurtleError>,
    },
}

impl TurtleError {
    /// Convenience constructor for host hooks that want to abort a session
    pub fn host(message: impl Into<String>) -> Self {
        TurtleError::Host {
            message: message.into(),
        }
    }

    /// Attach the originating source line.
    ///
    /// An error that already carries a line keeps it.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            TurtleError::AtLine { .. } => self,
            other => TurtleError::AtLine {
                line,
                source: Box::new(other),
            },
        }
    }

    /// The originating line, if the executor attached one
    pub fn line(&self) -> Option<usize> {
        match self {
            TurtleError::AtLine { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// The error without line context
    pub fn root(&self) -> &TurtleError {
        match self {
            TurtleError::AtLine { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TurtleError::UnclosedBracket { .. }
            | TurtleError::ExcessBracket { .. }
            | TurtleError::UnterminatedString { .. } => ErrorKind::Lexical,
            TurtleError::MalformedReturnBinding { .. } | TurtleError::UnmatchedBlock { .. } => {
                ErrorKind::Parse
            }
            TurtleError::TypeMismatch { .. }
            | TurtleError::UnbalancedGrouping { .. }
            | TurtleError::MalformedExpression { .. }
            | TurtleError::UnknownFunction { .. }
            | TurtleError::FunctionArity { .. }
            | TurtleError::DivisionByZero
            | TurtleError::MixedLiteral { .. } => ErrorKind::Expression,
            TurtleError::NonExistingVariable { .. }
            | TurtleError::ReadOnlyVariable { .. }
            | TurtleError::InvalidPath { .. } => ErrorKind::Variable,
            TurtleError::ArgumentCount { .. } | TurtleError::ArgumentCategory { .. } => {
                ErrorKind::Argument
            }
            TurtleError::MalformedBranch { .. }
            | TurtleError::RecursionLimit { .. }
            | TurtleError::UnknownCommand { .. }
            | TurtleError::MissingValue { .. }
            | TurtleError::ScopeExpired => ErrorKind::ControlFlow,
            TurtleError::Host { .. } => ErrorKind::Host,
            TurtleError::InvalidConfig { .. } => ErrorKind::Config,
            TurtleError::AtLine { source, .. } => source.kind(),
        }
    }
}
