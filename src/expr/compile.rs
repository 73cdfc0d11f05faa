//! Expression compiler
//!
//! Text is split into lexemes, reordered into Polish (prefix) notation with
//! a right-to-left shunting-yard pass, validated by simulating the value
//! stack, and stored as a flat [`Program`]. Compiled programs are cached for
//! the lifetime of the process, keyed by the exact expression text.

use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use super::functions::{self, Function};
use super::lex::{self, malformed, unbalanced};
use crate::common::{is_ident_start, is_identifier};
use crate::diagnostics::{Result, TurtleError};

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Range,
    Or,
    And,
    Eq,
    Lt,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Prefix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Plus,
    Neg,
}

/// Binding strength of prefix operators
const UNARY_PRECEDENCE: u8 = 7;

impl BinaryOp {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            ':' => BinaryOp::Range,
            '|' => BinaryOp::Or,
            '&' => BinaryOp::And,
            '=' => BinaryOp::Eq,
            '<' => BinaryOp::Lt,
            '>' => BinaryOp::Gt,
            '+' => BinaryOp::Add,
            '-' => BinaryOp::Sub,
            '*' => BinaryOp::Mul,
            '/' => BinaryOp::Div,
            '%' => BinaryOp::Rem,
            _ => return None,
        })
    }

    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Range => 1,
            BinaryOp::Or => 2,
            BinaryOp::And => 3,
            BinaryOp::Eq | BinaryOp::Lt | BinaryOp::Gt => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 6,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            BinaryOp::Range => ':',
            BinaryOp::Or => '|',
            BinaryOp::And => '&',
            BinaryOp::Eq => '=',
            BinaryOp::Lt => '<',
            BinaryOp::Gt => '>',
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
            BinaryOp::Rem => '%',
        }
    }
}

impl UnaryOp {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '!' => Some(UnaryOp::Not),
            '+' => Some(UnaryOp::Plus),
            '-' => Some(UnaryOp::Neg),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            UnaryOp::Not => '!',
            UnaryOp::Plus => '+',
            UnaryOp::Neg => '-',
        }
    }
}

/// One step of a compiled program
#[derive(Debug, Clone)]
pub enum Instruction {
    Number(f64),
    /// Decoded string or character literal
    Text(String),
    /// Variable path, resolved at evaluation time
    Load(String),
    /// Array literal; each element is a sub-expression
    Array(Vec<String>),
    /// Object literal as `(key, sub-expression)` pairs
    Object(Vec<(String, String)>),
    Unary(UnaryOp),
    Binary(BinaryOp),
    Call(&'static Function),
}

impl Instruction {
    /// (values consumed, values produced)
    fn stack_effect(&self) -> (usize, usize) {
        match self {
            Instruction::Unary(_) => (1, 1),
            Instruction::Binary(_) => (2, 1),
            Instruction::Call(f) => (f.arity, 1),
            _ => (0, 1),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Number(n) => write!(f, "{}", n),
            Instruction::Text(s) => write!(f, "{:?}", s),
            Instruction::Load(path) => write!(f, "{}", path),
            Instruction::Array(items) => write!(f, "[{}]", items.join(", ")),
            Instruction::Object(entries) => {
                write!(f, "[")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "]")
            }
            Instruction::Unary(op) => write!(f, "{}u", op.symbol()),
            Instruction::Binary(op) => write!(f, "{}", op.symbol()),
            Instruction::Call(func) => write!(f, "{}/{}", func.name, func.arity),
        }
    }
}

/// A compiled expression in Polish order
#[derive(Debug)]
pub struct Program {
    source: String,
    instructions: Vec<Instruction>,
}

impl Program {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Instructions in Polish order; evaluation walks them back to front
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Compile without touching the cache
    pub fn compile(expr: &str) -> Result<Self> {
        let lexemes = classify(expr, lex::split(expr)?)?;
        let polish = to_polish(expr, lexemes)?;
        let instructions = polish
            .into_iter()
            .map(|lexeme| lower(expr, lexeme))
            .collect::<Result<Vec<_>>>()?;
        check_stack(expr, &instructions)?;
        Ok(Program {
            source: expr.to_string(),
            instructions,
        })
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instr) in self.instructions.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", instr)?;
        }
        Ok(())
    }
}

// ==================== CACHE ====================

static CACHE: LazyLock<DashMap<String, Arc<Program>>> = LazyLock::new(DashMap::new);

/// Compile `expr`, reusing an earlier compilation of the same text.
///
/// Concurrent first compilations may race; the first one stored wins and
/// every caller gets that instance.
pub fn compile(expr: &str) -> Result<Arc<Program>> {
    if let Some(program) = CACHE.get(expr) {
        return Ok(Arc::clone(&program));
    }
    tracing::trace!(expr, "compiling expression");
    let program = Arc::new(Program::compile(expr)?);
    Ok(Arc::clone(
        CACHE.entry(expr.to_string()).or_insert(program).value(),
    ))
}

// ==================== LEXEMES ====================

#[derive(Debug)]
enum Lexeme {
    Operand(String),
    Function(&'static Function),
    Unary(UnaryOp),
    Binary(BinaryOp),
    Open,
    Close,
    Comma,
}

impl Lexeme {
    /// True if the lexeme ends a value, so a following operator is binary
    fn ends_value(&self) -> bool {
        matches!(self, Lexeme::Operand(_) | Lexeme::Close)
    }
}

fn classify(expr: &str, raw: Vec<String>) -> Result<Vec<Lexeme>> {
    let mut lexemes: Vec<Lexeme> = Vec::with_capacity(raw.len());

    for (i, atom) in raw.iter().enumerate() {
        let after_value = lexemes.last().is_some_and(Lexeme::ends_value);
        let mut chars = atom.chars();
        let single = match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        };

        let lexeme = match single {
            Some('(') => Lexeme::Open,
            Some(')') => Lexeme::Close,
            Some(',') => Lexeme::Comma,
            Some(c) if lex::OPERATORS.contains(&c) => {
                if after_value {
                    BinaryOp::from_char(c).map(Lexeme::Binary).ok_or_else(|| {
                        malformed(expr, &format!("`{}` cannot follow a value", c))
                    })?
                } else {
                    UnaryOp::from_char(c).map(Lexeme::Unary).ok_or_else(|| {
                        malformed(expr, &format!("`{}` is missing its left operand", c))
                    })?
                }
            }
            _ if raw.get(i + 1).is_some_and(|next| next == "(") && is_identifier(atom) => {
                functions::lookup(atom)
                    .map(Lexeme::Function)
                    .ok_or_else(|| TurtleError::UnknownFunction { name: atom.clone() })?
            }
            _ => Lexeme::Operand(atom.clone()),
        };

        let starts_value = matches!(
            lexeme,
            Lexeme::Operand(_) | Lexeme::Function(_) | Lexeme::Unary(_) | Lexeme::Open
        );
        if after_value && starts_value {
            return Err(malformed(expr, &format!("missing operator before `{}`", atom)));
        }
        lexemes.push(lexeme);
    }
    Ok(lexemes)
}

// ==================== SHUNTING YARD ====================

enum Pending {
    Unary(UnaryOp),
    Binary(BinaryOp),
    /// An open group (a `)` seen while walking backwards)
    Group { commas: usize, output_len: usize },
}

impl Pending {
    fn precedence(&self) -> Option<u8> {
        match self {
            Pending::Unary(_) => Some(UNARY_PRECEDENCE),
            Pending::Binary(op) => Some(op.precedence()),
            Pending::Group { .. } => None,
        }
    }

    fn into_lexeme(self) -> Option<Lexeme> {
        match self {
            Pending::Unary(op) => Some(Lexeme::Unary(op)),
            Pending::Binary(op) => Some(Lexeme::Binary(op)),
            Pending::Group { .. } => None,
        }
    }
}

/// Reorder lexemes into Polish notation.
///
/// Walking the input backwards with parentheses swapped and popping only
/// strictly stronger operators yields a reversed prefix form in which equal
/// precedence binary operators still group left to right.
fn to_polish(expr: &str, lexemes: Vec<Lexeme>) -> Result<Vec<Lexeme>> {
    let mut output: Vec<Lexeme> = Vec::with_capacity(lexemes.len());
    let mut stack: Vec<Pending> = Vec::new();
    let mut input = lexemes.into_iter().rev().peekable();

    while let Some(lexeme) = input.next() {
        match lexeme {
            Lexeme::Operand(_) => output.push(lexeme),
            Lexeme::Unary(op) => stack.push(Pending::Unary(op)),
            Lexeme::Binary(op) => {
                while stack
                    .last()
                    .and_then(Pending::precedence)
                    .is_some_and(|p| p > op.precedence())
                {
                    output.extend(stack.pop().and_then(Pending::into_lexeme));
                }
                stack.push(Pending::Binary(op));
            }
            Lexeme::Close => stack.push(Pending::Group {
                commas: 0,
                output_len: output.len(),
            }),
            Lexeme::Comma => {
                pop_to_group(expr, &mut stack, &mut output)?;
                match stack.last_mut() {
                    Some(Pending::Group { commas, .. }) => *commas += 1,
                    _ => return Err(malformed(expr, "`,` outside a function call")),
                }
            }
            Lexeme::Open => {
                pop_to_group(expr, &mut stack, &mut output)?;
                let Some(Pending::Group { commas, output_len }) = stack.pop() else {
                    return Err(unbalanced(expr));
                };
                let empty = output.len() == output_len && commas == 0;
                let args = if empty { 0 } else { commas + 1 };

                if let Some(Lexeme::Function(func)) = input.peek() {
                    let func = *func;
                    input.next();
                    if func.arity != args {
                        return Err(TurtleError::FunctionArity {
                            name: func.name.to_string(),
                            expected: func.arity,
                            got: args,
                        });
                    }
                    output.push(Lexeme::Function(func));
                } else if commas > 0 {
                    return Err(malformed(expr, "`,` outside a function call"));
                } else if empty {
                    return Err(malformed(expr, "empty parentheses"));
                }
            }
            Lexeme::Function(func) => {
                return Err(malformed(expr, &format!("`{}` must be called", func.name)));
            }
        }
    }

    while let Some(pending) = stack.pop() {
        match pending.into_lexeme() {
            Some(lexeme) => output.push(lexeme),
            None => return Err(unbalanced(expr)),
        }
    }

    output.reverse();
    Ok(output)
}

/// Move operators to the output until the innermost open group
fn pop_to_group(expr: &str, stack: &mut Vec<Pending>, output: &mut Vec<Lexeme>) -> Result<()> {
    loop {
        match stack.last() {
            Some(Pending::Group { .. }) => return Ok(()),
            Some(_) => output.extend(stack.pop().and_then(Pending::into_lexeme)),
            None => return Err(unbalanced(expr)),
        }
    }
}

// ==================== LOWERING ====================

fn lower(expr: &str, lexeme: Lexeme) -> Result<Instruction> {
    match lexeme {
        Lexeme::Operand(atom) => operand(expr, &atom),
        Lexeme::Unary(op) => Ok(Instruction::Unary(op)),
        Lexeme::Binary(op) => Ok(Instruction::Binary(op)),
        Lexeme::Function(func) => Ok(Instruction::Call(func)),
        Lexeme::Open | Lexeme::Close | Lexeme::Comma => Err(unbalanced(expr)),
    }
}

fn operand(expr: &str, atom: &str) -> Result<Instruction> {
    let chars: Vec<char> = atom.chars().collect();
    let last = chars.len().saturating_sub(1);
    match chars.first() {
        Some('"') => {
            if lex::string_end(&chars, 0) != Some(last) || last == 0 {
                return Err(malformed(expr, &format!("unexpected text after `{}`", atom)));
            }
            let body: String = chars[1..last].iter().collect();
            Ok(Instruction::Text(lex::unescape(&body, expr)?))
        }
        Some('\'') => {
            if lex::char_literal_end(&chars, 0) != Some(last) {
                return Err(malformed(expr, &format!("unexpected text after `{}`", atom)));
            }
            let body: String = chars[1..].iter().collect();
            Ok(Instruction::Text(lex::unescape(&body, expr)?))
        }
        Some('[') => {
            if lex::matching_bracket(&chars, 0) != Some(last) {
                return Err(malformed(expr, &format!("unexpected text after `{}`", atom)));
            }
            let body: String = chars[1..last].iter().collect();
            literal(expr, atom, &body)
        }
        Some(c) if c.is_ascii_digit() || *c == '.' => atom
            .parse::<f64>()
            .map(Instruction::Number)
            .map_err(|_| malformed(expr, &format!("`{}` is not a number", atom))),
        Some(c) if is_ident_start(*c) => Ok(Instruction::Load(atom.to_string())),
        _ => Err(malformed(expr, &format!("unexpected `{}`", atom))),
    }
}

/// Lower the body of a `[...]` literal
fn literal(expr: &str, atom: &str, body: &str) -> Result<Instruction> {
    if body.trim().is_empty() {
        return Ok(Instruction::Array(Vec::new()));
    }

    let mut elements = Vec::new();
    let mut entries = Vec::new();
    for element in lex::split_top_level(body, ',') {
        let element = element.trim();
        if element.is_empty() {
            return Err(malformed(expr, &format!("empty element in `{}`", atom)));
        }
        match entry(expr, element)? {
            Some(pair) => entries.push(pair),
            None => elements.push(element.to_string()),
        }
    }

    match (elements.is_empty(), entries.is_empty()) {
        (false, false) => Err(TurtleError::MixedLiteral {
            literal: atom.to_string(),
        }),
        (true, false) => Ok(Instruction::Object(entries)),
        _ => Ok(Instruction::Array(elements)),
    }
}

/// Split `key: value` when the text before the first top-level `:` is a key
fn entry(expr: &str, element: &str) -> Result<Option<(String, String)>> {
    let parts = lex::split_top_level(element, ':');
    if parts.len() < 2 {
        return Ok(None);
    }
    let key = parts[0].trim();
    let value = parts[1..].join(":");

    let key = if is_identifier(key) {
        key.to_string()
    } else if key.len() >= 2 && key.starts_with('"') && key.ends_with('"') {
        lex::unescape(&key[1..key.len() - 1], expr)?
    } else {
        return Ok(None);
    };
    Ok(Some((key, value.trim().to_string())))
}

/// Simulate the value stack; a well-formed program leaves exactly one value
fn check_stack(expr: &str, instructions: &[Instruction]) -> Result<()> {
    let mut depth = 0usize;
    for instr in instructions.iter().rev() {
        let (consumed, produced) = instr.stack_effect();
        depth = depth
            .checked_sub(consumed)
            .ok_or_else(|| malformed(expr, &format!("`{}` is missing an operand", instr)))?;
        depth += produced;
    }
    match depth {
        1 => Ok(()),
        0 => Err(malformed(expr, "empty expression")),
        _ => Err(malformed(expr, "missing operator")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polish(expr: &str) -> String {
        Program::compile(expr).unwrap().to_string()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(polish("3+4*2"), "+ 3 * 4 2");
        assert_eq!(polish("(3+4)*2"), "* + 3 4 2");
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(polish("10-4-3"), "- - 10 4 3");
        assert_eq!(polish("8/4/2"), "/ / 8 4 2");
    }

    #[test]
    fn test_unary() {
        assert_eq!(polish("!!4"), "!u !u 4");
        assert_eq!(polish("-a-b"), "- -u a b");
        assert_eq!(polish("a*-b"), "* a -u b");
    }

    #[test]
    fn test_function_call() {
        assert_eq!(polish("pow(2, 1+2)"), "pow/2 2 + 1 2");
        assert_eq!(polish("max(1, min(2, 3))"), "max/2 1 min/2 2 3");
    }

    #[test]
    fn test_function_arity() {
        assert!(matches!(
            Program::compile("pow(2)"),
            Err(TurtleError::FunctionArity { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn test_malformed() {
        for bad in ["", "1 2", "3+", "*3", "(1", "1)", "()", "(1, 2)"] {
            assert!(Program::compile(bad).is_err(), "{:?} should fail", bad);
        }
    }

    #[test]
    fn test_literals() {
        assert!(matches!(
            Program::compile("[a: 1, b: 2]").unwrap().instructions(),
            [Instruction::Object(entries)] if entries.len() == 2
        ));
        assert!(matches!(
            Program::compile("[0:3, 5]").unwrap().instructions(),
            [Instruction::Array(items)] if items.len() == 2
        ));
        assert!(matches!(
            Program::compile("[a: 1, 2]"),
            Err(TurtleError::MixedLiteral { .. })
        ));
    }
}
