//! Stack machine for compiled expressions

use indexmap::IndexMap;

use super::compile::{BinaryOp, Instruction, Program, UnaryOp};
use super::{VariableLookup, evaluate};
use crate::diagnostics::{Result, TurtleError};
use crate::interp::value::{ParamType, StructuredMemoryData};

/// Longest array a `a:b` range may produce
const MAX_RANGE: f64 = 1_000_000.0;

/// Run a program against `scope`.
///
/// Instructions are consumed back to front; an operator pops its left
/// operand first.
pub fn run(program: &Program, scope: &dyn VariableLookup) -> Result<ParamType> {
    let mut stack: Vec<ParamType> = Vec::new();

    for instr in program.instructions().iter().rev() {
        let value = match instr {
            Instruction::Number(n) => ParamType::Number(*n),
            Instruction::Text(s) => ParamType::text(s),
            Instruction::Load(path) => scope.lookup(path)?,
            Instruction::Array(elements) => ParamType::array(
                elements
                    .iter()
                    .map(|element| evaluate(element, scope))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Instruction::Object(entries) => {
                let mut fields = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    fields.insert(key.clone(), evaluate(value, scope)?);
                }
                ParamType::Data(StructuredMemoryData::Object(fields))
            }
            Instruction::Unary(op) => {
                let operand = pop(&mut stack, program)?;
                unary(*op, operand)?
            }
            Instruction::Binary(op) => {
                let lhs = pop(&mut stack, program)?;
                let rhs = pop(&mut stack, program)?;
                binary(*op, lhs, rhs)?
            }
            Instruction::Call(func) => {
                let mut args = Vec::with_capacity(func.arity);
                for _ in 0..func.arity {
                    args.push(pop(&mut stack, program)?);
                }
                (func.func)(&args)?
            }
        };
        stack.push(value);
    }

    let result = pop(&mut stack, program)?;
    if !stack.is_empty() {
        return Err(super::lex::malformed(program.source(), "missing operator"));
    }
    Ok(result)
}

fn pop(stack: &mut Vec<ParamType>, program: &Program) -> Result<ParamType> {
    stack
        .pop()
        .ok_or_else(|| super::lex::malformed(program.source(), "missing operand"))
}

fn unary(op: UnaryOp, operand: ParamType) -> Result<ParamType> {
    match (op, operand) {
        (UnaryOp::Not, value) => Ok(ParamType::bool(!value.is_truthy())),
        (UnaryOp::Plus, ParamType::Number(n)) => Ok(ParamType::Number(n)),
        (UnaryOp::Neg, ParamType::Number(n)) => Ok(ParamType::Number(-n)),
        (op, other) => Err(TurtleError::TypeMismatch {
            op: op.symbol().to_string(),
            expected: "a number".to_string(),
            found: other.type_name().to_string(),
        }),
    }
}

fn binary(op: BinaryOp, lhs: ParamType, rhs: ParamType) -> Result<ParamType> {
    match op {
        BinaryOp::Eq => Ok(ParamType::bool(lhs == rhs)),
        BinaryOp::And => Ok(ParamType::bool(lhs.is_truthy() && rhs.is_truthy())),
        BinaryOp::Or => Ok(ParamType::bool(lhs.is_truthy() || rhs.is_truthy())),
        BinaryOp::Add => match (lhs, rhs) {
            (ParamType::Number(a), ParamType::Number(b)) => Ok(ParamType::Number(a + b)),
            (
                ParamType::Data(StructuredMemoryData::Array(mut a)),
                ParamType::Data(StructuredMemoryData::Array(b)),
            ) => {
                a.extend(b);
                Ok(ParamType::array(a))
            }
            (lhs, rhs) => Err(mismatch(op, "two numbers or two arrays", &lhs, &rhs)),
        },
        _ => {
            let (ParamType::Number(a), ParamType::Number(b)) = (&lhs, &rhs) else {
                return Err(mismatch(op, "two numbers", &lhs, &rhs));
            };
            arithmetic(op, *a, *b)
        }
    }
}

fn arithmetic(op: BinaryOp, a: f64, b: f64) -> Result<ParamType> {
    Ok(match op {
        BinaryOp::Sub => ParamType::Number(a - b),
        BinaryOp::Mul => ParamType::Number(a * b),
        BinaryOp::Div if b == 0.0 => return Err(TurtleError::DivisionByZero),
        BinaryOp::Div => ParamType::Number(a / b),
        BinaryOp::Rem if b == 0.0 => return Err(TurtleError::DivisionByZero),
        BinaryOp::Rem => ParamType::Number(a % b),
        BinaryOp::Lt => ParamType::bool(a < b),
        BinaryOp::Gt => ParamType::bool(a > b),
        BinaryOp::Range => range(a, b)?,
        BinaryOp::Add => ParamType::Number(a + b),
        BinaryOp::Eq => ParamType::bool(a == b),
        BinaryOp::And => ParamType::bool(a != 0.0 && b != 0.0),
        BinaryOp::Or => ParamType::bool(a != 0.0 || b != 0.0),
    })
}

/// `a:b` is `[a, a+1, ...]` up to but excluding `b`.
///
/// The length is `ceil(b - a)`, fixed before any element is built.
fn range(start: f64, end: f64) -> Result<ParamType> {
    let too_long = || TurtleError::TypeMismatch {
        op: ":".to_string(),
        expected: format!("finite bounds at most {} apart", MAX_RANGE),
        found: format!("{}:{}", start, end),
    };
    if !start.is_finite() || !end.is_finite() {
        return Err(too_long());
    }
    let count = (end - start).ceil();
    if count > MAX_RANGE {
        return Err(too_long());
    }
    let count = count.max(0.0) as usize;
    Ok(ParamType::array(
        (0..count)
            .map(|k| ParamType::Number(start + k as f64))
            .collect(),
    ))
}

fn mismatch(op: BinaryOp, expected: &str, lhs: &ParamType, rhs: &ParamType) -> TurtleError {
    TurtleError::TypeMismatch {
        op: op.symbol().to_string(),
        expected: expected.to_string(),
        found: format!("{} and {}", lhs.type_name(), rhs.type_name()),
    }
}
