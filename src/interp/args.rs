//! Argument classification
//!
//! Commands declare, per position, which [`Categories`] an argument may
//! take. [`validate`] turns raw statement arguments into typed [`ArgType`]s
//! before a handler runs, so handlers never see unclassified text.

use bitflags::bitflags;
use std::fmt;

use super::exec::ExecutableFactory;
use super::memory::Memory;
use super::value::{ParamType, StructuredMemoryData};
use crate::ast::Argument;
use crate::common::{is_ident_char, is_ident_start};
use crate::diagnostics::{Result, TurtleError};
use crate::expr;

bitflags! {
    /// Permitted argument categories for one position
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct Categories: u8 {
        /// A plain word, kept as text
        const WORD = 1 << 0;
        /// An expression yielding a number
        const NUMERIC = 1 << 1;
        /// An expression yielding an array or object
        const ARRAY = 1 << 2;
        /// A `{ ... }` block, or a variable holding code
        const CODE = 1 << 3;
        /// A variable name, substituted by its value
        const VARIABLE = 1 << 4;
        /// Expression text, syntax-checked but evaluated by the command
        const EXPRESSION = 1 << 5;

        /// Anything that produces a value
        const VALUE = Self::NUMERIC.bits()
            | Self::ARRAY.bits()
            | Self::CODE.bits()
            | Self::VARIABLE.bits();
    }
}

impl Categories {
    /// True if a value of this runtime kind satisfies the set
    fn accepts(self, value: &ParamType) -> bool {
        let kinds = self & (Categories::NUMERIC | Categories::ARRAY | Categories::CODE);
        if kinds.is_empty() {
            return self.contains(Categories::VARIABLE);
        }
        match value {
            ParamType::Number(_) => kinds.contains(Categories::NUMERIC),
            ParamType::Data(_) => kinds.contains(Categories::ARRAY),
            ParamType::Code(_) => kinds.contains(Categories::CODE),
        }
    }
}

impl fmt::Display for Categories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Categories::WORD, "word"),
            (Categories::NUMERIC, "numeric"),
            (Categories::ARRAY, "array"),
            (Categories::CODE, "code"),
            (Categories::VARIABLE, "variable"),
            (Categories::EXPRESSION, "expression"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();
        match names.split_last() {
            None => write!(f, "nothing"),
            Some((last, [])) => write!(f, "{}", last),
            Some((last, rest)) => write!(f, "{} or {}", rest.join(", "), last),
        }
    }
}

/// Per-command argument constraints
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgSpec {
    /// Exactly one entry per position
    Fixed(&'static [Categories]),
    /// `front` positions from the start, `back` positions from the end, and
    /// `default` for everything between
    Variadic {
        front: &'static [Categories],
        back: &'static [Categories],
        default: Categories,
        min: usize,
        max: Option<usize>,
    },
}

impl ArgSpec {
    /// No arguments at all
    pub const NONE: ArgSpec = ArgSpec::Fixed(&[]);

    /// `count` arguments, all of the same categories
    pub const fn exact(categories: Categories, count: usize) -> Self {
        ArgSpec::Variadic {
            front: &[],
            back: &[],
            default: categories,
            min: count,
            max: Some(count),
        }
    }

    fn bounds(&self) -> (usize, Option<usize>) {
        match self {
            ArgSpec::Fixed(list) => (list.len(), Some(list.len())),
            ArgSpec::Variadic { min, max, .. } => (*min, *max),
        }
    }

    fn check_count(&self, command: &str, got: usize) -> Result<()> {
        let (min, max) = self.bounds();
        if got >= min && max.is_none_or(|max| got <= max) {
            return Ok(());
        }
        let expected = match max {
            Some(max) if max == min => min.to_string(),
            Some(max) => format!("{} to {}", min, max),
            None => format!("at least {}", min),
        };
        Err(TurtleError::ArgumentCount {
            command: command.to_string(),
            expected,
            got,
        })
    }

    /// Categories permitted at `index` when `total` arguments were given.
    ///
    /// Back positions are assigned first, so optional front positions are
    /// the ones that disappear when arguments are omitted.
    pub fn permitted(&self, index: usize, total: usize) -> Categories {
        match self {
            ArgSpec::Fixed(list) => list.get(index).copied().unwrap_or(Categories::empty()),
            ArgSpec::Variadic {
                front,
                back,
                default,
                ..
            } => {
                let back_start = total.saturating_sub(back.len());
                if index >= back_start {
                    back[back.len() - (total - index)]
                } else if index < front.len() {
                    front[index]
                } else {
                    *default
                }
            }
        }
    }
}

/// A classified argument
#[derive(Debug, Clone, PartialEq)]
pub enum ArgType {
    Word(String),
    Numeric(f64),
    Array(StructuredMemoryData),
    Code(ExecutableFactory),
}

impl ArgType {
    pub fn as_word(&self) -> Option<&str> {
        match self {
            ArgType::Word(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ArgType::Numeric(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_code(&self) -> Option<&ExecutableFactory> {
        match self {
            ArgType::Code(c) => Some(c),
            _ => None,
        }
    }

    /// Convert to a runtime value; words become character arrays
    pub fn into_param(self) -> ParamType {
        match self {
            ArgType::Word(w) => ParamType::text(&w),
            ArgType::Numeric(n) => ParamType::Number(n),
            ArgType::Array(data) => ParamType::Data(data),
            ArgType::Code(code) => ParamType::Code(code),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ArgType::Word(_) => "word",
            ArgType::Numeric(_) => "number",
            ArgType::Array(data) => data.shape(),
            ArgType::Code(_) => "code",
        }
    }
}

impl From<ParamType> for ArgType {
    fn from(value: ParamType) -> Self {
        match value {
            ParamType::Number(n) => ArgType::Numeric(n),
            ParamType::Data(data) => ArgType::Array(data),
            ParamType::Code(code) => ArgType::Code(code),
        }
    }
}

/// True for an identifier optionally followed by a `.field`, `.<name>` or
/// `[...]` chain. Brackets may hold anything.
pub fn is_plain_word(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    if !chars.first().is_some_and(|c| is_ident_start(*c)) {
        return false;
    }

    let mut depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '[' => depth += 1,
            ']' if depth == 0 => return false,
            ']' => depth -= 1,
            _ if depth > 0 => {}
            '.' if chars.get(i + 1) == Some(&'<') => {
                let Some(close) = chars[i..].iter().position(|&c| c == '>') else {
                    return false;
                };
                let name = &chars[i + 2..i + close];
                if name.is_empty()
                    || !is_ident_start(name[0])
                    || !name.iter().all(|c| is_ident_char(*c))
                {
                    return false;
                }
                i += close;
            }
            '.' => {}
            c if is_ident_char(c) => {}
            _ => return false,
        }
        i += 1;
    }
    depth == 0
}

/// Classify raw arguments against `spec`.
///
/// Blocks become code bound to `scope`; text is kept as a word, replaced by
/// the variable it names, or evaluated, in that order of preference and
/// only as far as the position permits.
pub fn validate(
    command: &str,
    raw: &[Argument],
    spec: &ArgSpec,
    scope: &Memory,
) -> Result<Vec<ArgType>> {
    spec.check_count(command, raw.len())?;
    raw.iter()
        .enumerate()
        .map(|(index, arg)| {
            let permitted = spec.permitted(index, raw.len());
            classify(command, index, arg, permitted, scope)
        })
        .collect()
}

fn classify(
    command: &str,
    index: usize,
    arg: &Argument,
    permitted: Categories,
    scope: &Memory,
) -> Result<ArgType> {
    let reject = |found: String| TurtleError::ArgumentCategory {
        command: command.to_string(),
        index: index + 1,
        permitted: permitted.to_string(),
        found,
    };

    let text = match arg {
        Argument::Block(block) if permitted.contains(Categories::CODE) => {
            return Ok(ArgType::Code(ExecutableFactory::new(block.clone(), scope)));
        }
        Argument::Block(_) => return Err(reject("a code block".to_string())),
        Argument::Text(text) => text,
    };

    let plain = is_plain_word(text);
    if plain && permitted.contains(Categories::WORD) {
        return Ok(ArgType::Word(text.clone()));
    }

    if permitted.contains(Categories::EXPRESSION) {
        expr::compile(text)?;
        return Ok(ArgType::Word(text.clone()));
    }

    if plain && permitted.intersects(Categories::VARIABLE | Categories::CODE) {
        if let Ok(value) = scope.get(text) {
            if !permitted.accepts(&value) {
                return Err(reject(format!("`{}` ({})", text, value.type_name())));
            }
            return Ok(value.into());
        }
    }

    if permitted.intersects(Categories::NUMERIC | Categories::ARRAY) {
        let value = expr::evaluate(text, scope)?;
        if !permitted.accepts(&value) {
            return Err(reject(format!("`{}` ({})", text, value.type_name())));
        }
        return Ok(value.into());
    }

    Err(reject(format!("`{}`", text)))
}
