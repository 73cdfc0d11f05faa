//! Runtime values for the interpreter

use indexmap::IndexMap;
use std::fmt;

use super::exec::ExecutableFactory;

/// Runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    /// Every number is a 64-bit float
    Number(f64),
    /// Array or object data (strings are arrays of character codes)
    Data(StructuredMemoryData),
    /// A block of code bound to its defining scope
    Code(ExecutableFactory),
}

/// Nested array/object data.
///
/// An instance never changes between the array and object shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredMemoryData {
    Array(Vec<ParamType>),
    Object(IndexMap<String, ParamType>),
}

impl ParamType {
    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamType::Number(_) => "number",
            ParamType::Data(StructuredMemoryData::Array(_)) => "array",
            ParamType::Data(StructuredMemoryData::Object(_)) => "object",
            ParamType::Code(_) => "code",
        }
    }

    /// Check if value is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            ParamType::Number(n) => *n != 0.0,
            ParamType::Data(data) => !data.is_empty(),
            ParamType::Code(_) => true,
        }
    }

    pub fn bool(b: bool) -> Self {
        ParamType::Number(if b { 1.0 } else { 0.0 })
    }

    /// Lower text to an array of character codes
    pub fn text(s: &str) -> Self {
        ParamType::Data(StructuredMemoryData::from_text(s))
    }

    pub fn array(items: Vec<ParamType>) -> Self {
        ParamType::Data(StructuredMemoryData::Array(items))
    }

    /// Try to get as number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamType::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&StructuredMemoryData> {
        match self {
            ParamType::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_code(&self) -> Option<&ExecutableFactory> {
        match self {
            ParamType::Code(c) => Some(c),
            _ => None,
        }
    }

    /// Read a character array back as text
    pub fn as_text(&self) -> Option<String> {
        self.as_data().and_then(StructuredMemoryData::as_text)
    }
}

impl From<f64> for ParamType {
    fn from(n: f64) -> Self {
        ParamType::Number(n)
    }
}

impl From<StructuredMemoryData> for ParamType {
    fn from(data: StructuredMemoryData) -> Self {
        ParamType::Data(data)
    }
}

impl StructuredMemoryData {
    pub fn from_text(s: &str) -> Self {
        StructuredMemoryData::Array(
            s.chars()
                .map(|c| ParamType::Number(f64::from(u32::from(c))))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            StructuredMemoryData::Array(items) => items.len(),
            StructuredMemoryData::Object(fields) => fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> &'static str {
        match self {
            StructuredMemoryData::Array(_) => "array",
            StructuredMemoryData::Object(_) => "object",
        }
    }

    /// Decode an array of character codes
    pub fn as_text(&self) -> Option<String> {
        let StructuredMemoryData::Array(items) = self else {
            return None;
        };
        items
            .iter()
            .map(|item| item.as_number().and_then(char_from_code))
            .collect()
    }

    /// True for non-empty character arrays that print as a quoted string
    pub fn is_printable_text(&self) -> bool {
        match self {
            StructuredMemoryData::Array(items) if !items.is_empty() => items.iter().all(|item| {
                item.as_number()
                    .and_then(char_from_code)
                    .is_some_and(|c| matches!(c, ' '..='~' | '\n' | '\t' | '\r'))
            }),
            _ => false,
        }
    }
}

fn char_from_code(n: f64) -> Option<char> {
    if n.fract() != 0.0 || n < 0.0 || n > f64::from(u32::MAX) {
        return None;
    }
    char::from_u32(n as u32)
}

/// Format a value the way `print` shows it
pub fn format_value(value: &ParamType) -> String {
    value.to_string()
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Number(n) => write!(f, "{}", n),
            ParamType::Data(data) => write!(f, "{}", data),
            ParamType::Code(code) => write!(f, "[code/{}]", code.arity()),
        }
    }
}

impl fmt::Display for StructuredMemoryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_printable_text() {
            if let Some(text) = self.as_text() {
                write!(f, "\"")?;
                for c in text.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                return write!(f, "\"");
            }
        }
        match self {
            StructuredMemoryData::Array(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            StructuredMemoryData::Object(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_numbers() {
        assert_eq!(format_value(&ParamType::Number(3.0)), "3");
        assert_eq!(format_value(&ParamType::Number(-2.5)), "-2.5");
    }

    #[test]
    fn test_format_text_is_quoted() {
        assert_eq!(format_value(&ParamType::text("hi \"you\"")), "\"hi \\\"you\\\"\"");
    }

    #[test]
    fn test_format_nested() {
        let mut fields = IndexMap::new();
        fields.insert("a".to_string(), ParamType::Number(1.0));
        fields.insert(
            "b".to_string(),
            ParamType::array(vec![ParamType::Number(2.0), ParamType::Number(3.5)]),
        );
        let value = ParamType::Data(StructuredMemoryData::Object(fields));
        assert_eq!(format_value(&value), "{a: 1, b: [2, 3.5]}");
    }

    #[test]
    fn test_small_numbers_are_not_text() {
        let value = ParamType::array(vec![ParamType::Number(1.0), ParamType::Number(2.0)]);
        assert_eq!(format_value(&value), "[1, 2]");
        assert_eq!(format_value(&ParamType::array(vec![])), "[]");
    }
}
