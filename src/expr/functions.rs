//! Built-in expression functions
//!
//! Each function has a fixed arity checked at compile time. Angles are in
//! degrees, matching the turtle commands.

use rustc_hash::FxHashMap;
use std::sync::LazyLock;

use crate::diagnostics::{Result, TurtleError};
use crate::interp::value::{ParamType, StructuredMemoryData};

/// A built-in function callable from expressions
#[derive(Debug)]
pub struct Function {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&[ParamType]) -> Result<ParamType>,
}

static FUNCTIONS: &[Function] = &[
    Function { name: "abs", arity: 1, func: abs },
    Function { name: "sqrt", arity: 1, func: sqrt },
    Function { name: "pow", arity: 2, func: pow },
    Function { name: "vecsize", arity: 1, func: vecsize },
    Function { name: "length", arity: 1, func: length },
    Function { name: "round", arity: 1, func: round },
    Function { name: "floor", arity: 1, func: floor },
    Function { name: "ceil", arity: 1, func: ceil },
    Function { name: "interpolate", arity: 3, func: interpolate },
    Function { name: "tostring", arity: 1, func: tostring },
    Function { name: "tonumber", arity: 1, func: tonumber },
    Function { name: "min", arity: 2, func: min },
    Function { name: "max", arity: 2, func: max },
    Function { name: "sin", arity: 1, func: sin },
    Function { name: "cos", arity: 1, func: cos },
    Function { name: "tan", arity: 1, func: tan },
    Function { name: "atan2", arity: 2, func: atan2 },
    Function { name: "sign", arity: 1, func: sign },
    Function { name: "keys", arity: 1, func: keys },
];

static REGISTRY: LazyLock<FxHashMap<&'static str, &'static Function>> =
    LazyLock::new(|| FUNCTIONS.iter().map(|f| (f.name, f)).collect());

/// Look up a built-in function by name
pub fn lookup(name: &str) -> Option<&'static Function> {
    REGISTRY.get(name).copied()
}

/// Names of all built-in functions, in declaration order
pub fn names() -> impl Iterator<Item = &'static str> {
    FUNCTIONS.iter().map(|f| f.name)
}

// ==================== HELPERS ====================

fn number(name: &str, args: &[ParamType], index: usize) -> Result<f64> {
    match args.get(index) {
        Some(ParamType::Number(n)) => Ok(*n),
        other => Err(TurtleError::TypeMismatch {
            op: name.to_string(),
            expected: "a number".to_string(),
            found: other.map_or("nothing", ParamType::type_name).to_string(),
        }),
    }
}

fn numbers(name: &str, value: &ParamType) -> Result<Vec<f64>> {
    let mismatch = || TurtleError::TypeMismatch {
        op: name.to_string(),
        expected: "an array of numbers".to_string(),
        found: value.type_name().to_string(),
    };
    match value {
        ParamType::Data(StructuredMemoryData::Array(items)) => items
            .iter()
            .map(|item| item.as_number().ok_or_else(mismatch))
            .collect(),
        _ => Err(mismatch()),
    }
}

fn unary(name: &str, args: &[ParamType], f: fn(f64) -> f64) -> Result<ParamType> {
    Ok(ParamType::Number(f(number(name, args, 0)?)))
}

// ==================== FUNCTIONS ====================

fn abs(args: &[ParamType]) -> Result<ParamType> {
    unary("abs", args, f64::abs)
}

fn sqrt(args: &[ParamType]) -> Result<ParamType> {
    unary("sqrt", args, f64::sqrt)
}

fn pow(args: &[ParamType]) -> Result<ParamType> {
    Ok(ParamType::Number(
        number("pow", args, 0)?.powf(number("pow", args, 1)?),
    ))
}

fn vecsize(args: &[ParamType]) -> Result<ParamType> {
    let components = numbers("vecsize", &args[0])?;
    Ok(ParamType::Number(
        components.iter().map(|c| c * c).sum::<f64>().sqrt(),
    ))
}

fn length(args: &[ParamType]) -> Result<ParamType> {
    match &args[0] {
        ParamType::Data(data) => Ok(ParamType::Number(data.len() as f64)),
        other => Err(TurtleError::TypeMismatch {
            op: "length".to_string(),
            expected: "an array or object".to_string(),
            found: other.type_name().to_string(),
        }),
    }
}

fn round(args: &[ParamType]) -> Result<ParamType> {
    unary("round", args, f64::round)
}

fn floor(args: &[ParamType]) -> Result<ParamType> {
    unary("floor", args, f64::floor)
}

fn ceil(args: &[ParamType]) -> Result<ParamType> {
    unary("ceil", args, f64::ceil)
}

/// `interpolate(a, b, t)` on numbers or equal-length numeric arrays
fn interpolate(args: &[ParamType]) -> Result<ParamType> {
    let t = number("interpolate", args, 2)?;
    let lerp = |a: f64, b: f64| a + (b - a) * t;
    match (&args[0], &args[1]) {
        (ParamType::Number(a), ParamType::Number(b)) => Ok(ParamType::Number(lerp(*a, *b))),
        (a, b) => {
            let from = numbers("interpolate", a)?;
            let to = numbers("interpolate", b)?;
            if from.len() != to.len() {
                return Err(TurtleError::TypeMismatch {
                    op: "interpolate".to_string(),
                    expected: format!("arrays of equal length ({})", from.len()),
                    found: format!("length {}", to.len()),
                });
            }
            Ok(ParamType::array(
                from.iter()
                    .zip(&to)
                    .map(|(a, b)| ParamType::Number(lerp(*a, *b)))
                    .collect(),
            ))
        }
    }
}

fn tostring(args: &[ParamType]) -> Result<ParamType> {
    let text = match &args[0] {
        ParamType::Number(n) => n.to_string(),
        other => other.as_text().unwrap_or_else(|| other.to_string()),
    };
    Ok(ParamType::text(&text))
}

fn tonumber(args: &[ParamType]) -> Result<ParamType> {
    let mismatch = |found: String| TurtleError::TypeMismatch {
        op: "tonumber".to_string(),
        expected: "numeric text".to_string(),
        found,
    };
    match &args[0] {
        ParamType::Number(n) => Ok(ParamType::Number(*n)),
        other => {
            let text = other
                .as_text()
                .ok_or_else(|| mismatch(other.type_name().to_string()))?;
            text.trim()
                .parse::<f64>()
                .map(ParamType::Number)
                .map_err(|_| mismatch(format!("\"{}\"", text)))
        }
    }
}

fn min(args: &[ParamType]) -> Result<ParamType> {
    Ok(ParamType::Number(
        number("min", args, 0)?.min(number("min", args, 1)?),
    ))
}

fn max(args: &[ParamType]) -> Result<ParamType> {
    Ok(ParamType::Number(
        number("max", args, 0)?.max(number("max", args, 1)?),
    ))
}

fn sin(args: &[ParamType]) -> Result<ParamType> {
    unary("sin", args, |deg| deg.to_radians().sin())
}

fn cos(args: &[ParamType]) -> Result<ParamType> {
    unary("cos", args, |deg| deg.to_radians().cos())
}

fn tan(args: &[ParamType]) -> Result<ParamType> {
    unary("tan", args, |deg| deg.to_radians().tan())
}

fn atan2(args: &[ParamType]) -> Result<ParamType> {
    let y = number("atan2", args, 0)?;
    let x = number("atan2", args, 1)?;
    Ok(ParamType::Number(y.atan2(x).to_degrees()))
}

fn sign(args: &[ParamType]) -> Result<ParamType> {
    unary("sign", args, |n| if n == 0.0 { 0.0 } else { n.signum() })
}

fn keys(args: &[ParamType]) -> Result<ParamType> {
    match &args[0] {
        ParamType::Data(StructuredMemoryData::Object(fields)) => Ok(ParamType::array(
            fields.keys().map(|k| ParamType::text(k)).collect(),
        )),
        other => Err(TurtleError::TypeMismatch {
            op: "keys".to_string(),
            expected: "an object".to_string(),
            found: other.type_name().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn object(entries: Vec<(&str, ParamType)>) -> ParamType {
        ParamType::Data(StructuredMemoryData::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<IndexMap<_, _>>(),
        ))
    }

    fn call(name: &str, args: &[ParamType]) -> Result<ParamType> {
        (lookup(name).unwrap().func)(args)
    }

    #[test]
    fn test_registry_is_complete() {
        assert_eq!(names().count(), FUNCTIONS.len());
        assert!(lookup("interpolate").is_some_and(|f| f.arity == 3));
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn test_degrees() {
        let v = call("sin", &[ParamType::Number(90.0)]).unwrap();
        assert!((v.as_number().unwrap() - 1.0).abs() < 1e-12);
        let a = call("atan2", &[ParamType::Number(1.0), ParamType::Number(1.0)]).unwrap();
        assert!((a.as_number().unwrap() - 45.0).abs() < 1e-12);
    }

    #[test]
    fn test_interpolate_arrays() {
        let from = ParamType::array(vec![ParamType::Number(0.0), ParamType::Number(10.0)]);
        let to = ParamType::array(vec![ParamType::Number(10.0), ParamType::Number(20.0)]);
        let mid = call("interpolate", &[from, to, ParamType::Number(0.5)]).unwrap();
        assert_eq!(
            mid,
            ParamType::array(vec![ParamType::Number(5.0), ParamType::Number(15.0)])
        );
    }

    #[test]
    fn test_keys_and_text() {
        let obj = object(vec![("a", ParamType::Number(1.0)), ("b", ParamType::Number(2.0))]);
        assert_eq!(
            call("keys", &[obj]).unwrap(),
            ParamType::array(vec![ParamType::text("a"), ParamType::text("b")])
        );
        assert_eq!(
            call("tonumber", &[ParamType::text(" 2.5")]).unwrap(),
            ParamType::Number(2.5)
        );
        assert_eq!(
            call("tostring", &[ParamType::Number(3.0)]).unwrap(),
            ParamType::text("3")
        );
    }
}
