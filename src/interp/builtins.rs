//! Built-in command registry
//!
//! Every built-in is a [`CommandSpec`]: its names, its argument constraints
//! and a handler. Arguments are validated before the handler runs. Control
//! flow commands are ordinary entries whose handlers instantiate their code
//! arguments; only they need the async handler form.

use rustc_hash::FxHashMap;
use serde_json::json;

use super::args::{ArgSpec, ArgType, Categories};
use super::exec::{BoxFuture, ControlFlow, ExecutableFactory, Interpreter, Session};
use super::hooks::Message;
use super::memory::{BoundParameters, Memory};
use super::value::{ParamType, StructuredMemoryData, format_value};
use crate::diagnostics::{Result, TurtleError};
use crate::expr;

/// Handler for commands that never run nested code
pub type SimpleHandler =
    fn(&Interpreter, &mut Session, &Memory, Vec<ArgType>) -> Result<ControlFlow>;

/// Handler for commands that run code arguments
pub type ControlHandler = for<'a> fn(
    &'a Interpreter,
    &'a mut Session,
    &'a Memory,
    Vec<ArgType>,
) -> BoxFuture<'a, Result<ControlFlow>>;

#[derive(Clone, Copy)]
pub enum Handler {
    Simple(SimpleHandler),
    Control(ControlHandler),
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handler::Simple(_) => write!(f, "Simple"),
            Handler::Control(_) => write!(f, "Control"),
        }
    }
}

/// A registry entry
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub args: ArgSpec,
    pub handler: Handler,
}

impl CommandSpec {
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }
}

/// Label → command lookup
#[derive(Debug, Clone, Default)]
pub struct Registry {
    commands: FxHashMap<&'static str, CommandSpec>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// All built-in commands
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for spec in standard_commands() {
            registry.register(spec);
        }
        registry
    }

    /// Add a command under its name and aliases, replacing earlier entries
    pub fn register(&mut self, spec: CommandSpec) {
        for name in spec.names() {
            self.commands.insert(name, spec.clone());
        }
    }

    pub fn get(&self, label: &str) -> Option<&CommandSpec> {
        self.commands.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.commands.contains_key(label)
    }

    /// Registered labels, aliases included, sorted
    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels: Vec<_> = self.commands.keys().copied().collect();
        labels.sort_unstable();
        labels
    }
}

// ==================== CONSTRAINTS ====================

const NUMBER: &[Categories] = &[Categories::NUMERIC];
const POINT: &[Categories] = &[Categories::NUMERIC, Categories::NUMERIC];
const DECLARE: &[Categories] = &[Categories::WORD, Categories::VALUE];
const WHILE: &[Categories] = &[Categories::CODE, Categories::CODE];
const LOOP_NAME: &[Categories] = &[Categories::WORD];
const REPEAT_TAIL: &[Categories] = &[
    Categories::NUMERIC.union(Categories::VARIABLE),
    Categories::CODE,
];
const EACH_TAIL: &[Categories] = &[
    Categories::ARRAY.union(Categories::VARIABLE),
    Categories::CODE,
];
const BODY: &[Categories] = &[Categories::CODE];
/// Conditions stay unevaluated until the chain reaches them
const BRANCH: Categories = Categories::WORD
    .union(Categories::EXPRESSION)
    .union(Categories::CODE);
const STRAY_BRANCH: ArgSpec = ArgSpec::Variadic {
    front: &[],
    back: &[],
    default: BRANCH,
    min: 0,
    max: None,
};

fn simple(
    name: &'static str,
    aliases: &'static [&'static str],
    args: ArgSpec,
    handler: SimpleHandler,
) -> CommandSpec {
    CommandSpec {
        name,
        aliases,
        args,
        handler: Handler::Simple(handler),
    }
}

fn control(
    name: &'static str,
    aliases: &'static [&'static str],
    args: ArgSpec,
    handler: ControlHandler,
) -> CommandSpec {
    CommandSpec {
        name,
        aliases,
        args,
        handler: Handler::Control(handler),
    }
}

fn standard_commands() -> Vec<CommandSpec> {
    vec![
        // Variables
        simple("new", &[], ArgSpec::Fixed(DECLARE), cmd_new),
        simple("set", &[], ArgSpec::Fixed(DECLARE), cmd_set),
        // Output
        simple(
            "print",
            &[],
            ArgSpec::Variadic {
                front: &[],
                back: &[],
                default: Categories::VALUE,
                min: 0,
                max: None,
            },
            cmd_print,
        ),
        // Turtle
        simple("forward", &["fd", "f"], ArgSpec::Fixed(NUMBER), cmd_forward),
        simple("backward", &["bk", "b"], ArgSpec::Fixed(NUMBER), cmd_backward),
        simple("left", &["lt", "l"], ArgSpec::Fixed(NUMBER), cmd_left),
        simple("right", &["rt", "r"], ArgSpec::Fixed(NUMBER), cmd_right),
        simple("penup", &["pu"], ArgSpec::NONE, cmd_penup),
        simple("pendown", &["pd"], ArgSpec::NONE, cmd_pendown),
        simple("goto", &[], ArgSpec::Fixed(POINT), cmd_goto),
        simple("home", &[], ArgSpec::NONE, cmd_home),
        simple("clear", &[], ArgSpec::NONE, cmd_clear),
        simple(
            "color",
            &[],
            ArgSpec::Variadic {
                front: &[],
                back: &[],
                default: Categories::NUMERIC.union(Categories::ARRAY),
                min: 1,
                max: Some(3),
            },
            cmd_color,
        ),
        simple("width", &[], ArgSpec::Fixed(NUMBER), cmd_width),
        // Control flow
        control(
            "if",
            &[],
            ArgSpec::Variadic {
                front: &[],
                back: &[],
                default: BRANCH,
                min: 2,
                max: None,
            },
            cmd_if,
        ),
        simple("elif", &[], STRAY_BRANCH, cmd_stray_branch),
        simple("else", &[], STRAY_BRANCH, cmd_stray_branch),
        control("while", &[], ArgSpec::Fixed(WHILE), cmd_while),
        control(
            "repeat",
            &["rep"],
            ArgSpec::Variadic {
                front: LOOP_NAME,
                back: REPEAT_TAIL,
                default: Categories::empty(),
                min: 2,
                max: Some(3),
            },
            cmd_repeat,
        ),
        control(
            "each",
            &[],
            ArgSpec::Variadic {
                front: LOOP_NAME,
                back: EACH_TAIL,
                default: Categories::empty(),
                min: 2,
                max: Some(3),
            },
            cmd_each,
        ),
        simple(
            "return",
            &[],
            ArgSpec::Variadic {
                front: &[],
                back: &[],
                default: Categories::VALUE,
                min: 0,
                max: Some(1),
            },
            cmd_return,
        ),
        simple(
            "learn",
            &[],
            ArgSpec::Variadic {
                front: LOOP_NAME,
                back: BODY,
                default: Categories::WORD,
                min: 2,
                max: None,
            },
            cmd_learn,
        ),
    ]
}

// ==================== HELPERS ====================

fn next() -> Result<ControlFlow> {
    Ok(ControlFlow::Next(None))
}

fn word(args: &[ArgType], index: usize) -> &str {
    args.get(index).and_then(ArgType::as_word).unwrap_or_default()
}

fn number(args: &[ArgType], index: usize) -> f64 {
    args.get(index).and_then(ArgType::as_number).unwrap_or_default()
}

fn code(args: &[ArgType], index: usize) -> Result<&ExecutableFactory> {
    args.get(index)
        .and_then(ArgType::as_code)
        .ok_or_else(|| TurtleError::MalformedBranch {
            reason: format!("expected a code block at argument {}", index + 1),
        })
}

fn turtle(session: &mut Session, topic: &str, payload: serde_json::Value) -> Result<ControlFlow> {
    session.publish(Message::new(topic, payload));
    next()
}

// ==================== VARIABLES & OUTPUT ====================

fn cmd_new(_: &Interpreter, _: &mut Session, scope: &Memory, args: Vec<ArgType>) -> Result<ControlFlow> {
    let mut args = args.into_iter();
    let (Some(ArgType::Word(name)), Some(value)) = (args.next(), args.next()) else {
        return next();
    };
    scope.create(&name, value.into_param())?;
    next()
}

fn cmd_set(_: &Interpreter, _: &mut Session, scope: &Memory, args: Vec<ArgType>) -> Result<ControlFlow> {
    let mut args = args.into_iter();
    let (Some(ArgType::Word(path)), Some(value)) = (args.next(), args.next()) else {
        return next();
    };
    scope.set(&path, value.into_param())?;
    next()
}

fn cmd_print(_: &Interpreter, session: &mut Session, _: &Memory, args: Vec<ArgType>) -> Result<ControlFlow> {
    let text = args
        .into_iter()
        .map(|arg| format_value(&arg.into_param()))
        .collect::<Vec<_>>()
        .join(" ");
    session.publish(Message::new("console.print", json!({ "text": text })));
    next()
}

// ==================== TURTLE ====================

fn cmd_forward(_: &Interpreter, session: &mut Session, _: &Memory, args: Vec<ArgType>) -> Result<ControlFlow> {
    turtle(session, "turtle.move", json!({ "distance": number(&args, 0) }))
}

fn cmd_backward(_: &Interpreter, session: &mut Session, _: &Memory, args: Vec<ArgType>) -> Result<ControlFlow> {
    turtle(session, "turtle.move", json!({ "distance": -number(&args, 0) }))
}

/// Positive angles turn counterclockwise
fn cmd_left(_: &Interpreter, session: &mut Session, _: &Memory, args: Vec<ArgType>) -> Result<ControlFlow> {
    turtle(session, "turtle.turn", json!({ "angle": number(&args, 0) }))
}

fn cmd_right(_: &Interpreter, session: &mut Session, _: &Memory, args: Vec<ArgType>) -> Result<ControlFlow> {
    turtle(session, "turtle.turn", json!({ "angle": -number(&args, 0) }))
}

fn cmd_penup(_: &Interpreter, session: &mut Session, _: &Memory, _: Vec<ArgType>) -> Result<ControlFlow> {
    turtle(session, "turtle.pen", json!({ "down": false }))
}

fn cmd_pendown(_: &Interpreter, session: &mut Session, _: &Memory, _: Vec<ArgType>) -> Result<ControlFlow> {
    turtle(session, "turtle.pen", json!({ "down": true }))
}

fn cmd_goto(_: &Interpreter, session: &mut Session, _: &Memory, args: Vec<ArgType>) -> Result<ControlFlow> {
    turtle(
        session,
        "turtle.goto",
        json!({ "x": number(&args, 0), "y": number(&args, 1) }),
    )
}

fn cmd_home(_: &Interpreter, session: &mut Session, _: &Memory, _: Vec<ArgType>) -> Result<ControlFlow> {
    turtle(session, "turtle.home", json!({}))
}

fn cmd_clear(_: &Interpreter, session: &mut Session, _: &Memory, _: Vec<ArgType>) -> Result<ControlFlow> {
    turtle(session, "turtle.clear", json!({}))
}

/// `color r g b`, `color gray`, `color [r, g, b]` or `color "name"`
fn cmd_color(_: &Interpreter, session: &mut Session, _: &Memory, args: Vec<ArgType>) -> Result<ControlFlow> {
    let color = match args.as_slice() {
        [ArgType::Array(data)] if data.is_printable_text() => json!(data.as_text()),
        [ArgType::Array(data)] => color_components(data)?,
        components => json!(components.iter().filter_map(ArgType::as_number).collect::<Vec<_>>()),
    };
    turtle(session, "turtle.color", json!({ "color": color }))
}

fn color_components(data: &StructuredMemoryData) -> Result<serde_json::Value> {
    let StructuredMemoryData::Array(items) = data else {
        return Err(TurtleError::TypeMismatch {
            op: "color".to_string(),
            expected: "an array of numbers".to_string(),
            found: data.shape().to_string(),
        });
    };
    let components = items
        .iter()
        .map(|item| {
            item.as_number().ok_or_else(|| TurtleError::TypeMismatch {
                op: "color".to_string(),
                expected: "an array of numbers".to_string(),
                found: item.type_name().to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(json!(components))
}

fn cmd_width(_: &Interpreter, session: &mut Session, _: &Memory, args: Vec<ArgType>) -> Result<ControlFlow> {
    turtle(session, "turtle.width", json!({ "width": number(&args, 0) }))
}

// ==================== CONTROL FLOW ====================

/// Truthiness of a branch condition; code conditions run in a fresh scope
async fn condition(
    interp: &Interpreter,
    session: &mut Session,
    scope: &Memory,
    cond: &ArgType,
) -> Result<bool> {
    Ok(match cond {
        ArgType::Word(text) => expr::evaluate(text, scope)?.is_truthy(),
        ArgType::Numeric(n) => *n != 0.0,
        ArgType::Array(data) => !data.is_empty(),
        ArgType::Code(code) => interp
            .run_code(session, code, None, false)
            .await?
            .value()
            .is_some_and(ParamType::is_truthy),
    })
}

/// Split `c {..} elif c {..} else {..}` into (condition, body) pairs.
///
/// The whole chain is checked before any condition runs.
fn branches(args: &[ArgType]) -> Result<Vec<(Option<&ArgType>, &ExecutableFactory)>> {
    let Some(first) = args.first() else {
        return Err(TurtleError::MalformedBranch {
            reason: "`if` needs a condition and a block".to_string(),
        });
    };
    let mut branches = vec![(Some(first), code(args, 1)?)];
    let mut i = 2;
    while i < args.len() {
        match args[i].as_word() {
            Some("elif") if i + 2 < args.len() => {
                branches.push((Some(&args[i + 1]), code(args, i + 2)?));
                i += 3;
            }
            Some("else") if i + 2 == args.len() => {
                branches.push((None, code(args, i + 1)?));
                i += 2;
            }
            Some(keyword @ ("elif" | "else")) => {
                return Err(TurtleError::MalformedBranch {
                    reason: format!("`{}` is not followed by the expected arguments", keyword),
                });
            }
            _ => {
                return Err(TurtleError::MalformedBranch {
                    reason: format!("expected `elif` or `else` at argument {}", i + 1),
                });
            }
        }
    }
    Ok(branches)
}

/// `if c {..} elif c {..} else {..}`
fn cmd_if<'a>(
    interp: &'a Interpreter,
    session: &'a mut Session,
    scope: &'a Memory,
    args: Vec<ArgType>,
) -> BoxFuture<'a, Result<ControlFlow>> {
    Box::pin(async move {
        for (cond, body) in branches(&args)? {
            let taken = match cond {
                Some(cond) => condition(interp, session, scope, cond).await?,
                None => true,
            };
            if taken {
                return interp.run_code(session, body, None, false).await;
            }
        }
        next()
    })
}

fn cmd_stray_branch(_: &Interpreter, _: &mut Session, _: &Memory, _: Vec<ArgType>) -> Result<ControlFlow> {
    Err(TurtleError::MalformedBranch {
        reason: "`elif`/`else` must continue an `if` on the same line".to_string(),
    })
}

/// `while {cond} {body}`
fn cmd_while<'a>(
    interp: &'a Interpreter,
    session: &'a mut Session,
    _: &'a Memory,
    args: Vec<ArgType>,
) -> BoxFuture<'a, Result<ControlFlow>> {
    Box::pin(async move {
        let cond = code(&args, 0)?;
        let body = code(&args, 1)?;
        loop {
            let flow = interp.run_code(session, cond, None, false).await?;
            if flow.is_return() {
                return Ok(flow);
            }
            if !flow.value().is_some_and(ParamType::is_truthy) {
                return next();
            }
            let flow = interp.run_code(session, body, None, false).await?;
            if flow.is_return() {
                return Ok(flow);
            }
        }
    })
}

/// `repeat [name] n {body}`; the counter runs from 0 to n-1
fn cmd_repeat<'a>(
    interp: &'a Interpreter,
    session: &'a mut Session,
    _: &'a Memory,
    args: Vec<ArgType>,
) -> BoxFuture<'a, Result<ControlFlow>> {
    Box::pin(async move {
        let (name, count, body) = match args.len() {
            3 => (word(&args, 0).to_string(), number(&args, 1), code(&args, 2)?),
            _ => (
                interp.config().loop_variable.clone(),
                number(&args, 0),
                code(&args, 1)?,
            ),
        };

        let mut i = 0.0;
        while i < count.floor() {
            let bindings = BoundParameters::new().bind(name.clone(), ParamType::Number(i));
            let flow = interp.run_code(session, body, Some(bindings), false).await?;
            if flow.is_return() {
                return Ok(flow);
            }
            i += 1.0;
        }
        next()
    })
}

/// `each [name] data {body}`; objects yield their keys
fn cmd_each<'a>(
    interp: &'a Interpreter,
    session: &'a mut Session,
    _: &'a Memory,
    args: Vec<ArgType>,
) -> BoxFuture<'a, Result<ControlFlow>> {
    Box::pin(async move {
        let (name, data, body) = match args.len() {
            3 => (word(&args, 0).to_string(), &args[1], code(&args, 2)?),
            _ => (interp.config().each_variable.clone(), &args[0], code(&args, 1)?),
        };
        let items: Vec<ParamType> = match data {
            ArgType::Array(StructuredMemoryData::Array(items)) => items.clone(),
            ArgType::Array(StructuredMemoryData::Object(fields)) => {
                fields.keys().map(|k| ParamType::text(k)).collect()
            }
            other => {
                return Err(TurtleError::TypeMismatch {
                    op: "each".to_string(),
                    expected: "an array or object".to_string(),
                    found: other.kind().to_string(),
                });
            }
        };

        for item in items {
            let bindings = BoundParameters::new().bind(name.clone(), item);
            let flow = interp.run_code(session, body, Some(bindings), false).await?;
            if flow.is_return() {
                return Ok(flow);
            }
        }
        next()
    })
}

fn cmd_return(_: &Interpreter, _: &mut Session, _: &Memory, args: Vec<ArgType>) -> Result<ControlFlow> {
    Ok(ControlFlow::Return(
        args.into_iter().next().map(ArgType::into_param),
    ))
}

/// `learn name params... {body}`
fn cmd_learn(_: &Interpreter, _: &mut Session, scope: &Memory, args: Vec<ArgType>) -> Result<ControlFlow> {
    let name = word(&args, 0).to_string();
    let params: Vec<String> = args[1..args.len() - 1]
        .iter()
        .filter_map(ArgType::as_word)
        .map(str::to_string)
        .collect();
    let body = code(&args, args.len() - 1)?.clone().with_params(params);

    tracing::debug!("Learned procedure `{}` with {} parameter(s)", name, body.arity());
    scope.create(&name, ParamType::Code(body))?;
    next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_share_a_spec() {
        let registry = Registry::standard();
        for label in ["forward", "fd", "f"] {
            assert_eq!(registry.get(label).map(|s| s.name), Some("forward"));
        }
        assert!(registry.contains("rep"));
        assert!(!registry.contains("jump"));
    }
}
