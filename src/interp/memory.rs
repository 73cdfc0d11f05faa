//! Scoped variable storage
//!
//! A [`Memory`] is one variable frame with an optional parent. Variables are
//! addressed by paths such as `pos.x`, `grid[row][col]` or `obj.<key>`: the
//! base identifier (everything before the first `.` or `[`) selects the
//! variable, and the rest of the path is resolved inside that variable's
//! data. Index sub-expressions are evaluated against the scope that made the
//! request, so `array[i]` works when `i` lives in an inner scope and `array`
//! further up.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::value::{ParamType, StructuredMemoryData};
use crate::common::{is_ident_char, is_identifier};
use crate::diagnostics::{Result, TurtleError};
use crate::expr::lex::matching_bracket;
use crate::expr::{self, VariableLookup};

/// Largest array index a path may name. Assigning past the end of an array
/// pads it with zeros, so this also caps how far a single write can grow it.
pub const MAX_INDEX: usize = 1_000_000;

/// Read-only variable source consulted after a frame's own variables.
///
/// Procedure parameters and loop variables are bound through an injector,
/// which is why assigning to them fails.
pub trait DataInjector {
    fn get(&self, name: &str) -> Option<&ParamType>;
}

/// Named values bound into a frame, in binding order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundParameters(IndexMap<String, ParamType>);

impl BoundParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, value: ParamType) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl DataInjector for BoundParameters {
    fn get(&self, name: &str) -> Option<&ParamType> {
        self.0.get(name)
    }
}

impl DataInjector for FxHashMap<String, ParamType> {
    fn get(&self, name: &str) -> Option<&ParamType> {
        FxHashMap::get(self, name)
    }
}

/// One step of a structured path
#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    Field(String),
    Index(usize),
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Field(name) => write!(f, ".{}", name),
            Accessor::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// A path with its index sub-expressions already evaluated
#[derive(Debug, Clone, PartialEq)]
pub struct VariablePath {
    pub base: String,
    pub accessors: Vec<Accessor>,
}

struct Frame {
    parent: Option<Memory>,
    injector: Option<Rc<dyn DataInjector>>,
    variables: RefCell<FxHashMap<String, ParamType>>,
}

/// Handle to a variable frame. Cloning shares the frame.
#[derive(Clone)]
pub struct Memory(Rc<Frame>);

/// Non-owning handle to a frame
#[derive(Clone)]
pub struct WeakMemory(Weak<Frame>);

impl WeakMemory {
    pub fn upgrade(&self) -> Option<Memory> {
        self.0.upgrade().map(Memory)
    }

    pub fn ptr_eq(&self, other: &WeakMemory) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl Memory {
    fn from_parts(parent: Option<Memory>, injector: Option<Rc<dyn DataInjector>>) -> Self {
        Memory(Rc::new(Frame {
            parent,
            injector,
            variables: RefCell::new(FxHashMap::default()),
        }))
    }

    /// A frame with no parent
    pub fn root() -> Self {
        Self::from_parts(None, None)
    }

    /// A root frame backed by a read-only source
    pub fn with_injector(injector: Rc<dyn DataInjector>) -> Self {
        Self::from_parts(None, Some(injector))
    }

    pub fn child(parent: &Memory) -> Self {
        Self::from_parts(Some(parent.clone()), None)
    }

    pub fn child_with(parent: &Memory, injector: Rc<dyn DataInjector>) -> Self {
        Self::from_parts(Some(parent.clone()), Some(injector))
    }

    pub fn parent(&self) -> Option<&Memory> {
        self.0.parent.as_ref()
    }

    pub fn downgrade(&self) -> WeakMemory {
        WeakMemory(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Memory) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// True if this frame itself (not an ancestor) holds `name`
    pub fn owns(&self, name: &str) -> bool {
        self.0.variables.borrow().contains_key(name)
    }

    /// Names held by this frame, sorted
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.variables.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    fn ancestors(&self) -> impl Iterator<Item = &Memory> {
        std::iter::successors(Some(self), |m| m.parent())
    }

    /// Read a variable or a member of one
    pub fn get(&self, path: &str) -> Result<ParamType> {
        let resolved = resolve_path(path, self)?;
        for frame in self.ancestors() {
            if let Some(value) = frame.0.variables.borrow().get(&resolved.base) {
                return read(value, &resolved.accessors, path);
            }
            if let Some(value) = frame.0.injector.as_ref().and_then(|i| i.get(&resolved.base)) {
                return read(value, &resolved.accessors, path);
            }
        }
        Err(TurtleError::NonExistingVariable {
            name: resolved.base,
        })
    }

    /// True if `path` resolves to a value
    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    /// Overwrite an existing variable (or member) in the nearest frame that owns it
    pub fn set(&self, path: &str, value: ParamType) -> Result<()> {
        let resolved = resolve_path(path, self)?;
        for frame in self.ancestors() {
            if let Some(cell) = frame.0.variables.borrow_mut().get_mut(&resolved.base) {
                return assign(cell, &resolved.accessors, value, path);
            }
            if frame
                .0
                .injector
                .as_ref()
                .is_some_and(|i| i.get(&resolved.base).is_some())
            {
                return Err(TurtleError::ReadOnlyVariable {
                    name: resolved.base,
                });
            }
        }
        Err(TurtleError::NonExistingVariable {
            name: resolved.base,
        })
    }

    /// Define (or redefine) a variable in this frame.
    ///
    /// Missing intermediate members of a structured path are created.
    pub fn create(&self, path: &str, value: ParamType) -> Result<()> {
        let resolved = resolve_path(path, self)?;
        let mut variables = self.0.variables.borrow_mut();
        if resolved.accessors.is_empty() {
            variables.insert(resolved.base, value);
        } else {
            let cell = variables
                .entry(resolved.base)
                .or_insert(ParamType::Number(0.0));
            materialize(path, cell, &resolved.accessors, value)?;
        }
        Ok(())
    }
}

impl VariableLookup for Memory {
    fn lookup(&self, path: &str) -> Result<ParamType> {
        self.get(path)
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memory")
            .field("variables", &self.local_names())
            .field("has_parent", &self.0.parent.is_some())
            .field("has_injector", &self.0.injector.is_some())
            .finish()
    }
}

// ==================== PATHS ====================

/// Split a path into its base identifier and evaluated accessors
pub fn resolve_path(path: &str, scope: &dyn VariableLookup) -> Result<VariablePath> {
    let expanded = expand_names(path, scope)?;
    let text = expanded.trim();
    let base_end = text.find(['.', '[']).unwrap_or(text.len());
    let base = &text[..base_end];
    if !is_identifier(base) {
        return Err(invalid_path(path, "expected a variable name"));
    }

    let chars: Vec<char> = text[base_end..].chars().collect();
    let mut accessors = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '.' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_ident_char(chars[end]) {
                    end += 1;
                }
                if end == start {
                    return Err(invalid_path(path, "expected a field name after `.`"));
                }
                accessors.push(Accessor::Field(chars[start..end].iter().collect()));
                i = end;
            }
            '[' => {
                let close = matching_bracket(&chars, i)
                    .ok_or_else(|| invalid_path(path, "unclosed `[`"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                accessors.push(index_accessor(path, &inner, scope)?);
                i = close + 1;
            }
            c => {
                return Err(invalid_path(path, &format!("unexpected `{}`", c)));
            }
        }
    }

    Ok(VariablePath {
        base: base.to_string(),
        accessors,
    })
}

/// Evaluate the contents of `[...]` into an accessor
fn index_accessor(path: &str, inner: &str, scope: &dyn VariableLookup) -> Result<Accessor> {
    let value = expr::evaluate(inner, scope)?;
    match &value {
        ParamType::Number(n) if *n > MAX_INDEX as f64 => Err(invalid_path(
            path,
            &format!("index {} exceeds the limit of {}", n, MAX_INDEX),
        )),
        ParamType::Number(n) if n.fract() == 0.0 && *n >= 0.0 => Ok(Accessor::Index(*n as usize)),
        ParamType::Number(n) => Err(invalid_path(
            path,
            &format!("index {} is not a non-negative integer", n),
        )),
        other => match other.as_text() {
            Some(key) => Ok(Accessor::Field(key)),
            None => Err(invalid_path(
                path,
                &format!("cannot index with {}", other.type_name()),
            )),
        },
    }
}

/// Splice `<name>` references (outside brackets) with the text held by `name`
fn expand_names<'p>(path: &'p str, scope: &dyn VariableLookup) -> Result<Cow<'p, str>> {
    if !path.contains('<') {
        return Ok(Cow::Borrowed(path));
    }

    let mut out = String::with_capacity(path.len());
    let mut depth = 0usize;
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '<' if depth == 0 => {
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '>' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(invalid_path(path, "unclosed `<name>`"));
                }
                if !is_identifier(&name) {
                    return Err(invalid_path(path, "expected `<name>`"));
                }
                let text = scope.lookup(&name)?.as_text().ok_or_else(|| {
                    invalid_path(path, &format!("`{}` does not hold text", name))
                })?;
                out.push_str(&text);
                continue;
            }
            _ => {}
        }
        out.push(c);
    }
    Ok(Cow::Owned(out))
}

fn invalid_path(path: &str, reason: &str) -> TurtleError {
    TurtleError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

// ==================== NAVIGATION ====================

fn read(value: &ParamType, accessors: &[Accessor], path: &str) -> Result<ParamType> {
    let mut current = value;
    for accessor in accessors {
        current = match (accessor, current) {
            (Accessor::Field(name), ParamType::Data(StructuredMemoryData::Object(fields))) => {
                fields
                    .get(name)
                    .ok_or_else(|| TurtleError::NonExistingVariable {
                        name: path.to_string(),
                    })?
            }
            (Accessor::Index(i), ParamType::Data(StructuredMemoryData::Array(items))) => {
                items.get(*i).ok_or_else(|| {
                    invalid_path(
                        path,
                        &format!("index {} out of range for length {}", i, items.len()),
                    )
                })?
            }
            (accessor, other) => {
                return Err(invalid_path(
                    path,
                    &format!("cannot apply `{}` to {}", accessor, other.type_name()),
                ));
            }
        };
    }
    Ok(current.clone())
}

/// Assign inside existing data; objects may gain a key and arrays may grow by one
fn assign(cell: &mut ParamType, accessors: &[Accessor], value: ParamType, path: &str) -> Result<()> {
    let Some((first, rest)) = accessors.split_first() else {
        *cell = value;
        return Ok(());
    };

    match (first, cell) {
        (Accessor::Field(name), ParamType::Data(StructuredMemoryData::Object(fields))) => {
            if rest.is_empty() {
                fields.insert(name.clone(), value);
                return Ok(());
            }
            let slot = fields
                .get_mut(name)
                .ok_or_else(|| TurtleError::NonExistingVariable {
                    name: path.to_string(),
                })?;
            assign(slot, rest, value, path)
        }
        (Accessor::Index(i), ParamType::Data(StructuredMemoryData::Array(items))) => {
            if rest.is_empty() && *i == items.len() {
                items.push(value);
                return Ok(());
            }
            let len = items.len();
            let slot = items.get_mut(*i).ok_or_else(|| {
                invalid_path(
                    path,
                    &format!("index {} out of range for length {}", i, len),
                )
            })?;
            assign(slot, rest, value, path)
        }
        (accessor, other) => Err(invalid_path(
            path,
            &format!("cannot apply `{}` to {}", accessor, other.type_name()),
        )),
    }
}

/// Assign, creating containers along the way
fn materialize(
    path: &str,
    cell: &mut ParamType,
    accessors: &[Accessor],
    value: ParamType,
) -> Result<()> {
    let Some((first, rest)) = accessors.split_first() else {
        *cell = value;
        return Ok(());
    };

    match (first, cell) {
        (Accessor::Field(name), ParamType::Data(StructuredMemoryData::Object(fields))) => {
            let slot = fields
                .entry(name.clone())
                .or_insert(ParamType::Number(0.0));
            materialize(path, slot, rest, value)
        }
        (Accessor::Index(i), ParamType::Data(StructuredMemoryData::Array(items))) => {
            let len = i
                .checked_add(1)
                .filter(|&len| len <= MAX_INDEX + 1)
                .ok_or_else(|| {
                    invalid_path(path, &format!("index {} exceeds the limit of {}", i, MAX_INDEX))
                })?;
            if items.len() < len {
                items.resize(len, ParamType::Number(0.0));
            }
            materialize(path, &mut items[*i], rest, value)
        }
        (Accessor::Field(_), cell) => {
            *cell = ParamType::Data(StructuredMemoryData::Object(IndexMap::new()));
            materialize(path, cell, accessors, value)
        }
        (Accessor::Index(_), cell) => {
            *cell = ParamType::Data(StructuredMemoryData::Array(Vec::new()));
            materialize(path, cell, accessors, value)
        }
    }
}
