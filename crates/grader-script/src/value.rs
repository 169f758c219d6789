//! Runtime values
//!
//! Equality is value equality: numbers compare across `bool`/`int`/`float`,
//! containers compare element-wise, functions compare by identity.

use crate::ast::FunctionDef;
use crate::builtins::Builtin;
use crate::env::Environment;
use crate::error::{ScriptError, ScriptResult};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::fmt;
use std::mem;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

/// Local frame shared between a running call and the closures it creates
pub type SharedFrame = Arc<Mutex<Environment>>;

/// Globals of the module a function was defined in, filled once that module
/// has finished executing
pub type ModuleHome = Arc<OnceLock<Environment>>;

/// A user-defined function
pub struct Function {
    pub def: Arc<FunctionDef>,
    /// Enclosing function frames, innermost first
    pub captured: Vec<SharedFrame>,
    /// `None` for functions defined directly in the caller's environment
    pub home: Option<ModuleHome>,
}

impl Function {
    /// Move out everything only this function keeps alive
    fn detach_into(&mut self, pending: &mut Vec<Value>) {
        for frame in &mut self.captured {
            if let Some(frame) = Arc::get_mut(frame) {
                pending.extend(frame.get_mut().take_values());
            }
        }
        if let Some(env) = self.home.as_mut().and_then(Arc::get_mut).and_then(OnceLock::get_mut) {
            pending.extend(env.take_values());
        }
    }
}

// A chain of closures each capturing the frame that holds the previous one
// is unbounded, so teardown walks it with a worklist instead of recursing.
impl Drop for Function {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_into(&mut pending);
        while let Some(value) = pending.pop() {
            match value {
                Value::List(mut seq) | Value::Tuple(mut seq) => seq.detach_into(&mut pending),
                Value::Function(mut function) => {
                    if let Some(function) = Arc::get_mut(&mut function) {
                        function.detach_into(&mut pending);
                    }
                }
                _ => {}
            }
        }
    }
}

// Frames can refer back to the function through their bindings.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.def.name)
            .field("params", &self.def.params)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Seq),
    Tuple(Seq),
    Function(Arc<Function>),
    Builtin(Builtin),
}

/// Elements of a list or tuple
///
/// Storage is shared, so copying a binding never copies its elements.
/// Sequences are never mutated in place; every operation builds a new one.
#[derive(Clone)]
pub struct Seq {
    items: Arc<[Value]>,
    nesting: usize,
}

impl Seq {
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        let nesting = 1 + items.iter().map(Value::nesting).max().unwrap_or(0);
        Self {
            items: items.into(),
            nesting,
        }
    }

    /// Containers-within-containers depth, `1` for a flat sequence
    #[must_use]
    pub fn nesting(&self) -> usize {
        self.nesting
    }

    fn detach_into(&mut self, pending: &mut Vec<Value>) {
        if let Some(items) = Arc::get_mut(&mut self.items) {
            for item in items.iter_mut() {
                if matches!(item, Value::List(_) | Value::Tuple(_) | Value::Function(_)) {
                    pending.push(mem::replace(item, Value::None));
                }
            }
        }
    }
}

impl Deref for Seq {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.items
    }
}

impl From<Vec<Value>> for Seq {
    fn from(items: Vec<Value>) -> Self {
        Self::new(items)
    }
}

impl PartialEq for Seq {
    fn eq(&self, other: &Self) -> bool {
        self.items[..] == other.items[..]
    }
}

impl fmt::Debug for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

/// Numeric view used by arithmetic and comparisons
#[derive(Debug, Clone, Copy)]
pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::Float(v) => v,
        }
    }
}

impl Value {
    #[must_use]
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Seq::new(items))
    }

    #[must_use]
    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Seq::new(items))
    }

    /// How many containers deep the value goes; `0` for scalars
    #[must_use]
    pub fn nesting(&self) -> usize {
        match self {
            Value::List(seq) | Value::Tuple(seq) => seq.nesting(),
            _ => 0,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
        }
    }

    pub(crate) fn as_num(&self) -> Option<Num> {
        match self {
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Int(v) => Some(Num::Int(*v)),
            Value::Float(v) => Some(Num::Float(*v)),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Function(_) | Value::Builtin(_) => true,
        }
    }

    /// Integer view for indices, counts and `range` bounds
    pub fn as_index(&self) -> ScriptResult<i64> {
        match self {
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Int(v) => Ok(*v),
            other => Err(ScriptError::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                other.type_name()
            ))),
        }
    }

    /// Elements when the value is iterable
    pub fn iter_items(&self) -> ScriptResult<Vec<Value>> {
        match self {
            Value::List(items) | Value::Tuple(items) => Ok(items.to_vec()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            other => Err(ScriptError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Identity comparison (`is`); values without identity compare by value
    #[must_use]
    pub fn same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => false,
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`
    pub fn compare(&self, other: &Value) -> ScriptResult<Ordering> {
        if let (Some(a), Some(b)) = (self.as_num(), other.as_num()) {
            return match (a, b) {
                (Num::Int(x), Num::Int(y)) => Ok(x.cmp(&y)),
                _ => a
                    .as_f64()
                    .partial_cmp(&b.as_f64())
                    .ok_or_else(|| ScriptError::value_error("cannot order NaN")),
            };
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    if x != y {
                        return x.compare(y);
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => Err(ScriptError::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Membership test for `in`
    pub fn contains(&self, needle: &Value) -> ScriptResult<bool> {
        match self {
            Value::List(items) | Value::Tuple(items) => Ok(items.iter().any(|v| v == needle)),
            Value::Str(s) => match needle {
                Value::Str(n) => Ok(s.contains(n.as_str())),
                other => Err(ScriptError::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                ))),
            },
            other => Err(ScriptError::type_error(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Conventional printable representation (`'a'`, `[1, 2]`, `2.0`)
    #[must_use]
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => quote(s),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.as_num(), other.as_num()) {
            return match (a, b) {
                (Num::Int(x), Num::Int(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            };
        }
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => false,
        }
    }
}

/// `str()` rendering; `repr()` differs only for strings
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => f.write_str(&format_float(*v)),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Value::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Value::Function(func) => write!(f, "<function {}>", func.def.name),
            Value::Builtin(b) => write!(f, "<built-in function {}>", b.name()),
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        f.write_str(&item.repr())?;
    }
    Ok(())
}

pub(crate) fn format_float(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

fn quote(s: &str) -> String {
    let delim = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delim);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == delim => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delim);
    out
}
