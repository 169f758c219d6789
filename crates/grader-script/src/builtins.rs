//! Builtin functions

use crate::ast::BinOp;
use crate::error::{FaultKind, ScriptError, ScriptResult};
use crate::ops::{self, too_large, MAX_SEQUENCE_LEN};
use crate::output::Output;
use crate::value::{Num, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Abs,
    Bool,
    Float,
    Int,
    Len,
    List,
    Max,
    Min,
    Print,
    Range,
    Repr,
    Sorted,
    Str,
    Sum,
    Tuple,
}

const ALL: &[Builtin] = &[
    Builtin::Abs,
    Builtin::Bool,
    Builtin::Float,
    Builtin::Int,
    Builtin::Len,
    Builtin::List,
    Builtin::Max,
    Builtin::Min,
    Builtin::Print,
    Builtin::Range,
    Builtin::Repr,
    Builtin::Sorted,
    Builtin::Str,
    Builtin::Sum,
    Builtin::Tuple,
];

impl Builtin {
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        ALL.iter().copied().find(|b| b.name() == name)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Builtin::Abs => "abs",
            Builtin::Bool => "bool",
            Builtin::Float => "float",
            Builtin::Int => "int",
            Builtin::Len => "len",
            Builtin::List => "list",
            Builtin::Max => "max",
            Builtin::Min => "min",
            Builtin::Print => "print",
            Builtin::Range => "range",
            Builtin::Repr => "repr",
            Builtin::Sorted => "sorted",
            Builtin::Str => "str",
            Builtin::Sum => "sum",
            Builtin::Tuple => "tuple",
        }
    }

    pub(crate) fn call(self, args: Vec<Value>, output: &Output) -> ScriptResult<Value> {
        match self {
            Builtin::Abs => match self.one(args)?.as_num() {
                Some(Num::Int(v)) => v.checked_abs().map(Value::Int).ok_or_else(ScriptError::overflow),
                Some(Num::Float(v)) => Ok(Value::Float(v.abs())),
                None => Err(ScriptError::type_error("bad operand type for abs()")),
            },
            Builtin::Bool => Ok(Value::Bool(
                self.optional(args)?.is_some_and(|v| v.is_truthy()),
            )),
            Builtin::Float => self.optional(args)?.map_or(Ok(Value::Float(0.0)), |v| to_float(&v)),
            Builtin::Int => self.optional(args)?.map_or(Ok(Value::Int(0)), |v| to_int(&v)),
            Builtin::Len => {
                let v = self.one(args)?;
                let len = match &v {
                    Value::Str(s) => s.chars().count(),
                    Value::List(items) | Value::Tuple(items) => items.len(),
                    other => {
                        return Err(ScriptError::type_error(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        )))
                    }
                };
                i64::try_from(len).map(Value::Int).map_err(|_| ScriptError::overflow())
            }
            Builtin::List => Ok(Value::list(match self.optional(args)? {
                Some(v) => v.iter_items()?,
                None => Vec::new(),
            })),
            Builtin::Tuple => Ok(Value::tuple(match self.optional(args)? {
                Some(v) => v.iter_items()?,
                None => Vec::new(),
            })),
            Builtin::Max => self.extreme(args, Ordering::Greater),
            Builtin::Min => self.extreme(args, Ordering::Less),
            Builtin::Print => {
                let line = args.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");
                output.write_line(&line);
                Ok(Value::None)
            }
            Builtin::Range => range(self, &args),
            Builtin::Repr => Ok(Value::Str(self.one(args)?.repr())),
            Builtin::Str => Ok(Value::Str(
                self.optional(args)?.map(|v| v.to_string()).unwrap_or_default(),
            )),
            Builtin::Sorted => {
                let mut items = self.one(args)?.iter_items()?;
                sort_values(&mut items)?;
                Ok(Value::list(items))
            }
            Builtin::Sum => {
                let (iterable, start) = match args.len() {
                    1 | 2 => {
                        let mut it = args.into_iter();
                        let iterable = it.next().unwrap_or(Value::None);
                        (iterable, it.next().unwrap_or(Value::Int(0)))
                    }
                    n => return Err(self.arity("1 or 2", n)),
                };
                iterable
                    .iter_items()?
                    .iter()
                    .try_fold(start, |acc, v| ops::binary(BinOp::Add, &acc, v))
            }
        }
    }

    fn one(self, args: Vec<Value>) -> ScriptResult<Value> {
        let n = args.len();
        let mut it = args.into_iter();
        match (it.next(), it.next()) {
            (Some(v), None) => Ok(v),
            _ => Err(self.arity("exactly one", n)),
        }
    }

    fn optional(self, args: Vec<Value>) -> ScriptResult<Option<Value>> {
        if args.len() > 1 {
            return Err(self.arity("at most one", args.len()));
        }
        Ok(args.into_iter().next())
    }

    fn arity(self, expected: &str, given: usize) -> ScriptError {
        ScriptError::type_error(format!(
            "{}() takes {expected} argument(s) ({given} given)",
            self.name()
        ))
    }

    fn extreme(self, args: Vec<Value>, keep: Ordering) -> ScriptResult<Value> {
        let items = match args.len() {
            0 => return Err(self.arity("at least one", 0)),
            1 => self.one(args)?.iter_items()?,
            _ => args,
        };
        let mut it = items.into_iter();
        let Some(mut best) = it.next() else {
            return Err(ScriptError::value_error(format!(
                "{}() arg is an empty sequence",
                self.name()
            )));
        };
        for item in it {
            if item.compare(&best)? == keep {
                best = item;
            }
        }
        Ok(best)
    }
}

fn to_float(v: &Value) -> ScriptResult<Value> {
    match v {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ScriptError::value_error(format!("could not convert string to float: {}", v.repr()))),
        other => match other.as_num() {
            Some(n) => Ok(Value::Float(n.as_f64())),
            None => Err(ScriptError::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        },
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn to_int(v: &Value) -> ScriptResult<Value> {
    match v {
        Value::Str(s) => s.trim().replace('_', "").parse::<i64>().map(Value::Int).map_err(|_| {
            ScriptError::value_error(format!(
                "invalid literal for int() with base 10: {}",
                v.repr()
            ))
        }),
        Value::Float(f) => {
            if f.is_nan() {
                return Err(ScriptError::value_error("cannot convert float NaN to integer"));
            }
            let t = f.trunc();
            if t.is_infinite() || t >= i64::MAX as f64 || t < i64::MIN as f64 {
                Err(ScriptError::new(
                    FaultKind::OverflowError,
                    "cannot convert float to integer",
                ))
            } else {
                Ok(Value::Int(t as i64))
            }
        }
        other => other.as_index().map(Value::Int).map_err(|_| {
            ScriptError::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn range(builtin: Builtin, args: &[Value]) -> ScriptResult<Value> {
    let (start, stop, step) = match args {
        [stop] => (0, stop.as_index()?, 1),
        [start, stop] => (start.as_index()?, stop.as_index()?, 1),
        [start, stop, step] => (start.as_index()?, stop.as_index()?, step.as_index()?),
        _ => return Err(builtin.arity("1 to 3", args.len())),
    };
    if step == 0 {
        return Err(ScriptError::value_error("range() arg 3 must not be zero"));
    }
    let span = if step > 0 {
        i128::from(stop) - i128::from(start)
    } else {
        i128::from(start) - i128::from(stop)
    };
    let count = if span <= 0 {
        0
    } else {
        let step = i128::from(step).abs();
        (span + step - 1) / step
    };
    let count = usize::try_from(count).map_err(|_| too_large())?;
    if count > MAX_SEQUENCE_LEN {
        return Err(too_large());
    }
    let mut items = Vec::with_capacity(count);
    let mut current = start;
    for _ in 0..count {
        items.push(Value::Int(current));
        current = current.wrapping_add(step);
    }
    Ok(Value::list(items))
}

/// Stable sort by value ordering; the first incomparable pair aborts it
pub(crate) fn sort_values(items: &mut [Value]) -> ScriptResult<()> {
    let mut fault = None;
    items.sort_by(|a, b| match a.compare(b) {
        Ok(order) => order,
        Err(e) => {
            fault.get_or_insert(e);
            Ordering::Equal
        }
    });
    fault.map_or(Ok(()), Err)
}
