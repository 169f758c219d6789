//! Operator semantics
//!
//! Integer arithmetic is 64-bit and checked: results that do not fit raise
//! `OverflowError`. Floor division and modulo round toward negative infinity.

use crate::ast::{BinOp, UnaryOp};
use crate::error::{FaultKind, ScriptError, ScriptResult};
use crate::value::{Num, Value};

/// Largest sequence the interpreter will build in one operation
pub(crate) const MAX_SEQUENCE_LEN: usize = 10_000_000;

pub(crate) fn unary(op: UnaryOp, value: &Value) -> ScriptResult<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Neg => match value.as_num() {
            Some(Num::Int(v)) => v.checked_neg().map(Value::Int).ok_or_else(ScriptError::overflow),
            Some(Num::Float(v)) => Ok(Value::Float(-v)),
            None => Err(bad_unary("-", value)),
        },
        UnaryOp::Pos => match value.as_num() {
            Some(Num::Int(v)) => Ok(Value::Int(v)),
            Some(Num::Float(v)) => Ok(Value::Float(v)),
            None => Err(bad_unary("+", value)),
        },
    }
}

pub(crate) fn binary(op: BinOp, left: &Value, right: &Value) -> ScriptResult<Value> {
    if let (Some(a), Some(b)) = (left.as_num(), right.as_num()) {
        return numeric(op, a, b);
    }
    match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (BinOp::Add, Value::List(a), Value::List(b)) => Ok(Value::list(concat(a, b)?)),
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => Ok(Value::tuple(concat(a, b)?)),
        (BinOp::Mul, seq, count) | (BinOp::Mul, count, seq)
            if matches!(seq, Value::Str(_) | Value::List(_) | Value::Tuple(_))
                && matches!(count, Value::Int(_) | Value::Bool(_)) =>
        {
            repeat(seq, count.as_index()?)
        }
        _ => Err(ScriptError::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn numeric(op: BinOp, a: Num, b: Num) -> ScriptResult<Value> {
    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        return int_op(op, x, y);
    }
    let (x, y) = (a.as_f64(), b.as_f64());
    let v = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => {
            if y == 0.0 {
                return Err(ScriptError::new(FaultKind::ZeroDivisionError, "float division by zero"));
            }
            x / y
        }
        BinOp::FloorDiv => {
            if y == 0.0 {
                return Err(ScriptError::new(
                    FaultKind::ZeroDivisionError,
                    "float floor division by zero",
                ));
            }
            (x / y).floor()
        }
        BinOp::Mod => {
            if y == 0.0 {
                return Err(ScriptError::new(FaultKind::ZeroDivisionError, "float modulo"));
            }
            let r = x % y;
            if r != 0.0 && (r < 0.0) != (y < 0.0) {
                r + y
            } else {
                r
            }
        }
        BinOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(ScriptError::new(
                    FaultKind::ZeroDivisionError,
                    "0.0 cannot be raised to a negative power",
                ));
            }
            x.powf(y)
        }
    };
    if v.is_infinite() && x.is_finite() && y.is_finite() {
        return Err(ScriptError::new(FaultKind::OverflowError, "numerical result out of range"));
    }
    Ok(Value::Float(v))
}

#[allow(clippy::cast_precision_loss)]
fn int_op(op: BinOp, x: i64, y: i64) -> ScriptResult<Value> {
    let checked = |v: Option<i64>| v.map(Value::Int).ok_or_else(ScriptError::overflow);
    match op {
        BinOp::Add => checked(x.checked_add(y)),
        BinOp::Sub => checked(x.checked_sub(y)),
        BinOp::Mul => checked(x.checked_mul(y)),
        BinOp::Div => {
            if y == 0 {
                return Err(ScriptError::zero_division());
            }
            Ok(Value::Float(x as f64 / y as f64))
        }
        BinOp::FloorDiv => {
            if y == 0 {
                return Err(int_zero_division());
            }
            let q = x.checked_div(y).ok_or_else(ScriptError::overflow)?;
            Ok(Value::Int(if (x % y != 0) && ((x < 0) != (y < 0)) { q - 1 } else { q }))
        }
        BinOp::Mod => {
            if y == 0 {
                return Err(int_zero_division());
            }
            let r = x.checked_rem(y).ok_or_else(ScriptError::overflow)?;
            Ok(Value::Int(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r }))
        }
        BinOp::Pow => {
            if y < 0 {
                return numeric(op, Num::Float(x as f64), Num::Float(y as f64));
            }
            let exp = u32::try_from(y).map_err(|_| ScriptError::overflow())?;
            checked(x.checked_pow(exp))
        }
    }
}

fn int_zero_division() -> ScriptError {
    ScriptError::new(
        FaultKind::ZeroDivisionError,
        "integer division or modulo by zero",
    )
}

fn concat(a: &[Value], b: &[Value]) -> ScriptResult<Vec<Value>> {
    if a.len() + b.len() > MAX_SEQUENCE_LEN {
        return Err(too_large());
    }
    Ok(a.iter().chain(b).cloned().collect())
}

fn repeat(seq: &Value, count: i64) -> ScriptResult<Value> {
    let times = usize::try_from(count.max(0)).map_err(|_| too_large())?;
    let len = match seq {
        Value::Str(s) => s.len(),
        Value::List(items) | Value::Tuple(items) => items.len(),
        _ => 0,
    };
    if len.saturating_mul(times) > MAX_SEQUENCE_LEN {
        return Err(too_large());
    }
    Ok(match seq {
        Value::Str(s) => Value::Str(s.repeat(times)),
        Value::List(items) => Value::list(repeat_items(items, times)),
        Value::Tuple(items) => Value::tuple(repeat_items(items, times)),
        other => other.clone(),
    })
}

fn repeat_items(items: &[Value], times: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    out
}

pub(crate) fn too_large() -> ScriptError {
    ScriptError::new(FaultKind::MemoryError, "sequence too large")
}

fn bad_unary(symbol: &str, value: &Value) -> ScriptError {
    ScriptError::type_error(format!(
        "bad operand type for unary {symbol}: '{}'",
        value.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn int(v: i64) -> Value {
        Value::Int(v)
    }

    #[test]
    fn floor_division_rounds_down() {
        assert_eq!(binary(BinOp::FloorDiv, &int(7), &int(2)).unwrap(), int(3));
        assert_eq!(binary(BinOp::FloorDiv, &int(-7), &int(2)).unwrap(), int(-4));
        assert_eq!(binary(BinOp::Mod, &int(-7), &int(2)).unwrap(), int(1));
        assert_eq!(binary(BinOp::Mod, &int(7), &int(-2)).unwrap(), int(-1));
    }

    #[test]
    fn true_division_is_float() {
        assert_eq!(binary(BinOp::Div, &int(1), &int(2)).unwrap(), Value::Float(0.5));
        assert!(matches!(binary(BinOp::Div, &int(4), &int(2)).unwrap(), Value::Float(_)));
    }

    #[test]
    fn division_by_zero() {
        let err = binary(BinOp::Div, &int(1), &int(0)).unwrap_err();
        assert_eq!(err.kind, FaultKind::ZeroDivisionError);
        let err = binary(BinOp::Mod, &Value::Float(1.0), &int(0)).unwrap_err();
        assert_eq!(err.kind, FaultKind::ZeroDivisionError);
    }

    #[test]
    fn overflow_is_reported() {
        let err = binary(BinOp::Mul, &int(i64::MAX), &int(2)).unwrap_err();
        assert_eq!(err.kind, FaultKind::OverflowError);
        let err = binary(BinOp::Pow, &int(10), &int(40)).unwrap_err();
        assert_eq!(err.kind, FaultKind::OverflowError);
    }

    #[test]
    fn sequences() {
        let s = Value::Str("ab".into());
        assert_eq!(binary(BinOp::Mul, &s, &int(3)).unwrap(), Value::Str("ababab".into()));
        assert_eq!(binary(BinOp::Mul, &int(2), &s).unwrap(), Value::Str("abab".into()));
        let l = Value::list(vec![int(1)]);
        assert_eq!(
            binary(BinOp::Add, &l, &l).unwrap(),
            Value::list(vec![int(1), int(1)])
        );
        assert_eq!(binary(BinOp::Mul, &l, &int(-1)).unwrap(), Value::list(vec![]));
    }

    #[test]
    fn mixed_types_are_type_errors() {
        let err = binary(BinOp::Add, &int(1), &Value::Str("a".into())).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: unsupported operand type(s) for +: 'int' and 'str'");
    }

    #[test]
    fn negative_power_is_float() {
        assert_eq!(binary(BinOp::Pow, &int(2), &int(-1)).unwrap(), Value::Float(0.5));
    }

    #[test]
    fn huge_repetition_is_refused() {
        let err = binary(BinOp::Mul, &Value::list(vec![int(0)]), &int(i64::MAX)).unwrap_err();
        assert_eq!(err.kind, FaultKind::MemoryError);
    }

    proptest! {
        #[test]
        fn floor_div_and_mod_reconstruct_dividend(x in -10_000i64..10_000, y in -100i64..100) {
            prop_assume!(y != 0);
            let q = binary(BinOp::FloorDiv, &int(x), &int(y)).unwrap();
            let r = binary(BinOp::Mod, &int(x), &int(y)).unwrap();
            let (Value::Int(q), Value::Int(r)) = (q, r) else { unreachable!() };
            prop_assert_eq!(q * y + r, x);
            prop_assert!(r == 0 || (r < 0) == (y < 0));
        }
    }
}
