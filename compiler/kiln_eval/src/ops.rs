//! Operators, indexing and iteration.
//!
//! Dispatch is a direct match on the operand pair. Integer arithmetic is
//! checked; `//` and `%` floor toward negative infinity.

use std::cmp::Ordering;
use std::rc::Rc;

use kiln_diagnostic::RenderErrorKind;
use kiln_ir::{BinaryOp, UnaryOp};

use crate::value::{Markup, Value};

type OpResult = Result<Value, RenderErrorKind>;

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> RenderErrorKind {
    RenderErrorKind::UnsupportedOperands {
        op: op.as_str(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

#[inline]
fn checked(result: Option<i64>, op: BinaryOp) -> OpResult {
    result
        .map(Value::Int)
        .ok_or(RenderErrorKind::IntegerOverflow { op: op.as_str() })
}

#[allow(clippy::cast_precision_loss)]
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(x) => Some(*x),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Equality used by `==`, `in` and `case`: numbers compare numerically,
/// strings and markup compare by text.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .zip(b.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && loose_eq(va, vb))
        }
        (Value::Template(a), Value::Template(b)) => a == b,
        (Value::Block(a), Value::Block(b)) => a == b,
        (Value::Builtin(a), Value::Builtin(b)) => a == b,
        _ => match (left.as_text(), right.as_text()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => match (as_int(left), as_int(right)) {
                (Some(a), Some(b)) => a == b,
                _ => match (as_number(left), as_number(right)) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                },
            },
            _ => false,
        },
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Ordering, RenderErrorKind> {
    if let (Some(a), Some(b)) = (as_int(left), as_int(right)) {
        return Ok(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (as_number(left), as_number(right)) {
        return a.partial_cmp(&b).ok_or_else(|| mismatch(op, left, right));
    }
    if let (Some(a), Some(b)) = (left.as_text(), right.as_text()) {
        return Ok(a.cmp(b));
    }
    if let (Value::List(a), Value::List(b)) = (left, right) {
        for (x, y) in a.iter().zip(b.iter()) {
            if !loose_eq(x, y) {
                return compare(op, x, y);
            }
        }
        return Ok(a.len().cmp(&b.len()));
    }
    Err(mismatch(op, left, right))
}

/// Does `container` contain `item`?
pub fn contains(container: &Value, item: &Value) -> Result<bool, RenderErrorKind> {
    match container {
        Value::List(items) => Ok(items.iter().any(|x| loose_eq(x, item))),
        Value::Map(entries) => Ok(item.as_text().is_some_and(|key| entries.contains_key(key))),
        Value::Str(_) | Value::Markup(_) => match (container.as_text(), item.as_text()) {
            (Some(haystack), Some(needle)) => Ok(haystack.contains(needle)),
            _ => Err(mismatch(BinaryOp::In, item, container)),
        },
        _ => Err(mismatch(BinaryOp::In, item, container)),
    }
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        r.checked_add(b)
    } else {
        Some(r)
    }
}

#[allow(clippy::cast_precision_loss)]
fn int_binary(op: BinaryOp, a: i64, b: i64) -> OpResult {
    match op {
        BinaryOp::Add => checked(a.checked_add(b), op),
        BinaryOp::Sub => checked(a.checked_sub(b), op),
        BinaryOp::Mul => checked(a.checked_mul(b), op),
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if b == 0 => {
            Err(RenderErrorKind::DivisionByZero)
        }
        BinaryOp::Div => Ok(Value::Float(a as f64 / b as f64)),
        BinaryOp::FloorDiv => checked(floor_div(a, b), op),
        BinaryOp::Mod => checked(floor_mod(a, b), op),
        _ => Err(mismatch(op, &Value::Int(a), &Value::Int(b))),
    }
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> OpResult {
    match op {
        BinaryOp::Add => Ok(Value::Float(a + b)),
        BinaryOp::Sub => Ok(Value::Float(a - b)),
        BinaryOp::Mul => Ok(Value::Float(a * b)),
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if b == 0.0 => {
            Err(RenderErrorKind::DivisionByZero)
        }
        BinaryOp::Div => Ok(Value::Float(a / b)),
        BinaryOp::FloorDiv => Ok(Value::Float((a / b).floor())),
        BinaryOp::Mod => Ok(Value::Float(a - b * (a / b).floor())),
        _ => Err(mismatch(op, &Value::Float(a), &Value::Float(b))),
    }
}

fn repeat<T: Clone>(items: &[T], times: i64) -> Vec<T> {
    let times = usize::try_from(times).unwrap_or(0);
    let mut out = Vec::with_capacity(items.len().saturating_mul(times));
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    out
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
            match (as_int(left), as_int(right)) {
                (Some(a), Some(b)) => int_binary(op, a, b),
                _ => Err(mismatch(op, left, right)),
            }
        }
        (Value::Float(_), Value::Int(_) | Value::Float(_) | Value::Bool(_))
        | (Value::Int(_) | Value::Bool(_), Value::Float(_)) => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => float_binary(op, a, b),
            _ => Err(mismatch(op, left, right)),
        },
        (Value::Markup(a), Value::Markup(b)) if op == BinaryOp::Add => {
            Ok(Value::Markup(Markup::from(format!("{a}{b}"))))
        }
        (Value::Str(_) | Value::Markup(_), Value::Str(_) | Value::Markup(_)) if op == BinaryOp::Add => {
            Ok(Value::from(format!("{}{}", left.to_text(), right.to_text())))
        }
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) if op == BinaryOp::Mul => {
            Ok(Value::from(s.repeat(usize::try_from(*n).unwrap_or(0))))
        }
        (Value::List(a), Value::List(b)) if op == BinaryOp::Add => {
            let mut items = Vec::with_capacity(a.len() + b.len());
            items.extend(a.iter().cloned());
            items.extend(b.iter().cloned());
            Ok(Value::List(Rc::new(items)))
        }
        (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) if op == BinaryOp::Mul => {
            Ok(Value::List(Rc::new(repeat(items, *n))))
        }
        _ => Err(mismatch(op, left, right)),
    }
}

/// Evaluate every binary operator except the short-circuiting `and`/`or`.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> OpResult {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(left, right))),
        BinaryOp::NotEq => Ok(Value::Bool(!loose_eq(left, right))),
        BinaryOp::Lt => Ok(Value::Bool(compare(op, left, right)?.is_lt())),
        BinaryOp::LtEq => Ok(Value::Bool(compare(op, left, right)?.is_le())),
        BinaryOp::Gt => Ok(Value::Bool(compare(op, left, right)?.is_gt())),
        BinaryOp::GtEq => Ok(Value::Bool(compare(op, left, right)?.is_ge())),
        BinaryOp::In => Ok(Value::Bool(contains(right, left)?)),
        BinaryOp::NotIn => Ok(Value::Bool(!contains(right, left)?)),
        BinaryOp::And => Ok(if left.is_truthy() { right.clone() } else { left.clone() }),
        BinaryOp::Or => Ok(if left.is_truthy() { left.clone() } else { right.clone() }),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod => {
            arithmetic(op, left, right)
        }
    }
}

pub fn unary(op: UnaryOp, operand: &Value) -> OpResult {
    match (op, operand) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or(RenderErrorKind::IntegerOverflow { op: "-" }),
        (UnaryOp::Neg, Value::Bool(b)) => Ok(Value::Int(-i64::from(*b))),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Neg, other) => Err(RenderErrorKind::UnsupportedOperand {
            op: "-",
            operand: other.type_name(),
        }),
    }
}

fn normalize_index(index: i64, len: usize) -> Result<usize, RenderErrorKind> {
    let out_of_range = || RenderErrorKind::IndexOutOfRange { index, len };
    let resolved = if index < 0 {
        i64::try_from(len).map_err(|_| out_of_range())?.checked_add(index)
    } else {
        Some(index)
    };
    resolved
        .and_then(|i| usize::try_from(i).ok())
        .filter(|&i| i < len)
        .ok_or_else(out_of_range)
}

/// `object[index]`. Negative indices count from the end.
pub fn index(object: &Value, index: &Value) -> OpResult {
    match (object, index) {
        (Value::List(items), Value::Int(i)) => Ok(items[normalize_index(*i, items.len())?].clone()),
        (Value::Str(_) | Value::Markup(_), Value::Int(i)) => {
            let text = object.as_text().unwrap_or_default();
            let len = text.chars().count();
            let at = normalize_index(*i, len)?;
            Ok(text
                .chars()
                .nth(at)
                .map_or(Value::None, |c| Value::from(c.to_string())))
        }
        (Value::Map(entries), key) => {
            let key_text = key.to_text();
            entries
                .get(&key_text)
                .cloned()
                .ok_or(RenderErrorKind::KeyNotFound { key: key_text })
        }
        _ => Err(RenderErrorKind::NotIndexable {
            type_name: object.type_name(),
            index_type: index.type_name(),
        }),
    }
}

/// Materialize the items a `for` loop visits. Maps yield their keys,
/// strings their characters.
pub fn iterate(value: &Value) -> Result<Vec<Value>, RenderErrorKind> {
    match value {
        Value::List(items) => Ok(items.as_ref().clone()),
        Value::Map(entries) => Ok(entries.keys().map(|k| Value::from(k.as_str())).collect()),
        Value::Str(_) | Value::Markup(_) => Ok(value
            .as_text()
            .unwrap_or_default()
            .chars()
            .map(|c| Value::from(c.to_string()))
            .collect()),
        other => Err(RenderErrorKind::NotIterable {
            type_name: other.type_name(),
        }),
    }
}
