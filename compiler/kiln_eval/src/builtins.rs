//! Builtin functions and methods of builtin types.

use std::rc::Rc;

use kiln_diagnostic::RenderErrorKind;
use smallvec::SmallVec;

use crate::context::Context;
use crate::value::{Markup, Value};

/// Evaluated call arguments.
#[derive(Debug, Default)]
pub struct Args {
    pub positional: SmallVec<[Value; 4]>,
    pub keywords: Vec<(String, Value)>,
}

impl Args {
    /// Positional arguments only; rejects keywords and bad counts.
    fn exact(self, function: &str, min: usize, max: usize) -> Result<SmallVec<[Value; 4]>, RenderErrorKind> {
        if let Some((name, _)) = self.keywords.into_iter().next() {
            return Err(RenderErrorKind::UnexpectedArgument {
                function: function.to_owned(),
                name,
            });
        }
        let got = self.positional.len();
        if got > max {
            return Err(RenderErrorKind::TooManyArguments {
                function: function.to_owned(),
                expected: max,
                got,
            });
        }
        if got < min {
            return Err(RenderErrorKind::MissingArgument {
                function: function.to_owned(),
                param: format!("#{}", got + 1),
            });
        }
        Ok(self.positional)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Builtin {
    /// `literal(x)`: mark text as safe markup.
    Literal,
    /// `defined(name)`: is `name` a render variable?
    Defined,
    /// `value_of(name, default=None)`
    ValueOf,
    Len,
    Range,
    Str,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        match name {
            "literal" => Some(Builtin::Literal),
            "defined" => Some(Builtin::Defined),
            "value_of" => Some(Builtin::ValueOf),
            "len" => Some(Builtin::Len),
            "range" => Some(Builtin::Range),
            "str" => Some(Builtin::Str),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Literal => "literal",
            Builtin::Defined => "defined",
            Builtin::ValueOf => "value_of",
            Builtin::Len => "len",
            Builtin::Range => "range",
            Builtin::Str => "str",
        }
    }

    pub(crate) fn call(self, args: Args, vars: &Context) -> Result<Value, RenderErrorKind> {
        let name = self.name();
        match self {
            Builtin::Literal => {
                let [value] = one(args.exact(name, 1, 1)?);
                Ok(Value::Markup(Markup::from(value.to_text())))
            }
            Builtin::Defined => {
                let [value] = one(args.exact(name, 1, 1)?);
                Ok(Value::Bool(vars.contains(&value.to_text())))
            }
            Builtin::ValueOf => {
                let mut args = args.exact(name, 1, 2)?.into_iter();
                let key = args.next().unwrap_or_default().to_text();
                let default = args.next().unwrap_or_default();
                Ok(vars.get(&key).cloned().unwrap_or(default))
            }
            Builtin::Len => {
                let [value] = one(args.exact(name, 1, 1)?);
                let len = match &value {
                    Value::Str(_) | Value::Markup(_) => value.as_text().unwrap_or_default().chars().count(),
                    Value::List(items) => items.len(),
                    Value::Map(entries) => entries.len(),
                    other => {
                        return Err(RenderErrorKind::UnsupportedOperand {
                            op: "len",
                            operand: other.type_name(),
                        })
                    }
                };
                Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
            }
            Builtin::Range => range(&args.exact(name, 1, 3)?),
            Builtin::Str => {
                let [value] = one(args.exact(name, 1, 1)?);
                Ok(Value::from(value.to_text()))
            }
        }
    }
}

/// The single argument of a one-argument builtin.
fn one(args: SmallVec<[Value; 4]>) -> [Value; 1] {
    [args.into_iter().next().unwrap_or_default()]
}

fn int_arg(value: &Value) -> Result<i64, RenderErrorKind> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(RenderErrorKind::UnsupportedOperand {
            op: "range",
            operand: other.type_name(),
        }),
    }
}

fn range(args: &[Value]) -> Result<Value, RenderErrorKind> {
    let ints = args.iter().map(int_arg).collect::<Result<SmallVec<[i64; 3]>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => (0, 0, 1),
    };
    if step == 0 {
        return Err(RenderErrorKind::Custom("range() step must not be zero".into()));
    }
    let mut items = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        items.push(Value::Int(i));
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(Value::List(Rc::new(items)))
}

fn no_args(receiver: &Value, method: &str, args: Args) -> Result<(), RenderErrorKind> {
    args.exact(&format!("{}.{method}", receiver.type_name()), 0, 0)
        .map(drop)
}

/// Call a method of a string, markup or map value.
pub(crate) fn call_method(receiver: &Value, method: &str, args: Args) -> Result<Value, RenderErrorKind> {
    let no_attribute = || RenderErrorKind::NoAttribute {
        type_name: receiver.type_name(),
        name: method.to_owned(),
    };
    match receiver {
        Value::Str(_) | Value::Markup(_) => {
            let text = receiver.as_text().unwrap_or_default();
            let result = match method {
                "upper" => text.to_uppercase(),
                "lower" => text.to_lowercase(),
                "strip" => text.trim().to_owned(),
                _ => return Err(no_attribute()),
            };
            no_args(receiver, method, args)?;
            Ok(match receiver {
                Value::Markup(_) => Value::Markup(Markup::from(result)),
                _ => Value::from(result),
            })
        }
        Value::Map(entries) => match method {
            "items" => {
                no_args(receiver, method, args)?;
                Ok(Value::List(Rc::new(
                    entries
                        .iter()
                        .map(|(k, v)| Value::list([Value::from(k.as_str()), v.clone()]))
                        .collect(),
                )))
            }
            "keys" => {
                no_args(receiver, method, args)?;
                Ok(Value::list(entries.keys().map(String::as_str)))
            }
            "values" => {
                no_args(receiver, method, args)?;
                Ok(Value::list(entries.values().cloned()))
            }
            "get" => {
                let mut args = args.exact("map.get", 1, 2)?.into_iter();
                let key = args.next().unwrap_or_default().to_text();
                let default = args.next().unwrap_or_default();
                Ok(entries.get(&key).cloned().unwrap_or(default))
            }
            _ => Err(no_attribute()),
        },
        _ => Err(no_attribute()),
    }
}
