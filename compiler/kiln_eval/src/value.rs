//! Runtime values.
//!
//! Values are cheap to clone: strings, lists and maps are reference
//! counted. A render is single-threaded, so `Rc` is enough.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use kiln_ir::Literal;

use crate::builtins::Builtin;
use crate::instance::{FuncRef, InstanceId};

/// Text that is already safe to write into the output unescaped.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Markup(Rc<str>);

impl Markup {
    pub fn new(text: impl Into<Rc<str>>) -> Self {
        Markup(text.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Markup {
    fn from(text: String) -> Self {
        Markup(text.into())
    }
}

impl From<&str> for Markup {
    fn from(text: &str) -> Self {
        Markup(text.into())
    }
}

/// A host function exposed to templates through the render context.
#[derive(Clone)]
pub struct NativeFn(Rc<dyn Fn(&[Value]) -> Result<Value, String>>);

impl NativeFn {
    pub fn new(f: impl Fn(&[Value]) -> Result<Value, String> + 'static) -> Self {
        NativeFn(Rc::new(f))
    }

    pub(crate) fn call(&self, args: &[Value]) -> Result<Value, String> {
        (self.0)(args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeFn")
    }
}

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Markup(Markup),
    List(Rc<Vec<Value>>),
    Map(Rc<BTreeMap<String, Value>>),
    /// A template instance (`self`, `parent`, an import alias, ...).
    Template(InstanceId),
    /// A block bound to the instance it runs in.
    Block(FuncRef),
    Builtin(Builtin),
    Native(NativeFn),
}

impl Value {
    pub fn str(text: impl Into<Rc<str>>) -> Value {
        Value::Str(text.into())
    }

    pub fn markup(text: impl Into<Rc<str>>) -> Value {
        Value::Markup(Markup::new(text))
    }

    pub fn list(items: impl IntoIterator<Item = impl Into<Value>>) -> Value {
        Value::List(Rc::new(items.into_iter().map(Into::into).collect()))
    }

    pub fn map<K: Into<String>, V: Into<Value>>(entries: impl IntoIterator<Item = (K, V)>) -> Value {
        Value::Map(Rc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn function(f: impl Fn(&[Value]) -> Result<Value, String> + 'static) -> Value {
        Value::Native(NativeFn::new(f))
    }

    pub(crate) fn from_literal(lit: &Literal) -> Value {
        match lit {
            Literal::None => Value::None,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(n) => Value::Int(*n),
            Literal::Float(x) => Value::Float(*x),
            Literal::Str(s) => Value::str(s.as_str()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Markup(_) => "markup",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Template(_) => "template",
            Value::Block(_) => "block",
            Value::Builtin(_) | Value::Native(_) => "function",
        }
    }

    /// `None`, `False`, zero, and empty strings, lists and maps are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Markup(m) => !m.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Template(_) | Value::Block(_) | Value::Builtin(_) | Value::Native(_) => true,
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// The text of a string or markup value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Markup(m) => Some(m.as_str()),
            _ => None,
        }
    }

    /// The text form written into output; `None` is empty.
    pub fn to_text(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Markup(m) => m.as_str().to_owned(),
            other => other.to_string(),
        }
    }

    fn write_repr(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Str(s) => write_single_quoted(f, s),
            Value::Markup(m) => write_single_quoted(f, m.as_str()),
            other => write!(f, "{other}"),
        }
    }
}

fn write_single_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in s.chars() {
        match c {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("'")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => Ok(()),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => f.write_str(s),
            Value::Markup(m) => f.write_str(m.as_str()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write_repr(f)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_single_quoted(f, key)?;
                    f.write_str(": ")?;
                    value.write_repr(f)?;
                }
                f.write_str("}")
            }
            Value::Template(_) => f.write_str("<template>"),
            Value::Block(_) => f.write_str("<block>"),
            Value::Builtin(b) => write!(f, "<builtin {}>", b.name()),
            Value::Native(_) => f.write_str("<function>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<Markup> for Value {
    fn from(m: Markup) -> Self {
        Value::Markup(m)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::None, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items)
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(entries: BTreeMap<String, V>) -> Self {
        Value::map(entries)
    }
}
