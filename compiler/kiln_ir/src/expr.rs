//! Expression AST.
//!
//! Expressions appear in `${...}` substitutions and in directive attributes
//! (`test`, `each`, `function`, ...). They are parsed once by the expander,
//! printed into the generated listing by the code generator, and parsed again
//! by the assembler. [`fmt::Display`] therefore prints a canonical, fully
//! parenthesized form that the expression parser accepts back unchanged.

use std::fmt;

/// A literal constant.
///
/// Floats are compared by bit pattern so `Expr` can be `Eq`.
#[derive(Clone, Debug)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::None, Literal::None) => true,
            (Literal::Bool(a), Literal::Bool(b)) => a == b,
            (Literal::Int(a), Literal::Int(b)) => a == b,
            (Literal::Float(a), Literal::Float(b)) => a.to_bits() == b.to_bits(),
            (Literal::Str(a), Literal::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Literal {}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

/// An expression tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    Attr {
        object: Box<Expr>,
        name: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `then if test else otherwise`
    Cond {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
}

impl Expr {
    pub fn name(name: impl Into<String>) -> Expr {
        Expr::Name(name.into())
    }

    pub fn str(value: impl Into<String>) -> Expr {
        Expr::Literal(Literal::Str(value.into()))
    }

    /// A call `callee()` with no arguments.
    pub fn call0(callee: Expr) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            args: Vec::new(),
            kwargs: Vec::new(),
        }
    }

    #[must_use]
    pub fn not(self) -> Expr {
        Expr::Unary(UnaryOp::Not, Box::new(self))
    }
}

/// Write `s` as a double-quoted literal the expression lexer reads back.
pub fn write_quoted(f: &mut impl fmt::Write, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{{{:x}}}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::None => f.write_str("None"),
            Literal::Bool(true) => f.write_str("True"),
            Literal::Bool(false) => f.write_str("False"),
            Literal::Int(n) => write!(f, "{n}"),
            // Debug keeps the decimal point (`1.0`, not `1`).
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::Str(s) => write_quoted(f, s),
        }
    }
}

fn write_list<T>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    mut each: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        each(f, item)?;
    }
    Ok(())
}

/// Literals are parenthesized before `.`, `[` and `(` so `(3).real` and
/// `(-1)[0]` read back with the same shape.
fn write_postfix_object(f: &mut fmt::Formatter<'_>, object: &Expr) -> fmt::Result {
    if matches!(object, Expr::Literal(_)) {
        write!(f, "({object})")
    } else {
        write!(f, "{object}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Name(name) => f.write_str(name),
            Expr::Attr { object, name } => {
                write_postfix_object(f, object)?;
                write!(f, ".{name}")
            }
            Expr::Index { object, index } => {
                write_postfix_object(f, object)?;
                write!(f, "[{index}]")
            }
            Expr::Call {
                callee,
                args,
                kwargs,
            } => {
                write_postfix_object(f, callee)?;
                f.write_str("(")?;
                write_list(f, args, |f, a| write!(f, "{a}"))?;
                if !args.is_empty() && !kwargs.is_empty() {
                    f.write_str(", ")?;
                }
                write_list(f, kwargs, |f, (k, v)| write!(f, "{k}={v}"))?;
                f.write_str(")")
            }
            Expr::Unary(UnaryOp::Not, operand) => write!(f, "(not {operand})"),
            Expr::Unary(UnaryOp::Neg, operand) => write!(f, "(-{operand})"),
            Expr::Binary(op, left, right) => write!(f, "({left} {} {right})", op.as_str()),
            Expr::Cond {
                test,
                then,
                otherwise,
            } => write!(f, "({then} if {test} else {otherwise})"),
            Expr::List(items) => {
                f.write_str("[")?;
                write_list(f, items, |f, e| write!(f, "{e}"))?;
                f.write_str("]")
            }
            Expr::Map(entries) => {
                f.write_str("{")?;
                write_list(f, entries, |f, (k, v)| write!(f, "{k}: {v}"))?;
                f.write_str("}")
            }
        }
    }
}
