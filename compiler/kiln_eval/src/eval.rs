//! Expression evaluation.
//!
//! Name resolution order:
//!
//! 1. frame locals (parameters, loop targets, `with` names)
//! 2. `local`, `self`, `parent`, `child`
//! 3. the instance's override table (blocks)
//! 4. the instance's imports
//! 5. render variables
//! 6. builtins

use std::collections::BTreeMap;
use std::rc::Rc;

use kiln_diagnostic::{RenderError, RenderErrorKind};
use kiln_ir::{BinaryOp, Expr};
use kiln_stack::ensure_sufficient_stack;

use crate::builtins::{call_method, Args, Builtin};
use crate::instance::Relation;
use crate::ops;
use crate::value::Value;
use crate::vm::{Frame, Machine};

fn map_key(key: &Value) -> Result<String, RenderErrorKind> {
    match key {
        Value::Str(_) | Value::Markup(_) | Value::Int(_) | Value::Bool(_) => Ok(key.to_text()),
        other => Err(RenderErrorKind::NotIndexable {
            type_name: "map",
            index_type: other.type_name(),
        }),
    }
}

impl Machine<'_> {
    pub(crate) fn eval(&mut self, frame: &Frame, expr: &Expr) -> Result<Value, RenderError> {
        ensure_sufficient_stack(|| self.eval_expr(frame, expr))
    }

    fn eval_expr(&mut self, frame: &Frame, expr: &Expr) -> Result<Value, RenderError> {
        match expr {
            Expr::Literal(lit) => Ok(Value::from_literal(lit)),
            Expr::Name(name) => Ok(self.lookup(frame, name)?),
            Expr::Attr { object, name } => {
                let object = self.eval(frame, object)?;
                Ok(self.attribute(&object, name)?)
            }
            Expr::Index { object, index } => {
                let object = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                Ok(ops::index(&object, &index)?)
            }
            Expr::Call {
                callee,
                args,
                kwargs,
            } => self.eval_call(frame, callee, args, kwargs),
            Expr::Unary(op, operand) => {
                let operand = self.eval(frame, operand)?;
                Ok(ops::unary(*op, &operand)?)
            }
            Expr::Binary(BinaryOp::And, left, right) => {
                let left = self.eval(frame, left)?;
                if left.is_truthy() {
                    self.eval(frame, right)
                } else {
                    Ok(left)
                }
            }
            Expr::Binary(BinaryOp::Or, left, right) => {
                let left = self.eval(frame, left)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(frame, right)
                }
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(frame, left)?;
                let right = self.eval(frame, right)?;
                Ok(ops::binary(*op, &left, &right)?)
            }
            Expr::Cond {
                test,
                then,
                otherwise,
            } => {
                if self.eval(frame, test)?.is_truthy() {
                    self.eval(frame, then)
                } else {
                    self.eval(frame, otherwise)
                }
            }
            Expr::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.eval(frame, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(Rc::new(items)))
            }
            Expr::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let key = map_key(&self.eval(frame, key)?)?;
                    let value = self.eval(frame, value)?;
                    map.insert(key, value);
                }
                Ok(Value::Map(Rc::new(map)))
            }
        }
    }

    fn lookup(&self, frame: &Frame, name: &str) -> Result<Value, RenderErrorKind> {
        if let Some(value) = frame.locals.get(name) {
            return Ok(value.clone());
        }
        let instances = &self.ctx.instances;
        if let Some(relation) = Relation::from_name(name) {
            return instances.relative(frame.instance, relation).map(Value::Template);
        }
        if let Some(block) = instances.resolve_override(frame.instance, name) {
            return Ok(Value::Block(block));
        }
        if let Some(imported) = instances.get(frame.instance).imports.get(name) {
            return Ok(Value::Template(*imported));
        }
        if let Some(value) = self.ctx.vars().get(name) {
            return Ok(value.clone());
        }
        Builtin::from_name(name)
            .map(Value::Builtin)
            .ok_or_else(|| RenderErrorKind::UndefinedName {
                name: name.to_owned(),
            })
    }

    /// `object.name` outside of a call.
    fn attribute(&self, object: &Value, name: &str) -> Result<Value, RenderErrorKind> {
        let no_attribute = || RenderErrorKind::NoAttribute {
            type_name: object.type_name(),
            name: name.to_owned(),
        };
        match object {
            Value::Template(id) => self.ctx.instances.resolve_method(*id, name).map(Value::Block),
            Value::Map(entries) => entries.get(name).cloned().ok_or_else(no_attribute),
            _ => Err(no_attribute()),
        }
    }

    fn eval_call(
        &mut self,
        frame: &Frame,
        callee: &Expr,
        args: &[Expr],
        kwargs: &[(String, Expr)],
    ) -> Result<Value, RenderError> {
        if let Expr::Attr { object, name } = callee {
            let receiver = self.eval(frame, object)?;
            if matches!(receiver, Value::Str(_) | Value::Markup(_) | Value::Map(_)) {
                let field = match &receiver {
                    Value::Map(entries) => entries.get(name).cloned(),
                    _ => None,
                };
                let args = self.eval_args(frame, args, kwargs)?;
                return match field {
                    Some(function) => self.call_value(function, args),
                    None => Ok(call_method(&receiver, name, args)?),
                };
            }
            let function = self.attribute(&receiver, name)?;
            let args = self.eval_args(frame, args, kwargs)?;
            return self.call_value(function, args);
        }
        let function = self.eval(frame, callee)?;
        let args = self.eval_args(frame, args, kwargs)?;
        self.call_value(function, args)
    }

    fn eval_args(
        &mut self,
        frame: &Frame,
        args: &[Expr],
        kwargs: &[(String, Expr)],
    ) -> Result<Args, RenderError> {
        let mut out = Args::default();
        for arg in args {
            out.positional.push(self.eval(frame, arg)?);
        }
        for (name, arg) in kwargs {
            let value = self.eval(frame, arg)?;
            out.keywords.push((name.clone(), value));
        }
        Ok(out)
    }

    fn call_value(&mut self, function: Value, args: Args) -> Result<Value, RenderError> {
        match function {
            Value::Block(target) => self.call_block(target, args).map(Value::Markup),
            Value::Builtin(builtin) => Ok(builtin.call(args, self.ctx.vars())?),
            Value::Native(native) => {
                if let Some((name, _)) = args.keywords.first() {
                    return Err(RenderErrorKind::UnexpectedArgument {
                        function: "<function>".into(),
                        name: name.clone(),
                    }
                    .into());
                }
                native
                    .call(&args.positional)
                    .map_err(|message| RenderErrorKind::Custom(message).into())
            }
            other => Err(RenderErrorKind::NotCallable {
                type_name: other.type_name(),
            }
            .into()),
        }
    }
}
