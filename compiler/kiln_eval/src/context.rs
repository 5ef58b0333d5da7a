//! Render variables and per-render state.

use kiln_diagnostic::RenderErrorKind;
use rustc_hash::FxHashMap;

use crate::instance::Instances;
use crate::ops::loose_eq;
use crate::value::Value;

/// Frame-local bindings: parameters, loop targets and `with` names.
pub type Locals = FxHashMap<String, Value>;

/// Variables passed to a render.
#[derive(Clone, Debug, Default)]
pub struct Context {
    vars: FxHashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Context {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// State shared by every frame of one render.
#[derive(Debug)]
pub struct RenderContext {
    vars: Context,
    pub(crate) instances: Instances,
    switches: Vec<Value>,
    /// Values shadowed by each open `with`, `None` where the name was unbound.
    withs: Vec<Vec<(String, Option<Value>)>>,
}

impl RenderContext {
    pub fn new(vars: Context) -> Self {
        RenderContext {
            vars,
            instances: Instances::new(),
            switches: Vec::new(),
            withs: Vec::new(),
        }
    }

    pub fn vars(&self) -> &Context {
        &self.vars
    }

    pub fn push_switch(&mut self, value: Value) {
        self.switches.push(value);
    }

    pub fn pop_switch(&mut self) -> Option<Value> {
        self.switches.pop()
    }

    pub fn switch_depth(&self) -> usize {
        self.switches.len()
    }

    /// Does `value` match the innermost active switch?
    pub fn case(&self, value: &Value) -> Result<bool, RenderErrorKind> {
        self.switches
            .last()
            .map(|top| loose_eq(top, value))
            .ok_or(RenderErrorKind::NoActiveSwitch)
    }

    /// Record the current bindings of `names` so [`pop_with`](Self::pop_with)
    /// can restore them.
    pub fn push_with(&mut self, locals: &Locals, names: &[String]) {
        let saved = names
            .iter()
            .map(|name| (name.clone(), locals.get(name).cloned()))
            .collect();
        self.withs.push(saved);
    }

    /// Restore the bindings saved by the innermost `push_with`.
    pub fn pop_with(&mut self, locals: &mut Locals) {
        let Some(saved) = self.withs.pop() else {
            return;
        };
        for (name, previous) in saved.into_iter().rev() {
            match previous {
                Some(value) => {
                    locals.insert(name, value);
                }
                None => {
                    locals.remove(&name);
                }
            }
        }
    }

    pub fn with_depth(&self) -> usize {
        self.withs.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn nested_switches_restore_the_outer_value() {
        let mut ctx = RenderContext::new(Context::new());
        assert_eq!(ctx.case(&Value::Int(1)), Err(RenderErrorKind::NoActiveSwitch));

        ctx.push_switch(Value::Int(1));
        ctx.push_switch(Value::from("inner"));
        assert!(ctx.case(&Value::from("inner")).unwrap());
        assert!(!ctx.case(&Value::Int(1)).unwrap());
        ctx.pop_switch();

        assert!(ctx.case(&Value::Int(1)).unwrap());
        assert!(ctx.case(&Value::Float(1.0)).unwrap());
        ctx.pop_switch();
        assert_eq!(ctx.switch_depth(), 0);
    }

    #[test]
    fn case_compares_markup_and_strings_by_text() {
        let mut ctx = RenderContext::new(Context::new());
        ctx.push_switch(Value::markup("a"));
        assert!(ctx.case(&Value::from("a")).unwrap());
    }

    #[test]
    fn with_restores_shadowed_and_unbound_names() {
        let mut ctx = RenderContext::new(Context::new());
        let mut locals = Locals::default();
        locals.insert("a".into(), Value::Int(1));

        ctx.push_with(&locals, &["a".into(), "b".into()]);
        locals.insert("a".into(), Value::Int(10));
        locals.insert("b".into(), Value::Int(20));

        ctx.push_with(&locals, &["a".into()]);
        locals.insert("a".into(), Value::Int(100));
        ctx.pop_with(&mut locals);
        assert!(matches!(locals.get("a"), Some(Value::Int(10))));

        ctx.pop_with(&mut locals);
        assert!(matches!(locals.get("a"), Some(Value::Int(1))));
        assert!(!locals.contains_key("b"));
        assert_eq!(ctx.with_depth(), 0);
    }

    #[test]
    fn context_builder() {
        let vars = Context::new().with("x", 1).with("y", "two");
        assert!(vars.contains("x"));
        assert_eq!(vars.get("y").map(Value::to_text).as_deref(), Some("two"));

        let vars: Context = [("a", true)].into_iter().collect();
        assert!(vars.get("a").is_some_and(Value::is_truthy));
    }
}
