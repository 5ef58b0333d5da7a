//! Instruction execution.
//!
//! A [`Frame`] runs one template function. The main frame of a render is
//! stepped lazily by [`Render`](crate::Render); block calls get a fresh
//! frame that runs to completion and returns its output as markup.
//!
//! Errors are tagged with the failing frame's template location on the way
//! out of [`Machine::step`], so a render error carries one trace frame per
//! template function it passed through, innermost first.

use std::sync::Arc;

use kiln_codegen::{CompiledTemplate, FuncId, Instr};
use kiln_diagnostic::{RenderError, RenderErrorKind, SourceLocation};
use kiln_stack::ensure_sufficient_stack;

use crate::builtins::Args;
use crate::context::{Locals, RenderContext};
use crate::escape::{collect, escape, render_attr, render_attrs, EscapeFn};
use crate::import::TemplateImporter;
use crate::instance::{FuncRef, InstanceId};
use crate::ops::iterate;
use crate::render::RenderOptions;
use crate::value::{Markup, Value};

pub(crate) struct Frame {
    pub(crate) template: Arc<CompiledTemplate>,
    pub(crate) instance: InstanceId,
    func: FuncId,
    pc: usize,
    pub(crate) locals: Locals,
    loops: Vec<std::vec::IntoIter<Value>>,
    /// Open `collect` sections, innermost last.
    captures: Vec<Vec<Option<Markup>>>,
    /// Parent main frame linked by `extend`; takes over when this one ends.
    handoff: Option<Box<Frame>>,
}

impl Frame {
    pub(crate) fn new(template: Arc<CompiledTemplate>, instance: InstanceId, func: FuncId) -> Self {
        Frame {
            template,
            instance,
            func,
            pc: 0,
            locals: Locals::default(),
            loops: Vec::new(),
            captures: Vec::new(),
            handoff: None,
        }
    }

    #[inline]
    fn capturing(&self) -> bool {
        !self.captures.is_empty()
    }

    fn write(&mut self, piece: Option<Markup>) -> Flow {
        match self.captures.last_mut() {
            Some(parts) => {
                parts.push(piece);
                Flow::Continue
            }
            None => piece.map_or(Flow::Continue, |m| Flow::Output(m.as_str().to_owned())),
        }
    }

    fn write_text(&mut self, text: &str) -> Flow {
        match self.captures.last_mut() {
            Some(parts) => {
                parts.push(Some(Markup::from(text)));
                Flow::Continue
            }
            None => Flow::Output(text.to_owned()),
        }
    }

    fn jump(&mut self, target: u32) {
        self.pc = target as usize;
    }
}

/// What a single step did.
pub(crate) enum Flow {
    Continue,
    Output(String),
    /// The function ran off its end after an `extend`: continue in the
    /// parent template's main frame.
    Extend(Frame),
    /// The function ran off its end.
    Return,
}

/// Block call results, written without escaping.
fn raw(value: &Value) -> Option<Markup> {
    match value {
        Value::None => None,
        Value::Markup(m) => Some(m.clone()),
        other => Some(Markup::from(other.to_text())),
    }
}

fn bind_targets(locals: &mut Locals, targets: &[String], item: Value) -> Result<(), RenderErrorKind> {
    if let [target] = targets {
        locals.insert(target.clone(), item);
        return Ok(());
    }
    let Value::List(items) = &item else {
        return Err(RenderErrorKind::UnpackMismatch {
            expected: targets.len(),
            got: 1,
        });
    };
    if items.len() != targets.len() {
        return Err(RenderErrorKind::UnpackMismatch {
            expected: targets.len(),
            got: items.len(),
        });
    }
    for (target, value) in targets.iter().zip(items.iter()) {
        locals.insert(target.clone(), value.clone());
    }
    Ok(())
}

pub(crate) struct Machine<'a> {
    pub(crate) ctx: RenderContext,
    importer: &'a dyn TemplateImporter,
    escape: EscapeFn,
    recursion_limit: usize,
    depth: usize,
}

impl<'a> Machine<'a> {
    pub(crate) fn new(ctx: RenderContext, importer: &'a dyn TemplateImporter, options: &RenderOptions) -> Self {
        Machine {
            ctx,
            importer,
            escape: Arc::clone(&options.escape),
            recursion_limit: options.recursion_limit,
            depth: 0,
        }
    }

    /// Execute one instruction of `frame`.
    pub(crate) fn step(&mut self, frame: &mut Frame) -> Result<Flow, RenderError> {
        let template = Arc::clone(&frame.template);
        let function = template.function(frame.func);
        let pc = frame.pc;
        let Some(instr) = function.code.get(pc) else {
            return Ok(match frame.handoff.take() {
                Some(parent) => Flow::Extend(*parent),
                None => Flow::Return,
            });
        };
        frame.pc += 1;
        self.execute(frame, instr).map_err(|err| {
            let location = SourceLocation::new(Arc::clone(template.filename()), function.line_for(pc));
            err.in_frame(location, function.name.as_str())
        })
    }

    fn execute(&mut self, frame: &mut Frame, instr: &Instr) -> Result<Flow, RenderError> {
        match instr {
            Instr::Text(text) => Ok(frame.write_text(text)),
            Instr::Emit(expr) => {
                let value = self.eval(frame, expr)?;
                let mut piece = escape(&value, &*self.escape);
                if frame.capturing() && !matches!(value, Value::Markup(_)) {
                    piece = piece.map(|m| Markup::from(m.as_str().replace('"', "&quot;")));
                }
                Ok(frame.write(piece))
            }
            Instr::CallBlock(expr) => {
                let value = self.eval(frame, expr)?;
                Ok(frame.write(raw(&value)))
            }
            Instr::EmitAttrs(expr) => {
                let value = self.eval(frame, expr)?;
                let attrs = render_attrs(&value, frame.template.mode(), &*self.escape)?;
                Ok(frame.write_text(&attrs))
            }
            Instr::BeginCollect => {
                frame.captures.push(Vec::new());
                Ok(Flow::Continue)
            }
            Instr::EndCollect(name) => {
                let parts = frame.captures.pop().unwrap_or_default();
                let Some(value) = collect(parts) else {
                    return Ok(Flow::Continue);
                };
                let mut attr = String::new();
                render_attr(
                    &mut attr,
                    name,
                    &Value::Markup(value),
                    frame.template.mode(),
                    &*self.escape,
                );
                Ok(frame.write_text(&attr))
            }
            Instr::JumpIfNot { test, target } => {
                if !self.eval(frame, test)?.is_truthy() {
                    frame.jump(*target);
                }
                Ok(Flow::Continue)
            }
            Instr::Jump(target) => {
                frame.jump(*target);
                Ok(Flow::Continue)
            }
            Instr::IterStart(expr) => {
                let iterable = self.eval(frame, expr)?;
                let items = iterate(&iterable)?;
                frame.loops.push(items.into_iter());
                Ok(Flow::Continue)
            }
            Instr::IterNext { targets, exit } => {
                match frame.loops.last_mut().and_then(Iterator::next) {
                    Some(item) => bind_targets(&mut frame.locals, targets, item)?,
                    None => {
                        frame.loops.pop();
                        frame.jump(*exit);
                    }
                }
                Ok(Flow::Continue)
            }
            Instr::PushSwitch(expr) => {
                let value = self.eval(frame, expr)?;
                self.ctx.push_switch(value);
                Ok(Flow::Continue)
            }
            Instr::PopSwitch => {
                self.ctx.pop_switch();
                Ok(Flow::Continue)
            }
            Instr::Case { value, target } => {
                if let Some(expr) = value {
                    let value = self.eval(frame, expr)?;
                    if !self.ctx.case(&value)? {
                        frame.jump(*target);
                    }
                }
                Ok(Flow::Continue)
            }
            Instr::PushWith(names) => {
                self.ctx.push_with(&frame.locals, names);
                Ok(Flow::Continue)
            }
            Instr::Assign { name, value } => {
                let value = self.eval(frame, value)?;
                frame.locals.insert(name.clone(), value);
                Ok(Flow::Continue)
            }
            Instr::PopWith => {
                self.ctx.pop_with(&mut frame.locals);
                Ok(Flow::Continue)
            }
            Instr::Import { alias, href } => {
                let name = self.eval(frame, href)?.to_text();
                let template = self.import(&name)?;
                let imported = self.ctx.instances.instantiate(template);
                let alias = alias
                    .clone()
                    .unwrap_or_else(|| self.importer.default_alias_for(&name));
                tracing::trace!(%name, %alias, "imported template");
                self.ctx
                    .instances
                    .get_mut(frame.instance)
                    .imports
                    .insert(alias, imported);
                Ok(Flow::Continue)
            }
            Instr::Extend(expr) => {
                let value = self.eval(frame, expr)?;
                let Some(name) = value.as_text() else {
                    return Err(RenderErrorKind::InvalidParent {
                        type_name: value.type_name(),
                    }
                    .into());
                };
                let template = self.import(name)?;
                self.check_lineage(frame.instance, name, &template)?;
                let parent = self.ctx.instances.extend(frame.instance, Arc::clone(&template));
                frame.handoff = Some(Box::new(Frame::new(template, parent, FuncId::MAIN)));
                Ok(Flow::Continue)
            }
        }
    }

    /// Reject a parent that already takes part in the chain below `top`, or
    /// a chain longer than the recursion limit.
    fn check_lineage(
        &self,
        top: InstanceId,
        name: &str,
        parent: &Arc<CompiledTemplate>,
    ) -> Result<(), RenderErrorKind> {
        let instances = &self.ctx.instances;
        let mut depth = 0;
        for id in instances.lineage(top) {
            let template = &instances.get(id).template;
            if Arc::ptr_eq(template, parent) || template.filename() == parent.filename() {
                return Err(RenderErrorKind::ExtendsCycle { name: name.to_owned() });
            }
            depth += 1;
        }
        if depth >= self.recursion_limit {
            return Err(RenderErrorKind::RecursionLimit {
                limit: self.recursion_limit,
            });
        }
        Ok(())
    }

    fn import(&self, name: &str) -> Result<Arc<CompiledTemplate>, RenderErrorKind> {
        self.importer
            .import(name)
            .map_err(|source| RenderErrorKind::ImportFailed {
                name: name.to_owned(),
                source: Box::new(source),
            })
    }

    /// Run a block to completion and return its output.
    pub(crate) fn call_block(&mut self, target: FuncRef, args: Args) -> Result<Markup, RenderError> {
        if self.depth >= self.recursion_limit {
            return Err(RenderErrorKind::RecursionLimit {
                limit: self.recursion_limit,
            }
            .into());
        }
        let template = Arc::clone(&self.ctx.instances.get(target.instance).template);
        let mut frame = Frame::new(template, target.instance, target.func);
        self.bind_arguments(&mut frame, args)?;

        self.depth += 1;
        let result = ensure_sufficient_stack(|| self.run_to_end(frame));
        self.depth -= 1;
        result
    }

    fn run_to_end(&mut self, mut frame: Frame) -> Result<Markup, RenderError> {
        let mut out = String::new();
        loop {
            match self.step(&mut frame)? {
                Flow::Continue => {}
                Flow::Output(chunk) => out.push_str(&chunk),
                Flow::Extend(next) => frame = next,
                Flow::Return => return Ok(Markup::from(out)),
            }
        }
    }

    /// Bind positional arguments, then keywords, then defaults.
    fn bind_arguments(&mut self, frame: &mut Frame, args: Args) -> Result<(), RenderError> {
        let template = Arc::clone(&frame.template);
        let function = template.function(frame.func);
        let params = &function.params;
        let Args {
            positional,
            keywords,
        } = args;

        if positional.len() > params.len() {
            return Err(RenderErrorKind::TooManyArguments {
                function: function.name.clone(),
                expected: params.len(),
                got: positional.len(),
            }
            .into());
        }
        for (param, value) in params.iter().zip(positional) {
            frame.locals.insert(param.name.clone(), value);
        }
        for (name, value) in keywords {
            if !params.iter().any(|param| param.name == name) {
                return Err(RenderErrorKind::UnexpectedArgument {
                    function: function.name.clone(),
                    name,
                }
                .into());
            }
            if frame.locals.contains_key(&name) {
                return Err(RenderErrorKind::Custom(format!(
                    "`{}` got multiple values for argument `{name}`",
                    function.name
                ))
                .into());
            }
            frame.locals.insert(name, value);
        }
        for param in params {
            if frame.locals.contains_key(&param.name) {
                continue;
            }
            let Some(default) = &param.default else {
                return Err(RenderErrorKind::MissingArgument {
                    function: function.name.clone(),
                    param: param.name.clone(),
                }
                .into());
            };
            let value = self.eval(frame, default)?;
            frame.locals.insert(param.name.clone(), value);
        }
        Ok(())
    }
}
