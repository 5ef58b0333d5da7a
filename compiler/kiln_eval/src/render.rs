//! The rendering protocol: a lazy iterator over output chunks.

use std::fmt;
use std::sync::Arc;

use kiln_codegen::{CompiledTemplate, FuncId};
use kiln_diagnostic::RenderError;

use crate::context::{Context, RenderContext};
use crate::escape::{default_escape, EscapeFn};
use crate::import::TemplateImporter;
use crate::vm::{Flow, Frame, Machine};

/// Maximum nesting of block calls.
pub const DEFAULT_RECURSION_LIMIT: usize = 256;

#[derive(Clone)]
pub struct RenderOptions {
    pub escape: EscapeFn,
    pub recursion_limit: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            escape: default_escape(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("recursion_limit", &self.recursion_limit)
            .finish_non_exhaustive()
    }
}

/// One render of a template, yielding output chunks in order.
///
/// Single pass. Dropping it early abandons the render; after an error it
/// yields nothing more.
pub struct Render<'a> {
    machine: Machine<'a>,
    frame: Option<Frame>,
}

impl<'a> Render<'a> {
    pub fn new(
        template: &Arc<CompiledTemplate>,
        vars: Context,
        importer: &'a dyn TemplateImporter,
        options: &RenderOptions,
    ) -> Self {
        let mut ctx = RenderContext::new(vars);
        let instance = ctx.instances.instantiate(Arc::clone(template));
        let frame = Frame::new(Arc::clone(template), instance, FuncId::MAIN);
        Render {
            machine: Machine::new(ctx, importer, options),
            frame: Some(frame),
        }
    }

    /// Drain the remaining chunks into one string.
    pub fn into_string(self) -> Result<String, RenderError> {
        self.collect()
    }
}

impl Iterator for Render<'_> {
    type Item = Result<String, RenderError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.frame.as_mut()?;
            match self.machine.step(frame) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Output(chunk)) => {
                    if !chunk.is_empty() {
                        return Some(Ok(chunk));
                    }
                }
                Ok(Flow::Extend(parent)) => self.frame = Some(parent),
                Ok(Flow::Return) => {
                    self.frame = None;
                    return None;
                }
                Err(err) => {
                    tracing::debug!(error = %err, "render failed");
                    self.frame = None;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Render `template` to a string.
#[tracing::instrument(level = "debug", skip_all, fields(template = %template.filename()))]
pub fn render(
    template: &Arc<CompiledTemplate>,
    vars: Context,
    importer: &dyn TemplateImporter,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    Render::new(template, vars, importer, options).into_string()
}
