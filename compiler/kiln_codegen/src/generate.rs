//! IR → instruction listing.
//!
//! The listing is line-oriented and indented for readability only:
//!
//! ```text
//! # kiln listing for page.html (html5)
//! def __main__()
//!   text "<ul>"
//!   for item in items
//!     text "<li>"
//!     emit item.name
//!     text "</li>"
//!   end
//!   text "</ul>"
//! end
//! ```
//!
//! Every line written is recorded in the [`LineMap`] together with the
//! template line of the IR node it came from.

use std::fmt;

use kiln_ir::expr::write_quoted;
use kiln_ir::{EmitMode, IrKind, IrNode, IrTemplate, LineMap, Param, MAIN_FUNCTION};
use kiln_stack::ensure_sufficient_stack;
use tracing::debug;

/// The listing and its line map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    pub line_map: LineMap,
}

/// Generate the listing for `ir`.
///
/// Deterministic: the same IR always yields the same text. Define-blocks are
/// hoisted out of their position into top-level `def` sections following
/// `__main__`, in depth-first order of appearance.
pub fn generate(ir: &IrTemplate) -> Generated {
    let mut gen = Generator {
        out: String::new(),
        line_map: LineMap::new(),
        depth: 0,
    };
    gen.line(None, format_args!("# kiln listing for {} ({})", ir.filename, ir.mode));

    gen.open(Some(1), format_args!("def {MAIN_FUNCTION}()"));
    if let Some(parent) = ir.extends() {
        // An extending template's own output is discarded. `extend` links
        // the parent and the imports that follow it run before the parent
        // takes over, so the listing keeps template order.
        let line = ir.body.iter().find_map(|n| match &n.kind {
            IrKind::Extend { .. } => Some(n.line),
            _ => None,
        });
        gen.line(line, format_args!("extend {parent}"));
        for node in &ir.body {
            if matches!(node.kind, IrKind::Import { .. }) {
                gen.node(node);
            }
        }
    } else {
        gen.nodes(&ir.body);
    }
    gen.close(Some(1));

    let mut defs = Vec::new();
    collect_defs(&ir.body, &mut defs);
    for def in defs {
        if let IrKind::DefineBlock { name, params, body } = &def.kind {
            gen.open(Some(def.line), format_args!("def {name}({})", Signature(params)));
            gen.nodes(body);
            gen.close(Some(def.line));
        }
    }

    debug!(file = %ir.filename, lines = gen.line_map.len(), "generated listing");
    Generated {
        text: gen.out,
        line_map: gen.line_map,
    }
}

/// Define-blocks in depth-first order of appearance.
fn collect_defs<'a>(nodes: &'a [IrNode], defs: &mut Vec<&'a IrNode>) {
    for node in nodes {
        match &node.kind {
            IrKind::DefineBlock { body, .. } => {
                defs.push(node);
                collect_defs(body, defs);
            }
            IrKind::If { then, otherwise, .. } => {
                collect_defs(then, defs);
                collect_defs(otherwise, defs);
            }
            IrKind::For { body, .. }
            | IrKind::Switch { body, .. }
            | IrKind::Case { body, .. }
            | IrKind::With { body, .. } => collect_defs(body, defs),
            IrKind::Collect { parts, .. } => collect_defs(parts, defs),
            IrKind::Literal(_)
            | IrKind::Emit { .. }
            | IrKind::CallBlock { .. }
            | IrKind::Extend { .. }
            | IrKind::Import { .. } => {}
        }
    }
}

struct Signature<'a>(&'a [Param]);

impl fmt::Display for Signature<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, param) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&param.name)?;
            if let Some(default) = &param.default {
                write!(f, "={default}")?;
            }
        }
        Ok(())
    }
}

struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_quoted(f, self.0)
    }
}

struct Generator {
    out: String,
    line_map: LineMap,
    depth: usize,
}

impl Generator {
    fn line(&mut self, origin: Option<u32>, text: fmt::Arguments<'_>) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(&text.to_string());
        self.out.push('\n');
        self.line_map.push(origin);
    }

    fn open(&mut self, origin: Option<u32>, text: fmt::Arguments<'_>) {
        self.line(origin, text);
        self.depth += 1;
    }

    fn close(&mut self, origin: Option<u32>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(origin, format_args!("end"));
    }

    fn nodes(&mut self, nodes: &[IrNode]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &IrNode) {
        ensure_sufficient_stack(|| self.node_inner(node));
    }

    fn node_inner(&mut self, node: &IrNode) {
        let at = Some(node.line);
        match &node.kind {
            IrKind::Literal(text) => {
                if !text.is_empty() {
                    self.line(at, format_args!("text {}", Quoted(text)));
                }
            }
            IrKind::Emit { expr, mode } => {
                let op = match mode {
                    EmitMode::Escaped => "emit",
                    EmitMode::Attrs => "attrs",
                };
                self.line(at, format_args!("{op} {expr}"));
            }
            IrKind::If { test, then, otherwise } => {
                self.open(at, format_args!("if {test}"));
                self.nodes(then);
                if !otherwise.is_empty() {
                    self.depth -= 1;
                    self.line(at, format_args!("else"));
                    self.depth += 1;
                    self.nodes(otherwise);
                }
                self.close(at);
            }
            IrKind::For { targets, iter, body } => {
                self.open(at, format_args!("for {} in {iter}", targets.join(", ")));
                self.nodes(body);
                self.close(at);
            }
            IrKind::CallBlock { call } => self.line(at, format_args!("call {call}")),
            // Hoisted by `generate`.
            IrKind::DefineBlock { .. } => {}
            IrKind::Extend { parent } => self.line(at, format_args!("extend {parent}")),
            IrKind::Switch { value, body } => {
                self.open(at, format_args!("switch {value}"));
                self.nodes(body);
                self.close(at);
            }
            IrKind::Case { value, body } => {
                match value {
                    Some(value) => self.open(at, format_args!("case {value}")),
                    None => self.open(at, format_args!("default")),
                }
                self.nodes(body);
                self.close(at);
            }
            IrKind::With { bindings, body } => {
                let names: Vec<&str> = bindings.iter().map(|(name, _)| name.as_str()).collect();
                self.open(at, format_args!("with {}", names.join(", ")));
                for (name, value) in bindings {
                    self.line(at, format_args!("let {name} = {value}"));
                }
                self.nodes(body);
                self.close(at);
            }
            IrKind::Import { href, alias } => {
                let alias = alias.as_deref().unwrap_or("_");
                self.line(at, format_args!("import {alias} = {href}"));
            }
            IrKind::Collect { attr, parts } => {
                self.open(at, format_args!("collect {}", Quoted(attr)));
                self.nodes(parts);
                self.close(at);
            }
        }
    }
}
