//! The expansion walk.

use kiln_diagnostic::{DirectiveError, DirectiveErrorKind};
use kiln_ir::html::{is_boolean_attribute, is_void_element};
use kiln_ir::{
    Attribute, EmitMode, Element, Expr, IrKind, IrNode, Mode, Node, Param, MAIN_FUNCTION,
};
use kiln_markup::{split_interpolations, Segment};
use kiln_stack::ensure_sufficient_stack;
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::directives::{error, AttrDirectives, ValueParser};

/// Where a run of sibling nodes sits.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum Place {
    /// Top level of the template; `py:extends` is allowed here.
    Root,
    /// Any element or directive body.
    Body,
    /// Direct children of a switch: only cases survive.
    Switch,
}

pub(crate) struct Expander<'a> {
    file: &'a str,
    mode: Mode,
    blocks: FxHashSet<String>,
    includes: u32,
}

impl<'a> Expander<'a> {
    pub(crate) fn new(file: &'a str, mode: Mode) -> Self {
        Expander {
            file,
            mode,
            blocks: FxHashSet::default(),
            includes: 0,
        }
    }

    fn err(&self, line: u32, directive: &str, kind: DirectiveErrorKind) -> DirectiveError {
        error(self.file, line, directive, kind)
    }

    /// Expand a run of siblings.
    pub(crate) fn children(&mut self, nodes: &[Node], place: Place) -> Result<Vec<IrNode>, DirectiveError> {
        let mut out = Vec::new();
        let mut seen_content = false;
        for node in nodes {
            match node {
                Node::Text { text, line } => {
                    if node.is_whitespace() {
                        if place != Place::Switch {
                            push(&mut out, IrNode::literal(*line, text.as_str()));
                        }
                        continue;
                    }
                    if place == Place::Switch {
                        return Err(self.err(*line, "py:switch", DirectiveErrorKind::UnexpectedContent));
                    }
                    seen_content = true;
                    for ir in self.text(text, *line, "text")? {
                        push(&mut out, ir);
                    }
                }
                Node::Comment { text, line } => {
                    if text.starts_with('!') || place == Place::Switch {
                        continue;
                    }
                    push(&mut out, IrNode::literal(*line, format!("<!--{text}-->")));
                }
                Node::CData { text, line } => {
                    if place == Place::Switch {
                        return Err(self.err(*line, "py:switch", DirectiveErrorKind::UnexpectedContent));
                    }
                    seen_content = true;
                    push(&mut out, IrNode::literal(*line, format!("<![CDATA[{text}]]>")));
                }
                Node::Declaration { text, line } => {
                    if place != Place::Switch {
                        push(&mut out, IrNode::literal(*line, text.as_str()));
                    }
                }
                Node::Element(el) => {
                    if is_extends(el) && (place != Place::Root || seen_content) {
                        let directive = if el.directive().is_some() { el.name.as_str() } else { "py:extends" };
                        return Err(self.err(
                            el.line,
                            directive,
                            DirectiveErrorKind::Misplaced("as the first element of the template"),
                        ));
                    }
                    seen_content = true;
                    if place == Place::Switch {
                        if !is_case(el) {
                            return Err(self.err(el.line, "py:switch", DirectiveErrorKind::UnexpectedContent));
                        }
                        out.extend(self.element(el, true)?);
                    } else if is_else(el) {
                        let body = self.element(el, false)?;
                        while out.last().is_some_and(IrNode::is_blank_literal) {
                            out.pop();
                        }
                        let Some(IrNode { kind: IrKind::If { otherwise, .. }, .. }) =
                            out.last_mut().and_then(open_if)
                        else {
                            let directive = if el.directive().is_some() { el.name.as_str() } else { "py:else" };
                            return Err(self.err(
                                el.line,
                                directive,
                                DirectiveErrorKind::Misplaced("directly after a py:if"),
                            ));
                        };
                        *otherwise = body;
                    } else {
                        for ir in self.element(el, false)? {
                            push(&mut out, ir);
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Literal text and `${...}` substitutions.
    fn text(&self, text: &str, line: u32, directive: &str) -> Result<Vec<IrNode>, DirectiveError> {
        let segments = split_interpolations(text, line).map_err(|e| {
            self.err(
                e.line,
                directive,
                DirectiveErrorKind::InvalidExpression {
                    text: e.source_text,
                    message: e.message,
                },
            )
        })?;
        Ok(segments
            .into_iter()
            .map(|segment| match segment {
                Segment::Literal { text, line } => IrNode::literal(line, text),
                Segment::Expr { expr, line, .. } => IrNode::emit(line, expr, EmitMode::Escaped),
            })
            .collect())
    }

    fn element(&mut self, el: &Element, in_switch: bool) -> Result<Vec<IrNode>, DirectiveError> {
        ensure_sufficient_stack(|| match el.directive() {
            Some(name) => self.directive_element(el, name, in_switch),
            None => self.attribute_directives(el, in_switch),
        })
    }

    fn required<'e>(&self, el: &'e Element, attr: &'static str) -> Result<&'e Attribute, DirectiveError> {
        el.attr(attr)
            .ok_or_else(|| self.err(el.line, &el.name, DirectiveErrorKind::MissingAttribute(attr)))
    }

    fn no_content(&self, el: &Element) -> Result<(), DirectiveError> {
        if el.children.iter().all(Node::is_whitespace) {
            Ok(())
        } else {
            Err(self.err(el.line, &el.name, DirectiveErrorKind::UnexpectedContent))
        }
    }

    fn define_block(
        &mut self,
        line: u32,
        directive: &str,
        name: String,
        params: Vec<Param>,
        body: Vec<IrNode>,
    ) -> Result<IrNode, DirectiveError> {
        if name == MAIN_FUNCTION || !self.blocks.insert(name.clone()) {
            return Err(self.err(line, directive, DirectiveErrorKind::DuplicateBlock(name)));
        }
        trace!(block = %name, line, "define block");
        Ok(IrNode::new(line, IrKind::DefineBlock { name, params, body }))
    }

    /// `<py:if>`, `<py:for>`, ... elements.
    fn directive_element(
        &mut self,
        el: &Element,
        name: &str,
        in_switch: bool,
    ) -> Result<Vec<IrNode>, DirectiveError> {
        let line = el.line;
        let value = ValueParser::for_element(self.file, el);
        let node = match name {
            "if" => {
                let test = value.expr(&self.required(el, "test")?.value)?;
                let then = self.children(&el.children, Place::Body)?;
                IrNode::new(line, IrKind::If { test, then, otherwise: Vec::new() })
            }
            "else" => {
                let body = self.children(&el.children, Place::Body)?;
                if !in_switch {
                    return Ok(body);
                }
                IrNode::new(line, IrKind::Case { value: None, body })
            }
            "for" => {
                let (targets, iter) = value.for_each(&self.required(el, "each")?.value)?;
                let body = self.children(&el.children, Place::Body)?;
                IrNode::new(line, IrKind::For { targets, iter, body })
            }
            "def" => {
                let (block, params) = value.signature(&self.required(el, "function")?.value)?;
                let body = self.children(&el.children, Place::Body)?;
                self.define_block(line, &el.name, block, params, body)?
            }
            "block" => {
                let block = value.identifier(&self.required(el, "name")?.value)?;
                let body = self.children(&el.children, Place::Body)?;
                let call = Expr::call0(Expr::name(block.as_str()));
                let define = self.define_block(line, &el.name, block, Vec::new(), body)?;
                return Ok(vec![define, IrNode::new(line, IrKind::CallBlock { call })]);
            }
            "call" => {
                self.no_content(el)?;
                let call = value.expr(&self.required(el, "function")?.value)?;
                IrNode::new(line, IrKind::CallBlock { call })
            }
            "extends" => {
                self.no_content(el)?;
                let parent = value.href(&self.required(el, "href")?.value)?;
                IrNode::new(line, IrKind::Extend { parent })
            }
            "switch" => {
                let test = value.expr(&self.required(el, "test")?.value)?;
                let body = self.children(&el.children, Place::Switch)?;
                IrNode::new(line, IrKind::Switch { value: test, body })
            }
            "case" => {
                if !in_switch {
                    return Err(self.err(line, &el.name, DirectiveErrorKind::Misplaced("inside a py:switch")));
                }
                let case = value.expr(&self.required(el, "value")?.value)?;
                let body = self.children(&el.children, Place::Body)?;
                IrNode::new(line, IrKind::Case { value: Some(case), body })
            }
            "with" => {
                let bindings = value.bindings(&self.required(el, "vars")?.value)?;
                let body = self.children(&el.children, Place::Body)?;
                IrNode::new(line, IrKind::With { bindings, body })
            }
            "import" => {
                self.no_content(el)?;
                let href = value.href(&self.required(el, "href")?.value)?;
                let alias = el.attr("alias").map(|a| value.identifier(&a.value)).transpose()?;
                IrNode::new(line, IrKind::Import { href, alias })
            }
            "include" => {
                self.no_content(el)?;
                let href = value.href(&self.required(el, "href")?.value)?;
                self.includes += 1;
                let alias = format!("__include{}__", self.includes);
                let call = Expr::call0(Expr::Attr {
                    object: Box::new(Expr::name(alias.as_str())),
                    name: MAIN_FUNCTION.to_owned(),
                });
                return Ok(vec![
                    IrNode::new(line, IrKind::Import { href, alias: Some(alias) }),
                    IrNode::new(line, IrKind::CallBlock { call }),
                ]);
            }
            _ => return Err(self.err(line, &el.name, DirectiveErrorKind::Unknown)),
        };
        Ok(vec![node])
    }

    /// An ordinary element, wrapped by its `py:*` attributes.
    fn attribute_directives(&mut self, el: &Element, in_switch: bool) -> Result<Vec<IrNode>, DirectiveError> {
        let d = AttrDirectives::collect(el, self.file)?;
        let line = el.line;

        let mut body = match d.replace {
            Some(attr) => {
                let expr = ValueParser::for_attr(self.file, attr).expr(&attr.value)?;
                vec![IrNode::emit(attr.line, expr, EmitMode::Escaped)]
            }
            None => self.render_element(el, &d)?,
        };
        if let Some(attr) = d.with {
            let bindings = ValueParser::for_attr(self.file, attr).bindings(&attr.value)?;
            body = vec![IrNode::new(attr.line, IrKind::With { bindings, body })];
        }
        if let Some(attr) = d.if_ {
            let test = ValueParser::for_attr(self.file, attr).expr(&attr.value)?;
            body = vec![IrNode::new(attr.line, IrKind::If { test, then: body, otherwise: Vec::new() })];
        }
        if let Some(attr) = d.for_ {
            let (targets, iter) = ValueParser::for_attr(self.file, attr).for_each(&attr.value)?;
            body = vec![IrNode::new(attr.line, IrKind::For { targets, iter, body })];
        }
        if let Some(attr) = d.else_ {
            if in_switch {
                body = vec![IrNode::new(attr.line, IrKind::Case { value: None, body })];
            }
        }
        if let Some(attr) = d.case {
            if !in_switch {
                return Err(self.err(attr.line, &attr.name, DirectiveErrorKind::Misplaced("inside a py:switch")));
            }
            let value = ValueParser::for_attr(self.file, attr).expr(&attr.value)?;
            body = vec![IrNode::new(attr.line, IrKind::Case { value: Some(value), body })];
        }
        if let Some(attr) = d.extends {
            let parent = ValueParser::for_attr(self.file, attr).href(&attr.value)?;
            body.insert(0, IrNode::new(attr.line, IrKind::Extend { parent }));
        }
        if let Some(attr) = d.block {
            let name = ValueParser::for_attr(self.file, attr).identifier(&attr.value)?;
            let call = Expr::call0(Expr::name(name.as_str()));
            let define = self.define_block(attr.line, &attr.name, name, Vec::new(), body)?;
            body = vec![define, IrNode::new(attr.line, IrKind::CallBlock { call })];
        }
        if let Some(attr) = d.def {
            let (name, params) = ValueParser::for_attr(self.file, attr).signature(&attr.value)?;
            body = vec![self.define_block(attr.line, &attr.name, name, params, body)?];
        }
        trace!(element = %el.name, line, nodes = body.len(), "expanded element");
        Ok(body)
    }

    /// Start tag, content and end tag, honoring `py:switch`, `py:content`,
    /// `py:strip` and `py:attrs`.
    fn render_element(&mut self, el: &Element, d: &AttrDirectives<'_>) -> Result<Vec<IrNode>, DirectiveError> {
        let content = if let Some(attr) = d.switch {
            let value = ValueParser::for_attr(self.file, attr).expr(&attr.value)?;
            let body = self.children(&el.children, Place::Switch)?;
            vec![IrNode::new(attr.line, IrKind::Switch { value, body })]
        } else if let Some(attr) = d.content {
            let expr = ValueParser::for_attr(self.file, attr).expr(&attr.value)?;
            vec![IrNode::emit(attr.line, expr, EmitMode::Escaped)]
        } else {
            self.children(&el.children, Place::Body)?
        };

        let empty = el.children.is_empty() && d.switch.is_none() && d.content.is_none();
        let self_closing = empty && el.self_closing && !self.mode.is_html();
        let has_end_tag = !self_closing && !is_void_element(&el.name, self.mode);

        let mut start = self.start_tag(el, d.attrs)?;
        push(
            &mut start,
            IrNode::literal(el.line, if self_closing { "/>" } else { ">" }),
        );
        let end = if has_end_tag {
            vec![IrNode::literal(el.line, format!("</{}>", el.name))]
        } else {
            Vec::new()
        };

        let mut out = Vec::new();
        match d.strip {
            Some(attr) if attr.value.trim().is_empty() => out.extend(content),
            Some(attr) => {
                let test = ValueParser::for_attr(self.file, attr).expr(&attr.value)?;
                let keep_tags = test.not();
                out.push(IrNode::new(
                    attr.line,
                    IrKind::If { test: keep_tags.clone(), then: start, otherwise: Vec::new() },
                ));
                out.extend(content);
                if !end.is_empty() {
                    out.push(IrNode::new(
                        attr.line,
                        IrKind::If { test: keep_tags, then: end, otherwise: Vec::new() },
                    ));
                }
            }
            None => {
                for ir in start.into_iter().chain(content).chain(end) {
                    push(&mut out, ir);
                }
            }
        }
        Ok(out)
    }

    /// `<name` plus attributes, without the closing `>`.
    fn start_tag(&self, el: &Element, attrs: Option<&Attribute>) -> Result<Vec<IrNode>, DirectiveError> {
        let mut out = vec![IrNode::literal(el.line, format!("<{}", el.name))];
        for attr in &el.attrs {
            if attr.directive().is_some() || attr.name == "xmlns:py" {
                continue;
            }
            let parts = self.text(&attr.value, attr.line, &attr.name)?;
            let is_static = parts.iter().all(|ir| matches!(ir.kind, IrKind::Literal(_)));
            if !is_static {
                let parts = parts
                    .into_iter()
                    .map(|ir| match ir.kind {
                        IrKind::Literal(text) => IrNode::literal(ir.line, text.replace('"', "&quot;")),
                        _ => ir,
                    })
                    .collect();
                out.push(IrNode::new(
                    attr.line,
                    IrKind::Collect { attr: attr.name.clone(), parts },
                ));
                continue;
            }
            let text = if is_boolean_attribute(&attr.name, self.mode) {
                format!(" {}", attr.name.to_ascii_lowercase())
            } else {
                let value: String = parts
                    .iter()
                    .filter_map(|ir| match &ir.kind {
                        IrKind::Literal(text) => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                format!(" {}=\"{}\"", attr.name, value.replace('"', "&quot;"))
            };
            push(&mut out, IrNode::literal(attr.line, text));
        }
        if let Some(attr) = attrs {
            let expr = ValueParser::for_attr(self.file, attr).expr(&attr.value)?;
            out.push(IrNode::emit(attr.line, expr, EmitMode::Attrs));
        }
        Ok(out)
    }
}

/// Append `node`, merging adjacent literals into the first one's node.
fn push(out: &mut Vec<IrNode>, node: IrNode) {
    if let (Some(IrNode { kind: IrKind::Literal(prev), .. }), IrKind::Literal(text)) =
        (out.last_mut(), &node.kind)
    {
        prev.push_str(text);
        return;
    }
    out.push(node);
}

fn is_extends(el: &Element) -> bool {
    el.directive() == Some("extends") || el.attr("py:extends").is_some()
}

fn is_else(el: &Element) -> bool {
    el.directive() == Some("else") || el.attr("py:else").is_some()
}

fn is_case(el: &Element) -> bool {
    matches!(el.directive(), Some("case" | "else"))
        || el.attr("py:case").is_some()
        || el.attr("py:else").is_some()
}

/// The innermost `If` reachable through single-node `otherwise` branches
/// that still lacks an else branch.
fn open_if(node: &mut IrNode) -> Option<&mut IrNode> {
    let pending = match &node.kind {
        IrKind::If { otherwise, .. } => otherwise.len(),
        _ => return None,
    };
    match pending {
        0 => Some(node),
        1 => match &mut node.kind {
            IrKind::If { otherwise, .. } => otherwise.last_mut().and_then(open_if),
            _ => None,
        },
        _ => None,
    }
}
