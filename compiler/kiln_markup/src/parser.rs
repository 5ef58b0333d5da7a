//! Markup parser.
//!
//! A recursive-descent parser over [`Cursor`]. It accepts well-formed XML
//! plus a few conveniences templates rely on: several top-level nodes,
//! `${...}` regions whose contents may hold `<`, `>` and quotes, and HTML
//! doctype declarations. Entities are left undecoded.

use kiln_diagnostic::MalformedMarkupError;
use kiln_ir::{Attribute, Document, Element, Node};
use kiln_stack::ensure_sufficient_stack;
use tracing::trace;

use crate::cursor::Cursor;

/// Parse markup text that has no file name.
pub fn parse(text: &str) -> Result<Document, MalformedMarkupError> {
    parse_named(text, "<string>")
}

/// Parse markup text, attributing errors to `file`.
#[tracing::instrument(level = "debug", skip(text))]
pub fn parse_named(text: &str, file: &str) -> Result<Document, MalformedMarkupError> {
    let mut parser = Parser {
        cur: Cursor::new(text),
        file,
    };
    let nodes = parser.parse_content(None)?;
    trace!(nodes = nodes.len(), "parsed document");
    Ok(Document { nodes })
}

/// The element whose content is being parsed.
struct OpenTag<'a> {
    name: &'a str,
    line: u32,
    column: u32,
}

struct Parser<'a> {
    cur: Cursor<'a>,
    file: &'a str,
}

impl<'a> Parser<'a> {
    fn error_at(&self, line: u32, column: u32, message: impl Into<String>) -> MalformedMarkupError {
        MalformedMarkupError {
            file: self.file.to_owned(),
            line,
            column,
            message: message.into(),
        }
    }

    fn error(&self, message: impl Into<String>) -> MalformedMarkupError {
        self.error_at(self.cur.line(), self.cur.column(), message)
    }

    fn expect(&mut self, s: &str) -> Result<(), MalformedMarkupError> {
        if self.cur.starts_with(s) {
            self.cur.advance(s.len());
            Ok(())
        } else {
            Err(self.error(format!("expected `{s}`")))
        }
    }

    /// Parse nodes until the end tag of `open` (or end of input at top level).
    fn parse_content(&mut self, open: Option<&OpenTag<'a>>) -> Result<Vec<Node>, MalformedMarkupError> {
        let mut nodes = Vec::new();
        loop {
            if self.cur.is_eof() {
                return match open {
                    Some(tag) => Err(self.error_at(
                        tag.line,
                        tag.column,
                        format!("unclosed element <{}>", tag.name),
                    )),
                    None => Ok(nodes),
                };
            }
            if self.cur.starts_with("</") {
                let Some(tag) = open else {
                    return Err(self.error("end tag without a matching start tag"));
                };
                self.parse_end_tag(tag)?;
                return Ok(nodes);
            }
            let node = if self.cur.starts_with("<!--") {
                self.parse_delimited("<!--", "-->", |text, line| Node::Comment { text, line })?
            } else if self.cur.starts_with("<![CDATA[") {
                self.parse_delimited("<![CDATA[", "]]>", |text, line| Node::CData { text, line })?
            } else if self.cur.starts_with("<!") {
                self.parse_raw_declaration("<!", ">")?
            } else if self.cur.starts_with("<?") {
                self.parse_raw_declaration("<?", "?>")?
            } else if self.cur.starts_with("<") {
                Node::Element(ensure_sufficient_stack(|| self.parse_element())?)
            } else {
                self.parse_text()?
            };
            nodes.push(node);
        }
    }

    fn parse_text(&mut self) -> Result<Node, MalformedMarkupError> {
        let line = self.cur.line();
        let start = self.cur.pos();
        if !self.cur.advance_until(b"<") {
            return Err(self.error("unterminated `${` expression"));
        }
        Ok(Node::Text {
            text: self.cur.slice(start, self.cur.pos()).to_owned(),
            line,
        })
    }

    /// `<!--...-->` and `<![CDATA[...]]>`: keep only the inner text.
    fn parse_delimited(
        &mut self,
        open: &str,
        close: &str,
        make: impl FnOnce(String, u32) -> Node,
    ) -> Result<Node, MalformedMarkupError> {
        let (line, column) = (self.cur.line(), self.cur.column());
        self.cur.advance(open.len());
        let start = self.cur.pos();
        let Some(end) = self.cur.find(close) else {
            return Err(self.error_at(line, column, format!("missing `{close}`")));
        };
        let text = self.cur.slice(start, end).to_owned();
        self.cur.advance_to(end + close.len());
        Ok(make(text, line))
    }

    /// `<!DOCTYPE ...>` and `<?...?>`: keep the text verbatim.
    fn parse_raw_declaration(&mut self, open: &str, close: &str) -> Result<Node, MalformedMarkupError> {
        let (line, column) = (self.cur.line(), self.cur.column());
        let start = self.cur.pos();
        self.cur.advance(open.len());
        let Some(end) = self.cur.find(close) else {
            return Err(self.error_at(line, column, format!("missing `{close}`")));
        };
        self.cur.advance_to(end + close.len());
        Ok(Node::Declaration {
            text: self.cur.slice(start, self.cur.pos()).to_owned(),
            line,
        })
    }

    fn parse_element(&mut self) -> Result<Element, MalformedMarkupError> {
        let (line, column) = (self.cur.line(), self.cur.column());
        self.cur.advance(1);
        let Some(name) = self.cur.read_name() else {
            return Err(self.error("expected element name after `<`"));
        };
        let mut attrs: Vec<Attribute> = Vec::new();
        loop {
            self.cur.skip_whitespace();
            if self.cur.starts_with("/>") {
                self.cur.advance(2);
                return Ok(Element {
                    name: name.to_owned(),
                    attrs,
                    children: Vec::new(),
                    line,
                    self_closing: true,
                });
            }
            if self.cur.starts_with(">") {
                self.cur.advance(1);
                break;
            }
            if self.cur.is_eof() {
                return Err(self.error_at(line, column, format!("unterminated start tag <{name}>")));
            }
            let attr = self.parse_attribute()?;
            if attrs.iter().any(|a| a.name == attr.name) {
                return Err(self.error_at(
                    attr.line,
                    column,
                    format!("duplicate attribute `{}` on <{name}>", attr.name),
                ));
            }
            attrs.push(attr);
        }
        let open = OpenTag { name, line, column };
        let children = self.parse_content(Some(&open))?;
        Ok(Element {
            name: name.to_owned(),
            attrs,
            children,
            line,
            self_closing: false,
        })
    }

    fn parse_attribute(&mut self) -> Result<Attribute, MalformedMarkupError> {
        let line = self.cur.line();
        let Some(name) = self.cur.read_name() else {
            return Err(self.error("expected attribute name"));
        };
        self.cur.skip_whitespace();
        self.expect("=")?;
        self.cur.skip_whitespace();
        let quote = match self.cur.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.error(format!("expected quoted value for attribute `{name}`"))),
        };
        self.cur.advance(1);
        let start = self.cur.pos();
        if !self.cur.advance_until(&[quote]) {
            return Err(self.error("unterminated `${` expression in attribute value"));
        }
        if self.cur.is_eof() {
            return Err(self.error(format!("unterminated value for attribute `{name}`")));
        }
        let value = self.cur.slice(start, self.cur.pos()).to_owned();
        self.cur.advance(1);
        Ok(Attribute {
            name: name.to_owned(),
            value,
            line,
        })
    }

    fn parse_end_tag(&mut self, open: &OpenTag<'a>) -> Result<(), MalformedMarkupError> {
        let (line, column) = (self.cur.line(), self.cur.column());
        self.cur.advance(2);
        let name = self.cur.read_name().unwrap_or("");
        if name != open.name {
            return Err(self.error_at(
                line,
                column,
                format!(
                    "mismatched end tag: expected </{}> (opened on line {}), found </{name}>",
                    open.name, open.line
                ),
            ));
        }
        self.cur.skip_whitespace();
        self.expect(">")
    }
}

#[cfg(test)]
mod tests;
