#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_ir::Node;
use pretty_assertions::assert_eq;

use super::*;

fn element(doc: &Document, index: usize) -> &Element {
    doc.nodes[index].as_element().unwrap()
}

#[test]
fn nested_elements_with_lines() {
    let doc = parse("<html>\n  <body>\n    <p class=\"x\">hi</p>\n  </body>\n</html>").unwrap();
    let html = element(&doc, 0);
    assert_eq!(html.line, 1);
    let body = html.children[1].as_element().unwrap();
    assert_eq!(body.line, 2);
    let p = body.children[1].as_element().unwrap();
    assert_eq!(p.line, 3);
    assert_eq!(p.attr("class").unwrap().value, "x");
    assert_eq!(
        p.children,
        vec![Node::Text {
            text: "hi".into(),
            line: 3
        }]
    );
}

#[test]
fn multiple_top_level_nodes() {
    let doc = parse("<!DOCTYPE html>\n<a/><b></b>tail").unwrap();
    assert_eq!(doc.nodes.len(), 5);
    assert!(matches!(&doc.nodes[0], Node::Declaration { text, .. } if text == "<!DOCTYPE html>"));
    assert!(element(&doc, 2).self_closing);
    assert!(!element(&doc, 3).self_closing);
}

#[test]
fn comments_cdata_and_processing_instructions() {
    let doc = parse("<?xml version=\"1.0\"?><r><!-- c --><![CDATA[<x>]]></r>").unwrap();
    assert!(matches!(&doc.nodes[0], Node::Declaration { text, .. } if text.starts_with("<?xml")));
    let r = element(&doc, 1);
    assert!(matches!(&r.children[0], Node::Comment { text, .. } if text == " c "));
    assert!(matches!(&r.children[1], Node::CData { text, .. } if text == "<x>"));
}

#[test]
fn directive_names_are_ordinary_names() {
    let doc = parse(r#"<py:for each="x in xs"><li py:attrs="a">$x</li></py:for>"#).unwrap();
    let for_el = element(&doc, 0);
    assert_eq!(for_el.directive(), Some("for"));
    let li = for_el.children[0].as_element().unwrap();
    assert_eq!(li.attrs[0].directive(), Some("attrs"));
}

#[test]
fn interpolations_may_contain_markup_characters() {
    let doc = parse(r#"<p title="${a > b and 'x'}">${a < b}</p>"#).unwrap();
    let p = element(&doc, 0);
    assert_eq!(p.attr("title").unwrap().value, "${a > b and 'x'}");
    assert!(matches!(&p.children[0], Node::Text { text, .. } if text == "${a < b}"));
}

#[test]
fn single_quoted_attributes_and_multiline_tags() {
    let doc = parse("<a\n  href='x'\n  id=\"y\"/>").unwrap();
    let a = element(&doc, 0);
    assert_eq!(a.attrs[0].line, 2);
    assert_eq!(a.attrs[1].line, 3);
}

#[test]
fn unclosed_element_points_at_start_tag() {
    let err = parse_named("<div>\n  <p>text\n</div>", "page.html").unwrap_err();
    assert_eq!(err.file, "page.html");
    assert_eq!(err.line, 3);
    assert!(err.message.contains("mismatched end tag"), "{}", err.message);

    let err = parse("<div>\n  <span>").unwrap_err();
    assert_eq!((err.line, err.column), (2, 3));
    assert!(err.message.contains("unclosed element <span>"));
}

#[test]
fn stray_end_tag() {
    let err = parse("text</p>").unwrap_err();
    assert_eq!(err.column, 5);
}

#[test]
fn duplicate_attributes_are_rejected() {
    let err = parse(r#"<a x="1" x="2"/>"#).unwrap_err();
    assert!(err.message.contains("duplicate attribute `x`"));
}

#[test]
fn unquoted_attribute_is_rejected() {
    assert!(parse("<a x=1/>").is_err());
    assert!(parse("<a x>").is_err());
}

#[test]
fn unterminated_constructs() {
    assert!(parse("<!-- open").unwrap_err().message.contains("-->"));
    assert!(parse("<p>${a</p>").unwrap_err().message.contains("${"));
    assert!(parse("<a href=\"x").is_err());
}

#[test]
fn deep_nesting_does_not_overflow() {
    let depth = 2_000;
    let text = format!("{}{}", "<d>".repeat(depth), "</d>".repeat(depth));
    let doc = parse(&text).unwrap();
    assert_eq!(doc.nodes.len(), 1);
}
