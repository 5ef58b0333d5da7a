use pretty_assertions::assert_eq;

use super::*;

#[test]
fn markup_error_names_file_line_column() {
    let err = MalformedMarkupError {
        file: "page.html".into(),
        line: 3,
        column: 7,
        message: "unclosed element <div>".into(),
    };
    assert_eq!(
        err.to_string(),
        "page.html:3:7: malformed markup: unclosed element <div>"
    );
}

#[test]
fn directive_error_names_directive() {
    let err = DirectiveError {
        file: "page.html".into(),
        line: 12,
        directive: "py:case".into(),
        kind: DirectiveErrorKind::Misplaced("inside py:switch"),
    };
    assert_eq!(err.to_string(), "page.html:12: py:case: only allowed inside py:switch");
}

#[test]
fn listing_is_numbered() {
    assert_eq!(numbered_listing("def a()\nend"), "   1 def a()\n   2 end\n");
}

#[test]
fn generation_error_carries_listing() {
    let err = GenerationError::new("t.html", 2, "unexpected `end`", "text \"a\"\nend");
    assert_eq!(err.listing(), "   1 text \"a\"\n   2 end\n");
    assert!(err.to_string().contains("cannot assemble generated line 2"));
}

#[test]
fn render_error_reports_innermost_location_and_trace() {
    let err = RenderError::new(RenderErrorKind::UndefinedName { name: "x".into() })
        .in_frame(SourceLocation::new("child.html", 4), "header")
        .in_frame(SourceLocation::new("base.html", 9), "__main__");

    assert_eq!(err.line(), 4);
    assert_eq!(
        err.to_string(),
        "child.html:4: name `x` is not defined\n  called from base.html:9 in __main__"
    );
}

#[test]
fn template_error_location() {
    let err: TemplateError = RenderError::new(RenderErrorKind::DivisionByZero)
        .in_frame(SourceLocation::new("a.html", 2), "__main__")
        .into();
    assert_eq!(err.location(), Some(SourceLocation::new("a.html", 2)));

    let err: TemplateError = LoadError::NotFound { name: "x".into() }.into();
    assert_eq!(err.location(), None);
}

#[test]
fn unknown_line_displays_question_mark() {
    assert_eq!(SourceLocation::new("a.html", 0).to_string(), "a.html:?");
}
