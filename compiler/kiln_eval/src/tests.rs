#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use kiln_codegen::{compile_ir, CompiledTemplate};
use kiln_diagnostic::{LoadError, RenderError, RenderErrorKind, TemplateError};
use kiln_expand::{expand, ExpandOptions};
use pretty_assertions::assert_eq;
use rustc_hash::FxHashMap;

use super::*;

fn compile(name: &str, text: &str) -> Arc<CompiledTemplate> {
    let doc = kiln_markup::parse_named(text, name).unwrap();
    let ir = expand(&doc, &ExpandOptions::new(name)).unwrap();
    Arc::new(compile_ir(&ir).unwrap())
}

#[derive(Default)]
struct Templates(FxHashMap<String, Arc<CompiledTemplate>>);

impl Templates {
    fn new(sources: &[(&str, &str)]) -> Self {
        Templates(
            sources
                .iter()
                .map(|(name, text)| ((*name).to_owned(), compile(name, text)))
                .collect(),
        )
    }

    fn render(&self, name: &str, vars: Context) -> Result<String, RenderError> {
        render(&self.0[name], vars, self, &RenderOptions::default())
    }
}

impl TemplateImporter for Templates {
    fn import(&self, name: &str) -> Result<Arc<CompiledTemplate>, TemplateError> {
        self.0
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound { name: name.to_owned() }.into())
    }
}

fn render_str(text: &str, vars: Context) -> Result<String, RenderError> {
    Templates::new(&[("t.html", text)]).render("t.html", vars)
}

fn ok(text: &str, vars: Context) -> String {
    render_str(text, vars).unwrap()
}

#[test]
fn substitutions_are_escaped() {
    assert_eq!(ok("<div>${x}</div>", Context::new().with("x", "<&>")), "<div>&lt;&amp;&gt;</div>");
    assert_eq!(
        ok("<div>${x}</div>", Context::new().with("x", Markup::from("<b/>"))),
        "<div><b/></div>"
    );
    assert_eq!(ok("<div>${x}</div>", Context::new().with("x", Value::None)), "<div></div>");
    assert_eq!(ok("<p>${literal(x)}</p>", Context::new().with("x", "<i>")), "<p><i></p>");
}

#[test]
fn custom_escaper_is_used() {
    let templates = Templates::new(&[("t.html", "<p>${a} ${b}</p>")]);
    let options = RenderOptions {
        escape: Arc::new(|s: &str| s.replace('<', "[lt]")),
        ..RenderOptions::default()
    };
    let vars = Context::new().with("a", "x<y").with("b", "plain");
    let out = render(&templates.0["t.html"], vars, &templates, &options).unwrap();
    assert_eq!(out, "<p>x[lt]y plain</p>");
}

#[test]
fn conditionals_and_loops() {
    let text = r#"<ul><li py:for="i, item in enumerate" py:if="item">${i}:${item}</li></ul>"#;
    let vars = Context::new().with(
        "enumerate",
        Value::list([Value::list([Value::Int(0), "a".into()]), Value::list([Value::Int(1), "".into()])]),
    );
    assert_eq!(ok(text, vars), "<ul><li>0:a</li></ul>");

    let text = r#"<py:if test="n &gt; 1">many</py:if><py:else>one</py:else>"#;
    assert_eq!(ok(text, Context::new().with("n", 2)), "many");
    assert_eq!(ok(text, Context::new().with("n", 1)), "one");
}

#[test]
fn loop_over_range_and_map() {
    assert_eq!(ok(r#"<py:for each="i in range(3)">$i</py:for>"#, Context::new()), "012");
    let vars = Context::new().with("m", Value::map([("b", 2), ("a", 1)]));
    assert_eq!(
        ok(r#"<py:for each="k, v in m.items()">$k=$v;</py:for>"#, vars),
        "a=1;b=2;"
    );
}

#[test]
fn switch_selects_one_case() {
    let text = r#"<py:switch test="n"><py:case value="1">one</py:case><py:case value="2">two</py:case><py:else>many</py:else></py:switch>"#;
    assert_eq!(ok(text, Context::new().with("n", 1)), "one");
    assert_eq!(ok(text, Context::new().with("n", 2.0)), "two");
    assert_eq!(ok(text, Context::new().with("n", 7)), "many");
}

#[test]
fn nested_switches_restore_the_outer_value() {
    let text = concat!(
        r#"<py:switch test="a">"#,
        r#"<py:case value="1"><py:switch test="b"><py:case value="2">inner</py:case></py:switch>"#,
        r#"<py:switch test="a"><py:case value="1">-outer</py:case></py:switch></py:case>"#,
        r#"</py:switch>"#,
    );
    assert_eq!(ok(text, Context::new().with("a", 1).with("b", 2)), "inner-outer");
}

#[test]
fn with_restores_bindings() {
    let text = r#"<py:for each="x in [1]"><py:with vars="x=x + 10; y=2">$x$y</py:with>|$x|${defined('y')}</py:for>"#;
    assert_eq!(ok(text, Context::new()), "112|1|False");
}

#[test]
fn dynamic_attributes_collect_and_omit() {
    let text = r#"<a href="/u/${id}" title="${title}">x</a>"#;
    assert_eq!(
        ok(text, Context::new().with("id", 7).with("title", Value::None)),
        "<a href=\"/u/7\">x</a>"
    );
    assert_eq!(
        ok(text, Context::new().with("id", 7).with("title", "a \"b\"")),
        "<a href=\"/u/7\" title=\"a &quot;b&quot;\">x</a>"
    );
}

#[test]
fn py_attrs_renders_sorted_attributes() {
    let text = r#"<!DOCTYPE html><input py:attrs="attrs"/>"#;
    let vars = Context::new().with(
        "attrs",
        Value::map([("name", Value::from("q")), ("disabled", Value::Bool(true)), ("x", Value::None)]),
    );
    assert_eq!(ok(text, vars), "<!DOCTYPE html><input disabled name=\"q\">");
}

#[test]
fn blocks_take_arguments() {
    let text = concat!(
        r#"<py:def function="row(label, width=2)"><td>$label/$width</td></py:def>"#,
        r#"${row('a')}${row('b', width=3)}${row(width=4, label='c')}"#,
    );
    assert_eq!(ok(text, Context::new()), "<td>a/2</td><td>b/3</td><td>c/4</td>");
}

#[test]
fn argument_errors() {
    let def = r#"<py:def function="row(label)">$label</py:def>"#;
    let err = render_str(&format!("{def}${{row()}}"), Context::new()).unwrap_err();
    assert_eq!(
        err.kind,
        RenderErrorKind::MissingArgument { function: "row".into(), param: "label".into() }
    );
    let err = render_str(&format!("{def}${{row(1, 2)}}"), Context::new()).unwrap_err();
    assert!(matches!(err.kind, RenderErrorKind::TooManyArguments { expected: 1, got: 2, .. }));
    let err = render_str(&format!("{def}${{row(lable=1)}}"), Context::new()).unwrap_err();
    assert!(matches!(err.kind, RenderErrorKind::UnexpectedArgument { .. }));
}

#[test]
fn recursion_is_limited() {
    let text = r#"<py:def function="down(n)">${down(n + 1)}</py:def>${down(0)}"#;
    let err = render_str(text, Context::new()).unwrap_err();
    assert_eq!(err.kind, RenderErrorKind::RecursionLimit { limit: DEFAULT_RECURSION_LIMIT });
}

#[test]
fn bounded_recursion_renders() {
    let text = r#"<py:def function="count(n)">$n<py:if test="n">${count(n - 1)}</py:if></py:def>${count(3)}"#;
    assert_eq!(ok(text, Context::new()), "3210");
}

const BASE: &str = concat!(
    "<html>\n",
    "<head py:block=\"header\">base header</head>\n",
    "<body>${content()}</body>\n",
    "<foot py:block=\"footer\">base footer</foot>\n",
    "<py:def function=\"content()\">base content</py:def>\n",
    "</html>",
);

#[test]
fn child_blocks_override_parent_blocks() {
    let child = concat!(
        "<py:extends href=\"base.html\"/>\n",
        "<head py:block=\"header\">child header</head>\n",
    );
    let templates = Templates::new(&[("base.html", BASE), ("child.html", child)]);
    let out = templates.render("child.html", Context::new()).unwrap();
    assert_eq!(
        out,
        concat!(
            "<html>\n",
            "<head>child header</head>\n",
            "<body>base content</body>\n",
            "<foot>base footer</foot>\n",
            "\n",
            "</html>",
        )
    );
}

#[test]
fn parent_blocks_are_reachable_from_overrides() {
    let child = concat!(
        "<py:extends href=\"base.html\"/>",
        "<head py:block=\"header\">[${parent.header()}]</head>",
        "<py:def function=\"content()\">${self.footer()}!</py:def>",
    );
    let templates = Templates::new(&[("base.html", BASE), ("child.html", child)]);
    let out = templates.render("child.html", Context::new()).unwrap();
    assert!(out.contains("<head>[<head>base header</head>]</head>"), "{out}");
    assert!(out.contains("<body><foot>base footer</foot>!</body>"), "{out}");
}

#[test]
fn three_level_inheritance() {
    let middle = concat!(
        "<py:extends href=\"base.html\"/>",
        "<py:def function=\"content()\">middle(${detail()})</py:def>",
        "<py:def function=\"detail()\">middle detail</py:def>",
    );
    let leaf = concat!(
        "<py:extends href=\"middle.html\"/>",
        "<py:def function=\"detail()\">leaf detail</py:def>",
    );
    let templates = Templates::new(&[("base.html", BASE), ("middle.html", middle), ("leaf.html", leaf)]);
    let out = templates.render("leaf.html", Context::new()).unwrap();
    assert!(out.contains("<body>middle(leaf detail)</body>"), "{out}");
}

#[test]
fn missing_block_is_reported() {
    let child = "<py:extends href=\"base.html\"/><py:def function=\"content()\">${parent.sidebar()}</py:def>";
    let templates = Templates::new(&[("base.html", BASE), ("child.html", child)]);
    let err = templates.render("child.html", Context::new()).unwrap_err();
    assert_eq!(err.kind, RenderErrorKind::MissingBlock { name: "sidebar".into() });
}

#[test]
fn missing_parent_template_is_an_import_failure() {
    let err = render_str("<py:extends href=\"nope.html\"/>", Context::new()).unwrap_err();
    let RenderErrorKind::ImportFailed { name, source } = err.kind else {
        panic!("expected import failure, got {:?}", err.kind);
    };
    assert_eq!(name, "nope.html");
    assert_eq!(*source, TemplateError::Load(LoadError::NotFound { name: "nope.html".into() }));
}

#[test]
fn computed_parent_name() {
    let child = "<py:extends href=\"${layout}.html\"/>";
    let templates = Templates::new(&[("base.html", BASE), ("child.html", child)]);
    let out = templates.render("child.html", Context::new().with("layout", "base")).unwrap();
    assert!(out.contains("base header"));
}

#[test]
fn imports_and_includes() {
    let lib = r#"<py:def function="badge(text)"><b>$text</b></py:def>"#;
    let nav = "<nav>${who}</nav>";
    let page = concat!(
        r#"<py:import href="widgets/lib.html"/>"#,
        r#"<py:import href="widgets/lib.html" alias="w"/>"#,
        r#"${lib.badge('x')}${w.badge('y')}<py:include href="nav.html"/>"#,
    );
    let templates = Templates::new(&[("widgets/lib.html", lib), ("nav.html", nav), ("page.html", page)]);
    let out = templates.render("page.html", Context::new().with("who", "me")).unwrap();
    assert_eq!(out, "<b>x</b><b>y</b><nav>me</nav>");
}

#[test]
fn render_errors_name_template_lines() {
    let text = "<div>\n  <p>\n    ${1 // zero}\n  </p>\n</div>";
    let err = render_str(text, Context::new().with("zero", 0)).unwrap_err();
    assert_eq!(err.kind, RenderErrorKind::DivisionByZero);
    assert_eq!(err.line(), 3);
    assert_eq!(err.frames[0].function, "__main__");
    assert_eq!(&*err.frames[0].location.file, "t.html");
}

#[test]
fn errors_trace_through_block_calls() {
    let text = concat!(
        "<py:def function=\"inner()\">\n",
        "  ${missing}\n",
        "</py:def>\n",
        "<p>${inner()}</p>",
    );
    let err = render_str(text, Context::new()).unwrap_err();
    assert_eq!(err.kind, RenderErrorKind::UndefinedName { name: "missing".into() });
    let trace: Vec<(String, u32)> = err
        .frames
        .iter()
        .map(|f| (f.function.clone(), f.location.line))
        .collect();
    assert_eq!(trace, vec![("inner".to_owned(), 2), ("__main__".to_owned(), 4)]);
}

#[test]
fn errors_in_parent_templates_name_the_parent() {
    let base = "<html>\n${content()}\n${oops}\n</html>";
    let child = "<py:extends href=\"base.html\"/><py:def function=\"content()\">c</py:def>";
    let templates = Templates::new(&[("base.html", base), ("child.html", child)]);
    let err = templates.render("child.html", Context::new()).unwrap_err();
    assert_eq!(err.location().map(|l| (&*l.file, l.line)), Some(("base.html", 3)));
}

#[test]
fn rendering_is_lazy_and_stops_after_errors() {
    let templates = Templates::new(&[("t.html", "<a>${x}</a><b>${1 // 0}</b><c/>")]);
    let mut chunks = Render::new(
        &templates.0["t.html"],
        Context::new().with("x", 1),
        &templates,
        &RenderOptions::default(),
    );
    assert_eq!(chunks.next().unwrap().unwrap(), "<a>");
    assert_eq!(chunks.next().unwrap().unwrap(), "1");
    assert_eq!(chunks.next().unwrap().unwrap(), "</a><b>");
    assert!(chunks.next().unwrap().is_err());
    assert!(chunks.next().is_none());
}

#[test]
fn native_functions_and_methods() {
    let vars = Context::new()
        .with("shout", Value::function(|args| Ok(Value::from(args[0].to_text().to_uppercase()))))
        .with("user", Value::map([("name", " ann ")]));
    assert_eq!(
        ok("${shout(user.name.strip())}|${user['name'].upper()}|${len(user)}", vars),
        "ANN| ANN |1"
    );
}

#[test]
fn names_resolve_in_order() {
    let text = concat!(
        r#"<py:def function="len()">block</py:def>"#,
        r#"${len()}<py:for each="len in [5]">${len}</py:for>${str}|${range(1)}"#,
    );
    assert_eq!(ok(text, Context::new().with("str", "ctx")), "block5ctx|[0]");
}

#[test]
fn undefined_names_fail() {
    let err = render_str("${nope}", Context::new()).unwrap_err();
    assert_eq!(err.kind, RenderErrorKind::UndefinedName { name: "nope".into() });
    assert!(render_str("<py:if test=\"defined('nope')\">x</py:if>", Context::new())
        .unwrap()
        .is_empty());
}

#[test]
fn no_imports_rejects_every_name() {
    let template = compile("t.html", "<py:include href=\"x.html\"/>");
    let err = render(&template, Context::new(), &NoImports, &RenderOptions::default()).unwrap_err();
    assert!(matches!(err.kind, RenderErrorKind::ImportFailed { .. }));
}
