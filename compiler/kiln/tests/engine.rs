#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end tests through the public engine API.

use std::sync::Arc;

use kiln::{
    Context, DirectiveError, Engine, LoadError, MemoryLoader, Mode, RenderErrorKind,
    TemplateError, Value,
};
use pretty_assertions::assert_eq;

const BASE: &str = concat!(
    "<!DOCTYPE html>\n",
    "<html>\n",
    "<head py:block=\"head\"><title>${title}</title></head>\n",
    "<body>${content()}</body>\n",
    "<py:def function=\"content()\">nothing here</py:def>\n",
    "</html>",
);

fn site() -> MemoryLoader {
    MemoryLoader::new().with("base.html", BASE).with(
        "page.html",
        concat!(
            "<py:extends href=\"base.html\"/>\n",
            "<py:def function=\"content()\">",
            "<ul><li py:for=\"item in items\">${item}</li></ul>",
            "</py:def>",
        ),
    )
}

#[test]
fn substitutions_are_escaped() {
    let engine = Engine::new(MemoryLoader::new());
    let out = engine
        .template_from_str("t.html", "<div>${x}</div>")
        .unwrap()
        .render(Context::new().with("x", "<script>"))
        .unwrap();
    assert_eq!(out, "<div>&lt;script&gt;</div>");
}

#[test]
fn inherited_page_renders() {
    let engine = Engine::new(site());
    let vars = Context::new()
        .with("title", "Tools & Co")
        .with("items", vec![Value::from("a"), Value::from("<b>")]);
    let out = engine.template("page.html").unwrap().render(vars).unwrap();
    assert_eq!(
        out,
        concat!(
            "<!DOCTYPE html>\n",
            "<html>\n",
            "<head><title>Tools &amp; Co</title></head>\n",
            "<body><ul><li>a</li><li>&lt;b&gt;</li></ul></body>\n",
            "\n",
            "</html>",
        )
    );
}

#[test]
fn streaming_matches_render() {
    let engine = Engine::new(site());
    let template = engine.template("page.html").unwrap();
    let vars = || Context::new().with("title", "t").with("items", vec![1, 2, 3]);
    let chunks: Vec<String> = template.stream(vars()).collect::<Result<_, _>>().unwrap();
    assert!(chunks.len() > 1);
    assert_eq!(chunks.concat(), template.render(vars()).unwrap());
}

#[test]
fn compiled_templates_are_cached_by_content() {
    let loader = MemoryLoader::new().with("a.html", "<p>${x}</p>");
    let engine = Engine::new(loader);

    let first = engine.load("a.html").unwrap();
    let second = engine.load("a.html").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(engine.cached(), 1);

    let other = engine.compile("a.html", "<q>${x}</q>").unwrap();
    assert!(!Arc::ptr_eq(&first, &other));
    let again = engine.compile("a.html", "<q>${x}</q>").unwrap();
    assert!(Arc::ptr_eq(&other, &again));
}

#[test]
fn changed_text_replaces_the_cached_compile() {
    let engine = Engine::new(MemoryLoader::new());
    for n in 0..10 {
        engine.compile("a.html", &format!("<p>{n}</p>")).unwrap();
    }
    engine.compile("b.html", "<p/>").unwrap();
    assert_eq!(engine.cached(), 2);

    let last = engine.compile("a.html", "<p>9</p>").unwrap();
    let first = engine.compile("a.html", "<p>0</p>").unwrap();
    assert!(!Arc::ptr_eq(&last, &first));
    assert_eq!(engine.cached(), 2);
}

fn render_error(engine: &Engine, name: &str) -> kiln::RenderError {
    match engine.template(name).unwrap().render(Context::new()) {
        Err(TemplateError::Render(err)) => err,
        other => panic!("expected a render error, got {other:?}"),
    }
}

#[test]
fn self_extending_template_fails() {
    let engine = Engine::new(MemoryLoader::new().with("a.html", "<py:extends href=\"a.html\"/>"));
    let err = render_error(&engine, "a.html");
    assert_eq!(err.kind, RenderErrorKind::ExtendsCycle { name: "a.html".into() });
    assert_eq!(err.line(), 1);
}

#[test]
fn inheritance_cycles_fail() {
    let engine = Engine::new(
        MemoryLoader::new()
            .with("a.html", "<py:extends href=\"b.html\"/>")
            .with("b.html", "\n<py:extends href=\"a.html\"/>"),
    );
    let err = render_error(&engine, "a.html");
    assert_eq!(err.kind, RenderErrorKind::ExtendsCycle { name: "a.html".into() });
    let location = err.location().unwrap();
    assert_eq!((&*location.file, location.line), ("b.html", 2));
}

#[test]
fn long_inheritance_chains_hit_the_recursion_limit() {
    let mut loader = MemoryLoader::new().with("t9.html", "<p>base</p>");
    for n in 0..9 {
        loader = loader.with(format!("t{n}.html"), format!("<py:extends href=\"t{}.html\"/>", n + 1));
    }
    let engine = Engine::builder().loader(loader).recursion_limit(4).build();
    let err = render_error(&engine, "t0.html");
    assert_eq!(err.kind, RenderErrorKind::RecursionLimit { limit: 4 });

    let engine = Engine::builder()
        .loader(MemoryLoader::new().with("t1.html", "<p>base</p>").with("t0.html", "<py:extends href=\"t1.html\"/>"))
        .recursion_limit(4)
        .build();
    assert_eq!(engine.template("t0.html").unwrap().render(Context::new()).unwrap(), "<p>base</p>");
}

#[test]
fn failed_parent_is_reported_at_the_extends_line() {
    let engine = Engine::new(MemoryLoader::new().with(
        "a.html",
        "<py:extends href=\"missing.html\"/>\n\n\n<py:import href=\"lib.html\" alias=\"lib\"/>",
    ));
    let err = render_error(&engine, "a.html");
    assert!(
        matches!(&err.kind, RenderErrorKind::ImportFailed { name, .. } if name == "missing.html"),
        "{err:?}"
    );
    let location = err.location().unwrap();
    assert_eq!((&*location.file, location.line), ("a.html", 1));
}

#[test]
fn imports_after_extends_reach_child_blocks() {
    let engine = Engine::new(
        site()
            .with("lib.html", "<py:def function=\"badge(text)\"><b>$text</b></py:def>")
            .with(
                "badged.html",
                concat!(
                    "<py:extends href=\"base.html\"/>\n",
                    "<py:import href=\"lib.html\" alias=\"lib\"/>\n",
                    "<py:def function=\"content()\">${lib.badge(title)}</py:def>",
                ),
            ),
    );
    let out = engine
        .template("badged.html")
        .unwrap()
        .render(Context::new().with("title", "hi"))
        .unwrap();
    assert!(out.contains("<body><b>hi</b></body>"), "{out}");
}

#[test]
fn imported_templates_share_the_cache() {
    let engine = Engine::new(site());
    engine
        .template("page.html")
        .unwrap()
        .render(Context::new().with("title", "").with("items", Vec::<Value>::new()))
        .unwrap();
    // page.html plus its parent.
    assert_eq!(engine.cached(), 2);
}

#[test]
fn forced_mode_overrides_detection() {
    let text = "<p><br/><input checked=\"checked\"/></p>";
    let xml = Engine::new(MemoryLoader::new());
    assert_eq!(
        xml.template_from_str("t", text).unwrap().render(Context::new()).unwrap(),
        "<p><br/><input checked=\"checked\"/></p>"
    );

    let html = Engine::builder().mode(Mode::Html5).build();
    let template = html.template_from_str("t", text).unwrap();
    assert_eq!(template.compiled().mode(), Mode::Html5);
    assert_eq!(template.render(Context::new()).unwrap(), "<p><br><input checked></p>");
}

#[test]
fn custom_escape_function() {
    let engine = Engine::builder()
        .escape(|text: &str| text.to_uppercase())
        .build();
    let out = engine
        .template_from_str("t", "<p>${x} ok</p>")
        .unwrap()
        .render(Context::new().with("x", "shout"))
        .unwrap();
    assert_eq!(out, "<p>SHOUT ok</p>");
}

#[test]
fn recursion_limit_is_configurable() {
    let text = r#"<py:def function="f(n)">${f(n + 1)}</py:def>${f(0)}"#;
    let engine = Engine::builder().recursion_limit(8).build();
    let err = engine
        .template_from_str("t", text)
        .unwrap()
        .render(Context::new())
        .unwrap_err();
    let TemplateError::Render(err) = err else {
        panic!("expected a render error, got {err:?}");
    };
    assert_eq!(err.kind, RenderErrorKind::RecursionLimit { limit: 8 });
}

#[test]
fn render_errors_point_at_template_lines() {
    let engine = Engine::new(MemoryLoader::new().with(
        "list.html",
        "<ul>\n  <li py:for=\"x in items\">\n    ${x.missing}\n  </li>\n</ul>",
    ));
    let err = engine
        .template("list.html")
        .unwrap()
        .render(Context::new().with("items", vec![1]))
        .unwrap_err();
    let location = err.location().unwrap();
    assert_eq!((&*location.file, location.line), ("list.html", 3));
}

#[test]
fn compile_errors_surface_with_locations() {
    let engine = Engine::new(MemoryLoader::new());

    let err = engine.compile("bad.html", "<div>\n<p></div>").unwrap_err();
    assert!(matches!(err, TemplateError::Markup(_)), "{err:?}");
    assert_eq!(err.location().map(|l| l.line), Some(2));

    let err = engine.compile("bad.html", "<p>\n<py:loop/></p>").unwrap_err();
    let TemplateError::Directive(DirectiveError { line, directive, .. }) = err else {
        panic!("expected a directive error, got {err:?}");
    };
    assert_eq!((line, directive.as_str()), (2, "py:loop"));
    assert_eq!(engine.cached(), 0);
}

#[test]
fn missing_templates_and_blocks() {
    let engine = Engine::new(site());
    assert_eq!(
        engine.load("nope.html").unwrap_err(),
        TemplateError::Load(LoadError::NotFound { name: "nope.html".into() })
    );

    let err = engine
        .template_from_str(
            "broken.html",
            "<py:extends href=\"base.html\"/><py:def function=\"content()\">${parent.aside()}</py:def>",
        )
        .unwrap()
        .render(Context::new().with("title", "x"))
        .unwrap_err();
    let TemplateError::Render(err) = err else {
        panic!("expected a render error, got {err:?}");
    };
    assert_eq!(err.kind, RenderErrorKind::MissingBlock { name: "aside".into() });
}

#[test]
fn generated_listing_is_kept() {
    let engine = Engine::new(MemoryLoader::new());
    let compiled = engine.compile("t.html", "<p py:if=\"x\">${x}</p>").unwrap();
    let listing = compiled.generated_source();
    assert!(listing.lines().any(|l| l.starts_with("def __main__")), "{listing}");
}

#[test]
fn updated_sources_are_recompiled() {
    let loader = Arc::new(MemoryLoader::new().with("t.html", "<p>one</p>"));
    let engine = Engine::new(Shared(Arc::clone(&loader)));
    assert_eq!(engine.template("t.html").unwrap().render(Context::new()).unwrap(), "<p>one</p>");

    loader.insert("t.html", "<p>two</p>");
    assert_eq!(engine.template("t.html").unwrap().render(Context::new()).unwrap(), "<p>two</p>");
}

struct Shared(Arc<MemoryLoader>);

impl kiln::Loader for Shared {
    fn resolve(&self, name: &str) -> Result<kiln::TemplateSource, LoadError> {
        self.0.resolve(name)
    }
}
