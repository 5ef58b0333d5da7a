#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_ir::{Expr, Mode};
use pretty_assertions::assert_eq;

use super::*;
use crate::FuncId;

fn asm(text: &str) -> CompiledTemplate {
    assemble(text, "t.html", Mode::Xml).unwrap()
}

#[test]
fn lowers_if_else_to_jumps() {
    let t = asm("def __main__()\n  if a\n    text \"A\"\n  else\n    text \"B\"\n  end\nend\n");
    assert_eq!(
        t.main().code,
        vec![
            Instr::JumpIfNot {
                test: Expr::name("a"),
                target: 3
            },
            Instr::Text("A".into()),
            Instr::Jump(4),
            Instr::Text("B".into()),
        ]
    );
}

#[test]
fn lowers_loops() {
    let t = asm("def __main__()\n  for x in xs\n    emit x\n  end\n  text \".\"\nend\n");
    let code = &t.main().code;
    assert!(matches!(code[0], Instr::IterStart(_)));
    assert!(matches!(code[1], Instr::IterNext { exit: 4, .. }));
    assert_eq!(code[3], Instr::Jump(1));
    assert_eq!(code[4], Instr::Text(".".into()));
}

#[test]
fn lowers_switch_cases() {
    let t = asm(concat!(
        "def __main__()\n",
        "  switch n\n",
        "    case 1\n",
        "      text \"one\"\n",
        "    end\n",
        "    default\n",
        "      text \"other\"\n",
        "    end\n",
        "  end\n",
        "end\n",
    ));
    let code = &t.main().code;
    assert!(matches!(code[0], Instr::PushSwitch(_)));
    assert!(matches!(code[1], Instr::Case { value: Some(_), target: 4 }));
    assert_eq!(code[3], Instr::Jump(7));
    assert!(matches!(code[4], Instr::Case { value: None, target: 7 }));
    assert_eq!(code[6], Instr::Jump(7));
    assert_eq!(code[7], Instr::PopSwitch);
}

#[test]
fn with_and_collect() {
    let t = asm(concat!(
        "def __main__()\n",
        "  with a\n",
        "    let a = 1\n",
        "    collect \"title\"\n",
        "      emit a\n",
        "    end\n",
        "  end\n",
        "end\n",
    ));
    assert_eq!(
        t.main().code,
        vec![
            Instr::PushWith(vec!["a".into()]),
            Instr::Assign {
                name: "a".into(),
                value: Expr::Literal(kiln_ir::Literal::Int(1))
            },
            Instr::BeginCollect,
            Instr::Emit(Expr::name("a")),
            Instr::EndCollect("title".into()),
            Instr::PopWith,
        ]
    );
}

#[test]
fn functions_and_params() {
    let t = asm("def __main__()\n  call row(1)\nend\ndef row(label, width=2)\n  emit label\nend\n");
    let row = t.lookup("row").unwrap();
    assert_ne!(row, FuncId::MAIN);
    let f = t.function(row);
    assert_eq!(f.params.len(), 2);
    assert_eq!(t.blocks().count(), 1);
}

#[test]
fn imports_and_extend() {
    let t = asm("def __main__()\n  extend \"base.html\"\n  import _ = \"lib.html\"\n  import forms = \"f.html\"\nend\n");
    let code = &t.main().code;
    assert_eq!(code[0], Instr::Extend(Expr::str("base.html")));
    assert_eq!(
        code[1],
        Instr::Import {
            alias: None,
            href: Expr::str("lib.html")
        }
    );
    assert!(matches!(&code[2], Instr::Import { alias: Some(a), .. } if a == "forms"));
}

#[test]
fn records_listing_lines_per_instruction() {
    let t = asm("# header\ndef __main__()\n  text \"a\"\n\n  emit b\n  if c\n    text \"d\"\n  end\nend\n");
    let lines = &t.main().generated_lines;
    assert_eq!(lines.first_line(), 2);
    assert_eq!(lines.line_for(0), 3);
    assert_eq!(lines.line_for(1), 5);
    assert_eq!(lines.line_for(2), 6);
    assert_eq!(lines.line_for(3), 7);
}

#[test]
fn failures_carry_the_numbered_listing() {
    let err = assemble("def __main__()\n  frobnicate x\nend\n", "t.html", Mode::Xml).unwrap_err();
    assert_eq!(err.line, 2);
    assert!(err.message.contains("frobnicate"));
    assert!(err.listing().contains("   2   frobnicate x"));
}

#[test]
fn structural_errors() {
    let cases = [
        ("text \"x\"\n", "outside of a `def`"),
        ("def __main__()\n  if a\nend\n", "never closed"),
        ("def __main__()\n  else\nend\n", "without an open `if`"),
        ("def __main__()\n  case 1\n  end\nend\n", "outside of a `switch`"),
        ("def other()\nend\n", "must be `__main__`"),
        ("def __main__()\n  emit (a +\nend\n", "invalid expression"),
    ];
    for (listing, expected) in cases {
        let err = assemble(listing, "t.html", Mode::Xml).unwrap_err();
        assert!(err.message.contains(expected), "{listing:?}: {}", err.message);
    }
}

#[test]
fn assembles_generated_listings() {
    let doc = kiln_markup::parse_named(
        concat!(
            "<!DOCTYPE html>\n",
            "<ul py:if=\"items\" class=\"${cls}\">\n",
            "  <li py:for=\"i, item in items\" py:attrs=\"extra\">${item}</li>\n",
            "</ul>\n",
            "<py:switch test=\"n\"><py:case value=\"1\">1</py:case><py:else>*</py:else></py:switch>\n",
            "<py:with vars=\"a=1\">$a</py:with>\n",
            "<div py:def=\"box(title, level=1)\" py:strip=\"level > 1\">$title</div>",
        ),
        "t.html",
    )
    .unwrap();
    let ir = kiln_expand::expand(&doc, &kiln_expand::ExpandOptions::new("t.html")).unwrap();
    let t = crate::compile_ir(&ir).unwrap();
    assert_eq!(t.mode(), Mode::Html5);
    assert!(t.lookup("box").is_some());
    assert_eq!(t.generated_source(), crate::generate(&ir).text);
    // Every main instruction reports a template line from the template.
    for pc in 0..t.main().code.len() {
        let line = t.main().line_for(pc);
        assert!((1..=7).contains(&line), "pc {pc} -> line {line}");
    }
}
