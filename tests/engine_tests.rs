//! End-to-end engine tests
//!
//! Drive the whole pass from a JSON program description on disk, the way
//! the front-end collaborator would, and check the emitted record stream
//! and the table discipline across runs.

use std::io::Write;

use tempfile::NamedTempFile;

use macro2fn::{Engine, Program, Record, LINE_PREFIX};

const PROGRAM_JSON: &str = r#"{
    "macros": [
        {"name": "INC", "params": ["a"],
         "body": {"paren": {"binary": ["+", {"paren": {"var": "a"}}, {"num": 1}]}},
         "loc": {"file": "inc.h", "line": 1}},
        {"name": "ADD1", "params": ["n"],
         "body": {"paren": {"binary": ["+", {"paren": {"var": "n"}}, {"num": 1}]}},
         "loc": {"file": "inc.h", "line": 2}},
        {"name": "X", "body": {"var": "x"}, "loc": {"file": "inc.h", "line": 3}}
    ],
    "globals": ["g"],
    "sites": [
        {"macro": "INC", "args": [{"num": 5}],
         "loc": {"file": "main.c", "line": 3}, "enclosing": "main"},
        {"macro": "INC", "args": [{"var": "g"}],
         "loc": {"file": "main.c", "line": 4}, "enclosing": "main"},
        {"macro": "ADD1", "args": [{"num": 6}],
         "loc": {"file": "main.c", "line": 5}, "enclosing": "main"},
        {"macro": "X", "loc": {"file": "main.c", "line": 6},
         "enclosing": "main", "locals": ["x"]}
    ]
}"#;

/// Helper loading the shared fixture from an actual file
fn load_program() -> Program {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(PROGRAM_JSON.as_bytes()).unwrap();
    file.flush().unwrap();
    Program::from_path(file.path()).unwrap()
}

#[test]
fn record_stream_has_expected_shape() {
    let mut program = load_program();
    let outcome = Engine::new().run(&mut program).unwrap();
    let records = outcome.reporter.records();

    // Three definition records first, sorted by macro name
    let def_locs: Vec<_> = records[..3]
        .iter()
        .map(|r| match r {
            Record::MacroDefinition { loc, .. } => loc.clone(),
            other => panic!("expected definition record, got {:?}", other),
        })
        .collect();
    assert_eq!(def_locs, vec!["inc.h:2:0", "inc.h:1:0", "inc.h:3:0"]);

    // Then per site: expansion followed by its outcome. Site 1 creates a
    // definition record between the two.
    match &records[3] {
        Record::MacroExpansion { loc, .. } => assert_eq!(loc, "main.c:3:0"),
        other => panic!("expected expansion record, got {:?}", other),
    }
    match &records[4] {
        Record::TransformedDefinition { name, signature, .. } => {
            assert_eq!(name, "inc_fn");
            assert_eq!(signature, "int inc_fn(int a)");
        }
        other => panic!("expected transformed definition, got {:?}", other),
    }
    match &records[5] {
        Record::TransformedExpansion { name, enclosing, .. } => {
            assert_eq!(name, "inc_fn");
            assert_eq!(enclosing, "main");
        }
        other => panic!("expected transformed expansion, got {:?}", other),
    }

    // The final site is the hygiene rejection
    match records.last().unwrap() {
        Record::UntransformedExpansion { category, loc, .. } => {
            assert_eq!(category, "Hygiene");
            assert_eq!(loc, "main.c:6:0");
        }
        other => panic!("expected untransformed expansion, got {:?}", other),
    }
}

#[test]
fn duplicate_definitions_are_never_emitted() {
    let mut program = load_program();
    let outcome = Engine::new().run(&mut program).unwrap();

    // INC twice and ADD1 once share one generated function
    let definition_records = outcome
        .reporter
        .records()
        .iter()
        .filter(|r| matches!(r, Record::TransformedDefinition { .. }))
        .count();
    assert_eq!(definition_records, 1);
    assert_eq!(outcome.stats.definitions_emitted, 1);
    assert_eq!(outcome.stats.dedup_reuses, 2);
    assert_eq!(program.functions.len(), 1);
}

#[test]
fn tables_follow_the_growth_discipline() {
    let mut program = load_program();
    let macros_before = program.macros.len();
    let outcome = Engine::new().run(&mut program).unwrap();

    // The macro table is untouched, the function table only grows
    assert_eq!(program.macros.len(), macros_before);
    assert_eq!(program.functions.len(), outcome.stats.definitions_emitted);
    assert!(program.functions.generated().all(|f| f.is_generated()));

    // Rewritten sites call the generated function, with arguments intact
    let inc = program.interner.lookup("INC").unwrap();
    let inc_fn = program.interner.lookup("inc_fn").unwrap();
    let rewritten = outcome.results[0].rewritten.clone().unwrap();
    match rewritten {
        macro2fn::Expr::Invocation(name, args) => {
            assert_eq!(name, inc_fn);
            assert_ne!(name, inc);
            assert_eq!(args, vec![macro2fn::Expr::Num(5)]);
        }
        other => panic!("expected invocation, got {:?}", other),
    }
}

#[test]
fn reruns_are_deterministic() {
    let mut first = load_program();
    let mut second = load_program();

    let outcome1 = Engine::new().run(&mut first).unwrap();
    let outcome2 = Engine::new().run(&mut second).unwrap();

    assert_eq!(outcome1.reporter.records(), outcome2.reporter.records());
    assert_eq!(outcome1.stats.transformed, outcome2.stats.transformed);
    assert_eq!(
        outcome1.stats.definitions_emitted,
        outcome2.stats.definitions_emitted
    );

    let verdicts1: Vec<_> = outcome1.results.iter().map(|r| r.verdict).collect();
    let verdicts2: Vec<_> = outcome2.results.iter().map(|r| r.verdict).collect();
    assert_eq!(verdicts1, verdicts2);
}

#[test]
fn line_output_is_prefixed_and_json_output_parses() {
    let mut program = load_program();
    let outcome = Engine::new().run(&mut program).unwrap();

    let mut lines = Vec::new();
    outcome.reporter.write_lines(&mut lines).unwrap();
    let text = String::from_utf8(lines).unwrap();
    assert!(!text.is_empty());
    assert!(text.lines().all(|l| l.starts_with(LINE_PREFIX)));

    let json = outcome.reporter.to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let events = parsed.as_array().unwrap();
    assert_eq!(events.len(), outcome.reporter.len());
    assert_eq!(events[0]["event"], "macro_definition");
}

#[test]
fn pure_function_call_arguments_are_eager_safe() {
    // Nested macros are rejected and left to a later pass, but an argument
    // that calls a pure function transforms fine. This is the shape a
    // second engine pass sees after an inner site was rewritten.
    let json = r#"{
        "macros": [
            {"name": "INC", "params": ["a"],
             "body": {"paren": {"binary": ["+", {"paren": {"var": "a"}}, {"num": 1}]}},
             "loc": {"file": "inc.h", "line": 1}}
        ],
        "functions": [
            {"name": "succ", "params": ["x"],
             "ret": {"binary": ["+", {"var": "x"}, {"num": 1}]}}
        ],
        "sites": [
            {"macro": "INC", "args": [{"invoke": ["succ", [{"num": 1}]]}],
             "loc": {"file": "main.c", "line": 1}, "enclosing": "main"},
            {"macro": "INC", "args": [{"invoke": ["INC", [{"num": 1}]]}],
             "loc": {"file": "main.c", "line": 2}, "enclosing": "main"}
        ]
    }"#;

    let mut program = Program::from_json(json).unwrap();
    let outcome = Engine::new().run(&mut program).unwrap();

    assert!(outcome.results[0].verdict.is_transformable());
    // The nested-macro argument stays untransformed for a later pass
    assert!(!outcome.results[1].verdict.is_transformable());
    assert_eq!(outcome.stats.transformed, 1);
}

#[test]
fn second_pass_transforms_rewritten_outer_sites() {
    // Pass 1 rewrites the inner INC(1) site into a call of inc_fn. The
    // front end then re-presents the outer site with the rewritten call as
    // its argument, with the generated function now part of the program.
    let mut pass1 = Program::from_json(
        r#"{
            "macros": [
                {"name": "INC", "params": ["a"],
                 "body": {"paren": {"binary": ["+", {"paren": {"var": "a"}}, {"num": 1}]}},
                 "loc": {"file": "inc.h", "line": 1}}
            ],
            "sites": [
                {"macro": "INC", "args": [{"num": 1}],
                 "loc": {"file": "main.c", "line": 1}, "enclosing": "main"}
            ]
        }"#,
    )
    .unwrap();
    let outcome1 = Engine::new().run(&mut pass1).unwrap();
    let inner_rewritten = outcome1.results[0].rewritten.clone().unwrap();

    // Pass 2: same macro table, the grown function table, and the outer
    // site whose argument is the pass-1 rewrite.
    let inc = pass1.interner.lookup("INC").unwrap();
    let main_fn = pass1.interner.intern("main");
    let file = pass1.files.register("main.c");
    pass1.sites.clear();
    pass1.sites.push(macro2fn::ExpansionSite {
        macro_name: inc,
        args: vec![inner_rewritten],
        loc: macro2fn::SourceLocation::new(file, 1, 1),
        enclosing: main_fn,
        locals: vec![],
    });

    let outcome2 = Engine::new().run(&mut pass1).unwrap();
    assert!(outcome2.results[0].verdict.is_transformable());

    // INC((inc_fn(1))) evaluates to 3 both before and after the rewrite
    let original = macro2fn::Expr::Invocation(inc, pass1.sites[0].args.clone());
    let rewritten = outcome2.results[0].rewritten.clone().unwrap();
    let mut ev = macro2fn::Evaluator::new(&pass1.functions, &pass1.macros, &pass1.interner);
    let env = macro2fn::RuntimeEnv::new();
    assert_eq!(ev.eval_expr(&original, &env), Ok(3));
    let mut ev = macro2fn::Evaluator::new(&pass1.functions, &pass1.macros, &pass1.interner);
    assert_eq!(ev.eval_expr(&rewritten, &env), Ok(3));
}
