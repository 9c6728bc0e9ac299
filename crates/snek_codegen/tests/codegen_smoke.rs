// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use snek_codegen::Codegen;
use snek_frontend::{parse_program, type_check_program};
use snek_runtime::{RunConfig, RunOutcome, run};

fn compile_from_str(src: &str) -> Result<String, String> {
    let prog = parse_program(src).map_err(|e| format!("parse error: {e}"))?;
    let prog = type_check_program(prog).map_err(|e| format!("type error: {e}"))?;

    let mut cg = Codegen::new();
    cg.compile_program(&prog)
        .map_err(|e| format!("codegen error: {e}"))?;

    cg.text().ok_or_else(|| "no module produced".to_string())
}

fn run_src(src: &str) -> RunOutcome {
    let wat = compile_from_str(src).unwrap();
    run(&wat, &RunConfig::default()).unwrap_or_else(|e| panic!("{e}\n{wat}"))
}

#[test]
fn codegen_minimal_arithmetic() {
    let wat = compile_from_str("1 + 2 * 3").unwrap();
    assert!(wat.contains("(export \"_start\")"));
    assert!(wat.contains("i32.mul"));
    assert_eq!(run_src("1 + 2 * 3").value, Some(7));
}

#[test]
fn module_declares_imports_and_heap() {
    let wat = compile_from_str("x: int = 5\nx").unwrap();
    assert!(wat.contains("(import \"memory\" \"heap\" (memory 1))"));
    assert!(wat.contains("(import \"imports\" \"print_num\")"));
    assert!(wat.contains("(global $heap$ptr (mut i32) (i32.const 4))"));
    assert!(wat.contains("(global $x (mut i32) (i32.const 0))"));
}

#[test]
fn entry_result_only_for_trailing_expression() {
    assert_eq!(run_src("x: int = 5\nx").value, Some(5));
    assert_eq!(run_src("x: int = 5\nx = 6").value, None);
    assert_eq!(run_src("").value, None);
}

#[test]
fn integer_operators() {
    assert_eq!(run_src("11 // 4").value, Some(2));
    assert_eq!(run_src("11 % 4").value, Some(3));
    assert_eq!(run_src("-5").value, Some(-5));
    assert_eq!(run_src("3 - 10").value, Some(-7));
}

#[test]
fn boolean_operators() {
    assert_eq!(run_src("not True").value, Some(0));
    assert_eq!(run_src("not False").value, Some(1));
    assert_eq!(run_src("True and False").value, Some(0));
    assert_eq!(run_src("True or False").value, Some(1));
    assert_eq!(run_src("2 >= 2").value, Some(1));
    assert_eq!(run_src("2 != 2").value, Some(0));
}

#[test]
fn object_construction_stores_defaults() {
    let src = "\
class P(object):
    x: int = 42
    y: bool = True
p: P = None
p = P()
print(p.x)
print(p.y)
";
    assert_eq!(run_src(src).output, "42\nTrue\n");
}

#[test]
fn distinct_objects_do_not_overlap() {
    let src = "\
class P(object):
    x: int = 1
a: P = None
b: P = None
a = P()
b = P()
a.x = 10
b.x = 20
print(a.x)
print(b.x)
print(a is b)
";
    assert_eq!(run_src(src).output, "10\n20\nFalse\n");
}
