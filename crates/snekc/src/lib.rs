// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! The compile driver: parse, type check, generate, and optionally run.
//! Every stage stops the pipeline at its first diagnostic.

use snek_codegen::CodegenError;
use snek_frontend::{ParseError, Program, TypeError, parse_program, type_check_program};
use snek_runtime::RuntimeError;
use thiserror::Error;

pub use snek_runtime::{RunConfig, RunOutcome};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("ParseError: {0}")]
    Parse(#[from] ParseError),
    #[error("TypeError: {0}")]
    Type(#[from] TypeError),
    /// The generator hit a program the checker should have rejected.
    #[error("internal compiler error: {0}")]
    Internal(#[from] CodegenError),
    #[error("RuntimeError: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Parse `source` without type checking it.
pub fn parse(source: &str) -> Result<Program, CompileError> {
    Ok(parse_program(source)?)
}

/// Parse and type check; every expression in the result carries its type.
pub fn check(source: &str) -> Result<Program, CompileError> {
    Ok(type_check_program(parse(source)?)?)
}

/// Compile `source` to a WebAssembly text module.
pub fn compile(source: &str) -> Result<String, CompileError> {
    let program = check(source)?;
    Ok(snek_codegen::generate(&program)?)
}

pub fn compile_and_run(source: &str, config: &RunConfig) -> Result<RunOutcome, CompileError> {
    let text = compile(source)?;
    Ok(snek_runtime::run(&text, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_report_their_own_error_kind() {
        assert!(matches!(compile("x = "), Err(CompileError::Parse(_))));
        assert!(matches!(compile("1 + True"), Err(CompileError::Type(_))));
        assert!(compile("1 + 2").is_ok());
    }

    #[test]
    fn messages_name_the_stage() {
        let err = compile("x: int = True").unwrap_err();
        assert!(err.to_string().starts_with("TypeError: "), "{err}");
        let err = compile("def f(x):\n    pass\n").unwrap_err();
        assert!(err.to_string().starts_with("ParseError: "), "{err}");
    }

    #[test]
    fn runtime_traps_surface() {
        let err = compile_and_run("1 // 0", &RunConfig::default()).unwrap_err();
        assert!(matches!(err, CompileError::Runtime(RuntimeError::Trap(_))));
    }

    #[test]
    fn checked_program_is_annotated() {
        let program = check("x: int = 1\nx + 1").unwrap();
        let snek_frontend::Stmt::Expr(e) = &program.stmts[0] else {
            panic!("expected an expression statement");
        };
        assert_eq!(e.ty, Some(snek_frontend::Type::Int));
    }
}
