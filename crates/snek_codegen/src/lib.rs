// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

pub mod abi;
pub mod emit;
pub mod layout;
pub mod lowering;

use snek_frontend::Program;
use thiserror::Error;

pub use emit::{Instr, WatFunction, WatModule};

/// Generation only fails on programs the type checker would have rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    #[error("expression was not type checked: `{0}`")]
    MissingAnnotation(String),
    #[error("member access on a non-object: `{0}`")]
    NotAnObject(String),
    #[error("no layout for class {0}")]
    UnknownClass(String),
    #[error("class {class} has no field {field}")]
    UnknownField { class: String, field: String },
    #[error("print takes one argument, got {0}")]
    PrintArity(usize),
}

#[derive(Debug, Default)]
pub struct Codegen {
    pub module: Option<WatModule>,
}

impl Codegen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_program(&mut self, p: &Program) -> Result<&WatModule, CodegenError> {
        let module = lowering::lower_program(p)?;
        tracing::debug!(
            functions = module.functions.len(),
            globals = module.globals.len(),
            "generated module"
        );
        Ok(self.module.insert(module))
    }

    /// The module as WebAssembly text, once compiled.
    pub fn text(&self) -> Option<String> {
        self.module.as_ref().map(ToString::to_string)
    }
}

/// Generate the WebAssembly text for a type-checked program.
pub fn generate(p: &Program) -> Result<String, CodegenError> {
    let mut cg = Codegen::new();
    Ok(cg.compile_program(p)?.to_string())
}
