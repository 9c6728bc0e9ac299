// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Instruction trees and their rendering as a WebAssembly text module.

use std::fmt::{self, Display, Formatter};

use crate::abi;
use crate::layout::HeapAllocator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    /// One flat instruction, e.g. `i32.add` or `(local.get $x)`.
    Op(String),
    If {
        then: Vec<Instr>,
        otherwise: Vec<Instr>,
    },
    /// Condition is re-evaluated before every iteration; the loop exits when it is zero.
    While {
        label: usize,
        cond: Vec<Instr>,
        body: Vec<Instr>,
    },
}

impl Instr {
    pub fn op<S: Into<String>>(text: S) -> Self {
        Instr::Op(text.into())
    }

    pub fn i32_const(value: i32) -> Self {
        Instr::Op(format!("(i32.const {value})"))
    }

    pub fn call(symbol: &str) -> Self {
        Instr::Op(format!("(call {symbol})"))
    }

    pub fn local_get(symbol: &str) -> Self {
        Instr::Op(format!("(local.get {symbol})"))
    }

    pub fn local_set(symbol: &str) -> Self {
        Instr::Op(format!("(local.set {symbol})"))
    }

    pub fn global_get(symbol: &str) -> Self {
        Instr::Op(format!("(global.get {symbol})"))
    }

    pub fn global_set(symbol: &str) -> Self {
        Instr::Op(format!("(global.set {symbol})"))
    }
}

fn write_instrs(f: &mut Formatter<'_>, instrs: &[Instr], depth: usize) -> fmt::Result {
    instrs.iter().try_for_each(|i| write_instr(f, i, depth))
}

fn write_instr(f: &mut Formatter<'_>, instr: &Instr, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    match instr {
        Instr::Op(text) => writeln!(f, "{pad}{text}"),
        Instr::If { then, otherwise } => {
            writeln!(f, "{pad}(if")?;
            writeln!(f, "{pad}  (then")?;
            write_instrs(f, then, depth + 2)?;
            writeln!(f, "{pad}  )")?;
            if !otherwise.is_empty() {
                writeln!(f, "{pad}  (else")?;
                write_instrs(f, otherwise, depth + 2)?;
                writeln!(f, "{pad}  )")?;
            }
            writeln!(f, "{pad})")
        }
        Instr::While { label, cond, body } => {
            writeln!(f, "{pad}(block $while${label}")?;
            writeln!(f, "{pad}  (loop $while${label}$loop")?;
            write_instrs(f, cond, depth + 2)?;
            writeln!(f, "{pad}    i32.eqz")?;
            writeln!(f, "{pad}    (br_if $while${label})")?;
            write_instrs(f, body, depth + 2)?;
            writeln!(f, "{pad}    (br $while${label}$loop)")?;
            writeln!(f, "{pad}  )")?;
            writeln!(f, "{pad})")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatFunction {
    pub symbol: String,
    pub export: Option<&'static str>,
    pub params: Vec<String>,
    pub locals: Vec<String>,
    pub result: bool,
    pub body: Vec<Instr>,
}

impl Display for WatFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "  (func {}", self.symbol)?;
        if let Some(export) = self.export {
            write!(f, " (export \"{export}\")")?;
        }
        for p in &self.params {
            write!(f, " (param {p} i32)")?;
        }
        if self.result {
            f.write_str(" (result i32)")?;
        }
        writeln!(f)?;

        for local in [abi::SCRATCH_LOCAL, abi::ALLOC_LOCAL]
            .into_iter()
            .chain(self.locals.iter().map(String::as_str))
        {
            writeln!(f, "    (local {local} i32)")?;
        }
        write_instrs(f, &self.body, 2)?;
        writeln!(f, "  )")
    }
}

/// A complete module: imports, heap pointer, globals, functions, and the exported entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatModule {
    pub heap: HeapAllocator,
    pub globals: Vec<String>,
    pub functions: Vec<WatFunction>,
    pub entry: WatFunction,
}

impl WatModule {
    pub fn function(&self, symbol: &str) -> Option<&WatFunction> {
        self.functions
            .iter()
            .chain(std::iter::once(&self.entry))
            .find(|f| f.symbol == symbol)
    }
}

impl Display for WatModule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "(module")?;
        writeln!(
            f,
            "  (import \"{}\" \"{}\" (memory 1))",
            abi::MEMORY_MODULE,
            abi::MEMORY_NAME
        )?;
        for name in [abi::FN_PRINT_NUM, abi::FN_PRINT_BOOL, abi::FN_PRINT_NONE] {
            writeln!(
                f,
                "  (func {} (import \"{}\" \"{name}\") (param i32) (result i32))",
                abi::import_symbol(name),
                abi::IMPORT_MODULE
            )?;
        }
        writeln!(f, "  {}", self.heap.declaration())?;
        for global in &self.globals {
            writeln!(f, "  (global {global} (mut i32) (i32.const 0))")?;
        }
        for func in &self.functions {
            write!(f, "{func}")?;
        }
        write!(f, "{}", self.entry)?;
        writeln!(f, ")")
    }
}
