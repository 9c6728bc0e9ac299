// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Host side of a compiled module: supplies the heap memory and the print
//! callbacks, runs `_start`, and collects what the program printed.

mod rt_print;

pub use rt_print::{format_bool, format_none, format_num};

use thiserror::Error;
use wasmtime::{Caller, Engine, Linker, Memory, MemoryType, Module, Store, Val};

/// Import names (must match `snek_codegen::abi`).
pub const MEMORY_MODULE: &str = "memory";
pub const MEMORY_NAME: &str = "heap";
pub const IMPORT_MODULE: &str = "imports";
pub const ENTRY: &str = "_start";

/// Upper bound on the heap memory, in 64 KiB pages.
pub const MAX_MEMORY_PAGES: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Initial heap size in pages.
    pub memory_pages: u32,
    /// Also write printed lines to stdout as they happen.
    pub echo: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            memory_pages: 1,
            echo: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// What `_start` returned, if it returns anything.
    pub value: Option<i32>,
    /// Everything printed, one line per print call.
    pub output: String,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("memory must be between 1 and {MAX_MEMORY_PAGES} pages, got {0}")]
    MemoryPages(u32),
    #[error("invalid module: {0}")]
    Module(String),
    #[error("failed to link module: {0}")]
    Link(String),
    #[error("module does not export `{ENTRY}`")]
    MissingEntry,
    #[error("trap: {0}")]
    Trap(String),
}

struct HostState {
    output: String,
    echo: bool,
}

impl HostState {
    fn emit(&mut self, line: &str) {
        tracing::trace!(line, "print");
        if self.echo {
            println!("{line}");
        }
        self.output.push_str(line);
        self.output.push('\n');
    }
}

fn link_error(e: wasmtime::Error) -> RuntimeError {
    RuntimeError::Link(format!("{e:#}"))
}

/// Assemble, link and run a module in WebAssembly text form.
pub fn run(module_text: &str, config: &RunConfig) -> Result<RunOutcome, RuntimeError> {
    if !(1..=MAX_MEMORY_PAGES).contains(&config.memory_pages) {
        return Err(RuntimeError::MemoryPages(config.memory_pages));
    }

    let engine = Engine::default();
    let module = Module::new(&engine, module_text)
        .map_err(|e| RuntimeError::Module(format!("{e:#}")))?;
    let mut store = Store::new(
        &engine,
        HostState {
            output: String::new(),
            echo: config.echo,
        },
    );

    let mut linker: Linker<HostState> = Linker::new(&engine);
    let memory = Memory::new(
        &mut store,
        MemoryType::new(config.memory_pages, Some(MAX_MEMORY_PAGES)),
    )
    .map_err(link_error)?;
    linker
        .define(&store, MEMORY_MODULE, MEMORY_NAME, memory)
        .map_err(link_error)?;

    // Each callback hands its argument back so a print can sit in expression position.
    linker
        .func_wrap(IMPORT_MODULE, "print_num", |mut caller: Caller<'_, HostState>, v: i32| {
            caller.data_mut().emit(&format_num(v));
            v
        })
        .map_err(link_error)?;
    linker
        .func_wrap(IMPORT_MODULE, "print_bool", |mut caller: Caller<'_, HostState>, v: i32| {
            caller.data_mut().emit(format_bool(v));
            v
        })
        .map_err(link_error)?;
    linker
        .func_wrap(IMPORT_MODULE, "print_none", |mut caller: Caller<'_, HostState>, v: i32| {
            caller.data_mut().emit(format_none(v));
            v
        })
        .map_err(link_error)?;

    let instance = linker.instantiate(&mut store, &module).map_err(link_error)?;
    let start = instance
        .get_func(&mut store, ENTRY)
        .ok_or(RuntimeError::MissingEntry)?;

    let mut results = vec![Val::I32(0); start.ty(&store).results().len()];
    start
        .call(&mut store, &[], &mut results)
        .map_err(|e| RuntimeError::Trap(format!("{e:#}")))?;

    let value = results.first().and_then(Val::i32);
    tracing::debug!(?value, "module finished");
    Ok(RunOutcome {
        value,
        output: store.into_data().output,
    })
}
