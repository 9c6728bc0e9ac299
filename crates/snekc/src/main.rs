// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use snekc::{RunConfig, check, compile, compile_and_run, parse};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// WebAssembly text module
    Wat,
    /// Parsed AST
    Ast,
    /// AST after type checking
    Typed,
    /// Compile and run the program
    Run,
}

/// Compile a statically typed Python subset to WebAssembly.
#[derive(Debug, Parser)]
#[command(name = "snekc", version)]
struct Cli {
    /// Source files, concatenated in order
    #[arg(required_unless_present = "code")]
    files: Vec<PathBuf>,

    /// Compile this program text instead of reading files
    #[arg(short, long, conflicts_with = "files")]
    code: Option<String>,

    #[arg(short, long, value_enum, default_value_t = Emit::Run)]
    emit: Emit,

    /// Initial heap size in 64 KiB pages
    #[arg(long, default_value_t = 1)]
    memory_pages: u32,

    /// Log every pipeline stage
    #[arg(short, long)]
    verbose: bool,
}

fn read_sources(files: &[PathBuf]) -> Result<String> {
    let mut combined = String::new();
    for (i, path) in files.iter().enumerate() {
        let src = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if i > 0 {
            combined.push_str("\n\n");
        }
        combined.push_str(&src);
    }
    Ok(combined)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let source = match cli.code {
        Some(code) => code,
        None => read_sources(&cli.files)?,
    };
    tracing::debug!(bytes = source.len(), "read source");

    match cli.emit {
        Emit::Wat => print!("{}", compile(&source)?),
        Emit::Ast => println!("{:#?}", parse(&source)?),
        Emit::Typed => println!("{:#?}", check(&source)?),
        Emit::Run => {
            let config = RunConfig {
                memory_pages: cli.memory_pages,
                echo: true,
            };
            if let Some(value) = compile_and_run(&source, &config)?.value {
                println!("{value}");
            }
        }
    }
    Ok(())
}
