// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0
use std::{env, fs, process};

use snek_frontend::{parse_program, type_check_program};

fn usage_and_exit() -> ! {
    eprintln!("Usage: snek_parse_cli <file1.py> <file2.py> ...");
    eprintln!("Example: snek_parse_cli programs/rat.py programs/main.py");
    process::exit(2);
}

fn main() {
    let paths: Vec<String> = env::args().skip(1).collect();
    if paths.is_empty() {
        usage_and_exit();
    }

    // A blank line between files keeps the last block of one file from
    // swallowing the first line of the next.
    let mut combined = String::new();
    for (i, path) in paths.iter().enumerate() {
        let src = fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("Failed to read {path}: {e}");
            process::exit(2);
        });
        if i > 0 {
            combined.push_str("\n\n");
        }
        combined.push_str(&src);
    }

    let prog = parse_program(&combined).unwrap_or_else(|e| {
        eprintln!("ParseError: {e}");
        process::exit(1);
    });

    println!("=== AST ===");
    println!("{prog:#?}");
    println!("=== Source ===");
    print!("{prog}");

    match type_check_program(prog) {
        Ok(_) => {
            println!("=== Type Check ===");
            println!("OK");
        }
        Err(e) => {
            eprintln!("=== Type Check Error ===");
            eprintln!("  {e}");
            process::exit(1);
        }
    }
}
