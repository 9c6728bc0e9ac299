// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Names and layout constants shared between generated modules and the host runtime.

/// Every value is one 32-bit word.
pub const WORD_BYTES: i32 = 4;

/// Objects start with one reserved header word; field `i` lives at `HEADER_BYTES + 4 * i`.
pub const HEADER_BYTES: i32 = WORD_BYTES;

/// First free heap address. Address 0 stays unused so a null reference never aliases an object.
pub const HEAP_START: i32 = 4;

/// Imported memory (must match `snek_runtime::{MEMORY_MODULE, MEMORY_NAME}`).
pub const MEMORY_MODULE: &str = "memory";
pub const MEMORY_NAME: &str = "heap";

/// Host callbacks (must match the functions `snek_runtime` links under `IMPORT_MODULE`).
pub const IMPORT_MODULE: &str = "imports";
pub const FN_PRINT_NUM: &str = "print_num";
pub const FN_PRINT_BOOL: &str = "print_bool";
pub const FN_PRINT_NONE: &str = "print_none";

pub const ENTRY_EXPORT: &str = "_start";

/// Module-internal symbols. `$` cannot occur in a source identifier, so these never collide.
pub const HEAP_PTR: &str = "$heap$ptr";
pub const ENTRY_SYMBOL: &str = "$$start";
pub const SCRATCH_LOCAL: &str = "$$scratch";
pub const ALLOC_LOCAL: &str = "$$alloc";

pub fn import_symbol(name: &str) -> String {
    format!("$${name}")
}

pub fn var_symbol(name: &str) -> String {
    format!("${name}")
}

pub fn function_symbol(name: &str) -> String {
    format!("${name}")
}

pub fn method_symbol(class: &str, method: &str) -> String {
    format!("${class}${method}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_namespaced() {
        assert_eq!(method_symbol("Rat", "mul"), "$Rat$mul");
        assert_eq!(function_symbol("mul"), "$mul");
        assert_eq!(import_symbol(FN_PRINT_NUM), "$$print_num");
        assert_ne!(var_symbol("scratch"), SCRATCH_LOCAL);
    }
}
