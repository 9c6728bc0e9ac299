// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Text produced by the print callbacks, one line per call.

pub fn format_num(value: i32) -> String {
    value.to_string()
}

/// Any non-zero word is true.
pub fn format_bool(value: i32) -> &'static str {
    if value != 0 { "True" } else { "False" }
}

pub fn format_none(_value: i32) -> &'static str {
    "None"
}
