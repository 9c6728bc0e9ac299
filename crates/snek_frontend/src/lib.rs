// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod syntax;
pub mod typechecker;

pub use ast::*;
pub use lexer::{LexError, Span, Tok, lex};
pub use parser::{ParseError, parse_program};
pub use syntax::{SyntaxError, SyntaxKind, SyntaxNode, SyntaxTree, parse_tree};
pub use typechecker::{TypeError, type_check_program};
