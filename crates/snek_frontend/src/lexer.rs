// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use std::ops::Range;

use logos::Logos;
use thiserror::Error;

/// Byte range into the source text.
pub type Span = Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq, Eq, Hash)]
#[logos(skip r"([ \t\f]+|#[^\r\n]*|\\\r?\n)")]
pub enum Tok {
    // Keywords
    #[token("def")]
    KwDef,
    #[token("class")]
    KwClass,
    #[token("if")]
    KwIf,
    #[token("elif")]
    KwElif,
    #[token("else")]
    KwElse,
    #[token("while")]
    KwWhile,
    #[token("return")]
    KwReturn,
    #[token("pass")]
    KwPass,
    #[token("and")]
    KwAnd,
    #[token("or")]
    KwOr,
    #[token("not")]
    KwNot,
    #[token("is")]
    KwIs,
    #[token("None")]
    KwNone,
    #[token("True")]
    KwTrue,
    #[token("False")]
    KwFalse,

    // Symbols / operators
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("->")]
    Arrow,
    #[token("=")]
    Assign,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    StarStar,
    #[token("/")]
    Slash,
    #[token("//")]
    SlashSlash,
    #[token("%")]
    Percent,

    // Literals / identifiers. Digits are kept as text so the parser can report overflow.
    #[regex(r"[0-9]+\.[0-9]*", |lex| lex.slice().to_string())]
    Float(String),
    #[regex(r"[0-9]+", |lex| lex.slice().to_string())]
    Int(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Name(String),

    #[regex(r"\r?\n")]
    Newline,

    // Produced by the layout pass, never by the scanner.
    Indent,
    Dedent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unexpected input {fragment:?} at {span:?}")]
    UnexpectedInput { fragment: String, span: Span },
    #[error("unindent does not match any outer indentation level at {span:?}")]
    InconsistentDedent { span: Span },
}

/// Lex source text into tokens with byte spans, including the
/// `Newline`/`Indent`/`Dedent` tokens that encode block structure.
pub fn lex(input: &str) -> Result<Vec<(Tok, Span)>, LexError> {
    let mut raw = Vec::new();
    let mut lx = Tok::lexer(input);

    while let Some(res) = lx.next() {
        match res {
            Ok(tok) => raw.push((tok, lx.span())),
            Err(_) => {
                return Err(LexError::UnexpectedInput {
                    fragment: lx.slice().to_string(),
                    span: lx.span(),
                });
            }
        }
    }

    let toks = layout(input, raw)?;
    tracing::trace!(count = toks.len(), "lexed");
    Ok(toks)
}

/// Turn physical lines into logical ones: blank lines and newlines inside
/// parentheses disappear, and changes in leading whitespace become
/// `Indent`/`Dedent` tokens.
fn layout(input: &str, raw: Vec<(Tok, Span)>) -> Result<Vec<(Tok, Span)>, LexError> {
    let mut out = Vec::with_capacity(raw.len() + 8);
    let mut indents = vec![0usize];
    let mut depth = 0usize;
    let mut at_line_start = true;

    for (tok, span) in raw {
        if tok == Tok::Newline {
            if depth == 0 && !at_line_start {
                out.push((Tok::Newline, span));
                at_line_start = true;
            }
            continue;
        }

        if at_line_start {
            let width = indent_width(input, span.start);
            let here = span.start..span.start;
            if width > indents.last().copied().unwrap_or(0) {
                indents.push(width);
                out.push((Tok::Indent, here));
            } else {
                while width < indents.last().copied().unwrap_or(0) {
                    indents.pop();
                    out.push((Tok::Dedent, here.clone()));
                }
                if width != indents.last().copied().unwrap_or(0) {
                    return Err(LexError::InconsistentDedent { span: here });
                }
            }
            at_line_start = false;
        }

        match tok {
            Tok::LParen => depth += 1,
            Tok::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }
        out.push((tok, span));
    }

    let end = input.len()..input.len();
    if !at_line_start {
        out.push((Tok::Newline, end.clone()));
    }
    while indents.len() > 1 {
        indents.pop();
        out.push((Tok::Dedent, end.clone()));
    }
    Ok(out)
}

// Tabs advance to the next multiple of eight columns.
fn indent_width(input: &str, tok_start: usize) -> usize {
    let line_start = input[..tok_start].rfind('\n').map_or(0, |i| i + 1);
    input[line_start..tok_start].chars().fold(0, |width, c| match c {
        '\t' => (width / 8 + 1) * 8,
        _ => width + 1,
    })
}
