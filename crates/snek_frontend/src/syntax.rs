// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Concrete syntax tree.
//!
//! The grammar accepts more than the language allows: definitions anywhere,
//! any number of `elif` clauses, unannotated parameters, arbitrary
//! initializers and operators the compiler does not implement (`/`, `**`).
//! [`crate::parser`] walks the tree and rejects those shapes with a message
//! that names the offending fragment.

use std::ops::Range;

use chumsky::prelude::*;
use chumsky::span::SimpleSpan;
use chumsky::{extra, pratt};
use thiserror::Error;

use crate::lexer::{Span, Tok};

type PError<'src> = chumsky::error::Simple<'src, Tok>;
type PExtra<'src> = extra::Err<PError<'src>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    Script,

    // statements
    AssignStatement,
    TypeDef,
    ExpressionStatement,
    PassStatement,
    ReturnStatement,
    IfStatement,
    ElifClause,
    ElseClause,
    WhileStatement,
    FunctionDefinition,
    ParamList,
    Param,
    ClassDefinition,
    ArgList,
    Body,

    // expressions
    CallExpression,
    MemberExpression,
    BinaryExpression,
    UnaryExpression,
    ParenthesizedExpression,
    VariableName,
    PropertyName,
    Number,
    Float,
    Boolean,
    None,
    Operator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    /// Token indices covered by the node.
    pub tokens: Range<usize>,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    fn new(kind: SyntaxKind, tokens: Range<usize>, children: Vec<SyntaxNode>) -> Self {
        Self { kind, tokens, children }
    }

    fn leaf(kind: SyntaxKind, span: SimpleSpan) -> Self {
        Self::new(kind, span.start..span.end, Vec::new())
    }

    fn spanning(kind: SyntaxKind, span: SimpleSpan, children: Vec<SyntaxNode>) -> Self {
        Self::new(kind, span.start..span.end, children)
    }

    /// First child of the given kind.
    pub fn child(&self, kind: SyntaxKind) -> Option<&SyntaxNode> {
        self.children.iter().find(|c| c.kind == kind)
    }
}

/// A parsed source file: the tree plus what is needed to map nodes back to text.
#[derive(Debug, Clone)]
pub struct SyntaxTree<'src> {
    source: &'src str,
    spans: Vec<Span>,
    root: SyntaxNode,
}

impl<'src> SyntaxTree<'src> {
    pub fn root(&self) -> &SyntaxNode {
        &self.root
    }

    /// Byte range of the node in the source.
    pub fn span(&self, node: &SyntaxNode) -> Span {
        let start = self
            .spans
            .get(node.tokens.start)
            .map_or(self.source.len(), |s| s.start);
        let end = match node.tokens.end.checked_sub(1) {
            Some(last) if node.tokens.end > node.tokens.start => {
                self.spans.get(last).map_or(start, |s| s.end)
            }
            _ => start,
        };
        start..end.max(start)
    }

    /// Source text of the node, without trailing newlines.
    pub fn text(&self, node: &SyntaxNode) -> &'src str {
        self.source
            .get(self.span(node))
            .unwrap_or_default()
            .trim_end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid syntax near {found} at {span:?}")]
pub struct SyntaxError {
    pub found: String,
    pub span: Span,
}

/// Build the concrete syntax tree for an already lexed source.
pub fn parse_tree(source: &str, lexed: Vec<(Tok, Span)>) -> Result<SyntaxTree<'_>, SyntaxError> {
    let (tokens, spans): (Vec<Tok>, Vec<Span>) = lexed.into_iter().unzip();

    let root = script_parser()
        .parse(tokens.as_slice())
        .into_result()
        .map_err(|errs| {
            let index = errs.first().map_or(tokens.len(), |e| e.span().start);
            describe_failure(source, &tokens, &spans, index)
        })?;

    Ok(SyntaxTree { source, spans, root })
}

fn describe_failure(source: &str, tokens: &[Tok], spans: &[Span], index: usize) -> SyntaxError {
    match (tokens.get(index), spans.get(index)) {
        (Some(tok), Some(span)) => {
            let found = match tok {
                Tok::Newline => "end of line".to_string(),
                Tok::Indent => "unexpected indent".to_string(),
                Tok::Dedent => "unexpected dedent".to_string(),
                _ => format!("`{}`", source.get(span.clone()).unwrap_or_default()),
            };
            SyntaxError { found, span: span.clone() }
        }
        _ => SyntaxError {
            found: "end of input".to_string(),
            span: source.len()..source.len(),
        },
    }
}

fn script_parser<'src>() -> impl Parser<'src, &'src [Tok], SyntaxNode, PExtra<'src>> {
    statement_parser()
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
        .map_with(|stmts, e| SyntaxNode::spanning(SyntaxKind::Script, e.span(), stmts))
}

fn name<'src>(
    kind: SyntaxKind,
) -> impl Parser<'src, &'src [Tok], SyntaxNode, PExtra<'src>> + Clone {
    select! { Tok::Name(_) => () }.map_with(move |_, e| SyntaxNode::leaf(kind, e.span()))
}

fn op<'src>(tok: Tok) -> impl Parser<'src, &'src [Tok], SyntaxNode, PExtra<'src>> + Clone {
    just(tok).map_with(|_, e| SyntaxNode::leaf(SyntaxKind::Operator, e.span()))
}

fn arg_list<'src, P>(expr: P) -> impl Parser<'src, &'src [Tok], SyntaxNode, PExtra<'src>> + Clone
where
    P: Parser<'src, &'src [Tok], SyntaxNode, PExtra<'src>> + Clone,
{
    expr.separated_by(just(Tok::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Tok::LParen), just(Tok::RParen))
        .map_with(|args, e| SyntaxNode::spanning(SyntaxKind::ArgList, e.span(), args))
}

fn binary(lhs: SyntaxNode, op: SyntaxNode, rhs: SyntaxNode) -> SyntaxNode {
    let tokens = lhs.tokens.start..rhs.tokens.end;
    SyntaxNode::new(SyntaxKind::BinaryExpression, tokens, vec![lhs, op, rhs])
}

fn unary(op: SyntaxNode, operand: SyntaxNode) -> SyntaxNode {
    let tokens = op.tokens.start..operand.tokens.end;
    SyntaxNode::new(SyntaxKind::UnaryExpression, tokens, vec![op, operand])
}

enum Postfix {
    Call(SyntaxNode),
    Member(SyntaxNode),
}

fn apply_postfix(target: SyntaxNode, step: Postfix) -> SyntaxNode {
    match step {
        Postfix::Call(args) => SyntaxNode::new(
            SyntaxKind::CallExpression,
            target.tokens.start..args.tokens.end,
            vec![target, args],
        ),
        Postfix::Member(prop) => SyntaxNode::new(
            SyntaxKind::MemberExpression,
            target.tokens.start..prop.tokens.end,
            vec![target, prop],
        ),
    }
}

pub fn expr_parser<'src>() -> impl Parser<'src, &'src [Tok], SyntaxNode, PExtra<'src>> + Clone {
    recursive(|expr| {
        let paren = expr
            .clone()
            .delimited_by(just(Tok::LParen), just(Tok::RParen))
            .map_with(|inner, e| {
                SyntaxNode::spanning(SyntaxKind::ParenthesizedExpression, e.span(), vec![inner])
            });

        let atom = select! {
            Tok::Int(_) => SyntaxKind::Number,
            Tok::Float(_) => SyntaxKind::Float,
            Tok::KwTrue => SyntaxKind::Boolean,
            Tok::KwFalse => SyntaxKind::Boolean,
            Tok::KwNone => SyntaxKind::None,
            Tok::Name(_) => SyntaxKind::VariableName,
        }
        .map_with(|kind, e| SyntaxNode::leaf(kind, e.span()))
        .or(paren);

        // target.name and target(args), left to right
        let member = just(Tok::Dot)
            .ignore_then(name(SyntaxKind::PropertyName))
            .map(Postfix::Member);
        let call = arg_list(expr.clone()).map(Postfix::Call);

        let postfix = atom
            .then(member.or(call).repeated().collect::<Vec<_>>())
            .map(|(base, steps)| steps.into_iter().fold(base, apply_postfix));

        let comparison = choice((
            op(Tok::EqEq),
            op(Tok::NotEq),
            op(Tok::LtEq),
            op(Tok::GtEq),
            op(Tok::Lt),
            op(Tok::Gt),
            op(Tok::KwIs),
        ));
        let additive = op(Tok::Plus).or(op(Tok::Minus));
        let multiplicative = choice((
            op(Tok::Star),
            op(Tok::SlashSlash),
            op(Tok::Slash),
            op(Tok::Percent),
        ));

        postfix
            .pratt((
                pratt::infix(pratt::left(1), op(Tok::KwOr), |l, o, r, _| binary(l, o, r)),
                pratt::infix(pratt::left(2), op(Tok::KwAnd), |l, o, r, _| binary(l, o, r)),
                pratt::prefix(3, op(Tok::KwNot), |o, rhs, _| unary(o, rhs)),
                pratt::infix(pratt::left(4), comparison, |l, o, r, _| binary(l, o, r)),
                pratt::infix(pratt::left(5), additive, |l, o, r, _| binary(l, o, r)),
                pratt::infix(pratt::left(6), multiplicative, |l, o, r, _| binary(l, o, r)),
                pratt::prefix(7, op(Tok::Minus).or(op(Tok::Plus)), |o, rhs, _| unary(o, rhs)),
                pratt::infix(pratt::right(8), op(Tok::StarStar), |l, o, r, _| binary(l, o, r)),
            ))
            .boxed()
    })
}

fn statement_parser<'src>() -> impl Parser<'src, &'src [Tok], SyntaxNode, PExtra<'src>> + Clone {
    recursive(|statement| {
        let expr = expr_parser();

        let type_def = just(Tok::Colon)
            .ignore_then(expr.clone())
            .map_with(|ty, e| SyntaxNode::spanning(SyntaxKind::TypeDef, e.span(), vec![ty]));
        let return_type = just(Tok::Arrow)
            .ignore_then(expr.clone())
            .map_with(|ty, e| SyntaxNode::spanning(SyntaxKind::TypeDef, e.span(), vec![ty]));

        let pass = just(Tok::KwPass)
            .map_with(|_, e| SyntaxNode::leaf(SyntaxKind::PassStatement, e.span()));

        let return_ = just(Tok::KwReturn)
            .ignore_then(expr.clone().or_not())
            .map_with(|value, e| {
                let children = value.into_iter().collect();
                SyntaxNode::spanning(SyntaxKind::ReturnStatement, e.span(), children)
            });

        // `target [: type] [= value]`; a lone expression is an expression statement
        let assign_or_expr = expr
            .clone()
            .then(type_def.clone().or_not())
            .then(just(Tok::Assign).ignore_then(expr.clone()).or_not())
            .map_with(|((target, annotation), value), e| {
                if annotation.is_none() && value.is_none() {
                    let kind = SyntaxKind::ExpressionStatement;
                    return SyntaxNode::spanning(kind, e.span(), vec![target]);
                }
                let mut children = vec![target];
                children.extend(annotation);
                children.extend(value);
                SyntaxNode::spanning(SyntaxKind::AssignStatement, e.span(), children)
            });

        let simple = choice((pass, return_, assign_or_expr))
            .then_ignore(just(Tok::Newline))
            .boxed();

        let block = just(Tok::Newline)
            .ignore_then(just(Tok::Indent))
            .ignore_then(statement.clone().repeated().at_least(1).collect::<Vec<_>>())
            .then_ignore(just(Tok::Dedent));

        let body = just(Tok::Colon)
            .ignore_then(block.or(simple.clone().map(|s| vec![s])))
            .map_with(|stmts, e| SyntaxNode::spanning(SyntaxKind::Body, e.span(), stmts))
            .boxed();

        let elif = just(Tok::KwElif)
            .ignore_then(expr.clone())
            .then(body.clone())
            .map_with(|(cond, body), e| {
                SyntaxNode::spanning(SyntaxKind::ElifClause, e.span(), vec![cond, body])
            });
        let else_ = just(Tok::KwElse)
            .ignore_then(body.clone())
            .map_with(|body, e| SyntaxNode::spanning(SyntaxKind::ElseClause, e.span(), vec![body]));

        let if_ = just(Tok::KwIf)
            .ignore_then(expr.clone())
            .then(body.clone())
            .then(elif.repeated().collect::<Vec<_>>())
            .then(else_.or_not())
            .map_with(|(((cond, body), elifs), else_), e| {
                let mut children = vec![cond, body];
                children.extend(elifs);
                children.extend(else_);
                SyntaxNode::spanning(SyntaxKind::IfStatement, e.span(), children)
            });

        let while_ = just(Tok::KwWhile)
            .ignore_then(expr.clone())
            .then(body.clone())
            .map_with(|(cond, body), e| {
                SyntaxNode::spanning(SyntaxKind::WhileStatement, e.span(), vec![cond, body])
            });

        let param = name(SyntaxKind::VariableName)
            .then(type_def.or_not())
            .map_with(|(name, ty), e| {
                let mut children = vec![name];
                children.extend(ty);
                SyntaxNode::spanning(SyntaxKind::Param, e.span(), children)
            });
        let params = param
            .separated_by(just(Tok::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Tok::LParen), just(Tok::RParen))
            .map_with(|params, e| SyntaxNode::spanning(SyntaxKind::ParamList, e.span(), params));

        let function = just(Tok::KwDef)
            .ignore_then(name(SyntaxKind::VariableName))
            .then(params)
            .then(return_type.or_not())
            .then(body.clone())
            .map_with(|(((name, params), ret), body), e| {
                let mut children = vec![name, params];
                children.extend(ret);
                children.push(body);
                SyntaxNode::spanning(SyntaxKind::FunctionDefinition, e.span(), children)
            });

        let class = just(Tok::KwClass)
            .ignore_then(name(SyntaxKind::VariableName))
            .then(arg_list(expr).or_not())
            .then(body)
            .map_with(|((name, bases), body), e| {
                let mut children = vec![name];
                children.extend(bases);
                children.push(body);
                SyntaxNode::spanning(SyntaxKind::ClassDefinition, e.span(), children)
            });

        choice((if_, while_, function, class, simple)).boxed()
    })
}
