// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

use crate::ast::*;
use crate::lexer::{self, LexError, Span};
use crate::syntax::{self, SyntaxError, SyntaxKind, SyntaxNode, SyntaxTree};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("definitions must come before statements: `{fragment}`")]
    DefinitionAfterStatement { fragment: String, span: Span },
    #[error("variable definition needs an initializer: `{fragment}`")]
    MissingInitializer { fragment: String, span: Span },
    #[error("variables can only be initialized with a literal: `{fragment}`")]
    NonLiteralInitializer { fragment: String, span: Span },
    #[error("only a plain name can be declared: `{fragment}`")]
    InvalidDefinitionTarget { fragment: String, span: Span },
    #[error("cannot assign to `{fragment}`")]
    InvalidAssignTarget { fragment: String, span: Span },
    #[error("invalid type annotation: `{fragment}`")]
    InvalidType { fragment: String, span: Span },
    #[error("parameter `{name}` is missing a type annotation")]
    MissingParamType { name: String, span: Span },
    #[error("nested functions are not supported: `{fragment}`")]
    NestedFunction { fragment: String, span: Span },
    #[error("classes can only be defined at the top level: `{fragment}`")]
    NestedClass { fragment: String, span: Span },
    #[error("class must name exactly one parent class: `{fragment}`")]
    InvalidClassHeader { fragment: String, span: Span },
    #[error("class bodies may only contain fields and methods: `{fragment}`")]
    NonDefinitionInClass { fragment: String, span: Span },
    #[error("return outside of a function: `{fragment}`")]
    ReturnOutsideFunction { fragment: String, span: Span },
    #[error("at most one elif is supported: `{fragment}`")]
    MultipleElif { fragment: String, span: Span },
    #[error("unsupported operator `{fragment}`")]
    UnknownOperator { fragment: String, span: Span },
    #[error("invalid integer literal `{fragment}`")]
    InvalidNumber { fragment: String, span: Span },
    #[error("only functions, classes and methods can be called: `{fragment}`")]
    InvalidCallee { fragment: String, span: Span },
    #[error("unexpected `{fragment}`")]
    Unexpected { fragment: String, span: Span },
}

/// Public API: parse source text into a Program.
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    let tokens = lexer::lex(source)?;
    let tree = syntax::parse_tree(source, tokens)?;
    let program = Lowerer { tree: &tree }.program(tree.root())?;
    tracing::debug!(
        defs = program.defs.len(),
        stmts = program.stmts.len(),
        "parsed program"
    );
    Ok(program)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Global,
    Function,
}

/// Walks the concrete tree and builds the AST, enforcing what the grammar lets through.
struct Lowerer<'t, 'src> {
    tree: &'t SyntaxTree<'src>,
}

macro_rules! reject {
    ($self:ident, $variant:ident, $node:expr) => {
        return Err($self.error($node, |fragment, span| ParseError::$variant { fragment, span }))
    };
}

impl<'t, 'src> Lowerer<'t, 'src> {
    fn error(
        &self,
        node: &SyntaxNode,
        make: impl FnOnce(String, Span) -> ParseError,
    ) -> ParseError {
        make(self.tree.text(node).to_string(), self.tree.span(node))
    }

    fn text(&self, node: &SyntaxNode) -> &'src str {
        self.tree.text(node)
    }

    fn nth<'n>(&self, node: &'n SyntaxNode, index: usize) -> Result<&'n SyntaxNode, ParseError> {
        match node.children.get(index) {
            Some(child) => Ok(child),
            None => reject!(self, Unexpected, node),
        }
    }

    fn program(&self, root: &SyntaxNode) -> Result<Program, ParseError> {
        let (defs, next) = self.definitions(&root.children, Scope::Global)?;
        let stmts = self.statements(&root.children[next..], Scope::Global)?;
        Ok(Program { defs, stmts })
    }

    /// Parse the leading run of definitions; returns them with the index of the first statement.
    fn definitions(
        &self,
        nodes: &[SyntaxNode],
        scope: Scope,
    ) -> Result<(Vec<Def>, usize), ParseError> {
        let mut defs = Vec::new();
        let mut next = 0;
        while let Some(node) = nodes.get(next) {
            if !is_definition(node) {
                break;
            }
            defs.push(self.definition(node, scope)?);
            next += 1;
        }
        Ok((defs, next))
    }

    fn definition(&self, node: &SyntaxNode, scope: Scope) -> Result<Def, ParseError> {
        match (node.kind, scope) {
            (SyntaxKind::AssignStatement, _) => Ok(Def::Variable(self.var_def(node)?)),
            (SyntaxKind::FunctionDefinition, Scope::Global) => {
                Ok(Def::Function(self.fun_def(node)?))
            }
            (SyntaxKind::FunctionDefinition, Scope::Function) => {
                reject!(self, NestedFunction, node)
            }
            (SyntaxKind::ClassDefinition, Scope::Global) => Ok(Def::Class(self.class_def(node)?)),
            (SyntaxKind::ClassDefinition, Scope::Function) => reject!(self, NestedClass, node),
            _ => reject!(self, Unexpected, node),
        }
    }

    fn var_def(&self, node: &SyntaxNode) -> Result<VarDef, ParseError> {
        let target = self.nth(node, 0)?;
        if target.kind != SyntaxKind::VariableName {
            reject!(self, InvalidDefinitionTarget, target);
        }
        let ty = self.type_annotation(self.nth(node, 1)?)?;
        let Some(value) = node.children.get(2) else {
            reject!(self, MissingInitializer, node);
        };
        let value = match value.kind {
            SyntaxKind::None | SyntaxKind::Boolean | SyntaxKind::Number => self.literal(value)?,
            SyntaxKind::Float => reject!(self, InvalidNumber, value),
            _ => reject!(self, NonLiteralInitializer, value),
        };
        Ok(VarDef {
            name: self.text(target).to_string(),
            ty,
            value,
        })
    }

    fn type_annotation(&self, type_def: &SyntaxNode) -> Result<Type, ParseError> {
        let ty = self.nth(type_def, 0)?;
        match ty.kind {
            SyntaxKind::None => Ok(Type::None),
            SyntaxKind::VariableName => Ok(match self.text(ty) {
                "int" => Type::Int,
                "bool" => Type::Bool,
                class => Type::Object(class.to_string()),
            }),
            _ => reject!(self, InvalidType, ty),
        }
    }

    fn fun_def(&self, node: &SyntaxNode) -> Result<FunDef, ParseError> {
        let name = self.text(self.nth(node, 0)?).to_string();

        let params = self.nth(node, 1)?;
        let params = params
            .children
            .iter()
            .map(|param| self.parameter(param))
            .collect::<Result<Vec<_>, _>>()?;

        let ret = match node.child(SyntaxKind::TypeDef) {
            Some(ret) => self.type_annotation(ret)?,
            None => Type::None,
        };

        let Some(body) = node.child(SyntaxKind::Body) else {
            reject!(self, Unexpected, node);
        };
        let (defs, next) = self.definitions(&body.children, Scope::Function)?;
        let defs = defs
            .into_iter()
            .filter_map(|def| match def {
                Def::Variable(v) => Some(v),
                _ => None,
            })
            .collect();
        let body = self.statements(&body.children[next..], Scope::Function)?;

        Ok(FunDef {
            name,
            params,
            ret,
            defs,
            body,
        })
    }

    fn parameter(&self, param: &SyntaxNode) -> Result<Parameter, ParseError> {
        let name = self.text(self.nth(param, 0)?).to_string();
        match param.child(SyntaxKind::TypeDef) {
            Some(ty) => Ok(Parameter {
                name,
                ty: self.type_annotation(ty)?,
            }),
            None => Err(ParseError::MissingParamType {
                name,
                span: self.tree.span(param),
            }),
        }
    }

    fn class_def(&self, node: &SyntaxNode) -> Result<ClassDef, ParseError> {
        let name = self.text(self.nth(node, 0)?).to_string();

        let parent = match node.child(SyntaxKind::ArgList) {
            Some(bases) => match bases.children.as_slice() {
                [base] if base.kind == SyntaxKind::VariableName => self.text(base).to_string(),
                _ => reject!(self, InvalidClassHeader, bases),
            },
            None => reject!(self, InvalidClassHeader, node),
        };

        let Some(body) = node.child(SyntaxKind::Body) else {
            reject!(self, Unexpected, node);
        };
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        for member in &body.children {
            match member.kind {
                SyntaxKind::PassStatement => {}
                SyntaxKind::AssignStatement if is_definition(member) => {
                    fields.push(self.var_def(member)?)
                }
                SyntaxKind::FunctionDefinition => methods.push(self.fun_def(member)?),
                SyntaxKind::ClassDefinition => reject!(self, NestedClass, member),
                _ => reject!(self, NonDefinitionInClass, member),
            }
        }

        Ok(ClassDef {
            name,
            parent,
            fields,
            methods,
        })
    }

    fn statements(&self, nodes: &[SyntaxNode], scope: Scope) -> Result<Vec<Stmt>, ParseError> {
        nodes.iter().map(|node| self.statement(node, scope)).collect()
    }

    fn block(&self, body: &SyntaxNode, scope: Scope) -> Result<Vec<Stmt>, ParseError> {
        self.statements(&body.children, scope)
    }

    fn statement(&self, node: &SyntaxNode, scope: Scope) -> Result<Stmt, ParseError> {
        if is_definition(node) {
            reject!(self, DefinitionAfterStatement, node);
        }
        match node.kind {
            SyntaxKind::PassStatement => Ok(Stmt::Pass),
            SyntaxKind::ExpressionStatement => Ok(Stmt::Expr(self.expr(self.nth(node, 0)?)?)),
            SyntaxKind::AssignStatement => {
                let target = self.lvalue(self.nth(node, 0)?)?;
                let value = self.expr(self.nth(node, 1)?)?;
                Ok(Stmt::Assign { target, value })
            }
            SyntaxKind::ReturnStatement => {
                if scope != Scope::Function {
                    reject!(self, ReturnOutsideFunction, node);
                }
                let value = match node.children.first() {
                    Some(value) => self.expr(value)?,
                    None => Expr::literal(Literal::None),
                };
                Ok(Stmt::Return(value))
            }
            SyntaxKind::WhileStatement => Ok(Stmt::While {
                cond: self.expr(self.nth(node, 0)?)?,
                body: self.block(self.nth(node, 1)?, scope)?,
            }),
            SyntaxKind::IfStatement => self.if_statement(node, scope),
            _ => reject!(self, Unexpected, node),
        }
    }

    fn if_statement(&self, node: &SyntaxNode, scope: Scope) -> Result<Stmt, ParseError> {
        let cond = self.expr(self.nth(node, 0)?)?;
        let body = self.block(self.nth(node, 1)?, scope)?;

        let mut elifs = node.children.iter().filter(|c| c.kind == SyntaxKind::ElifClause);
        let elif = match elifs.next() {
            Some(clause) => Some(ElifBranch {
                cond: self.expr(self.nth(clause, 0)?)?,
                body: self.block(self.nth(clause, 1)?, scope)?,
            }),
            None => None,
        };
        if let Some(extra) = elifs.next() {
            reject!(self, MultipleElif, extra);
        }

        let else_body = match node.child(SyntaxKind::ElseClause) {
            Some(clause) => Some(self.block(self.nth(clause, 0)?, scope)?),
            None => None,
        };

        Ok(Stmt::If(IfStmt {
            cond,
            body,
            elif,
            else_body,
        }))
    }

    fn lvalue(&self, node: &SyntaxNode) -> Result<LValue, ParseError> {
        match node.kind {
            SyntaxKind::VariableName => Ok(LValue::Variable(self.text(node).to_string())),
            SyntaxKind::MemberExpression => Ok(LValue::Member {
                obj: self.expr(self.nth(node, 0)?)?,
                name: self.text(self.nth(node, 1)?).to_string(),
            }),
            _ => reject!(self, InvalidAssignTarget, node),
        }
    }

    fn literal(&self, node: &SyntaxNode) -> Result<Literal, ParseError> {
        match node.kind {
            SyntaxKind::None => Ok(Literal::None),
            SyntaxKind::Boolean if self.text(node) == "True" => Ok(Literal::True),
            SyntaxKind::Boolean => Ok(Literal::False),
            SyntaxKind::Number => match self.text(node).parse::<i32>() {
                Ok(n) => Ok(Literal::Number(n)),
                Err(_) => reject!(self, InvalidNumber, node),
            },
            _ => reject!(self, Unexpected, node),
        }
    }

    fn expr(&self, node: &SyntaxNode) -> Result<Expr, ParseError> {
        let kind = match node.kind {
            SyntaxKind::None | SyntaxKind::Boolean | SyntaxKind::Number => {
                ExprKind::Literal(self.literal(node)?)
            }
            SyntaxKind::Float => reject!(self, InvalidNumber, node),
            SyntaxKind::VariableName => ExprKind::Id(self.text(node).to_string()),
            SyntaxKind::ParenthesizedExpression => return self.expr(self.nth(node, 0)?),
            SyntaxKind::UnaryExpression => {
                let op_node = self.nth(node, 0)?;
                let Some(op) = UnOp::parse(self.text(op_node)) else {
                    reject!(self, UnknownOperator, op_node);
                };
                ExprKind::UnOp {
                    op,
                    expr: Box::new(self.expr(self.nth(node, 1)?)?),
                }
            }
            SyntaxKind::BinaryExpression => {
                let op_node = self.nth(node, 1)?;
                let Some(op) = BinOp::parse(self.text(op_node)) else {
                    reject!(self, UnknownOperator, op_node);
                };
                ExprKind::BinOp {
                    op,
                    lhs: Box::new(self.expr(self.nth(node, 0)?)?),
                    rhs: Box::new(self.expr(self.nth(node, 2)?)?),
                }
            }
            SyntaxKind::MemberExpression => ExprKind::Field {
                obj: Box::new(self.expr(self.nth(node, 0)?)?),
                name: self.text(self.nth(node, 1)?).to_string(),
            },
            SyntaxKind::CallExpression => {
                let callee = self.nth(node, 0)?;
                let args = self
                    .nth(node, 1)?
                    .children
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                match callee.kind {
                    SyntaxKind::VariableName => ExprKind::Call {
                        name: self.text(callee).to_string(),
                        args,
                    },
                    SyntaxKind::MemberExpression => ExprKind::Method {
                        obj: Box::new(self.expr(self.nth(callee, 0)?)?),
                        name: self.text(self.nth(callee, 1)?).to_string(),
                        args,
                    },
                    _ => reject!(self, InvalidCallee, callee),
                }
            }
            _ => reject!(self, Unexpected, node),
        };
        Ok(Expr::new(kind))
    }
}

/// Variable definitions are annotated assignments; functions and classes are always definitions.
fn is_definition(node: &SyntaxNode) -> bool {
    match node.kind {
        SyntaxKind::FunctionDefinition | SyntaxKind::ClassDefinition => true,
        SyntaxKind::AssignStatement => node.child(SyntaxKind::TypeDef).is_some(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        parse_program(src).unwrap()
    }

    fn parse_err(src: &str) -> ParseError {
        parse_program(src).unwrap_err()
    }

    fn num(n: i32) -> Expr {
        Expr::literal(Literal::Number(n))
    }

    #[test]
    fn parses_literal_expression_statement() {
        let p = parse("987");
        assert!(p.defs.is_empty());
        assert_eq!(p.stmts, vec![Stmt::Expr(num(987))]);
    }

    #[test]
    fn precedence_and_parentheses() {
        let p = parse("(1 + 2) * 3");
        let Stmt::Expr(e) = &p.stmts[0] else {
            panic!("expected expression")
        };
        let ExprKind::BinOp { op, lhs, .. } = &e.kind else {
            panic!("expected binop")
        };
        assert_eq!(*op, BinOp::Mul);
        assert!(matches!(lhs.kind, ExprKind::BinOp { op: BinOp::Add, .. }));
    }

    #[test]
    fn splits_definitions_from_statements() {
        let p = parse("x: int = 1\ny: bool = True\nprint(x)\n");
        assert_eq!(p.defs.len(), 2);
        assert_eq!(p.stmts.len(), 1);
        let Def::Variable(y) = &p.defs[1] else {
            panic!("expected variable")
        };
        assert_eq!(y.ty, Type::Bool);
        assert_eq!(y.value, Literal::True);
    }

    #[test]
    fn definition_after_statement_is_rejected() {
        let err = parse_err("print(1)\nx: int = 1\n");
        assert!(matches!(
            err,
            ParseError::DefinitionAfterStatement { ref fragment, .. } if fragment == "x: int = 1"
        ));
    }

    #[test]
    fn function_with_locals_and_default_return_type() {
        let p = parse("def f(a: int, b: Rat):\n    t: int = 0\n    t = a\n");
        let Def::Function(f) = &p.defs[0] else {
            panic!("expected function")
        };
        assert_eq!(f.ret, Type::None);
        assert_eq!(f.params[1].ty, Type::Object("Rat".into()));
        assert_eq!(f.defs.len(), 1);
        assert_eq!(f.body.len(), 1);
    }

    #[test]
    fn bare_return_returns_none() {
        let p = parse("def f():\n    return\n");
        let Def::Function(f) = &p.defs[0] else {
            panic!("expected function")
        };
        assert_eq!(f.body, vec![Stmt::Return(Expr::literal(Literal::None))]);
    }

    #[test]
    fn nested_function_is_rejected() {
        let err = parse_err("def f():\n    def g():\n        pass\n    pass\n");
        assert!(matches!(err, ParseError::NestedFunction { .. }));
    }

    #[test]
    fn return_outside_function_is_rejected() {
        assert!(matches!(parse_err("return 1\n"), ParseError::ReturnOutsideFunction { .. }));
    }

    #[test]
    fn missing_parameter_annotation_is_rejected() {
        let err = parse_err("def f(x):\n    pass\n");
        assert!(matches!(err, ParseError::MissingParamType { ref name, .. } if name == "x"));
    }

    #[test]
    fn non_literal_initializer_is_rejected() {
        assert!(matches!(
            parse_err("x: int = 1 + 2\n"),
            ParseError::NonLiteralInitializer { .. }
        ));
        assert!(matches!(parse_err("x: int\n"), ParseError::MissingInitializer { .. }));
    }

    #[test]
    fn float_and_overflowing_literals_are_rejected() {
        assert!(matches!(parse_err("1.5\n"), ParseError::InvalidNumber { .. }));
        assert!(matches!(parse_err("4294967296\n"), ParseError::InvalidNumber { .. }));
    }

    #[test]
    fn unsupported_operators_are_rejected() {
        let err = parse_err("1 / 2\n");
        assert!(matches!(err, ParseError::UnknownOperator { ref fragment, .. } if fragment == "/"));
        assert!(matches!(parse_err("2 ** 3\n"), ParseError::UnknownOperator { .. }));
    }

    #[test]
    fn if_elif_else_and_extra_elif() {
        let p = parse("if a:\n    pass\nelif b:\n    pass\nelse:\n    pass\n");
        let Stmt::If(s) = &p.stmts[0] else {
            panic!("expected if")
        };
        assert!(s.elif.is_some());
        assert!(s.else_body.is_some());

        let err = parse_err("if a:\n    pass\nelif b:\n    pass\nelif c:\n    pass\n");
        assert!(matches!(err, ParseError::MultipleElif { .. }));
    }

    #[test]
    fn class_with_fields_and_methods() {
        let src = "class Rat(object):
    n: int = 456
    d: int = 789
    def __init__(self: Rat):
        pass
";
        let p = parse(src);
        let Def::Class(c) = &p.defs[0] else {
            panic!("expected class")
        };
        assert_eq!(c.parent, "object");
        assert_eq!(c.fields.len(), 2);
        assert_eq!(c.methods[0].name, "__init__");
    }

    #[test]
    fn class_body_rules() {
        assert!(matches!(
            parse_err("class A(object):\n    print(1)\n"),
            ParseError::NonDefinitionInClass { .. }
        ));
        assert!(matches!(
            parse_err("class A(B, C):\n    pass\n"),
            ParseError::InvalidClassHeader { .. }
        ));
        assert!(matches!(parse_err("class A:\n    pass\n"), ParseError::InvalidClassHeader { .. }));
    }

    #[test]
    fn calls_methods_and_fields_by_shape() {
        let p = parse("f(1)\nr.n\nr.mul(r).d\n");
        assert!(matches!(p.stmts[0], Stmt::Expr(Expr { kind: ExprKind::Call { .. }, .. })));
        assert!(matches!(p.stmts[1], Stmt::Expr(Expr { kind: ExprKind::Field { .. }, .. })));
        let Stmt::Expr(e) = &p.stmts[2] else {
            panic!("expected expression")
        };
        let ExprKind::Field { obj, name } = &e.kind else {
            panic!("expected field")
        };
        assert_eq!(name, "d");
        assert!(matches!(obj.kind, ExprKind::Method { .. }));
    }

    #[test]
    fn member_assignment_target() {
        let p = parse("Point().x = 10\n");
        let Stmt::Assign { target, .. } = &p.stmts[0] else {
            panic!("expected assign")
        };
        assert!(matches!(target, LValue::Member { name, .. } if name == "x"));
        assert!(matches!(parse_err("f() = 1\n"), ParseError::InvalidAssignTarget { .. }));
    }

    #[test]
    fn calling_a_non_name_is_rejected() {
        assert!(matches!(parse_err("(f)(1)\n"), ParseError::InvalidCallee { .. }));
    }

    #[test]
    fn syntax_errors_surface() {
        assert!(matches!(parse_err("x = \n"), ParseError::Syntax(_)));
        assert!(matches!(parse_err("x = 1 $\n"), ParseError::Lex(_)));
    }
}
