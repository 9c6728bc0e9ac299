// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Source rendering for the AST. Output parses back to an equal tree, so it
//! doubles as the fragment text in diagnostics.

use std::fmt::{self, Display, Formatter};

use crate::ast::*;

const INDENT: &str = "    ";

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => f.write_str("int"),
            Type::Bool => f.write_str("bool"),
            Type::None => f.write_str("None"),
            Type::Object(name) => f.write_str(name),
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::None => f.write_str("None"),
            Literal::Number(n) => write!(f, "{n}"),
            Literal::True => f.write_str("True"),
            Literal::False => f.write_str("False"),
        }
    }
}

impl Display for UnOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for BinOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator operands are parenthesized whenever they are themselves operators.
struct Operand<'a>(&'a Expr);

impl Display for Operand<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0.kind {
            ExprKind::UnOp { .. } | ExprKind::BinOp { .. } => write!(f, "({})", self.0),
            _ => write!(f, "{}", self.0),
        }
    }
}

/// Receivers of `.name`; `5.x` would lex as a float.
struct Receiver<'a>(&'a Expr);

impl Display for Receiver<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0.kind {
            ExprKind::Literal(Literal::Number(_)) => write!(f, "({})", self.0),
            _ => write!(f, "{}", Operand(self.0)),
        }
    }
}

fn write_args(f: &mut Formatter<'_>, args: &[Expr]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(lit) => write!(f, "{lit}"),
            ExprKind::Id(name) => f.write_str(name),
            ExprKind::UnOp { op: UnOp::Neg, expr } => write!(f, "-{}", Operand(expr)),
            ExprKind::UnOp { op: UnOp::Not, expr } => write!(f, "not {}", Operand(expr)),
            ExprKind::BinOp { op, lhs, rhs } => {
                write!(f, "{} {op} {}", Operand(lhs), Operand(rhs))
            }
            ExprKind::Call { name, args } => {
                write!(f, "{name}(")?;
                write_args(f, args)?;
                f.write_str(")")
            }
            ExprKind::Field { obj, name } => write!(f, "{}.{name}", Receiver(obj)),
            ExprKind::Method { obj, name, args } => {
                write!(f, "{}.{name}(", Receiver(obj))?;
                write_args(f, args)?;
                f.write_str(")")
            }
        }
    }
}

impl Display for LValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LValue::Variable(name) => f.write_str(name),
            LValue::Member { obj, name } => write!(f, "{}.{name}", Receiver(obj)),
        }
    }
}

impl Display for VarDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} = {}", self.name, self.ty, self.value)
    }
}

fn write_block(f: &mut Formatter<'_>, stmts: &[Stmt], depth: usize) -> fmt::Result {
    if stmts.is_empty() {
        return writeln!(f, "{}pass", INDENT.repeat(depth));
    }
    for s in stmts {
        write_stmt(f, s, depth)?;
    }
    Ok(())
}

fn write_stmt(f: &mut Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
    let pad = INDENT.repeat(depth);
    match stmt {
        Stmt::Pass => writeln!(f, "{pad}pass"),
        Stmt::Assign { target, value } => writeln!(f, "{pad}{target} = {value}"),
        Stmt::Expr(e) => writeln!(f, "{pad}{e}"),
        Stmt::Return(e) => writeln!(f, "{pad}return {e}"),
        Stmt::While { cond, body } => {
            writeln!(f, "{pad}while {cond}:")?;
            write_block(f, body, depth + 1)
        }
        Stmt::If(s) => {
            writeln!(f, "{pad}if {}:", s.cond)?;
            write_block(f, &s.body, depth + 1)?;
            if let Some(elif) = &s.elif {
                writeln!(f, "{pad}elif {}:", elif.cond)?;
                write_block(f, &elif.body, depth + 1)?;
            }
            if let Some(else_body) = &s.else_body {
                writeln!(f, "{pad}else:")?;
                write_block(f, else_body, depth + 1)?;
            }
            Ok(())
        }
    }
}

fn write_function(f: &mut Formatter<'_>, fun: &FunDef, depth: usize) -> fmt::Result {
    let pad = INDENT.repeat(depth);
    write!(f, "{pad}def {}(", fun.name)?;
    for (i, p) in fun.params.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}: {}", p.name, p.ty)?;
    }
    f.write_str(")")?;
    if fun.ret != Type::None {
        write!(f, " -> {}", fun.ret)?;
    }
    writeln!(f, ":")?;

    let inner = INDENT.repeat(depth + 1);
    for v in &fun.defs {
        writeln!(f, "{inner}{v}")?;
    }
    if fun.defs.is_empty() || !fun.body.is_empty() {
        write_block(f, &fun.body, depth + 1)?;
    }
    Ok(())
}

impl Display for FunDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_function(f, self, 0)
    }
}

impl Display for ClassDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "class {}({}):", self.name, self.parent)?;
        if self.fields.is_empty() && self.methods.is_empty() {
            return writeln!(f, "{INDENT}pass");
        }
        for field in &self.fields {
            writeln!(f, "{INDENT}{field}")?;
        }
        for method in &self.methods {
            write_function(f, method, 1)?;
        }
        Ok(())
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_stmt(f, self, 0)
    }
}

impl Display for Def {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Def::Variable(v) => writeln!(f, "{v}"),
            Def::Function(fun) => write!(f, "{fun}"),
            Def::Class(c) => write!(f, "{c}"),
        }
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for def in &self.defs {
            write!(f, "{def}")?;
        }
        for stmt in &self.stmts {
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse_program;

    fn reprint(src: &str) -> String {
        parse_program(src).unwrap().to_string()
    }

    #[test]
    fn nested_operators_are_parenthesized() {
        assert_eq!(reprint("1 + 2 * 3"), "1 + (2 * 3)\n");
        assert_eq!(reprint("not (a == b)"), "not (a == b)\n");
        assert_eq!(reprint("-x"), "-x\n");
    }

    #[test]
    fn number_receivers_are_parenthesized() {
        assert_eq!(reprint("(5).x"), "(5).x\n");
    }

    #[test]
    fn renders_definitions_in_block_form() {
        let src = "\
x: int = 1
def f(a: int) -> bool:
    t: bool = False
    if a > x:
        return True
    else:
        return t
";
        assert_eq!(reprint(src), src);
    }

    #[test]
    fn renders_classes() {
        let src = "\
class P(object):
    x: int = 0
    def get(self: P) -> int:
        return self.x
p: P = None
p = P()
print(p.get())
";
        assert_eq!(reprint(src), src);
    }

    #[test]
    fn single_line_bodies_come_back_as_blocks() {
        assert_eq!(reprint("while x: pass"), "while x:\n    pass\n");
    }
}
