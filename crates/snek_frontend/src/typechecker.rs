// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use std::collections::HashMap;

use thiserror::Error;

use crate::ast::*;

/// Built-in root class; every user class must name a parent and this is the only one at first.
pub const OBJECT: &str = "object";
pub const INIT: &str = "__init__";
const PRINT: &str = "print";

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("duplicate declaration of identifier in same scope: {name}")]
    Duplicate { name: String },
    #[error("{name} is already the name of a class")]
    ShadowsClass { name: String },
    #[error("{name} is a built-in function and cannot be redefined")]
    ShadowsBuiltin { name: String },
    #[error("not a variable: {name}")]
    NotAVariable { name: String },
    #[error("not a function or class: {name}")]
    NotCallable { name: String },
    #[error("invalid type annotation; there is no class named: {name}")]
    UnknownType { name: String },
    #[error("cannot apply operator `{op}` on type {operand} in `{expr}`")]
    UnaryOperand { op: UnOp, operand: Type, expr: String },
    #[error("cannot apply operator `{op}` on types {lhs} and {rhs} in `{expr}`")]
    BinaryOperands { op: BinOp, lhs: Type, rhs: Type, expr: String },
    #[error("expected {expected} arguments for {callee}, got {found}")]
    Arity { callee: String, expected: usize, found: usize },
    #[error("expected type {expected} for argument {index} of {callee}, got {found}")]
    ArgumentType { callee: String, index: usize, expected: Type, found: Type },
    #[error("print takes exactly one argument, got {found}")]
    PrintArity { found: usize },
    #[error("cannot access members of non-object type {ty} in `{expr}`")]
    NotAnObject { ty: Type, expr: String },
    #[error("there is no attribute named {name} in class {class}")]
    UnknownField { class: String, name: String },
    #[error("there is no method named {name} in class {class}")]
    UnknownMethod { class: String, name: String },
    #[error("expected type {expected}; got type {found} in assignment to `{target}`")]
    AssignType { target: String, expected: Type, found: Type },
    #[error("cannot assign to variable that is not explicitly declared in this scope: {name}")]
    GlobalAssign { name: String },
    #[error("expected type {expected}; got type {found} in initializer of {name}")]
    InitializerType { name: String, expected: Type, found: Type },
    #[error("expected type {expected}; got type {found} in return from {function}")]
    ReturnType { function: String, expected: Type, found: Type },
    #[error("return outside of a function")]
    ReturnOutsideFunction,
    #[error("condition expected type bool; got type {found} in `{expr}`")]
    Condition { found: Type, expr: String },
    #[error("all paths in {function} must return a value of type {expected}")]
    MissingReturn { function: String, expected: Type },
    #[error("first parameter of method {class}.{method} must be of the enclosing class")]
    MethodReceiver { class: String, method: String },
    #[error("{class}.__init__ must take only self and return None")]
    Constructor { class: String },
    #[error("class {class} cannot inherit from {parent}")]
    InvalidParent { class: String, parent: String },
    #[error("{name} is declared as both an attribute and a method of {class}")]
    MemberClash { class: String, name: String },
    #[error("constructor of {class} takes no arguments, got {found}")]
    ConstructorArity { class: String, found: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunSig {
    pub params: Vec<Type>,
    pub ret: Type,
}

#[derive(Clone, Debug, Default)]
struct ClassInfo {
    fields: HashMap<String, Type>,
    methods: HashMap<String, FunSig>, // signatures exclude the receiver
}

/// Class table.
#[derive(Clone, Debug)]
pub struct TypeContext {
    classes: HashMap<String, ClassInfo>,
}

impl TypeContext {
    pub fn new() -> Self {
        let mut classes = HashMap::new();
        classes.insert(OBJECT.to_string(), ClassInfo::default());
        TypeContext { classes }
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    fn require_type(&self, ty: &Type) -> Result<(), TypeError> {
        match ty {
            Type::Object(name) if !self.has_class(name) => {
                Err(TypeError::UnknownType { name: name.clone() })
            }
            _ => Ok(()),
        }
    }

    fn field_type(&self, class: &str, name: &str) -> Result<Type, TypeError> {
        self.classes
            .get(class)
            .and_then(|c| c.fields.get(name))
            .cloned()
            .ok_or_else(|| TypeError::UnknownField {
                class: class.to_string(),
                name: name.to_string(),
            })
    }

    fn method_sig(&self, class: &str, name: &str) -> Result<FunSig, TypeError> {
        self.classes
            .get(class)
            .and_then(|c| c.methods.get(name))
            .cloned()
            .ok_or_else(|| TypeError::UnknownMethod {
                class: class.to_string(),
                name: name.to_string(),
            })
    }
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
enum Binding {
    Variable { ty: Type, global: bool },
    Function(FunSig),
}

/// Scoped variable environment. Scope 0 is the global scope.
#[derive(Clone, Debug)]
struct VarEnv {
    scopes: Vec<HashMap<String, Binding>>,
}

impl VarEnv {
    fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    fn in_function(&self) -> bool {
        self.scopes.len() > 1
    }

    fn insert(&mut self, name: String, binding: Binding) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, binding);
        }
    }

    fn declared_here(&self, name: &str) -> bool {
        self.scopes.last().is_some_and(|s| s.contains_key(name))
    }

    fn get(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }
}

struct FunctionFrame {
    name: String,
    ret: Type,
}

struct Checker {
    ctx: TypeContext,
    env: VarEnv,
    frame: Option<FunctionFrame>,
}

/// Public entry point. Returns the program with every expression annotated.
pub fn type_check_program(mut p: Program) -> Result<Program, TypeError> {
    let mut checker = Checker {
        ctx: TypeContext::new(),
        env: VarEnv::new(),
        frame: None,
    };
    checker.program(&mut p)?;
    tracing::debug!(classes = checker.ctx.classes.len() - 1, "type checked program");
    Ok(p)
}

impl Checker {
    fn program(&mut self, p: &mut Program) -> Result<(), TypeError> {
        for v in p.variables() {
            self.declare_variable(v)?;
        }
        for c in p.classes() {
            self.declare_class(c)?;
        }
        for v in p.variables() {
            self.ctx.require_type(&v.ty)?;
        }
        for c in p.classes() {
            self.install_members(c)?;
        }
        for f in p.functions() {
            self.declare_function(f)?;
        }

        for def in &mut p.defs {
            match def {
                Def::Variable(_) => {}
                Def::Function(f) => self.function_body(f, None)?,
                Def::Class(c) => {
                    for m in &mut c.methods {
                        self.function_body(m, Some(&c.name))?;
                    }
                }
            }
        }

        for s in &mut p.stmts {
            self.stmt(s)?;
        }
        Ok(())
    }

    fn declare_variable(&mut self, v: &VarDef) -> Result<(), TypeError> {
        if self.ctx.has_class(&v.name) {
            return Err(TypeError::ShadowsClass { name: v.name.clone() });
        }
        if self.env.declared_here(&v.name) {
            return Err(TypeError::Duplicate { name: v.name.clone() });
        }
        check_initializer(v)?;
        let global = !self.env.in_function();
        self.env.insert(v.name.clone(), Binding::Variable { ty: v.ty.clone(), global });
        Ok(())
    }

    fn declare_class(&mut self, c: &ClassDef) -> Result<(), TypeError> {
        if c.name == PRINT {
            return Err(TypeError::ShadowsBuiltin { name: c.name.clone() });
        }
        if self.ctx.has_class(&c.name) {
            return Err(TypeError::Duplicate { name: c.name.clone() });
        }
        if self.env.get(&c.name).is_some() {
            return Err(TypeError::ShadowsClass { name: c.name.clone() });
        }
        self.ctx.classes.insert(c.name.clone(), ClassInfo::default());
        Ok(())
    }

    fn install_members(&mut self, c: &ClassDef) -> Result<(), TypeError> {
        if c.parent == c.name || !self.ctx.has_class(&c.parent) {
            return Err(TypeError::InvalidParent {
                class: c.name.clone(),
                parent: c.parent.clone(),
            });
        }

        let mut fields = HashMap::new();
        for f in &c.fields {
            if fields.contains_key(&f.name) {
                return Err(TypeError::Duplicate { name: f.name.clone() });
            }
            self.ctx.require_type(&f.ty)?;
            check_initializer(f)?;
            fields.insert(f.name.clone(), f.ty.clone());
        }

        let receiver = Type::Object(c.name.clone());
        let mut methods = HashMap::new();
        for m in &c.methods {
            if methods.contains_key(&m.name) {
                return Err(TypeError::Duplicate { name: m.name.clone() });
            }
            if fields.contains_key(&m.name) {
                return Err(TypeError::MemberClash {
                    class: c.name.clone(),
                    name: m.name.clone(),
                });
            }
            if m.params.first().map(|p| &p.ty) != Some(&receiver) {
                return Err(TypeError::MethodReceiver {
                    class: c.name.clone(),
                    method: m.name.clone(),
                });
            }
            if m.name == INIT && (m.params.len() != 1 || m.ret != Type::None) {
                return Err(TypeError::Constructor { class: c.name.clone() });
            }
            let sig = self.signature(m)?;
            methods.insert(
                m.name.clone(),
                FunSig {
                    params: sig.params.into_iter().skip(1).collect(),
                    ret: sig.ret,
                },
            );
        }

        if let Some(info) = self.ctx.classes.get_mut(&c.name) {
            info.fields = fields;
            info.methods = methods;
        }
        Ok(())
    }

    fn signature(&self, f: &FunDef) -> Result<FunSig, TypeError> {
        for p in &f.params {
            self.ctx.require_type(&p.ty)?;
        }
        self.ctx.require_type(&f.ret)?;
        Ok(FunSig {
            params: f.params.iter().map(|p| p.ty.clone()).collect(),
            ret: f.ret.clone(),
        })
    }

    fn declare_function(&mut self, f: &FunDef) -> Result<(), TypeError> {
        if f.name == PRINT {
            return Err(TypeError::ShadowsBuiltin { name: f.name.clone() });
        }
        if self.ctx.has_class(&f.name) {
            return Err(TypeError::ShadowsClass { name: f.name.clone() });
        }
        if self.env.declared_here(&f.name) {
            return Err(TypeError::Duplicate { name: f.name.clone() });
        }
        let sig = self.signature(f)?;
        self.env.insert(f.name.clone(), Binding::Function(sig));
        Ok(())
    }

    fn function_body(&mut self, f: &mut FunDef, owner: Option<&str>) -> Result<(), TypeError> {
        let name = match owner {
            Some(class) => format!("{class}.{}", f.name),
            None => f.name.clone(),
        };
        self.env.push();
        let checked = self.function_scope(f, name);
        self.env.pop();
        self.frame = None;
        checked
    }

    fn function_scope(&mut self, f: &mut FunDef, name: String) -> Result<(), TypeError> {
        for p in &f.params {
            if self.ctx.has_class(&p.name) {
                return Err(TypeError::ShadowsClass { name: p.name.clone() });
            }
            if self.env.declared_here(&p.name) {
                return Err(TypeError::Duplicate { name: p.name.clone() });
            }
            self.env.insert(
                p.name.clone(),
                Binding::Variable {
                    ty: p.ty.clone(),
                    global: false,
                },
            );
        }
        for v in &f.defs {
            self.ctx.require_type(&v.ty)?;
            self.declare_variable(v)?;
        }

        self.frame = Some(FunctionFrame {
            name: name.clone(),
            ret: f.ret.clone(),
        });
        for s in &mut f.body {
            self.stmt(s)?;
        }

        if f.ret != Type::None && !returns_on_all_paths(&f.body) {
            return Err(TypeError::MissingReturn {
                function: name,
                expected: f.ret.clone(),
            });
        }
        Ok(())
    }

    fn stmt(&mut self, s: &mut Stmt) -> Result<(), TypeError> {
        match s {
            Stmt::Pass => Ok(()),
            Stmt::Expr(e) => self.expr(e).map(drop),
            Stmt::Assign { target, value } => {
                let expected = self.lvalue(target)?;
                let found = self.expr(value)?;
                if !found.is_assignable_to(&expected) {
                    return Err(TypeError::AssignType {
                        target: target.to_string(),
                        expected,
                        found,
                    });
                }
                Ok(())
            }
            Stmt::Return(value) => {
                let found = self.expr(value)?;
                let Some(frame) = &self.frame else {
                    return Err(TypeError::ReturnOutsideFunction);
                };
                if !found.is_assignable_to(&frame.ret) {
                    return Err(TypeError::ReturnType {
                        function: frame.name.clone(),
                        expected: frame.ret.clone(),
                        found,
                    });
                }
                Ok(())
            }
            Stmt::While { cond, body } => {
                self.condition(cond)?;
                self.block(body)
            }
            Stmt::If(s) => {
                self.condition(&mut s.cond)?;
                self.block(&mut s.body)?;
                if let Some(elif) = &mut s.elif {
                    self.condition(&mut elif.cond)?;
                    self.block(&mut elif.body)?;
                }
                if let Some(else_body) = &mut s.else_body {
                    self.block(else_body)?;
                }
                Ok(())
            }
        }
    }

    fn block(&mut self, stmts: &mut [Stmt]) -> Result<(), TypeError> {
        stmts.iter_mut().try_for_each(|s| self.stmt(s))
    }

    fn condition(&mut self, cond: &mut Expr) -> Result<(), TypeError> {
        match self.expr(cond)? {
            Type::Bool => Ok(()),
            found => Err(TypeError::Condition {
                found,
                expr: cond.to_string(),
            }),
        }
    }

    fn lvalue(&mut self, target: &mut LValue) -> Result<Type, TypeError> {
        match target {
            LValue::Variable(name) => match self.env.get(name) {
                Some(Binding::Variable { global: true, .. }) if self.env.in_function() => {
                    Err(TypeError::GlobalAssign { name: name.clone() })
                }
                Some(Binding::Variable { ty, .. }) => Ok(ty.clone()),
                _ => Err(TypeError::NotAVariable { name: name.clone() }),
            },
            LValue::Member { obj, name } => {
                let class = self.object_class(obj)?;
                self.ctx.field_type(&class, name)
            }
        }
    }

    /// Class of an expression used as a receiver.
    fn object_class(&mut self, obj: &mut Expr) -> Result<String, TypeError> {
        match self.expr(obj)? {
            Type::Object(class) => Ok(class),
            ty => Err(TypeError::NotAnObject {
                ty,
                expr: obj.to_string(),
            }),
        }
    }

    fn expr(&mut self, e: &mut Expr) -> Result<Type, TypeError> {
        let ty = match e.kind {
            ExprKind::Literal(lit) => lit.ty(),
            ExprKind::Id(ref name) => match self.env.get(name) {
                Some(Binding::Variable { ty, .. }) => ty.clone(),
                _ => return Err(TypeError::NotAVariable { name: name.clone() }),
            },
            ExprKind::UnOp { op, ref mut expr } => {
                let operand = self.expr(expr)?;
                match unary_result(op, &operand) {
                    Some(ty) => ty,
                    None => {
                        return Err(TypeError::UnaryOperand {
                            op,
                            operand,
                            expr: e.to_string(),
                        });
                    }
                }
            }
            ExprKind::BinOp {
                op,
                ref mut lhs,
                ref mut rhs,
            } => {
                let l = self.expr(lhs)?;
                let r = self.expr(rhs)?;
                match binary_result(op, &l, &r) {
                    Some(ty) => ty,
                    None => {
                        return Err(TypeError::BinaryOperands {
                            op,
                            lhs: l,
                            rhs: r,
                            expr: e.to_string(),
                        });
                    }
                }
            }
            ExprKind::Call { ref name, ref mut args } => self.call(name, args)?,
            ExprKind::Field { ref mut obj, ref name } => {
                let class = self.object_class(obj)?;
                self.ctx.field_type(&class, name)?
            }
            ExprKind::Method {
                ref mut obj,
                ref name,
                ref mut args,
            } => {
                let class = self.object_class(obj)?;
                let sig = self.ctx.method_sig(&class, name)?;
                self.arguments(&format!("{class}.{name}"), &sig.params, args)?;
                sig.ret
            }
        };
        e.ty = Some(ty.clone());
        Ok(ty)
    }

    fn call(&mut self, name: &str, args: &mut [Expr]) -> Result<Type, TypeError> {
        if name == PRINT {
            if args.len() != 1 {
                return Err(TypeError::PrintArity { found: args.len() });
            }
            for a in args.iter_mut() {
                self.expr(a)?;
            }
            return Ok(Type::None);
        }

        match self.env.get(name).cloned() {
            Some(Binding::Function(sig)) => {
                self.arguments(name, &sig.params, args)?;
                Ok(sig.ret)
            }
            None if self.ctx.has_class(name) => {
                if !args.is_empty() {
                    return Err(TypeError::ConstructorArity {
                        class: name.to_string(),
                        found: args.len(),
                    });
                }
                Ok(Type::Object(name.to_string()))
            }
            _ => Err(TypeError::NotCallable { name: name.to_string() }),
        }
    }

    fn arguments(
        &mut self,
        callee: &str,
        params: &[Type],
        args: &mut [Expr],
    ) -> Result<(), TypeError> {
        if params.len() != args.len() {
            return Err(TypeError::Arity {
                callee: callee.to_string(),
                expected: params.len(),
                found: args.len(),
            });
        }
        for (index, (param, arg)) in params.iter().zip(args.iter_mut()).enumerate() {
            let found = self.expr(arg)?;
            if !found.is_assignable_to(param) {
                return Err(TypeError::ArgumentType {
                    callee: callee.to_string(),
                    index,
                    expected: param.clone(),
                    found,
                });
            }
        }
        Ok(())
    }
}

fn check_initializer(v: &VarDef) -> Result<(), TypeError> {
    let found = v.value.ty();
    if found.is_assignable_to(&v.ty) {
        Ok(())
    } else {
        Err(TypeError::InitializerType {
            name: v.name.clone(),
            expected: v.ty.clone(),
            found,
        })
    }
}

fn unary_result(op: UnOp, operand: &Type) -> Option<Type> {
    match (op, operand) {
        (UnOp::Neg, Type::Int) => Some(Type::Int),
        (UnOp::Not, Type::Bool) => Some(Type::Bool),
        _ => None,
    }
}

const BINARY_OPS: &[(BinOp, Type, Type, Type)] = &[
    (BinOp::Add, Type::Int, Type::Int, Type::Int),
    (BinOp::Sub, Type::Int, Type::Int, Type::Int),
    (BinOp::Mul, Type::Int, Type::Int, Type::Int),
    (BinOp::FloorDiv, Type::Int, Type::Int, Type::Int),
    (BinOp::Mod, Type::Int, Type::Int, Type::Int),
    (BinOp::Le, Type::Int, Type::Int, Type::Bool),
    (BinOp::Ge, Type::Int, Type::Int, Type::Bool),
    (BinOp::Lt, Type::Int, Type::Int, Type::Bool),
    (BinOp::Gt, Type::Int, Type::Int, Type::Bool),
    (BinOp::Eq, Type::Int, Type::Int, Type::Bool),
    (BinOp::Eq, Type::Bool, Type::Bool, Type::Bool),
    (BinOp::Ne, Type::Int, Type::Int, Type::Bool),
    (BinOp::Ne, Type::Bool, Type::Bool, Type::Bool),
    (BinOp::And, Type::Bool, Type::Bool, Type::Bool),
    (BinOp::Or, Type::Bool, Type::Bool, Type::Bool),
];

fn binary_result(op: BinOp, lhs: &Type, rhs: &Type) -> Option<Type> {
    if op == BinOp::Is {
        return (lhs.is_reference() && rhs.is_reference()).then_some(Type::Bool);
    }
    BINARY_OPS
        .iter()
        .find(|(o, l, r, _)| *o == op && l == lhs && r == rhs)
        .map(|(.., result)| result.clone())
}

/// A statement returns on every path if it is a `return`, or an `if` with an
/// `else` whose every branch contains such a statement. Loops never count.
fn definitely_returns(s: &Stmt) -> bool {
    match s {
        Stmt::Return(_) => true,
        Stmt::If(s) => {
            let Some(else_body) = &s.else_body else {
                return false;
            };
            returns_on_all_paths(&s.body)
                && s.elif.as_ref().is_none_or(|elif| returns_on_all_paths(&elif.body))
                && returns_on_all_paths(else_body)
        }
        _ => false,
    }
}

fn returns_on_all_paths(stmts: &[Stmt]) -> bool {
    stmts.iter().any(definitely_returns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn check(src: &str) -> Result<Program, TypeError> {
        type_check_program(parse_program(src).unwrap())
    }

    fn last_type(src: &str) -> Type {
        let p = check(src).unwrap();
        match p.stmts.last() {
            Some(Stmt::Expr(e)) => e.ty.clone().unwrap(),
            other => panic!("expected an expression statement, got {other:?}"),
        }
    }

    #[test]
    fn literal_and_operator_types() {
        assert_eq!(last_type("1 + 2 * 3"), Type::Int);
        assert_eq!(last_type("1 < 2"), Type::Bool);
        assert_eq!(last_type("not True"), Type::Bool);
        assert_eq!(last_type("None"), Type::None);
        assert_eq!(last_type("True == False"), Type::Bool);
    }

    #[test]
    fn operator_table_is_exact() {
        assert!(matches!(check("1 + True"), Err(TypeError::BinaryOperands { .. })));
        assert!(matches!(check("-True"), Err(TypeError::UnaryOperand { .. })));
        assert!(matches!(check("None + 1"), Err(TypeError::BinaryOperands { .. })));
        assert!(matches!(check("1 is 1"), Err(TypeError::BinaryOperands { .. })));
        assert_eq!(last_type("None is None"), Type::Bool);
    }

    #[test]
    fn operator_error_names_the_fragment() {
        let err = check("x: int = 1\nx + (True and False)").unwrap_err();
        assert!(err.to_string().contains("x + (True and False)"), "{err}");
    }

    fn visit_stmts<'a>(stmts: &'a [Stmt], out: &mut Vec<&'a Expr>) {
        for s in stmts {
            match s {
                Stmt::Pass => {}
                Stmt::Expr(e) | Stmt::Return(e) => visit_expr(e, out),
                Stmt::Assign { target, value } => {
                    if let LValue::Member { obj, .. } = target {
                        visit_expr(obj, out);
                    }
                    visit_expr(value, out);
                }
                Stmt::While { cond, body } => {
                    visit_expr(cond, out);
                    visit_stmts(body, out);
                }
                Stmt::If(s) => {
                    visit_expr(&s.cond, out);
                    visit_stmts(&s.body, out);
                    if let Some(elif) = &s.elif {
                        visit_expr(&elif.cond, out);
                        visit_stmts(&elif.body, out);
                    }
                    if let Some(else_body) = &s.else_body {
                        visit_stmts(else_body, out);
                    }
                }
            }
        }
    }

    fn visit_expr<'a>(e: &'a Expr, out: &mut Vec<&'a Expr>) {
        out.push(e);
        match &e.kind {
            ExprKind::Literal(_) | ExprKind::Id(_) => {}
            ExprKind::UnOp { expr, .. } => visit_expr(expr, out),
            ExprKind::BinOp { lhs, rhs, .. } => {
                visit_expr(lhs, out);
                visit_expr(rhs, out);
            }
            ExprKind::Call { args, .. } => args.iter().for_each(|a| visit_expr(a, out)),
            ExprKind::Field { obj, .. } => visit_expr(obj, out),
            ExprKind::Method { obj, args, .. } => {
                visit_expr(obj, out);
                args.iter().for_each(|a| visit_expr(a, out));
            }
        }
    }

    fn all_expressions(p: &Program) -> Vec<&Expr> {
        let mut out = Vec::new();
        for def in &p.defs {
            match def {
                Def::Variable(_) => {}
                Def::Function(f) => visit_stmts(&f.body, &mut out),
                Def::Class(c) => c.methods.iter().for_each(|m| visit_stmts(&m.body, &mut out)),
            }
        }
        visit_stmts(&p.stmts, &mut out);
        out
    }

    #[test]
    fn annotates_every_expression() {
        let src = format!(
            "{RAT}def f(a: int, r: Rat) -> int:
    if not a < 0:
        return a + r.n
    elif r is None:
        return -a
    else:
        return f(a - 1, r.mul(Rat()))
r: Rat = None
r = Rat()
r.n = f(2, r)
while r.mul(r).d > 0:
    r.d = -1
print(r is None)
print(r.mul(Rat()).n // 2)
"
        );
        let p = check(&src).unwrap();
        let exprs = all_expressions(&p);
        assert!(exprs.len() > 40, "walked {} expressions", exprs.len());
        for e in exprs {
            assert!(e.ty.is_some(), "`{e}` has no type");
        }
    }

    #[test]
    fn annotations_match_operator_results() {
        let p = check("def f(a: int) -> int:\n    return a + 1\nf(2)").unwrap();
        let Def::Function(f) = &p.defs[0] else {
            panic!()
        };
        let Stmt::Return(e) = &f.body[0] else {
            panic!()
        };
        let ExprKind::BinOp { lhs, rhs, .. } = &e.kind else {
            panic!()
        };
        assert_eq!(lhs.ty, Some(Type::Int));
        assert_eq!(rhs.ty, Some(Type::Int));
        assert_eq!(e.ty, Some(Type::Int));
    }

    #[test]
    fn duplicate_and_shadowing_rules() {
        assert!(matches!(check("x: int = 1\nx: int = 2"), Err(TypeError::Duplicate { .. })));
        assert!(matches!(
            check("def f(a: int, a: int):\n    pass"),
            Err(TypeError::Duplicate { .. })
        ));
        assert!(matches!(
            check("def f(a: int):\n    a: int = 0\n    pass"),
            Err(TypeError::Duplicate { .. })
        ));
        assert!(matches!(
            check("A: int = 1\nclass A(object):\n    pass"),
            Err(TypeError::ShadowsClass { .. })
        ));
        assert!(matches!(
            check("class A(object):\n    pass\ndef A():\n    pass"),
            Err(TypeError::ShadowsClass { .. })
        ));
        // locals may shadow globals
        assert!(check("x: int = 1\ndef f() -> int:\n    x: int = 2\n    return x").is_ok());
    }

    #[test]
    fn class_names_cannot_be_shadowed_inside_functions() {
        let class = "class A(object):\n    pass\n";
        assert!(matches!(
            check(&format!("{class}def f(A: int):\n    pass")),
            Err(TypeError::ShadowsClass { .. })
        ));
        assert!(matches!(
            check(&format!("{class}def f():\n    A: int = 0\n    pass")),
            Err(TypeError::ShadowsClass { .. })
        ));
        assert!(check(&format!("{class}def f(a: A):\n    b: A = None\n    b = a")).is_ok());
    }

    #[test]
    fn locals_may_shadow_function_names() {
        let g = "def g() -> int:\n    return 1\n";
        assert!(check(&format!("{g}def f() -> int:\n    g: int = 5\n    return g")).is_ok());
        // the shadowing local is a variable, not a function, inside f
        assert!(matches!(
            check(&format!("{g}def f() -> int:\n    g: int = 5\n    return g()")),
            Err(TypeError::NotCallable { .. })
        ));
    }

    #[test]
    fn builtins_cannot_be_redefined() {
        assert!(matches!(
            check("def print(x: int):\n    pass"),
            Err(TypeError::ShadowsBuiltin { .. })
        ));
        assert!(matches!(
            check("class print(object):\n    pass"),
            Err(TypeError::ShadowsBuiltin { .. })
        ));
        // methods live in their class and do not collide
        assert!(check("class P(object):\n    def print(self: P):\n        pass").is_ok());
    }

    #[test]
    fn definitions_may_refer_forward() {
        assert!(check("p: P = None\nclass P(object):\n    pass").is_ok());
        assert!(matches!(check("p: Q = None"), Err(TypeError::UnknownType { .. })));

        let signature = "def f(p: P) -> P:\n    return p\nclass P(object):\n    pass";
        assert!(check(signature).is_ok());
        assert!(matches!(
            check("def f(p: Q):\n    pass"),
            Err(TypeError::UnknownType { .. })
        ));

        let calls = "def f() -> int:\n    return g()\ndef g() -> int:\n    return 1\nf()";
        assert_eq!(last_type(calls), Type::Int);
        assert!(matches!(
            check("def f() -> int:\n    return h()"),
            Err(TypeError::NotCallable { .. })
        ));
    }

    #[test]
    fn assignment_to_global_inside_function_is_rejected() {
        let err = check("x: int = 1\ndef f():\n    x = 2").unwrap_err();
        assert_eq!(err, TypeError::GlobalAssign { name: "x".into() });
        assert!(check("x: int = 1\ndef f() -> int:\n    return x").is_ok());
    }

    #[test]
    fn return_paths() {
        let missing = "def f(x: int) -> int:\n    if x > 0:\n        return 1";
        assert!(matches!(check(missing), Err(TypeError::MissingReturn { .. })));

        let looping = "def f() -> int:\n    while True:\n        return 1";
        assert!(matches!(check(looping), Err(TypeError::MissingReturn { .. })));

        let complete = "def f(x: int) -> int:
    if x > 0:
        return 1
    elif x < 0:
        return 2
    else:
        return 3";
        assert!(check(complete).is_ok());

        assert!(check("def f():\n    pass").is_ok());
    }

    #[test]
    fn return_type_must_match() {
        let err = check("def f() -> int:\n    return True").unwrap_err();
        assert!(matches!(err, TypeError::ReturnType { .. }));
        assert!(check("class A(object):\n    pass\ndef f() -> A:\n    return None").is_ok());
    }

    #[test]
    fn conditions_must_be_bool() {
        assert!(matches!(check("while 1:\n    pass"), Err(TypeError::Condition { .. })));
        assert!(matches!(check("if None:\n    pass"), Err(TypeError::Condition { .. })));
    }

    #[test]
    fn calls_are_checked() {
        let src = "def f(a: int, b: bool) -> int:\n    return a\n";
        assert!(matches!(check(&format!("{src}f(1)")), Err(TypeError::Arity { .. })));
        assert!(matches!(
            check(&format!("{src}f(1, 2)")),
            Err(TypeError::ArgumentType { index: 1, .. })
        ));
        assert_eq!(last_type(&format!("{src}f(1, True)")), Type::Int);
        assert!(matches!(check("g(1)"), Err(TypeError::NotCallable { .. })));
        assert!(matches!(check("print(1, 2)"), Err(TypeError::PrintArity { found: 2 })));
        assert_eq!(last_type("print(1)"), Type::None);
    }

    #[test]
    fn unknown_identifiers_are_rejected() {
        assert!(matches!(check("y"), Err(TypeError::NotAVariable { .. })));
        assert!(matches!(check("y = 1"), Err(TypeError::NotAVariable { .. })));
        assert!(matches!(check("x: Foo = None"), Err(TypeError::UnknownType { .. })));
    }

    const RAT: &str = "class Rat(object):
    n: int = 456
    d: int = 789
    def __init__(self: Rat):
        pass
    def mul(self: Rat, other: Rat) -> Rat:
        r: Rat = None
        r = Rat()
        r.n = self.n * other.n
        r.d = self.d * other.d
        return r
";

    #[test]
    fn classes_fields_and_methods() {
        assert_eq!(last_type(&format!("{RAT}Rat()")), Type::Object("Rat".into()));
        assert_eq!(last_type(&format!("{RAT}Rat().n")), Type::Int);
        assert_eq!(last_type(&format!("{RAT}Rat().mul(Rat()).d")), Type::Int);
        assert!(matches!(check(&format!("{RAT}Rat().x")), Err(TypeError::UnknownField { .. })));
        assert!(matches!(
            check(&format!("{RAT}Rat().div(Rat())")),
            Err(TypeError::UnknownMethod { .. })
        ));
        assert!(matches!(
            check(&format!("{RAT}Rat().mul(1)")),
            Err(TypeError::ArgumentType { .. })
        ));
        assert!(matches!(check(&format!("{RAT}Rat(1)")), Err(TypeError::ConstructorArity { .. })));
        assert!(matches!(
            check(&format!("{RAT}Rat().n = True")),
            Err(TypeError::AssignType { .. })
        ));
        assert!(matches!(check("x: int = 1\nx.y"), Err(TypeError::NotAnObject { .. })));
    }

    #[test]
    fn class_declaration_rules() {
        assert!(matches!(
            check("class A(B):\n    pass"),
            Err(TypeError::InvalidParent { .. })
        ));
        assert!(matches!(
            check("class A(object):\n    def m(x: int):\n        pass"),
            Err(TypeError::MethodReceiver { .. })
        ));
        assert!(matches!(
            check("class A(object):\n    def __init__(self: A, x: int):\n        pass"),
            Err(TypeError::Constructor { .. })
        ));
        assert!(matches!(
            check("class A(object):\n    m: int = 0\n    def m(self: A):\n        pass"),
            Err(TypeError::MemberClash { .. })
        ));
        assert!(matches!(
            check("class A(object):\n    x: int = True"),
            Err(TypeError::InitializerType { .. })
        ));
        // classes may refer to each other regardless of order
        assert!(check("class A(object):\n    b: B = None\nclass B(A):\n    a: A = None").is_ok());
    }
}
