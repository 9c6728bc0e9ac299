// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use std::collections::{HashMap, HashSet};

use snek_frontend::typechecker::{INIT, OBJECT};
use snek_frontend::*;

use crate::abi;
use crate::emit::{Instr, WatFunction, WatModule};
use crate::layout::{ClassLayout, HeapAllocator, literal_value};
use crate::CodegenError;

/// Names bound as wasm locals in the function being lowered; anything else is a global.
type Locals = HashSet<String>;

pub fn lower_program(p: &Program) -> Result<WatModule, CodegenError> {
    let mut lowering = Lowering::new(p);

    let mut functions = Vec::new();
    let object_init = synthesized_init(OBJECT);
    functions.push(lowering.function(&object_init, abi::method_symbol(OBJECT, INIT))?);
    for class in p.classes() {
        for method in &class.methods {
            let symbol = abi::method_symbol(&class.name, &method.name);
            functions.push(lowering.function(method, symbol)?);
        }
        if !class.methods.iter().any(|m| m.name == INIT) {
            let init = synthesized_init(&class.name);
            functions.push(lowering.function(&init, abi::method_symbol(&class.name, INIT))?);
        }
    }
    for f in p.functions() {
        functions.push(lowering.function(f, abi::function_symbol(&f.name))?);
    }

    let entry = lowering.entry(p)?;
    let globals = p.variables().map(|v| abi::var_symbol(&v.name)).collect();

    Ok(WatModule {
        heap: lowering.heap,
        globals,
        functions,
        entry,
    })
}

/// `def __init__(self: C): pass`, for classes that do not define one.
fn synthesized_init(class: &str) -> FunDef {
    FunDef {
        name: INIT.to_string(),
        params: vec![Parameter {
            name: "self".to_string(),
            ty: Type::Object(class.to_string()),
        }],
        ret: Type::None,
        defs: Vec::new(),
        body: vec![Stmt::Pass],
    }
}

/// Binary `if`/`else`; an `elif` becomes an `if` nested in the else branch.
struct BinaryIf<'a> {
    cond: &'a Expr,
    then: &'a [Stmt],
    otherwise: Otherwise<'a>,
}

enum Otherwise<'a> {
    Nothing,
    Block(&'a [Stmt]),
    Nested(Box<BinaryIf<'a>>),
}

fn normalize(s: &IfStmt) -> BinaryIf<'_> {
    let last = match &s.else_body {
        Some(body) => Otherwise::Block(body),
        None => Otherwise::Nothing,
    };
    let otherwise = match &s.elif {
        Some(elif) => Otherwise::Nested(Box::new(BinaryIf {
            cond: &elif.cond,
            then: &elif.body,
            otherwise: last,
        })),
        None => last,
    };
    BinaryIf {
        cond: &s.cond,
        then: &s.body,
        otherwise,
    }
}

struct Lowering {
    classes: HashMap<String, ClassLayout>,
    heap: HeapAllocator,
    next_label: usize,
}

impl Lowering {
    fn new(p: &Program) -> Self {
        let mut classes = HashMap::new();
        classes.insert(OBJECT.to_string(), ClassLayout::new(OBJECT, &[]));
        for c in p.classes() {
            classes.insert(c.name.clone(), ClassLayout::new(&c.name, &c.fields));
        }
        Self {
            classes,
            heap: HeapAllocator::default(),
            next_label: 0,
        }
    }

    fn function(&mut self, f: &FunDef, symbol: String) -> Result<WatFunction, CodegenError> {
        let mut locals: Locals = f.params.iter().map(|p| p.name.clone()).collect();
        locals.extend(f.defs.iter().map(|v| v.name.clone()));

        let mut body = Vec::new();
        for v in &f.defs {
            self.var_init(v, &locals, &mut body);
        }
        for s in &f.body {
            self.stmt(s, &locals, &mut body)?;
        }
        // falling off the end returns None
        body.push(Instr::i32_const(0));

        Ok(WatFunction {
            symbol,
            export: None,
            params: f.params.iter().map(|p| abi::var_symbol(&p.name)).collect(),
            locals: f.defs.iter().map(|v| abi::var_symbol(&v.name)).collect(),
            result: true,
            body,
        })
    }

    fn entry(&mut self, p: &Program) -> Result<WatFunction, CodegenError> {
        let locals = Locals::new();
        let mut body = Vec::new();
        for v in p.variables() {
            self.var_init(v, &locals, &mut body);
        }
        for s in &p.stmts {
            self.stmt(s, &locals, &mut body)?;
        }

        let result = matches!(p.stmts.last(), Some(Stmt::Expr(_)));
        if result {
            body.push(Instr::local_get(abi::SCRATCH_LOCAL));
        }

        Ok(WatFunction {
            symbol: abi::ENTRY_SYMBOL.to_string(),
            export: Some(abi::ENTRY_EXPORT),
            params: Vec::new(),
            locals: Vec::new(),
            result,
            body,
        })
    }

    fn var_init(&self, v: &VarDef, locals: &Locals, out: &mut Vec<Instr>) {
        out.push(Instr::i32_const(literal_value(v.value)));
        out.push(set_var(&v.name, locals));
    }

    fn stmt(
        &mut self,
        s: &Stmt,
        locals: &Locals,
        out: &mut Vec<Instr>,
    ) -> Result<(), CodegenError> {
        match s {
            Stmt::Pass => {}
            Stmt::Expr(e) => {
                self.expr(e, locals, out)?;
                out.push(Instr::local_set(abi::SCRATCH_LOCAL));
            }
            Stmt::Assign {
                target: LValue::Variable(name),
                value,
            } => {
                self.expr(value, locals, out)?;
                out.push(set_var(name, locals));
            }
            Stmt::Assign {
                target: LValue::Member { obj, name },
                value,
            } => {
                let offset = self.field_offset(obj, name)?;
                self.expr(obj, locals, out)?;
                out.push(Instr::i32_const(offset));
                out.push(Instr::op("i32.add"));
                self.expr(value, locals, out)?;
                out.push(Instr::op("i32.store"));
            }
            Stmt::Return(e) => {
                self.expr(e, locals, out)?;
                out.push(Instr::op("return"));
            }
            Stmt::While { cond, body } => {
                let label = self.next_label;
                self.next_label += 1;
                let mut c = Vec::new();
                self.expr(cond, locals, &mut c)?;
                let mut b = Vec::new();
                self.block(body, locals, &mut b)?;
                out.push(Instr::While { label, cond: c, body: b });
            }
            Stmt::If(s) => self.binary_if(&normalize(s), locals, out)?,
        }
        Ok(())
    }

    fn block(
        &mut self,
        stmts: &[Stmt],
        locals: &Locals,
        out: &mut Vec<Instr>,
    ) -> Result<(), CodegenError> {
        stmts.iter().try_for_each(|s| self.stmt(s, locals, out))
    }

    fn binary_if(
        &mut self,
        s: &BinaryIf<'_>,
        locals: &Locals,
        out: &mut Vec<Instr>,
    ) -> Result<(), CodegenError> {
        self.expr(s.cond, locals, out)?;
        let mut then = Vec::new();
        self.block(s.then, locals, &mut then)?;
        let mut otherwise = Vec::new();
        match &s.otherwise {
            Otherwise::Nothing => {}
            Otherwise::Block(stmts) => self.block(stmts, locals, &mut otherwise)?,
            Otherwise::Nested(inner) => self.binary_if(inner, locals, &mut otherwise)?,
        }
        out.push(Instr::If { then, otherwise });
        Ok(())
    }

    fn expr(
        &mut self,
        e: &Expr,
        locals: &Locals,
        out: &mut Vec<Instr>,
    ) -> Result<(), CodegenError> {
        match &e.kind {
            ExprKind::Literal(lit) => out.push(Instr::i32_const(literal_value(*lit))),
            ExprKind::Id(name) => out.push(get_var(name, locals)),
            ExprKind::UnOp { op, expr } => {
                self.expr(expr, locals, out)?;
                match op {
                    UnOp::Neg => {
                        out.push(Instr::i32_const(-1));
                        out.push(Instr::op("i32.mul"));
                    }
                    UnOp::Not => out.push(Instr::op("i32.eqz")),
                }
            }
            ExprKind::BinOp { op, lhs, rhs } => {
                self.expr(lhs, locals, out)?;
                self.expr(rhs, locals, out)?;
                out.push(Instr::op(binop_instr(*op)));
            }
            ExprKind::Call { name, args } => self.call(name, args, locals, out)?,
            ExprKind::Field { obj, name } => {
                let offset = self.field_offset(obj, name)?;
                self.expr(obj, locals, out)?;
                out.push(Instr::i32_const(offset));
                out.push(Instr::op("i32.add"));
                out.push(Instr::op("i32.load"));
            }
            ExprKind::Method { obj, name, args } => {
                let class = receiver_class(obj)?.to_string();
                self.expr(obj, locals, out)?;
                for a in args {
                    self.expr(a, locals, out)?;
                }
                out.push(Instr::call(&abi::method_symbol(&class, name)));
            }
        }
        Ok(())
    }

    fn call(
        &mut self,
        name: &str,
        args: &[Expr],
        locals: &Locals,
        out: &mut Vec<Instr>,
    ) -> Result<(), CodegenError> {
        if name == "print" {
            let [arg] = args else {
                return Err(CodegenError::PrintArity(args.len()));
            };
            self.expr(arg, locals, out)?;
            let callback = match annotation(arg)? {
                Type::Bool => abi::FN_PRINT_BOOL,
                Type::None => abi::FN_PRINT_NONE,
                // objects print their address
                Type::Int | Type::Object(_) => abi::FN_PRINT_NUM,
            };
            out.push(Instr::call(&abi::import_symbol(callback)));
            return Ok(());
        }

        if let Some(layout) = self.classes.get(name) {
            out.extend(self.heap.construct(layout));
            return Ok(());
        }

        for a in args {
            self.expr(a, locals, out)?;
        }
        out.push(Instr::call(&abi::function_symbol(name)));
        Ok(())
    }

    fn field_offset(&self, obj: &Expr, field: &str) -> Result<i32, CodegenError> {
        let class = receiver_class(obj)?;
        let layout = self
            .classes
            .get(class)
            .ok_or_else(|| CodegenError::UnknownClass(class.to_string()))?;
        layout.offset_of(field).ok_or_else(|| CodegenError::UnknownField {
            class: class.to_string(),
            field: field.to_string(),
        })
    }
}

fn annotation(e: &Expr) -> Result<&Type, CodegenError> {
    e.ty.as_ref().ok_or_else(|| CodegenError::MissingAnnotation(e.to_string()))
}

fn receiver_class(obj: &Expr) -> Result<&str, CodegenError> {
    annotation(obj)?
        .class_name()
        .ok_or_else(|| CodegenError::NotAnObject(obj.to_string()))
}

fn get_var(name: &str, locals: &Locals) -> Instr {
    if locals.contains(name) {
        Instr::local_get(&abi::var_symbol(name))
    } else {
        Instr::global_get(&abi::var_symbol(name))
    }
}

fn set_var(name: &str, locals: &Locals) -> Instr {
    if locals.contains(name) {
        Instr::local_set(&abi::var_symbol(name))
    } else {
        Instr::global_set(&abi::var_symbol(name))
    }
}

fn binop_instr(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "i32.add",
        BinOp::Sub => "i32.sub",
        BinOp::Mul => "i32.mul",
        BinOp::FloorDiv => "i32.div_s",
        BinOp::Mod => "i32.rem_s",
        BinOp::Eq | BinOp::Is => "i32.eq",
        BinOp::Ne => "i32.ne",
        BinOp::Le => "i32.le_s",
        BinOp::Ge => "i32.ge_s",
        BinOp::Lt => "i32.lt_s",
        BinOp::Gt => "i32.gt_s",
        BinOp::And => "i32.and",
        BinOp::Or => "i32.or",
    }
}
