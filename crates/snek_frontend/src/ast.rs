// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

/// Static types. Object types are nominal: a class is only ever a subtype of itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Bool,
    None,
    Object(String), // class name
}

impl Type {
    /// `None` flows into every type; every other type only into itself.
    pub fn is_assignable_to(&self, target: &Type) -> bool {
        matches!(self, Type::None) || self == target
    }

    /// Types that may appear on either side of `is`.
    pub fn is_reference(&self) -> bool {
        matches!(self, Type::None | Type::Object(_))
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Object(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub defs: Vec<Def>,
    pub stmts: Vec<Stmt>,
}

impl Program {
    pub fn variables(&self) -> impl Iterator<Item = &VarDef> {
        self.defs.iter().filter_map(|d| match d {
            Def::Variable(v) => Some(v),
            _ => None,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunDef> {
        self.defs.iter().filter_map(|d| match d {
            Def::Function(f) => Some(f),
            _ => None,
        })
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.defs.iter().filter_map(|d| match d {
            Def::Class(c) => Some(c),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Def {
    Variable(VarDef),
    Function(FunDef),
    Class(ClassDef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDef {
    pub name: String,
    pub ty: Type,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunDef {
    pub name: String,
    pub params: Vec<Parameter>,
    pub ret: Type,
    pub defs: Vec<VarDef>, // local variables
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub name: String,
    pub parent: String,
    pub fields: Vec<VarDef>,
    pub methods: Vec<FunDef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Pass,
    Assign { target: LValue, value: Expr },
    Expr(Expr),
    Return(Expr),
    While { cond: Expr, body: Vec<Stmt> },
    If(IfStmt),
}

/// `if` with at most one `elif` branch and an optional `else`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfStmt {
    pub cond: Expr,
    pub body: Vec<Stmt>,
    pub elif: Option<ElifBranch>,
    pub else_body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElifBranch {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LValue {
    Variable(String),
    Member { obj: Expr, name: String },
}

/// An expression together with the type the checker inferred for it.
/// `ty` is `None` straight out of the parser and `Some` for every node after checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self { kind, ty: None }
    }

    pub fn literal(lit: Literal) -> Self {
        Self::new(ExprKind::Literal(lit))
    }

    pub fn id<S: Into<String>>(name: S) -> Self {
        Self::new(ExprKind::Id(name.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Literal(Literal),
    UnOp {
        op: UnOp,
        expr: Box<Expr>,
    },
    BinOp {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Id(String),

    // function call, `print`, or construction of a class
    Call {
        name: String,
        args: Vec<Expr>,
    },

    Field {
        obj: Box<Expr>,
        name: String,
    },

    Method {
        obj: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    None,
    Number(i32),
    True,
    False,
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::None => Type::None,
            Literal::Number(_) => Type::Int,
            Literal::True | Literal::False => Type::Bool,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

impl UnOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "-" => Some(UnOp::Neg),
            "not" => Some(UnOp::Not),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "not",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    Mod,
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    And,
    Or,
    Is,
}

impl BinOp {
    pub fn parse(s: &str) -> Option<Self> {
        let op = match s {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "//" => BinOp::FloorDiv,
            "%" => BinOp::Mod,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "<=" => BinOp::Le,
            ">=" => BinOp::Ge,
            "<" => BinOp::Lt,
            ">" => BinOp::Gt,
            "and" => BinOp::And,
            "or" => BinOp::Or,
            "is" => BinOp::Is,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Is => "is",
        }
    }
}
