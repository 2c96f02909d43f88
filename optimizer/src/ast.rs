// Syntax tree for the textual SSA intermediate code.
//
// Names are still strings here; `resolve` turns them into arena ids.
// Every named reference carries a `SimpleSpan` for error reporting.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

use crate::ir::{BinOp, CastOp, FloatPred, IntPred};

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

// ── Root ──

#[derive(Debug, Clone, PartialEq)]
pub struct SourceModule {
    pub items: Vec<Item>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    DataLayout(String),
    TypeDef(TypeDef),
    Global(GlobalDef),
    Declare(DeclareDef),
    Define(FunctionDef),
}

// ── Types ──

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Void,
    Int(u32),
    Float,
    Double,
    Named(Ident),
    Ptr(Box<TypeExpr>),
    Array(u64, Box<TypeExpr>),
    Struct(Vec<TypeExpr>),
}

/// `%name = type { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub name: Ident,
    pub fields: Vec<TypeExpr>,
}

// ── Globals and declarations ──

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlobalInitExpr {
    Scalar(Literal),
    Array(Vec<Literal>),
}

/// `@name = global|constant T init`
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDef {
    pub name: Ident,
    pub constant: bool,
    pub ty: TypeExpr,
    pub init: GlobalInitExpr,
}

/// `declare T @name(T, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct DeclareDef {
    pub name: Ident,
    pub ret_ty: TypeExpr,
    pub params: Vec<TypeExpr>,
}

// ── Functions ──

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Ident,
    pub ret_ty: TypeExpr,
    pub params: Vec<(TypeExpr, Ident)>,
    pub range: Option<String>,
    pub blocks: Vec<BlockDef>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockDef {
    pub label: Ident,
    pub insts: Vec<InstDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstDef {
    pub result: Option<Ident>,
    pub kind: InstExpr,
    /// `!dbg("sourceName", "physicalType")`
    pub dbg: Option<(String, String)>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    Local(Ident),
    Global(Ident),
    Lit(Literal),
    Undef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Typed {
    pub ty: TypeExpr,
    pub value: ValueExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstExpr {
    Binary {
        op: BinOp,
        ty: TypeExpr,
        lhs: ValueExpr,
        rhs: ValueExpr,
    },
    FNeg {
        ty: TypeExpr,
        value: ValueExpr,
    },
    Cast {
        op: CastOp,
        from: TypeExpr,
        value: ValueExpr,
        to: TypeExpr,
    },
    Bitcast {
        from: TypeExpr,
        value: ValueExpr,
        to: TypeExpr,
    },
    Alloca {
        ty: TypeExpr,
        align: Option<u32>,
    },
    Load {
        ty: TypeExpr,
        ptr: Typed,
        align: Option<u32>,
    },
    Store {
        value: Typed,
        ptr: Typed,
        align: Option<u32>,
    },
    ElementPtr {
        inbounds: bool,
        source_ty: TypeExpr,
        base: Typed,
        indices: Vec<Typed>,
    },
    Call {
        ret_ty: TypeExpr,
        callee: Ident,
        args: Vec<Typed>,
    },
    Ret(Option<Typed>),
    ICmp {
        pred: IntPred,
        ty: TypeExpr,
        lhs: ValueExpr,
        rhs: ValueExpr,
    },
    FCmp {
        pred: FloatPred,
        ty: TypeExpr,
        lhs: ValueExpr,
        rhs: ValueExpr,
    },
    Br(Ident),
    CondBr {
        cond: ValueExpr,
        then_label: Ident,
        else_label: Ident,
    },
    Phi {
        ty: TypeExpr,
        incoming: Vec<(ValueExpr, Ident)>,
    },
}
