// ir.rs — Resolved SSA intermediate code: module, functions, instructions
//
// Instructions live in a per-function arena addressed by `InstId`; blocks
// hold ordered lists of ids. Erasing an instruction unlinks it from its
// block and tombstones the arena slot, so ids stay stable for the lifetime
// of the module and can key bound tables.
//
// Preconditions: built by `resolve::resolve` (names already checked).
// Postconditions: `Display` writes the textual form accepted by the parser.
// Failure modes: none (mutation helpers report what they changed).
// Side effects: none.

use std::fmt;

use crate::id::{BlockId, FuncId, GlobalId, InstId};

// ── Types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
    Int(u32),
    Float,
    Double,
    Ptr(Box<Type>),
    Array(u64, Box<Type>),
    Struct(StructType),
}

/// An aggregate type. Named structs print as `%name` and are defined once at
/// module level.
#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub name: Option<String>,
    pub fields: Vec<Type>,
}

impl Type {
    pub fn ptr_to(ty: Type) -> Type {
        Type::Ptr(Box::new(ty))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, Type::Float | Type::Double)
    }

    pub fn int_bits(&self) -> Option<u32> {
        match self {
            Type::Int(b) => Some(*b),
            _ => None,
        }
    }

    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Ptr(t) => Some(t),
            _ => None,
        }
    }

    /// Type reached by one `getelementptr` index step past the first.
    pub fn index_into(&self, index: Option<i64>) -> Option<&Type> {
        match self {
            Type::Array(_, elem) => Some(elem),
            Type::Struct(s) => {
                let i = usize::try_from(index?).ok()?;
                s.fields.get(i)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(b) => write!(f, "i{b}"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Ptr(t) => write!(f, "{t}*"),
            Type::Array(n, t) => write!(f, "[{n} x {t}]"),
            Type::Struct(StructType {
                name: Some(name), ..
            }) => write!(f, "%{name}"),
            Type::Struct(StructType { name: None, fields }) => write_fields(f, fields),
        }
    }
}

fn write_fields(f: &mut fmt::Formatter<'_>, fields: &[Type]) -> fmt::Result {
    write!(f, "{{ ")?;
    for (i, t) in fields.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{t}")?;
    }
    write!(f, " }}")
}

// ── Operands ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Constant {
    pub fn value(&self) -> f64 {
        match self {
            Constant::Int(v) => *v as f64,
            Constant::Float(v) => *v,
            Constant::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Materialize `v` as a literal of type `ty`. `None` when the value is
    /// not representable (fractional or out-of-range integer).
    pub fn for_type(ty: &Type, v: f64) -> Option<Constant> {
        match ty {
            Type::Int(1) if v == 0.0 || v == 1.0 => Some(Constant::Bool(v == 1.0)),
            Type::Int(_) => {
                if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
                    Some(Constant::Int(v as i64))
                } else {
                    None
                }
            }
            Type::Float | Type::Double if v.is_finite() => Some(Constant::Float(v)),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Float(v) => write!(f, "{}", format_float(*v)),
            Constant::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Float literal text that the lexer reads back as a float token.
pub fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.1}")
    } else {
        format!("{v:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Inst(InstId),
    Arg(u32),
    Global(GlobalId),
    Const(Constant),
    Undef,
}

impl Operand {
    pub fn is_literal(&self) -> bool {
        matches!(self, Operand::Const(_))
    }

    pub fn as_inst(&self) -> Option<InstId> {
        match self {
            Operand::Inst(id) => Some(*id),
            _ => None,
        }
    }
}

// ── Opcodes ──────────────────────────────────────────────────────────────

macro_rules! named_enum {
    ($(#[$m:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$m])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn from_name(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

named_enum!(
    /// Arithmetic and bitwise binary opcodes.
    BinOp {
        Add => "add",
        FAdd => "fadd",
        Sub => "sub",
        FSub => "fsub",
        Mul => "mul",
        FMul => "fmul",
        SDiv => "sdiv",
        UDiv => "udiv",
        FDiv => "fdiv",
        SRem => "srem",
        URem => "urem",
        FRem => "frem",
        Shl => "shl",
        LShr => "lshr",
        AShr => "ashr",
        And => "and",
        Or => "or",
        Xor => "xor",
    }
);

impl BinOp {
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::FAdd | BinOp::Mul | BinOp::FMul | BinOp::And | BinOp::Or | BinOp::Xor
        )
    }
}

named_enum!(
    /// Value conversions. `bitcast` is parsed separately as a union view.
    CastOp {
        ZExt => "zext",
        SExt => "sext",
        FPExt => "fpext",
        Trunc => "trunc",
        FPTrunc => "fptrunc",
        FPToUI => "fptoui",
        FPToSI => "fptosi",
        UIToFP => "uitofp",
        SIToFP => "sitofp",
    }
);

named_enum!(
    IntPred {
        Eq => "eq",
        Ne => "ne",
        Ugt => "ugt",
        Uge => "uge",
        Ult => "ult",
        Ule => "ule",
        Sgt => "sgt",
        Sge => "sge",
        Slt => "slt",
        Sle => "sle",
    }
);

named_enum!(
    FloatPred {
        False => "false",
        Oeq => "oeq",
        Ogt => "ogt",
        Oge => "oge",
        Olt => "olt",
        Ole => "ole",
        One => "one",
        Ord => "ord",
        Ueq => "ueq",
        Ugt => "ugt",
        Uge => "uge",
        Ult => "ult",
        Ule => "ule",
        Une => "une",
        Uno => "uno",
        True => "true",
    }
);

// ── Debug bindings ───────────────────────────────────────────────────────

/// Declared physical type of a source variable, possibly wrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugType {
    Named(String),
    Pointer(Box<DebugType>),
    Array(Box<DebugType>),
    Struct(Box<DebugType>),
}

impl DebugType {
    /// Parse the wrapped form: `T*`, `T[]`, `struct T`.
    pub fn parse(text: &str) -> DebugType {
        let text = text.trim();
        if let Some(inner) = text.strip_suffix('*') {
            DebugType::Pointer(Box::new(DebugType::parse(inner)))
        } else if let Some(inner) = text.strip_suffix("[]") {
            DebugType::Array(Box::new(DebugType::parse(inner)))
        } else if let Some(inner) = text.strip_prefix("struct ") {
            DebugType::Struct(Box::new(DebugType::parse(inner)))
        } else {
            DebugType::Named(text.to_string())
        }
    }

    /// The physical-quantity name at the core of the wrappers.
    pub fn base_name(&self) -> &str {
        match self {
            DebugType::Named(n) => n,
            DebugType::Pointer(t) | DebugType::Array(t) | DebugType::Struct(t) => t.base_name(),
        }
    }
}

impl fmt::Display for DebugType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugType::Named(n) => write!(f, "{n}"),
            DebugType::Pointer(t) => write!(f, "{t}*"),
            DebugType::Array(t) => write!(f, "{t}[]"),
            DebugType::Struct(t) => write!(f, "struct {t}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebugBinding {
    pub source_name: String,
    pub ty: DebugType,
}

// ── Instructions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    /// Result type is `Inst::ty`, shared by both operands.
    Binary { op: BinOp, lhs: Operand, rhs: Operand },
    FNeg { value: Operand },
    Cast { op: CastOp, value: Operand, from: Type },
    /// Reinterpreting view of an address (`bitcast`).
    View { value: Operand, from: Type },
    Alloca { allocated: Type, align: Option<u32> },
    Load { ptr: Operand, ptr_ty: Type, align: Option<u32> },
    Store {
        value: Operand,
        value_ty: Type,
        ptr: Operand,
        ptr_ty: Type,
        align: Option<u32>,
    },
    ElementPtr {
        inbounds: bool,
        source_ty: Type,
        base: Operand,
        base_ty: Type,
        indices: Vec<(Type, Operand)>,
    },
    Call { callee: String, args: Vec<(Type, Operand)> },
    Ret { value: Option<(Type, Operand)> },
    ICmp { pred: IntPred, operand_ty: Type, lhs: Operand, rhs: Operand },
    FCmp { pred: FloatPred, operand_ty: Type, lhs: Operand, rhs: Operand },
    Br { target: BlockId },
    CondBr { cond: Operand, then_bb: BlockId, else_bb: BlockId },
    Phi { incoming: Vec<(Operand, BlockId)> },
}

impl InstKind {
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            InstKind::Binary { lhs, rhs, .. }
            | InstKind::ICmp { lhs, rhs, .. }
            | InstKind::FCmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::FNeg { value }
            | InstKind::Cast { value, .. }
            | InstKind::View { value, .. } => vec![value],
            InstKind::Alloca { .. } | InstKind::Br { .. } => Vec::new(),
            InstKind::Load { ptr, .. } => vec![ptr],
            InstKind::Store { value, ptr, .. } => vec![value, ptr],
            InstKind::ElementPtr { base, indices, .. } => {
                let mut ops = vec![base];
                ops.extend(indices.iter().map(|(_, op)| op));
                ops
            }
            InstKind::Call { args, .. } => args.iter().map(|(_, op)| op).collect(),
            InstKind::Ret { value } => value.iter().map(|(_, op)| op).collect(),
            InstKind::CondBr { cond, .. } => vec![cond],
            InstKind::Phi { incoming } => incoming.iter().map(|(op, _)| op).collect(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            InstKind::Binary { lhs, rhs, .. }
            | InstKind::ICmp { lhs, rhs, .. }
            | InstKind::FCmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::FNeg { value }
            | InstKind::Cast { value, .. }
            | InstKind::View { value, .. } => vec![value],
            InstKind::Alloca { .. } | InstKind::Br { .. } => Vec::new(),
            InstKind::Load { ptr, .. } => vec![ptr],
            InstKind::Store { value, ptr, .. } => vec![value, ptr],
            InstKind::ElementPtr { base, indices, .. } => {
                let mut ops = vec![base];
                ops.extend(indices.iter_mut().map(|(_, op)| op));
                ops
            }
            InstKind::Call { args, .. } => args.iter_mut().map(|(_, op)| op).collect(),
            InstKind::Ret { value } => value.iter_mut().map(|(_, op)| op).collect(),
            InstKind::CondBr { cond, .. } => vec![cond],
            InstKind::Phi { incoming } => incoming.iter_mut().map(|(op, _)| op).collect(),
        }
    }

    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            InstKind::Br { target } => vec![*target],
            InstKind::CondBr {
                then_bb, else_bb, ..
            } => vec![*then_bb, *else_bb],
            _ => Vec::new(),
        }
    }

    fn block_refs_mut(&mut self) -> Vec<&mut BlockId> {
        match self {
            InstKind::Br { target } => vec![target],
            InstKind::CondBr {
                then_bb, else_bb, ..
            } => vec![then_bb, else_bb],
            InstKind::Phi { incoming } => incoming.iter_mut().map(|(_, b)| b).collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inst {
    pub name: Option<String>,
    pub kind: InstKind,
    /// Result type (`void` for store, branches and void calls).
    pub ty: Type,
    pub dbg: Option<DebugBinding>,
    pub block: BlockId,
    pub erased: bool,
}

// ── Functions and module ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub label: String,
    pub insts: Vec<InstId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub ret_ty: Type,
    pub params: Vec<Param>,
    /// Declared physical type of the return value (`!range("...")`).
    pub range_type: Option<String>,
    pub blocks: Vec<Block>,
    pub insts: Vec<Inst>,
}

impl Function {
    pub fn inst(&self, id: InstId) -> &Inst {
        &self.insts[id.index()]
    }

    pub fn inst_mut(&mut self, id: InstId) -> &mut Inst {
        &mut self.insts[id.index()]
    }

    /// Live instruction ids in layout order.
    pub fn layout(&self) -> Vec<InstId> {
        self.blocks
            .iter()
            .flat_map(|b| b.insts.iter().copied())
            .collect()
    }

    /// Printable name of a value defined in this function.
    pub fn value_name(&self, op: &Operand) -> String {
        match op {
            Operand::Inst(id) => match &self.inst(*id).name {
                Some(n) => format!("%{n}"),
                None => format!("%<{}>", id.0),
            },
            Operand::Arg(i) => self
                .params
                .get(*i as usize)
                .map(|p| format!("%{}", p.name))
                .unwrap_or_else(|| format!("%<arg{i}>")),
            Operand::Global(g) => format!("@<{}>", g.0),
            Operand::Const(c) => c.to_string(),
            Operand::Undef => "undef".to_string(),
        }
    }

    /// Instructions that reference `id` as an operand.
    pub fn users(&self, id: InstId) -> Vec<InstId> {
        self.layout()
            .into_iter()
            .filter(|&u| {
                self.inst(u)
                    .kind
                    .operands()
                    .iter()
                    .any(|op| op.as_inst() == Some(id))
            })
            .collect()
    }

    /// Redirect every use of `id` to `replacement`. Returns the number of
    /// operand slots rewritten.
    pub fn replace_all_uses(&mut self, id: InstId, replacement: Operand) -> usize {
        let mut count = 0;
        for user in self.layout() {
            for op in self.inst_mut(user).kind.operands_mut() {
                if op.as_inst() == Some(id) {
                    *op = replacement;
                    count += 1;
                }
            }
        }
        count
    }

    /// Unlink `id` from its block and tombstone it.
    pub fn erase(&mut self, id: InstId) {
        let block = self.inst(id).block;
        if let Some(b) = self.blocks.get_mut(block.index()) {
            b.insts.retain(|&i| i != id);
        }
        self.inst_mut(id).erased = true;
    }

    /// Overwrite the alignment of a load, store or alloca. Returns `false`
    /// for other instructions.
    pub fn set_align(&mut self, id: InstId, align: u32) -> bool {
        match &mut self.inst_mut(id).kind {
            InstKind::Alloca { align: a, .. }
            | InstKind::Load { align: a, .. }
            | InstKind::Store { align: a, .. } => {
                *a = Some(align);
                true
            }
            _ => false,
        }
    }

    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        let last = *self.blocks.get(block.index())?.insts.last()?;
        match self.inst(last).kind {
            InstKind::Br { .. } | InstKind::CondBr { .. } | InstKind::Ret { .. } => Some(last),
            _ => None,
        }
    }

    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.terminator(block)
            .map(|t| self.inst(t).kind.successors())
            .unwrap_or_default()
    }

    /// Predecessor lists, indexed by block.
    pub fn predecessors(&self) -> Vec<Vec<BlockId>> {
        let mut preds = vec![Vec::new(); self.blocks.len()];
        for b in 0..self.blocks.len() {
            let from = BlockId(b as u32);
            for succ in self.successors(from) {
                if let Some(p) = preds.get_mut(succ.index()) {
                    p.push(from);
                }
            }
        }
        preds
    }

    /// Blocks reachable from the entry without passing through `avoid`.
    /// With `avoid` set, a block left unreached is dominated by it.
    pub fn reachable(&self, avoid: Option<BlockId>) -> Vec<bool> {
        let mut seen = vec![false; self.blocks.len()];
        let mut stack = vec![BlockId(0)];
        while let Some(b) = stack.pop() {
            if Some(b) == avoid {
                continue;
            }
            match seen.get_mut(b.index()) {
                Some(s) if !*s => *s = true,
                _ => continue,
            }
            stack.extend(self.successors(b));
        }
        seen
    }

    /// Keep only the blocks for which `keep` is true, erasing the
    /// instructions of dropped blocks and renumbering block references.
    pub fn retain_blocks(&mut self, keep: &[bool]) {
        let mut remap = vec![None; self.blocks.len()];
        let mut next = 0u32;
        for (i, &k) in keep.iter().enumerate().take(self.blocks.len()) {
            if k {
                remap[i] = Some(BlockId(next));
                next += 1;
            }
        }

        for (i, block) in self.blocks.iter().enumerate() {
            if remap[i].is_none() {
                for &id in &block.insts {
                    self.insts[id.index()].erased = true;
                }
            }
        }
        let old = std::mem::take(&mut self.blocks);
        self.blocks = old
            .into_iter()
            .enumerate()
            .filter(|(i, _)| remap[*i].is_some())
            .map(|(_, b)| b)
            .collect();

        for inst in self.insts.iter_mut().filter(|i| !i.erased) {
            if let Some(new) = remap[inst.block.index()] {
                inst.block = new;
            }
            if let InstKind::Phi { incoming } = &mut inst.kind {
                incoming.retain(|(_, b)| remap[b.index()].is_some());
            }
            for b in inst.kind.block_refs_mut() {
                if let Some(new) = remap[b.index()] {
                    *b = new;
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlobalInit {
    Scalar(Constant),
    Array(Vec<Constant>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    pub constant: bool,
    pub ty: Type,
    pub init: GlobalInit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub ret_ty: Type,
    pub params: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedType {
    pub name: String,
    pub fields: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub datalayout: Option<String>,
    pub types: Vec<NamedType>,
    pub globals: Vec<Global>,
    pub declarations: Vec<Declaration>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn func(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn func_ids(&self) -> impl Iterator<Item = FuncId> {
        (0..self.functions.len() as u32).map(FuncId)
    }

    pub fn function_by_name(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| FuncId(i as u32))
    }

    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == name)
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.index()]
    }

    /// Total live instructions across all functions.
    pub fn inst_count(&self) -> usize {
        self.functions.iter().map(|f| f.layout().len()).sum()
    }
}

// ── Textual form ─────────────────────────────────────────────────────────

struct OperandText<'a> {
    module: &'a Module,
    func: &'a Function,
    op: &'a Operand,
}

impl fmt::Display for OperandText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Operand::Global(g) => write!(f, "@{}", self.module.global(*g).name),
            other => write!(f, "{}", self.func.value_name(other)),
        }
    }
}

fn align_suffix(align: &Option<u32>) -> String {
    match align {
        Some(a) => format!(", align {a}"),
        None => String::new(),
    }
}

fn write_inst(
    f: &mut fmt::Formatter<'_>,
    module: &Module,
    func: &Function,
    inst: &Inst,
) -> fmt::Result {
    let v = |op: &Operand| {
        OperandText {
            module,
            func,
            op,
        }
        .to_string()
    };
    let label = |b: &BlockId| format!("%{}", func.blocks[b.index()].label);

    write!(f, "  ")?;
    if let Some(name) = &inst.name {
        write!(f, "%{name} = ")?;
    }
    match &inst.kind {
        InstKind::Binary { op, lhs, rhs } => {
            write!(f, "{op} {} {}, {}", inst.ty, v(lhs), v(rhs))?
        }
        InstKind::FNeg { value } => write!(f, "fneg {} {}", inst.ty, v(value))?,
        InstKind::Cast { op, value, from } => {
            write!(f, "{op} {from} {} to {}", v(value), inst.ty)?
        }
        InstKind::View { value, from } => {
            write!(f, "bitcast {from} {} to {}", v(value), inst.ty)?
        }
        InstKind::Alloca { allocated, align } => {
            write!(f, "alloca {allocated}{}", align_suffix(align))?
        }
        InstKind::Load { ptr, ptr_ty, align } => write!(
            f,
            "load {}, {ptr_ty} {}{}",
            inst.ty,
            v(ptr),
            align_suffix(align)
        )?,
        InstKind::Store {
            value,
            value_ty,
            ptr,
            ptr_ty,
            align,
        } => write!(
            f,
            "store {value_ty} {}, {ptr_ty} {}{}",
            v(value),
            v(ptr),
            align_suffix(align)
        )?,
        InstKind::ElementPtr {
            inbounds,
            source_ty,
            base,
            base_ty,
            indices,
        } => {
            write!(f, "getelementptr ")?;
            if *inbounds {
                write!(f, "inbounds ")?;
            }
            write!(f, "{source_ty}, {base_ty} {}", v(base))?;
            for (ty, op) in indices {
                write!(f, ", {ty} {}", v(op))?;
            }
        }
        InstKind::Call { callee, args } => {
            write!(f, "call {} @{callee}(", inst.ty)?;
            for (i, (ty, op)) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{ty} {}", v(op))?;
            }
            write!(f, ")")?;
        }
        InstKind::Ret { value: None } => write!(f, "ret void")?,
        InstKind::Ret {
            value: Some((ty, op)),
        } => write!(f, "ret {ty} {}", v(op))?,
        InstKind::ICmp {
            pred,
            operand_ty,
            lhs,
            rhs,
        } => write!(f, "icmp {pred} {operand_ty} {}, {}", v(lhs), v(rhs))?,
        InstKind::FCmp {
            pred,
            operand_ty,
            lhs,
            rhs,
        } => write!(f, "fcmp {pred} {operand_ty} {}, {}", v(lhs), v(rhs))?,
        InstKind::Br { target } => write!(f, "br label {}", label(target))?,
        InstKind::CondBr {
            cond,
            then_bb,
            else_bb,
        } => write!(
            f,
            "br i1 {}, label {}, label {}",
            v(cond),
            label(then_bb),
            label(else_bb)
        )?,
        InstKind::Phi { incoming } => {
            write!(f, "phi {} ", inst.ty)?;
            for (i, (op, b)) in incoming.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "[{}, {}]", v(op), label(b))?;
            }
        }
    }
    if let Some(dbg) = &inst.dbg {
        write!(f, " !dbg(\"{}\", \"{}\")", dbg.source_name, dbg.ty)?;
    }
    writeln!(f)
}

fn write_function(f: &mut fmt::Formatter<'_>, module: &Module, func: &Function) -> fmt::Result {
    write!(f, "define {} @{}(", func.ret_ty, func.name)?;
    for (i, p) in func.params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{} %{}", p.ty, p.name)?;
    }
    write!(f, ")")?;
    if let Some(range) = &func.range_type {
        write!(f, " !range(\"{range}\")")?;
    }
    writeln!(f, " {{")?;
    for (i, block) in func.blocks.iter().enumerate() {
        if i > 0 {
            writeln!(f)?;
        }
        writeln!(f, "{}:", block.label)?;
        for &id in &block.insts {
            write_inst(f, module, func, func.inst(id))?;
        }
    }
    writeln!(f, "}}")
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sections = 0;
        let mut gap = |f: &mut fmt::Formatter<'_>, nonempty: bool| -> fmt::Result {
            if nonempty {
                if sections > 0 {
                    writeln!(f)?;
                }
                sections += 1;
            }
            Ok(())
        };

        gap(f, self.datalayout.is_some())?;
        if let Some(dl) = &self.datalayout {
            writeln!(f, "target datalayout = \"{dl}\"")?;
        }

        gap(f, !self.types.is_empty())?;
        for t in &self.types {
            write!(f, "%{} = type ", t.name)?;
            write_fields(f, &t.fields)?;
            writeln!(f)?;
        }

        gap(f, !self.globals.is_empty())?;
        for g in &self.globals {
            let kw = if g.constant { "constant" } else { "global" };
            write!(f, "@{} = {kw} {} ", g.name, g.ty)?;
            match &g.init {
                GlobalInit::Scalar(c) => writeln!(f, "{c}")?,
                GlobalInit::Array(items) => {
                    let items: Vec<String> = items.iter().map(|c| c.to_string()).collect();
                    writeln!(f, "[{}]", items.join(", "))?;
                }
            }
        }

        gap(f, !self.declarations.is_empty())?;
        for d in &self.declarations {
            let params: Vec<String> = d.params.iter().map(|t| t.to_string()).collect();
            writeln!(f, "declare {} @{}({})", d.ret_ty, d.name, params.join(", "))?;
        }

        for func in &self.functions {
            gap(f, true)?;
            write_function(f, self, func)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_type_unwraps_nested_wrappers() {
        let t = DebugType::parse("struct Temperature*[]");
        assert_eq!(t.base_name(), "Temperature");
        assert_eq!(t.to_string(), "struct Temperature*[]");
        assert_eq!(DebugType::parse("Pressure"), DebugType::Named("Pressure".into()));
    }

    #[test]
    fn constant_for_type() {
        assert_eq!(Constant::for_type(&Type::Int(32), 7.0), Some(Constant::Int(7)));
        assert_eq!(Constant::for_type(&Type::Int(32), 7.5), None);
        assert_eq!(
            Constant::for_type(&Type::Double, 7.5),
            Some(Constant::Float(7.5))
        );
        assert_eq!(Constant::for_type(&Type::Int(1), 1.0), Some(Constant::Bool(true)));
    }

    #[test]
    fn float_text_is_relexable() {
        assert_eq!(format_float(7.0), "7.0");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(1e20), "1e20");
    }

    #[test]
    fn type_display() {
        let t = Type::ptr_to(Type::Array(4, Box::new(Type::Double)));
        assert_eq!(t.to_string(), "[4 x double]*");
        let s = Type::Struct(StructType {
            name: None,
            fields: vec![Type::Int(32), Type::Float],
        });
        assert_eq!(s.to_string(), "{ i32, float }");
    }

    #[test]
    fn reachability_around_an_avoided_block() {
        let src = "define void @f(i1 %c) {\nentry:\n  br label %head\nhead:\n  br i1 %c, label %body, label %exit\nbody:\n  br label %head\nexit:\n  ret void\n}\n";
        let module = crate::resolve::resolve(&crate::parser::parse(src).module.unwrap()).unwrap();
        let func = &module.functions[0];
        assert_eq!(func.reachable(None), vec![true; 4]);
        // Everything past the header is dominated by it.
        assert_eq!(func.reachable(Some(BlockId(1))), vec![true, false, false, false]);
        assert_eq!(func.predecessors()[1], vec![BlockId(0), BlockId(2)]);
    }

    #[test]
    fn binop_names_roundtrip() {
        for name in ["add", "fmul", "ashr", "xor"] {
            assert_eq!(BinOp::from_name(name).map(BinOp::name), Some(name));
        }
        assert!(BinOp::from_name("bitcast").is_none());
        assert!(BinOp::Mul.is_commutative());
        assert!(!BinOp::Sub.is_commutative());
    }
}
