// resolve.rs — Name resolution: syntax tree → arena-based module
//
// Walks the parsed module, expands named aggregate types, assigns stable
// arena ids to globals, functions, blocks and instructions, and resolves
// every operand reference. Forward references inside a function (phi
// incomings, branch targets) are allowed.
//
// Preconditions: `source` is a well-formed syntax tree from the parser.
// Postconditions: on success every operand names an existing entity and
//                 every instruction has a concrete result type.
// Failure modes: unknown names, duplicate definitions and malformed index
//                paths produce E0003 diagnostics. Resolution continues past
//                errors so all of them are reported together.
// Side effects: none.

use std::collections::{HashMap, HashSet};

use crate::ast::*;
use crate::diag::{codes, has_errors, Diagnostic};
use crate::id::{BlockId, GlobalId, InstId};
use crate::ir::{
    Block, Constant, DebugBinding, DebugType, Declaration, Function, Global, GlobalInit, Inst,
    InstKind, Module, NamedType, Operand, Param, StructType, Type,
};

/// Prefix of debug-binding intrinsics, which need no declaration.
pub const DEBUG_INTRINSIC_PREFIX: &str = "llvm.dbg.";

/// Resolve a parsed module. All diagnostics are returned on failure.
pub fn resolve(source: &SourceModule) -> Result<Module, Vec<Diagnostic>> {
    let mut resolver = Resolver::new(source);
    let module = resolver.run();
    if has_errors(&resolver.diagnostics) {
        Err(resolver.diagnostics)
    } else {
        Ok(module)
    }
}

struct Resolver<'a> {
    source: &'a SourceModule,
    type_defs: HashMap<String, &'a [TypeExpr]>,
    expanding: Vec<String>,
    globals: HashMap<String, GlobalId>,
    callees: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

/// Per-function name tables.
struct Scope {
    function: String,
    values: HashMap<String, Operand>,
    labels: HashMap<String, BlockId>,
}

impl<'a> Resolver<'a> {
    fn new(source: &'a SourceModule) -> Self {
        Resolver {
            source,
            type_defs: HashMap::new(),
            expanding: Vec::new(),
            globals: HashMap::new(),
            callees: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    fn error(&mut self, function: Option<&str>, message: String) {
        let mut d = Diagnostic::error(codes::E0003, message);
        if let Some(f) = function {
            d = d.at(f, None);
        }
        self.diagnostics.push(d);
    }

    fn run(&mut self) -> Module {
        let mut module = Module::default();

        // ── Pass 1: collect module-level names ──
        for item in &self.source.items {
            match item {
                Item::TypeDef(t) => {
                    if self
                        .type_defs
                        .insert(t.name.name.clone(), &t.fields)
                        .is_some()
                    {
                        self.error(None, format!("duplicate type `%{}`", t.name.name));
                    }
                }
                Item::Declare(d) => self.declare_callee(&d.name.name),
                Item::Define(f) => self.declare_callee(&f.name.name),
                Item::Global(g) => {
                    let id = GlobalId(self.globals.len() as u32);
                    if self.globals.insert(g.name.name.clone(), id).is_some() {
                        self.error(None, format!("duplicate global `@{}`", g.name.name));
                    }
                }
                Item::DataLayout(_) => {}
            }
        }

        // ── Pass 2: build entities ──
        for item in &self.source.items {
            match item {
                Item::DataLayout(s) => module.datalayout = Some(s.clone()),
                Item::TypeDef(t) => {
                    let fields = t
                        .fields
                        .iter()
                        .filter_map(|f| self.resolve_type(f))
                        .collect();
                    module.types.push(NamedType {
                        name: t.name.name.clone(),
                        fields,
                    });
                }
                Item::Global(g) => {
                    if let Some(global) = self.resolve_global(g) {
                        module.globals.push(global);
                    }
                }
                Item::Declare(d) => {
                    let ret_ty = self.resolve_type(&d.ret_ty).unwrap_or(Type::Void);
                    let params = d.params.iter().filter_map(|t| self.resolve_type(t)).collect();
                    module.declarations.push(Declaration {
                        name: d.name.name.clone(),
                        ret_ty,
                        params,
                    });
                }
                Item::Define(f) => {
                    let func = self.resolve_function(f);
                    module.functions.push(func);
                }
            }
        }
        module
    }

    fn declare_callee(&mut self, name: &str) {
        if !self.callees.insert(name.to_string()) {
            self.error(None, format!("duplicate function `@{name}`"));
        }
    }

    // ── Types ──

    fn resolve_type(&mut self, ty: &TypeExpr) -> Option<Type> {
        Some(match ty {
            TypeExpr::Void => Type::Void,
            TypeExpr::Int(b) => Type::Int(*b),
            TypeExpr::Float => Type::Float,
            TypeExpr::Double => Type::Double,
            TypeExpr::Ptr(inner) => Type::ptr_to(self.resolve_type(inner)?),
            TypeExpr::Array(n, elem) => Type::Array(*n, Box::new(self.resolve_type(elem)?)),
            TypeExpr::Struct(fields) => Type::Struct(StructType {
                name: None,
                fields: fields
                    .iter()
                    .map(|f| self.resolve_type(f))
                    .collect::<Option<Vec<_>>>()?,
            }),
            TypeExpr::Named(ident) => {
                let Some(fields) = self.type_defs.get(&ident.name).copied() else {
                    self.error(None, format!("undefined type `%{}`", ident.name));
                    return None;
                };
                if self.expanding.contains(&ident.name) {
                    self.error(None, format!("recursive type `%{}`", ident.name));
                    return None;
                }
                self.expanding.push(ident.name.clone());
                let resolved = fields
                    .iter()
                    .map(|f| self.resolve_type(f))
                    .collect::<Option<Vec<_>>>();
                self.expanding.pop();
                Type::Struct(StructType {
                    name: Some(ident.name.clone()),
                    fields: resolved?,
                })
            }
        })
    }

    // ── Globals ──

    fn literal(&mut self, function: Option<&str>, lit: &Literal, ty: &Type) -> Option<Constant> {
        match (lit, ty) {
            (Literal::Int(v), Type::Float | Type::Double) => Some(Constant::Float(*v as f64)),
            (Literal::Int(v), Type::Int(1)) => Some(Constant::Bool(*v != 0)),
            (Literal::Int(v), _) => Some(Constant::Int(*v)),
            (Literal::Float(v), Type::Float | Type::Double) => Some(Constant::Float(*v)),
            (Literal::Float(v), _) => {
                self.error(function, format!("float literal {v} used as `{ty}`"));
                None
            }
            (Literal::Bool(b), _) => Some(Constant::Bool(*b)),
        }
    }

    fn resolve_global(&mut self, g: &GlobalDef) -> Option<Global> {
        let ty = self.resolve_type(&g.ty)?;
        let init = match (&g.init, &ty) {
            (GlobalInitExpr::Scalar(lit), _) => GlobalInit::Scalar(self.literal(None, lit, &ty)?),
            (GlobalInitExpr::Array(items), Type::Array(n, elem)) => {
                if items.len() as u64 != *n {
                    self.error(
                        None,
                        format!(
                            "global `@{}` declares {} elements but has {}",
                            g.name.name,
                            n,
                            items.len()
                        ),
                    );
                    return None;
                }
                let elem = (**elem).clone();
                let consts = items
                    .iter()
                    .map(|lit| self.literal(None, lit, &elem))
                    .collect::<Option<Vec<_>>>()?;
                GlobalInit::Array(consts)
            }
            (GlobalInitExpr::Array(_), _) => {
                self.error(
                    None,
                    format!("array initializer for non-array global `@{}`", g.name.name),
                );
                return None;
            }
        };
        Some(Global {
            name: g.name.name.clone(),
            constant: g.constant,
            ty,
            init,
        })
    }

    // ── Functions ──

    fn resolve_function(&mut self, def: &FunctionDef) -> Function {
        let fname = def.name.name.clone();
        let mut scope = Scope {
            function: fname.clone(),
            values: HashMap::new(),
            labels: HashMap::new(),
        };

        let mut params = Vec::new();
        for (i, (ty, name)) in def.params.iter().enumerate() {
            let ty = self.resolve_type(ty).unwrap_or(Type::Void);
            if scope
                .values
                .insert(name.name.clone(), Operand::Arg(i as u32))
                .is_some()
            {
                self.error(Some(&fname), format!("duplicate parameter `%{}`", name.name));
            }
            params.push(Param {
                name: name.name.clone(),
                ty,
            });
        }

        if def.blocks.is_empty() {
            self.error(Some(&fname), "function has no blocks".to_string());
        }

        // Ids first, so operands may refer forward.
        let mut next_inst = 0u32;
        for (bi, block) in def.blocks.iter().enumerate() {
            if scope
                .labels
                .insert(block.label.name.clone(), BlockId(bi as u32))
                .is_some()
            {
                self.error(
                    Some(&fname),
                    format!("duplicate block label `{}`", block.label.name),
                );
            }
            for inst in &block.insts {
                let id = InstId(next_inst);
                next_inst += 1;
                if let Some(result) = &inst.result {
                    if scope
                        .values
                        .insert(result.name.clone(), Operand::Inst(id))
                        .is_some()
                    {
                        self.error(
                            Some(&fname),
                            format!("value `%{}` defined more than once", result.name),
                        );
                    }
                }
            }
        }

        let mut blocks = Vec::new();
        let mut insts = Vec::new();
        for (bi, block) in def.blocks.iter().enumerate() {
            let mut ids = Vec::new();
            for inst in &block.insts {
                let id = InstId(insts.len() as u32);
                let (kind, ty) = self.resolve_inst(&scope, &inst.kind);
                let dbg = inst.dbg.as_ref().map(|(source_name, ty)| DebugBinding {
                    source_name: source_name.clone(),
                    ty: DebugType::parse(ty),
                });
                insts.push(Inst {
                    name: inst.result.as_ref().map(|r| r.name.clone()),
                    kind,
                    ty,
                    dbg,
                    block: BlockId(bi as u32),
                    erased: false,
                });
                ids.push(id);
            }
            blocks.push(Block {
                label: block.label.name.clone(),
                insts: ids,
            });
        }

        Function {
            name: fname,
            ret_ty: self.resolve_type(&def.ret_ty).unwrap_or(Type::Void),
            params,
            range_type: def.range.clone(),
            blocks,
            insts,
        }
    }

    fn ty(&mut self, ty: &TypeExpr) -> Type {
        self.resolve_type(ty).unwrap_or(Type::Void)
    }

    fn value(&mut self, scope: &Scope, v: &ValueExpr, ty: &Type) -> Operand {
        match v {
            ValueExpr::Local(id) => match scope.values.get(&id.name) {
                Some(op) => *op,
                None => {
                    self.error(
                        Some(&scope.function),
                        format!("undefined value `%{}`", id.name),
                    );
                    Operand::Undef
                }
            },
            ValueExpr::Global(id) => match self.globals.get(&id.name) {
                Some(g) => Operand::Global(*g),
                None => {
                    self.error(
                        Some(&scope.function),
                        format!("undefined global `@{}`", id.name),
                    );
                    Operand::Undef
                }
            },
            ValueExpr::Lit(lit) => self
                .literal(Some(&scope.function), lit, ty)
                .map(Operand::Const)
                .unwrap_or(Operand::Undef),
            ValueExpr::Undef => Operand::Undef,
        }
    }

    fn typed(&mut self, scope: &Scope, t: &Typed) -> (Type, Operand) {
        let ty = self.ty(&t.ty);
        let op = self.value(scope, &t.value, &ty);
        (ty, op)
    }

    fn label(&mut self, scope: &Scope, label: &Ident) -> BlockId {
        match scope.labels.get(&label.name) {
            Some(b) => *b,
            None => {
                self.error(
                    Some(&scope.function),
                    format!("undefined label `%{}`", label.name),
                );
                BlockId(0)
            }
        }
    }

    fn resolve_inst(&mut self, scope: &Scope, inst: &InstExpr) -> (InstKind, Type) {
        match inst {
            InstExpr::Binary { op, ty, lhs, rhs } => {
                let ty = self.ty(ty);
                let lhs = self.value(scope, lhs, &ty);
                let rhs = self.value(scope, rhs, &ty);
                (InstKind::Binary { op: *op, lhs, rhs }, ty)
            }
            InstExpr::FNeg { ty, value } => {
                let ty = self.ty(ty);
                let value = self.value(scope, value, &ty);
                (InstKind::FNeg { value }, ty)
            }
            InstExpr::Cast {
                op,
                from,
                value,
                to,
            } => {
                let from = self.ty(from);
                let value = self.value(scope, value, &from);
                (InstKind::Cast { op: *op, value, from }, self.ty(to))
            }
            InstExpr::Bitcast { from, value, to } => {
                let from = self.ty(from);
                let value = self.value(scope, value, &from);
                (InstKind::View { value, from }, self.ty(to))
            }
            InstExpr::Alloca { ty, align } => {
                let allocated = self.ty(ty);
                let result = Type::ptr_to(allocated.clone());
                (
                    InstKind::Alloca {
                        allocated,
                        align: *align,
                    },
                    result,
                )
            }
            InstExpr::Load { ty, ptr, align } => {
                let ty = self.ty(ty);
                let (ptr_ty, ptr) = self.typed(scope, ptr);
                (
                    InstKind::Load {
                        ptr,
                        ptr_ty,
                        align: *align,
                    },
                    ty,
                )
            }
            InstExpr::Store { value, ptr, align } => {
                let (value_ty, value) = self.typed(scope, value);
                let (ptr_ty, ptr) = self.typed(scope, ptr);
                (
                    InstKind::Store {
                        value,
                        value_ty,
                        ptr,
                        ptr_ty,
                        align: *align,
                    },
                    Type::Void,
                )
            }
            InstExpr::ElementPtr {
                inbounds,
                source_ty,
                base,
                indices,
            } => {
                let source_ty = self.ty(source_ty);
                let (base_ty, base) = self.typed(scope, base);
                let indices: Vec<(Type, Operand)> =
                    indices.iter().map(|t| self.typed(scope, t)).collect();
                let result = match element_type(&source_ty, &indices) {
                    Some(t) => Type::ptr_to(t),
                    None => {
                        self.error(
                            Some(&scope.function),
                            format!("invalid getelementptr index path into `{source_ty}`"),
                        );
                        Type::Void
                    }
                };
                (
                    InstKind::ElementPtr {
                        inbounds: *inbounds,
                        source_ty,
                        base,
                        base_ty,
                        indices,
                    },
                    result,
                )
            }
            InstExpr::Call {
                ret_ty,
                callee,
                args,
            } => {
                if !self.callees.contains(&callee.name)
                    && !callee.name.starts_with(DEBUG_INTRINSIC_PREFIX)
                {
                    self.error(
                        Some(&scope.function),
                        format!("call to undeclared function `@{}`", callee.name),
                    );
                }
                let ty = self.ty(ret_ty);
                let args = args.iter().map(|a| self.typed(scope, a)).collect();
                (
                    InstKind::Call {
                        callee: callee.name.clone(),
                        args,
                    },
                    ty,
                )
            }
            InstExpr::Ret(value) => {
                let value = value.as_ref().map(|t| self.typed(scope, t));
                (InstKind::Ret { value }, Type::Void)
            }
            InstExpr::ICmp { pred, ty, lhs, rhs } => {
                let operand_ty = self.ty(ty);
                let lhs = self.value(scope, lhs, &operand_ty);
                let rhs = self.value(scope, rhs, &operand_ty);
                (
                    InstKind::ICmp {
                        pred: *pred,
                        operand_ty,
                        lhs,
                        rhs,
                    },
                    Type::Int(1),
                )
            }
            InstExpr::FCmp { pred, ty, lhs, rhs } => {
                let operand_ty = self.ty(ty);
                let lhs = self.value(scope, lhs, &operand_ty);
                let rhs = self.value(scope, rhs, &operand_ty);
                (
                    InstKind::FCmp {
                        pred: *pred,
                        operand_ty,
                        lhs,
                        rhs,
                    },
                    Type::Int(1),
                )
            }
            InstExpr::Br(label) => (
                InstKind::Br {
                    target: self.label(scope, label),
                },
                Type::Void,
            ),
            InstExpr::CondBr {
                cond,
                then_label,
                else_label,
            } => {
                let cond = self.value(scope, cond, &Type::Int(1));
                (
                    InstKind::CondBr {
                        cond,
                        then_bb: self.label(scope, then_label),
                        else_bb: self.label(scope, else_label),
                    },
                    Type::Void,
                )
            }
            InstExpr::Phi { ty, incoming } => {
                let ty = self.ty(ty);
                let incoming = incoming
                    .iter()
                    .map(|(v, l)| (self.value(scope, v, &ty), self.label(scope, l)))
                    .collect();
                (InstKind::Phi { incoming }, ty)
            }
        }
    }
}

/// Element type addressed by a `getelementptr` index path. The first index
/// steps over the base pointer; the rest descend into aggregates.
pub fn element_type(source_ty: &Type, indices: &[(Type, Operand)]) -> Option<Type> {
    let mut current = source_ty;
    for (_, op) in indices.iter().skip(1) {
        let index = match op {
            Operand::Const(Constant::Int(i)) => Some(*i),
            _ => None,
        };
        current = current.index_into(index)?;
    }
    Some(current.clone())
}
