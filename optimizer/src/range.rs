// range.rs — Range analysis engine
//
// A single forward pass per function computes an interval for every value
// whose bound can be proven from the seeds, the literals and the
// interprocedural summaries. Blocks and instructions are visited in layout
// order exactly once; a value defined around a loop back-edge is therefore
// usually unknown, and consumers treat absence as "no optimization".
//
// Memory bounds (what a store left behind an address) follow the control
// flow: a block starts from the hull of its visited predecessors' exit
// states, and a loop header additionally forgets every address its loop
// body may write. Only the states at `ret` blocks leave a function. Distinct
// objects (allocas, pointer parameters, globals) are assumed not to overlap.
//
// Calls to defined functions are analyzed on demand in a child scope bound
// to the call-site argument intervals. Summaries are memoized per
// (callee, argument intervals, module-level bounds). Recursion, excessive
// nesting and an exhausted visit budget stop the descent with a warning.
//
// Preconditions: the module passed `resolve`; `bounds` carries the seed
//   table and the constant globals (see `seed_globals`).
// Postconditions: every entry written is a sound bound for its value, except
//   where a W0201 diagnostic reports an approximated narrowing conversion.
// Failure modes: none. Unsupported shapes are skipped, optionally with a note.
// Side effects: emits `tracing` events.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::alias::{AliasTable, UnionState};
use crate::bounds::{key_of, BoundInfo};
use crate::cfg_simplify::{decide_float, decide_int};
use crate::config::AnalysisLimits;
use crate::diag::{codes, Diagnostic, Location};
use crate::id::{BlockId, FuncId, GlobalId, InstId, Local, ValueKey};
use crate::interval::{signed_max, signed_min, unsigned_max, Interval};
use crate::ir::{
    BinOp, CastOp, Constant, Function, GlobalInit, Inst, InstKind, Module, Operand, Type,
};
use crate::layout::DataLayout;
use crate::reinterpret::{reinterpret, wrap_signed, ScalarKind};
use crate::resolve::DEBUG_INTRINSIC_PREFIX;

/// Record constant globals in `bounds`: scalars as singletons, arrays as
/// per-element intervals plus their hull.
pub fn seed_globals(module: &Module, bounds: &mut BoundInfo) {
    for (i, global) in module.globals.iter().enumerate() {
        if !global.constant {
            continue;
        }
        let key = ValueKey::Global(GlobalId(i as u32));
        match &global.init {
            GlobalInit::Scalar(c) => bounds.insert(key, Interval::singleton(c.value())),
            GlobalInit::Array(items) => {
                let elements: Vec<Interval> =
                    items.iter().map(|c| Interval::singleton(c.value())).collect();
                if let Some(hull) = elements.iter().copied().reduce(|a, b| a.hull(&b)) {
                    bounds.insert(key, hull);
                }
                bounds.insert_elements(key, elements);
            }
        }
    }
}

/// Result summary of one analyzed call site.
#[derive(Debug, Clone)]
struct Summary {
    result: Option<Interval>,
    scope: BoundInfo,
}

/// Argument intervals and module-level bounds as exact bit patterns, for
/// memoization.
type Signature = (Vec<Option<(u64, u64)>>, Vec<(GlobalId, u64, u64)>);

/// Memory bounds at a block boundary.
#[derive(Debug, Clone, Default)]
struct MemState {
    slots: HashMap<ValueKey, Interval>,
    unions: HashMap<ValueKey, UnionState>,
}

impl MemState {
    /// Control-flow merge: a slot survives only when every side knows it.
    fn join(&self, other: &MemState) -> MemState {
        MemState {
            slots: self
                .slots
                .iter()
                .filter_map(|(k, a)| other.slots.get(k).map(|b| (*k, a.hull(b))))
                .collect(),
            unions: self
                .unions
                .iter()
                .map(|(k, s)| match other.unions.get(k) {
                    Some(o) if o == s => (*k, *s),
                    _ => (*k, UnionState::Untyped),
                })
                .collect(),
        }
    }
}

/// Addresses a loop body may write.
#[derive(Debug, Default)]
struct Effects {
    roots: HashSet<ValueKey>,
    globals: bool,
    everything: bool,
}

impl Effects {
    fn write(&mut self, root: Option<ValueKey>) {
        match root {
            Some(r) => {
                self.roots.insert(r);
            }
            None => self.everything = true,
        }
    }
}

/// Analysis state private to one function activation.
struct Frame<'m> {
    id: FuncId,
    func: &'m Function,
    alias: AliasTable,
    /// Address slot → argument stored there before its debug binding.
    pending_args: HashMap<ValueKey, u32>,
    returns: Vec<Option<(Operand, Interval)>>,
    /// Keys whose bound describes memory rather than an SSA value.
    memory: HashSet<ValueKey>,
    /// Slots given a declared range by a debug binding.
    declared: HashMap<ValueKey, Interval>,
    preds: Vec<Vec<BlockId>>,
    /// Memory state at the end of each visited block.
    exits: Vec<Option<MemState>>,
}

impl Frame<'_> {
    fn key(&self, op: &Operand) -> Option<ValueKey> {
        key_of(self.id, op)
    }

    fn inst_key(&self, inst: InstId) -> ValueKey {
        ValueKey::inst(self.id, inst)
    }

    fn root(&self, key: &ValueKey) -> Option<ValueKey> {
        key_root(self.func, self.id, key)
    }
}

pub struct RangeAnalyzer<'m> {
    module: &'m Module,
    layout: &'m DataLayout,
    limits: AnalysisLimits,
    diagnostics: Vec<Diagnostic>,
    stack: Vec<(FuncId, Option<Location>)>,
    memo: HashMap<(FuncId, Signature), Summary>,
    visits: usize,
    budget_reported: bool,
}

impl<'m> RangeAnalyzer<'m> {
    pub fn new(module: &'m Module, layout: &'m DataLayout, limits: AnalysisLimits) -> Self {
        RangeAnalyzer {
            module,
            layout,
            limits,
            diagnostics: Vec::new(),
            stack: Vec::new(),
            memo: HashMap::new(),
            visits: 0,
            budget_reported: false,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Analyze `id`, recording intervals into `bounds`. Returns the returned
    /// operand and its interval when every `ret` yields a known value.
    pub fn analyze_function(
        &mut self,
        id: FuncId,
        bounds: &mut BoundInfo,
    ) -> Option<(Operand, Interval)> {
        self.run(id, bounds, None)
    }

    fn run(
        &mut self,
        id: FuncId,
        bounds: &mut BoundInfo,
        call_site: Option<Location>,
    ) -> Option<(Operand, Interval)> {
        if self.stack.is_empty() {
            // New top-level run: fresh budget, and summaries may depend on
            // mutable globals of the previous root.
            self.visits = 0;
            self.budget_reported = false;
            self.memo.clear();
        }
        let module = self.module;
        let func = module.func(id);
        debug!(function = %func.name, depth = self.stack.len(), "analyzing function");

        self.stack.push((id, call_site));
        let memory = func
            .params
            .iter()
            .enumerate()
            .filter(|(_, p)| matches!(p.ty, Type::Ptr(_)))
            .map(|(i, _)| ValueKey::arg(id, i as u32))
            .collect();
        let mut frame = Frame {
            id,
            func,
            alias: AliasTable::new(),
            pending_args: HashMap::new(),
            returns: Vec::new(),
            memory,
            declared: HashMap::new(),
            preds: func.predecessors(),
            exits: vec![None; func.blocks.len()],
        };
        'blocks: for (b, block) in func.blocks.iter().enumerate() {
            self.enter_block(&mut frame, bounds, BlockId(b as u32));
            for &inst_id in &block.insts {
                if !self.tick(func) {
                    break 'blocks;
                }
                let inst = func.inst(inst_id);
                if let Some(iv) = self.transfer(&mut frame, bounds, inst_id, inst) {
                    trace!(
                        function = %func.name,
                        value = %func.value_name(&Operand::Inst(inst_id)),
                        lo = iv.lo,
                        hi = iv.hi,
                        "bound"
                    );
                    bounds.insert(frame.inst_key(inst_id), iv);
                }
            }
            frame.exits[b] = Some(self.snapshot(&frame, bounds));
        }
        self.leave(&mut frame, bounds);
        self.stack.pop();

        let result = fold_returns(&frame.returns);
        match &result {
            Some((_, iv)) => debug!(function = %func.name, lo = iv.lo, hi = iv.hi, "result"),
            None => debug!(function = %func.name, "result unknown"),
        }
        result
    }

    fn tick(&mut self, func: &Function) -> bool {
        self.visits += 1;
        if self.visits <= self.limits.max_visits {
            return true;
        }
        if !self.budget_reported {
            self.budget_reported = true;
            self.diagnostics.push(
                Diagnostic::warning(
                    codes::W0203,
                    format!(
                        "visit budget of {} instructions exhausted; remaining instructions not analyzed",
                        self.limits.max_visits
                    ),
                )
                .at(&func.name, None)
                .with_hint("raise --max-visits"),
            );
        }
        false
    }

    fn location(func: &Function, id: InstId) -> Location {
        Location {
            function: func.name.clone(),
            value: func
                .inst(id)
                .name
                .as_ref()
                .map(|_| func.value_name(&Operand::Inst(id))),
        }
    }

    fn emit(&mut self, func: &Function, id: InstId, diag: Diagnostic) {
        let loc = Self::location(func, id);
        self.diagnostics.push(diag.at(loc.function, loc.value));
    }

    // ── Memory flow ──

    /// Memory keys of this activation: written slots plus every mutable
    /// global.
    fn memory_keys(&self, frame: &Frame<'m>) -> HashSet<ValueKey> {
        let mut keys = frame.memory.clone();
        keys.extend(
            self.module
                .globals
                .iter()
                .enumerate()
                .filter(|(_, g)| !g.constant)
                .map(|(i, _)| ValueKey::Global(GlobalId(i as u32))),
        );
        keys
    }

    fn is_mutable_global(&self, key: &ValueKey) -> bool {
        match key {
            ValueKey::Global(g) => !self.module.global(*g).constant,
            ValueKey::Local(..) => false,
        }
    }

    fn snapshot(&self, frame: &Frame<'m>, bounds: &BoundInfo) -> MemState {
        MemState {
            slots: self
                .memory_keys(frame)
                .into_iter()
                .filter_map(|k| bounds.get(&k).map(|iv| (k, iv)))
                .collect(),
            unions: frame.alias.unions(),
        }
    }

    fn restore(&self, frame: &mut Frame<'m>, bounds: &mut BoundInfo, state: &MemState) {
        for key in self.memory_keys(frame) {
            match state.slots.get(&key) {
                Some(iv) => bounds.insert(key, *iv),
                None => {
                    bounds.remove(&key);
                }
            }
        }
        frame.alias.restore_unions(&state.unions);
    }

    /// Remove every memory bound for which `stale(key, root)` holds.
    fn forget_where(
        &self,
        frame: &Frame<'m>,
        bounds: &mut BoundInfo,
        stale: impl Fn(&ValueKey, Option<ValueKey>) -> bool,
    ) {
        for key in self.memory_keys(frame) {
            if stale(&key, frame.root(&key)) {
                bounds.remove(&key);
            }
        }
    }

    /// Set up the memory state at the top of `block`.
    fn enter_block(&mut self, frame: &mut Frame<'m>, bounds: &mut BoundInfo, block: BlockId) {
        let mut joined: Option<MemState> = None;
        let mut latches = Vec::new();
        for &p in &frame.preds[block.index()] {
            match &frame.exits[p.index()] {
                Some(exit) => {
                    joined = Some(match joined {
                        Some(acc) => acc.join(exit),
                        None => exit.clone(),
                    })
                }
                None => latches.push(p),
            }
        }
        if joined.is_none() && latches.is_empty() && block.index() == 0 {
            return;
        }
        let mut state = match joined {
            Some(s) => s,
            None if block.index() == 0 => self.snapshot(frame, bounds),
            None => MemState::default(),
        };
        if !latches.is_empty() {
            match self.loop_effects(frame, block, &latches) {
                Some(effects) => self.havoc(frame, &mut state, &effects),
                None => state = MemState::default(),
            }
            trace!(function = %frame.func.name, block = block.index(), kept = state.slots.len(), "loop header");
        }
        self.restore(frame, bounds, &state);
    }

    /// Write effects of the natural loop closed by `latches`, or `None` when
    /// `header` does not dominate them.
    fn loop_effects(&self, frame: &Frame<'m>, header: BlockId, latches: &[BlockId]) -> Option<Effects> {
        let func = frame.func;
        let bypass = func.reachable(Some(header));
        if latches.iter().any(|l| bypass[l.index()]) {
            return None;
        }
        let mut body = vec![false; func.blocks.len()];
        body[header.index()] = true;
        let mut stack = latches.to_vec();
        while let Some(b) = stack.pop() {
            if body[b.index()] {
                continue;
            }
            body[b.index()] = true;
            stack.extend(frame.preds[b.index()].iter().copied());
        }

        let mut effects = Effects::default();
        let blocks = func.blocks.iter().zip(&body).filter(|(_, inside)| **inside);
        for inst in blocks.flat_map(|(b, _)| b.insts.iter().map(move |&i| func.inst(i))) {
            match &inst.kind {
                InstKind::Store { ptr, .. } => effects.write(address_root(func, frame.id, ptr)),
                InstKind::Call { callee, args } => {
                    let pointers = args.iter().filter(|(ty, _)| matches!(ty, Type::Ptr(_)));
                    if callee.starts_with(DEBUG_INTRINSIC_PREFIX) {
                        if let Some((Type::Ptr(_), op)) = args.first() {
                            effects.write(address_root(func, frame.id, op));
                        }
                    } else if self.module.function_by_name(callee).is_some()
                        || math_name(callee).is_none()
                    {
                        effects.globals = true;
                        for (_, op) in pointers {
                            effects.write(address_root(func, frame.id, op));
                        }
                    }
                }
                _ => {}
            }
        }
        Some(effects)
    }

    fn havoc(&self, frame: &Frame<'m>, state: &mut MemState, effects: &Effects) {
        if effects.everything {
            *state = MemState::default();
            return;
        }
        let hit = |root: &ValueKey| {
            effects.roots.contains(root) || (effects.globals && self.is_mutable_global(root))
        };
        state
            .slots
            .retain(|key, _| frame.root(key).is_some_and(|r| !hit(&r)));
        for (root, union) in state.unions.iter_mut() {
            if hit(root) {
                *union = UnionState::Untyped;
            }
        }
    }

    /// Leave the function with the memory state of its returning blocks.
    fn leave(&self, frame: &mut Frame<'m>, bounds: &mut BoundInfo) {
        let func = frame.func;
        let mut state: Option<MemState> = None;
        for (b, exit) in frame.exits.iter().enumerate() {
            let returns = func
                .terminator(BlockId(b as u32))
                .is_some_and(|t| matches!(func.inst(t).kind, InstKind::Ret { .. }));
            if let (true, Some(exit)) = (returns, exit) {
                state = Some(match state {
                    Some(acc) => acc.join(exit),
                    None => exit.clone(),
                });
            }
        }
        let state = state.unwrap_or_default();
        self.restore(frame, bounds, &state);
    }

    // ── Dispatch ──

    fn transfer(
        &mut self,
        frame: &mut Frame<'m>,
        bounds: &mut BoundInfo,
        id: InstId,
        inst: &'m Inst,
    ) -> Option<Interval> {
        match &inst.kind {
            InstKind::Binary { op, lhs, rhs } => self.binary(frame, bounds, id, inst, *op, lhs, rhs),
            InstKind::FNeg { value } => bounds.operand(frame.id, value).map(|iv| iv.neg()),
            InstKind::Cast { op, value, from } => {
                let iv = bounds.operand(frame.id, value)?;
                self.cast(frame, id, *op, iv, from, &inst.ty)
            }
            InstKind::View { value, from } => self.view(frame, bounds, id, inst, value, from),
            InstKind::Alloca { .. } => None,
            InstKind::Load { ptr, .. } => self.load(frame, bounds, inst, ptr),
            InstKind::Store {
                value,
                value_ty,
                ptr,
                ..
            } => {
                self.store(frame, bounds, value, value_ty, ptr);
                None
            }
            InstKind::ElementPtr {
                source_ty,
                base,
                indices,
                ..
            } => self.element_ptr(frame, bounds, id, inst, source_ty, base, indices),
            InstKind::Call { callee, args } => self.call(frame, bounds, id, inst, callee, args),
            InstKind::Ret { value } => {
                let ret = value.as_ref().and_then(|(_, op)| {
                    bounds.operand(frame.id, op).map(|iv| (*op, iv))
                });
                frame.returns.push(ret);
                None
            }
            InstKind::ICmp { pred, lhs, rhs, .. } => {
                let a = bounds.operand(frame.id, lhs)?;
                let b = bounds.operand(frame.id, rhs)?;
                Some(decide_int(*pred, &a, &b).interval())
            }
            InstKind::FCmp { pred, lhs, rhs, .. } => {
                let a = bounds.operand(frame.id, lhs)?;
                let b = bounds.operand(frame.id, rhs)?;
                Some(decide_float(*pred, &a, &b).interval())
            }
            InstKind::Br { .. } | InstKind::CondBr { .. } => None,
            InstKind::Phi { incoming } => {
                let mut acc: Option<Interval> = None;
                for (op, _) in incoming {
                    let iv = bounds.operand(frame.id, op)?;
                    acc = Some(acc.map_or(iv, |a| a.hull(&iv)));
                }
                acc
            }
        }
    }

    // ── Arithmetic ──

    #[allow(clippy::too_many_arguments)]
    fn binary(
        &mut self,
        frame: &Frame<'m>,
        bounds: &BoundInfo,
        id: InstId,
        inst: &Inst,
        op: BinOp,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Option<Interval> {
        let (lhs, rhs) = match (lhs.is_literal(), rhs.is_literal()) {
            (true, true) => {
                self.emit(
                    frame.func,
                    id,
                    Diagnostic::note(
                        codes::N0100,
                        format!("both operands of `{op}` are literals; expected to be folded earlier"),
                    ),
                );
                (lhs, rhs)
            }
            (true, false) if op.is_commutative() => {
                self.emit(
                    frame.func,
                    id,
                    Diagnostic::note(
                        codes::N0101,
                        format!("literal operand of `{op}` normalized to the right"),
                    ),
                );
                (rhs, lhs)
            }
            _ => (lhs, rhs),
        };
        let a = bounds.operand(frame.id, lhs)?;
        let b = bounds.operand(frame.id, rhs)?;

        let bitwise = matches!(
            op,
            BinOp::Shl | BinOp::LShr | BinOp::AShr | BinOp::And | BinOp::Or | BinOp::Xor
        );
        if bitwise && !(a.is_non_negative() && b.is_non_negative()) {
            self.emit(
                frame.func,
                id,
                Diagnostic::note(
                    codes::N0102,
                    format!("`{op}` operand may be negative ({a}, {b}); no bound recorded"),
                ),
            );
            return None;
        }
        let unsigned = matches!(op, BinOp::UDiv | BinOp::URem);
        if unsigned && !(a.is_non_negative() && b.is_non_negative()) {
            return None;
        }

        let result = match op {
            BinOp::Add | BinOp::FAdd => Some(a.add(&b)),
            BinOp::Sub | BinOp::FSub => Some(a.sub(&b)),
            BinOp::Mul | BinOp::FMul => a.mul(&b),
            BinOp::FDiv => a.div(&b),
            BinOp::SDiv | BinOp::UDiv => a
                .div(&b)
                .map(|q| Interval::ordered(q.lo.trunc(), q.hi.trunc())),
            BinOp::SRem | BinOp::URem => a.rem(&b, true),
            BinOp::FRem => a.rem(&b, false),
            BinOp::And => a.and(&b),
            BinOp::Or => a.or(&b),
            BinOp::Xor => a.xor(&b),
            BinOp::Shl | BinOp::LShr | BinOp::AShr => {
                let Some(bits) = inst.ty.int_bits() else {
                    self.emit(
                        frame.func,
                        id,
                        Diagnostic::note(codes::N0103, format!("`{op}` on `{}` is not modeled", inst.ty)),
                    );
                    return None;
                };
                if op == BinOp::Shl {
                    a.shl(&b, bits)
                } else {
                    a.shr(&b, bits)
                }
            }
        }?;
        match inst.ty.int_bits() {
            Some(bits) if bits > 1 => self.wrap_result(frame, id, op, result, &inst.ty, bits),
            _ => Some(result),
        }
    }

    /// Two's-complement overflow of an integer result. Exact when both
    /// endpoints wrap into one contiguous range, otherwise unknown.
    fn wrap_result(
        &mut self,
        frame: &Frame<'m>,
        id: InstId,
        op: BinOp,
        iv: Interval,
        ty: &Type,
        bits: u32,
    ) -> Option<Interval> {
        if iv.lo >= signed_min(bits) && iv.hi <= signed_max(bits) {
            return Some(iv);
        }
        let (lo, hi) = (wrap_signed(iv.lo, bits), wrap_signed(iv.hi, bits));
        if iv.hi - iv.lo <= unsigned_max(bits) && lo <= hi {
            return Some(Interval { lo, hi });
        }
        self.emit(
            frame.func,
            id,
            Diagnostic::note(
                codes::N0104,
                format!("`{op}` on `{ty}` may wrap ({iv}); no bound recorded"),
            ),
        );
        None
    }

    // ── Conversions ──

    fn cast(
        &mut self,
        frame: &Frame<'m>,
        id: InstId,
        op: CastOp,
        iv: Interval,
        from: &Type,
        to: &Type,
    ) -> Option<Interval> {
        match op {
            CastOp::SExt | CastOp::FPExt | CastOp::SIToFP => Some(iv),
            CastOp::ZExt | CastOp::UIToFP => match from.int_bits() {
                Some(bits) => Some(as_unsigned(iv, bits)),
                None => self.unsupported(frame, id, op, from),
            },
            CastOp::Trunc => match to.int_bits() {
                Some(bits) => self.narrow_int(frame, id, op, iv, bits),
                None => self.unsupported(frame, id, op, to),
            },
            CastOp::FPToSI => match to.int_bits() {
                Some(bits) => {
                    let t = Interval::ordered(iv.lo.trunc(), iv.hi.trunc());
                    self.narrow_int(frame, id, op, t, bits)
                }
                None => self.unsupported(frame, id, op, to),
            },
            CastOp::FPToUI => match to.int_bits() {
                Some(bits) => {
                    let t = Interval::ordered(iv.lo.trunc(), iv.hi.trunc());
                    if t.lo >= 0.0 && t.hi <= unsigned_max(bits) {
                        return Some(t);
                    }
                    let wrap = |v: f64| v.rem_euclid(unsigned_max(bits) + 1.0);
                    self.approximated(frame, id, op, t, Interval::ordered(wrap(t.lo), wrap(t.hi)))
                }
                None => self.unsupported(frame, id, op, to),
            },
            CastOp::FPTrunc => {
                let narrowed = Interval::ordered(iv.lo as f32 as f64, iv.hi as f32 as f64);
                if narrowed.lo.is_finite() && narrowed.hi.is_finite() {
                    // Rounding to nearest can move an endpoint inward.
                    Some(narrowed.hull(&iv))
                } else {
                    self.emit(
                        frame.func,
                        id,
                        Diagnostic::warning(
                            codes::W0201,
                            format!("`fptrunc` of {iv} overflows `float`; no bound recorded"),
                        ),
                    );
                    None
                }
            }
        }
    }

    /// Signed narrowing to `bits`. Exact when the interval fits, or when its
    /// endpoints wrap without crossing the sign boundary; otherwise the
    /// per-endpoint reinterpretation is kept and flagged.
    fn narrow_int(
        &mut self,
        frame: &Frame<'m>,
        id: InstId,
        op: CastOp,
        iv: Interval,
        bits: u32,
    ) -> Option<Interval> {
        if iv.lo >= signed_min(bits) && iv.hi <= signed_max(bits) {
            return Some(iv);
        }
        let (lo, hi) = (wrap_signed(iv.lo, bits), wrap_signed(iv.hi, bits));
        if iv.hi - iv.lo <= unsigned_max(bits) && lo <= hi {
            return Some(Interval { lo, hi });
        }
        self.approximated(frame, id, op, iv, Interval::ordered(lo, hi))
    }

    fn approximated(
        &mut self,
        frame: &Frame<'m>,
        id: InstId,
        op: CastOp,
        source: Interval,
        result: Interval,
    ) -> Option<Interval> {
        self.emit(
            frame.func,
            id,
            Diagnostic::warning(
                codes::W0201,
                format!("`{op}` of {source} crosses the target range; endpoints reinterpreted as {result}"),
            )
            .with_hint("the recorded bound may not contain every converted value"),
        );
        Some(result)
    }

    fn unsupported(&mut self, frame: &Frame<'m>, id: InstId, op: CastOp, ty: &Type) -> Option<Interval> {
        self.emit(
            frame.func,
            id,
            Diagnostic::note(codes::N0103, format!("`{op}` involving `{ty}` is not modeled")),
        );
        None
    }

    // ── Memory ──

    fn view(
        &mut self,
        frame: &mut Frame<'m>,
        bounds: &BoundInfo,
        id: InstId,
        inst: &Inst,
        value: &Operand,
        from: &Type,
    ) -> Option<Interval> {
        if let Type::Ptr(_) = from {
            let target = frame.key(value)?;
            let view = frame.inst_key(id);
            frame.alias.register_view(view, target);
            frame.memory.insert(view);
            let kind = inst.ty.pointee().and_then(ScalarKind::of)?;
            return frame.alias.read(view, kind);
        }
        let iv = bounds.operand(frame.id, value)?;
        match (ScalarKind::of(from), ScalarKind::of(&inst.ty)) {
            (Some(f), Some(t)) if f.bits() == t.bits() => reinterpret(iv, f, t),
            _ => {
                self.emit(
                    frame.func,
                    id,
                    Diagnostic::note(
                        codes::N0103,
                        format!("`bitcast` from `{from}` to `{}` is not modeled", inst.ty),
                    ),
                );
                None
            }
        }
    }

    fn load(
        &mut self,
        frame: &Frame<'m>,
        bounds: &BoundInfo,
        inst: &Inst,
        ptr: &Operand,
    ) -> Option<Interval> {
        let addr = frame.key(ptr)?;
        if frame.alias.is_union(addr) {
            let kind = ScalarKind::of(&inst.ty)?;
            return frame.alias.read(addr, kind);
        }
        bounds.get(&frame.alias.slot(addr))
    }

    fn store(
        &mut self,
        frame: &mut Frame<'m>,
        bounds: &mut BoundInfo,
        value: &Operand,
        value_ty: &Type,
        ptr: &Operand,
    ) {
        let Some(addr) = frame.key(ptr) else {
            return;
        };
        self.forget_aliases(frame, bounds, ptr, addr);
        let slot = frame.alias.slot(addr);
        frame.memory.insert(slot);
        let stored = match bounds.operand(frame.id, value) {
            Some(iv) => Some(iv),
            // A declared slot binds the argument stored into it; otherwise a
            // later debug binding may.
            None => match value {
                Operand::Arg(i) => match frame.declared.get(&slot) {
                    Some(&iv) => {
                        bounds.insert(ValueKey::arg(frame.id, *i), iv);
                        Some(iv)
                    }
                    None => {
                        frame.pending_args.insert(slot, *i);
                        None
                    }
                },
                _ => None,
            },
        };
        match stored {
            Some(iv) => {
                bounds.insert(slot, iv);
                frame.alias.record_write(addr, ScalarKind::of(value_ty), Some(iv));
            }
            None => {
                bounds.remove(&slot);
                frame.alias.invalidate(addr);
            }
        }
    }

    /// Before a write through `ptr`, drop the bounds of every other slot the
    /// write may overlap. Constant-offset fields of one root are disjoint;
    /// an address of unknown offset overlaps every slot of its root, and an
    /// address of unknown origin overlaps everything.
    fn forget_aliases(
        &self,
        frame: &mut Frame<'m>,
        bounds: &mut BoundInfo,
        ptr: &Operand,
        addr: ValueKey,
    ) {
        let root = address_root(frame.func, frame.id, ptr);
        let exact = |k: &ValueKey| root == Some(*k) || frame.alias.is_registered(*k);
        let precise = exact(&addr);
        let written = frame.alias.slot(addr);
        self.forget_where(frame, bounds, |key, key_root| {
            *key != written
                && match (root, key_root) {
                    (Some(r), Some(kr)) => kr == r && !(precise && exact(key)),
                    _ => true,
                }
        });
        if !precise {
            match root {
                Some(r) => frame.alias.invalidate(r),
                None => frame.alias.invalidate_all(),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn element_ptr(
        &mut self,
        frame: &mut Frame<'m>,
        bounds: &BoundInfo,
        id: InstId,
        inst: &Inst,
        source_ty: &Type,
        base: &Operand,
        indices: &[(Type, Operand)],
    ) -> Option<Interval> {
        let base_key = frame.key(base)?;
        let gep = frame.inst_key(id);

        // Constant table lookup by literal or bounded index.
        if let (Some(elements), [_, (_, index)]) = (bounds.elements(&base_key), indices) {
            if leading_zero(indices) {
                let idx = bounds.operand(frame.id, index)?;
                let lo = idx.lo.ceil().max(0.0);
                let hi = idx.hi.floor().min(elements.len() as f64 - 1.0);
                if lo > hi {
                    return None;
                }
                return elements[lo as usize..=hi as usize]
                    .iter()
                    .copied()
                    .reduce(|a, b| a.hull(&b));
            }
        }

        frame.memory.insert(gep);
        match self.field_offset(source_ty, indices) {
            Some(bits) => {
                let slot = frame.alias.register_field(gep, base_key, bits);
                if frame.alias.is_union(gep) {
                    let kind = inst.ty.pointee().and_then(ScalarKind::of)?;
                    frame.alias.read(gep, kind)
                } else {
                    bounds.get(&slot)
                }
            }
            // Pointer stepping keeps the pointee's bound.
            None if indices.len() == 1 => bounds.get(&frame.alias.slot(base_key)),
            None => None,
        }
    }

    /// Bit offset addressed by an all-literal index path with a zero first
    /// index.
    fn field_offset(&self, source_ty: &Type, indices: &[(Type, Operand)]) -> Option<u64> {
        if !leading_zero(indices) {
            return None;
        }
        let mut current = source_ty;
        let mut offset = 0u64;
        for (_, op) in indices.iter().skip(1) {
            let Operand::Const(Constant::Int(i)) = op else {
                return None;
            };
            let i = u64::try_from(*i).ok()?;
            offset += self.layout.field_offset_bits(current, i)?;
            current = current.index_into(Some(i as i64))?;
        }
        Some(offset)
    }

    // ── Calls ──

    fn call(
        &mut self,
        frame: &mut Frame<'m>,
        bounds: &mut BoundInfo,
        id: InstId,
        inst: &Inst,
        callee: &str,
        args: &[(Type, Operand)],
    ) -> Option<Interval> {
        if callee.starts_with(DEBUG_INTRINSIC_PREFIX) {
            self.debug_binding(frame, bounds, inst, args);
            return None;
        }
        let module = self.module;
        match module.function_by_name(callee) {
            Some(callee_id) => self.call_defined(frame, bounds, id, callee_id, args),
            None => {
                if math_name(callee).is_none() {
                    self.clobber(frame, bounds, args);
                }
                let ivs: Option<Vec<Interval>> = args
                    .iter()
                    .map(|(_, op)| bounds.operand(frame.id, op))
                    .collect();
                let ivs = ivs?;
                let result = external_call(callee, &ivs);
                if result.is_none() && math_name(callee).is_none() {
                    self.emit(
                        frame.func,
                        id,
                        Diagnostic::note(
                            codes::N0103,
                            format!("call to external `@{callee}` is not modeled"),
                        ),
                    );
                }
                result
            }
        }
    }

    /// An opaque callee may write every mutable global and whatever its
    /// pointer arguments reach.
    fn clobber(&self, frame: &mut Frame<'m>, bounds: &mut BoundInfo, args: &[(Type, Operand)]) {
        let roots: Vec<Option<ValueKey>> = args
            .iter()
            .filter(|(ty, _)| matches!(ty, Type::Ptr(_)))
            .map(|(_, op)| address_root(frame.func, frame.id, op))
            .collect();
        let everything = roots.contains(&None);
        self.forget_where(frame, bounds, |_, root| match root {
            Some(r) => everything || self.is_mutable_global(&r) || roots.contains(&Some(r)),
            None => true,
        });
        if everything {
            frame.alias.invalidate_all();
        } else {
            for root in roots.into_iter().flatten() {
                frame.alias.invalidate(root);
            }
        }
    }

    /// Bind the first argument of a debug intrinsic to the seed named by the
    /// instruction's declared physical type.
    fn debug_binding(
        &mut self,
        frame: &mut Frame<'m>,
        bounds: &mut BoundInfo,
        inst: &Inst,
        args: &[(Type, Operand)],
    ) {
        let (Some(dbg), Some((ty, op))) = (&inst.dbg, args.first()) else {
            return;
        };
        let Some(key) = frame.key(op) else {
            return;
        };
        let name = dbg.ty.base_name();
        let Some(iv) = bounds.seed(name) else {
            trace!(function = %frame.func.name, variable = %dbg.source_name, physical = name, "no seed");
            return;
        };
        debug!(function = %frame.func.name, variable = %dbg.source_name, physical = name, lo = iv.lo, hi = iv.hi, "seeded");
        let slot = frame.alias.slot(key);
        bounds.insert(slot, iv);
        if let Type::Ptr(_) = ty {
            frame.memory.insert(slot);
            frame.declared.insert(slot, iv);
        }
        if let Some(arg) = frame.pending_args.remove(&slot) {
            bounds.insert(ValueKey::arg(frame.id, arg), iv);
        }
        let kind = ty.pointee().unwrap_or(ty);
        frame.alias.record_write(key, ScalarKind::of(kind), Some(iv));
    }

    fn call_defined(
        &mut self,
        frame: &mut Frame<'m>,
        bounds: &mut BoundInfo,
        id: InstId,
        callee_id: FuncId,
        args: &[(Type, Operand)],
    ) -> Option<Interval> {
        let module = self.module;
        let callee = module.func(callee_id);
        let site = Self::location(frame.func, id);

        if self.stack.iter().any(|(f, _)| *f == callee_id) {
            let mut d = Diagnostic::warning(
                codes::W0202,
                format!("recursive call to `@{}` is not analyzed", callee.name),
            );
            for (f, loc) in self.stack.iter().rev() {
                d = d.with_cause(format!("inside `@{}`", module.func(*f).name), loc.clone());
            }
            self.emit(frame.func, id, d);
            return None;
        }
        if self.stack.len() >= self.limits.max_call_depth {
            self.emit(
                frame.func,
                id,
                Diagnostic::warning(
                    codes::W0202,
                    format!(
                        "call depth limit of {} reached at `@{}`",
                        self.limits.max_call_depth, callee.name
                    ),
                )
                .with_hint("raise --max-call-depth"),
            );
            return None;
        }

        let arg_ivs: Vec<Option<Interval>> = args
            .iter()
            .map(|(_, op)| bounds.operand(frame.id, op))
            .collect();
        let signature: Signature = (
            arg_ivs
                .iter()
                .map(|o| o.map(|iv| (iv.lo.to_bits(), iv.hi.to_bits())))
                .collect(),
            bounds.global_signature(),
        );
        let memo_key = (callee_id, signature);

        let cached = self.memo.get(&memo_key).cloned();
        let summary = match cached {
            Some(s) => {
                trace!(callee = %callee.name, "summary reused");
                s
            }
            None => {
                let mut child = bounds.child();
                for (i, iv) in arg_ivs.iter().enumerate() {
                    if let Some(iv) = iv {
                        child.insert(ValueKey::arg(callee_id, i as u32), *iv);
                    }
                }
                let result = self
                    .run(callee_id, &mut child, Some(site.clone()))
                    .map(|(_, iv)| iv);
                let s = Summary {
                    result,
                    scope: child,
                };
                self.memo.insert(memo_key, s.clone());
                s
            }
        };

        // Module-level state is whatever the callee left behind.
        self.forget_where(frame, bounds, |_, root| match root {
            Some(r) => self.is_mutable_global(&r),
            None => true,
        });
        bounds.merge_child(&summary.scope);

        // Memory behind pointer arguments may have been rewritten. The
        // callee's final bound for a parameter is the pointee's only when
        // no other argument reaches the same object.
        let pointers: Vec<(u32, ValueKey, Option<ValueKey>)> = args
            .iter()
            .enumerate()
            .filter(|(_, (ty, _))| matches!(ty, Type::Ptr(_)))
            .filter_map(|(i, (_, op))| {
                let addr = frame.key(op)?;
                Some((i as u32, addr, address_root(frame.func, frame.id, op)))
            })
            .collect();
        for &(_, _, root) in &pointers {
            self.forget_where(frame, bounds, |_, key_root| {
                root.is_none() || key_root.is_none() || key_root == root
            });
            match root {
                Some(r) => frame.alias.invalidate(r),
                None => frame.alias.invalidate_all(),
            }
        }
        for &(i, addr, root) in &pointers {
            let unique = matches!(root, Some(ValueKey::Local(..)))
                && pointers.iter().filter(|p| p.2 == root).count() == 1;
            if !unique {
                continue;
            }
            if let Some(iv) = summary.scope.get(&ValueKey::arg(callee_id, i)) {
                let slot = frame.alias.slot(addr);
                bounds.insert(slot, iv);
                frame.memory.insert(slot);
            }
        }

        bounds.record_callee(call_site_name(&callee.name, &arg_ivs), summary.scope);

        if let (Some(range_type), Some(inferred)) = (&callee.range_type, summary.result) {
            if let Some(declared) = bounds.seed(range_type) {
                if declared != inferred {
                    self.emit(
                        frame.func,
                        id,
                        Diagnostic::warning(
                            codes::W0200,
                            format!(
                                "`@{}` declares return range `{}` {} but {} was inferred",
                                callee.name, range_type, declared, inferred
                            ),
                        )
                        .with_hint("the inferred range is used"),
                    );
                }
            }
        }
        summary.result
    }
}

fn leading_zero(indices: &[(Type, Operand)]) -> bool {
    matches!(
        indices.first(),
        Some((_, Operand::Const(Constant::Int(0))))
    )
}

/// Object an address operand points into: an `alloca`, a pointer
/// parameter or a global. `None` when the address is loaded, merged or
/// returned by a call.
fn address_root(func: &Function, id: FuncId, op: &Operand) -> Option<ValueKey> {
    match op {
        Operand::Inst(i) => match &func.inst(*i).kind {
            InstKind::Alloca { .. } => Some(ValueKey::inst(id, *i)),
            InstKind::View {
                value,
                from: Type::Ptr(_),
            } => address_root(func, id, value),
            InstKind::ElementPtr { base, .. } => address_root(func, id, base),
            _ => None,
        },
        _ => key_of(id, op),
    }
}

fn key_root(func: &Function, id: FuncId, key: &ValueKey) -> Option<ValueKey> {
    match key {
        ValueKey::Local(f, Local::Inst(i)) if *f == id => {
            address_root(func, id, &Operand::Inst(*i))
        }
        _ => Some(*key),
    }
}

fn fold_returns(returns: &[Option<(Operand, Interval)>]) -> Option<(Operand, Interval)> {
    let mut acc: Option<(Operand, Interval)> = None;
    for ret in returns {
        let (op, iv) = (*ret)?;
        acc = Some(match acc {
            Some((_, prev)) => (op, prev.hull(&iv)),
            None => (op, iv),
        });
    }
    acc
}

/// Unsigned view of a signed `bits`-wide interval.
fn as_unsigned(iv: Interval, bits: u32) -> Interval {
    let span = unsigned_max(bits) + 1.0;
    if iv.is_non_negative() {
        iv
    } else if iv.hi < 0.0 {
        Interval {
            lo: iv.lo + span,
            hi: iv.hi + span,
        }
    } else {
        Interval {
            lo: 0.0,
            hi: unsigned_max(bits),
        }
    }
}

fn call_site_name(callee: &str, args: &[Option<Interval>]) -> String {
    let args: Vec<String> = args
        .iter()
        .map(|a| match a {
            Some(iv) => format!("{},{}", iv.lo, iv.hi),
            None => "?".to_string(),
        })
        .collect();
    format!("{}[{}]", callee, args.join(";"))
}

// ── External math ────────────────────────────────────────────────────────

/// Modeled name of a math routine: `llvm.fabs.f64` → `fabs`, `sqrtf` → `sqrt`.
fn math_name(callee: &str) -> Option<&'static str> {
    let base = callee.strip_prefix("llvm.").unwrap_or(callee);
    let base = base.split('.').next().unwrap_or(base);
    const KNOWN: [&str; 10] = [
        "log", "log1p", "exp", "sqrt", "sin", "cos", "fabs", "floor", "ceil", "scalbn",
    ];
    KNOWN
        .iter()
        .find(|k| base == **k || base.strip_suffix('f') == Some(**k))
        .copied()
}

fn external_call(callee: &str, args: &[Interval]) -> Option<Interval> {
    let name = math_name(callee)?;
    let x = args.first()?;
    match name {
        "log" => x.map_monotone(f64::ln),
        "log1p" => x.map_monotone(f64::ln_1p),
        "exp" => x.map_monotone(f64::exp),
        "sqrt" => x.map_monotone(|v| if v < 0.0 { 0.0 } else { v.sqrt() }),
        "sin" | "cos" => Some(Interval { lo: -1.0, hi: 1.0 }),
        "fabs" => Some(if x.is_non_negative() {
            *x
        } else if x.hi <= 0.0 {
            x.neg()
        } else {
            Interval {
                lo: 0.0,
                hi: x.lo.abs().max(x.hi),
            }
        }),
        "floor" => x.map_monotone(f64::floor),
        "ceil" => x.map_monotone(f64::ceil),
        "scalbn" => {
            let n = args.get(1)?;
            x.mul(&Interval::ordered(2f64.powf(n.lo), 2f64.powf(n.hi)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::SeedTable;
    use crate::diag::DiagLevel;
    use crate::parser::parse;
    use crate::resolve::resolve;
    use std::rc::Rc;

    struct Run {
        module: Module,
        bounds: BoundInfo,
        result: Option<(Operand, Interval)>,
        diagnostics: Vec<Diagnostic>,
    }

    fn analyze_with(source: &str, seeds: &[(&str, f64, f64)], function: &str) -> Run {
        let parsed = parse(source);
        assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
        let module = resolve(&parsed.module.unwrap()).expect("resolve");
        let table: SeedTable = seeds
            .iter()
            .map(|(n, lo, hi)| (n.to_string(), Interval::ordered(*lo, *hi)))
            .collect();
        let mut bounds = BoundInfo::new(Rc::new(table));
        seed_globals(&module, &mut bounds);
        let layout = DataLayout::default();
        let fid = module.function_by_name(function).unwrap();
        let (result, diagnostics) = {
            let mut engine = RangeAnalyzer::new(&module, &layout, AnalysisLimits::default());
            let result = engine.analyze_function(fid, &mut bounds);
            (result, engine.take_diagnostics())
        };
        Run {
            module,
            bounds,
            result,
            diagnostics,
        }
    }

    fn analyze(source: &str, function: &str) -> Run {
        analyze_with(source, &[], function)
    }

    impl Run {
        fn value(&self, function: &str, name: &str) -> Option<Interval> {
            let fid = self.module.function_by_name(function).unwrap();
            let func = self.module.func(fid);
            let idx = func
                .insts
                .iter()
                .position(|i| i.name.as_deref() == Some(name))
                .unwrap_or_else(|| panic!("no value %{name}"));
            self.bounds.get(&ValueKey::inst(fid, InstId(idx as u32)))
        }

        fn result(&self) -> Option<Interval> {
            self.result.map(|(_, iv)| iv)
        }

        fn has_code(&self, code: crate::diag::DiagCode) -> bool {
            self.diagnostics.iter().any(|d| d.code == Some(code))
        }
    }

    fn iv(lo: f64, hi: f64) -> Interval {
        Interval::ordered(lo, hi)
    }

    #[test]
    fn literal_left_add_is_swapped_with_note() {
        let run = analyze(
            r#"
define i32 @f(i32 %x) {
entry:
  %a = alloca i32
  store i32 3, i32* %a
  %v = load i32, i32* %a
  %s = add i32 2, %v
  ret i32 %s
}
"#,
            "f",
        );
        assert_eq!(run.value("f", "s"), Some(iv(5.0, 5.0)));
        assert!(run.has_code(codes::N0101));
    }

    #[test]
    fn literal_chain_is_evaluated_with_note() {
        let run = analyze(
            "define i32 @f() {\nentry:\n  %s = add i32 2, 3\n  %p = mul i32 %s, 4\n  ret i32 %p\n}\n",
            "f",
        );
        assert_eq!(run.value("f", "s"), Some(iv(5.0, 5.0)));
        assert_eq!(run.result(), Some(iv(20.0, 20.0)));
        assert!(run.has_code(codes::N0100));
    }

    #[test]
    fn seeded_argument_flows_through_store_and_debug_binding() {
        let run = analyze_with(
            r#"
define double @f(double %speed) {
entry:
  %a = alloca double
  store double %speed, double* %a
  call void @llvm.dbg.declare(double* %a) !dbg("speed", "Speed")
  %v = load double, double* %a
  %w = fmul double %speed, 2.0
  ret double %w
}
"#,
            &[("Speed", 0.0, 120.0)],
            "f",
        );
        assert_eq!(run.value("f", "v"), Some(iv(0.0, 120.0)));
        assert_eq!(run.result(), Some(iv(0.0, 240.0)));
    }

    #[test]
    fn negative_multiplier_reorders_bounds() {
        let run = analyze_with(
            r#"
define double @f(double %t) {
entry:
  call void @llvm.dbg.value(double %t) !dbg("t", "Temp")
  %n = fmul double %t, -2.0
  ret double %n
}
"#,
            &[("Temp", 1.0, 3.0)],
            "f",
        );
        assert_eq!(run.result(), Some(iv(-6.0, -2.0)));
    }

    #[test]
    fn bitwise_on_negative_interval_bails_out() {
        let run = analyze_with(
            r#"
define i32 @f(i32 %x) {
entry:
  call void @llvm.dbg.value(i32 %x) !dbg("x", "Offset")
  %m = and i32 %x, 255
  ret i32 %m
}
"#,
            &[("Offset", -4.0, 4.0)],
            "f",
        );
        assert!(run.value("f", "m").is_none());
        assert!(run.has_code(codes::N0102));
    }

    #[test]
    fn integer_division_truncates() {
        let run = analyze_with(
            r#"
define i32 @f(i32 %x) {
entry:
  call void @llvm.dbg.value(i32 %x) !dbg("x", "Count")
  %q = sdiv i32 %x, 4
  %r = srem i32 %x, 4
  ret i32 %q
}
"#,
            &[("Count", 0.0, 10.0)],
            "f",
        );
        assert_eq!(run.value("f", "q"), Some(iv(0.0, 2.0)));
        assert_eq!(run.value("f", "r"), Some(iv(0.0, 3.0)));
    }

    #[test]
    fn sign_extension_is_exact_and_zext_of_negative_shifts() {
        let run = analyze_with(
            r#"
define i32 @f(i8 %x) {
entry:
  call void @llvm.dbg.value(i8 %x) !dbg("x", "Small")
  %s = sext i8 %x to i32
  %z = zext i8 %x to i32
  ret i32 %s
}
"#,
            &[("Small", -5.0, 5.0)],
            "f",
        );
        assert_eq!(run.value("f", "s"), Some(iv(-5.0, 5.0)));
        assert_eq!(run.value("f", "z"), Some(iv(0.0, 255.0)));
    }

    #[test]
    fn truncation_that_crosses_the_sign_boundary_is_flagged() {
        let run = analyze_with(
            r#"
define i8 @f(i32 %x) {
entry:
  call void @llvm.dbg.value(i32 %x) !dbg("x", "Wide")
  %t = trunc i32 %x to i8
  ret i8 %t
}
"#,
            &[("Wide", 100.0, 200.0)],
            "f",
        );
        assert_eq!(run.value("f", "t"), Some(iv(-56.0, 100.0)));
        let w = run
            .diagnostics
            .iter()
            .find(|d| d.code == Some(codes::W0201))
            .expect("W0201");
        assert_eq!(w.level, DiagLevel::Warning);
    }

    #[test]
    fn truncation_that_fits_is_exact() {
        let run = analyze_with(
            r#"
define i8 @f(i32 %x) {
entry:
  call void @llvm.dbg.value(i32 %x) !dbg("x", "Narrow")
  %t = trunc i32 %x to i8
  ret i8 %t
}
"#,
            &[("Narrow", -100.0, 100.0)],
            "f",
        );
        assert_eq!(run.result(), Some(iv(-100.0, 100.0)));
        assert!(!run.has_code(codes::W0201));
    }

    #[test]
    fn missing_operand_records_nothing() {
        let run = analyze(
            r#"
define i32 @f(i32 %x) {
entry:
  %y = add i32 %x, 1
  %z = mul i32 %y, 2
  ret i32 %z
}
"#,
            "f",
        );
        assert!(run.value("f", "y").is_none());
        assert!(run.value("f", "z").is_none());
        assert!(run.result().is_none());
        assert!(run.diagnostics.is_empty());
    }

    #[test]
    fn interprocedural_literal_and_ranged_arguments() {
        let src = r#"
define i32 @inc(i32 %x) {
entry:
  %r = add i32 %x, 1
  ret i32 %r
}

define i32 @main(i32 %v) {
entry:
  call void @llvm.dbg.value(i32 %v) !dbg("v", "Level")
  %a = call i32 @inc(i32 5)
  %b = call i32 @inc(i32 %v)
  %c = add i32 %a, %b
  ret i32 %c
}
"#;
        let run = analyze_with(src, &[("Level", 0.0, 10.0)], "main");
        assert_eq!(run.value("main", "a"), Some(iv(6.0, 6.0)));
        assert_eq!(run.value("main", "b"), Some(iv(1.0, 11.0)));
        assert_eq!(run.result(), Some(iv(7.0, 17.0)));
        // Callee-local entries are merged by hull across call sites.
        assert_eq!(run.value("inc", "r"), Some(iv(1.0, 11.0)));
        assert_eq!(run.bounds.callee_bounds().len(), 2);
        assert!(run.bounds.callee_bounds().contains_key("inc[5,5]"));
    }

    #[test]
    fn declared_return_range_mismatch_warns_and_keeps_inferred() {
        let src = r#"
define double @scale(double %x) !range("Ratio") {
entry:
  %r = fmul double %x, 3.0
  ret double %r
}

define double @main() {
entry:
  %a = call double @scale(double 1.0)
  ret double %a
}
"#;
        let run = analyze_with(src, &[("Ratio", 0.0, 1.0)], "main");
        assert_eq!(run.result(), Some(iv(3.0, 3.0)));
        assert!(run.has_code(codes::W0200));
    }

    #[test]
    fn recursion_is_cut_with_warning() {
        let src = r#"
define i32 @loop(i32 %n) {
entry:
  %r = call i32 @loop(i32 %n)
  ret i32 %r
}

define i32 @main() {
entry:
  %a = call i32 @loop(i32 3)
  ret i32 %a
}
"#;
        let run = analyze(src, "main");
        assert!(run.result().is_none());
        let w = run
            .diagnostics
            .iter()
            .find(|d| d.code == Some(codes::W0202))
            .expect("W0202");
        assert!(!w.cause_chain.is_empty());
    }

    #[test]
    fn visit_budget_stops_analysis() {
        let src = "define i32 @f() {\nentry:\n  %a = alloca i32\n  %b = alloca i32\n  ret i32 1\n}\n";
        let module = resolve(&parse(src).module.unwrap()).unwrap();
        let layout = DataLayout::default();
        let limits = AnalysisLimits {
            max_call_depth: 32,
            max_visits: 2,
        };
        let mut bounds = BoundInfo::default();
        let mut engine = RangeAnalyzer::new(&module, &layout, limits);
        assert!(engine.analyze_function(FuncId(0), &mut bounds).is_none());
        let diags = engine.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, Some(codes::W0203));
    }

    #[test]
    fn phi_hull_and_multiple_returns() {
        let src = r#"
define i32 @f(i1 %c) {
entry:
  br i1 %c, label %a, label %b
a:
  br label %join
b:
  br label %join
join:
  %p = phi i32 [3, %a], [9, %b]
  br i1 %c, label %x, label %y
x:
  ret i32 %p
y:
  ret i32 0
}
"#;
        let run = analyze(src, "f");
        assert_eq!(run.value("f", "p"), Some(iv(3.0, 9.0)));
        assert_eq!(run.result(), Some(iv(0.0, 9.0)));
    }

    #[test]
    fn constant_global_table_lookup() {
        let src = r#"
@table = constant [4 x double] [1.0, 4.0, 9.0, 16.0]

define double @f(i64 %i) {
entry:
  call void @llvm.dbg.value(i64 %i) !dbg("i", "Index")
  %p = getelementptr inbounds [4 x double], [4 x double]* @table, i64 0, i64 %i
  %v = load double, double* %p
  ret double %v
}
"#;
        let run = analyze_with(src, &[("Index", 1.0, 2.0)], "f");
        assert_eq!(run.result(), Some(iv(4.0, 9.0)));
    }

    #[test]
    fn struct_fields_share_slots() {
        let src = r#"
%struct.P = type { i32, double }

define double @f() {
entry:
  %s = alloca %struct.P
  %f1 = getelementptr %struct.P, %struct.P* %s, i32 0, i32 1
  store double 2.5, double* %f1
  %f2 = getelementptr %struct.P, %struct.P* %s, i32 0, i32 1
  %v = load double, double* %f2
  ret double %v
}
"#;
        let run = analyze(src, "f");
        assert_eq!(run.result(), Some(iv(2.5, 2.5)));
    }

    #[test]
    fn external_math_is_modeled() {
        let src = r#"
declare double @sqrt(double)
declare double @llvm.fabs.f64(double)
declare double @mystery(double)

define double @f(double %x) {
entry:
  call void @llvm.dbg.value(double %x) !dbg("x", "Signal")
  %s = call double @sqrt(double %x)
  %a = call double @llvm.fabs.f64(double %x)
  %m = call double @mystery(double %x)
  ret double %a
}
"#;
        let run = analyze_with(src, &[("Signal", -4.0, 9.0)], "f");
        assert_eq!(run.value("f", "s"), Some(iv(0.0, 3.0)));
        assert_eq!(run.value("f", "a"), Some(iv(0.0, 9.0)));
        assert!(run.value("f", "m").is_none());
        assert!(run.has_code(codes::N0103));
    }

    #[test]
    fn integer_add_wraps_into_a_contiguous_range() {
        let src = r#"
define i8 @f(i8 %x) {
entry:
  call void @llvm.dbg.value(i8 %x) !dbg("x", "Raw")
  %s = add i8 %x, 100
  %c = icmp slt i8 %s, 0
  ret i8 %s
}
"#;
        let run = analyze_with(src, &[("Raw", 100.0, 120.0)], "f");
        assert_eq!(run.value("f", "s"), Some(iv(-56.0, -36.0)));
        assert_eq!(run.value("f", "c"), Some(iv(1.0, 1.0)));
        assert!(!run.has_code(codes::N0104));
    }

    #[test]
    fn integer_add_straddling_the_wrap_point_is_unknown() {
        let src = r#"
define i8 @f(i8 %x) {
entry:
  call void @llvm.dbg.value(i8 %x) !dbg("x", "Raw")
  %s = add i8 %x, 100
  %c = icmp slt i8 %s, 0
  ret i8 %s
}
"#;
        let run = analyze_with(src, &[("Raw", 0.0, 120.0)], "f");
        assert!(run.value("f", "s").is_none());
        assert!(run.value("f", "c").is_none());
        assert!(run.has_code(codes::N0104));
    }

    #[test]
    fn diverging_stores_meet_as_a_hull() {
        let src = r#"
define i32 @f(i1 %c) {
entry:
  %a = alloca i32
  br i1 %c, label %l, label %r
l:
  store i32 1, i32* %a
  br label %join
r:
  store i32 2, i32* %a
  br label %join
join:
  %v = load i32, i32* %a
  ret i32 %v
}
"#;
        let run = analyze(src, "f");
        assert_eq!(run.result(), Some(iv(1.0, 2.0)));
    }

    #[test]
    fn loop_carried_slot_is_unknown_in_and_after_the_loop() {
        let src = r#"
define i32 @f() {
entry:
  %i = alloca i32
  store i32 0, i32* %i
  br label %loop
loop:
  %v = load i32, i32* %i
  %n = add i32 %v, 1
  store i32 %n, i32* %i
  %c = icmp slt i32 %n, 10
  br i1 %c, label %loop, label %exit
exit:
  %r = load i32, i32* %i
  ret i32 %r
}
"#;
        let run = analyze(src, "f");
        assert!(run.value("f", "v").is_none());
        assert!(run.value("f", "n").is_none());
        assert!(run.value("f", "c").is_none());
        assert!(run.value("f", "r").is_none());
    }

    #[test]
    fn slot_untouched_by_a_loop_keeps_its_bound() {
        let src = r#"
define double @f(double %speed, i32 %k) {
entry:
  %s = alloca double
  store double %speed, double* %s
  call void @llvm.dbg.declare(double* %s) !dbg("speed", "Speed")
  %i = alloca i32
  store i32 %k, i32* %i
  br label %loop
loop:
  %v = load double, double* %s
  %j = load i32, i32* %i
  %n = add i32 %j, 1
  store i32 %n, i32* %i
  %c = icmp slt i32 %n, 10
  br i1 %c, label %loop, label %exit
exit:
  ret double %v
}
"#;
        let run = analyze_with(src, &[("Speed", 0.0, 120.0)], "f");
        assert_eq!(run.value("f", "v"), Some(iv(0.0, 120.0)));
        assert!(run.value("f", "j").is_none());
    }

    #[test]
    fn store_at_unknown_index_forgets_sibling_elements() {
        let src = r#"
define i32 @f(i64 %i) {
entry:
  %arr = alloca [2 x i32]
  %p0 = getelementptr [2 x i32], [2 x i32]* %arr, i64 0, i64 0
  store i32 7, i32* %p0
  %pi = getelementptr [2 x i32], [2 x i32]* %arr, i64 0, i64 %i
  store i32 9, i32* %pi
  %v = load i32, i32* %p0
  ret i32 %v
}
"#;
        let run = analyze(src, "f");
        assert!(run.result().is_none());
    }

    #[test]
    fn callee_store_to_mutable_global_is_seen_by_caller() {
        let src = r#"
@g = global i32 0

define void @set() {
entry:
  store i32 5, i32* @g
  ret void
}

define i1 @main() {
entry:
  store i32 1, i32* @g
  call void @set()
  %v = load i32, i32* @g
  %c = icmp eq i32 %v, 5
  ret i1 %c
}
"#;
        let run = analyze(src, "main");
        assert_eq!(run.value("main", "v"), Some(iv(5.0, 5.0)));
        assert_eq!(run.result(), Some(iv(1.0, 1.0)));
    }

    #[test]
    fn summaries_are_keyed_by_module_level_state() {
        let src = r#"
@g = global i32 0

define i32 @get() {
entry:
  %v = load i32, i32* @g
  ret i32 %v
}

define i1 @main() {
entry:
  store i32 1, i32* @g
  %a = call i32 @get()
  store i32 2, i32* @g
  %b = call i32 @get()
  %c = icmp eq i32 %b, 2
  ret i1 %c
}
"#;
        let run = analyze(src, "main");
        assert_eq!(run.value("main", "a"), Some(iv(1.0, 1.0)));
        assert_eq!(run.value("main", "b"), Some(iv(2.0, 2.0)));
        assert_eq!(run.result(), Some(iv(1.0, 1.0)));
    }

    #[test]
    fn opaque_call_forgets_mutable_globals_and_pointed_memory() {
        let src = r#"
@g = global i32 0

declare void @touch(i32*)

define i32 @main() {
entry:
  %a = alloca i32
  %b = alloca i32
  store i32 1, i32* @g
  store i32 2, i32* %a
  store i32 3, i32* %b
  call void @touch(i32* %a)
  %x = load i32, i32* @g
  %y = load i32, i32* %a
  %z = load i32, i32* %b
  ret i32 %z
}
"#;
        let run = analyze(src, "main");
        assert!(run.value("main", "x").is_none());
        assert!(run.value("main", "y").is_none());
        assert_eq!(run.value("main", "z"), Some(iv(3.0, 3.0)));
    }

    #[test]
    fn math_names_normalize() {
        assert_eq!(math_name("llvm.floor.f32"), Some("floor"));
        assert_eq!(math_name("sqrtf"), Some("sqrt"));
        assert_eq!(math_name("printf"), None);
    }
}
