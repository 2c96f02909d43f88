// cfg_simplify.rs — Control-flow simplification by range
//
// Folds compares whose outcome is fixed by the operand intervals, turns
// conditional branches on literals into unconditional ones, and removes the
// blocks that become unreachable from the entry.
//
// Preconditions: `bounds` was produced by range analysis of this function.
// Postconditions: no live compare is decided by its operand intervals; every
//   remaining block is reachable from the entry block; phi incomings name
//   only actual predecessors.
// Failure modes: none (undecided compares are left alone).
// Side effects: mutates the function in place.

use serde::Serialize;
use tracing::debug;

use crate::bounds::BoundInfo;
use crate::id::{BlockId, FuncId, InstId};
use crate::interval::Interval;
use crate::ir::{Constant, FloatPred, Function, InstKind, IntPred, Operand};

// ── Predicate decisions ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Depends,
    AlwaysTrue,
    AlwaysFalse,
}

impl Decision {
    fn from_bounds(always: bool, never: bool) -> Decision {
        if always {
            Decision::AlwaysTrue
        } else if never {
            Decision::AlwaysFalse
        } else {
            Decision::Depends
        }
    }

    /// Interval of the `i1` result.
    pub fn interval(self) -> Interval {
        match self {
            Decision::AlwaysTrue => Interval::singleton(1.0),
            Decision::AlwaysFalse => Interval::singleton(0.0),
            Decision::Depends => Interval::ordered(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Order {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn decide_order(order: Order, a: &Interval, b: &Interval) -> Decision {
    match order {
        Order::Eq => Decision::from_bounds(
            a.is_singleton() && b.is_singleton() && a.lo == b.lo,
            a.hi < b.lo || b.hi < a.lo,
        ),
        Order::Ne => Decision::from_bounds(
            a.hi < b.lo || b.hi < a.lo,
            a.is_singleton() && b.is_singleton() && a.lo == b.lo,
        ),
        Order::Lt => Decision::from_bounds(a.hi < b.lo, a.lo >= b.hi),
        Order::Le => Decision::from_bounds(a.hi <= b.lo, a.lo > b.hi),
        Order::Gt => Decision::from_bounds(a.lo > b.hi, a.hi <= b.lo),
        Order::Ge => Decision::from_bounds(a.lo >= b.hi, a.hi < b.lo),
    }
}

/// Outcome of `icmp pred a, b`. Unsigned predicates are decided only when
/// both intervals are non-negative.
pub fn decide_int(pred: IntPred, a: &Interval, b: &Interval) -> Decision {
    let unsigned = matches!(
        pred,
        IntPred::Ugt | IntPred::Uge | IntPred::Ult | IntPred::Ule
    );
    if unsigned && !(a.is_non_negative() && b.is_non_negative()) {
        return Decision::Depends;
    }
    let order = match pred {
        IntPred::Eq => Order::Eq,
        IntPred::Ne => Order::Ne,
        IntPred::Ult | IntPred::Slt => Order::Lt,
        IntPred::Ule | IntPred::Sle => Order::Le,
        IntPred::Ugt | IntPred::Sgt => Order::Gt,
        IntPred::Uge | IntPred::Sge => Order::Ge,
    };
    decide_order(order, a, b)
}

/// Outcome of `fcmp pred a, b`. Intervals never contain NaN, so ordered and
/// unordered variants agree; `ord` and `uno` stay undecided.
pub fn decide_float(pred: FloatPred, a: &Interval, b: &Interval) -> Decision {
    let order = match pred {
        FloatPred::True => return Decision::AlwaysTrue,
        FloatPred::False => return Decision::AlwaysFalse,
        FloatPred::Ord | FloatPred::Uno => return Decision::Depends,
        FloatPred::Oeq | FloatPred::Ueq => Order::Eq,
        FloatPred::One | FloatPred::Une => Order::Ne,
        FloatPred::Olt | FloatPred::Ult => Order::Lt,
        FloatPred::Ole | FloatPred::Ule => Order::Le,
        FloatPred::Ogt | FloatPred::Ugt => Order::Gt,
        FloatPred::Oge | FloatPred::Uge => Order::Ge,
    };
    decide_order(order, a, b)
}

/// Predicate with the operands exchanged: `a < b` ⇔ `b > a`.
pub fn mirror_int(pred: IntPred) -> IntPred {
    match pred {
        IntPred::Eq | IntPred::Ne => pred,
        IntPred::Ugt => IntPred::Ult,
        IntPred::Uge => IntPred::Ule,
        IntPred::Ult => IntPred::Ugt,
        IntPred::Ule => IntPred::Uge,
        IntPred::Sgt => IntPred::Slt,
        IntPred::Sge => IntPred::Sle,
        IntPred::Slt => IntPred::Sgt,
        IntPred::Sle => IntPred::Sge,
    }
}

pub fn mirror_float(pred: FloatPred) -> FloatPred {
    match pred {
        FloatPred::Ogt => FloatPred::Olt,
        FloatPred::Oge => FloatPred::Ole,
        FloatPred::Olt => FloatPred::Ogt,
        FloatPred::Ole => FloatPred::Oge,
        FloatPred::Ugt => FloatPred::Ult,
        FloatPred::Uge => FloatPred::Ule,
        FloatPred::Ult => FloatPred::Ugt,
        FloatPred::Ule => FloatPred::Uge,
        other => other,
    }
}

// ── Rewriting ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CfgStats {
    pub folded_compares: usize,
    pub folded_branches: usize,
    pub removed_blocks: usize,
    pub collapsed_phis: usize,
}

pub fn simplify_control_flow(id: FuncId, func: &mut Function, bounds: &BoundInfo) -> CfgStats {
    let mut stats = CfgStats::default();

    for inst_id in func.layout() {
        normalize_compare(func, inst_id);
        let decision = match &func.inst(inst_id).kind {
            InstKind::ICmp { pred, lhs, rhs, .. } => {
                match (bounds.operand(id, lhs), bounds.operand(id, rhs)) {
                    (Some(a), Some(b)) => decide_int(*pred, &a, &b),
                    _ => continue,
                }
            }
            InstKind::FCmp { pred, lhs, rhs, .. } => {
                match (pred, bounds.operand(id, lhs), bounds.operand(id, rhs)) {
                    (FloatPred::True, ..) => Decision::AlwaysTrue,
                    (FloatPred::False, ..) => Decision::AlwaysFalse,
                    (_, Some(a), Some(b)) => decide_float(*pred, &a, &b),
                    _ => continue,
                }
            }
            _ => continue,
        };
        let value = match decision {
            Decision::AlwaysTrue => true,
            Decision::AlwaysFalse => false,
            Decision::Depends => continue,
        };
        debug!(
            function = %func.name,
            value = %func.value_name(&Operand::Inst(inst_id)),
            outcome = value,
            "compare folded"
        );
        func.replace_all_uses(inst_id, Operand::Const(Constant::Bool(value)));
        func.erase(inst_id);
        stats.folded_compares += 1;
    }

    for b in 0..func.blocks.len() {
        let Some(term) = func.terminator(BlockId(b as u32)) else {
            continue;
        };
        let target = match &func.inst(term).kind {
            InstKind::CondBr {
                cond: Operand::Const(c),
                then_bb,
                else_bb,
            } => {
                if c.value() != 0.0 {
                    *then_bb
                } else {
                    *else_bb
                }
            }
            InstKind::CondBr {
                then_bb, else_bb, ..
            } if then_bb == else_bb => *then_bb,
            _ => continue,
        };
        func.inst_mut(term).kind = InstKind::Br { target };
        stats.folded_branches += 1;
    }

    drop_stale_incomings(func);

    let keep = func.reachable(None);
    stats.removed_blocks = keep.iter().filter(|k| !**k).count();
    if stats.removed_blocks > 0 {
        func.retain_blocks(&keep);
    }

    stats.collapsed_phis = collapse_single_phis(func);
    stats
}

/// Put a literal left operand on the right, mirroring the predicate.
fn normalize_compare(func: &mut Function, id: InstId) {
    match &mut func.inst_mut(id).kind {
        InstKind::ICmp { pred, lhs, rhs, .. } if lhs.is_literal() && !rhs.is_literal() => {
            std::mem::swap(lhs, rhs);
            *pred = mirror_int(*pred);
        }
        InstKind::FCmp { pred, lhs, rhs, .. } if lhs.is_literal() && !rhs.is_literal() => {
            std::mem::swap(lhs, rhs);
            *pred = mirror_float(*pred);
        }
        _ => {}
    }
}

fn drop_stale_incomings(func: &mut Function) {
    let preds = func.predecessors();
    for id in func.layout() {
        let block = func.inst(id).block;
        if let InstKind::Phi { incoming } = &mut func.inst_mut(id).kind {
            incoming.retain(|(_, from)| preds[block.index()].contains(from));
        }
    }
}

/// Replace phis left with a single incoming by that value.
fn collapse_single_phis(func: &mut Function) -> usize {
    let mut count = 0;
    for id in func.layout() {
        let value = match &func.inst(id).kind {
            InstKind::Phi { incoming } if incoming.len() == 1 => incoming[0].0,
            _ => continue,
        };
        if value.as_inst() == Some(id) {
            continue;
        }
        func.replace_all_uses(id, value);
        func.erase(id);
        count += 1;
    }
    count
}
