// align.rs — Memory alignment correction
//
// Overwrites the alignment of memory instructions with the ABI alignment of
// the accessed type:
//
//   store   always, against the stored value's type
//   load    only when it has a bound and debug metadata
//   alloca  struct allocations only; arrays and scalars keep theirs
//
// Preconditions: `layout` describes the module's target.
// Postconditions: every instruction selected above carries its ABI alignment.
// Failure modes: none.
// Side effects: mutates the function in place.

use serde::Serialize;
use tracing::trace;

use crate::bounds::BoundInfo;
use crate::id::{FuncId, InstId, ValueKey};
use crate::ir::{Function, InstKind, Type};
use crate::layout::DataLayout;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlignStats {
    pub stores: usize,
    pub loads: usize,
    pub allocas: usize,
}

impl AlignStats {
    pub fn total(&self) -> usize {
        self.stores + self.loads + self.allocas
    }
}

pub fn correct_alignment(
    id: FuncId,
    func: &mut Function,
    bounds: &BoundInfo,
    layout: &DataLayout,
) -> AlignStats {
    let mut stats = AlignStats::default();
    for inst_id in func.layout() {
        let inst = func.inst(inst_id);
        let (current, ty) = match &inst.kind {
            InstKind::Store {
                value_ty, align, ..
            } => (*align, value_ty),
            InstKind::Load { align, .. }
                if inst.dbg.is_some() && bounds.contains(&ValueKey::inst(id, inst_id)) =>
            {
                (*align, &inst.ty)
            }
            InstKind::Alloca { allocated, align } if matches!(allocated, Type::Struct(_)) => {
                (*align, allocated)
            }
            _ => continue,
        };
        let required = layout.abi_align(ty);
        if current == Some(required) {
            continue;
        }
        let counter = match inst.kind {
            InstKind::Store { .. } => &mut stats.stores,
            InstKind::Load { .. } => &mut stats.loads,
            _ => &mut stats.allocas,
        };
        *counter += 1;
        log_change(func, inst_id, current, required);
        func.set_align(inst_id, required);
    }
    stats
}

fn log_change(func: &Function, id: InstId, from: Option<u32>, to: u32) {
    trace!(
        function = %func.name,
        inst = id.0,
        from = ?from,
        to,
        "alignment corrected"
    );
}
