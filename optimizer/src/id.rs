// id.rs — Stable arena identifiers for module entities
//
// Values are arena entries addressed by integer index. Bound tables and the
// union-alias table key on `ValueKey`, which carries the owning function, so
// entries merged from a callee can never collide with a caller's locals.

use serde::Serialize;

/// Index of a defined function within `Module::functions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FuncId(pub u32);

/// Index of an instruction within its function's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InstId(pub u32);

/// Index of a basic block within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BlockId(pub u32);

/// Index of a global within `Module::globals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GlobalId(pub u32);

impl FuncId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl InstId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl GlobalId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A function-local value: an instruction result or a formal argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Local {
    Inst(InstId),
    Arg(u32),
}

/// Identity of any value that can carry an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ValueKey {
    Local(FuncId, Local),
    Global(GlobalId),
}

impl ValueKey {
    pub fn inst(func: FuncId, inst: InstId) -> Self {
        ValueKey::Local(func, Local::Inst(inst))
    }

    pub fn arg(func: FuncId, index: u32) -> Self {
        ValueKey::Local(func, Local::Arg(index))
    }

    /// The function owning this key, if it is function-local.
    pub fn func(&self) -> Option<FuncId> {
        match self {
            ValueKey::Local(f, _) => Some(*f),
            ValueKey::Global(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_from_different_functions_are_distinct() {
        let a = ValueKey::inst(FuncId(0), InstId(3));
        let b = ValueKey::inst(FuncId(1), InstId(3));
        assert_ne!(a, b);
        assert_eq!(a.func(), Some(FuncId(0)));
        assert_eq!(ValueKey::Global(GlobalId(0)).func(), None);
    }

    #[test]
    fn arg_and_inst_keys_differ() {
        assert_ne!(ValueKey::arg(FuncId(0), 0), ValueKey::inst(FuncId(0), InstId(0)));
    }
}
