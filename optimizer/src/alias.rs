// alias.rs — Per-address union state for type-punned memory
//
// Tracks addresses that are viewed through more than one type (`bitcast`
// of a pointer) and the last typed write into each such address. Every
// view and every derived field address resolves to a root address plus a
// bit offset. A read through any of them is answered from the root's state
// by bit-pattern reinterpretation, and fails closed when the last write does
// not cover the bits being read.
//
// Field addresses of ordinary aggregates are also canonicalized here, so two
// `getelementptr`s naming the same field share one slot in the bound table.
//
// Preconditions: keys come from a single function scope.
// Postconditions: `read` never returns an interval for bits that were not
//   written by the most recent typed write.
// Failure modes: unsupported kinds or uncovered lanes read as unknown.
// Side effects: none.

use std::collections::HashMap;

use crate::id::ValueKey;
use crate::interval::Interval;
use crate::reinterpret::{extract_lane, ScalarKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnionState {
    Untyped,
    TypedAs {
        kind: ScalarKind,
        bit_offset: u64,
        interval: Interval,
    },
}

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    /// Address → (root address, bit offset inside the root).
    roots: HashMap<ValueKey, (ValueKey, u64)>,
    /// Roots that are viewed through more than one type.
    states: HashMap<ValueKey, UnionState>,
    /// First address registered for each (root, offset) field slot.
    slots: HashMap<(ValueKey, u64), ValueKey>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root address and bit offset of `addr`.
    pub fn locate(&self, addr: ValueKey) -> (ValueKey, u64) {
        self.roots.get(&addr).copied().unwrap_or((addr, 0))
    }

    /// Record `view` as a reinterpreting view of `target`. The root becomes
    /// a union address on its first view.
    pub fn register_view(&mut self, view: ValueKey, target: ValueKey) {
        let (root, offset) = self.locate(target);
        self.roots.insert(view, (root, offset));
        self.states.entry(root).or_insert(UnionState::Untyped);
    }

    /// Record `field` as the address `bit_offset` bits into `base`. Returns
    /// the canonical key for that slot; offset zero is the root itself.
    pub fn register_field(&mut self, field: ValueKey, base: ValueKey, bit_offset: u64) -> ValueKey {
        let (root, offset) = self.locate(base);
        let at = offset + bit_offset;
        self.roots.insert(field, (root, at));
        let first = if at == 0 { root } else { field };
        *self.slots.entry((root, at)).or_insert(first)
    }

    /// Canonical bound-table key for an address.
    pub fn slot(&self, addr: ValueKey) -> ValueKey {
        match self.roots.get(&addr) {
            Some(location) => self.slots.get(location).copied().unwrap_or(addr),
            None => addr,
        }
    }

    pub fn is_union(&self, addr: ValueKey) -> bool {
        let (root, _) = self.locate(addr);
        self.states.contains_key(&root)
    }

    pub fn state(&self, addr: ValueKey) -> Option<UnionState> {
        let (root, _) = self.locate(addr);
        self.states.get(&root).copied()
    }

    /// Transition on a write through `addr`. An untyped or unknown write
    /// resets the union to `Untyped`.
    pub fn record_write(&mut self, addr: ValueKey, kind: Option<ScalarKind>, interval: Option<Interval>) {
        let (root, bit_offset) = self.locate(addr);
        if let Some(state) = self.states.get_mut(&root) {
            *state = match (kind, interval) {
                (Some(kind), Some(interval)) => UnionState::TypedAs {
                    kind,
                    bit_offset,
                    interval,
                },
                _ => UnionState::Untyped,
            };
        }
    }

    pub fn invalidate(&mut self, addr: ValueKey) {
        self.record_write(addr, None, None);
    }

    pub fn invalidate_all(&mut self) {
        for state in self.states.values_mut() {
            *state = UnionState::Untyped;
        }
    }

    /// Whether `addr` was registered as a view or a constant-offset field.
    pub fn is_registered(&self, addr: ValueKey) -> bool {
        self.roots.contains_key(&addr)
    }

    /// Current state of every union root.
    pub fn unions(&self) -> HashMap<ValueKey, UnionState> {
        self.states.clone()
    }

    /// Reset each union root to its state in `saved`; roots missing from
    /// `saved` become `Untyped`.
    pub fn restore_unions(&mut self, saved: &HashMap<ValueKey, UnionState>) {
        for (root, state) in self.states.iter_mut() {
            *state = saved.get(root).copied().unwrap_or(UnionState::Untyped);
        }
    }

    /// Read a `kind` value through `addr` from the root's last typed write.
    pub fn read(&self, addr: ValueKey, kind: ScalarKind) -> Option<Interval> {
        let (root, read_at) = self.locate(addr);
        match self.states.get(&root)? {
            UnionState::Untyped => None,
            UnionState::TypedAs {
                kind: written,
                bit_offset,
                interval,
            } => {
                let rel = read_at.checked_sub(*bit_offset)?;
                if *written == kind && rel == 0 {
                    return Some(*interval);
                }
                extract_lane(*interval, *written, u32::try_from(rel).ok()?, kind)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{FuncId, InstId};

    fn key(i: u32) -> ValueKey {
        ValueKey::inst(FuncId(0), InstId(i))
    }

    #[test]
    fn same_type_read_is_exact() {
        let mut t = AliasTable::new();
        t.register_view(key(1), key(0));
        t.record_write(key(1), Some(ScalarKind::F64), Some(Interval::ordered(1.5, 2.5)));
        t.register_view(key(2), key(0));
        assert_eq!(t.read(key(2), ScalarKind::F64), Some(Interval::ordered(1.5, 2.5)));
    }

    #[test]
    fn lane_read_decomposes_double() {
        let mut t = AliasTable::new();
        t.register_view(key(1), key(0));
        t.record_write(key(1), Some(ScalarKind::F64), Some(Interval::singleton(1.0)));
        t.register_view(key(2), key(0));
        t.register_field(key(3), key(2), 32);
        assert_eq!(t.read(key(2), ScalarKind::I32), Some(Interval::singleton(0.0)));
        assert_eq!(
            t.read(key(3), ScalarKind::I32),
            Some(Interval::singleton(0x3FF0_0000 as f64))
        );
    }

    #[test]
    fn uncovered_read_fails_closed() {
        let mut t = AliasTable::new();
        t.register_view(key(1), key(0));
        t.register_field(key(2), key(1), 32);
        t.record_write(key(2), Some(ScalarKind::I32), Some(Interval::singleton(7.0)));
        assert!(t.read(key(1), ScalarKind::F64).is_none());
        assert!(t.read(key(1), ScalarKind::I32).is_none());
        assert_eq!(t.read(key(2), ScalarKind::I32), Some(Interval::singleton(7.0)));
    }

    #[test]
    fn unknown_write_resets_state() {
        let mut t = AliasTable::new();
        t.register_view(key(1), key(0));
        t.record_write(key(1), Some(ScalarKind::I32), Some(Interval::singleton(3.0)));
        t.invalidate(key(1));
        assert_eq!(t.state(key(0)), Some(UnionState::Untyped));
        assert!(t.read(key(1), ScalarKind::I32).is_none());
    }

    #[test]
    fn restored_unions_drop_roots_missing_from_the_snapshot() {
        let mut t = AliasTable::new();
        t.register_view(key(1), key(0));
        t.record_write(key(1), Some(ScalarKind::F64), Some(Interval::ordered(0.5, 2.0)));
        let saved = t.unions();
        t.register_view(key(3), key(2));
        t.record_write(key(3), Some(ScalarKind::I32), Some(Interval::singleton(4.0)));
        t.invalidate(key(1));

        t.restore_unions(&saved);
        assert_eq!(t.read(key(1), ScalarKind::F64), Some(Interval::ordered(0.5, 2.0)));
        assert_eq!(t.state(key(2)), Some(UnionState::Untyped));
        assert!(t.is_registered(key(3)));
        assert!(!t.is_registered(key(0)));
    }

    #[test]
    fn fields_share_a_slot() {
        let mut t = AliasTable::new();
        let first = t.register_field(key(1), key(0), 64);
        let second = t.register_field(key(2), key(0), 64);
        assert_eq!(first, key(1));
        assert_eq!(second, key(1));
        assert_eq!(t.slot(key(2)), key(1));
        assert!(!t.is_union(key(2)));
    }

    #[test]
    fn offset_zero_field_is_the_base() {
        let mut t = AliasTable::new();
        assert_eq!(t.register_field(key(5), key(4), 0), key(4));
        assert_eq!(t.slot(key(5)), key(4));
    }
}
