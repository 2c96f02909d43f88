// bounds.rs — The interval store for one analysis scope
//
// Maps value identities to intervals. Entries are keyed by `ValueKey`, so
// callee-local entries merged from a call site can never collide with the
// caller's own values. The seed table (physical-quantity name → declared
// interval) is shared read-only between a scope and its children.
//
// Preconditions: none.
// Postconditions: at most one interval per key; `insert` overwrites.
// Failure modes: none.
// Side effects: none.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde::Serialize;

use crate::id::{FuncId, GlobalId, Local, ValueKey};
use crate::interval::Interval;
use crate::ir::{Module, Operand};

/// Physical-quantity name → declared interval.
pub type SeedTable = BTreeMap<String, Interval>;

#[derive(Debug, Clone, Default)]
pub struct BoundInfo {
    ranges: HashMap<ValueKey, Interval>,
    /// Per-element intervals of constant aggregate globals.
    element_ranges: HashMap<ValueKey, Vec<Interval>>,
    seeds: Rc<SeedTable>,
    /// Call-site summaries, keyed by `callee[lo,hi;...]`.
    callee_bounds: BTreeMap<String, BoundInfo>,
}

impl BoundInfo {
    pub fn new(seeds: Rc<SeedTable>) -> Self {
        BoundInfo {
            seeds,
            ..BoundInfo::default()
        }
    }

    pub fn get(&self, key: &ValueKey) -> Option<Interval> {
        self.ranges.get(key).copied()
    }

    pub fn insert(&mut self, key: ValueKey, interval: Interval) {
        self.ranges.insert(key, interval);
    }

    pub fn remove(&mut self, key: &ValueKey) -> Option<Interval> {
        self.ranges.remove(key)
    }

    pub fn contains(&self, key: &ValueKey) -> bool {
        self.ranges.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ValueKey, &Interval)> {
        self.ranges.iter()
    }

    /// Interval of an operand used in `func`. Literals are singletons.
    pub fn operand(&self, func: FuncId, op: &Operand) -> Option<Interval> {
        match op {
            Operand::Const(c) => Some(Interval::singleton(c.value())),
            _ => self.get(&key_of(func, op)?),
        }
    }

    pub fn seed(&self, name: &str) -> Option<Interval> {
        self.seeds.get(name).copied()
    }

    pub fn seeds(&self) -> &Rc<SeedTable> {
        &self.seeds
    }

    pub fn elements(&self, key: &ValueKey) -> Option<&[Interval]> {
        self.element_ranges.get(key).map(Vec::as_slice)
    }

    pub fn insert_elements(&mut self, key: ValueKey, elements: Vec<Interval>) {
        self.element_ranges.insert(key, elements);
    }

    /// A fresh scope for analyzing a callee: same seeds, same module-level
    /// entries, no function-local entries.
    pub fn child(&self) -> BoundInfo {
        BoundInfo {
            ranges: self
                .ranges
                .iter()
                .filter(|(k, _)| matches!(k, ValueKey::Global(_)))
                .map(|(k, v)| (*k, *v))
                .collect(),
            element_ranges: self.element_ranges.clone(),
            seeds: Rc::clone(&self.seeds),
            callee_bounds: BTreeMap::new(),
        }
    }

    /// Splice a callee scope back into this one. Module-level entries take
    /// the callee's final state, including entries it dropped. Local keys
    /// already present take the hull, so repeated call sites summarize every
    /// binding seen.
    pub fn merge_child(&mut self, child: &BoundInfo) {
        self.ranges
            .retain(|key, _| !matches!(key, ValueKey::Global(_)) || child.ranges.contains_key(key));
        for (key, iv) in &child.ranges {
            match key {
                ValueKey::Global(_) => {
                    self.ranges.insert(*key, *iv);
                }
                ValueKey::Local(..) => {
                    self.ranges
                        .entry(*key)
                        .and_modify(|existing| *existing = existing.hull(iv))
                        .or_insert(*iv);
                }
            }
        }
        for (name, nested) in &child.callee_bounds {
            self.callee_bounds
                .entry(name.clone())
                .or_insert_with(|| nested.clone());
        }
    }

    /// Module-level entries as exact bit patterns, sorted by global.
    pub fn global_signature(&self) -> Vec<(GlobalId, u64, u64)> {
        let mut sig: Vec<(GlobalId, u64, u64)> = self
            .ranges
            .iter()
            .filter_map(|(key, iv)| match key {
                ValueKey::Global(g) => Some((*g, iv.lo.to_bits(), iv.hi.to_bits())),
                ValueKey::Local(..) => None,
            })
            .collect();
        sig.sort_unstable();
        sig
    }

    pub fn record_callee(&mut self, site: String, child: BoundInfo) {
        self.callee_bounds.insert(site, child);
    }

    pub fn callee_bounds(&self) -> &BTreeMap<String, BoundInfo> {
        &self.callee_bounds
    }

    /// Printable entries, sorted by name. Function-local values are written
    /// `@func:%value`, globals `@name`.
    pub fn report(&self, module: &Module) -> BTreeMap<String, ReportInterval> {
        self.ranges
            .iter()
            .map(|(k, iv)| (describe(module, k), ReportInterval::from(*iv)))
            .collect()
    }
}

/// Bound-table key of an operand used in `func`. Literals and `undef` have
/// no key.
pub fn key_of(func: FuncId, op: &Operand) -> Option<ValueKey> {
    match op {
        Operand::Inst(id) => Some(ValueKey::inst(func, *id)),
        Operand::Arg(i) => Some(ValueKey::arg(func, *i)),
        Operand::Global(g) => Some(ValueKey::Global(*g)),
        Operand::Const(_) | Operand::Undef => None,
    }
}

/// Human-readable name of a value key.
pub fn describe(module: &Module, key: &ValueKey) -> String {
    match key {
        ValueKey::Global(g) => format!("@{}", module.global(*g).name),
        ValueKey::Local(f, local) => {
            let func = module.func(*f);
            let op = match local {
                Local::Inst(id) => Operand::Inst(*id),
                Local::Arg(i) => Operand::Arg(*i),
            };
            format!("@{}:{}", func.name, func.value_name(&op))
        }
    }
}

/// Serialized interval. Infinite endpoints become `null` in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportInterval {
    pub lo: Option<f64>,
    pub hi: Option<f64>,
}

impl From<Interval> for ReportInterval {
    fn from(iv: Interval) -> Self {
        let finite = |v: f64| if v.is_finite() { Some(v) } else { None };
        ReportInterval {
            lo: finite(iv.lo),
            hi: finite(iv.hi),
        }
    }
}
