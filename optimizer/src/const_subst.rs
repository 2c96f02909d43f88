// const_subst.rs — Constant substitution
//
// Replaces arithmetic results with a singleton interval by a literal and
// erases the producer. Only binary arithmetic is rewritten; casts, loads and
// calls keep their instructions even when their bound is a single value.
//
// Preconditions: `bounds` was produced by range analysis of this function.
// Postconditions: no live binary instruction has a singleton bound that is
//   representable in its result type.
// Failure modes: none (unrepresentable values are left in place).
// Side effects: mutates the function in place.

use tracing::debug;

use crate::bounds::BoundInfo;
use crate::id::{FuncId, ValueKey};
use crate::ir::{Constant, Function, InstKind, Operand};

/// Substitute singleton arithmetic results in `func`. Returns the number of
/// instructions removed.
pub fn substitute_constants(id: FuncId, func: &mut Function, bounds: &BoundInfo) -> usize {
    let mut removed = 0;
    for inst_id in func.layout() {
        let inst = func.inst(inst_id);
        if inst.erased || !matches!(inst.kind, InstKind::Binary { .. }) {
            continue;
        }
        let Some(iv) = bounds.get(&ValueKey::inst(id, inst_id)) else {
            continue;
        };
        if !iv.is_singleton() {
            continue;
        }
        let Some(literal) = Constant::for_type(&inst.ty, iv.lo) else {
            continue;
        };
        debug!(
            function = %func.name,
            value = %func.value_name(&Operand::Inst(inst_id)),
            literal = %literal,
            "substituted constant"
        );
        // Uses first, then the producer.
        func.replace_all_uses(inst_id, Operand::Const(literal));
        func.erase(inst_id);
        removed += 1;
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use crate::parser::parse;
    use crate::resolve::resolve;
    use crate::id::InstId;

    const SRC: &str = r#"
define i32 @f(i32 %x) {
entry:
  %a = add i32 %x, 1
  %b = mul i32 %a, 2
  %c = sext i32 %b to i64
  ret i32 %b
}
"#;

    fn function() -> Function {
        let module = resolve(&parse(SRC).module.unwrap()).unwrap();
        module.functions[0].clone()
    }

    fn key(i: u32) -> ValueKey {
        ValueKey::inst(FuncId(0), InstId(i))
    }

    #[test]
    fn singleton_producer_is_replaced_and_erased() {
        let mut func = function();
        let mut bounds = BoundInfo::default();
        bounds.insert(key(0), Interval::ordered(3.0, 9.0));
        bounds.insert(key(1), Interval::singleton(7.0));
        assert_eq!(substitute_constants(FuncId(0), &mut func, &bounds), 1);

        assert!(func.inst(InstId(1)).erased);
        assert!(!func.layout().contains(&InstId(1)));
        match &func.inst(InstId(3)).kind {
            InstKind::Ret {
                value: Some((_, op)),
            } => assert_eq!(*op, Operand::Const(Constant::Int(7))),
            other => panic!("expected ret, got {:?}", other),
        }
        assert!(func.users(InstId(1)).is_empty());
    }

    #[test]
    fn casts_and_wide_intervals_are_untouched() {
        let mut func = function();
        let mut bounds = BoundInfo::default();
        bounds.insert(key(0), Interval::ordered(3.0, 9.0));
        bounds.insert(key(2), Interval::singleton(4.0));
        assert_eq!(substitute_constants(FuncId(0), &mut func, &bounds), 0);
        assert_eq!(func.layout().len(), 4);
    }

    #[test]
    fn fractional_singleton_in_integer_type_is_kept() {
        let mut func = function();
        let mut bounds = BoundInfo::default();
        bounds.insert(key(0), Interval::singleton(2.5));
        assert_eq!(substitute_constants(FuncId(0), &mut func, &bounds), 0);
    }
}
