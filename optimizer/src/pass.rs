// pass.rs — Pass descriptor module: metadata, dependency resolution, artifact IDs
//
// Declares the optimizer's 4 passes (parse and resolve happen before the
// runner), their dependency edges, and the artifacts they produce. Used by
// the pipeline to turn a `--pass` selection into an execution order.

use std::collections::HashSet;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each optimizer pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    RangeAnalysis,
    SimplifyControlFlow,
    ConstantSubstitution,
    MemoryAlignment,
}

/// Machine-readable artifact identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Bounds,         // BoundInfo per function
    FoldedBranches, // CfgStats
    Literals,       // substituted instruction count
    Alignments,     // AlignStats
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about an optimizer pass.
pub struct PassDescriptor {
    /// Name used on the command line and in verbose output.
    pub name: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// Pre/post conditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::RangeAnalysis => PassDescriptor {
            name: "range",
            inputs: &[],
            outputs: &[ArtifactId::Bounds],
            invariants: "every recorded interval contains all runtime values",
        },
        PassId::SimplifyControlFlow => PassDescriptor {
            name: "cfg",
            inputs: &[PassId::RangeAnalysis],
            outputs: &[ArtifactId::FoldedBranches],
            invariants: "decided compares folded, unreachable blocks removed",
        },
        PassId::ConstantSubstitution => PassDescriptor {
            name: "const",
            inputs: &[PassId::RangeAnalysis],
            outputs: &[ArtifactId::Literals],
            invariants: "no live arithmetic producer has a singleton bound",
        },
        PassId::MemoryAlignment => PassDescriptor {
            name: "align",
            inputs: &[PassId::RangeAnalysis],
            outputs: &[ArtifactId::Alignments],
            invariants: "stores, bounded debug loads and struct allocas use ABI alignment",
        },
    }
}

impl PassId {
    /// Look up a pass by its command-line name.
    pub fn from_name(name: &str) -> Option<PassId> {
        ALL_PASSES.into_iter().find(|p| descriptor(*p).name == name)
    }

    pub fn name(self) -> &'static str {
        descriptor(self).name
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All 4 pass IDs in execution order.
pub const ALL_PASSES: [PassId; 4] = [
    PassId::RangeAnalysis,
    PassId::SimplifyControlFlow,
    PassId::ConstantSubstitution,
    PassId::MemoryAlignment,
];

/// Close `selection` over its dependencies. Returns passes in execution
/// order, each at most once.
pub fn required_passes(selection: &[PassId]) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    for &id in selection {
        visit(id, &mut visited, &mut order);
    }
    order.sort_by_key(|p| ALL_PASSES.iter().position(|q| q == p));
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumers_pull_in_range_analysis() {
        for pass in [
            PassId::SimplifyControlFlow,
            PassId::ConstantSubstitution,
            PassId::MemoryAlignment,
        ] {
            assert_eq!(required_passes(&[pass]), vec![PassId::RangeAnalysis, pass]);
        }
    }

    #[test]
    fn required_passes_all_is_execution_order() {
        let passes = required_passes(&[
            PassId::MemoryAlignment,
            PassId::ConstantSubstitution,
            PassId::SimplifyControlFlow,
        ]);
        assert_eq!(passes, ALL_PASSES.to_vec());
    }

    #[test]
    fn required_passes_range_is_minimal() {
        assert_eq!(
            required_passes(&[PassId::RangeAnalysis]),
            vec![PassId::RangeAnalysis]
        );
        assert!(required_passes(&[]).is_empty());
    }

    #[test]
    fn duplicates_collapse() {
        let passes = required_passes(&[PassId::ConstantSubstitution, PassId::ConstantSubstitution]);
        assert_eq!(passes.len(), 2);
    }

    #[test]
    fn names_round_trip() {
        for pass in ALL_PASSES {
            assert_eq!(PassId::from_name(pass.name()), Some(pass));
        }
        assert_eq!(PassId::from_name("parse"), None);
    }

    #[test]
    fn all_descriptors_have_outputs() {
        for pass in &ALL_PASSES {
            let desc = descriptor(*pass);
            assert!(
                !desc.outputs.is_empty(),
                "pass {:?} has no outputs declared",
                pass
            );
        }
    }

    #[test]
    fn dependency_edges_are_consistent() {
        for pass in &ALL_PASSES {
            let desc = descriptor(*pass);
            for dep in desc.inputs {
                let order = required_passes(&[*pass]);
                let dep_pos = order.iter().position(|p| p == dep);
                let self_pos = order.iter().position(|p| p == pass);
                assert!(
                    dep_pos.unwrap() < self_pos.unwrap(),
                    "{:?} depends on {:?} but it comes later in execution order",
                    pass,
                    dep
                );
            }
        }
    }
}
