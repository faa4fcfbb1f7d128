//! Symmetry resolution for attachment points and incoming candidates.
//!
//! Two free APs of a graph are equivalent when marking either one yields the
//! same canonical form, i.e. when some automorphism of the rooted graph maps
//! one onto the other. Classes partition the free APs, so no AP ever belongs
//! to two classes; the enumerator extends only the first AP of each class in
//! vertex-then-AP order.

use crate::core::fragspace::library::Candidate;
use crate::core::fragspace::space::FragmentSpace;
use crate::core::models::attachment::{ApClass, ApRef};
use crate::core::models::graph::Graph;
use crate::core::models::vertex::BlockRef;
use std::collections::HashMap;
use std::fmt;

/// Opaque key naming one equivalence class of APs within one graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymmetryClass(String);

impl SymmetryClass {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymmetryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait SymmetryResolver: Send + Sync {
    /// The class of `ap` in `graph`. Equal keys mean equivalent APs.
    fn equivalence_class(&self, graph: &Graph, ap: ApRef) -> SymmetryClass;

    /// Group of interchangeable candidates for APs of `class`, if `candidate` has one.
    fn candidate_group(&self, _class: &ApClass, _candidate: &Candidate) -> Option<usize> {
        None
    }
}

/// Resolver deriving AP classes from graph topology and AP symmetry tags, and
/// candidate groups from the fragment space declarations.
#[derive(Debug, Clone, Default)]
pub struct TopologicalSymmetry {
    groups: HashMap<(ApClass, BlockRef), usize>,
}

impl TopologicalSymmetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_space(space: &FragmentSpace) -> Self {
        let mut groups = HashMap::new();
        for (group_id, group) in space.equivalent_candidates().iter().enumerate() {
            for &index in &group.blocks {
                groups
                    .entry((group.ap_class.clone(), BlockRef::fragment(index)))
                    .or_insert(group_id);
            }
        }
        Self { groups }
    }
}

impl SymmetryResolver for TopologicalSymmetry {
    fn equivalence_class(&self, graph: &Graph, ap: ApRef) -> SymmetryClass {
        SymmetryClass(graph.canonicalizer().canonical_form(Some(ap)))
    }

    fn candidate_group(&self, class: &ApClass, candidate: &Candidate) -> Option<usize> {
        self.groups.get(&(class.clone(), candidate.block)).copied()
    }
}
