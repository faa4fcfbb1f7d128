use super::config::SymmetryPolicy;
use crate::core::fragspace::library::Candidate;
use crate::core::fragspace::space::FragmentSpace;
use crate::core::models::attachment::ApRef;
use crate::core::models::canon::Fingerprint;
use crate::core::models::graph::{Graph, GraphError};
use crate::core::models::vertex::{BlockRef, BlockType};
use crate::core::rings::chain::{ChainIdentity, ChainPath};
use crate::core::rings::registry::{RegistryError, RingClosureFilter};
use crate::core::symmetry::{SymmetryClass, SymmetryResolver};
use std::collections::HashSet;
use thiserror::Error;

/// Failure to build one candidate extension. The remaining candidates are unaffected.
#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("Candidate block {block} is missing from the fragment space")]
    UnknownBlock { block: BlockRef },
    #[error("Extending graph {} at {ap} failed: {source}", fingerprint.short())]
    Graph {
        fingerprint: Fingerprint,
        ap: ApRef,
        #[source]
        source: GraphError,
    },
    #[error("Closability of chain '{chain}' is unknown: {source}")]
    RingClosure {
        chain: ChainIdentity,
        #[source]
        source: RegistryError,
    },
}

impl EnumerationError {
    /// Errors that invalidate the whole exploration rather than one candidate.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::RingClosure { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
enum Step {
    Attach {
        sites: Vec<ApRef>,
        candidate: Candidate,
    },
    CloseRing {
        head: ApRef,
        tail: ApRef,
    },
}

/// Produces the next-step extensions of a graph.
///
/// Free APs are grouped into symmetry classes (vertex order, then AP order)
/// and only the first AP of each class is offered candidates. Candidates come
/// from the fragment space in its fixed order; a candidate declared
/// interchangeable with an earlier one for the same AP class is skipped.
/// Ring closures are proposed after all attachments and only when the ring
/// filter accepts the chain; equivalent closures collapse by fingerprint.
pub struct CombinationEnumerator<'a> {
    space: &'a FragmentSpace,
    symmetry: &'a dyn SymmetryResolver,
    policy: SymmetryPolicy,
    rings: Option<&'a dyn RingClosureFilter>,
}

impl<'a> CombinationEnumerator<'a> {
    pub fn new(space: &'a FragmentSpace, symmetry: &'a dyn SymmetryResolver) -> Self {
        Self {
            space,
            symmetry,
            policy: SymmetryPolicy::default(),
            rings: None,
        }
    }

    pub fn with_policy(mut self, policy: SymmetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_ring_filter(mut self, filter: &'a dyn RingClosureFilter) -> Self {
        self.rings = Some(filter);
        self
    }

    /// Lazily yields every distinct extension of `graph`.
    ///
    /// The sequence depends only on `graph` and the collaborators, so calling
    /// `extend` again restarts it from the beginning.
    pub fn extend<'g>(&self, graph: &'g Graph) -> Extensions<'a, 'g> {
        let classes: Vec<(ApRef, SymmetryClass)> = graph
            .free_aps()
            .map(|(ap, _)| (ap, self.symmetry.equivalence_class(graph, ap)))
            .collect();

        let mut steps = self.attachment_steps(graph, &classes);
        if self.rings.is_some() && self.space.has_ring_closures() {
            steps.extend(self.ring_steps(graph, &classes));
        }

        Extensions {
            space: self.space,
            rings: self.rings,
            graph,
            steps: steps.into_iter(),
            seen: HashSet::new(),
        }
    }

    fn attachment_steps(&self, graph: &Graph, classes: &[(ApRef, SymmetryClass)]) -> Vec<Step> {
        let mut groups: Vec<(&SymmetryClass, Vec<ApRef>)> = Vec::new();
        for (ap, class) in classes {
            match groups.iter_mut().find(|(c, _)| *c == class) {
                Some((_, members)) => members.push(*ap),
                None => groups.push((class, vec![*ap])),
            }
        }

        let non_caps = graph.non_cap_vertex_count();
        let mut steps = Vec::new();
        for (_, members) in groups {
            let representative = members[0];
            let Some(ap_class) = graph.ap(representative).map(|ap| ap.class.clone()) else {
                continue;
            };
            let sites = match self.policy {
                SymmetryPolicy::Independent => vec![representative],
                SymmetryPolicy::Enforced => members,
            };
            let mut seen_groups = HashSet::new();
            for candidate in self.space.candidates_for(&ap_class) {
                if let Some(group) = self.symmetry.candidate_group(&ap_class, candidate) {
                    if !seen_groups.insert(group) {
                        continue;
                    }
                }
                if candidate.block.kind != BlockType::Cap && self.exceeds_size(non_caps, sites.len()) {
                    continue;
                }
                steps.push(Step::Attach {
                    sites: sites.clone(),
                    candidate: *candidate,
                });
            }
        }
        steps
    }

    fn exceeds_size(&self, current: usize, added: usize) -> bool {
        self.space
            .max_vertices()
            .is_some_and(|max| current + added > max)
    }

    fn ring_steps(&self, graph: &Graph, classes: &[(ApRef, SymmetryClass)]) -> Vec<Step> {
        let sizes = self.space.ring_sizes();
        let mut steps = Vec::new();
        for (i, (head, _)) in classes.iter().enumerate() {
            for (tail, _) in &classes[i + 1..] {
                if head.vertex == tail.vertex {
                    continue;
                }
                let (Some(a), Some(b)) = (graph.ap(*head), graph.ap(*tail)) else {
                    continue;
                };
                if self.space.ring_compatible(&a.class, &b.class)
                    && sizes.contains(&graph.tree_path(head.vertex, tail.vertex).len())
                {
                    steps.push(Step::CloseRing {
                        head: *head,
                        tail: *tail,
                    });
                }
            }
        }
        steps
    }
}

/// Iterator over the extensions of one graph. Siblings never share a fingerprint.
pub struct Extensions<'a, 'g> {
    space: &'a FragmentSpace,
    rings: Option<&'a dyn RingClosureFilter>,
    graph: &'g Graph,
    steps: std::vec::IntoIter<Step>,
    seen: HashSet<Fingerprint>,
}

impl Extensions<'_, '_> {
    fn build(&self, step: &Step) -> Result<Option<Graph>, EnumerationError> {
        match step {
            Step::Attach { sites, candidate } => {
                let vertex = self
                    .space
                    .instantiate(candidate.block)
                    .ok_or(EnumerationError::UnknownBlock {
                        block: candidate.block,
                    })?;
                let mut draft = self.graph.draft_extension();
                for &site in sites {
                    draft
                        .attach(site, vertex.clone(), candidate.ap)
                        .map_err(|source| self.graph_error(site, source))?;
                }
                Ok(Some(self.space.classify(draft.seal())))
            }
            Step::CloseRing { head, tail } => {
                let Some(filter) = self.rings else {
                    return Ok(None);
                };
                let Some(chain) = ChainPath::between(self.graph, *head, *tail) else {
                    return Ok(None);
                };
                let closable = filter.is_closable(self.graph, &chain).map_err(|source| {
                    EnumerationError::RingClosure {
                        chain: chain.identity().clone(),
                        source,
                    }
                })?;
                if !closable {
                    return Ok(None);
                }
                let mut draft = self.graph.draft_extension();
                draft
                    .close_ring(*head, *tail)
                    .map_err(|source| self.graph_error(*head, source))?;
                Ok(Some(self.space.classify(draft.seal())))
            }
        }
    }

    fn graph_error(&self, ap: ApRef, source: GraphError) -> EnumerationError {
        EnumerationError::Graph {
            fingerprint: self.graph.fingerprint().clone(),
            ap,
            source,
        }
    }
}

impl Iterator for Extensions<'_, '_> {
    type Item = Result<Graph, EnumerationError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = self.steps.next()?;
            match self.build(&step) {
                Ok(Some(graph)) => {
                    if self.seen.insert(graph.fingerprint().clone()) {
                        return Some(Ok(graph));
                    }
                }
                Ok(None) => {}
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fragspace::space::tests::SAMPLE_SPACE;
    use crate::core::models::edge::EdgeKind;
    use crate::core::symmetry::TopologicalSymmetry;

    const PAIR_SPACE: &str = r#"
forbidden-ends = ["A"]

[compatibility]
"A" = ["A"]

[[scaffolds]]
name = "root"
aps = [{ class = "A" }]

[[fragments]]
name = "x"
aps = [{ class = "A" }]

[[fragments]]
name = "y"
aps = [{ class = "A" }]
"#;

    fn space(content: &str) -> FragmentSpace {
        FragmentSpace::from_toml_str(content).unwrap()
    }

    fn root(space: &FragmentSpace) -> Graph {
        space.root_graphs().unwrap().remove(0)
    }

    fn children(enumerator: &CombinationEnumerator<'_>, graph: &Graph) -> Vec<Graph> {
        enumerator
            .extend(graph)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn distinct_compatible_blocks_give_distinct_children() {
        let space = space(PAIR_SPACE);
        let symmetry = TopologicalSymmetry::from_space(&space);
        let enumerator = CombinationEnumerator::new(&space, &symmetry);
        let kids = children(&enumerator, &root(&space));
        assert_eq!(kids.len(), 2);
        assert_ne!(kids[0].fingerprint(), kids[1].fingerprint());
        assert!(kids.iter().all(Graph::is_complete));
    }

    #[test]
    fn equivalent_candidates_collapse_to_one_child() {
        let content = format!(
            "{PAIR_SPACE}\n[[equivalent-candidates]]\nap-class = \"A\"\nblocks = [0, 1]\n"
        );
        let space = space(&content);
        let symmetry = TopologicalSymmetry::from_space(&space);
        let enumerator = CombinationEnumerator::new(&space, &symmetry);
        let kids = children(&enumerator, &root(&space));
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].vertices()[1].block, BlockRef::fragment(0));
    }

    #[test]
    fn symmetric_aps_are_filled_once_per_block() {
        let space = space(SAMPLE_SPACE);
        let symmetry = TopologicalSymmetry::from_space(&space);
        let enumerator = CombinationEnumerator::new(&space, &symmetry);
        let kids = children(&enumerator, &root(&space));

        // linker, terminal and hydrogen on one of the two equivalent APs
        assert_eq!(kids.len(), 3);
        assert!(kids.iter().all(|g| g.vertices().len() == 2));
        let fingerprints: HashSet<_> = kids.iter().map(|g| g.fingerprint().clone()).collect();
        assert_eq!(fingerprints.len(), 3);
    }

    #[test]
    fn enforced_symmetry_fills_the_whole_class() {
        let space = space(SAMPLE_SPACE);
        let symmetry = TopologicalSymmetry::from_space(&space);
        let enumerator =
            CombinationEnumerator::new(&space, &symmetry).with_policy(SymmetryPolicy::Enforced);
        let kids = children(&enumerator, &root(&space));

        assert_eq!(kids.len(), 3);
        for kid in &kids {
            assert_eq!(kid.vertices().len(), 3);
            assert_eq!(kid.vertices()[1].block, kid.vertices()[2].block);
        }
        let capped = kids.iter().find(|g| g.vertices()[1].is_cap()).unwrap();
        assert!(capped.is_complete());
    }

    #[test]
    fn full_graphs_only_accept_caps() {
        let mut content = String::from("max-vertices = 1\n");
        content.push_str(
            r#"
[compatibility]
"A" = ["B"]

[capping]
"A" = "H"

[[scaffolds]]
name = "root"
aps = [{ class = "A" }]

[[caps]]
name = "hydrogen"
aps = [{ class = "H" }]
"#,
        );
        for i in 0..5 {
            content.push_str(&format!("\n[[fragments]]\nname = \"f{i}\"\naps = [{{ class = \"B\" }}]\n"));
        }
        let space = space(&content);
        let symmetry = TopologicalSymmetry::from_space(&space);
        let enumerator = CombinationEnumerator::new(&space, &symmetry);
        let kids = children(&enumerator, &root(&space));

        assert_eq!(space.candidates_for(&"A".into()).len(), 6);
        assert_eq!(kids.len(), 1);
        assert!(kids[0].vertices()[1].is_cap());
        assert!(kids[0].is_complete());
    }

    #[test]
    fn extension_is_restartable_and_leaves_the_parent_untouched() {
        let space = space(SAMPLE_SPACE);
        let symmetry = TopologicalSymmetry::from_space(&space);
        let enumerator = CombinationEnumerator::new(&space, &symmetry);
        let parent = root(&space);
        let before = parent.clone();

        let first: Vec<_> = children(&enumerator, &parent)
            .iter()
            .map(|g| g.fingerprint().clone())
            .collect();
        let second: Vec<_> = children(&enumerator, &parent)
            .iter()
            .map(|g| g.fingerprint().clone())
            .collect();

        assert_eq!(first, second);
        assert_eq!(parent, before);
        for kid in children(&enumerator, &parent) {
            kid.validate().unwrap();
            assert_eq!(kid.layer(), parent.layer() + 1);
            assert_eq!(kid.parent(), Some(parent.fingerprint()));
            assert_eq!(kid.edges().len(), parent.edges().len() + 1);
        }
    }

    #[derive(Clone, Copy)]
    enum FilterMode {
        Closable,
        Open,
        Conflict,
    }

    struct FixedFilter(FilterMode);

    impl RingClosureFilter for FixedFilter {
        fn is_closable(&self, _graph: &Graph, chain: &ChainPath) -> Result<bool, RegistryError> {
            match self.0 {
                FilterMode::Closable => Ok(true),
                FilterMode::Open => Ok(false),
                FilterMode::Conflict => Err(RegistryError::Conflict {
                    chain: chain.identity().clone(),
                }),
            }
        }
    }

    const RING_SPACE: &str = r#"
ring-closures = [["R", "R"]]
min-ring-size = 3

[[scaffolds]]
name = "core"
aps = [{ class = "L" }, { class = "R" }]

[[fragments]]
name = "arm"
aps = [{ class = "L" }, { class = "L" }, { class = "R" }]
"#;

    /// core - arm - arm, each vertex with a free R.
    fn open_chain(space: &FragmentSpace) -> Graph {
        let mut draft = root(space).draft_extension();
        let arm = space.instantiate(BlockRef::fragment(0)).unwrap();
        draft.attach(ApRef::new(0, 0), arm.clone(), 0).unwrap();
        draft.attach(ApRef::new(1, 1), arm, 0).unwrap();
        space.classify(draft.seal())
    }

    #[test]
    fn ring_closure_is_proposed_for_chains_of_allowed_size() {
        let space = space(RING_SPACE);
        let symmetry = TopologicalSymmetry::from_space(&space);
        let filter = FixedFilter(FilterMode::Closable);
        let enumerator = CombinationEnumerator::new(&space, &symmetry).with_ring_filter(&filter);
        let graph = open_chain(&space);

        let kids = children(&enumerator, &graph);
        assert_eq!(kids.len(), 1);
        let ring = kids[0]
            .edges()
            .iter()
            .find(|e| e.kind == EdgeKind::RingClosure)
            .unwrap();
        assert_eq!((ring.src, ring.trg), (ApRef::new(0, 1), ApRef::new(2, 2)));
        kids[0].validate().unwrap();
    }

    #[test]
    fn rejected_or_unfiltered_rings_are_not_proposed() {
        let space = space(RING_SPACE);
        let symmetry = TopologicalSymmetry::from_space(&space);
        let graph = open_chain(&space);

        let filter = FixedFilter(FilterMode::Open);
        let enumerator = CombinationEnumerator::new(&space, &symmetry).with_ring_filter(&filter);
        assert_eq!(enumerator.extend(&graph).count(), 0);

        let unfiltered = CombinationEnumerator::new(&space, &symmetry);
        assert_eq!(unfiltered.extend(&graph).count(), 0);
    }

    #[test]
    fn registry_conflict_surfaces_as_a_fatal_item() {
        let space = space(RING_SPACE);
        let symmetry = TopologicalSymmetry::from_space(&space);
        let filter = FixedFilter(FilterMode::Conflict);
        let enumerator = CombinationEnumerator::new(&space, &symmetry).with_ring_filter(&filter);
        let graph = open_chain(&space);

        let items: Vec<_> = enumerator.extend(&graph).collect();
        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(e) => assert!(e.is_fatal()),
            Ok(_) => panic!("expected a ring-closure error"),
        }
    }
}
