use super::attachment::ApRef;
use super::edge::{Edge, EdgeKind};
use super::vertex::Vertex;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Canonical structural hash of a graph, as lowercase hex SHA-256.
///
/// Two graphs share a fingerprint when they are isomorphic as rooted trees of
/// building blocks, where APs carrying the same symmetry tag on a block are
/// interchangeable, and when some matching of those trees carries their
/// ring-closing edges onto each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_canonical(canonical: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds canonical strings over the attachment tree of a graph.
///
/// Callers must pass parts that satisfy the graph tree invariant: every vertex
/// other than 0 has exactly one incoming attachment edge from a lower index.
pub(crate) struct Canonicalizer<'a> {
    vertices: &'a [Vertex],
    edges: &'a [Edge],
    children: Vec<Vec<(usize, usize, usize)>>,
}

/// Run of siblings whose branch strings are equal, so their relative order is
/// not fixed by the tree alone.
struct TieGroup {
    vertex: usize,
    start: usize,
    len: usize,
}

impl<'a> Canonicalizer<'a> {
    pub(crate) fn new(vertices: &'a [Vertex], edges: &'a [Edge]) -> Self {
        let mut children = vec![Vec::new(); vertices.len()];
        for edge in edges.iter().filter(|e| e.kind == EdgeKind::Attachment) {
            children[edge.src.vertex].push((edge.src.ap, edge.trg.vertex, edge.trg.ap));
        }
        Self {
            vertices,
            edges,
            children,
        }
    }

    /// Canonical string of the whole graph, optionally highlighting one AP.
    ///
    /// The tree part is followed by the ring-closing edges written against
    /// preorder vertex positions. Among the preorders allowed by the tree
    /// (equal sibling branches may come in any order) the smallest ring
    /// string is taken.
    pub(crate) fn canonical_form(&self, marked: Option<ApRef>) -> String {
        if self.vertices.is_empty() {
            return String::new();
        }
        let (forms, mut order) = self.tree_forms(marked);
        format!("{}|{}", forms[0], self.ring_form(&mut order))
    }

    pub(crate) fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_canonical(&self.canonical_form(None))
    }

    fn token(&self, ap: ApRef) -> String {
        match self.vertices[ap.vertex].aps[ap.ap].symmetry {
            Some(tag) => format!("s{tag}"),
            None => ap.ap.to_string(),
        }
    }

    /// Subtree form of every vertex plus its children in sorted branch order.
    fn tree_forms(&self, marked: Option<ApRef>) -> (Vec<String>, Vec<Vec<(String, usize)>>) {
        let count = self.vertices.len();
        let mut forms = vec![String::new(); count];
        let mut order = vec![Vec::new(); count];
        // Children always carry a higher index than their parent.
        for vertex in (0..count).rev() {
            let mut branches: Vec<(String, usize)> = self.children[vertex]
                .iter()
                .map(|&(ap, child, child_ap)| {
                    let branch = format!(
                        "{}>{}:{}",
                        self.token(ApRef::new(vertex, ap)),
                        self.token(ApRef::new(child, child_ap)),
                        forms[child]
                    );
                    (branch, child)
                })
                .collect();
            branches.sort();
            let mark = match marked {
                Some(ap) if ap.vertex == vertex => format!("*{}", self.token(ap)),
                _ => String::new(),
            };
            forms[vertex] = format!(
                "{}{}({})",
                self.vertices[vertex].block,
                mark,
                branches.iter().map(|(branch, _)| branch.as_str()).join(",")
            );
            order[vertex] = branches;
        }
        (forms, order)
    }

    fn ring_form(&self, order: &mut [Vec<(String, usize)>]) -> String {
        let rings: Vec<(ApRef, ApRef)> = self
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::RingClosure)
            .map(|e| (e.src, e.trg))
            .collect();
        if rings.is_empty() {
            return String::new();
        }

        let mut on_ring = vec![false; self.vertices.len()];
        for (a, b) in &rings {
            on_ring[a.vertex] = true;
            on_ring[b.vertex] = true;
        }
        for vertex in (0..on_ring.len()).rev() {
            if self.children[vertex].iter().any(|&(_, child, _)| on_ring[child]) {
                on_ring[vertex] = true;
            }
        }

        // Swapping equal siblings that hold no ring endpoint leaves every
        // position that matters unchanged, so only these groups are permuted.
        let mut groups = Vec::new();
        for (vertex, branches) in order.iter().enumerate() {
            let mut start = 0;
            for run in branches.chunk_by(|a, b| a.0 == b.0) {
                if run.len() > 1 && run.iter().any(|(_, child)| on_ring[*child]) {
                    groups.push(TieGroup {
                        vertex,
                        start,
                        len: run.len(),
                    });
                }
                start += run.len();
            }
        }

        let mut best = None;
        self.search(&groups, order, &rings, &mut best);
        best.unwrap_or_default()
    }

    fn search(
        &self,
        groups: &[TieGroup],
        order: &mut [Vec<(String, usize)>],
        rings: &[(ApRef, ApRef)],
        best: &mut Option<String>,
    ) {
        let Some((group, rest)) = groups.split_first() else {
            let encoded = self.encode_rings(order, rings);
            if best.as_ref().is_none_or(|current| encoded < *current) {
                *best = Some(encoded);
            }
            return;
        };
        let range = group.start..group.start + group.len;
        let original = order[group.vertex][range.clone()].to_vec();
        for arrangement in original.iter().cloned().permutations(group.len) {
            order[group.vertex][range.clone()].clone_from_slice(&arrangement);
            self.search(rest, order, rings, best);
        }
        order[group.vertex][range].clone_from_slice(&original);
    }

    fn encode_rings(&self, order: &[Vec<(String, usize)>], rings: &[(ApRef, ApRef)]) -> String {
        let mut position = vec![0usize; self.vertices.len()];
        let mut next = 0;
        let mut stack = vec![0usize];
        while let Some(vertex) = stack.pop() {
            position[vertex] = next;
            next += 1;
            stack.extend(order[vertex].iter().rev().map(|(_, child)| *child));
        }
        rings
            .iter()
            .map(|&(a, b)| {
                let a = (position[a.vertex], self.token(a));
                let b = (position[b.vertex], self.token(b));
                let (low, high) = if a <= b { (a, b) } else { (b, a) };
                format!("{}.{}~{}.{}", low.0, low.1, high.0, high.1)
            })
            .sorted()
            .join(";")
    }
}
