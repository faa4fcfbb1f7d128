use super::attachment::{ApRef, AttachmentPoint};
use super::canon::{Canonicalizer, Fingerprint};
use super::edge::{Edge, EdgeKind};
use super::vertex::Vertex;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Graph has no vertices")]
    Empty,
    #[error("Attachment point {ap} does not exist")]
    ApNotFound { ap: ApRef },
    #[error("Attachment point {ap} is already used by edge {edge}")]
    ApInUse { ap: ApRef, edge: usize },
    #[error("Edge {edge} ends on attachment point {ap}, which is not marked as used by it")]
    DanglingEdge { edge: usize, ap: ApRef },
    #[error("Attachment point {ap} claims edge {edge}, which does not terminate there")]
    StaleAp { ap: ApRef, edge: usize },
    #[error("An edge cannot join two attachment points of the same vertex ({vertex})")]
    SelfLoop { vertex: usize },
    #[error("Vertex {vertex} is not attached to the tree through exactly one parent")]
    NotATree { vertex: usize },
    #[error("A vertex being attached must have only free attachment points")]
    VertexNotFresh,
}

/// A molecular graph of building blocks joined through attachment points.
///
/// Graphs are immutable once sealed. New graphs are derived through
/// [`Graph::draft_extension`], which copies the parent so that branches of the
/// generation tree never share mutable state.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    layer: usize,
    parent: Option<Fingerprint>,
    complete: bool,
    fingerprint: Fingerprint,
}

impl Graph {
    /// Rebuilds a graph from stored parts, checking every structural invariant.
    pub fn from_parts(
        vertices: Vec<Vertex>,
        edges: Vec<Edge>,
        layer: usize,
        parent: Option<Fingerprint>,
        complete: bool,
    ) -> Result<Self, GraphError> {
        validate_parts(&vertices, &edges)?;
        let fingerprint = Canonicalizer::new(&vertices, &edges).fingerprint();
        Ok(Self {
            vertices,
            edges,
            layer,
            parent,
            complete,
            fingerprint,
        })
    }

    /// Starts a copy of this graph one layer deeper, with this graph as parent.
    pub fn draft_extension(&self) -> GraphDraft {
        GraphDraft {
            vertices: self.vertices.clone(),
            edges: self.edges.clone(),
            layer: self.layer + 1,
            parent: Some(self.fingerprint.clone()),
        }
    }

    pub fn with_completeness(mut self, complete: bool) -> Self {
        self.complete = complete;
        self
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex(&self, index: usize) -> Option<&Vertex> {
        self.vertices.get(index)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn layer(&self) -> usize {
        self.layer
    }

    pub fn parent(&self) -> Option<&Fingerprint> {
        self.parent.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn ap(&self, ap: ApRef) -> Option<&AttachmentPoint> {
        self.vertices.get(ap.vertex)?.aps.get(ap.ap)
    }

    pub fn free_aps(&self) -> impl Iterator<Item = (ApRef, &AttachmentPoint)> {
        self.vertices.iter().enumerate().flat_map(|(v, vertex)| {
            vertex
                .free_aps()
                .map(move |(i, ap)| (ApRef::new(v, i), ap))
        })
    }

    pub fn non_cap_vertex_count(&self) -> usize {
        self.vertices.iter().filter(|v| !v.is_cap()).count()
    }

    /// The attachment edge through which `vertex` hangs from its parent.
    pub fn tree_parent(&self, vertex: usize) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.kind == EdgeKind::Attachment && e.trg.vertex == vertex)
    }

    /// The attachment edge joining two adjacent vertices, in either direction.
    pub fn edge_between(&self, a: usize, b: usize) -> Option<&Edge> {
        self.edges.iter().find(|e| {
            e.kind == EdgeKind::Attachment
                && ((e.src.vertex == a && e.trg.vertex == b)
                    || (e.src.vertex == b && e.trg.vertex == a))
        })
    }

    /// Vertex sequence from `from` to `to` along attachment edges, both ends included.
    pub fn tree_path(&self, from: usize, to: usize) -> Vec<usize> {
        let up_from = self.ancestry(from);
        let up_to = self.ancestry(to);
        let on_to: HashSet<usize> = up_to.iter().copied().collect();
        let Some(lca_pos) = up_from.iter().position(|v| on_to.contains(v)) else {
            return Vec::new();
        };
        let lca = up_from[lca_pos];
        let mut path: Vec<usize> = up_from[..=lca_pos].to_vec();
        let down: Vec<usize> = up_to.iter().take_while(|&&v| v != lca).copied().collect();
        path.extend(down.into_iter().rev());
        path
    }

    fn ancestry(&self, vertex: usize) -> Vec<usize> {
        let mut chain = vec![vertex];
        let mut current = vertex;
        while let Some(edge) = self.tree_parent(current) {
            current = edge.src.vertex;
            chain.push(current);
        }
        chain
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        validate_parts(&self.vertices, &self.edges)
    }

    pub(crate) fn canonicalizer(&self) -> Canonicalizer<'_> {
        Canonicalizer::new(&self.vertices, &self.edges)
    }
}

/// A mutable, unsealed graph. Sealing computes the fingerprint.
#[derive(Debug, Clone)]
pub struct GraphDraft {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    layer: usize,
    parent: Option<Fingerprint>,
}

impl GraphDraft {
    /// A layer-0 graph made of a single root vertex.
    pub fn root(vertex: Vertex) -> Result<Self, GraphError> {
        if vertex.aps.iter().any(|ap| !ap.is_free()) {
            return Err(GraphError::VertexNotFresh);
        }
        Ok(Self {
            vertices: vec![vertex],
            edges: Vec::new(),
            layer: 0,
            parent: None,
        })
    }

    pub fn non_cap_vertex_count(&self) -> usize {
        self.vertices.iter().filter(|v| !v.is_cap()).count()
    }

    /// Attaches `vertex` through its AP `incoming_ap` to the free AP `at`.
    ///
    /// Both APs are marked used together with the creation of the edge; on
    /// error the draft is left untouched.
    pub fn attach(
        &mut self,
        at: ApRef,
        vertex: Vertex,
        incoming_ap: usize,
    ) -> Result<usize, GraphError> {
        self.check_free(at)?;
        let index = self.vertices.len();
        let incoming = ApRef::new(index, incoming_ap);
        if incoming_ap >= vertex.aps.len() {
            return Err(GraphError::ApNotFound { ap: incoming });
        }
        if vertex.aps.iter().any(|ap| !ap.is_free()) {
            return Err(GraphError::VertexNotFresh);
        }
        self.vertices.push(vertex);
        self.link(at, incoming, EdgeKind::Attachment);
        Ok(index)
    }

    /// Joins two free APs of distinct vertices with a ring-closing edge.
    pub fn close_ring(&mut self, a: ApRef, b: ApRef) -> Result<usize, GraphError> {
        if a.vertex == b.vertex {
            return Err(GraphError::SelfLoop { vertex: a.vertex });
        }
        self.check_free(a)?;
        self.check_free(b)?;
        Ok(self.link(a, b, EdgeKind::RingClosure))
    }

    pub fn seal(self) -> Graph {
        let fingerprint = Canonicalizer::new(&self.vertices, &self.edges).fingerprint();
        Graph {
            vertices: self.vertices,
            edges: self.edges,
            layer: self.layer,
            parent: self.parent,
            complete: false,
            fingerprint,
        }
    }

    fn check_free(&self, ap: ApRef) -> Result<(), GraphError> {
        let point = self
            .vertices
            .get(ap.vertex)
            .and_then(|v| v.aps.get(ap.ap))
            .ok_or(GraphError::ApNotFound { ap })?;
        match point.edge {
            Some(edge) => Err(GraphError::ApInUse { ap, edge }),
            None => Ok(()),
        }
    }

    fn link(&mut self, src: ApRef, trg: ApRef, kind: EdgeKind) -> usize {
        let index = self.edges.len();
        self.edges.push(Edge::new(src, trg, kind));
        self.vertices[src.vertex].aps[src.ap].edge = Some(index);
        self.vertices[trg.vertex].aps[trg.ap].edge = Some(index);
        index
    }
}

fn validate_parts(vertices: &[Vertex], edges: &[Edge]) -> Result<(), GraphError> {
    if vertices.is_empty() {
        return Err(GraphError::Empty);
    }
    let lookup = |ap: ApRef| vertices.get(ap.vertex).and_then(|v| v.aps.get(ap.ap));

    for (index, edge) in edges.iter().enumerate() {
        if edge.src.vertex == edge.trg.vertex {
            return Err(GraphError::SelfLoop {
                vertex: edge.src.vertex,
            });
        }
        for end in [edge.src, edge.trg] {
            let point = lookup(end).ok_or(GraphError::ApNotFound { ap: end })?;
            if point.edge != Some(index) {
                return Err(GraphError::DanglingEdge {
                    edge: index,
                    ap: end,
                });
            }
        }
    }

    for (v, vertex) in vertices.iter().enumerate() {
        for (i, point) in vertex.aps.iter().enumerate() {
            if let Some(edge) = point.edge {
                let ap = ApRef::new(v, i);
                if !edges.get(edge).is_some_and(|e| e.touches(ap)) {
                    return Err(GraphError::StaleAp { ap, edge });
                }
            }
        }
    }

    for vertex in 0..vertices.len() {
        let mut incoming = edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Attachment && e.trg.vertex == vertex);
        let parent = incoming.next();
        let well_formed = match (vertex, parent, incoming.next()) {
            (0, None, _) => true,
            (_, Some(edge), None) => vertex > 0 && edge.src.vertex < vertex,
            _ => false,
        };
        if !well_formed {
            return Err(GraphError::NotATree { vertex });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::vertex::BlockRef;

    fn block(kind: BlockRef, aps: &[(&str, Option<u32>)]) -> Vertex {
        Vertex::new(
            kind,
            aps.iter()
                .map(|(class, tag)| {
                    let ap = AttachmentPoint::new(*class);
                    match tag {
                        Some(t) => ap.with_symmetry(*t),
                        None => ap,
                    }
                })
                .collect(),
        )
    }

    fn symmetric_root() -> Graph {
        GraphDraft::root(block(
            BlockRef::scaffold(0),
            &[("A:0", Some(1)), ("A:0", Some(1)), ("B:0", None)],
        ))
        .unwrap()
        .seal()
    }

    fn linker() -> Vertex {
        block(BlockRef::fragment(0), &[("A:1", None), ("A:0", None)])
    }

    #[test]
    fn attach_marks_both_ends_used() {
        let root = symmetric_root();
        let mut draft = root.draft_extension();
        let child = draft.attach(ApRef::new(0, 0), linker(), 0).unwrap();
        let graph = draft.seal();

        assert_eq!(child, 1);
        assert_eq!(graph.layer(), 1);
        assert_eq!(graph.parent(), Some(root.fingerprint()));
        assert_eq!(graph.ap(ApRef::new(0, 0)).unwrap().edge(), Some(0));
        assert_eq!(graph.ap(ApRef::new(1, 0)).unwrap().edge(), Some(0));
        graph.validate().unwrap();
    }

    #[test]
    fn extension_never_mutates_the_parent() {
        let root = symmetric_root();
        let before = root.clone();
        let mut draft = root.draft_extension();
        draft.attach(ApRef::new(0, 1), linker(), 0).unwrap();
        let _ = draft.seal();
        assert_eq!(root, before);
        assert_eq!(root.free_aps().count(), 3);
    }

    #[test]
    fn attaching_to_a_used_ap_fails_without_side_effects() {
        let mut draft = symmetric_root().draft_extension();
        draft.attach(ApRef::new(0, 0), linker(), 0).unwrap();
        let err = draft.attach(ApRef::new(0, 0), linker(), 0).unwrap_err();
        assert_eq!(
            err,
            GraphError::ApInUse {
                ap: ApRef::new(0, 0),
                edge: 0
            }
        );
        let graph = draft.seal();
        assert_eq!(graph.vertices().len(), 2);
        graph.validate().unwrap();
    }

    #[test]
    fn attaching_through_missing_ap_is_rejected() {
        let mut draft = symmetric_root().draft_extension();
        let err = draft.attach(ApRef::new(0, 0), linker(), 5).unwrap_err();
        assert!(matches!(err, GraphError::ApNotFound { .. }));
    }

    #[test]
    fn symmetric_positions_share_a_fingerprint() {
        let root = symmetric_root();
        let mut left = root.draft_extension();
        left.attach(ApRef::new(0, 0), linker(), 0).unwrap();
        let mut right = root.draft_extension();
        right.attach(ApRef::new(0, 1), linker(), 0).unwrap();
        let mut other = root.draft_extension();
        other.attach(ApRef::new(0, 2), linker(), 0).unwrap();

        let (left, right, other) = (left.seal(), right.seal(), other.seal());
        assert_eq!(left.fingerprint(), right.fingerprint());
        assert_ne!(left.fingerprint(), other.fingerprint());
    }

    #[test]
    fn ring_closure_requires_distinct_vertices() {
        let mut draft = symmetric_root().draft_extension();
        draft.attach(ApRef::new(0, 0), linker(), 0).unwrap();
        assert_eq!(
            draft.close_ring(ApRef::new(1, 1), ApRef::new(1, 1)),
            Err(GraphError::SelfLoop { vertex: 1 })
        );
        draft.close_ring(ApRef::new(0, 1), ApRef::new(1, 1)).unwrap();
        let graph = draft.seal();
        graph.validate().unwrap();
        assert_eq!(graph.free_aps().count(), 1);
    }

    #[test]
    fn tree_path_walks_through_common_ancestor() {
        let mut draft = symmetric_root().draft_extension();
        draft.attach(ApRef::new(0, 0), linker(), 0).unwrap();
        draft.attach(ApRef::new(0, 1), linker(), 0).unwrap();
        draft.attach(ApRef::new(1, 1), linker(), 0).unwrap();
        let graph = draft.seal();

        assert_eq!(graph.tree_path(3, 2), vec![3, 1, 0, 2]);
        assert_eq!(graph.tree_path(0, 3), vec![0, 1, 3]);
        assert_eq!(graph.tree_path(2, 2), vec![2]);
    }

    #[test]
    fn from_parts_rejects_inconsistent_ap_state() {
        let graph = {
            let mut draft = symmetric_root().draft_extension();
            draft.attach(ApRef::new(0, 0), linker(), 0).unwrap();
            draft.seal()
        };
        let mut vertices = graph.vertices().to_vec();
        vertices[1].aps[0].edge = None;
        let err = Graph::from_parts(vertices, graph.edges().to_vec(), 1, None, false).unwrap_err();
        assert_eq!(
            err,
            GraphError::DanglingEdge {
                edge: 0,
                ap: ApRef::new(1, 0)
            }
        );
    }

    #[test]
    fn from_parts_reproduces_the_fingerprint() {
        let mut draft = symmetric_root().draft_extension();
        draft.attach(ApRef::new(0, 2), linker(), 0).unwrap();
        let graph = draft.seal().with_completeness(true);
        let rebuilt = Graph::from_parts(
            graph.vertices().to_vec(),
            graph.edges().to_vec(),
            graph.layer(),
            graph.parent().cloned(),
            graph.is_complete(),
        )
        .unwrap();
        assert_eq!(rebuilt, graph);
    }
}
