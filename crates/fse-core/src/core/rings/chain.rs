use crate::core::models::attachment::ApRef;
use crate::core::models::edge::Edge;
use crate::core::models::graph::Graph;
use crate::core::models::vertex::BlockRef;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Graph-independent key of an open chain that may close into a ring.
///
/// Spelled from the blocks along the chain and the APs through which the
/// chain enters and leaves each block; the smaller of the two reading
/// directions is used, so both ends of the chain produce the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainIdentity(String);

impl ChainIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An open chain inside a specific graph, from the free AP `head` to the free AP `tail`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPath {
    identity: ChainIdentity,
    vertices: Vec<usize>,
    head: ApRef,
    tail: ApRef,
}

impl ChainPath {
    /// Traces the tree path between the vertices owning `head` and `tail`.
    ///
    /// Returns `None` when both APs sit on the same vertex or do not exist.
    pub fn between(graph: &Graph, head: ApRef, tail: ApRef) -> Option<Self> {
        if head.vertex == tail.vertex {
            return None;
        }
        graph.ap(head)?;
        graph.ap(tail)?;
        let vertices = graph.tree_path(head.vertex, tail.vertex);
        if vertices.len() < 2 {
            return None;
        }

        let last = vertices.len() - 1;
        let mut links: Vec<(BlockRef, usize, usize)> = Vec::with_capacity(vertices.len());
        for (i, &v) in vertices.iter().enumerate() {
            let ap_in = if i == 0 {
                head.ap
            } else {
                ap_on(graph.edge_between(vertices[i - 1], v)?, v)
            };
            let ap_out = if i == last {
                tail.ap
            } else {
                ap_on(graph.edge_between(v, vertices[i + 1])?, v)
            };
            links.push((graph.vertex(v)?.block, ap_in, ap_out));
        }

        let forward = links
            .iter()
            .map(|(block, i, o)| format!("{block}/{i}/{o}"))
            .join("-");
        let backward = links
            .iter()
            .rev()
            .map(|(block, i, o)| format!("{block}/{o}/{i}"))
            .join("-");

        Some(Self {
            identity: ChainIdentity(forward.min(backward)),
            vertices,
            head,
            tail,
        })
    }

    pub fn identity(&self) -> &ChainIdentity {
        &self.identity
    }

    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    pub fn head(&self) -> ApRef {
        self.head
    }

    pub fn tail(&self) -> ApRef {
        self.tail
    }

    /// Number of building blocks in the ring that closing this chain would form.
    pub fn ring_size(&self) -> usize {
        self.vertices.len()
    }
}

fn ap_on(edge: &Edge, vertex: usize) -> usize {
    if edge.src.vertex == vertex {
        edge.src.ap
    } else {
        edge.trg.ap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::attachment::AttachmentPoint;
    use crate::core::models::graph::GraphDraft;
    use crate::core::models::vertex::Vertex;

    fn unit(block: BlockRef, n: usize) -> Vertex {
        Vertex::new(block, (0..n).map(|_| AttachmentPoint::new("R")).collect())
    }

    fn chain_graph() -> Graph {
        let mut draft = GraphDraft::root(unit(BlockRef::scaffold(0), 2))
            .unwrap()
            .seal()
            .draft_extension();
        draft.attach(ApRef::new(0, 0), unit(BlockRef::fragment(1), 2), 0).unwrap();
        draft.attach(ApRef::new(1, 1), unit(BlockRef::fragment(2), 2), 1).unwrap();
        draft.seal()
    }

    #[test]
    fn identity_spells_blocks_and_aps_along_the_chain() {
        let graph = chain_graph();
        let chain = ChainPath::between(&graph, ApRef::new(0, 1), ApRef::new(2, 0)).unwrap();
        assert_eq!(chain.vertices(), &[0, 1, 2]);
        assert_eq!(chain.ring_size(), 3);
        assert_eq!(chain.identity().as_str(), "f2/0/1-f1/1/0-s0/0/1");
    }

    #[test]
    fn identity_does_not_depend_on_direction() {
        let graph = chain_graph();
        let forward = ChainPath::between(&graph, ApRef::new(0, 1), ApRef::new(2, 0)).unwrap();
        let backward = ChainPath::between(&graph, ApRef::new(2, 0), ApRef::new(0, 1)).unwrap();
        assert_eq!(forward.identity(), backward.identity());
        assert_eq!(backward.head(), ApRef::new(2, 0));
    }

    #[test]
    fn same_vertex_is_not_a_chain() {
        let graph = chain_graph();
        assert!(ChainPath::between(&graph, ApRef::new(0, 1), ApRef::new(0, 0)).is_none());
        assert!(ChainPath::between(&graph, ApRef::new(0, 1), ApRef::new(9, 0)).is_none());
    }
}
