use crate::core::models::canon::Fingerprint;
use crate::core::models::graph::Graph;
use crate::core::models::ids::GraphId;
use slotmap::SlotMap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub fingerprint: Fingerprint,
    pub parent: Option<GraphId>,
    pub layer: usize,
    graph: Option<Arc<Graph>>,
}

impl TreeNode {
    /// The graph itself, unless it has been evicted.
    pub fn graph(&self) -> Option<&Arc<Graph>> {
        self.graph.as_ref()
    }
}

/// Arena of every graph generated in this process, linked to its parent by key.
///
/// Lineage survives eviction: only the graph payload is dropped.
///
/// Nodes and the fingerprint index are never removed, so a fingerprint is
/// admitted at most once per run whichever layer reaches it. Both grow with
/// the number of distinct graphs, at most `max_graphs_per_layer` small
/// entries per layer; the graph payloads are what
/// [`Self::evict`] and [`Self::evict_layer`] release.
#[derive(Debug, Default)]
pub struct GenerationTree {
    nodes: SlotMap<GraphId, TreeNode>,
    index: HashMap<Fingerprint, GraphId>,
}

impl GenerationTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `graph` unless its fingerprint is already known.
    pub fn insert(&mut self, graph: Arc<Graph>) -> Option<GraphId> {
        if self.index.contains_key(graph.fingerprint()) {
            return None;
        }
        let parent = graph.parent().and_then(|fp| self.index.get(fp).copied());
        let fingerprint = graph.fingerprint().clone();
        let id = self.nodes.insert(TreeNode {
            fingerprint: fingerprint.clone(),
            parent,
            layer: graph.layer(),
            graph: Some(graph),
        });
        self.index.insert(fingerprint, id);
        Some(id)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.index.contains_key(fingerprint)
    }

    pub fn id_of(&self, fingerprint: &Fingerprint) -> Option<GraphId> {
        self.index.get(fingerprint).copied()
    }

    pub fn node(&self, id: GraphId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    pub fn evict(&mut self, fingerprint: &Fingerprint) -> bool {
        let Some(&id) = self.index.get(fingerprint) else {
            return false;
        };
        self.nodes
            .get_mut(id)
            .and_then(|node| node.graph.take())
            .is_some()
    }

    pub fn evict_layer(&mut self, layer: usize) -> usize {
        self.nodes
            .values_mut()
            .filter(|node| node.layer == layer)
            .filter_map(|node| node.graph.take())
            .count()
    }

    /// Fingerprints from the oldest known ancestor down to `id`.
    pub fn lineage(&self, id: GraphId) -> Vec<&Fingerprint> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current.and_then(|id| self.nodes.get(id)) {
            chain.push(&node.fingerprint);
            current = node.parent;
        }
        chain.reverse();
        chain
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn resident_count(&self) -> usize {
        self.nodes.values().filter(|n| n.graph.is_some()).count()
    }
}
