use super::config::LimitsConfig;
use super::enumerator::{CombinationEnumerator, EnumerationError};
use super::error::EngineError;
use super::stop::StopToken;
use super::tree::GenerationTree;
use crate::core::fragspace::space::FragmentSpace;
use crate::core::models::graph::Graph;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    BuildingLayer(usize),
    Done { truncated: bool },
}

/// Why an exploration ended before the space was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CapacityExceeded {
    #[error("depth ceiling of {limit} layers reached with graphs still extendable")]
    Depth { limit: usize },
    #[error("layer {layer} reached the ceiling of {limit} graphs")]
    LayerSize { layer: usize, limit: usize },
}

/// Everything one layer produced.
#[derive(Debug, Default)]
pub struct LayerReport {
    pub layer: usize,
    pub complete: Vec<Arc<Graph>>,
    pub extendable: Vec<Arc<Graph>>,
    /// Parents that yielded no extension at all.
    pub dead: usize,
    /// Extensions dropped because another parent already produced them.
    pub duplicates: usize,
    pub errors: Vec<EnumerationError>,
    pub capacity: Option<CapacityExceeded>,
    pub interrupted: bool,
}

impl LayerReport {
    fn new(layer: usize) -> Self {
        Self {
            layer,
            ..Self::default()
        }
    }

    pub fn graphs(&self) -> impl Iterator<Item = &Arc<Graph>> {
        self.complete.iter().chain(self.extendable.iter())
    }

    pub fn len(&self) -> usize {
        self.complete.len() + self.extendable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn admit(&mut self, graph: Arc<Graph>) {
        if graph.is_complete() {
            self.complete.push(graph);
        } else {
            self.extendable.push(graph);
        }
    }
}

/// Drives layered generation: layer `k + 1` is made of the distinct
/// extensions of the extendable graphs of layer `k`.
pub struct LayeredGraphBuilder<'a> {
    enumerator: CombinationEnumerator<'a>,
    space: &'a FragmentSpace,
    limits: LimitsConfig,
    tree: GenerationTree,
    state: BuildState,
}

impl<'a> LayeredGraphBuilder<'a> {
    pub fn new(
        enumerator: CombinationEnumerator<'a>,
        space: &'a FragmentSpace,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            enumerator,
            space,
            limits,
            tree: GenerationTree::new(),
            state: BuildState::BuildingLayer(0),
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn tree(&self) -> &GenerationTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut GenerationTree {
        &mut self.tree
    }

    /// Layer 0: one graph per scaffold.
    pub fn seed_roots(&mut self) -> Result<LayerReport, EngineError> {
        if self.state != BuildState::BuildingLayer(0) {
            return Err(EngineError::Internal(
                "roots can only be seeded before the first layer".to_string(),
            ));
        }
        let limit = self.limits.max_graphs_per_layer;
        let mut report = LayerReport::new(0);
        for root in self.space.root_graphs()? {
            if self.tree.contains(root.fingerprint()) {
                report.duplicates += 1;
                continue;
            }
            if report.len() >= limit {
                report.capacity = Some(CapacityExceeded::LayerSize { layer: 0, limit });
                warn!(limit, "Layer ceiling reached while seeding roots.");
                break;
            }
            let root = Arc::new(root);
            if self.tree.insert(Arc::clone(&root)).is_some() {
                report.admit(root);
            } else {
                report.duplicates += 1;
            }
        }
        info!(
            roots = report.len(),
            complete = report.complete.len(),
            "Seeded layer 0."
        );
        Ok(report)
    }

    /// Continues from a persisted layer, which becomes the current one.
    ///
    /// The returned report must be passed to [`Self::conclude`] like any other.
    pub fn resume(&mut self, layer: usize, graphs: Vec<Graph>) -> LayerReport {
        let mut report = LayerReport::new(layer);
        for graph in graphs {
            let graph = Arc::new(graph);
            if self.tree.insert(Arc::clone(&graph)).is_some() {
                report.admit(graph);
            } else {
                report.duplicates += 1;
            }
        }
        self.state = BuildState::BuildingLayer(layer);
        info!(
            layer,
            extendable = report.extendable.len(),
            "Resumed from persisted layer."
        );
        report
    }

    /// Builds the layer after the one `surviving` belongs to.
    ///
    /// Stops early, with `interrupted` set, when `stop` fires between parents,
    /// and with `capacity` set when the layer ceiling is reached.
    #[instrument(skip_all, name = "next_layer", fields(layer))]
    pub fn next_layer(
        &mut self,
        surviving: &[Arc<Graph>],
        stop: &StopToken,
    ) -> Result<LayerReport, EngineError> {
        let BuildState::BuildingLayer(layer) = self.state else {
            return Err(EngineError::Internal(
                "next_layer called on a finished builder".to_string(),
            ));
        };
        tracing::Span::current().record("layer", layer);
        let limit = self.limits.max_graphs_per_layer;
        let mut report = LayerReport::new(layer);

        'parents: for parent in surviving {
            if stop.is_stopped() {
                report.interrupted = true;
                break;
            }
            let mut produced = false;
            for item in self.enumerator.extend(parent) {
                let child = match item {
                    Ok(child) => child,
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => {
                        warn!(parent = parent.fingerprint().short(), error = %e, "Skipping candidate.");
                        report.errors.push(e);
                        continue;
                    }
                };
                produced = true;
                if self.tree.contains(child.fingerprint()) {
                    report.duplicates += 1;
                    continue;
                }
                if report.len() >= limit {
                    report.capacity = Some(CapacityExceeded::LayerSize { layer, limit });
                    warn!(limit, "Layer ceiling reached; truncating enumeration.");
                    break 'parents;
                }
                let child = Arc::new(child);
                self.tree.insert(Arc::clone(&child));
                report.admit(child);
            }
            if !produced {
                report.dead += 1;
                debug!(parent = parent.fingerprint().short(), "Graph has no extension.");
            }
        }

        info!(
            complete = report.complete.len(),
            extendable = report.extendable.len(),
            dead = report.dead,
            duplicates = report.duplicates,
            errors = report.errors.len(),
            "Layer enumerated."
        );
        Ok(report)
    }

    /// Advances the state machine past `report` and names the ceiling that
    /// ended the exploration, if one did.
    pub fn conclude(&mut self, report: &LayerReport) -> Option<CapacityExceeded> {
        if report.interrupted {
            return None;
        }
        let (state, reason) = match report.capacity {
            Some(capacity) => (BuildState::Done { truncated: true }, Some(capacity)),
            None if report.extendable.is_empty() => (BuildState::Done { truncated: false }, None),
            None if report.layer >= self.limits.max_layers => (
                BuildState::Done { truncated: true },
                Some(CapacityExceeded::Depth {
                    limit: self.limits.max_layers,
                }),
            ),
            None => (BuildState::BuildingLayer(report.layer + 1), None),
        };
        self.state = state;
        reason
    }
}
