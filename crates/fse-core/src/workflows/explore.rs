use crate::core::fragspace::space::FragmentSpace;
use crate::core::io::layer_store::{LayerStore, PersistedLayer};
use crate::core::models::canon::Fingerprint;
use crate::core::models::outcome::TaskOutcome;
use crate::core::rings::geometry::{ConformerLibrary, GeometrySource};
use crate::core::rings::registry::{RingClosureEvaluator, RingConformationRegistry};
use crate::core::symmetry::{SymmetryResolver, TopologicalSymmetry};
use crate::engine::builder::{BuildState, CapacityExceeded, LayerReport, LayeredGraphBuilder};
use crate::engine::config::ExplorationConfig;
use crate::engine::dispatcher::{DispatchError, DispatcherSettings, TaskDispatcher};
use crate::engine::enumerator::CombinationEnumerator;
use crate::engine::error::EngineError;
use crate::engine::ledger::{LedgerSummary, ResultsLedger};
use crate::engine::pipeline::{EvaluationPipeline, NoopPipeline, ScriptPipeline};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::stop::StopToken;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// The externally supplied parts of an exploration.
#[derive(Clone)]
pub struct Collaborators {
    pub space: Arc<FragmentSpace>,
    pub pipeline: Arc<dyn EvaluationPipeline>,
    pub geometry: Option<Arc<dyn GeometrySource>>,
    pub symmetry: Option<Arc<dyn SymmetryResolver>>,
}

impl Collaborators {
    pub fn new(space: FragmentSpace, pipeline: Arc<dyn EvaluationPipeline>) -> Self {
        Self {
            space: Arc::new(space),
            pipeline,
            geometry: None,
            symmetry: None,
        }
    }

    pub fn with_geometry(mut self, geometry: Arc<dyn GeometrySource>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_symmetry(mut self, symmetry: Arc<dyn SymmetryResolver>) -> Self {
        self.symmetry = Some(symmetry);
        self
    }

    /// Loads the fragment space and conformer library named by `config` and
    /// picks the script pipeline, or the no-op one when none is configured.
    pub fn from_config(config: &ExplorationConfig) -> Result<Self, EngineError> {
        let space = FragmentSpace::load(&config.fragment_space_path)?;
        let pipeline: Arc<dyn EvaluationPipeline> = match &config.dispatch.pipeline {
            Some(p) => Arc::new(ScriptPipeline::new(p.command.clone(), p.args.clone())),
            None => Arc::new(NoopPipeline),
        };
        let mut collaborators = Self::new(space, pipeline);
        if let Some(path) = &config.rings.conformers_path {
            collaborators = collaborators.with_geometry(Arc::new(ConformerLibrary::load(path)?));
        }
        Ok(collaborators)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPoint {
    Fresh,
    Resumed { layer: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSummary {
    pub layer: usize,
    pub complete: usize,
    pub extendable: usize,
    pub dead: usize,
    pub duplicates: usize,
    pub errors: usize,
}

impl From<&LayerReport> for LayerSummary {
    fn from(report: &LayerReport) -> Self {
        Self {
            layer: report.layer,
            complete: report.complete.len(),
            extendable: report.extendable.len(),
            dead: report.dead,
            duplicates: report.duplicates,
            errors: report.errors.len(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExplorationSummary {
    pub layers: Vec<LayerSummary>,
    pub truncation: Option<CapacityExceeded>,
    pub stopped: bool,
    pub resumed_from: Option<usize>,
    pub results: LedgerSummary,
    pub enumeration_errors: usize,
}

impl ExplorationSummary {
    pub fn total_graphs(&self) -> usize {
        self.layers.iter().map(|l| l.complete + l.extendable).sum()
    }

    pub fn total_complete(&self) -> usize {
        self.layers.iter().map(|l| l.complete).sum()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncation.is_some()
    }
}

/// Opens the layer store and decides where the exploration starts.
///
/// With `config.resume` set, the latest persisted layer is loaded and becomes
/// the starting point; a corrupt latest layer is an error, never a silent
/// restart. Otherwise any persisted layers are removed and the run starts at
/// layer 0. Ring-closure results saved by earlier runs are loaded either way.
#[instrument(skip_all, name = "resume_or_start")]
pub fn resume_or_start(
    config: ExplorationConfig,
    collaborators: Collaborators,
) -> Result<LayeredExplorer, EngineError> {
    let store = LayerStore::open(&config.storage.db_root)?;

    let registry = if config.rings.archive_path.exists() {
        RingConformationRegistry::load(&config.rings.archive_path)?
    } else {
        RingConformationRegistry::new()
    };

    let resume = if config.resume {
        match store.latest_layer()? {
            Some(layer) => Some(store.load(layer)?),
            None => None,
        }
    } else {
        let removed = store.clear()?;
        if removed > 0 {
            warn!(removed, "Discarded persisted layers for a fresh start.");
        }
        None
    };

    let start = match &resume {
        Some(layer) => StartPoint::Resumed { layer: layer.layer },
        None => StartPoint::Fresh,
    };
    info!(?start, db_root = %config.storage.db_root.display(), "Exploration prepared.");

    let symmetry: Arc<dyn SymmetryResolver> = match &collaborators.symmetry {
        Some(symmetry) => Arc::clone(symmetry),
        None => Arc::new(TopologicalSymmetry::from_space(&collaborators.space)),
    };

    Ok(LayeredExplorer {
        config,
        collaborators,
        symmetry,
        store,
        registry: Arc::new(registry),
        ledger: Arc::new(ResultsLedger::new()),
        stop: StopToken::new(),
        start,
        resume,
    })
}

/// Top-level control loop: builds, evaluates and persists layer after layer
/// until the space is exhausted, a ceiling is hit, or a stop is requested.
pub struct LayeredExplorer {
    config: ExplorationConfig,
    collaborators: Collaborators,
    symmetry: Arc<dyn SymmetryResolver>,
    store: LayerStore,
    registry: Arc<RingConformationRegistry>,
    ledger: Arc<ResultsLedger>,
    stop: StopToken,
    start: StartPoint,
    resume: Option<PersistedLayer>,
}

impl LayeredExplorer {
    pub fn start_point(&self) -> StartPoint {
        self.start
    }

    /// Token that requests a graceful stop from any thread.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub fn ledger(&self) -> &Arc<ResultsLedger> {
        &self.ledger
    }

    pub fn registry(&self) -> &Arc<RingConformationRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    #[instrument(skip_all, name = "exploration_workflow")]
    pub fn run(&mut self, reporter: &ProgressReporter) -> Result<ExplorationSummary, EngineError> {
        // === Phase 0: Wiring ===
        let resume = self.resume.take();
        let dispatcher = TaskDispatcher::new(
            Arc::clone(&self.collaborators.pipeline),
            Arc::clone(&self.ledger),
            DispatcherSettings {
                max_concurrent_tasks: self.config.dispatch.max_concurrent_tasks,
                task_timeout: self.config.dispatch.task_timeout,
                work_dir: self.config.storage.work_dir.clone(),
            },
            self.stop.clone(),
        )?;
        let space = Arc::clone(&self.collaborators.space);
        let symmetry = Arc::clone(&self.symmetry);
        let registry = Arc::clone(&self.registry);
        let geometry = self.collaborators.geometry.clone();
        let evaluator = geometry
            .as_deref()
            .map(|g| RingClosureEvaluator::new(&registry, g));
        let mut enumerator = CombinationEnumerator::new(&space, symmetry.as_ref())
            .with_policy(self.config.symmetry);
        if let Some(evaluator) = &evaluator {
            enumerator = enumerator.with_ring_filter(evaluator);
        }
        let mut builder = LayeredGraphBuilder::new(enumerator, &space, self.config.limits.clone());
        let mut summary = ExplorationSummary::default();

        // === Phase 1: Starting layer ===
        let mut pending = match resume {
            Some(persisted) => {
                summary.resumed_from = Some(persisted.layer);
                for (fingerprint, outcome) in &persisted.outcomes {
                    self.ledger.record(fingerprint, outcome.clone());
                }
                let report = builder.resume(persisted.layer, persisted.graphs);
                summary.layers.push(LayerSummary::from(&report));
                if let Some(reason) = builder.conclude(&report) {
                    record_truncation(&mut summary, reason, reporter);
                }
                self.finish_layer(&mut builder, &report);
                Some(report.extendable)
            }
            None => {
                reporter.report(Progress::PhaseStart {
                    name: "Seeding",
                    layer: 0,
                });
                let roots = builder.seed_roots()?;
                reporter.report(Progress::PhaseFinish);
                if !self.settle_layer(&roots, &dispatcher, reporter)? {
                    summary.stopped = true;
                    None
                } else {
                    summary.layers.push(LayerSummary::from(&roots));
                    if let Some(reason) = builder.conclude(&roots) {
                        record_truncation(&mut summary, reason, reporter);
                    }
                    self.finish_layer(&mut builder, &roots);
                    Some(roots.extendable)
                }
            }
        };

        // === Phase 2: Layer loop ===
        while let Some(surviving) = pending.take() {
            let BuildState::BuildingLayer(layer) = builder.state() else {
                break;
            };
            if self.stop.is_stopped() {
                summary.stopped = true;
                break;
            }

            reporter.report(Progress::PhaseStart {
                name: "Enumerating",
                layer,
            });
            let report = builder.next_layer(&surviving, &self.stop)?;
            reporter.report(Progress::PhaseFinish);
            drop(surviving);

            if report.interrupted || !self.settle_layer(&report, &dispatcher, reporter)? {
                info!(layer, "Stop requested; layer discarded.");
                reporter.report(Progress::Message(format!(
                    "Stopped while building layer {layer}; it will be rebuilt on resume."
                )));
                summary.stopped = true;
                break;
            }
            summary.enumeration_errors += report.errors.len();
            summary.layers.push(LayerSummary::from(&report));
            if let Some(reason) = builder.conclude(&report) {
                record_truncation(&mut summary, reason, reporter);
            }
            self.finish_layer(&mut builder, &report);
            pending = Some(report.extendable);
        }

        // === Phase 3: Wrap-up ===
        dispatcher.drain();
        if !self.registry.is_empty()? {
            self.registry.save(&self.config.rings.archive_path)?;
        }
        summary.results = self.ledger.summary();
        info!(
            layers = summary.layers.len(),
            graphs = summary.total_graphs(),
            complete = summary.total_complete(),
            scored = summary.results.scored,
            stopped = summary.stopped,
            truncated = summary.is_truncated(),
            "Exploration finished."
        );
        Ok(summary)
    }

    /// Evaluates the complete graphs of `report`, waits for every outcome and
    /// persists the layer. Returns `false` when a stop prevented dispatch, in
    /// which case nothing is persisted.
    #[instrument(skip_all, name = "settle_layer", fields(layer = report.layer))]
    fn settle_layer(
        &self,
        report: &LayerReport,
        dispatcher: &TaskDispatcher,
        reporter: &ProgressReporter,
    ) -> Result<bool, EngineError> {
        reporter.report(Progress::PhaseStart {
            name: "Evaluating",
            layer: report.layer,
        });
        reporter.report(Progress::TaskStart {
            total_steps: report.complete.len() as u64,
        });

        let mut handles = Vec::with_capacity(report.complete.len());
        for graph in &report.complete {
            match dispatcher.submit(Arc::clone(graph)) {
                Ok(handle) => handles.push(handle),
                Err(DispatchError::Stopped) => {
                    dispatcher.drain();
                    reporter.report(Progress::TaskFinish);
                    reporter.report(Progress::PhaseFinish);
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut outcomes: HashMap<Fingerprint, TaskOutcome> = HashMap::with_capacity(handles.len());
        for handle in handles {
            let outcome = handle.wait();
            reporter.report(Progress::TaskIncrement);
            outcomes.insert(handle.fingerprint().clone(), outcome);
        }
        dispatcher.drain();
        reporter.report(Progress::TaskFinish);
        reporter.report(Progress::PhaseFinish);

        let graphs: Vec<_> = report.graphs().cloned().collect();
        self.store.persist(report.layer, &graphs, &outcomes)?;
        Ok(true)
    }

    fn finish_layer(&self, builder: &mut LayeredGraphBuilder<'_>, report: &LayerReport) {
        let tree = builder.tree_mut();
        if report.layer > 0 {
            tree.evict_layer(report.layer - 1);
        }
        for graph in &report.complete {
            tree.evict(graph.fingerprint());
        }
    }
}

fn record_truncation(
    summary: &mut ExplorationSummary,
    reason: CapacityExceeded,
    reporter: &ProgressReporter,
) {
    warn!(%reason, "Exploration truncated.");
    reporter.report(Progress::Message(format!("Truncated: {reason}")));
    summary.truncation = Some(reason);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::ExplorationConfigBuilder;
    use crate::engine::pipeline::{Evaluation, EvaluationRequest, TaskError};
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

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

    fn wide_space(fragments: usize) -> String {
        let mut content = PAIR_SPACE
            .split("[[fragments]]")
            .next()
            .unwrap()
            .to_string();
        for i in 0..fragments {
            content.push_str(&format!("[[fragments]]\nname = \"f{i}\"\naps = [{{ class = \"A\" }}]\n\n"));
        }
        content
    }

    #[derive(Default)]
    struct CountingPipeline {
        calls: AtomicUsize,
        seen: Mutex<Vec<Fingerprint>>,
    }

    impl EvaluationPipeline for CountingPipeline {
        fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, TaskError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.fingerprint.clone());
            Ok(Evaluation::Scored(request.graph.vertices().len() as f64))
        }
    }

    fn config(db_root: &Path, max_layers: usize, max_graphs: usize, resume: bool) -> ExplorationConfig {
        ExplorationConfigBuilder::new()
            .fragment_space_path(db_root.join("space.toml"))
            .db_root(db_root.to_path_buf())
            .max_layers(max_layers)
            .max_graphs_per_layer(max_graphs)
            .max_concurrent_tasks(2)
            .resume(resume)
            .build()
            .unwrap()
    }

    fn explore(
        dir: &TempDir,
        space: &str,
        limits: (usize, usize),
        resume: bool,
    ) -> (ExplorationSummary, Arc<CountingPipeline>) {
        let pipeline = Arc::new(CountingPipeline::default());
        let collaborators = Collaborators::new(
            FragmentSpace::from_toml_str(space).unwrap(),
            Arc::clone(&pipeline) as Arc<dyn EvaluationPipeline>,
        );
        let mut explorer =
            resume_or_start(config(dir.path(), limits.0, limits.1, resume), collaborators).unwrap();
        let summary = explorer.run(&ProgressReporter::new()).unwrap();
        (summary, pipeline)
    }

    #[test]
    fn two_compatible_fragments_give_two_evaluated_graphs() {
        let dir = tempfile::tempdir().unwrap();
        let (summary, pipeline) = explore(&dir, PAIR_SPACE, (5, 100), false);

        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 2);
        assert_eq!(summary.layers.len(), 2);
        assert_eq!(summary.layers[0].extendable, 1);
        assert_eq!(summary.layers[1].complete, 2);
        assert_eq!(summary.truncation, None);
        assert!(!summary.stopped);
        assert_eq!(summary.results.scored, 2);
        assert_eq!(summary.results.best.as_ref().map(|(_, v)| *v), Some(2.0));

        let seen = pipeline.seen.lock().unwrap();
        assert_ne!(seen[0], seen[1]);
    }

    #[test]
    fn equivalent_candidates_are_evaluated_once() {
        let dir = tempfile::tempdir().unwrap();
        let space = format!("{PAIR_SPACE}\n[[equivalent-candidates]]\nap-class = \"A\"\nblocks = [0, 1]\n");
        let (summary, pipeline) = explore(&dir, &space, (5, 100), false);

        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 1);
        assert_eq!(summary.total_complete(), 1);
    }

    #[test]
    fn layer_ceiling_truncates_and_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (summary, pipeline) = explore(&dir, &wide_space(5), (5, 1), false);

        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 1);
        assert_eq!(summary.layers[1].complete, 1);
        assert_eq!(
            summary.truncation,
            Some(CapacityExceeded::LayerSize { layer: 1, limit: 1 })
        );
        assert!(summary.is_truncated());
    }

    #[test]
    fn truncation_is_announced_to_the_reporter() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline: Arc<dyn EvaluationPipeline> = Arc::new(NoopPipeline);
        let collaborators =
            Collaborators::new(FragmentSpace::from_toml_str(&wide_space(5)).unwrap(), pipeline);
        let mut explorer =
            resume_or_start(config(dir.path(), 5, 1, false), collaborators).unwrap();

        let messages = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event: Progress| {
            if let Progress::Message(text) = event {
                messages.lock().unwrap().push(text);
            }
        }));
        explorer.run(&reporter).unwrap();
        drop(reporter);

        let messages = messages.into_inner().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Truncated: layer 1"));
    }

    #[test]
    fn every_settled_layer_is_persisted_with_its_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        explore(&dir, PAIR_SPACE, (5, 100), false);

        let store = LayerStore::open(dir.path()).unwrap();
        assert_eq!(store.layers().unwrap(), vec![0, 1]);
        let layer = store.load(1).unwrap();
        assert_eq!(layer.complete_count(), 2);
        assert_eq!(layer.outcomes.len(), 2);
        assert!(layer.outcomes.values().all(|o| o.score() == Some(2.0)));
    }

    #[test]
    fn resume_continues_after_the_latest_layer() {
        let dir = tempfile::tempdir().unwrap();
        let (first, pipeline) = explore(&dir, PAIR_SPACE, (0, 100), false);
        assert_eq!(first.truncation, Some(CapacityExceeded::Depth { limit: 0 }));
        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 0);

        let (second, pipeline) = explore(&dir, PAIR_SPACE, (5, 100), true);
        assert_eq!(second.resumed_from, Some(0));
        assert_eq!(second.layers.len(), 2);
        assert_eq!(second.layers[1].layer, 1);
        assert_eq!(second.layers[1].complete, 2);
        assert_eq!(second.truncation, None);
        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn resuming_a_finished_run_evaluates_nothing_again() {
        let dir = tempfile::tempdir().unwrap();
        explore(&dir, PAIR_SPACE, (5, 100), false);

        let (summary, pipeline) = explore(&dir, PAIR_SPACE, (5, 100), true);
        assert_eq!(summary.resumed_from, Some(1));
        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 0);
        assert_eq!(summary.results.scored, 2);
    }

    #[test]
    fn fresh_start_discards_persisted_layers() {
        let dir = tempfile::tempdir().unwrap();
        explore(&dir, PAIR_SPACE, (5, 100), false);

        let pipeline: Arc<dyn EvaluationPipeline> = Arc::new(CountingPipeline::default());
        let collaborators =
            Collaborators::new(FragmentSpace::from_toml_str(PAIR_SPACE).unwrap(), pipeline);
        let explorer = resume_or_start(config(dir.path(), 5, 100, false), collaborators).unwrap();
        assert_eq!(explorer.start_point(), StartPoint::Fresh);
        assert_eq!(explorer.store().latest_layer().unwrap(), None);
    }

    #[test]
    fn corrupt_latest_layer_refuses_to_resume() {
        let dir = tempfile::tempdir().unwrap();
        explore(&dir, PAIR_SPACE, (5, 100), false);
        let path = LayerStore::open(dir.path()).unwrap().layer_path(1);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 5);
        std::fs::write(&path, bytes).unwrap();

        let pipeline: Arc<dyn EvaluationPipeline> = Arc::new(NoopPipeline);
        let collaborators =
            Collaborators::new(FragmentSpace::from_toml_str(PAIR_SPACE).unwrap(), pipeline);
        let result = resume_or_start(config(dir.path(), 5, 100, true), collaborators);
        assert!(matches!(result, Err(EngineError::LayerStore { .. })));
    }

    #[test]
    fn identical_runs_produce_identical_layers() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let space = wide_space(3);
        explore(&first, &space, (5, 100), false);
        explore(&second, &space, (5, 100), false);

        let a = LayerStore::open(first.path()).unwrap().load(1).unwrap();
        let b = LayerStore::open(second.path()).unwrap().load(1).unwrap();
        let fingerprints = |layer: &PersistedLayer| {
            layer
                .graphs
                .iter()
                .map(|g| g.fingerprint().clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(fingerprints(&a), fingerprints(&b));
    }

    #[test]
    fn a_stop_before_the_run_keeps_only_the_seeded_layer() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Arc::new(CountingPipeline::default());
        let collaborators = Collaborators::new(
            FragmentSpace::from_toml_str(PAIR_SPACE).unwrap(),
            Arc::clone(&pipeline) as Arc<dyn EvaluationPipeline>,
        );
        let mut explorer =
            resume_or_start(config(dir.path(), 5, 100, false), collaborators).unwrap();
        explorer.stop_token().request_stop();
        let summary = explorer.run(&ProgressReporter::new()).unwrap();

        assert!(summary.stopped);
        assert_eq!(summary.layers.len(), 1);
        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 0);
        assert_eq!(explorer.store().layers().unwrap(), vec![0]);
    }

    #[test]
    fn progress_events_bracket_each_phase() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline: Arc<dyn EvaluationPipeline> = Arc::new(NoopPipeline);
        let collaborators =
            Collaborators::new(FragmentSpace::from_toml_str(PAIR_SPACE).unwrap(), pipeline);
        let mut explorer =
            resume_or_start(config(dir.path(), 5, 100, false), collaborators).unwrap();

        let increments = AtomicUsize::new(0);
        let phases = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event: Progress| match event {
            Progress::PhaseStart { name, layer } => phases.lock().unwrap().push((name, layer)),
            Progress::TaskIncrement => {
                increments.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }));
        let summary = explorer.run(&reporter).unwrap();

        assert_eq!(increments.load(Ordering::SeqCst), 2);
        assert_eq!(summary.results.rejected, 2);
        assert_eq!(
            *phases.lock().unwrap(),
            vec![
                ("Seeding", 0),
                ("Evaluating", 0),
                ("Enumerating", 1),
                ("Evaluating", 1)
            ]
        );
    }

    #[test]
    fn collaborators_load_from_configured_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("space.toml"), PAIR_SPACE).unwrap();
        let config = config(dir.path(), 5, 100, false);

        let collaborators = Collaborators::from_config(&config).unwrap();
        assert_eq!(collaborators.space.scaffold_count(), 1);
        assert!(collaborators.geometry.is_none());

        let mut explorer = resume_or_start(config, collaborators).unwrap();
        let summary = explorer.run(&ProgressReporter::new()).unwrap();
        assert_eq!(summary.results.rejected, 2);
    }
}
