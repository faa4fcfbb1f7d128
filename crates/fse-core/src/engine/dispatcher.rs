use super::ledger::{ResultsLedger, TaskHandle};
use super::pipeline::{Evaluation, EvaluationPipeline, EvaluationRequest, TaskError};
use super::stop::StopToken;
use crate::core::io::format::GraphRecord;
use crate::core::models::graph::Graph;
use crate::core::models::outcome::TaskOutcome;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const INPUT_FILE: &str = "graph.json";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatcher is stopping; no new tasks are accepted")]
    Stopped,
    #[error("Failed to build the task pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub max_concurrent_tasks: usize,
    pub task_timeout: Duration,
    pub work_dir: PathBuf,
}

#[derive(Debug, Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn enter(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn leave(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn current(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self
                .idle
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Runs one evaluation task per distinct complete graph on a bounded pool.
///
/// Submitting a fingerprint that was already submitted returns a handle to
/// the existing task instead of starting another. A failing task only
/// affects its own outcome.
pub struct TaskDispatcher {
    pool: rayon::ThreadPool,
    pipeline: Arc<dyn EvaluationPipeline>,
    ledger: Arc<ResultsLedger>,
    settings: Arc<DispatcherSettings>,
    stop: StopToken,
    in_flight: Arc<InFlight>,
}

impl TaskDispatcher {
    pub fn new(
        pipeline: Arc<dyn EvaluationPipeline>,
        ledger: Arc<ResultsLedger>,
        settings: DispatcherSettings,
        stop: StopToken,
    ) -> Result<Self, DispatchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.max_concurrent_tasks.max(1))
            .thread_name(|i| format!("fse-task-{i}"))
            .build()?;
        Ok(Self {
            pool,
            pipeline,
            ledger,
            settings: Arc::new(settings),
            stop,
            in_flight: Arc::new(InFlight::default()),
        })
    }

    pub fn ledger(&self) -> &Arc<ResultsLedger> {
        &self.ledger
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.current()
    }

    pub fn submit(&self, graph: Arc<Graph>) -> Result<TaskHandle, DispatchError> {
        if self.stop.is_stopped() {
            return Err(DispatchError::Stopped);
        }
        let fingerprint = graph.fingerprint().clone();
        let (slot, fresh) = self.ledger.claim(&fingerprint);
        if !fresh {
            debug!(fingerprint = fingerprint.short(), "Coalesced with an existing task.");
            return Ok(TaskHandle::new(fingerprint, slot));
        }

        self.in_flight.enter();
        let pipeline = Arc::clone(&self.pipeline);
        let settings = Arc::clone(&self.settings);
        let in_flight = Arc::clone(&self.in_flight);
        let task_slot = Arc::clone(&slot);
        self.pool.spawn(move || {
            let outcome = run_task(pipeline.as_ref(), &graph, &settings);
            task_slot.fill(outcome);
            in_flight.leave();
        });
        Ok(TaskHandle::new(fingerprint, slot))
    }

    /// Blocks until every submitted task is terminal.
    pub fn drain(&self) {
        self.in_flight.wait_idle();
    }
}

fn run_task(pipeline: &dyn EvaluationPipeline, graph: &Arc<Graph>, settings: &DispatcherSettings) -> TaskOutcome {
    let fingerprint = graph.fingerprint();
    let request = match materialize(graph, settings) {
        Ok(request) => request,
        Err(e) => {
            warn!(fingerprint = fingerprint.short(), error = %e, "Could not prepare task.");
            return TaskOutcome::Errored {
                reason: e.to_string(),
            };
        }
    };

    debug!(fingerprint = fingerprint.short(), "Task started.");
    let result = panic::catch_unwind(AssertUnwindSafe(|| pipeline.evaluate(&request)))
        .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));

    let outcome = match result {
        Ok(Evaluation::Scored(value)) => TaskOutcome::Scored { value },
        Ok(Evaluation::Rejected(reason)) => TaskOutcome::Rejected { reason },
        Err(e) => {
            warn!(fingerprint = fingerprint.short(), error = %e, "Task failed.");
            TaskOutcome::Errored {
                reason: e.to_string(),
            }
        }
    };
    info!(fingerprint = fingerprint.short(), outcome = %outcome, "Task finished.");
    outcome
}

fn materialize(graph: &Arc<Graph>, settings: &DispatcherSettings) -> Result<EvaluationRequest, TaskError> {
    let work_dir = settings.work_dir.join(graph.fingerprint().as_str());
    std::fs::create_dir_all(&work_dir).map_err(|e| TaskError::Io {
        path: work_dir.clone(),
        source: e,
    })?;
    let input_path = work_dir.join(INPUT_FILE);
    let body = serde_json::to_vec_pretty(&GraphRecord::new(graph, None)).map_err(|e| {
        TaskError::MalformedOutput {
            path: input_path.clone(),
            reason: e.to_string(),
        }
    })?;
    std::fs::write(&input_path, body).map_err(|e| TaskError::Io {
        path: input_path.clone(),
        source: e,
    })?;
    Ok(EvaluationRequest {
        fingerprint: graph.fingerprint().clone(),
        graph: Arc::clone(graph),
        work_dir,
        input_path,
        timeout: settings.task_timeout,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
