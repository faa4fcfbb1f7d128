use crate::core::models::canon::Fingerprint;
use crate::core::models::outcome::TaskOutcome;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to export results to '{path}': {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write-once cell holding the outcome of one fingerprint's task.
#[derive(Debug, Default)]
pub(crate) struct TaskSlot {
    outcome: Mutex<Option<TaskOutcome>>,
    ready: Condvar,
}

impl TaskSlot {
    /// Stores `outcome` unless the slot is already terminal.
    pub(crate) fn fill(&self, outcome: TaskOutcome) -> bool {
        let mut stored = lock(&self.outcome);
        if stored.is_some() {
            return false;
        }
        *stored = Some(outcome);
        self.ready.notify_all();
        true
    }

    pub(crate) fn peek(&self) -> Option<TaskOutcome> {
        lock(&self.outcome).clone()
    }

    pub(crate) fn wait(&self) -> TaskOutcome {
        let mut stored = lock(&self.outcome);
        loop {
            if let Some(outcome) = stored.as_ref() {
                return outcome.clone();
            }
            stored = self
                .ready
                .wait(stored)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Waits on the outcome of a submitted graph.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    fingerprint: Fingerprint,
    slot: Arc<TaskSlot>,
}

impl TaskHandle {
    pub(crate) fn new(fingerprint: Fingerprint, slot: Arc<TaskSlot>) -> Self {
        Self { fingerprint, slot }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Blocks until the task is terminal.
    pub fn wait(&self) -> TaskOutcome {
        self.slot.wait()
    }

    pub fn try_outcome(&self) -> Option<TaskOutcome> {
        self.slot.peek()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerSummary {
    pub scored: usize,
    pub errored: usize,
    pub rejected: usize,
    pub pending: usize,
    /// Highest fitness among scored graphs; higher is better.
    pub best: Option<(Fingerprint, f64)>,
}

#[derive(Serialize)]
struct CsvRow<'a> {
    fingerprint: &'a str,
    status: &'static str,
    fitness: Option<f64>,
    reason: Option<&'a str>,
}

/// Fingerprint-keyed record of every task ever claimed in this run.
///
/// A fingerprint is claimed at most once; its slot is written exactly once.
#[derive(Debug, Default)]
pub struct ResultsLedger {
    slots: Mutex<HashMap<Fingerprint, Arc<TaskSlot>>>,
}

impl ResultsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot of `fingerprint`, and whether this call created it.
    pub(crate) fn claim(&self, fingerprint: &Fingerprint) -> (Arc<TaskSlot>, bool) {
        let mut slots = lock(&self.slots);
        match slots.get(fingerprint) {
            Some(slot) => (Arc::clone(slot), false),
            None => {
                let slot = Arc::new(TaskSlot::default());
                slots.insert(fingerprint.clone(), Arc::clone(&slot));
                (slot, true)
            }
        }
    }

    /// Records an outcome obtained elsewhere, e.g. read back from a persisted layer.
    pub fn record(&self, fingerprint: &Fingerprint, outcome: TaskOutcome) -> bool {
        let (slot, _) = self.claim(fingerprint);
        slot.fill(outcome)
    }

    pub fn outcome(&self, fingerprint: &Fingerprint) -> Option<TaskOutcome> {
        let slot = lock(&self.slots).get(fingerprint).cloned()?;
        slot.peek()
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Terminal outcomes, ordered by fingerprint.
    pub fn snapshot(&self) -> BTreeMap<Fingerprint, TaskOutcome> {
        let slots: Vec<(Fingerprint, Arc<TaskSlot>)> = lock(&self.slots)
            .iter()
            .map(|(fp, slot)| (fp.clone(), Arc::clone(slot)))
            .collect();
        slots
            .into_iter()
            .filter_map(|(fp, slot)| slot.peek().map(|outcome| (fp, outcome)))
            .collect()
    }

    pub fn summary(&self) -> LedgerSummary {
        let total = self.len();
        let mut summary = LedgerSummary::default();
        let snapshot = self.snapshot();
        for (fingerprint, outcome) in &snapshot {
            match outcome {
                TaskOutcome::Scored { value } => {
                    summary.scored += 1;
                    if summary.best.as_ref().is_none_or(|(_, best)| value > best) {
                        summary.best = Some((fingerprint.clone(), *value));
                    }
                }
                TaskOutcome::Errored { .. } => summary.errored += 1,
                TaskOutcome::Rejected { .. } => summary.rejected += 1,
            }
        }
        summary.pending = total.saturating_sub(snapshot.len());
        summary
    }

    /// Writes every terminal outcome as CSV. Returns the number of rows.
    pub fn write_csv(&self, path: &Path) -> Result<usize, LedgerError> {
        let export_err = |source: csv::Error| LedgerError::Export {
            path: path.to_path_buf(),
            source,
        };
        let snapshot = self.snapshot();
        let mut writer = csv::Writer::from_path(path).map_err(export_err)?;
        for (fingerprint, outcome) in &snapshot {
            let reason = match outcome {
                TaskOutcome::Errored { reason } | TaskOutcome::Rejected { reason } => {
                    Some(reason.as_str())
                }
                TaskOutcome::Scored { .. } => None,
            };
            writer
                .serialize(CsvRow {
                    fingerprint: fingerprint.as_str(),
                    status: outcome.label(),
                    fitness: outcome.score(),
                    reason,
                })
                .map_err(export_err)?;
        }
        writer
            .flush()
            .map_err(|e| export_err(csv::Error::from(e)))?;
        Ok(snapshot.len())
    }
}
