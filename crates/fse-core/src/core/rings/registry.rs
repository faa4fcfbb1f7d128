use super::chain::{ChainIdentity, ChainPath};
use super::conformations::RingClosingConformations;
use super::geometry::{GeometryError, GeometrySource, MIN_REFERENCE_POINTS};
use crate::core::models::graph::Graph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_SHARDS: usize = 16;
const ARCHIVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Ring-closure record of chain '{chain}' was written twice")]
    Conflict { chain: ChainIdentity },
    #[error("Ring-closing conformation of chain '{chain}' has {found} dihedrals, expected {expected}")]
    LengthMismatch {
        chain: ChainIdentity,
        expected: usize,
        found: usize,
    },
    #[error("Geometry lookup failed: {0}")]
    Geometry(#[from] GeometryError),
    #[error("Ring-closure archive '{path}': {reason}")]
    Archive { path: PathBuf, reason: String },
    #[error("Ring-closure registry lock was poisoned")]
    Poisoned,
}

impl RegistryError {
    /// A chain written twice or a poisoned lock leaves the registry untrustworthy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Poisoned)
    }
}

/// Decides whether closing `chain` into a ring is geometrically possible.
pub trait RingClosureFilter: Send + Sync {
    fn is_closable(&self, graph: &Graph, chain: &ChainPath) -> Result<bool, RegistryError>;
}

/// The slot mutex is the single writer of its key: it is held from the
/// emptiness check until the record is stored.
#[derive(Default)]
struct KeySlot {
    record: Mutex<Option<Arc<RingClosingConformations>>>,
}

#[derive(Serialize, Deserialize)]
struct Archive {
    version: u32,
    records: Vec<RingClosingConformations>,
}

/// Process-wide cache of ring-closing conformations keyed by chain identity.
///
/// Each key is computed at most once: a lookup holds the key's own lock while
/// computing, so concurrent lookups of the same chain wait for the first one
/// and lookups of other chains proceed in parallel. Records never change once
/// stored.
pub struct RingConformationRegistry {
    shards: Vec<Mutex<HashMap<ChainIdentity, Arc<KeySlot>>>>,
}

impl Default for RingConformationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RingConformationRegistry {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    pub fn with_shards(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    /// The stored record for `chain`, computing and caching it on first use.
    pub fn find_closable_conformations(
        &self,
        chain: &ChainPath,
        graph: &Graph,
        geometry: &dyn GeometrySource,
    ) -> Result<Arc<RingClosingConformations>, RegistryError> {
        let slot = self.slot(chain.identity())?;
        let mut record = lock(&slot.record)?;
        if let Some(existing) = record.as_ref() {
            return Ok(Arc::clone(existing));
        }

        let computed = Arc::new(compute(chain, graph, geometry)?);
        debug!(
            chain = %chain.identity(),
            closable = computed.number_of_conformations(),
            "Computed ring-closing conformations."
        );
        *record = Some(Arc::clone(&computed));
        Ok(computed)
    }

    pub fn get(&self, chain: &ChainIdentity) -> Result<Option<Arc<RingClosingConformations>>, RegistryError> {
        let shard = lock(self.shard(chain))?;
        let Some(slot) = shard.get(chain).cloned() else {
            return Ok(None);
        };
        drop(shard);
        let record = lock(&slot.record)?;
        Ok(record.clone())
    }

    /// Stores a precomputed record. Returns `false` when the chain already has one.
    pub fn insert(&self, record: RingClosingConformations) -> Result<bool, RegistryError> {
        record.validate()?;
        let slot = self.slot(record.chain_id())?;
        let mut stored = lock(&slot.record)?;
        if stored.is_some() {
            return Ok(false);
        }
        *stored = Some(Arc::new(record));
        Ok(true)
    }

    /// All stored records, ordered by chain identity.
    pub fn records(&self) -> Result<Vec<Arc<RingClosingConformations>>, RegistryError> {
        let mut slots = Vec::new();
        for shard in &self.shards {
            slots.extend(lock(shard)?.values().cloned());
        }
        let mut records = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(record) = lock(&slot.record)?.as_ref() {
                records.push(Arc::clone(record));
            }
        }
        records.sort_by(|a, b| a.chain_id().cmp(b.chain_id()));
        Ok(records)
    }

    pub fn len(&self) -> Result<usize, RegistryError> {
        Ok(self.records()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.len()? == 0)
    }

    /// Writes every record to `path` as a JSON archive, replacing it atomically.
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let archive = Archive {
            version: ARCHIVE_VERSION,
            records: self
                .records()?
                .into_iter()
                .map(|r| RingClosingConformations::clone(&r))
                .collect(),
        };
        let archive_err = |reason: String| RegistryError::Archive {
            path: path.to_path_buf(),
            reason,
        };
        let body = serde_json::to_vec_pretty(&archive).map_err(|e| archive_err(e.to_string()))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| archive_err(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| archive_err(e.to_string()))?;
        tmp.write_all(&body).map_err(|e| archive_err(e.to_string()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| archive_err(e.to_string()))?;
        tmp.persist(path).map_err(|e| archive_err(e.error.to_string()))?;

        info!(path = %path.display(), records = archive.records.len(), "Saved ring-closure archive.");
        Ok(())
    }

    /// Rebuilds a registry from an archive written by [`Self::save`].
    ///
    /// An archive holding two records for one chain is a [`RegistryError::Conflict`].
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let archive_err = |reason: String| RegistryError::Archive {
            path: path.to_path_buf(),
            reason,
        };
        let content = std::fs::read(path).map_err(|e| archive_err(e.to_string()))?;
        let archive: Archive =
            serde_json::from_slice(&content).map_err(|e| archive_err(e.to_string()))?;
        if archive.version != ARCHIVE_VERSION {
            return Err(archive_err(format!(
                "unsupported archive version {}",
                archive.version
            )));
        }

        let registry = Self::new();
        for record in archive.records {
            let chain = record.chain_id().clone();
            if !registry.insert(record)? {
                return Err(RegistryError::Conflict { chain });
            }
        }
        info!(path = %path.display(), "Loaded ring-closure archive.");
        Ok(registry)
    }

    fn shard(&self, chain: &ChainIdentity) -> &Mutex<HashMap<ChainIdentity, Arc<KeySlot>>> {
        let mut hasher = DefaultHasher::new();
        chain.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    fn slot(&self, chain: &ChainIdentity) -> Result<Arc<KeySlot>, RegistryError> {
        let mut shard = lock(self.shard(chain))?;
        Ok(Arc::clone(shard.entry(chain.clone()).or_default()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RegistryError> {
    mutex.lock().map_err(|_| RegistryError::Poisoned)
}

fn compute(
    chain: &ChainPath,
    graph: &Graph,
    geometry: &dyn GeometrySource,
) -> Result<RingClosingConformations, RegistryError> {
    let threshold = geometry.closure_threshold(chain);
    let mut record = RingClosingConformations::new(chain.identity().clone());
    for conformer in geometry.candidate_conformers(chain, graph)? {
        if conformer.points.len() < MIN_REFERENCE_POINTS {
            return Err(GeometryError::TooFewPoints {
                chain: chain.identity().clone(),
                found: conformer.points.len(),
            }
            .into());
        }
        if conformer.is_closable(&threshold) {
            record.push(conformer.dihedral_signature())?;
        }
    }
    Ok(record)
}

/// [`RingClosureFilter`] backed by the registry: a chain is closable when at
/// least one ring-closing conformation exists for it.
pub struct RingClosureEvaluator<'a> {
    registry: &'a RingConformationRegistry,
    geometry: &'a dyn GeometrySource,
}

impl<'a> RingClosureEvaluator<'a> {
    pub fn new(registry: &'a RingConformationRegistry, geometry: &'a dyn GeometrySource) -> Self {
        Self { registry, geometry }
    }
}

impl RingClosureFilter for RingClosureEvaluator<'_> {
    fn is_closable(&self, graph: &Graph, chain: &ChainPath) -> Result<bool, RegistryError> {
        let record = self
            .registry
            .find_closable_conformations(chain, graph, self.geometry)?;
        Ok(!record.is_empty())
    }
}
