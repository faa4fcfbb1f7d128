use super::format::{self, FORMAT_VERSION, GraphRecord, LayerHeader, RecordError};
use crate::core::models::canon::Fingerprint;
use crate::core::models::graph::Graph;
use crate::core::models::outcome::TaskOutcome;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LayerStoreError {
    #[error("I/O error on '{path}' (layer {layer:?}): {source}")]
    Io {
        path: PathBuf,
        layer: Option<usize>,
        #[source]
        source: std::io::Error,
    },
    #[error("Layer {layer} is corrupt: {reason}")]
    Corrupt { layer: usize, reason: String },
    #[error("Failed to serialize layer {layer}: {source}")]
    Serialize {
        layer: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Layer store lock was poisoned")]
    Poisoned,
}

/// A layer read back from disk.
#[derive(Debug, Clone)]
pub struct PersistedLayer {
    pub layer: usize,
    pub graphs: Vec<Graph>,
    pub outcomes: HashMap<Fingerprint, TaskOutcome>,
}

impl PersistedLayer {
    pub fn complete_count(&self) -> usize {
        self.graphs.iter().filter(|g| g.is_complete()).count()
    }
}

/// Directory of durable, self-verifying layer files.
///
/// A layer is either fully written or absent: files are staged under a
/// temporary name in the same directory and renamed into place.
#[derive(Debug)]
pub struct LayerStore {
    root: PathBuf,
    write_locks: Mutex<HashMap<usize, Arc<Mutex<()>>>>,
}

impl LayerStore {
    /// Opens the store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LayerStoreError::Io`] if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LayerStoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| LayerStoreError::Io {
            path: root.clone(),
            layer: None,
            source: e,
        })?;
        Ok(Self {
            root,
            write_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layer_path(&self, layer: usize) -> PathBuf {
        self.root.join(format::file_name(layer))
    }

    /// Durably writes layer `layer`.
    ///
    /// # Arguments
    ///
    /// * `layer` - Index of the layer being written.
    /// * `graphs` - Every graph of the layer, complete and extendable.
    /// * `outcomes` - Evaluation outcomes of the dispatched graphs, by fingerprint.
    ///
    /// # Return
    ///
    /// The path of the sealed layer file.
    ///
    /// # Errors
    ///
    /// Returns [`LayerStoreError::Serialize`] or [`LayerStoreError::Io`]; on
    /// error no file for `layer` is left behind.
    pub fn persist(
        &self,
        layer: usize,
        graphs: &[Arc<Graph>],
        outcomes: &HashMap<Fingerprint, TaskOutcome>,
    ) -> Result<PathBuf, LayerStoreError> {
        let lock = self.write_lock(layer)?;
        let _guard = lock.lock().map_err(|_| LayerStoreError::Poisoned)?;

        let records: Vec<GraphRecord> = graphs
            .iter()
            .map(|g| GraphRecord::new(g, outcomes.get(g.fingerprint()).cloned()))
            .collect();
        let body = serde_json::to_vec(&records)
            .map_err(|e| LayerStoreError::Serialize { layer, source: e })?;
        let header = LayerHeader {
            format_version: FORMAT_VERSION,
            layer,
            graph_count: records.len(),
            checksum: format::checksum(&body),
            body_len: body.len(),
        };
        let header_line = serde_json::to_vec(&header)
            .map_err(|e| LayerStoreError::Serialize { layer, source: e })?;

        let path = self.layer_path(layer);
        let io_err = |source: std::io::Error| LayerStoreError::Io {
            path: path.clone(),
            layer: Some(layer),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root).map_err(io_err)?;
        tmp.write_all(&header_line).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.write_all(&body).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        info!(
            layer,
            graphs = records.len(),
            path = %path.display(),
            "Persisted layer."
        );
        Ok(path)
    }

    /// Reads layer `layer` back, verifying header, checksum and every fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`LayerStoreError::Corrupt`] for any inconsistency and
    /// [`LayerStoreError::Io`] if the file cannot be read.
    pub fn load(&self, layer: usize) -> Result<PersistedLayer, LayerStoreError> {
        let path = self.layer_path(layer);
        let content = fs::read(&path).map_err(|e| LayerStoreError::Io {
            path: path.clone(),
            layer: Some(layer),
            source: e,
        })?;
        let corrupt = |reason: String| LayerStoreError::Corrupt { layer, reason };

        let split = content
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| corrupt("missing header line".to_string()))?;
        let (header_bytes, rest) = content.split_at(split);
        let body = &rest[1..];

        let header: LayerHeader = serde_json::from_slice(header_bytes)
            .map_err(|e| corrupt(format!("unreadable header: {e}")))?;
        if header.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {}",
                header.format_version
            )));
        }
        if header.layer != layer {
            return Err(corrupt(format!("header names layer {}", header.layer)));
        }
        if header.body_len != body.len() {
            return Err(corrupt(format!(
                "truncated body: expected {} bytes, found {}",
                header.body_len,
                body.len()
            )));
        }
        if format::checksum(body) != header.checksum {
            return Err(corrupt("checksum mismatch".to_string()));
        }

        let records: Vec<GraphRecord> = serde_json::from_slice(body)
            .map_err(|e| corrupt(format!("unreadable body: {e}")))?;
        if records.len() != header.graph_count {
            return Err(corrupt(format!(
                "header declares {} graphs, body holds {}",
                header.graph_count,
                records.len()
            )));
        }

        let outcomes: HashMap<Fingerprint, TaskOutcome> = records
            .iter()
            .filter_map(|r| r.outcome.clone().map(|o| (r.fingerprint.clone(), o)))
            .collect();
        let graphs = records
            .into_par_iter()
            .map(|record| {
                if record.layer != layer {
                    return Err(corrupt(format!(
                        "graph {} claims layer {}",
                        record.fingerprint, record.layer
                    )));
                }
                Graph::try_from(record).map_err(|e: RecordError| corrupt(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(layer, graphs = graphs.len(), "Loaded layer.");
        Ok(PersistedLayer {
            layer,
            graphs,
            outcomes,
        })
    }

    /// Indices of all sealed layer files, ascending. Stray files are ignored.
    pub fn layers(&self) -> Result<Vec<usize>, LayerStoreError> {
        let entries = fs::read_dir(&self.root).map_err(|e| LayerStoreError::Io {
            path: self.root.clone(),
            layer: None,
            source: e,
        })?;
        let mut layers: Vec<usize> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().to_str().and_then(format::parse_file_name))
            .collect();
        layers.sort_unstable();
        Ok(layers)
    }

    pub fn latest_layer(&self) -> Result<Option<usize>, LayerStoreError> {
        Ok(self.layers()?.last().copied())
    }

    /// Removes every sealed layer file.
    pub fn clear(&self) -> Result<usize, LayerStoreError> {
        let layers = self.layers()?;
        for &layer in &layers {
            let path = self.layer_path(layer);
            fs::remove_file(&path).map_err(|e| LayerStoreError::Io {
                path,
                layer: Some(layer),
                source: e,
            })?;
        }
        if !layers.is_empty() {
            info!(removed = layers.len(), "Cleared persisted layers.");
        }
        Ok(layers.len())
    }

    fn write_lock(&self, layer: usize) -> Result<Arc<Mutex<()>>, LayerStoreError> {
        let mut locks = self
            .write_locks
            .lock()
            .map_err(|_| LayerStoreError::Poisoned)?;
        Ok(Arc::clone(locks.entry(layer).or_default()))
    }
}
