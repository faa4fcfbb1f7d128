use crate::core::models::canon::Fingerprint;
use crate::core::models::edge::Edge;
use crate::core::models::graph::{Graph, GraphError};
use crate::core::models::outcome::TaskOutcome;
use crate::core::models::vertex::Vertex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const FORMAT_VERSION: u32 = 1;

const FILE_PREFIX: &str = "layer_";
const FILE_SUFFIX: &str = ".json";

/// First line of a layer file. The body that follows is a JSON array of
/// [`GraphRecord`]s whose raw bytes hash to `checksum`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerHeader {
    pub format_version: u32,
    pub layer: usize,
    pub graph_count: usize,
    pub checksum: String,
    pub body_len: usize,
}

/// Stored form of one graph of a layer, with its evaluation outcome if the
/// graph was dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub fingerprint: Fingerprint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Fingerprint>,
    pub layer: usize,
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TaskOutcome>,
}

impl GraphRecord {
    pub fn new(graph: &Graph, outcome: Option<TaskOutcome>) -> Self {
        Self {
            fingerprint: graph.fingerprint().clone(),
            parent: graph.parent().cloned(),
            layer: graph.layer(),
            vertices: graph.vertices().to_vec(),
            edges: graph.edges().to_vec(),
            complete: graph.is_complete(),
            outcome,
        }
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("stored graph violates a structural invariant: {0}")]
    Invalid(#[from] GraphError),
    #[error("stored fingerprint {stored} does not match recomputed {actual}")]
    FingerprintMismatch {
        stored: Fingerprint,
        actual: Fingerprint,
    },
}

impl TryFrom<GraphRecord> for Graph {
    type Error = RecordError;

    fn try_from(record: GraphRecord) -> Result<Self, Self::Error> {
        let graph = Graph::from_parts(
            record.vertices,
            record.edges,
            record.layer,
            record.parent,
            record.complete,
        )?;
        if graph.fingerprint() != &record.fingerprint {
            return Err(RecordError::FingerprintMismatch {
                stored: record.fingerprint,
                actual: graph.fingerprint().clone(),
            });
        }
        Ok(graph)
    }
}

pub fn checksum(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

pub fn file_name(layer: usize) -> String {
    format!("{FILE_PREFIX}{layer:04}{FILE_SUFFIX}")
}

/// Layer index encoded in a sealed layer file name, `None` for anything else.
pub fn parse_file_name(name: &str) -> Option<usize> {
    let digits = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
