//! Three-dimensional conformers of open chains and the test deciding whether
//! a conformer brings the chain's two ends close enough to form a ring bond.
//!
//! Reference points of a conformer follow a fixed convention: `points[0]` is
//! the head AP point, `points[1]` the head atom, `points[n - 2]` the tail
//! atom and `points[n - 1]` the tail AP point. A ring can close when each AP
//! point lands on the opposite end's atom and the two AP vectors point at
//! each other.

use super::chain::{ChainIdentity, ChainPath};
use crate::core::models::graph::Graph;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fewest reference points a conformer can have: two per chain end.
pub const MIN_REFERENCE_POINTS: usize = 4;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Conformer for chain '{chain}' has {found} reference points; at least {min} are required", min = MIN_REFERENCE_POINTS)]
    TooFewPoints { chain: ChainIdentity, found: usize },
    #[error("Geometry unavailable for chain '{chain}': {reason}")]
    Unavailable { chain: ChainIdentity, reason: String },
    #[error("Failed to read conformer library '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse conformer library '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Tolerances for ring closability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClosureThreshold {
    /// Largest distance (Å) between an AP point and the opposite end's atom.
    pub max_distance: f64,
    /// Largest deviation (degrees) of the two AP vectors from antiparallel.
    pub max_angle_deg: f64,
}

impl Default for ClosureThreshold {
    fn default() -> Self {
        Self {
            max_distance: 0.6,
            max_angle_deg: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainConformer {
    pub points: Vec<Point3<f64>>,
}

impl ChainConformer {
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    pub fn is_closable(&self, threshold: &ClosureThreshold) -> bool {
        let n = self.points.len();
        if n < MIN_REFERENCE_POINTS {
            return false;
        }
        let (head_ap, head_atom) = (&self.points[0], &self.points[1]);
        let (tail_atom, tail_ap) = (&self.points[n - 2], &self.points[n - 1]);

        if nalgebra::distance(head_ap, tail_atom) > threshold.max_distance
            || nalgebra::distance(tail_ap, head_atom) > threshold.max_distance
        {
            return false;
        }

        let head_vec = head_ap - head_atom;
        let tail_vec = tail_ap - tail_atom;
        if head_vec.norm() == 0.0 || tail_vec.norm() == 0.0 {
            return false;
        }
        let deviation = 180.0 - head_vec.angle(&tail_vec).to_degrees();
        deviation <= threshold.max_angle_deg
    }

    /// Dihedral angles of every run of four consecutive reference points.
    pub fn dihedral_signature(&self) -> Vec<f64> {
        self.points
            .windows(4)
            .map(|w| dihedral_deg(&w[0], &w[1], &w[2], &w[3]))
            .collect()
    }
}

/// Signed dihedral angle in degrees, in `(-180, 180]`.
pub fn dihedral_deg(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>, p3: &Point3<f64>) -> f64 {
    let b1 = p1 - p0;
    let b2 = p2 - p1;
    let b3 = p3 - p2;
    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);
    let b2_len = b2.norm();
    if b2_len == 0.0 {
        return 0.0;
    }
    let y = n1.cross(&n2).dot(&b2) / b2_len;
    let x = n1.dot(&n2);
    y.atan2(x).to_degrees()
}

/// Provider of candidate conformers for chains.
pub trait GeometrySource: Send + Sync {
    fn candidate_conformers(
        &self,
        chain: &ChainPath,
        graph: &Graph,
    ) -> Result<Vec<ChainConformer>, GeometryError>;

    fn closure_threshold(&self, _chain: &ChainPath) -> ClosureThreshold {
        ClosureThreshold::default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct LibraryFile {
    #[serde(default)]
    threshold: ClosureThreshold,
    chains: BTreeMap<String, Vec<Vec<[f64; 3]>>>,
}

/// Precomputed conformers keyed by chain identity.
///
/// Chains missing from the library have no conformers and therefore never close.
#[derive(Debug, Clone, Default)]
pub struct ConformerLibrary {
    chains: HashMap<ChainIdentity, Vec<ChainConformer>>,
    threshold: ClosureThreshold,
}

impl ConformerLibrary {
    pub fn new(threshold: ClosureThreshold) -> Self {
        Self {
            chains: HashMap::new(),
            threshold,
        }
    }

    pub fn load(path: &Path) -> Result<Self, GeometryError> {
        let content = std::fs::read_to_string(path).map_err(|e| GeometryError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file: LibraryFile =
            serde_json::from_str(&content).map_err(|e| GeometryError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;

        let mut library = Self::new(file.threshold);
        for (id, conformers) in file.chains {
            let chain = ChainIdentity::new(id);
            for points in conformers {
                library.insert(
                    chain.clone(),
                    ChainConformer::new(
                        points
                            .into_iter()
                            .map(|[x, y, z]| Point3::new(x, y, z))
                            .collect(),
                    ),
                );
            }
        }
        Ok(library)
    }

    pub fn insert(&mut self, chain: ChainIdentity, conformer: ChainConformer) {
        self.chains.entry(chain).or_default().push(conformer);
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl GeometrySource for ConformerLibrary {
    fn candidate_conformers(
        &self,
        chain: &ChainPath,
        _graph: &Graph,
    ) -> Result<Vec<ChainConformer>, GeometryError> {
        Ok(self
            .chains
            .get(chain.identity())
            .cloned()
            .unwrap_or_default())
    }

    fn closure_threshold(&self, _chain: &ChainPath) -> ClosureThreshold {
        self.threshold
    }
}
