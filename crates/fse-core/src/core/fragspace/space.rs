use super::library::{BuildingBlock, Candidate, CandidateGroup};
use crate::core::models::attachment::ApClass;
use crate::core::models::graph::{Graph, GraphDraft, GraphError};
use crate::core::models::vertex::{BlockRef, BlockType, Vertex};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;
use std::path::Path;
use thiserror::Error;

const DEFAULT_MIN_RING_SIZE: usize = 3;
const DEFAULT_MAX_RING_SIZE: usize = 8;

#[derive(Debug, Error)]
pub enum FragmentSpaceError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("The fragment space defines no scaffolds to start from")]
    NoScaffolds,
    #[error("Capping rule '{ap_class}' -> '{cap_class}' has no capping group with that AP class")]
    UnknownCapClass { ap_class: ApClass, cap_class: ApClass },
    #[error("Equivalent-candidate group for '{ap_class}' references missing fragment {index}")]
    FragmentOutOfRange { ap_class: ApClass, index: usize },
    #[error("Invalid ring size range {min}..={max}")]
    InvalidRingSizes { min: usize, max: usize },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FragmentSpaceFile {
    #[serde(default)]
    max_vertices: Option<usize>,
    #[serde(default)]
    forbidden_ends: Vec<ApClass>,
    #[serde(default)]
    ring_closures: Vec<(ApClass, ApClass)>,
    #[serde(default)]
    min_ring_size: Option<usize>,
    #[serde(default)]
    max_ring_size: Option<usize>,
    #[serde(default)]
    compatibility: BTreeMap<ApClass, Vec<ApClass>>,
    #[serde(default)]
    capping: BTreeMap<ApClass, ApClass>,
    #[serde(default)]
    equivalent_candidates: Vec<CandidateGroup>,
    #[serde(default)]
    scaffolds: Vec<BuildingBlock>,
    #[serde(default)]
    fragments: Vec<BuildingBlock>,
    #[serde(default)]
    caps: Vec<BuildingBlock>,
}

/// Building-block library plus the constitutional rules of the explored space.
///
/// A free AP is *mandatory* when its class is a forbidden end or has a capping
/// rule; a graph is complete when it has no mandatory free AP.
#[derive(Debug, Clone)]
pub struct FragmentSpace {
    scaffolds: Vec<BuildingBlock>,
    fragments: Vec<BuildingBlock>,
    caps: Vec<BuildingBlock>,
    capping: BTreeMap<ApClass, ApClass>,
    forbidden_ends: BTreeSet<ApClass>,
    ring_closures: Vec<(ApClass, ApClass)>,
    ring_sizes: RangeInclusive<usize>,
    max_vertices: Option<usize>,
    equivalent_candidates: Vec<CandidateGroup>,
    candidates: BTreeMap<ApClass, Vec<Candidate>>,
}

impl FragmentSpace {
    pub fn load(path: &Path) -> Result<Self, FragmentSpaceError> {
        let content = std::fs::read_to_string(path).map_err(|e| FragmentSpaceError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.to_string_lossy())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, FragmentSpaceError> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self, FragmentSpaceError> {
        let file: FragmentSpaceFile =
            toml::from_str(content).map_err(|e| FragmentSpaceError::Toml {
                path: origin.to_string(),
                source: e,
            })?;
        Self::from_file(file)
    }

    fn from_file(file: FragmentSpaceFile) -> Result<Self, FragmentSpaceError> {
        if file.scaffolds.is_empty() {
            return Err(FragmentSpaceError::NoScaffolds);
        }
        let min = file.min_ring_size.unwrap_or(DEFAULT_MIN_RING_SIZE);
        let max = file.max_ring_size.unwrap_or(DEFAULT_MAX_RING_SIZE);
        if min < 2 || min > max {
            return Err(FragmentSpaceError::InvalidRingSizes { min, max });
        }
        for (ap_class, cap_class) in &file.capping {
            let known = file
                .caps
                .iter()
                .any(|cap| cap.aps.iter().any(|ap| &ap.class == cap_class));
            if !known {
                return Err(FragmentSpaceError::UnknownCapClass {
                    ap_class: ap_class.clone(),
                    cap_class: cap_class.clone(),
                });
            }
        }
        for group in &file.equivalent_candidates {
            if let Some(&index) = group.blocks.iter().find(|&&i| i >= file.fragments.len()) {
                return Err(FragmentSpaceError::FragmentOutOfRange {
                    ap_class: group.ap_class.clone(),
                    index,
                });
            }
        }

        let candidates = index_candidates(&file);
        Ok(Self {
            scaffolds: file.scaffolds,
            fragments: file.fragments,
            caps: file.caps,
            capping: file.capping,
            forbidden_ends: file.forbidden_ends.into_iter().collect(),
            ring_closures: file.ring_closures,
            ring_sizes: min..=max,
            max_vertices: file.max_vertices,
            equivalent_candidates: file.equivalent_candidates,
            candidates,
        })
    }

    pub fn block(&self, block: BlockRef) -> Option<&BuildingBlock> {
        match block.kind {
            BlockType::Scaffold => self.scaffolds.get(block.index),
            BlockType::Fragment => self.fragments.get(block.index),
            BlockType::Cap => self.caps.get(block.index),
        }
    }

    pub fn instantiate(&self, block: BlockRef) -> Option<Vertex> {
        self.block(block).map(|b| b.instantiate(block))
    }

    pub fn scaffold_count(&self) -> usize {
        self.scaffolds.len()
    }

    /// One classified layer-0 graph per scaffold, in library order.
    pub fn root_graphs(&self) -> Result<Vec<Graph>, GraphError> {
        (0..self.scaffolds.len())
            .map(|i| {
                let block = BlockRef::scaffold(i);
                let vertex = self.scaffolds[i].instantiate(block);
                Ok(self.classify(GraphDraft::root(vertex)?.seal()))
            })
            .collect()
    }

    /// Ordered (block, AP) pairs that may be joined to a free AP of `class`:
    /// compatible fragments first, then the capping group of the class.
    pub fn candidates_for(&self, class: &ApClass) -> &[Candidate] {
        self.candidates.get(class).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_mandatory(&self, class: &ApClass) -> bool {
        self.forbidden_ends.contains(class) || self.capping.contains_key(class)
    }

    pub fn is_complete(&self, graph: &Graph) -> bool {
        graph.free_aps().all(|(_, ap)| !self.is_mandatory(&ap.class))
    }

    pub fn classify(&self, graph: Graph) -> Graph {
        let complete = self.is_complete(&graph);
        graph.with_completeness(complete)
    }

    pub fn max_vertices(&self) -> Option<usize> {
        self.max_vertices
    }

    pub fn has_ring_closures(&self) -> bool {
        !self.ring_closures.is_empty()
    }

    pub fn ring_compatible(&self, a: &ApClass, b: &ApClass) -> bool {
        self.ring_closures
            .iter()
            .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    pub fn ring_sizes(&self) -> RangeInclusive<usize> {
        self.ring_sizes.clone()
    }

    pub fn equivalent_candidates(&self) -> &[CandidateGroup] {
        &self.equivalent_candidates
    }
}

fn index_candidates(file: &FragmentSpaceFile) -> BTreeMap<ApClass, Vec<Candidate>> {
    let mut index: BTreeMap<ApClass, Vec<Candidate>> = BTreeMap::new();
    let classes: BTreeSet<&ApClass> = file
        .compatibility
        .keys()
        .chain(file.capping.keys())
        .collect();

    for class in classes {
        let mut list = Vec::new();
        if let Some(partners) = file.compatibility.get(class) {
            for (i, fragment) in file.fragments.iter().enumerate() {
                for (j, ap) in fragment.aps.iter().enumerate() {
                    if partners.contains(&ap.class) {
                        list.push(Candidate {
                            block: BlockRef::fragment(i),
                            ap: j,
                        });
                    }
                }
            }
        }
        if let Some(cap_class) = file.capping.get(class) {
            for (i, cap) in file.caps.iter().enumerate() {
                for (j, ap) in cap.aps.iter().enumerate() {
                    if &ap.class == cap_class {
                        list.push(Candidate {
                            block: BlockRef::cap(i),
                            ap: j,
                        });
                    }
                }
            }
        }
        index.insert(class.clone(), list);
    }
    index
}
