use crate::core::models::attachment::{ApClass, AttachmentPoint};
use crate::core::models::vertex::{BlockRef, Vertex};
use serde::{Deserialize, Serialize};

/// Attachment point as declared on a library building block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApDefinition {
    pub class: ApClass,
    #[serde(default)]
    pub symmetry: Option<u32>,
}

/// A library entry: a scaffold, a proper fragment or a capping group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildingBlock {
    pub name: String,
    #[serde(default)]
    pub aps: Vec<ApDefinition>,
}

impl BuildingBlock {
    /// A fresh vertex for this block, with every AP free.
    pub fn instantiate(&self, block: BlockRef) -> Vertex {
        let aps = self
            .aps
            .iter()
            .map(|def| {
                let ap = AttachmentPoint::new(def.class.clone());
                match def.symmetry {
                    Some(tag) => ap.with_symmetry(tag),
                    None => ap,
                }
            })
            .collect();
        Vertex::new(block, aps)
    }
}

/// One way of joining an incoming block: which block, through which of its APs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub block: BlockRef,
    pub ap: usize,
}

/// Fragments declared interchangeable when joined to APs of a given class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct CandidateGroup {
    pub ap_class: ApClass,
    pub blocks: Vec<usize>,
}
