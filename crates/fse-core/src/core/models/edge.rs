use super::attachment::ApRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// Parent-to-child bond created by attaching a new building block.
    Attachment,
    /// Bond between two APs already in the graph, closing a cycle.
    RingClosure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub src: ApRef,
    pub trg: ApRef,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(src: ApRef, trg: ApRef, kind: EdgeKind) -> Self {
        Self { src, trg, kind }
    }

    pub fn touches(&self, ap: ApRef) -> bool {
        self.src == ap || self.trg == ap
    }
}
