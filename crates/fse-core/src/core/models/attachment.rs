use serde::{Deserialize, Serialize};
use std::fmt;

/// The type label of an attachment point (e.g. `"amine:1"`).
///
/// Compatibility between attachment points is decided exclusively on these
/// labels by the fragment space rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApClass(String);

impl ApClass {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApClass {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// Addresses one attachment point inside a graph by vertex position and AP position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApRef {
    pub vertex: usize,
    pub ap: usize,
}

impl ApRef {
    pub const fn new(vertex: usize, ap: usize) -> Self {
        Self { vertex, ap }
    }
}

impl fmt::Display for ApRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}:ap{}", self.vertex, self.ap)
    }
}

/// A labeled connection slot on a placed building block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentPoint {
    pub class: ApClass,
    /// APs of the same block sharing a tag are constitutionally equivalent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symmetry: Option<u32>,
    /// Index of the edge terminating at this AP, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) edge: Option<usize>,
}

impl AttachmentPoint {
    pub fn new(class: impl Into<ApClass>) -> Self {
        Self {
            class: class.into(),
            symmetry: None,
            edge: None,
        }
    }

    pub fn with_symmetry(mut self, tag: u32) -> Self {
        self.symmetry = Some(tag);
        self
    }

    pub fn is_free(&self) -> bool {
        self.edge.is_none()
    }

    pub fn edge(&self) -> Option<usize> {
        self.edge
    }
}
