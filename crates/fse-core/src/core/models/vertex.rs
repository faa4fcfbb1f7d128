use super::attachment::AttachmentPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    Scaffold,
    Fragment,
    Cap,
}

impl BlockType {
    pub fn letter(self) -> char {
        match self {
            Self::Scaffold => 's',
            Self::Fragment => 'f',
            Self::Cap => 'c',
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Scaffold => "Scaffold",
                Self::Fragment => "Fragment",
                Self::Cap => "Cap",
            }
        )
    }
}

/// Reference into the shared, read-only building-block library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockRef {
    pub kind: BlockType,
    pub index: usize,
}

impl BlockRef {
    pub const fn new(kind: BlockType, index: usize) -> Self {
        Self { kind, index }
    }

    pub const fn scaffold(index: usize) -> Self {
        Self::new(BlockType::Scaffold, index)
    }

    pub const fn fragment(index: usize) -> Self {
        Self::new(BlockType::Fragment, index)
    }

    pub const fn cap(index: usize) -> Self {
        Self::new(BlockType::Cap, index)
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.letter(), self.index)
    }
}

/// A building block placed in a graph, together with the state of its APs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub block: BlockRef,
    pub aps: Vec<AttachmentPoint>,
}

impl Vertex {
    pub fn new(block: BlockRef, aps: Vec<AttachmentPoint>) -> Self {
        Self { block, aps }
    }

    pub fn is_cap(&self) -> bool {
        self.block.kind == BlockType::Cap
    }

    pub fn free_aps(&self) -> impl Iterator<Item = (usize, &AttachmentPoint)> {
        self.aps.iter().enumerate().filter(|(_, ap)| ap.is_free())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_ref_display_uses_kind_letter() {
        assert_eq!(BlockRef::scaffold(0).to_string(), "s0");
        assert_eq!(BlockRef::fragment(12).to_string(), "f12");
        assert_eq!(BlockRef::cap(3).to_string(), "c3");
    }

    #[test]
    fn free_aps_skips_used_points() {
        let mut used = AttachmentPoint::new("A:0");
        used.edge = Some(0);
        let vertex = Vertex::new(
            BlockRef::fragment(0),
            vec![used, AttachmentPoint::new("B:0")],
        );
        let free: Vec<_> = vertex.free_aps().map(|(i, _)| i).collect();
        assert_eq!(free, vec![1]);
        assert!(!vertex.is_cap());
    }
}
