//! # Core Models Module
//!
//! Data structures describing the graphs explored by the engine.
//!
//! ## Key Components
//!
//! - [`attachment`] - Attachment point labels, references and state
//! - [`vertex`] - Placed building blocks and references into the block library
//! - [`edge`] - Attachment and ring-closing bonds
//! - [`graph`] - Immutable graphs and the copy-on-extend [`graph::GraphDraft`]
//! - [`canon`] - Canonical forms and structural fingerprints
//! - [`outcome`] - Terminal states of evaluation tasks
//! - [`ids`] - Arena keys for the generation tree
//!
//! ## Usage
//!
//! ```ignore
//! use fsexplorer::core::models::{graph::GraphDraft, attachment::ApRef};
//!
//! let root = GraphDraft::root(scaffold_vertex)?.seal();
//! let mut draft = root.draft_extension();
//! draft.attach(ApRef::new(0, 0), fragment_vertex, 0)?;
//! let child = draft.seal();
//! ```

pub mod attachment;
pub mod canon;
pub mod edge;
pub mod graph;
pub mod ids;
pub mod outcome;
pub mod vertex;
