//! # Fragment Space Explorer Core Library
//!
//! Systematic, layer-by-layer enumeration of the molecular graphs that a
//! fragment space can build, with resumable on-disk layers, cached
//! ring-closure geometry and concurrent evaluation of every complete graph.
//!
//! ## Architectural Philosophy
//!
//! - **[`core`]: The Foundation.** Graph models and canonical fingerprints, the
//!   fragment space with its compatibility rules, symmetry resolution, the
//!   ring-closure registry, and the layer store.
//!
//! - **[`engine`]: The Logic Core.** The stateful parts of an exploration: the
//!   combination enumerator, the layered builder and its generation tree, the
//!   task dispatcher with its evaluation pipeline, and the results ledger.
//!
//! - **[`workflows`]: The Public API.** Ties `engine` and `core` together into
//!   a complete exploration that can be stopped and resumed.

pub mod core;
pub mod engine;
pub mod workflows;
