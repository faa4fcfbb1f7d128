//! # Engine Module
//!
//! The generate-and-dispatch machinery of an exploration.
//!
//! ## Architecture
//!
//! - **Enumeration** ([`enumerator`]) - Symmetry-reduced, deduplicated extensions of one graph
//! - **Layering** ([`builder`], [`tree`]) - Layer-by-layer generation, ceilings and lineage
//! - **Evaluation** ([`dispatcher`], [`pipeline`], [`ledger`]) - Bounded, coalescing task execution
//!   and the record of every outcome
//! - **Control** ([`config`], [`progress`], [`stop`], [`error`]) - Settings, progress events,
//!   cooperative cancellation and the engine error type

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod enumerator;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod progress;
pub mod stop;
pub mod tree;
