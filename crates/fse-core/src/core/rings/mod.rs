//! # Ring Closure Module
//!
//! Decides whether an open chain of building blocks can close into a ring and
//! caches the answer per chain.
//!
//! - [`chain`] - Chain paths inside a graph and their graph-independent identity
//! - [`geometry`] - Conformers, dihedral signatures and the closability test
//! - [`conformations`] - The cached per-chain record
//! - [`registry`] - Concurrent, compute-once registry and the ring-closure filter

pub mod chain;
pub mod conformations;
pub mod geometry;
pub mod registry;
