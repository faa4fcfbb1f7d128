//! # Core Module
//!
//! Stateless building blocks of an exploration.
//!
//! - **Graph Representation** ([`models`]) - vertices, attachment points, edges,
//!   canonical forms and fingerprints
//! - **Fragment Space** ([`fragspace`]) - the block library and the rules that
//!   decide which attachment points may be joined
//! - **Symmetry** ([`symmetry`]) - equivalence classes of attachment points
//! - **Ring Closures** ([`rings`]) - chain identities, geometry sources and the
//!   shared registry of closable conformations
//! - **Persistence** ([`io`]) - the checksummed per-layer file format

pub mod fragspace;
pub mod io;
pub mod models;
pub mod rings;
pub mod symmetry;
