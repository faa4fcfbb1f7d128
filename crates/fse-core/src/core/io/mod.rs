//! Durable storage of generation layers.
//!
//! Each layer lives in its own `layer_NNNN.json` file: a one-line JSON header
//! followed by the JSON array of graph records it checksums.

pub mod format;
pub mod layer_store;
