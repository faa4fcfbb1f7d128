//! # Fragment Space Module
//!
//! The read-only description of what may be built: the building-block library
//! (scaffolds, fragments, capping groups) and the constitutional rules that
//! govern how blocks join (AP compatibility, capping, forbidden ends, maximum
//! size, ring-closing pairs).

pub mod library;
pub mod space;
