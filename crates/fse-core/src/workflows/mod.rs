//! # Workflows Module
//!
//! Top-level entry points. [`explore`] runs a complete exploration of a
//! fragment space: it decides between a fresh start and a resume, builds one
//! layer at a time, dispatches every complete graph for evaluation, and
//! persists each settled layer before moving on.

pub mod explore;
