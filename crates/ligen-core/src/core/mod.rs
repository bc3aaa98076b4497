//! # Core Module
//!
//! Stateless chemistry used by the search engine.
//!
//! ## Overview
//!
//! - **Molecular Representation** ([`models`]) - Elements, atoms, bonds, sanitized molecules,
//!   ligand records and populations
//! - **Line Notations** ([`smiles`], [`smarts`]) - SMILES parsing and canonical writing, SMARTS
//!   queries and substructure search
//! - **Properties** ([`descriptors`]) - Whole-molecule descriptors consumed by the filters
//! - **Reactions** ([`reactions`], [`reagents`]) - Reaction templates, built-in and custom
//!   libraries, and the per-group reagent index
//! - **File I/O** ([`io`]) - Tab-delimited `.smi` source, reagent and ranked files
//!
//! Nothing in this module holds run state; everything here is safe to share read-only
//! across worker threads.

pub mod descriptors;
pub mod io;
pub mod models;
pub mod reactions;
pub mod reagents;
pub mod smarts;
pub mod smiles;
