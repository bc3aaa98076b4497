//! # LIGEN Core Library
//!
//! A generational evolutionary search over small-molecule ligands. Starting from a seed
//! population, each generation breeds new candidates by maximum-common-substructure
//! crossover and by reaction-based mutation, filters them for drug-likeness, and writes
//! the accepted population as the seeds of the next generation.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three layers throughout, so that the chemistry can be
//! tested without any run state and the run state without any files.
//!
//! - **[`core`]: The Foundation.** Stateless molecule models, the SMILES and SMARTS
//!   readers, descriptors, reaction templates, the reagent index and `.smi` file I/O.
//!
//! - **[`engine`]: The Logic Core.** The genetic operators, the filter chain, the
//!   parallel executor, the per-generation controller and the on-disk lifecycle
//!   (ranked artifacts, resume detection, cleanup).
//!
//! - **[`workflows`]: The Public API.** Runs a complete, resumable multi-generation
//!   search from a validated [`engine::config::RunConfig`].

pub mod core;
pub mod engine;
pub mod workflows;
