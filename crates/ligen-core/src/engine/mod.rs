//! # Engine Module
//!
//! The stateful machinery of a LIGEN run: everything that turns a seed population into
//! the next generation.
//!
//! ## Overview
//!
//! A generation is produced by the [`generation::PopulationGenerator`], a small state
//! machine that dispatches crossover and mutation attempts to a parallel executor in
//! over-provisioned rounds, filters and deduplicates what comes back, and stops once
//! both quotas are met or its round budget is spent. The [`lifecycle`] module owns the
//! on-disk side: resume detection, the atomic ranked artifact, and cleanup.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - The validated, immutable run configuration
//! - **Operators** ([`crossover`], [`mutation`]) - MCS recombination and reaction-based mutation
//! - **Filtering** ([`filters`]) - Drug-likeness rules, structural alerts, user rule files
//! - **Execution** ([`executor`]) - Serial and thread-pool backends with ordered results
//! - **Generation Control** ([`generation`], [`state`]) - Quota-driven rounds and their outcome
//! - **Lifecycle** ([`lifecycle`], [`conversion`]) - Artifacts, resume, 3-D conversion, cleanup
//! - **Progress Monitoring** ([`progress`]) - Progress reporting callbacks
//! - **Error Handling** ([`error`]) - Engine-level error taxonomy

pub mod config;
pub mod conversion;
pub mod crossover;
pub mod error;
pub mod executor;
pub mod filters;
pub mod generation;
pub mod lifecycle;
pub mod mutation;
pub mod progress;
pub mod state;
