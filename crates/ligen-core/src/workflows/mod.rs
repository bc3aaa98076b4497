//! # Workflows Module
//!
//! High-level entry points that tie the chemistry core and the engine together into a
//! complete LIGEN run.
//!
//! ## Overview
//!
//! A workflow validates nothing itself (the [`RunConfig`](crate::engine::config::RunConfig)
//! it receives is already validated); it loads the run's shared resources, works out
//! where a previous run stopped, and then produces one generation after another, writing
//! each generation's ranked artifact before moving on.
//!
//! - **Evolution Workflow** ([`evolve`]) - Multi-generation crossover and mutation search
//!   with resume, optional 3-D conversion and cleanup of transient files.

pub mod evolve;
