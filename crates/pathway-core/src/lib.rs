//! Core types, calculators and the engine facade for Pathway, a learner
//! progression tracker.
//!
//! This crate is deliberately free of database dependencies. Everything that
//! turns enrollment time, pauses, overrides and practice into levels, phases
//! and streaks lives here as pure functions; [`engine::ProgressEngine`] wires
//! them to any [`store::ProgressStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod active_days;
pub mod config;
pub mod engine;
pub mod error;
pub mod overrides;
pub mod phase;
pub mod progress;
pub mod store;
pub mod streak;
pub mod student;
pub mod thresholds;

pub use error::{Error, Result};
