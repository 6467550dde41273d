//! Predictive paging with discrete-time Markov chains.
//!
//! This crate learns page-to-page transition probabilities from a log of
//! page accesses and predicts where an access sequence will be `k` steps
//! ahead:
//! - Transition counting from a lazily read log (optionally multithreaded)
//! - Normalization into a row-stochastic matrix
//! - `k`-step matrices by repeated multiplication
//! - Most-likely-page predictions and random page traces
//!
//! Every operation reports failures as `ChainError`; nothing here exits the
//! process.

/// Model construction and prediction.
pub mod model;

/// Configuration of model building.
pub mod config;

/// Error taxonomy shared by every stage.
pub mod error;

/// Transition log reading and path helpers.
pub mod io;
