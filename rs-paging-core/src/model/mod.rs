//! Markov-chain model of page accesses.
//!
//! The pipeline is strictly linear:
//! - `chain_builder` counts transitions and normalizes them (`TransitionCounts`)
//! - `transition_matrix` holds the resulting row-stochastic matrix
//! - `predictor` raises it to the `k`-th power and reads predictions
//! - `paging_model` chains the stages behind one type (`PagingModel`)

use crate::error::{ChainError, ChainResult};

/// Transition counting, merging and normalization.
pub mod chain_builder;

/// Square contiguous matrices and their multiplication.
pub mod matrix;

/// High-level model loaded from a transition log, with its count cache.
pub mod paging_model;

/// Parameters of a prediction request.
pub mod prediction_input;

/// Matrix powers, predictions and sampling.
pub mod predictor;

/// Row-stochastic matrix type.
pub mod transition_matrix;

/// Converts a page index to `usize` after checking it lies in `[0, pages)`.
pub(crate) fn page_index(page: i64, pages: usize, operation: &'static str) -> ChainResult<usize> {
	usize::try_from(page)
		.ok()
		.filter(|index| *index < pages)
		.ok_or(ChainError::OutOfRangeIndex { operation, index: page, pages })
}
