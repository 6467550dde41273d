use serde::Serialize;

use super::matrix::Matrix;
use crate::error::{ChainError, ChainResult};

/// Tolerance used when checking that a row sums to 1.
pub const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// Row-stochastic probability matrix of a Markov chain over pages.
///
/// `probability(i, j)` is the probability of reaching page `j` from page `i`
/// in `steps()` steps: one for a normalized count matrix, `k` for a matrix
/// returned by `power`.
///
/// # Invariants
/// - Every entry is non-negative
/// - Every row sums to 1.0 within `ROW_SUM_TOLERANCE`
/// - `steps >= 1`
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TransitionMatrix {
	matrix: Matrix<f64>,
	steps: i64,
}

impl TransitionMatrix {
	/// Wraps a matrix after checking it is row-stochastic.
	///
	/// # Errors
	/// `InvalidArgument` naming the first row with a negative entry or a sum
	/// away from 1.
	pub fn try_from_matrix(matrix: Matrix<f64>) -> ChainResult<Self> {
		for (i, row) in matrix.rows().enumerate() {
			if row.iter().any(|p| p.is_nan() || *p < 0.0) {
				return Err(ChainError::invalid("transition matrix", format!("row {i} has a negative or NaN entry")));
			}
			let sum: f64 = row.iter().sum();
			if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
				return Err(ChainError::invalid("transition matrix", format!("row {i} sums to {sum}")));
			}
		}
		Ok(Self { matrix, steps: 1 })
	}

	/// Caller guarantees the matrix is row-stochastic.
	pub(crate) fn from_stochastic(matrix: Matrix<f64>) -> Self {
		Self { matrix, steps: 1 }
	}

	/// Same as `from_stochastic` for a matrix covering `steps` steps.
	pub(crate) fn with_steps(matrix: Matrix<f64>, steps: i64) -> Self {
		Self { matrix, steps }
	}

	/// Number of steps one application of this matrix covers.
	pub fn steps(&self) -> i64 {
		self.steps
	}

	/// Size of the page universe.
	pub fn pages(&self) -> usize {
		self.matrix.size()
	}

	pub fn matrix(&self) -> &Matrix<f64> {
		&self.matrix
	}

	/// Probability of going from `from` to `to`, or `None` for an unknown page.
	pub fn probability(&self, from: usize, to: usize) -> Option<f64> {
		self.matrix.get(from, to)
	}

	/// Next-page distribution of `page`, or `None` for an unknown page.
	pub fn row(&self, page: usize) -> Option<&[f64]> {
		self.matrix.row(page)
	}

	pub fn into_matrix(self) -> Matrix<f64> {
		self.matrix
	}
}
