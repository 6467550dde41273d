use log::debug;
use rand::Rng;
use serde::Serialize;

use super::matrix::Matrix;
use super::page_index;
use super::transition_matrix::TransitionMatrix;
use crate::error::{ChainError, ChainResult};

/// A page together with the probability of reaching it.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct PageProbability {
	pub page: usize,
	pub probability: f64,
}

/// Distribution of the page reached from `start_page` after `steps` accesses.
///
/// # Invariants
/// - `distribution.len()` is the page count
/// - `most_likely` is `None` only when every entry of `distribution` is 0
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Prediction {
	pub start_page: usize,
	pub steps: i64,
	pub distribution: Vec<f64>,
	pub most_likely: Option<PageProbability>,
}

impl Prediction {
	/// Draws a page with probability proportional to its entry.
	///
	/// Returns `None` when no page has positive probability.
	pub fn sample<R: Rng>(&self, rng: &mut R) -> Option<usize> {
		sample_row(&self.distribution, rng)
	}
}

/// Computes the `k`-step transition matrix `M^k`.
///
/// The accumulator starts as `M` and is multiplied by `M` exactly `k - 1`
/// more times, writing into one scratch buffer that is swapped with the
/// accumulator after each step. Costs `O(k * n^3)`: fine for the small page
/// universes and horizons this is meant for, not for large `n`.
///
/// The result covers `k * m.steps()` steps.
///
/// # Errors
/// `InvalidArgument` if `k <= 0` or the resulting horizon overflows an `i64`.
pub fn power(m: &TransitionMatrix, k: i64) -> ChainResult<TransitionMatrix> {
	if k <= 0 {
		return Err(ChainError::invalid("power", format!("exponent must be >= 1, got {k}")));
	}
	let steps = m
		.steps()
		.checked_mul(k)
		.ok_or_else(|| ChainError::invalid("power", format!("horizon of {k} x {} steps overflows", m.steps())))?;

	let base = m.matrix();
	let mut accumulator = base.clone();
	let mut scratch = Matrix::<f64>::zeros(base.size())?;
	for _ in 1..k {
		accumulator.multiply_into(base, &mut scratch)?;
		std::mem::swap(&mut accumulator, &mut scratch);
	}

	debug!("computed {steps}-step matrix over {} pages", base.size());
	Ok(TransitionMatrix::with_steps(accumulator, steps))
}

/// Reads the distribution of `start_page` out of `m_power`.
///
/// The most likely page uses a strict `>` scan starting from 0.0, so ties
/// go to the lowest index and an all-zero row has no most likely page.
///
/// # Errors
/// `OutOfRangeIndex` if `start_page` is outside `[0, pages)`.
pub fn predict(m_power: &TransitionMatrix, start_page: i64) -> ChainResult<Prediction> {
	let start = page_index(start_page, m_power.pages(), "predict")?;
	let row = m_power
		.row(start)
		.ok_or(ChainError::OutOfRangeIndex { operation: "predict", index: start_page, pages: m_power.pages() })?;

	let mut most_likely: Option<PageProbability> = None;
	let mut max_probability = 0.0;
	for (page, &probability) in row.iter().enumerate() {
		if probability > max_probability {
			max_probability = probability;
			most_likely = Some(PageProbability { page, probability });
		}
	}

	Ok(Prediction { start_page: start, steps: m_power.steps(), distribution: row.to_vec(), most_likely })
}

/// Simulates `length` page accesses following `m`, starting after `start_page`.
///
/// The start page itself is not part of the returned trace.
///
/// # Errors
/// `OutOfRangeIndex` if `start_page` is outside `[0, pages)`.
pub fn walk<R: Rng>(
	m: &TransitionMatrix,
	start_page: i64,
	length: usize,
	rng: &mut R,
) -> ChainResult<Vec<usize>> {
	let mut current = page_index(start_page, m.pages(), "walk")?;
	let mut trace = Vec::with_capacity(length);

	for _ in 0..length {
		let Some(row) = m.row(current) else {
			break;
		};
		// Rows of a stochastic matrix always have a positive entry.
		let Some(next) = sample_row(row, &mut *rng) else {
			break;
		};
		trace.push(next);
		current = next;
	}
	Ok(trace)
}

/// Weighted choice over `row` by cumulative subtraction.
fn sample_row<R: Rng>(row: &[f64], rng: &mut R) -> Option<usize> {
	let total: f64 = row.iter().filter(|p| **p > 0.0).sum();
	if total <= 0.0 {
		return None;
	}

	let mut r = rng.random_range(0.0..total);
	let mut fallback = None;
	for (page, &probability) in row.iter().enumerate() {
		if probability <= 0.0 {
			continue;
		}
		if r < probability {
			return Some(page);
		}
		r -= probability;
		fallback = Some(page);
	}

	// Rounding can leave `r` just above the last bucket.
	fallback
}
