use serde::Serialize;

use crate::config::DEFAULT_STEPS;
use crate::error::{ChainError, ChainResult};

/// Input parameters of one prediction request.
///
/// # Invariants
/// - `steps >= 1`
///
/// The start page is only checked against the page universe when the
/// prediction runs, since this struct does not know the model.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PredictionInput {
	/// Page the prediction starts from.
	pub start_page: i64,

	/// Number of steps ahead (`k`).
	steps: i64,
}

impl PredictionInput {
	/// Creates a request for the distribution `steps` accesses after `start_page`.
	///
	/// # Errors
	/// `InvalidArgument` if `steps <= 0`.
	pub fn new(start_page: i64, steps: i64) -> ChainResult<Self> {
		let mut input = Self::default();
		input.start_page = start_page;
		input.set_steps(steps)?;
		Ok(input)
	}

	/// Returns the prediction horizon.
	pub fn steps(&self) -> i64 {
		self.steps
	}

	/// Sets the prediction horizon.
	///
	/// # Errors
	/// Returns an error if the horizon is not at least one step.
	pub fn set_steps(&mut self, steps: i64) -> ChainResult<()> {
		if steps <= 0 {
			return Err(ChainError::invalid("prediction input", format!("steps must be >= 1, got {steps}")));
		}
		self.steps = steps;
		Ok(())
	}
}

impl Default for PredictionInput {
	fn default() -> Self {
		Self { start_page: 0, steps: DEFAULT_STEPS }
	}
}
