use std::sync::mpsc;
use std::thread;

use log::debug;
use serde::{Deserialize, Serialize};

use super::matrix::Matrix;
use super::page_index;
use super::transition_matrix::TransitionMatrix;
use crate::config::ZeroRowPolicy;
use crate::error::{ChainError, ChainResult};

/// Each worker of `ingest_parallel` gets roughly `1 / (cpus * CHUNK_FACTOR)`
/// of the sequence.
const CHUNK_FACTOR: usize = 8;

/// Observed transition counts between pages.
///
/// `count(i, j)` is the number of times page `j` was accessed directly after
/// page `i`. Counts only grow while a `ChainBuilder` owns them and are
/// read-only afterwards.
///
/// # Invariants
/// - `transitions` is the sum of every cell of `counts`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TransitionCounts {
	counts: Matrix<u64>,
	transitions: u64,
}

impl TransitionCounts {
	/// Creates an all-zero count matrix over `pages` pages.
	pub fn new(pages: usize) -> ChainResult<Self> {
		Ok(Self { counts: Matrix::zeros(pages)?, transitions: 0 })
	}

	/// Counts every consecutive pair of `sequence`.
	///
	/// The first observation only sets the previous page. The first index
	/// outside `[0, pages)` aborts the whole ingestion; nothing is returned
	/// for the pairs counted before it.
	///
	/// # Errors
	/// `OutOfRangeIndex` for a bad index, `InvalidArgument` if `pages` is 0.
	pub fn ingest<I: IntoIterator<Item = i64>>(sequence: I, pages: usize) -> ChainResult<Self> {
		let mut builder = ChainBuilder::new(pages)?;
		for page in sequence {
			builder.observe(page)?;
		}
		Ok(builder.finish())
	}

	/// Same result as `ingest`, computed on worker threads.
	///
	/// The sequence is cut into chunks that overlap by one observation, so the
	/// transition crossing each boundary is counted exactly once. Partial
	/// counts are merged in chunk order; when several chunks hold a bad index,
	/// the error of the earliest one is returned, which is the one `ingest`
	/// would have reported.
	pub fn ingest_parallel(sequence: &[i64], pages: usize) -> ChainResult<Self> {
		if sequence.len() < 2 {
			return Self::ingest(sequence.iter().copied(), pages);
		}
		let mut total = Self::new(pages)?;

		let chunks = num_cpus::get() * CHUNK_FACTOR;
		let chunk_size = sequence.len().div_ceil(chunks);

		let (tx, rx) = mpsc::channel();
		thread::scope(|scope| {
			for (index, start) in (0..sequence.len()).step_by(chunk_size).enumerate() {
				let tx = tx.clone();
				let end = (start + chunk_size).min(sequence.len());
				let chunk = &sequence[start.saturating_sub(1)..end];

				scope.spawn(move || {
					let partial = Self::ingest(chunk.iter().copied(), pages);
					// The receiver is alive until every worker has been joined.
					let _ = tx.send((index, partial));
				});
			}
		});
		drop(tx);

		let mut partials: Vec<(usize, ChainResult<Self>)> = rx.iter().collect();
		partials.sort_by_key(|(index, _)| *index);
		debug!("merging {} partial count matrices", partials.len());

		for (_, partial) in partials {
			total.merge(&partial?)?;
		}
		Ok(total)
	}

	/// Size of the page universe.
	pub fn pages(&self) -> usize {
		self.counts.size()
	}

	/// Total number of observed transitions.
	pub fn transitions(&self) -> u64 {
		self.transitions
	}

	/// Number of observed transitions from `from` to `to`.
	pub fn count(&self, from: usize, to: usize) -> Option<u64> {
		self.counts.get(from, to)
	}

	pub fn matrix(&self) -> &Matrix<u64> {
		&self.counts
	}

	/// Fails with `EmptyInput` when no transition was observed.
	///
	/// The counting itself accepts an all-zero matrix; callers that need
	/// evidence apply this check.
	pub fn require_transitions(self) -> ChainResult<Self> {
		if self.transitions == 0 {
			return Err(ChainError::EmptyInput);
		}
		Ok(self)
	}

	/// Adds the counts of `other` to this one.
	///
	/// # Errors
	/// `InvalidArgument` if the page universes differ.
	pub fn merge(&mut self, other: &Self) -> ChainResult<()> {
		if self.pages() != other.pages() {
			return Err(ChainError::invalid(
				"merge",
				format!("page count mismatch: {} and {}", self.pages(), other.pages()),
			));
		}

		for (row, other_row) in self.counts.rows_mut().zip(other.counts.rows()) {
			for (count, occurrence) in row.iter_mut().zip(other_row) {
				*count += occurrence;
			}
		}
		self.transitions += other.transitions;
		Ok(())
	}

	/// Normalizes with the default self-loop policy for empty rows.
	pub fn normalize(&self) -> ChainResult<TransitionMatrix> {
		self.normalize_with(ZeroRowPolicy::SelfLoop)
	}

	/// Divides each count by its row total.
	///
	/// A row without any outgoing transition has no evidence to divide; it
	/// becomes a self-loop or a uniform row according to `policy`.
	pub fn normalize_with(&self, policy: ZeroRowPolicy) -> ChainResult<TransitionMatrix> {
		let pages = self.pages();
		let mut probabilities = Matrix::<f64>::zeros(pages)?;
		let mut empty_rows = 0;

		for (i, (count_row, row)) in self.counts.rows().zip(probabilities.rows_mut()).enumerate() {
			let total = checked_total(count_row)
				.ok_or_else(|| ChainError::invalid("normalize", format!("count total of row {i} overflows")))?;
			if total == 0 {
				empty_rows += 1;
				match policy {
					ZeroRowPolicy::SelfLoop => row[i] = 1.0,
					ZeroRowPolicy::Uniform => row.fill(1.0 / pages as f64),
				}
				continue;
			}

			let total = total as f64;
			for (p, &count) in row.iter_mut().zip(count_row) {
				*p = count as f64 / total;
			}
		}

		debug!("normalized {pages} rows, {empty_rows} without transitions ({policy:?})");
		Ok(TransitionMatrix::from_stochastic(probabilities))
	}

	/// Checks a decoded cache entry against the counts invariant.
	///
	/// Counts whose total does not fit in a `u64` are inconsistent.
	pub(crate) fn is_consistent(&self) -> bool {
		self.counts.is_consistent() && checked_total(self.counts.rows().flatten()) == Some(self.transitions)
	}
}

/// Sum of `counts`, or `None` on overflow.
fn checked_total<'a>(counts: impl IntoIterator<Item = &'a u64>) -> Option<u64> {
	counts.into_iter().try_fold(0u64, |total, count| total.checked_add(*count))
}

/// Streaming form of `TransitionCounts::ingest`.
///
/// Feed observations one at a time with `observe`, then call `finish`.
/// On error, drop the builder: its counts are incomplete.
#[derive(Debug)]
pub struct ChainBuilder {
	counts: TransitionCounts,
	previous: Option<usize>,
	observed: usize,
}

impl ChainBuilder {
	pub fn new(pages: usize) -> ChainResult<Self> {
		Ok(Self { counts: TransitionCounts::new(pages)?, previous: None, observed: 0 })
	}

	/// Records an access to `page`, counting the transition from the previous one.
	///
	/// # Errors
	/// `OutOfRangeIndex` if `page` is outside `[0, pages)`.
	pub fn observe(&mut self, page: i64) -> ChainResult<()> {
		let current = page_index(page, self.counts.pages(), "ingest")?;

		if let Some(previous) = self.previous {
			if let Some(count) = self.counts.counts.get_mut(previous, current) {
				*count += 1;
				self.counts.transitions += 1;
			}
		}

		self.previous = Some(current);
		self.observed += 1;
		Ok(())
	}

	/// Number of observations accepted so far.
	pub fn observed(&self) -> usize {
		self.observed
	}

	pub fn finish(self) -> TransitionCounts {
		debug!(
			"ingested {} observations, {} transitions over {} pages",
			self.observed,
			self.counts.transitions,
			self.counts.pages()
		);
		self.counts
	}
}
