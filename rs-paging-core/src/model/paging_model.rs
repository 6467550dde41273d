use std::path::Path;

use log::{debug, info, warn};
use rand::Rng;
use serde::Serialize;

use super::chain_builder::{ChainBuilder, TransitionCounts};
use super::prediction_input::PredictionInput;
use super::predictor::{self, Prediction};
use super::transition_matrix::TransitionMatrix;
use crate::config::{ModelConfig, ZeroRowPolicy};
use crate::error::{ChainError, ChainResult};
use crate::io::{self, PageTokens};

/// Extension of the count cache written next to a transition log.
pub const CACHE_EXTENSION: &str = "bin";

/// Markov model of page accesses learned from one transition log.
///
/// The count matrix only lives while the model is built; the model keeps the
/// one-step transition matrix and computes `k`-step matrices on demand.
#[derive(Clone, Debug)]
pub struct PagingModel {
	name: String,
	transitions: u64,
	zero_row_policy: ZeroRowPolicy,
	matrix: TransitionMatrix,
}

/// Serializable description of a loaded model.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ModelSummary {
	pub name: String,
	pub pages: usize,
	pub transitions: u64,
	pub zero_row_policy: ZeroRowPolicy,
}

impl PagingModel {
	/// Builds a model from the transition log at `log_path`.
	///
	/// - With `use_cache`, counts are read from `<stem>.bin` next to the log
	///   when that file is at least as recent as the log and was built for the
	///   same page count. Otherwise the log is ingested and the cache rewritten.
	/// - Ingestion streams the log, or collects it and counts on worker
	///   threads when `parallel` is set.
	/// - The model name is the log file stem.
	///
	/// # Errors
	/// Any ingestion error (`OutOfRangeIndex`, `MalformedToken`, `Io`),
	/// `EmptyInput` when `require_transitions` is set and the log has fewer
	/// than two accesses, and `Io`/`Cache` when the cache cannot be written.
	/// `InvalidArgument` when `use_cache` is set for a log that already has
	/// the cache extension, since its cache would replace it.
	pub fn from_log<P: AsRef<Path>>(log_path: P, config: &ModelConfig) -> ChainResult<Self> {
		let log_path = log_path.as_ref();
		let name = io::get_filename(log_path)?;

		let counts = if config.use_cache {
			let cache_path = io::build_output_path(log_path, CACHE_EXTENSION)?;
			if cache_path == log_path {
				return Err(ChainError::invalid(
					"load",
					format!("cache for {} would overwrite the log itself", log_path.display()),
				));
			}
			match Self::read_cache(log_path, &cache_path, config.pages) {
				Some(counts) => {
					info!("loaded counts for '{name}' from {}", cache_path.display());
					counts
				}
				None => {
					let counts = Self::read_log(log_path, config)?;
					let bytes = postcard::to_stdvec(&counts)?;
					std::fs::write(&cache_path, bytes)?;
					info!("cached counts for '{name}' in {}", cache_path.display());
					counts
				}
			}
		} else {
			Self::read_log(log_path, config)?
		};

		let counts = if config.require_transitions { counts.require_transitions()? } else { counts };
		Self::from_counts(name, counts, config.zero_row_policy)
	}

	/// Normalizes `counts` into a model, consuming them.
	pub fn from_counts(name: impl Into<String>, counts: TransitionCounts, policy: ZeroRowPolicy) -> ChainResult<Self> {
		let matrix = counts.normalize_with(policy)?;
		let model = Self { name: name.into(), transitions: counts.transitions(), zero_row_policy: policy, matrix };
		info!("model '{}' ready: {} pages, {} transitions", model.name, model.pages(), model.transitions);
		Ok(model)
	}

	fn read_log(log_path: &Path, config: &ModelConfig) -> ChainResult<TransitionCounts> {
		debug!("reading transition log {}", log_path.display());
		let tokens = PageTokens::open(log_path)?;

		if config.parallel {
			let sequence = tokens.collect::<ChainResult<Vec<i64>>>()?;
			return TransitionCounts::ingest_parallel(&sequence, config.pages);
		}

		let mut builder = ChainBuilder::new(config.pages)?;
		for page in tokens {
			builder.observe(page?)?;
		}
		Ok(builder.finish())
	}

	/// Returns the cached counts if they can stand in for the log.
	///
	/// A cache that cannot be used is reported and ignored, never fatal.
	fn read_cache(log_path: &Path, cache_path: &Path, pages: usize) -> Option<TransitionCounts> {
		if !cache_path.exists() {
			return None;
		}
		if io::is_stale(cache_path, log_path) {
			info!("cache {} is older than its log, rebuilding", cache_path.display());
			return None;
		}

		let counts: TransitionCounts = match std::fs::read(cache_path) {
			Ok(bytes) => match postcard::from_bytes(&bytes) {
				Ok(counts) => counts,
				Err(e) => {
					warn!("ignoring undecodable cache {}: {e}", cache_path.display());
					return None;
				}
			},
			Err(e) => {
				warn!("ignoring unreadable cache {}: {e}", cache_path.display());
				return None;
			}
		};

		if !counts.is_consistent() {
			warn!("ignoring inconsistent cache {}", cache_path.display());
			return None;
		}
		if counts.pages() != pages {
			info!("cache {} was built for {} pages, rebuilding for {pages}", cache_path.display(), counts.pages());
			return None;
		}
		Some(counts)
	}

	/// Distribution of the page accessed `input.steps()` accesses after
	/// `input.start_page`.
	///
	/// # Errors
	/// `InvalidArgument` for a non-positive horizon, `OutOfRangeIndex` for an
	/// unknown start page.
	pub fn predict(&self, input: &PredictionInput) -> ChainResult<Prediction> {
		let m_power = predictor::power(&self.matrix, input.steps())?;
		predictor::predict(&m_power, input.start_page)
	}

	/// Simulates `length` accesses following the one-step matrix.
	pub fn simulate<R: Rng>(&self, start_page: i64, length: usize, rng: &mut R) -> ChainResult<Vec<usize>> {
		predictor::walk(&self.matrix, start_page, length, rng)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn pages(&self) -> usize {
		self.matrix.pages()
	}

	/// Number of transitions the model was learned from.
	pub fn transitions(&self) -> u64 {
		self.transitions
	}

	pub fn transition_matrix(&self) -> &TransitionMatrix {
		&self.matrix
	}

	pub fn summary(&self) -> ModelSummary {
		ModelSummary {
			name: self.name.clone(),
			pages: self.pages(),
			transitions: self.transitions,
			zero_row_policy: self.zero_row_policy,
		}
	}
}
