use serde::{Deserialize, Serialize};

/// Size of the page universe when none is configured.
pub const DEFAULT_PAGES: usize = 10;

/// Prediction horizon (steps ahead) when none is configured.
pub const DEFAULT_STEPS: i64 = 2;

/// How a count row with no observed outgoing transition is normalized.
///
/// Both variants keep the row stochastic.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ZeroRowPolicy {
	/// The page is absorbing: it stays on itself with probability 1.
	#[default]
	SelfLoop,
	/// Every page is equally likely next.
	Uniform,
}

/// Settings used to build a `PagingModel` from a transition log.
///
/// Missing fields fall back to `ModelConfig::default()` when deserialized.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
	/// Size of the page universe; every page index must lie in `[0, pages)`.
	pub pages: usize,

	pub zero_row_policy: ZeroRowPolicy,

	/// Fail with `EmptyInput` when the log yields no transition at all.
	pub require_transitions: bool,

	/// Read and write the postcard count cache next to the log.
	pub use_cache: bool,

	/// Count transitions on worker threads instead of streaming the log.
	pub parallel: bool,
}

impl Default for ModelConfig {
	fn default() -> Self {
		Self {
			pages: DEFAULT_PAGES,
			zero_row_policy: ZeroRowPolicy::default(),
			require_transitions: false,
			use_cache: false,
			parallel: false,
		}
	}
}
