use thiserror::Error;

pub type ChainResult<T> = Result<T, ChainError>;

/// Every failure the paging pipeline can report.
///
/// None of these are recoverable inside the core: each one invalidates all
/// downstream results, so operations return them immediately and the caller
/// decides how to terminate.
#[derive(Debug, Error)]
pub enum ChainError {
	/// Backing storage for an `pages x pages` matrix could not be obtained.
	#[error("failed to allocate a {pages}x{pages} matrix in {operation}")]
	Allocation { operation: &'static str, pages: usize },

	/// An observed or queried page index is outside `[0, pages)`.
	#[error("page index {index} out of range [0, {pages}) in {operation}")]
	OutOfRangeIndex { operation: &'static str, index: i64, pages: usize },

	/// A required argument is unusable (dimension mismatch, non-positive exponent...).
	#[error("invalid argument to {operation}: {reason}")]
	InvalidArgument { operation: &'static str, reason: String },

	/// The caller required at least one transition and none was observed.
	#[error("no transition observed in the input sequence")]
	EmptyInput,

	/// A token of the transition log is not an integer.
	#[error("malformed token {token:?} at position {position} of the transition log")]
	MalformedToken { position: usize, token: String },

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("model cache error: {0}")]
	Cache(#[from] postcard::Error),
}

impl ChainError {
	pub(crate) fn invalid(operation: &'static str, reason: impl Into<String>) -> Self {
		Self::InvalidArgument { operation, reason: reason.into() }
	}

	/// Process exit status a front end should terminate with (sysexits values).
	pub fn exit_code(&self) -> i32 {
		match self {
			Self::InvalidArgument { .. } => 64,
			Self::OutOfRangeIndex { .. } | Self::EmptyInput | Self::MalformedToken { .. } => 65,
			Self::Allocation { .. } => 71,
			Self::Io(_) | Self::Cache(_) => 74,
		}
	}
}
