//! Exclusion of paths from indexing, serving and downloading
//!
//! The node's own bookkeeping files are always excluded; users can add
//! glob patterns through `exclude_patterns`.

mod patterns;

pub use patterns::{PatternMatcher, TEMP_SUFFIX};

use std::fmt;

/// Error type for exclusion operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionError {
	/// Invalid glob pattern
	InvalidPattern(String),
}

impl fmt::Display for ExclusionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ExclusionError::InvalidPattern(msg) => write!(f, "Invalid pattern: {}", msg),
		}
	}
}

impl std::error::Error for ExclusionError {}

// vim: ts=4
