//! Pattern-based path exclusion using glob patterns

use super::ExclusionError;
use crate::config::METADATA_FILE;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Suffix of in-flight download files
pub const TEMP_SUFFIX: &str = ".peersync-tmp";

/// Pattern matcher using globset for efficient matching
///
/// Paths are matched in their wire form (`dir/file.txt`).
#[derive(Debug, Clone)]
pub struct PatternMatcher {
	/// Compiled user patterns
	exclude_set: GlobSet,

	/// Always-excluded patterns (built-in)
	always_exclude: GlobSet,
}

impl PatternMatcher {
	/// Create a new pattern matcher
	pub fn new(exclude_patterns: &[String]) -> Result<Self, ExclusionError> {
		let always_exclude = Self::build_always_excluded()?;
		let exclude_set = Self::build_glob_set(exclude_patterns)?;
		Ok(Self { exclude_set, always_exclude })
	}

	/// Build the always-excluded patterns
	fn build_always_excluded() -> Result<GlobSet, ExclusionError> {
		let patterns = vec![
			METADATA_FILE.to_string(),
			format!("{}.tmp", METADATA_FILE),
			format!("**/*{}", TEMP_SUFFIX),
		];
		Self::build_glob_set(&patterns)
	}

	/// Build a GlobSet from patterns
	fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ExclusionError> {
		let mut builder = GlobSetBuilder::new();

		for pattern in patterns {
			let glob = Glob::new(pattern)
				.map_err(|e| ExclusionError::InvalidPattern(format!("{}: {}", pattern, e)))?;
			builder.add(glob);
		}

		builder.build().map_err(|e| {
			ExclusionError::InvalidPattern(format!("Failed to build pattern set: {}", e))
		})
	}

	/// Check if a wire path is excluded by any pattern
	pub fn is_excluded(&self, path: &str) -> bool {
		self.always_exclude.is_match(path) || self.exclude_set.is_match(path)
	}
}


// vim: ts=4
