//! Path validation functions
//!
//! Paths travel over the wire as relative, `/`-separated strings. Before any
//! file is read or written they are resolved against the node's root here.

use std::path::{Component, Path, PathBuf};

use super::ValidationError;

/// Resolve a wire path under `root`
///
/// Leading separators are stripped, so `/etc/passwd` resolves to
/// `<root>/etc/passwd`. Any `..` segment is rejected outright, as is a path
/// that is empty after normalization.
pub fn resolve_under_root(root: &Path, rel: &str) -> Result<PathBuf, ValidationError> {
	let trimmed = rel.trim_start_matches(|c: char| c == '/' || c == '\\');

	let mut resolved = root.to_path_buf();
	let mut depth = 0;
	for segment in trimmed.split(|c: char| c == '/' || c == '\\') {
		match segment {
			"" | "." => continue,
			".." => {
				return Err(ValidationError::PathError(format!(
					"Path contains parent directory reference (..): {}",
					rel
				)))
			}
			s => {
				// Reject drive prefixes and the like smuggled into a segment
				if Path::new(s).components().any(|c| !matches!(c, Component::Normal(_))) {
					return Err(ValidationError::PathError(format!(
						"Path segment '{}' is not a plain name",
						s
					)));
				}
				resolved.push(s);
				depth += 1;
			}
		}
	}

	if depth == 0 {
		return Err(ValidationError::PathError(format!("Path '{}' names the root itself", rel)));
	}
	Ok(resolved)
}

/// Convert a path relative to the root into its wire form (`a/b/c.txt`)
///
/// Returns `None` for paths that are not plain relative paths or are not
/// valid UTF-8.
pub fn to_wire_path(rel: &Path) -> Option<String> {
	let mut parts = Vec::new();
	for component in rel.components() {
		match component {
			Component::Normal(name) => parts.push(name.to_str()?),
			Component::CurDir => continue,
			_ => return None,
		}
	}
	if parts.is_empty() {
		None
	} else {
		Some(parts.join("/"))
	}
}


// vim: ts=4
