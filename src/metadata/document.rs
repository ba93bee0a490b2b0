//! Structured document persistence
//!
//! JSON documents are written to a sibling temp file and renamed over the
//! destination, so readers only ever see the previous or the new version.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::StateError;
use crate::logging::*;

/// Load a document; `Ok(None)` when it does not exist
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StateError> {
	let contents = match std::fs::read(path) {
		Ok(contents) => contents,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(StateError::LoadFailed { source: Box::new(e) }),
	};

	serde_json::from_slice(&contents).map(Some).map_err(|e| StateError::Corrupted {
		message: format!("Failed to parse {}: {}", path.display(), e),
	})
}

/// Load a document, falling back to the default when absent or unreadable
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
	match load(path) {
		Ok(Some(doc)) => doc,
		Ok(None) => T::default(),
		Err(e) => {
			warn!("{}; starting from an empty document", e);
			T::default()
		}
	}
}

/// Persist a document atomically
pub fn persist<T: Serialize>(path: &Path, doc: &T) -> Result<(), StateError> {
	let json = serde_json::to_vec_pretty(doc).map_err(StateError::save)?;
	let tmp = temp_path(path);

	std::fs::write(&tmp, json).map_err(StateError::save)?;
	std::fs::rename(&tmp, path).map_err(|e| {
		let _ = std::fs::remove_file(&tmp);
		StateError::save(e)
	})
}

fn temp_path(path: &Path) -> PathBuf {
	let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
	name.push(".tmp");
	path.with_file_name(name)
}


// vim: ts=4
