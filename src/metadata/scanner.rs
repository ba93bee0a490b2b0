//! Directory enumeration and fingerprinting

use ignore::WalkBuilder;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use crate::exclusion::{PatternMatcher, TEMP_SUFFIX};
use crate::logging::*;
use crate::protocol::types::FileEntry;
use crate::util;
use crate::validation::to_wire_path;

/// Produces the current `path -> (mtime, sha256)` view of a directory
pub trait DirectoryScanner: Send + Sync {
	fn scan(&self, root: &Path, exclusions: &PatternMatcher) -> io::Result<BTreeMap<String, FileEntry>>;
}

/// Scanner walking the real filesystem
///
/// Hidden and gitignored files are included; symlinks are not followed.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkScanner;

impl DirectoryScanner for WalkScanner {
	fn scan(&self, root: &Path, exclusions: &PatternMatcher) -> io::Result<BTreeMap<String, FileEntry>> {
		if !root.is_dir() {
			return Err(io::Error::new(
				io::ErrorKind::NotFound,
				format!("{} is not a directory", root.display()),
			));
		}

		let mut files = BTreeMap::new();
		for entry in WalkBuilder::new(root).standard_filters(false).follow_links(false).build() {
			let entry = match entry {
				Ok(entry) => entry,
				Err(e) => {
					warn!("Skipping unreadable entry: {}", e);
					continue;
				}
			};
			if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
				continue;
			}

			let rel = match entry.path().strip_prefix(root).ok().and_then(to_wire_path) {
				Some(rel) => rel,
				None => {
					debug!("Skipping path with no wire form: {}", entry.path().display());
					continue;
				}
			};
			if exclusions.is_excluded(&rel) {
				continue;
			}

			// Files may vanish between listing and hashing
			let fingerprint = entry.metadata().map_err(io::Error::other).and_then(|meta| {
				let mtime = filetime::FileTime::from_last_modification_time(&meta).unix_seconds();
				Ok(FileEntry { mtime, sha256: util::hash_file(entry.path())? })
			});
			match fingerprint {
				Ok(fingerprint) => {
					files.insert(rel, fingerprint);
				}
				Err(e) => debug!("Skipping {}: {}", rel, e),
			}
		}
		Ok(files)
	}
}

/// Remove download temp files left behind by an interrupted run
pub fn cleanup_temp_files(root: &Path) -> usize {
	let mut count = 0;

	for entry in WalkBuilder::new(root).standard_filters(false).follow_links(false).build().flatten() {
		let is_temp = entry.file_type().map(|t| t.is_file()).unwrap_or(false)
			&& entry.file_name().to_str().map(|n| n.ends_with(TEMP_SUFFIX)).unwrap_or(false);
		if !is_temp {
			continue;
		}
		match std::fs::remove_file(entry.path()) {
			Ok(()) => count += 1,
			Err(e) if e.kind() == io::ErrorKind::NotFound => {}
			Err(e) => warn!("Failed to remove temp file {}: {}", entry.path().display(), e),
		}
	}
	count
}


// vim: ts=4
