//! The node's authoritative file and tombstone record

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::document;
use super::reconciliation::{self, Verdict};
use super::scanner::{self, DirectoryScanner, WalkScanner};
use crate::config::{NodeConfig, METADATA_FILE};
use crate::error::{StateError, SyncError};
use crate::exclusion::{PatternMatcher, TEMP_SUFFIX};
use crate::logging::*;
use crate::protocol::types::{FileEntry, IndexPayload, TombstoneEntry, TombstonePayload};
use crate::util;
use crate::validation::resolve_under_root;

/// Persisted metadata document
///
/// A path is never a key of both maps; use the insert methods to keep it so.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
	#[serde(default)]
	pub files: BTreeMap<String, FileEntry>,
	#[serde(default)]
	pub tombstones: BTreeMap<String, TombstoneEntry>,
}

impl Metadata {
	pub fn insert_file(&mut self, path: String, entry: FileEntry) {
		self.tombstones.remove(&path);
		self.files.insert(path, entry);
	}

	pub fn insert_tombstone(&mut self, path: String, tombstone: TombstoneEntry) {
		self.files.remove(&path);
		self.tombstones.insert(path, tombstone);
	}

	/// Drop tombstones shadowed by a live file record; returns how many
	fn normalize(&mut self) -> usize {
		let files = &self.files;
		let before = self.tombstones.len();
		self.tombstones.retain(|path, _| !files.contains_key(path));
		before - self.tombstones.len()
	}
}

/// Counters of one local scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
	/// Files currently present
	pub tracked: usize,
	/// New or modified files
	pub changed: usize,
	/// Files that vanished and were tombstoned
	pub deleted: usize,
}

/// Metadata of one node
///
/// All reads and mutations of the file and tombstone maps go through the
/// store's single lock. The lock is never held across network I/O.
pub struct MetadataStore {
	root: PathBuf,
	node_id: String,
	document: PathBuf,
	exclusions: PatternMatcher,
	scanner: Box<dyn DirectoryScanner>,
	meta: Mutex<Metadata>,
}

impl MetadataStore {
	/// Open the store for a configured node, creating its root if needed
	pub fn open(config: &NodeConfig) -> Result<Self, SyncError> {
		Self::new(&config.directory, config.node_id(), &config.exclude_patterns)
	}

	pub fn new(root: &Path, node_id: &str, exclude_patterns: &[String]) -> Result<Self, SyncError> {
		std::fs::create_dir_all(root)?;
		let document = root.join(METADATA_FILE);

		let mut meta: Metadata = document::load_or_default(&document);
		let dropped = meta.normalize();
		if dropped > 0 {
			warn!("Dropped {} tombstones shadowed by live files in {}", dropped, document.display());
		}
		debug!(
			"Loaded metadata for {}: {} files, {} tombstones",
			node_id,
			meta.files.len(),
			meta.tombstones.len()
		);

		Ok(MetadataStore {
			root: root.to_path_buf(),
			node_id: node_id.to_string(),
			document,
			exclusions: PatternMatcher::new(exclude_patterns)?,
			scanner: Box::new(WalkScanner),
			meta: Mutex::new(meta),
		})
	}

	/// Replace the directory scanner
	pub fn with_scanner(mut self, scanner: Box<dyn DirectoryScanner>) -> Self {
		self.scanner = scanner;
		self
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn node_id(&self) -> &str {
		&self.node_id
	}

	fn lock(&self) -> MutexGuard<'_, Metadata> {
		// Every mutation leaves the maps consistent, so a poisoned lock is still usable
		self.meta.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Copy of the current metadata
	pub fn snapshot(&self) -> Metadata {
		self.lock().clone()
	}

	/// Re-enumerate the root and fold the result into the metadata
	///
	/// Vanished files become tombstones authored by this node; present files
	/// clear any tombstone for their path. The result is persisted.
	pub fn scan(&self) -> Result<ScanSummary, SyncError> {
		let mut meta = self.lock();
		let current = self.scanner.scan(&self.root, &self.exclusions)?;
		let now = util::now_ts();
		let mut summary = ScanSummary { tracked: current.len(), ..Default::default() };

		let gone: Vec<String> = meta.files.keys().filter(|p| !current.contains_key(*p)).cloned().collect();
		for path in gone {
			if self.exclusions.is_excluded(&path) {
				// Newly excluded, not deleted
				meta.files.remove(&path);
				continue;
			}
			let deleted_at = meta.tombstones.get(&path).map(|t| t.deleted_at.max(now)).unwrap_or(now);
			info!("Detected deletion of {}", path);
			meta.insert_tombstone(path, TombstoneEntry { deleted_at, by: self.node_id.clone() });
			summary.deleted += 1;
		}

		for (path, entry) in current {
			if meta.files.get(&path) != Some(&entry) {
				summary.changed += 1;
			}
			meta.insert_file(path, entry);
		}

		document::persist(&self.document, &*meta)?;
		Ok(summary)
	}

	/// Wire projection of the file map
	pub fn index_payload(&self) -> IndexPayload {
		let meta = self.lock();
		IndexPayload {
			node_id: self.node_id.clone(),
			generated_at: util::now_ts(),
			files: meta.files.clone(),
		}
	}

	/// Wire projection of the tombstone map
	pub fn tombstones_payload(&self) -> TombstonePayload {
		let meta = self.lock();
		TombstonePayload {
			node_id: self.node_id.clone(),
			generated_at: util::now_ts(),
			tombstones: meta.tombstones.clone(),
		}
	}

	/// Compare a remotely reported file against local state
	pub fn verdict(&self, path: &str, remote: &FileEntry, remote_node: &str) -> Verdict {
		let meta = self.lock();
		reconciliation::decide(
			meta.files.get(path),
			meta.tombstones.get(path),
			remote,
			remote_node,
			&self.node_id,
		)
	}

	/// Whether the remote version of `path` should be fetched
	pub fn need_download(&self, path: &str, mtime: i64, sha256: &str, remote_node: &str) -> bool {
		let remote = FileEntry { mtime, sha256: sha256.to_string() };
		self.verdict(path, &remote, remote_node).is_download()
	}

	/// Adopt remote deletions that are newer than what we know
	///
	/// A local file is removed from disk when its mtime is at or before the
	/// remote deletion. A file changed after the deletion survives, and the
	/// tombstone is not recorded for it. Returns whether anything changed;
	/// changes are persisted before returning.
	pub fn apply_remote_tombstones(&self, payload: &TombstonePayload) -> Result<bool, StateError> {
		let mut meta = self.lock();
		let mut changed = false;

		for (path, remote) in &payload.tombstones {
			if self.exclusions.is_excluded(path) {
				continue;
			}
			if !reconciliation::tombstone_supersedes(meta.tombstones.get(path), remote) {
				continue;
			}
			let full = match resolve_under_root(&self.root, path) {
				Ok(full) => full,
				Err(e) => {
					warn!("Ignoring tombstone from {}: {}", payload.node_id, e);
					continue;
				}
			};

			// Files downloaded since the last scan are on disk but not yet tracked
			let local = match meta.files.get(path) {
				Some(entry) => Some(entry.mtime),
				None => disk_mtime(&full),
			};
			if let Some(mtime) = local {
				if !reconciliation::deletion_wins(mtime, remote) {
					debug!("Keeping {}: modified after its deletion on {}", path, remote.by);
					continue;
				}
				match std::fs::remove_file(&full) {
					Ok(()) => info!("Deleted {} (removed on {})", path, remote.by),
					Err(e) if e.kind() == io::ErrorKind::NotFound => {}
					Err(e) => {
						warn!("Cannot delete {}: {}", full.display(), e);
						continue;
					}
				}
			}

			meta.insert_tombstone(path.clone(), remote.clone());
			changed = true;
		}

		if changed {
			document::persist(&self.document, &*meta)?;
		}
		Ok(changed)
	}

	/// Write downloaded content into place with the given mtime
	///
	/// The content goes to a temp file next to the destination which is then
	/// renamed over it. Metadata is left alone; the next scan picks the file up.
	pub async fn save_downloaded_file(&self, path: &str, content: &[u8], mtime: i64) -> Result<PathBuf, StateError> {
		let full = resolve_under_root(&self.root, path)
			.map_err(|_| StateError::InvalidPath { path: path.to_string() })?;
		if let Some(parent) = full.parent() {
			tokio::fs::create_dir_all(parent).await.map_err(StateError::save)?;
		}

		let tmp = temp_sibling(&full);
		tokio::fs::write(&tmp, content).await.map_err(StateError::save)?;
		if let Err(e) = filetime::set_file_mtime(&tmp, filetime::FileTime::from_unix_time(mtime, 0)) {
			warn!("Cannot set mtime of {}: {}", path, e);
		}
		if let Err(e) = tokio::fs::rename(&tmp, &full).await {
			let _ = tokio::fs::remove_file(&tmp).await;
			return Err(StateError::save(e));
		}
		Ok(full)
	}

	/// Local file to serve for a requested wire path
	///
	/// `None` for excluded paths and paths escaping the root.
	pub fn resolve_servable(&self, path: &str) -> Option<PathBuf> {
		if self.exclusions.is_excluded(path) {
			return None;
		}
		match resolve_under_root(&self.root, path) {
			Ok(full) => Some(full),
			Err(e) => {
				warn!("Refusing to serve '{}': {}", path, e);
				None
			}
		}
	}

	pub fn is_excluded(&self, path: &str) -> bool {
		self.exclusions.is_excluded(path)
	}

	/// Remove temp files of interrupted downloads
	pub fn cleanup_temp_files(&self) -> usize {
		scanner::cleanup_temp_files(&self.root)
	}
}

fn disk_mtime(path: &Path) -> Option<i64> {
	let meta = std::fs::metadata(path).ok()?;
	if !meta.is_file() {
		return None;
	}
	Some(filetime::FileTime::from_last_modification_time(&meta).unix_seconds())
}

fn temp_sibling(path: &Path) -> PathBuf {
	let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
	name.push(TEMP_SUFFIX);
	path.with_file_name(name)
}


// vim: ts=4
