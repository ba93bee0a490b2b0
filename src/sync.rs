//! Periodic sync engine
//!
//! Each cycle rescans the local root, then visits the configured peers one
//! after another: adopt their newer deletions, pull their index and fetch
//! every file the reconciliation rules pick. A failing peer or file is
//! logged and counted; it never ends the cycle or the engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::NodeConfig;
use crate::error::SyncError;
use crate::logging::*;
use crate::metadata::{MetadataStore, ScanSummary};
use crate::protocol::{FileEntry, PeerTransport, TombstonePayload, UdpTransport};
use crate::util;
use crate::validation::resolve_under_root;

/// Outcome of one sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
	/// Peers whose index was pulled and processed
	pub peers_synced: usize,
	/// Peers that could not be synced at all
	pub peers_failed: usize,
	pub files_downloaded: usize,
	pub files_failed: usize,
	/// Peers whose tombstones changed local state
	pub tombstones_applied: usize,
	pub bytes_transferred: u64,
	pub duration: Duration,
}

pub struct SyncEngine {
	store: Arc<MetadataStore>,
	transport: Arc<dyn PeerTransport>,
	peers: Vec<String>,
	interval: Duration,
}

impl SyncEngine {
	pub fn new(
		store: Arc<MetadataStore>,
		transport: Arc<dyn PeerTransport>,
		peers: Vec<String>,
		interval: Duration,
	) -> Self {
		SyncEngine { store, transport, peers, interval }
	}

	/// Engine for a configured node, talking UDP
	pub fn from_config(config: &NodeConfig, store: Arc<MetadataStore>) -> Self {
		let transport = Arc::new(UdpTransport::new(config.protocol.clone()));
		Self::new(store, transport, config.peer_list(), config.sync_interval())
	}

	pub fn peers(&self) -> &[String] {
		&self.peers
	}

	/// Run cycles forever, one per interval
	pub async fn run(&self) {
		info!("Syncing with {} peers every {:?}", self.peers.len(), self.interval);
		loop {
			self.run_cycle().await;
			tokio::time::sleep(self.interval).await;
		}
	}

	/// Run one cycle to completion
	pub async fn run_cycle(&self) -> CycleReport {
		let start = Instant::now();
		let mut report = CycleReport::default();

		match self.scan().await {
			Ok(summary) => debug!(
				"Scan: {} files, {} changed, {} deleted",
				summary.tracked, summary.changed, summary.deleted
			),
			Err(e) => warn!("Local scan failed: {}", e),
		}

		for peer in &self.peers {
			match self.sync_peer(peer, &mut report).await {
				Ok(()) => report.peers_synced += 1,
				Err(e) => {
					report.peers_failed += 1;
					warn!("Sync with {} failed: {}", peer, e);
				}
			}
		}

		report.duration = start.elapsed();
		info!(
			"Cycle done: {}/{} peers, {} files downloaded ({} bytes), {} failed",
			report.peers_synced,
			self.peers.len(),
			report.files_downloaded,
			report.bytes_transferred,
			report.files_failed
		);
		report
	}

	async fn scan(&self) -> Result<ScanSummary, SyncError> {
		let store = self.store.clone();
		tokio::task::spawn_blocking(move || store.scan())
			.await
			.map_err(|e| SyncError::Other { message: format!("Scan task failed: {}", e) })?
	}

	/// Deletes files and rewrites the metadata document under the store lock
	async fn apply_tombstones(&self, payload: TombstonePayload) -> Result<bool, SyncError> {
		let store = self.store.clone();
		let applied = tokio::task::spawn_blocking(move || store.apply_remote_tombstones(&payload))
			.await
			.map_err(|e| SyncError::Other { message: format!("Tombstone task failed: {}", e) })??;
		Ok(applied)
	}

	async fn sync_peer(&self, peer: &str, report: &mut CycleReport) -> Result<(), SyncError> {
		match self.transport.fetch_tombstones(peer).await {
			Ok(payload) => match self.apply_tombstones(payload).await {
				Ok(true) => report.tombstones_applied += 1,
				Ok(false) => {}
				Err(e) => warn!("Cannot apply tombstones from {}: {}", peer, e),
			},
			Err(e) => warn!("Tombstone exchange with {} failed: {}", peer, e),
		}

		let index = self.transport.fetch_index(peer).await?;
		debug!("{} ({}) reports {} files", peer, index.node_id, index.files.len());

		for (path, remote) in &index.files {
			if self.store.is_excluded(path) {
				continue;
			}
			if let Err(e) = resolve_under_root(self.store.root(), path) {
				warn!("Skipping {} from {}: {}", path, peer, e);
				continue;
			}

			let verdict = self.store.verdict(path, remote, &index.node_id);
			if !verdict.is_download() {
				continue;
			}
			debug!("Fetching {} from {} ({:?})", path, peer, verdict.reason());

			match self.download(peer, path, remote).await {
				Ok(bytes) => {
					report.files_downloaded += 1;
					report.bytes_transferred += bytes;
				}
				Err(e) => {
					report.files_failed += 1;
					warn!("Download of {} from {} failed: {}", path, peer, e);
				}
			}
		}
		Ok(())
	}

	async fn download(&self, peer: &str, path: &str, remote: &FileEntry) -> Result<u64, SyncError> {
		let content = self.transport.fetch_file(peer, path).await?;

		// The file may have changed on the peer since it sent its index
		let actual = util::hash(&content);
		if !actual.eq_ignore_ascii_case(&remote.sha256) {
			return Err(SyncError::HashMismatch {
				path: path.to_string(),
				expected: remote.sha256.clone(),
				actual,
			});
		}

		self.store.save_downloaded_file(path, &content, remote.mtime).await?;
		info!("Downloaded {} from {} ({} bytes)", path, peer, content.len());
		Ok(content.len() as u64)
	}
}

// vim: ts=4
