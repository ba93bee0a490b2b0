//! Sync engine tests with an in-memory transport
//!
//! The fake transport answers from canned payloads, so these tests cover
//! the engine's decisions and failure isolation without any networking.

use async_trait::async_trait;
use filetime::FileTime;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use peersync::metadata::MetadataStore;
use peersync::protocol::{
	FileEntry, IndexPayload, PeerTransport, ProtocolError, ProtocolResult, TombstoneEntry,
	TombstonePayload,
};
use peersync::{util, SyncEngine};

const LOCAL: &str = "10.0.0.1:9000";

// ============================================================================
// Fake transport
// ============================================================================

#[derive(Default, Clone)]
struct FakePeer {
	node_id: String,
	files: BTreeMap<String, (i64, Vec<u8>)>,
	tombstones: Option<BTreeMap<String, TombstoneEntry>>,
	/// Index entries whose announced hash differs from the served content
	lying: Vec<String>,
	/// Paths listed in the index but answered with FILE_ERR
	unservable: Vec<String>,
}

impl FakePeer {
	fn new(node_id: &str) -> Self {
		FakePeer { node_id: node_id.to_string(), tombstones: Some(BTreeMap::new()), ..Default::default() }
	}

	fn file(mut self, path: &str, mtime: i64, content: &[u8]) -> Self {
		self.files.insert(path.to_string(), (mtime, content.to_vec()));
		self
	}

	fn tombstone(mut self, path: &str, deleted_at: i64) -> Self {
		self.tombstones
			.get_or_insert_with(BTreeMap::new)
			.insert(path.to_string(), TombstoneEntry { deleted_at, by: self.node_id.clone() });
		self
	}
}

#[derive(Default)]
struct FakeTransport {
	peers: BTreeMap<String, FakePeer>,
	fetched: Mutex<Vec<String>>,
}

impl FakeTransport {
	fn with_peer(mut self, addr: &str, peer: FakePeer) -> Self {
		self.peers.insert(addr.to_string(), peer);
		self
	}

	fn peer(&self, addr: &str) -> ProtocolResult<&FakePeer> {
		self.peers.get(addr).ok_or_else(|| ProtocolError::NoResponse { peer: addr.to_string() })
	}
}

#[async_trait]
impl PeerTransport for FakeTransport {
	async fn fetch_index(&self, addr: &str) -> ProtocolResult<IndexPayload> {
		let peer = self.peer(addr)?;
		let files = peer
			.files
			.iter()
			.map(|(path, (mtime, content))| {
				let sha256 =
					if peer.lying.contains(path) { util::hash(b"something else") } else { util::hash(content) };
				(path.clone(), FileEntry { mtime: *mtime, sha256 })
			})
			.collect();
		Ok(IndexPayload { node_id: peer.node_id.clone(), generated_at: 0, files })
	}

	async fn fetch_tombstones(&self, addr: &str) -> ProtocolResult<TombstonePayload> {
		let peer = self.peer(addr)?;
		let tombstones =
			peer.tombstones.clone().ok_or_else(|| ProtocolError::NoResponse { peer: addr.to_string() })?;
		Ok(TombstonePayload { node_id: peer.node_id.clone(), generated_at: 0, tombstones })
	}

	async fn fetch_file(&self, addr: &str, path: &str) -> ProtocolResult<Vec<u8>> {
		let peer = self.peer(addr)?;
		self.fetched.lock().unwrap().push(path.to_string());
		if peer.unservable.iter().any(|p| p == path) {
			return Err(ProtocolError::RemoteAborted { reason: "NotFound".to_string() });
		}
		peer.files
			.get(path)
			.map(|(_, content)| content.clone())
			.ok_or_else(|| ProtocolError::RemoteAborted { reason: "NotFound".to_string() })
	}
}

// ============================================================================
// Helper Functions
// ============================================================================

fn create_file(dir: &Path, name: &str, content: &[u8], mtime: i64) {
	let path = dir.join(name);
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).ok();
	}
	fs::write(&path, content).unwrap();
	filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
}

fn mtime_of(path: &Path) -> i64 {
	FileTime::from_last_modification_time(&fs::metadata(path).unwrap()).unix_seconds()
}

fn engine(dir: &TempDir, transport: Arc<FakeTransport>, peers: &[&str]) -> SyncEngine {
	let store = Arc::new(MetadataStore::new(dir.path(), LOCAL, &[]).unwrap());
	let peers = peers.iter().map(|p| p.to_string()).collect();
	SyncEngine::new(store, transport, peers, Duration::from_secs(1))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_downloads_missing_file_with_remote_mtime() {
	let dir = TempDir::new().unwrap();
	let transport = Arc::new(
		FakeTransport::default().with_peer("peer-b", FakePeer::new("10.0.0.2:9000").file("docs/a.txt", 1000, b"alpha")),
	);
	let engine = engine(&dir, transport, &["peer-b"]);

	let report = engine.run_cycle().await;
	assert_eq!(report.peers_synced, 1);
	assert_eq!(report.files_downloaded, 1);
	assert_eq!(report.bytes_transferred, 5);

	let path = dir.path().join("docs/a.txt");
	assert_eq!(fs::read(&path).unwrap(), b"alpha");
	assert_eq!(mtime_of(&path), 1000);
}

#[tokio::test]
async fn test_failing_peer_does_not_abort_cycle() {
	let dir = TempDir::new().unwrap();
	let transport =
		Arc::new(FakeTransport::default().with_peer("alive", FakePeer::new("10.0.0.3:9000").file("a.txt", 10, b"a")));
	let engine = engine(&dir, transport, &["dead", "alive"]);

	let report = engine.run_cycle().await;
	assert_eq!(report.peers_failed, 1);
	assert_eq!(report.peers_synced, 1);
	assert_eq!(report.files_downloaded, 1);
	assert!(dir.path().join("a.txt").exists());
}

#[tokio::test]
async fn test_failing_file_does_not_abort_peer() {
	let dir = TempDir::new().unwrap();
	let mut peer = FakePeer::new("10.0.0.2:9000").file("a.txt", 10, b"a").file("b.txt", 10, b"b").file("c.txt", 10, b"c");
	peer.unservable.push("b.txt".to_string());
	let transport = Arc::new(FakeTransport::default().with_peer("peer-b", peer));
	let engine = engine(&dir, transport.clone(), &["peer-b"]);

	let report = engine.run_cycle().await;
	assert_eq!(report.files_downloaded, 2);
	assert_eq!(report.files_failed, 1);
	assert_eq!(report.peers_synced, 1);
	assert_eq!(*transport.fetched.lock().unwrap(), vec!["a.txt", "b.txt", "c.txt"]);
	assert!(!dir.path().join("b.txt").exists());
}

#[tokio::test]
async fn test_hash_mismatch_is_rejected() {
	let dir = TempDir::new().unwrap();
	let mut peer = FakePeer::new("10.0.0.2:9000").file("a.txt", 10, b"a");
	peer.lying.push("a.txt".to_string());
	let transport = Arc::new(FakeTransport::default().with_peer("peer-b", peer));
	let engine = engine(&dir, transport, &["peer-b"]);

	let report = engine.run_cycle().await;
	assert_eq!(report.files_failed, 1);
	assert_eq!(report.files_downloaded, 0);
	assert!(!dir.path().join("a.txt").exists());
}

#[tokio::test]
async fn test_local_newer_is_kept() {
	let dir = TempDir::new().unwrap();
	create_file(dir.path(), "a.txt", b"local", 2000);
	let transport =
		Arc::new(FakeTransport::default().with_peer("peer-b", FakePeer::new("10.0.0.2:9000").file("a.txt", 1000, b"remote")));
	let engine = engine(&dir, transport.clone(), &["peer-b"]);

	let report = engine.run_cycle().await;
	assert_eq!(report.files_downloaded, 0);
	assert!(transport.fetched.lock().unwrap().is_empty());
	assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"local");
}

#[tokio::test]
async fn test_tie_break_by_node_id() {
	let dir = TempDir::new().unwrap();
	create_file(dir.path(), "a.txt", b"local", 1000);
	create_file(dir.path(), "b.txt", b"local", 1000);
	let transport = Arc::new(
		FakeTransport::default()
			.with_peer("higher", FakePeer::new("10.0.0.2:9000").file("a.txt", 1000, b"higher"))
			.with_peer("lower", FakePeer::new("10.0.0.0:9000").file("b.txt", 1000, b"lower")),
	);
	let engine = engine(&dir, transport, &["higher", "lower"]);

	let report = engine.run_cycle().await;
	assert_eq!(report.files_downloaded, 1);
	assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"higher");
	assert_eq!(fs::read(dir.path().join("b.txt")).unwrap(), b"local");
}

#[tokio::test]
async fn test_remote_tombstone_applied_before_index() {
	let dir = TempDir::new().unwrap();
	create_file(dir.path(), "old.txt", b"old", 90);
	create_file(dir.path(), "new.txt", b"new", 110);
	let transport = Arc::new(FakeTransport::default().with_peer(
		"peer-b",
		FakePeer::new("10.0.0.2:9000").tombstone("old.txt", 100).tombstone("new.txt", 100),
	));
	let engine = engine(&dir, transport, &["peer-b"]);

	let report = engine.run_cycle().await;
	assert_eq!(report.tombstones_applied, 1);
	assert!(!dir.path().join("old.txt").exists());
	assert!(dir.path().join("new.txt").exists());
}

#[tokio::test(flavor = "current_thread")]
async fn test_tombstones_applied_on_single_threaded_runtime() {
	let dir = TempDir::new().unwrap();
	create_file(dir.path(), "old.txt", b"old", 90);
	let transport = Arc::new(
		FakeTransport::default().with_peer("peer-b", FakePeer::new("10.0.0.2:9000").tombstone("old.txt", 100)),
	);
	let engine = engine(&dir, transport, &["peer-b"]);

	let report = engine.run_cycle().await;
	assert_eq!(report.tombstones_applied, 1);
	assert!(!dir.path().join("old.txt").exists());

	let doc: serde_json::Value =
		serde_json::from_slice(&fs::read(dir.path().join(".p2pmeta.json")).unwrap()).unwrap();
	assert_eq!(doc["tombstones"]["old.txt"]["deleted_at"], 100);
	assert_eq!(doc["tombstones"]["old.txt"]["by"], "10.0.0.2:9000");
	assert!(doc["files"].get("old.txt").is_none());
}

#[tokio::test]
async fn test_tombstone_blocks_resurrection() {
	let dir = TempDir::new().unwrap();
	create_file(dir.path(), "a.txt", b"a", 50);
	let transport = Arc::new(FakeTransport::default().with_peer("peer-b", FakePeer::new("10.0.0.2:9000").file("a.txt", 50, b"a")));
	let engine = engine(&dir, transport.clone(), &["peer-b"]);
	engine.run_cycle().await;

	// Deleted locally; the peer still reports the old version
	fs::remove_file(dir.path().join("a.txt")).unwrap();
	let report = engine.run_cycle().await;
	assert_eq!(report.files_downloaded, 0);
	assert!(!dir.path().join("a.txt").exists());
	assert!(transport.fetched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_tombstone_exchange_is_not_fatal() {
	let dir = TempDir::new().unwrap();
	let mut peer = FakePeer::new("10.0.0.2:9000").file("a.txt", 10, b"a");
	peer.tombstones = None;
	let transport = Arc::new(FakeTransport::default().with_peer("peer-b", peer));
	let engine = engine(&dir, transport, &["peer-b"]);

	let report = engine.run_cycle().await;
	assert_eq!(report.peers_synced, 1);
	assert_eq!(report.files_downloaded, 1);
}

#[tokio::test]
async fn test_unsafe_and_excluded_paths_are_skipped() {
	let dir = TempDir::new().unwrap();
	let transport = Arc::new(FakeTransport::default().with_peer(
		"peer-b",
		FakePeer::new("10.0.0.2:9000")
			.file("../escape.txt", 10, b"x")
			.file(".p2pmeta.json", 10, b"{}")
			.file("ok.txt", 10, b"ok"),
	));
	let engine = engine(&dir, transport.clone(), &["peer-b"]);

	let report = engine.run_cycle().await;
	assert_eq!(report.files_downloaded, 1);
	assert_eq!(report.files_failed, 0);
	assert_eq!(*transport.fetched.lock().unwrap(), vec!["ok.txt"]);
	assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
}

#[tokio::test]
async fn test_second_cycle_is_quiet() {
	let dir = TempDir::new().unwrap();
	let transport =
		Arc::new(FakeTransport::default().with_peer("peer-b", FakePeer::new("10.0.0.2:9000").file("a.txt", 10, b"a")));
	let engine = engine(&dir, transport.clone(), &["peer-b"]);

	assert_eq!(engine.run_cycle().await.files_downloaded, 1);
	assert_eq!(engine.run_cycle().await.files_downloaded, 0);
	assert_eq!(transport.fetched.lock().unwrap().len(), 1);
}

// vim: ts=4
