//! Node configuration
//!
//! A node is described by one document:
//!
//! ```json
//! {
//!   "directory": "./node-a",
//!   "self": "127.0.0.1:9000",
//!   "peers": ["127.0.0.1:9001", "127.0.0.1:9002"],
//!   "sync_interval_seconds": 5
//! }
//! ```
//!
//! `.toml` files are parsed as TOML, everything else as JSON5 (which accepts
//! plain JSON). Missing keys fall back to `NodeConfig::default()`.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SyncError;
use crate::validation::{self, ValidationError, Validator};

/// File name of the persisted metadata document inside the node's root
pub const METADATA_FILE: &str = ".p2pmeta.json";

// ============================================================================
// NODE CONFIGURATION
// ============================================================================

/// Configuration of a single sync node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
	/// Root directory this node keeps in sync
	pub directory: PathBuf,

	/// This node's `host:port`, doubling as its identifier
	#[serde(rename = "self")]
	pub self_addr: String,

	/// Static list of peer addresses
	pub peers: Vec<String>,

	/// Seconds between sync cycles
	pub sync_interval_seconds: u64,

	/// Listen address override (defaults to all interfaces on the port of `self`)
	pub bind: Option<String>,

	/// Pause between starting the listener and the first sync cycle
	pub startup_delay_ms: u64,

	/// Glob patterns that are never indexed, served or downloaded
	pub exclude_patterns: Vec<String>,

	/// Default log level when RUST_LOG is not set
	pub log_level: String,

	/// Datagram protocol limits
	pub protocol: ProtocolSettings,
}

impl Default for NodeConfig {
	fn default() -> Self {
		NodeConfig {
			directory: PathBuf::from("."),
			self_addr: "127.0.0.1:9000".to_string(),
			peers: vec![],
			sync_interval_seconds: 5,
			bind: None,
			startup_delay_ms: 2000,
			exclude_patterns: vec![],
			log_level: "info".to_string(),
			protocol: ProtocolSettings::default(),
		}
	}
}

impl NodeConfig {
	/// Load and validate a configuration file
	pub fn load(path: &Path) -> Result<Self, SyncError> {
		let contents = std::fs::read_to_string(path).map_err(|e| SyncError::InvalidConfig {
			message: format!("Cannot read {}: {}", path.display(), e),
		})?;

		let is_toml = path.extension().map(|ext| ext == "toml").unwrap_or(false);
		let config = if is_toml { Self::from_toml(&contents)? } else { Self::from_json(&contents)? };
		config.validate()?;
		Ok(config)
	}

	/// Parse a JSON/JSON5 document
	pub fn from_json(contents: &str) -> Result<Self, SyncError> {
		json5::from_str(contents)
			.map_err(|e| SyncError::InvalidConfig { message: format!("JSON parse error: {}", e) })
	}

	/// Parse a TOML document
	pub fn from_toml(contents: &str) -> Result<Self, SyncError> {
		toml::from_str(contents)
			.map_err(|e| SyncError::InvalidConfig { message: format!("TOML parse error: {}", e) })
	}

	/// Node identifier (the configured `self` address)
	pub fn node_id(&self) -> &str {
		&self.self_addr
	}

	/// Configured peers, de-duplicated and without this node's own address
	pub fn peer_list(&self) -> Vec<String> {
		let mut peers: Vec<String> = Vec::with_capacity(self.peers.len());
		for peer in &self.peers {
			if *peer != self.self_addr && !peers.contains(peer) {
				peers.push(peer.clone());
			}
		}
		peers
	}

	/// Address the listener binds to
	pub fn bind_addr(&self) -> Result<SocketAddr, SyncError> {
		if let Some(bind) = &self.bind {
			return bind.parse().map_err(|e| SyncError::InvalidConfig {
				message: format!("Invalid bind address '{}': {}", bind, e),
			});
		}
		let port = self
			.self_addr
			.rsplit_once(':')
			.and_then(|(_, port)| port.parse::<u16>().ok())
			.ok_or_else(|| SyncError::InvalidConfig {
				message: format!("Cannot derive port from '{}'", self.self_addr),
			})?;
		Ok(SocketAddr::from(([0, 0, 0, 0], port)))
	}

	/// Location of the persisted metadata document
	pub fn metadata_path(&self) -> PathBuf {
		self.directory.join(METADATA_FILE)
	}

	pub fn sync_interval(&self) -> Duration {
		Duration::from_secs(self.sync_interval_seconds)
	}

	pub fn startup_delay(&self) -> Duration {
		Duration::from_millis(self.startup_delay_ms)
	}
}

impl Validator for NodeConfig {
	fn validate(&self) -> Result<(), ValidationError> {
		validation::validate_peer_address(&self.self_addr)?;
		for peer in &self.peers {
			validation::validate_peer_address(peer)?;
		}
		validation::validate_interval_secs(self.sync_interval_seconds)?;
		if let Some(bind) = &self.bind {
			bind.parse::<SocketAddr>().map_err(|e| {
				ValidationError::ConfigError(format!("Invalid bind address '{}': {}", bind, e))
			})?;
		}
		self.protocol.validate()
	}
}

// ============================================================================
// PROTOCOL SETTINGS
// ============================================================================

/// Limits of the datagram protocol
///
/// The defaults are the protocol constants every node is expected to use;
/// they are only configurable so that tests can run with short timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSettings {
	/// Per-attempt wait for a reply or ACK
	pub timeout_ms: u64,

	/// Total attempts per request, chunk or file pull
	pub max_retries: u32,

	/// Payload bytes per FILE_CHUNK datagram
	pub chunk_size: usize,

	/// Largest datagram we ever expect to receive
	pub max_datagram_size: usize,
}

impl Default for ProtocolSettings {
	fn default() -> Self {
		ProtocolSettings { timeout_ms: 5000, max_retries: 3, chunk_size: 1400, max_datagram_size: 65507 }
	}
}

impl ProtocolSettings {
	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout_ms)
	}
}

impl Validator for ProtocolSettings {
	fn validate(&self) -> Result<(), ValidationError> {
		validation::validate_timeout_ms(self.timeout_ms)?;
		validation::validate_retry_count(self.max_retries)?;
		validation::validate_chunk_size(self.chunk_size, self.max_datagram_size)
	}
}


// vim: ts=4
