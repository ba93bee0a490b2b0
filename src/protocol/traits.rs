//! Core protocol trait used by the sync engine
//!
//! The engine depends only on this trait, never on the datagram transport
//! directly.

use async_trait::async_trait;

use super::error::ProtocolError;
use super::types::{IndexPayload, TombstonePayload};

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Client side operations a node performs against one peer
#[async_trait]
pub trait PeerTransport: Send + Sync {
	/// Ask the peer for its file index (`INDEX_REQ`)
	async fn fetch_index(&self, peer: &str) -> ProtocolResult<IndexPayload>;

	/// Ask the peer for its deletion records (`TOMB_REQ`)
	async fn fetch_tombstones(&self, peer: &str) -> ProtocolResult<TombstonePayload>;

	/// Pull the full content of one file (`FILE_REQ` + chunk stream)
	async fn fetch_file(&self, peer: &str, path: &str) -> ProtocolResult<Vec<u8>>;
}

// vim: ts=4
