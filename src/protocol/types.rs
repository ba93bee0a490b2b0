//! Wire-visible payload types
//!
//! These are the JSON documents carried by `INDEX_RSP` and `TOMB_RSP`, and
//! the entry shapes shared with the persisted metadata document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fingerprint of one file as reported on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
	/// Modification time, whole seconds since the epoch
	pub mtime: i64,
	/// SHA-256 of the content, lowercase hex
	pub sha256: String,
}

/// Deletion record as reported on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TombstoneEntry {
	/// Deletion time, whole seconds since the epoch
	pub deleted_at: i64,
	/// Node that observed the deletion
	pub by: String,
}

/// Answer to `INDEX_REQ`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPayload {
	pub node_id: String,
	pub generated_at: i64,
	#[serde(default)]
	pub files: BTreeMap<String, FileEntry>,
}

/// Answer to `TOMB_REQ`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TombstonePayload {
	pub node_id: String,
	pub generated_at: i64,
	#[serde(default)]
	pub tombstones: BTreeMap<String, TombstoneEntry>,
}

/// One slice of a file in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
	/// Zero-based sequence number
	pub seq: u64,
	/// Number of chunks in the whole file
	pub total: u64,
	/// Verbatim chunk bytes
	pub data: Vec<u8>,
}

// vim: ts=4
