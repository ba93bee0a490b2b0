//! Reconciliation rules
//!
//! Pure decision functions shared by every node. Each node evaluates them
//! independently against what a peer reports; because the rules order
//! versions by timestamp and then by node identifier, two nodes looking at
//! the same conflict always pick the same winner.

use crate::protocol::types::{FileEntry, TombstoneEntry};

/// Why a remote file version was or was not adopted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
	/// A local deletion is at or after the remote modification
	Tombstoned,
	/// No local copy
	Absent,
	/// Remote modification time is later
	RemoteNewer,
	/// Local modification time is later
	LocalNewer,
	/// Same time, same content
	Identical,
	/// Same time, different content, remote node id sorts higher
	TieBreakRemote,
	/// Same time, different content, local node id sorts higher (or equal)
	TieBreakLocal,
}

/// Outcome of comparing one remote file against local state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
	Download(Reason),
	Keep(Reason),
}

impl Verdict {
	pub fn is_download(&self) -> bool {
		matches!(self, Verdict::Download(_))
	}

	pub fn reason(&self) -> Reason {
		match self {
			Verdict::Download(reason) | Verdict::Keep(reason) => *reason,
		}
	}
}

/// Decide whether the remote version of a file should replace local state
pub fn decide(
	local: Option<&FileEntry>,
	tombstone: Option<&TombstoneEntry>,
	remote: &FileEntry,
	remote_node: &str,
	local_node: &str,
) -> Verdict {
	if let Some(tombstone) = tombstone {
		if tombstone.deleted_at >= remote.mtime {
			return Verdict::Keep(Reason::Tombstoned);
		}
	}

	let local = match local {
		Some(local) => local,
		None => return Verdict::Download(Reason::Absent),
	};

	if remote.mtime > local.mtime {
		return Verdict::Download(Reason::RemoteNewer);
	}
	if remote.mtime < local.mtime {
		return Verdict::Keep(Reason::LocalNewer);
	}
	if remote.sha256 == local.sha256 {
		return Verdict::Keep(Reason::Identical);
	}
	if remote_node > local_node {
		Verdict::Download(Reason::TieBreakRemote)
	} else {
		Verdict::Keep(Reason::TieBreakLocal)
	}
}

/// Whether a remote tombstone is newer than what we recorded (none counts as 0)
pub fn tombstone_supersedes(local: Option<&TombstoneEntry>, remote: &TombstoneEntry) -> bool {
	remote.deleted_at > local.map(|t| t.deleted_at).unwrap_or(0)
}

/// Whether a deletion is causally at or after the local file's last change
pub fn deletion_wins(local_mtime: i64, remote: &TombstoneEntry) -> bool {
	local_mtime <= remote.deleted_at
}


// vim: ts=4
