//! Protocol error types
//!
//! Covers everything that can go wrong while talking to a peer over the
//! datagram transport, with automatic conversions from the underlying
//! I/O and JSON errors.

use std::fmt;
use std::io;

/// Protocol error type
#[derive(Debug)]
pub enum ProtocolError {
	/// Request/response exchange exhausted its retry budget
	NoResponse { peer: String },
	/// A file pull exhausted its retry budget without completing
	TransferTimeout { peer: String, path: String },
	/// Serving side never saw an ACK for a chunk
	AckTimeout { seq: u64 },
	/// Peer answered a file request with FILE_ERR
	RemoteAborted { reason: String },
	/// Undecodable datagram
	Malformed(String),
	/// Well-formed reply of the wrong kind
	UnexpectedReply { expected: &'static str, got: &'static str },
	/// Invalid peer address
	InvalidAddress(String),
	/// I/O error from socket or file operations
	Io(io::Error),
	/// JSON encoding error
	Json(String),
}

impl ProtocolError {
	/// Whether this error means a datagram should just be dropped
	pub fn is_malformed(&self) -> bool {
		matches!(self, ProtocolError::Malformed(_))
	}
}

impl fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProtocolError::NoResponse { peer } => write!(f, "No response from {}", peer),
			ProtocolError::TransferTimeout { peer, path } => {
				write!(f, "Transfer of '{}' from {} timed out", path, peer)
			}
			ProtocolError::AckTimeout { seq } => {
				write!(f, "No ACK received for chunk {}", seq)
			}
			ProtocolError::RemoteAborted { reason } => {
				write!(f, "Remote aborted transfer: {}", reason)
			}
			ProtocolError::Malformed(msg) => write!(f, "Malformed message: {}", msg),
			ProtocolError::UnexpectedReply { expected, got } => {
				write!(f, "Unexpected reply: expected {}, got {}", expected, got)
			}
			ProtocolError::InvalidAddress(addr) => write!(f, "Invalid peer address: {}", addr),
			ProtocolError::Io(e) => write!(f, "I/O error: {}", e),
			ProtocolError::Json(msg) => write!(f, "JSON error: {}", msg),
		}
	}
}

impl std::error::Error for ProtocolError {}

impl From<io::Error> for ProtocolError {
	fn from(e: io::Error) -> Self {
		ProtocolError::Io(e)
	}
}

impl From<serde_json::Error> for ProtocolError {
	fn from(e: serde_json::Error) -> Self {
		ProtocolError::Json(e.to_string())
	}
}


// vim: ts=4
