//! Error types for peersync operations

use std::error::Error;
use std::fmt;
use std::io;

use crate::exclusion::ExclusionError;
use crate::protocol::ProtocolError;
use crate::validation::ValidationError;

/// Main error type for node operations
#[derive(Debug)]
pub enum SyncError {
	/// Peer communication failed (nested)
	Protocol(ProtocolError),

	/// Metadata or file persistence failed (nested)
	State(StateError),

	/// I/O error
	Io(io::Error),

	/// Invalid configuration
	InvalidConfig { message: String },

	/// Validation failure (nested)
	Validation(ValidationError),

	/// Downloaded content does not match the announced digest
	HashMismatch { path: String, expected: String, actual: String },

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Protocol(e) => write!(f, "Protocol error: {}", e),
			SyncError::State(e) => write!(f, "State error: {}", e),
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::Validation(e) => write!(f, "{}", e),
			SyncError::HashMismatch { path, expected, actual } => {
				write!(f, "Content of {} hashes to {}, expected {}", path, actual, expected)
			}
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<ProtocolError> for SyncError {
	fn from(e: ProtocolError) -> Self {
		SyncError::Protocol(e)
	}
}

impl From<StateError> for SyncError {
	fn from(e: StateError) -> Self {
		SyncError::State(e)
	}
}

impl From<ExclusionError> for SyncError {
	fn from(e: ExclusionError) -> Self {
		SyncError::InvalidConfig { message: e.to_string() }
	}
}

impl From<ValidationError> for SyncError {
	fn from(e: ValidationError) -> Self {
		SyncError::Validation(e)
	}
}

/// Metadata store and local file persistence errors
#[derive(Debug)]
pub enum StateError {
	/// Failed to load a document
	LoadFailed { source: Box<dyn Error + Send + Sync> },

	/// Failed to persist a document or a downloaded file
	SaveFailed { source: Box<dyn Error + Send + Sync> },

	/// Document is not valid JSON of the expected shape
	Corrupted { message: String },

	/// Relative path does not resolve under the node's root
	InvalidPath { path: String },
}

impl fmt::Display for StateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StateError::LoadFailed { source } => write!(f, "Failed to load state: {}", source),
			StateError::SaveFailed { source } => write!(f, "Failed to save state: {}", source),
			StateError::Corrupted { message } => write!(f, "State corrupted: {}", message),
			StateError::InvalidPath { path } => {
				write!(f, "Path escapes sync root: {}", path)
			}
		}
	}
}

impl Error for StateError {}

impl StateError {
	pub(crate) fn save(e: impl Error + Send + Sync + 'static) -> Self {
		StateError::SaveFailed { source: Box::new(e) }
	}
}


// vim: ts=4
