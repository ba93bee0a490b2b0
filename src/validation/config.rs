//! Configuration validation functions

use super::ValidationError;

/// Worst-case `FILE_CHUNK|<seq>|<total>|` header length (two u64 fields)
pub const MAX_CHUNK_HEADER_LEN: usize = "FILE_CHUNK|".len() + 20 + 1 + 20 + 1;

/// Validate a `host:port` peer address
///
/// The host part is not resolved here; only the shape is checked.
pub fn validate_peer_address(addr: &str) -> Result<(), ValidationError> {
	let (host, port) = addr.rsplit_once(':').ok_or_else(|| {
		ValidationError::ConfigError(format!("Address '{}' is not in host:port form", addr))
	})?;
	if host.is_empty() {
		return Err(ValidationError::ConfigError(format!("Address '{}' has an empty host", addr)));
	}
	port.parse::<u16>().map_err(|e| {
		ValidationError::ConfigError(format!("Address '{}' has an invalid port: {}", addr, e))
	})?;
	Ok(())
}

/// Validate that a chunk plus its header fits into one datagram
pub fn validate_chunk_size(chunk_size: usize, max_datagram: usize) -> Result<(), ValidationError> {
	if chunk_size == 0 {
		return Err(ValidationError::ConfigError("chunk_size must be greater than 0".to_string()));
	}
	if chunk_size + MAX_CHUNK_HEADER_LEN > max_datagram {
		return Err(ValidationError::ConfigError(format!(
			"chunk_size {} does not fit into a {} byte datagram",
			chunk_size, max_datagram
		)));
	}
	Ok(())
}

/// Validate retry count
pub fn validate_retry_count(count: u32) -> Result<(), ValidationError> {
	if count == 0 {
		return Err(ValidationError::ConfigError("max_retries must be at least 1".to_string()));
	}
	if count > 100 {
		return Err(ValidationError::ConfigError(format!("Retry count too high: {}", count)));
	}
	Ok(())
}

/// Validate per-attempt timeout in milliseconds
pub fn validate_timeout_ms(timeout_ms: u64) -> Result<(), ValidationError> {
	if timeout_ms == 0 {
		return Err(ValidationError::ConfigError("Timeout must be greater than 0".to_string()));
	}
	if timeout_ms > 3_600_000 {
		return Err(ValidationError::ConfigError(format!(
			"Timeout too large: {} ms (max 3600000)",
			timeout_ms
		)));
	}
	Ok(())
}

/// Validate the sync interval
pub fn validate_interval_secs(secs: u64) -> Result<(), ValidationError> {
	if secs == 0 {
		return Err(ValidationError::ConfigError(
			"sync_interval_seconds must be at least 1".to_string(),
		));
	}
	Ok(())
}


// vim: ts=4
