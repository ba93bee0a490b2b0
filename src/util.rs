use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use std::{fs, io, path};

/// Current time in whole seconds since the epoch
pub fn now_ts() -> i64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// SHA-256 of a byte slice, lowercase hex
pub fn hash(buf: &[u8]) -> String {
	hex::encode(Sha256::digest(buf))
}

/// SHA-256 of a file's content, streamed, lowercase hex
pub fn hash_file(path: &path::Path) -> io::Result<String> {
	let mut file = fs::File::open(path)?;
	let mut hasher = Sha256::new();
	io::copy(&mut file, &mut hasher)?;
	Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hash_known_value() {
		assert_eq!(hash(b""), "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
	}

	#[test]
	fn test_hash_file_matches_hash() {
		let dir = tempfile::TempDir::new().unwrap();
		let file = dir.path().join("f");
		fs::write(&file, b"hello world").unwrap();
		assert_eq!(hash_file(&file).unwrap(), hash(b"hello world"));
	}
}

// vim: ts=4
