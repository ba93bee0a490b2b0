//! Chunked file transfer
//!
//! The serving side splits a file into fixed-size chunks and sends them in
//! strict lockstep: chunk `n + 1` only leaves after `ACK|n` came back, with a
//! bounded number of retransmissions per chunk. The pulling side collects
//! chunks keyed by sequence number, acknowledges every chunk it sees
//! (duplicates included, since the earlier ACK may have been lost) and
//! reassembles once it holds `total` distinct chunks.
//!
//! A fresh `FILE_REQ` always starts a new serving attempt from chunk 0.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::UdpSocket;
use tokio::time::{timeout, timeout_at, Instant};

use super::error::ProtocolError;
use super::request::{bind_ephemeral, is_transient, resolve_peer};
use super::traits::ProtocolResult;
use super::types::Chunk;
use super::wire::Message;
use crate::config::ProtocolSettings;
use crate::logging::*;

/// Reason token sent when the requested path cannot be served
pub const NOT_FOUND: &str = "NotFound";

/// Split file content into chunks; empty content is one empty chunk
pub fn split_into_chunks(data: &[u8], chunk_size: usize) -> Vec<&[u8]> {
	if data.is_empty() {
		return vec![&data[..0]];
	}
	data.chunks(chunk_size).collect()
}

// ============================================================================
// RECEIVING SIDE
// ============================================================================

/// Chunks collected during one download attempt
#[derive(Debug, Default)]
pub struct TransferSession {
	total: Option<u64>,
	received: BTreeMap<u64, Vec<u8>>,
}

impl TransferSession {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record a chunk; returns false for duplicates and out-of-range chunks
	///
	/// The total is learned from the first chunk seen. A chunk already
	/// recorded is never overwritten.
	pub fn record(&mut self, chunk: Chunk) -> bool {
		let total = *self.total.get_or_insert(chunk.total);
		if chunk.seq >= total {
			warn!("Chunk {} outside of announced total {}", chunk.seq, total);
			return false;
		}
		if self.received.contains_key(&chunk.seq) {
			return false;
		}
		self.received.insert(chunk.seq, chunk.data);
		true
	}

	pub fn total(&self) -> Option<u64> {
		self.total
	}

	pub fn received_count(&self) -> usize {
		self.received.len()
	}

	pub fn is_complete(&self) -> bool {
		matches!(self.total, Some(total) if self.received.len() as u64 == total)
	}

	/// Concatenate chunks in ascending sequence order
	pub fn assemble(self) -> Vec<u8> {
		let size = self.received.values().map(Vec::len).sum();
		let mut out = Vec::with_capacity(size);
		for data in self.received.into_values() {
			out.extend_from_slice(&data);
		}
		out
	}
}

/// Pull one file from `peer`
///
/// Only datagrams from the peer's IP are considered; the port differs
/// because the peer serves every transfer from a fresh socket.
pub async fn fetch_file(peer: &str, path: &str, settings: &ProtocolSettings) -> ProtocolResult<Vec<u8>> {
	let peer_addr = resolve_peer(peer).await?;
	let socket = bind_ephemeral(peer_addr).await?;
	let request = Message::FileReq(path.to_string()).encode()?;
	let mut buf = vec![0u8; settings.max_datagram_size];
	let mut session = TransferSession::new();

	for attempt in 1..=settings.max_retries {
		debug!("FILE_REQ {} -> {} (attempt {}/{})", path, peer, attempt, settings.max_retries);
		socket.send_to(&request, peer_addr).await?;

		loop {
			let (len, from) = match timeout(settings.timeout(), socket.recv_from(&mut buf)).await {
				Err(_) => break,
				Ok(Err(e)) if is_transient(&e) => continue,
				Ok(Err(e)) => return Err(e.into()),
				Ok(Ok(received)) => received,
			};
			if from.ip() != peer_addr.ip() {
				continue;
			}

			match Message::decode(&buf[..len]) {
				Ok(Message::FileChunk(chunk)) => {
					let seq = chunk.seq;
					session.record(chunk);
					socket.send_to(&Message::Ack(seq).encode()?, from).await?;

					if session.is_complete() {
						debug!("Received '{}' from {} in {} chunks", path, peer, session.received_count());
						return Ok(session.assemble());
					}
				}
				Ok(Message::FileErr(reason)) => return Err(ProtocolError::RemoteAborted { reason }),
				Ok(other) => debug!("Ignoring {} during transfer", other.command().as_str()),
				Err(e) => warn!("Dropping datagram from {}: {}", from, e),
			}
		}
	}

	Err(ProtocolError::TransferTimeout { peer: peer.to_string(), path: path.to_string() })
}

// ============================================================================
// SERVING SIDE
// ============================================================================

/// How a serving attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
	/// Every chunk was acknowledged
	Completed { chunks: u64 },
	/// FILE_ERR was sent instead
	Refused,
}

/// Serve one file to `client` over `socket`
///
/// `file` is the resolved local path, or `None` when the requested path
/// did not resolve under the root; both that and a missing file are
/// answered with `FILE_ERR|NotFound`.
pub async fn serve_file(
	socket: &UdpSocket,
	client: SocketAddr,
	file: Option<PathBuf>,
	settings: &ProtocolSettings,
) -> ProtocolResult<ServeOutcome> {
	let content = match file {
		Some(full) => match tokio::fs::read(&full).await {
			Ok(content) => Some(content),
			Err(e) => {
				debug!("Cannot read {}: {}", full.display(), e);
				None
			}
		},
		None => None,
	};
	let content = match content {
		Some(content) => content,
		None => {
			socket.send_to(&Message::FileErr(NOT_FOUND.to_string()).encode()?, client).await?;
			return Ok(ServeOutcome::Refused);
		}
	};

	let chunks = split_into_chunks(&content, settings.chunk_size);
	let total = chunks.len() as u64;
	let mut buf = vec![0u8; settings.max_datagram_size];

	for (seq, data) in chunks.into_iter().enumerate() {
		let seq = seq as u64;
		let datagram = Message::FileChunk(Chunk { seq, total, data: data.to_vec() }).encode()?;

		let mut acked = false;
		for attempt in 1..=settings.max_retries {
			if attempt > 1 {
				debug!("Retransmitting chunk {}/{} to {} (attempt {})", seq, total, client, attempt);
			}
			socket.send_to(&datagram, client).await?;
			let deadline = Instant::now() + settings.timeout();
			if wait_for_ack(socket, &mut buf, client, seq, deadline).await? {
				acked = true;
				break;
			}
		}
		if !acked {
			return Err(ProtocolError::AckTimeout { seq });
		}
	}

	Ok(ServeOutcome::Completed { chunks: total })
}

/// Wait until `deadline` for `ACK|seq` from `client`, ignoring anything else
async fn wait_for_ack(
	socket: &UdpSocket,
	buf: &mut [u8],
	client: SocketAddr,
	seq: u64,
	deadline: Instant,
) -> ProtocolResult<bool> {
	loop {
		let (len, from) = match timeout_at(deadline, socket.recv_from(buf)).await {
			Err(_) => return Ok(false),
			Ok(Err(e)) if is_transient(&e) => continue,
			Ok(Err(e)) => return Err(e.into()),
			Ok(Ok(received)) => received,
		};
		if from != client {
			continue;
		}
		match Message::decode(&buf[..len]) {
			Ok(Message::Ack(acked)) if acked == seq => return Ok(true),
			Ok(_) => continue,
			Err(e) => warn!("Dropping datagram from {}: {}", from, e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chunk(seq: u64, total: u64, data: &[u8]) -> Chunk {
		Chunk { seq, total, data: data.to_vec() }
	}

	#[test]
	fn test_split_sizes() {
		let data = vec![7u8; 3000];
		let sizes: Vec<usize> = split_into_chunks(&data, 1400).iter().map(|c| c.len()).collect();
		assert_eq!(sizes, vec![1400, 1400, 200]);
	}

	#[test]
	fn test_split_empty_is_one_chunk() {
		let chunks = split_into_chunks(&[], 1400);
		assert_eq!(chunks.len(), 1);
		assert!(chunks[0].is_empty());
	}

	#[test]
	fn test_out_of_order_reassembly() {
		let data: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
		let parts = split_into_chunks(&data, 1400);

		let mut session = TransferSession::new();
		for seq in [2usize, 0, 1] {
			assert!(!session.is_complete());
			assert!(session.record(chunk(seq as u64, 3, parts[seq])));
		}
		assert!(session.is_complete());
		assert_eq!(session.assemble(), data);
	}

	#[test]
	fn test_duplicates_are_idempotent() {
		let mut session = TransferSession::new();
		assert!(session.record(chunk(0, 2, b"first")));
		assert!(!session.record(chunk(0, 2, b"XXXXX")));
		assert!(!session.is_complete());
		assert!(session.record(chunk(1, 2, b"-second")));
		assert_eq!(session.assemble(), b"first-second".to_vec());
	}

	#[test]
	fn test_total_is_learned_from_first_chunk() {
		let mut session = TransferSession::new();
		assert_eq!(session.total(), None);
		session.record(chunk(0, 2, b"a"));
		assert_eq!(session.total(), Some(2));
		// A later, inconsistent total cannot push a chunk past the first one
		assert!(!session.record(chunk(4, 9, b"b")));
		assert_eq!(session.received_count(), 1);
	}

	#[test]
	fn test_empty_file_session() {
		let mut session = TransferSession::new();
		session.record(chunk(0, 1, b""));
		assert!(session.is_complete());
		assert!(session.assemble().is_empty());
	}

	#[tokio::test]
	async fn test_serve_missing_file_sends_not_found() {
		let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		let settings = ProtocolSettings { timeout_ms: 50, ..Default::default() };

		let outcome = serve_file(&server, client.local_addr().unwrap(), None, &settings).await.unwrap();
		assert_eq!(outcome, ServeOutcome::Refused);

		let mut buf = [0u8; 64];
		let (n, _) = client.recv_from(&mut buf).await.unwrap();
		assert_eq!(&buf[..n], b"FILE_ERR|NotFound");
	}

	#[tokio::test]
	async fn test_lost_ack_causes_single_retransmission() {
		let dir = tempfile::TempDir::new().unwrap();
		let file = dir.path().join("data.bin");
		let data: Vec<u8> = (0..3000u32).map(|i| (i % 253) as u8).collect();
		std::fs::write(&file, &data).unwrap();

		let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		let client_addr = client.local_addr().unwrap();
		let settings = ProtocolSettings { timeout_ms: 200, ..Default::default() };

		let serving = tokio::spawn(async move {
			serve_file(&server, client_addr, Some(file), &settings).await
		});

		let mut buf = vec![0u8; 65507];
		let mut session = TransferSession::new();
		let mut datagrams = 0;
		let mut dropped_one = false;
		while !session.is_complete() {
			let (n, from) = client.recv_from(&mut buf).await.unwrap();
			datagrams += 1;
			let chunk = match Message::decode(&buf[..n]).unwrap() {
				Message::FileChunk(chunk) => chunk,
				other => panic!("unexpected {:?}", other),
			};
			let seq = chunk.seq;
			session.record(chunk);
			// Swallow the first ACK for chunk 1
			if seq == 1 && !dropped_one {
				dropped_one = true;
				continue;
			}
			client.send_to(&Message::Ack(seq).encode().unwrap(), from).await.unwrap();
		}

		assert_eq!(datagrams, 4);
		assert_eq!(session.assemble(), data);
		let outcome = serving.await.unwrap().unwrap();
		assert_eq!(outcome, ServeOutcome::Completed { chunks: 3 });
	}

	async fn recv_message(socket: &UdpSocket, buf: &mut [u8]) -> (Message, SocketAddr) {
		let (n, from) = timeout(std::time::Duration::from_secs(2), socket.recv_from(buf)).await.unwrap().unwrap();
		(Message::decode(&buf[..n]).unwrap(), from)
	}

	#[tokio::test]
	async fn test_fetch_from_silent_peer_times_out() {
		let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		let peer = silent.local_addr().unwrap().to_string();
		let settings = ProtocolSettings { timeout_ms: 100, max_retries: 3, ..Default::default() };

		let err = fetch_file(&peer, "a.txt", &settings).await.unwrap_err();
		assert!(matches!(err, ProtocolError::TransferTimeout { .. }), "{}", err);

		// One FILE_REQ per attempt, nothing else
		let mut buf = [0u8; 64];
		let mut received = Vec::new();
		while let Ok(Ok((n, _))) = timeout(std::time::Duration::from_millis(50), silent.recv_from(&mut buf)).await {
			received.push(buf[..n].to_vec());
		}
		assert_eq!(received, vec![b"FILE_REQ|a.txt".to_vec(); 3]);
	}

	#[tokio::test]
	async fn test_fetch_acks_retransmitted_chunk() {
		let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		let peer = server.local_addr().unwrap().to_string();
		let data: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
		let expected = data.clone();
		let settings = ProtocolSettings { timeout_ms: 500, ..Default::default() };

		let serving = tokio::spawn(async move {
			let mut buf = vec![0u8; 65507];
			let (request, client) = recv_message(&server, &mut buf).await;
			assert_eq!(request, Message::FileReq("blob.bin".to_string()));

			// Chunk 0 goes out twice, as if its first ACK never arrived
			let parts = split_into_chunks(&data, 1400);
			let mut acks = Vec::new();
			for seq in [0u64, 0, 1] {
				let chunk = Chunk { seq, total: 2, data: parts[seq as usize].to_vec() };
				server.send_to(&Message::FileChunk(chunk).encode().unwrap(), client).await.unwrap();
				match recv_message(&server, &mut buf).await.0 {
					Message::Ack(acked) => acks.push(acked),
					other => panic!("unexpected {:?}", other),
				}
			}
			acks
		});

		let fetched = fetch_file(&peer, "blob.bin", &settings).await.unwrap();
		assert_eq!(fetched, expected);
		assert_eq!(serving.await.unwrap(), vec![0, 0, 1]);
	}

	#[tokio::test]
	async fn test_fetch_ignores_chunks_from_other_hosts() {
		let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		// The whole 127.0.0.0/8 block is loopback on Linux; skip where it is not
		let stranger = match UdpSocket::bind("127.0.0.2:0").await {
			Ok(socket) => socket,
			Err(_) => return,
		};
		let peer = server.local_addr().unwrap().to_string();
		let settings = ProtocolSettings { timeout_ms: 500, ..Default::default() };

		let serving = tokio::spawn(async move {
			let mut buf = vec![0u8; 65507];
			let (_, client) = recv_message(&server, &mut buf).await;

			let forged = Chunk { seq: 0, total: 1, data: b"forged".to_vec() };
			stranger.send_to(&Message::FileChunk(forged).encode().unwrap(), client).await.unwrap();
			let genuine = Chunk { seq: 0, total: 1, data: b"genuine".to_vec() };
			server.send_to(&Message::FileChunk(genuine).encode().unwrap(), client).await.unwrap();
			assert_eq!(recv_message(&server, &mut buf).await.0, Message::Ack(0));

			// The stranger never gets acknowledged
			let mut stray = [0u8; 64];
			timeout(std::time::Duration::from_millis(200), stranger.recv_from(&mut stray)).await.is_err()
		});

		let fetched = fetch_file(&peer, "a.txt", &settings).await.unwrap();
		assert_eq!(fetched, b"genuine".to_vec());
		assert!(serving.await.unwrap());
	}

	#[tokio::test]
	async fn test_serve_aborts_without_acks() {
		let dir = tempfile::TempDir::new().unwrap();
		let file = dir.path().join("data.bin");
		std::fs::write(&file, b"hello").unwrap();

		let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		let settings = ProtocolSettings { timeout_ms: 30, ..Default::default() };

		let err = serve_file(&server, client.local_addr().unwrap(), Some(file), &settings)
			.await
			.unwrap_err();
		assert!(matches!(err, ProtocolError::AckTimeout { seq: 0 }));
	}
}

// vim: ts=4
