//! Datagram codec
//!
//! Every datagram is `COMMAND` or `COMMAND|payload`. The payload is either a
//! JSON document, a short text token, or for `FILE_CHUNK` a binary body:
//!
//! ```text
//! FILE_CHUNK|<seq>|<total>|<raw bytes...>
//! ```
//!
//! Only the first three delimiters of a chunk are significant; the body may
//! contain `|` bytes.

use super::error::ProtocolError;
use super::traits::ProtocolResult;
use super::types::{Chunk, IndexPayload, TombstonePayload};

const DELIMITER: u8 = b'|';

/// Closed set of command tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
	IndexReq,
	IndexRsp,
	TombReq,
	TombRsp,
	FileReq,
	FileChunk,
	Ack,
	FileErr,
}

impl Command {
	pub fn as_str(&self) -> &'static str {
		match self {
			Command::IndexReq => "INDEX_REQ",
			Command::IndexRsp => "INDEX_RSP",
			Command::TombReq => "TOMB_REQ",
			Command::TombRsp => "TOMB_RSP",
			Command::FileReq => "FILE_REQ",
			Command::FileChunk => "FILE_CHUNK",
			Command::Ack => "ACK",
			Command::FileErr => "FILE_ERR",
		}
	}

	pub fn from_token(token: &[u8]) -> Option<Self> {
		match token {
			b"INDEX_REQ" => Some(Command::IndexReq),
			b"INDEX_RSP" => Some(Command::IndexRsp),
			b"TOMB_REQ" => Some(Command::TombReq),
			b"TOMB_RSP" => Some(Command::TombRsp),
			b"FILE_REQ" => Some(Command::FileReq),
			b"FILE_CHUNK" => Some(Command::FileChunk),
			b"ACK" => Some(Command::Ack),
			b"FILE_ERR" => Some(Command::FileErr),
			_ => None,
		}
	}

	/// Identify the command of a raw datagram without decoding its payload
	pub fn peek(buf: &[u8]) -> Option<Self> {
		let (token, _) = split_once(buf);
		Self::from_token(token)
	}
}

/// A decoded datagram
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
	IndexReq,
	IndexRsp(IndexPayload),
	TombReq,
	TombRsp(TombstonePayload),
	FileReq(String),
	FileChunk(Chunk),
	Ack(u64),
	FileErr(String),
}

impl Message {
	pub fn command(&self) -> Command {
		match self {
			Message::IndexReq => Command::IndexReq,
			Message::IndexRsp(_) => Command::IndexRsp,
			Message::TombReq => Command::TombReq,
			Message::TombRsp(_) => Command::TombRsp,
			Message::FileReq(_) => Command::FileReq,
			Message::FileChunk(_) => Command::FileChunk,
			Message::Ack(_) => Command::Ack,
			Message::FileErr(_) => Command::FileErr,
		}
	}

	/// Encode into a single datagram
	pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
		let token = self.command().as_str().as_bytes();
		let payload: Vec<u8> = match self {
			Message::IndexReq | Message::TombReq => return Ok(token.to_vec()),
			Message::IndexRsp(payload) => serde_json::to_vec(payload)?,
			Message::TombRsp(payload) => serde_json::to_vec(payload)?,
			Message::FileReq(path) => path.as_bytes().to_vec(),
			Message::FileChunk(chunk) => return Ok(encode_chunk(chunk)),
			Message::Ack(seq) => seq.to_string().into_bytes(),
			Message::FileErr(reason) => reason.as_bytes().to_vec(),
		};

		let mut buf = Vec::with_capacity(token.len() + 1 + payload.len());
		buf.extend_from_slice(token);
		buf.push(DELIMITER);
		buf.extend_from_slice(&payload);
		Ok(buf)
	}

	/// Decode a datagram
	///
	/// Any failure is reported as `ProtocolError::Malformed`.
	pub fn decode(buf: &[u8]) -> ProtocolResult<Self> {
		let (token, payload) = split_once(buf);
		let command = Command::from_token(token).ok_or_else(|| {
			ProtocolError::Malformed(format!(
				"unknown command '{}'",
				String::from_utf8_lossy(&token[..token.len().min(32)])
			))
		})?;
		let payload = payload.unwrap_or(&[]);

		match command {
			Command::IndexReq => Ok(Message::IndexReq),
			Command::TombReq => Ok(Message::TombReq),
			Command::IndexRsp => serde_json::from_slice(payload)
				.map(Message::IndexRsp)
				.map_err(|e| ProtocolError::Malformed(format!("INDEX_RSP payload: {}", e))),
			Command::TombRsp => serde_json::from_slice(payload)
				.map(Message::TombRsp)
				.map_err(|e| ProtocolError::Malformed(format!("TOMB_RSP payload: {}", e))),
			Command::FileReq => {
				let path = utf8(payload, "FILE_REQ path")?;
				if path.is_empty() {
					return Err(ProtocolError::Malformed("FILE_REQ without path".to_string()));
				}
				Ok(Message::FileReq(path.to_string()))
			}
			Command::FileChunk => decode_chunk(payload).map(Message::FileChunk),
			Command::Ack => parse_u64(payload, "ACK sequence").map(Message::Ack),
			Command::FileErr => Ok(Message::FileErr(String::from_utf8_lossy(payload).into_owned())),
		}
	}
}

fn encode_chunk(chunk: &Chunk) -> Vec<u8> {
	let header = format!("{}|{}|{}|", Command::FileChunk.as_str(), chunk.seq, chunk.total);
	let mut buf = Vec::with_capacity(header.len() + chunk.data.len());
	buf.extend_from_slice(header.as_bytes());
	buf.extend_from_slice(&chunk.data);
	buf
}

fn decode_chunk(payload: &[u8]) -> ProtocolResult<Chunk> {
	let (seq, rest) = split_once(payload);
	let rest = rest.ok_or_else(|| ProtocolError::Malformed("FILE_CHUNK without total".into()))?;
	let (total, data) = split_once(rest);
	let data = data.ok_or_else(|| ProtocolError::Malformed("FILE_CHUNK without body".into()))?;

	let seq = parse_u64(seq, "FILE_CHUNK sequence")?;
	let total = parse_u64(total, "FILE_CHUNK total")?;
	if total == 0 || seq >= total {
		return Err(ProtocolError::Malformed(format!(
			"FILE_CHUNK sequence {} out of range for total {}",
			seq, total
		)));
	}
	Ok(Chunk { seq, total, data: data.to_vec() })
}

/// Split at the first delimiter; the second half is `None` if there is none
fn split_once(buf: &[u8]) -> (&[u8], Option<&[u8]>) {
	match buf.iter().position(|b| *b == DELIMITER) {
		Some(pos) => (&buf[..pos], Some(&buf[pos + 1..])),
		None => (buf, None),
	}
}

fn utf8<'a>(bytes: &'a [u8], what: &str) -> ProtocolResult<&'a str> {
	std::str::from_utf8(bytes)
		.map_err(|e| ProtocolError::Malformed(format!("{} is not UTF-8: {}", what, e)))
}

fn parse_u64(bytes: &[u8], what: &str) -> ProtocolResult<u64> {
	let text = utf8(bytes, what)?;
	text.parse::<u64>()
		.map_err(|_| ProtocolError::Malformed(format!("{} '{}' is not an integer", what, text)))
}


// vim: ts=4
