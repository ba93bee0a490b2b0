//! Datagram implementation of the peer transport

use async_trait::async_trait;

use super::error::ProtocolError;
use super::request::request;
use super::traits::{PeerTransport, ProtocolResult};
use super::transfer;
use super::types::{IndexPayload, TombstonePayload};
use super::wire::{Command, Message};
use crate::config::ProtocolSettings;

/// Talks to peers over UDP, one short-lived socket per exchange
#[derive(Debug, Clone, Default)]
pub struct UdpTransport {
	settings: ProtocolSettings,
}

impl UdpTransport {
	pub fn new(settings: ProtocolSettings) -> Self {
		UdpTransport { settings }
	}

	pub fn settings(&self) -> &ProtocolSettings {
		&self.settings
	}
}

#[async_trait]
impl PeerTransport for UdpTransport {
	async fn fetch_index(&self, peer: &str) -> ProtocolResult<IndexPayload> {
		match request(peer, &Message::IndexReq, &self.settings).await? {
			Message::IndexRsp(payload) => Ok(payload),
			other => Err(unexpected(Command::IndexRsp, &other)),
		}
	}

	async fn fetch_tombstones(&self, peer: &str) -> ProtocolResult<TombstonePayload> {
		match request(peer, &Message::TombReq, &self.settings).await? {
			Message::TombRsp(payload) => Ok(payload),
			other => Err(unexpected(Command::TombRsp, &other)),
		}
	}

	async fn fetch_file(&self, peer: &str, path: &str) -> ProtocolResult<Vec<u8>> {
		transfer::fetch_file(peer, path, &self.settings).await
	}
}

fn unexpected(expected: Command, got: &Message) -> ProtocolError {
	ProtocolError::UnexpectedReply { expected: expected.as_str(), got: got.command().as_str() }
}

// vim: ts=4
