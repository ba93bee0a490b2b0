//! Reliable request/response over datagrams
//!
//! One request, one reply, on a socket that lives only for the call. The
//! request is re-sent on every timeout until the attempt budget is spent.
//! The first well-formed reply wins, whichever attempt it answers.
//!
//! There is no correlation id: the ephemeral socket is assumed to carry a
//! single exchange, so a stray datagram arriving on it would be taken as
//! the reply. Concurrent exchanges with one peer would need ids added.

use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

use super::error::ProtocolError;
use super::traits::ProtocolResult;
use super::wire::Message;
use crate::config::ProtocolSettings;
use crate::logging::*;

/// Progress of one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
	/// Nothing sent yet
	Idle,
	/// Request must be (re)transmitted for this attempt
	Sent { attempt: u32 },
	/// Request is on the wire, waiting for the reply
	AwaitingReply { attempt: u32 },
	/// A reply arrived
	Success,
	/// Every attempt timed out
	RetryExhausted,
}

/// What happened while in a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEvent {
	Start,
	Transmitted,
	Reply,
	Timeout,
}

impl RequestState {
	/// Advance the state machine; `max_attempts` bounds the number of sends
	pub fn next(self, event: RequestEvent, max_attempts: u32) -> Self {
		match (self, event) {
			(RequestState::Idle, RequestEvent::Start) => RequestState::Sent { attempt: 1 },
			(RequestState::Sent { attempt }, RequestEvent::Transmitted) => {
				RequestState::AwaitingReply { attempt }
			}
			(RequestState::AwaitingReply { .. }, RequestEvent::Reply) => RequestState::Success,
			(RequestState::AwaitingReply { attempt }, RequestEvent::Timeout) => {
				if attempt >= max_attempts {
					RequestState::RetryExhausted
				} else {
					RequestState::Sent { attempt: attempt + 1 }
				}
			}
			(state, _) => state,
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, RequestState::Success | RequestState::RetryExhausted)
	}
}

/// Send `message` to `peer` and wait for one reply
pub async fn request(
	peer: &str,
	message: &Message,
	settings: &ProtocolSettings,
) -> ProtocolResult<Message> {
	let peer_addr = resolve_peer(peer).await?;
	let socket = bind_ephemeral(peer_addr).await?;
	let datagram = message.encode()?;
	let mut buf = vec![0u8; settings.max_datagram_size];

	let mut state = RequestState::Idle.next(RequestEvent::Start, settings.max_retries);
	let mut reply = None;
	while !state.is_terminal() {
		let event = match state {
			RequestState::Sent { attempt } => {
				debug!(
					"{} -> {} (attempt {}/{})",
					message.command().as_str(),
					peer,
					attempt,
					settings.max_retries
				);
				socket.send_to(&datagram, peer_addr).await?;
				RequestEvent::Transmitted
			}
			RequestState::AwaitingReply { .. } => {
				let deadline = Instant::now() + settings.timeout();
				match await_reply(&socket, &mut buf, deadline).await? {
					Some(msg) => {
						reply = Some(msg);
						RequestEvent::Reply
					}
					None => RequestEvent::Timeout,
				}
			}
			_ => break,
		};
		state = state.next(event, settings.max_retries);
	}

	match reply {
		Some(msg) => Ok(msg),
		None => Err(ProtocolError::NoResponse { peer: peer.to_string() }),
	}
}

/// Wait until `deadline` for one decodable datagram; `None` on timeout
async fn await_reply(
	socket: &UdpSocket,
	buf: &mut [u8],
	deadline: Instant,
) -> ProtocolResult<Option<Message>> {
	loop {
		let (len, from) = match timeout_at(deadline, socket.recv_from(buf)).await {
			Err(_) => return Ok(None),
			Ok(Err(e)) if is_transient(&e) => {
				// ICMP unreachable surfaced as an error on some platforms
				debug!("Transient receive error: {}", e);
				continue;
			}
			Ok(Err(e)) => return Err(e.into()),
			Ok(Ok(received)) => received,
		};

		match Message::decode(&buf[..len]) {
			Ok(msg) => return Ok(Some(msg)),
			Err(e) => warn!("Dropping datagram from {}: {}", from, e),
		}
	}
}

pub(crate) fn is_transient(e: &std::io::Error) -> bool {
	matches!(e.kind(), std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionRefused)
}

/// Resolve a `host:port` peer string
pub(crate) async fn resolve_peer(peer: &str) -> ProtocolResult<SocketAddr> {
	tokio::net::lookup_host(peer)
		.await
		.map_err(|e| ProtocolError::InvalidAddress(format!("{}: {}", peer, e)))?
		.next()
		.ok_or_else(|| ProtocolError::InvalidAddress(peer.to_string()))
}

/// Bind a fresh socket of the same address family as `peer`
pub(crate) async fn bind_ephemeral(peer: SocketAddr) -> ProtocolResult<UdpSocket> {
	let local: SocketAddr =
		if peer.is_ipv4() { SocketAddr::from(([0, 0, 0, 0], 0)) } else { SocketAddr::from(([0u16; 8], 0)) };
	Ok(UdpSocket::bind(local).await?)
}


// vim: ts=4
