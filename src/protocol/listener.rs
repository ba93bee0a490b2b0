//! Per-node datagram listener
//!
//! One socket per node, bound for the node's lifetime. The receive loop only
//! classifies datagrams; every request is handled on its own task. File
//! requests are served from a fresh ephemeral socket so that their ACK
//! traffic never reaches the shared one.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use super::request::{bind_ephemeral, is_transient};
use super::traits::ProtocolResult;
use super::transfer::{serve_file, ServeOutcome};
use super::wire::{Command, Message};
use crate::config::ProtocolSettings;
use crate::logging::*;
use crate::metadata::MetadataStore;

/// Bound listener, not yet running
pub struct Listener {
	socket: Arc<UdpSocket>,
	store: Arc<MetadataStore>,
	settings: ProtocolSettings,
	running: Arc<AtomicBool>,
}

impl Listener {
	pub async fn bind(
		addr: SocketAddr,
		store: Arc<MetadataStore>,
		settings: ProtocolSettings,
	) -> ProtocolResult<Self> {
		let socket = UdpSocket::bind(addr).await?;
		Ok(Listener {
			socket: Arc::new(socket),
			store,
			settings,
			running: Arc::new(AtomicBool::new(true)),
		})
	}

	pub fn local_addr(&self) -> ProtocolResult<SocketAddr> {
		Ok(self.socket.local_addr()?)
	}

	/// Run the receive loop on a background task
	pub fn spawn(self) -> ProtocolResult<ListenerHandle> {
		let addr = self.local_addr()?;
		let running = self.running.clone();
		let stop_timeout = self.settings.timeout();
		let task = tokio::spawn(self.run());
		Ok(ListenerHandle { addr, running, stop_timeout, task })
	}

	/// Receive until stopped
	pub async fn run(self) {
		let mut buf = vec![0u8; self.settings.max_datagram_size];
		match self.socket.local_addr() {
			Ok(addr) => info!("Listening on {} as {}", addr, self.store.node_id()),
			Err(e) => warn!("Listening on unknown address: {}", e),
		}

		while self.running.load(Ordering::SeqCst) {
			let (len, from) = match self.socket.recv_from(&mut buf).await {
				Ok(received) => received,
				Err(e) if is_transient(&e) => continue,
				Err(e) => {
					warn!("Receive failed: {}", e);
					continue;
				}
			};
			if !self.running.load(Ordering::SeqCst) {
				break;
			}
			if len == 0 {
				continue;
			}

			match Command::peek(&buf[..len]) {
				// Only meaningful to an active transfer on its own socket
				Some(Command::Ack) => continue,
				Some(_) => {}
				None => {
					warn!("Dropping unrecognized datagram ({} bytes) from {}", len, from);
					continue;
				}
			}

			let datagram = buf[..len].to_vec();
			let socket = self.socket.clone();
			let store = self.store.clone();
			let settings = self.settings.clone();
			tokio::spawn(async move {
				if let Err(e) = handle_request(&socket, &store, &settings, &datagram, from).await {
					warn!("Request from {} failed: {}", from, e);
				}
			});
		}

		debug!("Listener for {} stopped", self.store.node_id());
	}
}

async fn handle_request(
	socket: &UdpSocket,
	store: &MetadataStore,
	settings: &ProtocolSettings,
	datagram: &[u8],
	from: SocketAddr,
) -> ProtocolResult<()> {
	match Message::decode(datagram)? {
		Message::IndexReq => {
			let reply = Message::IndexRsp(store.index_payload());
			send_reply(socket, settings, &reply, from).await
		}
		Message::TombReq => {
			let reply = Message::TombRsp(store.tombstones_payload());
			send_reply(socket, settings, &reply, from).await
		}
		Message::FileReq(path) => {
			debug!("{} requested {}", from, path);
			let file = store.resolve_servable(&path);
			let transfer_socket = bind_ephemeral(from).await?;
			match serve_file(&transfer_socket, from, file, settings).await? {
				ServeOutcome::Completed { chunks } => {
					info!("Served {} to {} ({} chunks)", path, from, chunks)
				}
				ServeOutcome::Refused => info!("Refused {} to {}: not found", path, from),
			}
			Ok(())
		}
		other => {
			warn!("Unexpected {} from {}", other.command().as_str(), from);
			Ok(())
		}
	}
}

async fn send_reply(
	socket: &UdpSocket,
	settings: &ProtocolSettings,
	reply: &Message,
	to: SocketAddr,
) -> ProtocolResult<()> {
	let datagram = reply.encode()?;
	if datagram.len() > settings.max_datagram_size {
		warn!(
			"{} for {} is {} bytes, over the {} byte datagram limit",
			reply.command().as_str(),
			to,
			datagram.len(),
			settings.max_datagram_size
		);
	}
	socket.send_to(&datagram, to).await?;
	Ok(())
}

/// Handle to a running listener
pub struct ListenerHandle {
	addr: SocketAddr,
	running: Arc<AtomicBool>,
	stop_timeout: std::time::Duration,
	task: JoinHandle<()>,
}

impl ListenerHandle {
	pub fn local_addr(&self) -> SocketAddr {
		self.addr
	}

	/// Stop the receive loop and close the socket
	///
	/// The loop is blocked in a receive, so it is woken with an empty
	/// datagram sent to itself.
	pub async fn stop(mut self) {
		self.running.store(false, Ordering::SeqCst);

		let target = wake_target(self.addr);
		match bind_ephemeral(target).await {
			Ok(socket) => {
				if let Err(e) = socket.send_to(&[], target).await {
					warn!("Cannot wake listener on {}: {}", target, e);
				}
			}
			Err(e) => warn!("Cannot wake listener on {}: {}", target, e),
		}

		match tokio::time::timeout(self.stop_timeout, &mut self.task).await {
			Ok(Ok(())) => {}
			Ok(Err(e)) => warn!("Listener task failed: {}", e),
			Err(_) => {
				warn!("Listener on {} did not stop in time, aborting", self.addr);
				self.task.abort();
			}
		}
	}
}

/// Address to reach a socket bound to `addr` from this host
fn wake_target(addr: SocketAddr) -> SocketAddr {
	match addr.ip() {
		IpAddr::V4(ip) if ip.is_unspecified() => SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port()),
		IpAddr::V6(ip) if ip.is_unspecified() => SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port()),
		_ => addr,
	}
}


// vim: ts=4
