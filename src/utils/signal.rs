//! Signal handling for graceful termination

use std::io;
use tracing::debug;

/// Wait until the process is asked to terminate (SIGINT or SIGTERM)
#[cfg(unix)]
pub async fn wait_for_shutdown() -> io::Result<()> {
	use tokio::signal::unix::{signal, SignalKind};

	let mut sigterm = signal(SignalKind::terminate())?;
	let mut sigint = signal(SignalKind::interrupt())?;

	tokio::select! {
		_ = sigterm.recv() => debug!("Received SIGTERM"),
		_ = sigint.recv() => debug!("Received SIGINT"),
	}
	Ok(())
}

/// Wait until the process is asked to terminate (Ctrl-C)
#[cfg(not(unix))]
pub async fn wait_for_shutdown() -> io::Result<()> {
	tokio::signal::ctrl_c().await?;
	debug!("Received Ctrl-C");
	Ok(())
}

// vim: ts=4
