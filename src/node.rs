//! Running a node: listener plus sync engine until shutdown

use std::sync::Arc;

use crate::config::NodeConfig;
use crate::error::SyncError;
use crate::logging::*;
use crate::metadata::MetadataStore;
use crate::protocol::Listener;
use crate::sync::SyncEngine;
use crate::utils::wait_for_shutdown;

/// Serve and sync the configured directory until SIGINT/SIGTERM
pub async fn run(config: NodeConfig) -> Result<(), SyncError> {
	let store = Arc::new(MetadataStore::open(&config)?);
	let removed = store.cleanup_temp_files();
	if removed > 0 {
		info!("Removed {} leftover download temp files", removed);
	}

	let listener = Listener::bind(config.bind_addr()?, store.clone(), config.protocol.clone()).await?;
	let handle = listener.spawn()?;
	info!(
		"Node {} serving {} on {}",
		config.node_id(),
		config.directory.display(),
		handle.local_addr()
	);

	let engine = SyncEngine::from_config(&config, store);
	if engine.peers().is_empty() {
		warn!("No peers configured; only serving");
	}

	let sync = async {
		// Give peers started together with us a chance to bind
		tokio::time::sleep(config.startup_delay()).await;
		engine.run().await
	};
	tokio::select! {
		_ = sync => {}
		res = wait_for_shutdown() => {
			if let Err(e) = res {
				error!("Cannot wait for termination signals: {}", e);
			}
		}
	}

	info!("Shutting down");
	handle.stop().await;
	Ok(())
}

/// Scan once and return the resulting index
pub fn index(config: &NodeConfig) -> Result<crate::protocol::IndexPayload, SyncError> {
	let store = MetadataStore::open(config)?;
	store.scan()?;
	Ok(store.index_payload())
}

// vim: ts=4
