//! # peersync - Peer-to-Peer Directory Synchronizer over UDP
//!
//! Every node owns a directory, serves its file index and content to its
//! peers, and periodically pulls whatever the peers hold that is newer.
//! Deletions travel as tombstones. Conflicting edits with identical
//! timestamps are settled by node identifier, so all nodes converge on the
//! same content without coordination.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use peersync::config::NodeConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::load("node-a.json".as_ref())?;
//!     peersync::node::run(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Driving a single cycle
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use peersync::{MetadataStore, SyncEngine};
//!
//! let store = Arc::new(MetadataStore::open(&config)?);
//! let engine = SyncEngine::from_config(&config, store);
//! let report = engine.run_cycle().await;
//! println!("Downloaded {} files", report.files_downloaded);
//! ```

pub mod config;
pub mod error;
pub mod exclusion;
pub mod logging;
pub mod metadata;
pub mod node;
pub mod protocol;
pub mod sync;
pub mod util;
pub mod utils;
pub mod validation;

// Re-export commonly used types and functions
pub use config::{NodeConfig, ProtocolSettings};
pub use error::{StateError, SyncError};
pub use metadata::MetadataStore;
pub use sync::{CycleReport, SyncEngine};

// vim: ts=4
