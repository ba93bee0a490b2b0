//! Metadata handling and reconciliation
//!
//! Each node records the fingerprint of every file it holds and a tombstone
//! for every file it knows to be deleted. Remote reports are reconciled
//! against that record with the rules in [`reconciliation`].

pub mod document;
pub mod reconciliation;
pub mod scanner;
mod store;

pub use reconciliation::{Reason, Verdict};
pub use scanner::{DirectoryScanner, WalkScanner};
pub use store::{Metadata, MetadataStore, ScanSummary};

// vim: ts=4
