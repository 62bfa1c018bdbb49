//! # arbor-node — Concurrency shell around the fork tree.
//!
//! - [`node::Node`] — the [`Blockchain`](arbor_core::Blockchain) behind a
//!   read-write lock, plus a single-writer ingest task
//! - [`config::NodeConfig`] — layered node configuration

pub mod config;
pub mod node;

pub use config::{LogFormat, NodeConfig};
pub use node::{IngestHandle, IngestSummary, Node};
