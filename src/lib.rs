#![deny(dead_code)]
#![deny(missing_docs)]
#![deny(unused)]
#![forbid(unsafe_code)]
#![warn(missing_debug_implementations)]

//! Open Metrics collector for the snapshot repositories of an
//! [Elasticsearch](https://www.elastic.co/elasticsearch) cluster.
//!
//! On every scrape the [`SnapshotCollector`] lists the cluster's snapshot
//! repositories, fetches the snapshots of each of them and turns them into
//! gauges:
//!
//! * per repository: number of snapshots, start of the oldest snapshot and
//!   start of the latest `SUCCESS` or `PARTIAL` snapshot;
//! * for the most recent snapshot of each repository, labeled with its state
//!   and version: number of indices, start and end time, number of failures
//!   and shard counts.
//!
//! A repository whose snapshots can not be fetched is left out of the scrape
//! without affecting the others.
//!
//! # Examples
//!
//! ```no_run
//! use elasticsearch_snapshot_collector::{CollectorConfig, SnapshotCollector};
//! use prometheus_client::encoding::text::encode;
//! use prometheus_client::registry::Registry;
//!
//! let config = CollectorConfig::load("snapshot-collector.toml")?;
//! let collector = SnapshotCollector::from_config(&config)?;
//!
//! // Metadata is available without talking to the cluster.
//! for descriptor in collector.advertise() {
//!     println!("{}: {}", descriptor.name(), descriptor.help());
//! }
//!
//! let mut registry = Registry::default();
//! registry.register_collector(Box::new(collector));
//!
//! let mut buffer = String::new();
//! encode(&mut buffer, &registry)?;
//! println!("{buffer}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! See `demos/axum.rs` for a complete exporter serving `/metrics`.

pub mod collector;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod model;

pub use crate::collector::{Sample, Scrape, SnapshotCollector};
pub use crate::config::CollectorConfig;
pub use crate::error::{Error, FetchError};
