//! Wire types of the cluster's `_snapshot` API.
//!
//! Decoding is lenient in the same way for every type: unknown fields are
//! ignored, missing fields and `null` fall back to their zero value. Shard
//! failures are only counted, so an entry of any shape is accepted.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Response of `GET /_snapshot`: repository name to repository metadata.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RepositoryCatalog(BTreeMap<String, RepositoryMetadata>);

impl RepositoryCatalog {
    /// Names of all repositories known to the cluster.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of repositories in the catalog.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the cluster has no repository registered.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Registration metadata of a single snapshot repository.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RepositoryMetadata {
    /// Storage backend, e.g. `fs` or `s3`.
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    /// Backend specific settings, kept opaque.
    #[serde(deserialize_with = "null_as_default")]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

/// Response of `GET /_snapshot/{repository}/_all`.
///
/// Snapshots are kept in the order the cluster returns them, which is
/// chronological with the oldest snapshot first.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RepositoryStats {
    /// All snapshots of the repository, oldest first.
    #[serde(deserialize_with = "null_as_default")]
    pub snapshots: Vec<SnapshotRecord>,
}

impl RepositoryStats {
    /// The most recent snapshot, whatever its state.
    pub fn last(&self) -> Option<&SnapshotRecord> {
        self.snapshots.last()
    }
}

/// Observed state of one snapshot.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SnapshotRecord {
    /// Snapshot name.
    #[serde(deserialize_with = "null_as_default")]
    pub snapshot: String,
    /// Cluster assigned snapshot UUID.
    #[serde(deserialize_with = "null_as_default")]
    pub uuid: String,
    /// Numeric version of the node that took the snapshot.
    #[serde(deserialize_with = "null_as_default")]
    pub version_id: u64,
    /// Human readable version of the node that took the snapshot.
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
    /// Names of the indices included in the snapshot.
    #[serde(deserialize_with = "null_items_as_default")]
    pub indices: Vec<String>,
    /// Lifecycle state.
    #[serde(deserialize_with = "null_as_default")]
    pub state: SnapshotState,
    /// Start time, milliseconds since the Unix epoch.
    #[serde(deserialize_with = "null_as_default")]
    pub start_time_in_millis: i64,
    /// End time, milliseconds since the Unix epoch.
    #[serde(deserialize_with = "null_as_default")]
    pub end_time_in_millis: i64,
    /// Duration, in milliseconds.
    #[serde(deserialize_with = "null_as_default")]
    pub duration_in_millis: i64,
    /// Per shard failures.
    #[serde(deserialize_with = "any_items_as_default")]
    pub failures: Vec<SnapshotFailure>,
    /// Shard count summary.
    #[serde(deserialize_with = "null_as_default")]
    pub shards: ShardSummary,
}

impl SnapshotRecord {
    /// Start time in whole seconds since the Unix epoch, truncated.
    pub fn start_time_seconds(&self) -> i64 {
        self.start_time_in_millis / 1000
    }

    /// End time in whole seconds since the Unix epoch, truncated.
    pub fn end_time_seconds(&self) -> i64 {
        self.end_time_in_millis / 1000
    }
}

/// Shard count summary of a snapshot.
///
/// `successful + failed <= total` is what the cluster reports, but nothing
/// here relies on it.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShardSummary {
    /// Shards included in the snapshot.
    #[serde(deserialize_with = "null_as_default")]
    pub total: u64,
    /// Shards that failed to snapshot.
    #[serde(deserialize_with = "null_as_default")]
    pub failed: u64,
    /// Shards snapshotted successfully.
    #[serde(deserialize_with = "null_as_default")]
    pub successful: u64,
}

/// A single shard failure reported for a snapshot.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SnapshotFailure {
    /// Index the shard belongs to.
    #[serde(deserialize_with = "null_as_default")]
    pub index: String,
    /// Shard number.
    #[serde(deserialize_with = "null_as_default")]
    pub shard_id: u64,
    /// Failure reason as reported by the node.
    #[serde(deserialize_with = "null_as_default")]
    pub reason: String,
    /// Node the shard lived on, if known.
    pub node_id: Option<String>,
    /// Failure status, e.g. `INTERNAL_SERVER_ERROR`.
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
}

/// Lifecycle state of a snapshot.
///
/// The set of states is open: anything the cluster reports that is not known
/// here is kept verbatim in [`SnapshotState::Other`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum SnapshotState {
    /// `SUCCESS`
    Success,
    /// `PARTIAL`
    Partial,
    /// `FAILED`
    Failed,
    /// `IN_PROGRESS`
    InProgress,
    /// `INCOMPATIBLE`
    Incompatible,
    /// Any other state.
    Other(String),
}

impl SnapshotState {
    /// The state as reported by the cluster.
    pub fn as_str(&self) -> &str {
        match self {
            SnapshotState::Success => "SUCCESS",
            SnapshotState::Partial => "PARTIAL",
            SnapshotState::Failed => "FAILED",
            SnapshotState::InProgress => "IN_PROGRESS",
            SnapshotState::Incompatible => "INCOMPATIBLE",
            SnapshotState::Other(s) => s,
        }
    }

    /// Whether the snapshot can be restored from, i.e. `SUCCESS` or `PARTIAL`.
    pub fn is_restorable(&self) -> bool {
        matches!(self, SnapshotState::Success | SnapshotState::Partial)
    }
}

impl Default for SnapshotState {
    fn default() -> Self {
        SnapshotState::Other(String::new())
    }
}

impl From<String> for SnapshotState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "SUCCESS" => SnapshotState::Success,
            "PARTIAL" => SnapshotState::Partial,
            "FAILED" => SnapshotState::Failed,
            "IN_PROGRESS" => SnapshotState::InProgress,
            "INCOMPATIBLE" => SnapshotState::Incompatible,
            _ => SnapshotState::Other(s),
        }
    }
}

impl From<&str> for SnapshotState {
    fn from(s: &str) -> Self {
        s.to_owned().into()
    }
}

impl std::fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deserializes `null` as `T::default()`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Like [`null_as_default`], for the sequence and each of its items.
fn null_items_as_default<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let items = Option::<Vec<Option<T>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(items.into_iter().map(Option::unwrap_or_default).collect())
}

/// Accepts a sequence of anything. Items not matching `T` become
/// `T::default()`, keeping the number of items intact.
fn any_items_as_default<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let items = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(items
        .into_iter()
        .map(|item| serde_json::from_value(item).unwrap_or_default())
        .collect())
}
