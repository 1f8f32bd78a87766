//! Metric descriptors and the registry holding them.
//!
//! See [`DescriptorRegistry`] for details.

use prometheus_client::metrics::MetricType;

use crate::model::{RepositoryStats, SnapshotRecord};

/// Subsystem all snapshot metrics are grouped under.
const SUBSYSTEM: &str = "snapshot_stats";

const SNAPSHOT_LABELS: &[&str] = &["repository", "state", "version"];
const REPOSITORY_LABELS: &[&str] = &["repository"];

/// Value kind of a metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonically increasing value.
    Counter,
    /// Value that can go up and down.
    Gauge,
}

impl MetricKind {
    /// The corresponding OpenMetrics type.
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricKind::Counter => MetricType::Counter,
            MetricKind::Gauge => MetricType::Gauge,
        }
    }
}

/// Static metadata of a metric: everything a scraper needs to know before
/// any value exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    name: String,
    help: &'static str,
    kind: MetricKind,
    label_names: &'static [&'static str],
}

impl Descriptor {
    /// Create a [`Descriptor`] named `name`, used as is.
    pub fn new(
        name: impl Into<String>,
        help: &'static str,
        kind: MetricKind,
        label_names: &'static [&'static str],
    ) -> Self {
        Self {
            name: name.into(),
            help,
            kind,
            label_names,
        }
    }

    /// Fully qualified metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Help text.
    pub fn help(&self) -> &str {
        self.help
    }

    /// Value kind.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Names of the labels, in the order label values are produced.
    pub fn label_names(&self) -> &[&'static str] {
        self.label_names
    }
}

/// A [`Descriptor`] together with the pure functions deriving a value and
/// label values from an `S`.
pub struct MetricDescriptor<S> {
    descriptor: Descriptor,
    value: fn(&S) -> f64,
    labels: fn(&str, &S) -> Vec<String>,
}

/// Descriptor applied to the most recent snapshot of a repository.
pub type SnapshotMetric = MetricDescriptor<SnapshotRecord>;

/// Descriptor applied to all snapshots of a repository.
pub type RepositoryMetric = MetricDescriptor<RepositoryStats>;

impl<S> MetricDescriptor<S> {
    fn gauge(
        namespace: &str,
        name: &str,
        help: &'static str,
        label_names: &'static [&'static str],
        value: fn(&S) -> f64,
        labels: fn(&str, &S) -> Vec<String>,
    ) -> Self {
        Self {
            descriptor: Descriptor::new(
                fq_name(namespace, SUBSYSTEM, name),
                help,
                MetricKind::Gauge,
                label_names,
            ),
            value,
            labels,
        }
    }

    /// Static metadata.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Value of the metric for `source`.
    pub fn value(&self, source: &S) -> f64 {
        (self.value)(source)
    }

    /// Label values for `source` found in `repository`, ordered as
    /// [`Descriptor::label_names`].
    pub fn label_values(&self, repository: &str, source: &S) -> Vec<String> {
        (self.labels)(repository, source)
    }
}

impl<S> std::fmt::Debug for MetricDescriptor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricDescriptor")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// The immutable, ordered set of snapshot metrics.
///
/// Built once and only read afterwards. Iteration order is stable: snapshot
/// level metrics first, repository level metrics second.
///
/// ```
/// # use elasticsearch_snapshot_collector::descriptor::DescriptorRegistry;
/// let registry = DescriptorRegistry::new("elasticsearch");
///
/// assert_eq!(
///     Some("elasticsearch_snapshot_stats_snapshot_number_of_indices"),
///     registry.descriptors().next().map(|d| d.name()),
/// );
/// ```
#[derive(Debug)]
pub struct DescriptorRegistry {
    snapshot_metrics: Vec<SnapshotMetric>,
    repository_metrics: Vec<RepositoryMetric>,
}

impl DescriptorRegistry {
    /// Build all descriptors, prefixing their names with `namespace`.
    pub fn new(namespace: &str) -> Self {
        let snapshot_metrics = vec![
            SnapshotMetric::gauge(
                namespace,
                "snapshot_number_of_indices",
                "Number of indices in the last snapshot",
                SNAPSHOT_LABELS,
                |s| s.indices.len() as f64,
                snapshot_label_values,
            ),
            SnapshotMetric::gauge(
                namespace,
                "snapshot_start_time_timestamp",
                "Last snapshot start timestamp",
                SNAPSHOT_LABELS,
                |s| s.start_time_seconds() as f64,
                snapshot_label_values,
            ),
            SnapshotMetric::gauge(
                namespace,
                "snapshot_end_time_timestamp",
                "Last snapshot end timestamp",
                SNAPSHOT_LABELS,
                |s| s.end_time_seconds() as f64,
                snapshot_label_values,
            ),
            SnapshotMetric::gauge(
                namespace,
                "snapshot_number_of_failures",
                "Last snapshot number of failures",
                SNAPSHOT_LABELS,
                |s| s.failures.len() as f64,
                snapshot_label_values,
            ),
            SnapshotMetric::gauge(
                namespace,
                "snapshot_total_shards",
                "Last snapshot total shards",
                SNAPSHOT_LABELS,
                |s| s.shards.total as f64,
                snapshot_label_values,
            ),
            SnapshotMetric::gauge(
                namespace,
                "snapshot_failed_shards",
                "Last snapshot failed shards",
                SNAPSHOT_LABELS,
                |s| s.shards.failed as f64,
                snapshot_label_values,
            ),
            SnapshotMetric::gauge(
                namespace,
                "snapshot_successful_shards",
                "Last snapshot successful shards",
                SNAPSHOT_LABELS,
                |s| s.shards.successful as f64,
                snapshot_label_values,
            ),
        ];

        let repository_metrics = vec![
            RepositoryMetric::gauge(
                namespace,
                "number_of_snapshots",
                "Number of snapshots in a repository",
                REPOSITORY_LABELS,
                |r| r.snapshots.len() as f64,
                repository_label_values,
            ),
            RepositoryMetric::gauge(
                namespace,
                "oldest_snapshot_timestamp",
                "Timestamp of the oldest snapshot",
                REPOSITORY_LABELS,
                oldest_snapshot_timestamp,
                repository_label_values,
            ),
            RepositoryMetric::gauge(
                namespace,
                "latest_snapshot_timestamp_seconds",
                "Timestamp of the latest SUCCESS or PARTIAL snapshot",
                REPOSITORY_LABELS,
                latest_restorable_snapshot_timestamp,
                repository_label_values,
            ),
        ];

        Self {
            snapshot_metrics,
            repository_metrics,
        }
    }

    /// Metrics derived from the most recent snapshot of a repository.
    pub fn snapshot_metrics(&self) -> &[SnapshotMetric] {
        &self.snapshot_metrics
    }

    /// Metrics derived from all snapshots of a repository.
    pub fn repository_metrics(&self) -> &[RepositoryMetric] {
        &self.repository_metrics
    }

    /// Metadata of every metric. Does not touch the network.
    pub fn descriptors(&self) -> impl Iterator<Item = &Descriptor> {
        self.snapshot_metrics
            .iter()
            .map(MetricDescriptor::descriptor)
            .chain(
                self.repository_metrics
                    .iter()
                    .map(MetricDescriptor::descriptor),
            )
    }
}

impl Default for DescriptorRegistry {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_NAMESPACE)
    }
}

/// Joins the non-empty name components with `_`.
fn fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

fn snapshot_label_values(repository: &str, snapshot: &SnapshotRecord) -> Vec<String> {
    vec![
        repository.to_owned(),
        snapshot.state.to_string(),
        snapshot.version.clone(),
    ]
}

fn repository_label_values(repository: &str, _: &RepositoryStats) -> Vec<String> {
    vec![repository.to_owned()]
}

/// Start of the first, i.e. oldest, snapshot in seconds. 0 without snapshots.
fn oldest_snapshot_timestamp(stats: &RepositoryStats) -> f64 {
    stats
        .snapshots
        .first()
        .map_or(0.0, |s| s.start_time_seconds() as f64)
}

/// Start of the most recent `SUCCESS` or `PARTIAL` snapshot in seconds.
///
/// 0 when there is no such snapshot, which is indistinguishable from a
/// snapshot started at the epoch.
fn latest_restorable_snapshot_timestamp(stats: &RepositoryStats) -> f64 {
    stats
        .snapshots
        .iter()
        .rev()
        .find(|s| s.state.is_restorable())
        .map_or(0.0, |s| s.start_time_seconds() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ShardSummary, SnapshotState};
    use quickcheck::QuickCheck;

    fn snapshot(state: &str, start_time_in_millis: i64) -> SnapshotRecord {
        SnapshotRecord {
            state: state.into(),
            start_time_in_millis,
            ..Default::default()
        }
    }

    fn value_of<'a, S>(metrics: &'a [MetricDescriptor<S>], name: &str) -> &'a MetricDescriptor<S> {
        metrics
            .iter()
            .find(|m| m.descriptor().name() == format!("elasticsearch_snapshot_stats_{name}"))
            .unwrap()
    }

    #[test]
    fn names_and_labels() {
        let registry = DescriptorRegistry::new("elasticsearch");

        assert_eq!(7, registry.snapshot_metrics().len());
        assert_eq!(3, registry.repository_metrics().len());

        for metric in registry.snapshot_metrics() {
            assert_eq!(
                &["repository", "state", "version"],
                metric.descriptor().label_names()
            );
            assert_eq!(MetricKind::Gauge, metric.descriptor().kind());
        }
        for metric in registry.repository_metrics() {
            assert_eq!(&["repository"], metric.descriptor().label_names());
        }

        let names = registry.descriptors().map(Descriptor::name).collect::<Vec<_>>();
        assert_eq!(
            vec![
                "elasticsearch_snapshot_stats_snapshot_number_of_indices",
                "elasticsearch_snapshot_stats_snapshot_start_time_timestamp",
                "elasticsearch_snapshot_stats_snapshot_end_time_timestamp",
                "elasticsearch_snapshot_stats_snapshot_number_of_failures",
                "elasticsearch_snapshot_stats_snapshot_total_shards",
                "elasticsearch_snapshot_stats_snapshot_failed_shards",
                "elasticsearch_snapshot_stats_snapshot_successful_shards",
                "elasticsearch_snapshot_stats_number_of_snapshots",
                "elasticsearch_snapshot_stats_oldest_snapshot_timestamp",
                "elasticsearch_snapshot_stats_latest_snapshot_timestamp_seconds",
            ],
            names
        );
    }

    #[test]
    fn empty_namespace_is_skipped() {
        let registry = DescriptorRegistry::new("");
        assert_eq!(
            Some("snapshot_stats_snapshot_number_of_indices"),
            registry.descriptors().next().map(Descriptor::name)
        );
    }

    #[test]
    fn descriptors_are_stable() {
        let registry = DescriptorRegistry::default();
        let first = registry.descriptors().cloned().collect::<Vec<_>>();
        let second = registry.descriptors().cloned().collect::<Vec<_>>();
        assert_eq!(first, second);
    }

    #[test]
    fn snapshot_values() {
        let registry = DescriptorRegistry::new("elasticsearch");
        let metrics = registry.snapshot_metrics();
        let record = SnapshotRecord {
            version: "8.10.0".to_string(),
            indices: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            state: SnapshotState::Partial,
            start_time_in_millis: 1_700_000_000_999,
            end_time_in_millis: 1_700_000_060_500,
            failures: vec![Default::default()],
            shards: ShardSummary {
                total: 10,
                failed: 1,
                successful: 9,
            },
            ..Default::default()
        };

        let value = |name| value_of(metrics, name).value(&record);
        assert_eq!(3.0, value("snapshot_number_of_indices"));
        assert_eq!(1_700_000_000.0, value("snapshot_start_time_timestamp"));
        assert_eq!(1_700_000_060.0, value("snapshot_end_time_timestamp"));
        assert_eq!(1.0, value("snapshot_number_of_failures"));
        assert_eq!(10.0, value("snapshot_total_shards"));
        assert_eq!(1.0, value("snapshot_failed_shards"));
        assert_eq!(9.0, value("snapshot_successful_shards"));

        assert_eq!(
            vec!["backups", "PARTIAL", "8.10.0"],
            metrics[0].label_values("backups", &record)
        );
    }

    #[test]
    fn inconsistent_shard_counts_are_passed_through() {
        let registry = DescriptorRegistry::new("elasticsearch");
        let record = SnapshotRecord {
            shards: ShardSummary {
                total: 1,
                failed: 5,
                successful: 5,
            },
            ..Default::default()
        };

        let metrics = registry.snapshot_metrics();
        assert_eq!(1.0, value_of(metrics, "snapshot_total_shards").value(&record));
        assert_eq!(5.0, value_of(metrics, "snapshot_failed_shards").value(&record));
    }

    #[test]
    fn repository_values() {
        let registry = DescriptorRegistry::new("elasticsearch");
        let metrics = registry.repository_metrics();
        let stats = RepositoryStats {
            snapshots: vec![
                snapshot("FAILED", 100_000),
                snapshot("SUCCESS", 200_000),
                snapshot("FAILED", 300_000),
            ],
        };

        let value = |name| value_of(metrics, name).value(&stats);
        assert_eq!(3.0, value("number_of_snapshots"));
        assert_eq!(100.0, value("oldest_snapshot_timestamp"));
        assert_eq!(200.0, value("latest_snapshot_timestamp_seconds"));
        assert_eq!(vec!["backups"], metrics[0].label_values("backups", &stats));
    }

    #[test]
    fn repository_values_without_snapshots() {
        let registry = DescriptorRegistry::new("elasticsearch");
        let stats = RepositoryStats::default();

        for metric in registry.repository_metrics() {
            assert_eq!(0.0, metric.value(&stats));
        }
    }

    #[test]
    fn latest_restorable_without_match_is_zero() {
        let stats = RepositoryStats {
            snapshots: vec![snapshot("FAILED", 100_000), snapshot("IN_PROGRESS", 200_000)],
        };
        assert_eq!(0.0, latest_restorable_snapshot_timestamp(&stats));

        let stats = RepositoryStats {
            snapshots: vec![snapshot("SUCCESS", 100_000), snapshot("PARTIAL", 250_000)],
        };
        assert_eq!(250.0, latest_restorable_snapshot_timestamp(&stats));
    }

    #[test]
    fn timestamps_truncate_to_seconds() {
        let stats = RepositoryStats {
            snapshots: vec![snapshot("SUCCESS", 1_999)],
        };
        assert_eq!(1.0, oldest_snapshot_timestamp(&stats));
        assert_eq!(1.0, latest_restorable_snapshot_timestamp(&stats));
    }

    #[test]
    fn latest_restorable_matches_last_restorable() {
        fn prop(snapshots: Vec<(bool, u32)>) -> bool {
            let stats = RepositoryStats {
                snapshots: snapshots
                    .iter()
                    .map(|(ok, start)| {
                        snapshot(if *ok { "SUCCESS" } else { "FAILED" }, i64::from(*start))
                    })
                    .collect(),
            };
            let expected = snapshots
                .iter()
                .filter(|(ok, _)| *ok)
                .last()
                .map_or(0, |(_, start)| i64::from(*start) / 1000);

            latest_restorable_snapshot_timestamp(&stats) == expected as f64
        }

        QuickCheck::new().tests(100).quickcheck(prop as fn(_) -> bool);
    }

    #[test]
    fn oldest_is_first() {
        fn prop(starts: Vec<u32>) -> bool {
            let stats = RepositoryStats {
                snapshots: starts
                    .iter()
                    .map(|start| snapshot("SUCCESS", i64::from(*start)))
                    .collect(),
            };
            let expected = starts.first().map_or(0, |s| i64::from(*s) / 1000);

            oldest_snapshot_timestamp(&stats) == expected as f64
        }

        QuickCheck::new().tests(100).quickcheck(prop as fn(_) -> bool);
    }
}
