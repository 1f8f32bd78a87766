//! Snapshot collector implementation.
//!
//! See [`SnapshotCollector`] for details.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric};
use prometheus_client::metrics::counter::ConstCounter;
use prometheus_client::metrics::gauge::ConstGauge;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::CollectorConfig;
use crate::descriptor::{Descriptor, DescriptorRegistry, MetricKind};
use crate::error::{Error, FetchError};
use crate::fetch::{Fetcher, HttpTransport, Transport};
use crate::model::{RepositoryCatalog, RepositoryStats};

/// One observation of a [`Descriptor`] during a scrape.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample<'a> {
    /// The metric observed.
    pub descriptor: &'a Descriptor,
    /// Observed value.
    pub value: f64,
    /// Label values, ordered as [`Descriptor::label_names`].
    pub label_values: Vec<String>,
}

impl Sample<'_> {
    /// Label names paired with their values.
    pub fn labels(&self) -> Vec<(String, String)> {
        self.descriptor
            .label_names()
            .iter()
            .map(|name| name.to_string())
            .zip(self.label_values.iter().cloned())
            .collect()
    }
}

/// A repository left out of a scrape because its details could not be
/// fetched.
#[derive(Debug)]
pub struct RepositoryFailure {
    /// Name of the repository.
    pub repository: String,
    /// Why fetching failed.
    pub error: FetchError,
}

/// Outcome of a scrape that got past listing the repositories.
#[derive(Debug, Default)]
pub struct Scrape<'a> {
    /// Samples of all repositories whose details were fetched.
    pub samples: Vec<Sample<'a>>,
    /// Repositories skipped in this scrape.
    pub failures: Vec<RepositoryFailure>,
}

/// Collects snapshot statistics of every repository of a cluster.
///
/// Each scrape lists the repositories via `GET {base}/_snapshot`, then
/// fetches `GET {base}/_snapshot/{repository}/_all` per repository. If
/// listing fails the scrape yields nothing. If a single repository fails it
/// is left out while all other repositories are still reported.
///
/// Register it with a [`Registry`](prometheus_client::registry::Registry) to
/// expose the metrics:
///
/// ```no_run
/// # use elasticsearch_snapshot_collector::SnapshotCollector;
/// # use prometheus_client::encoding::text::encode;
/// # use prometheus_client::registry::Registry;
/// let collector = SnapshotCollector::new("http://localhost:9200".parse()?)?;
///
/// let mut registry = Registry::default();
/// registry.register_collector(Box::new(collector));
///
/// let mut buffer = String::new();
/// encode(&mut buffer, &registry)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct SnapshotCollector<T = HttpTransport> {
    fetcher: Fetcher<T>,
    base: Url,
    registry: DescriptorRegistry,
    detail_concurrency: NonZeroUsize,
}

impl SnapshotCollector {
    /// Create a collector for the cluster at `base` using a default HTTP
    /// client.
    pub fn new(base: Url) -> Result<Self, Error> {
        Self::with_transport(base, HttpTransport::default())
    }

    /// Create a collector from a loaded configuration.
    pub fn from_config(config: &CollectorConfig) -> Result<Self, Error> {
        let transport = HttpTransport::with_timeout(config.timeout())?;
        Ok(Self::with_transport(config.url.clone(), transport)?
            .with_namespace(&config.namespace)
            .with_detail_concurrency(config.detail_concurrency))
    }
}

impl<T: Transport> SnapshotCollector<T> {
    /// Create a collector for the cluster at `base` using `transport`.
    ///
    /// Fails if `base` can not carry a path, e.g. `data:` URLs.
    pub fn with_transport(base: Url, transport: T) -> Result<Self, Error> {
        if base.cannot_be_a_base() {
            return Err(Error::InvalidBaseUrl(base));
        }

        Ok(Self {
            fetcher: Fetcher::new(transport),
            base,
            registry: DescriptorRegistry::default(),
            detail_concurrency: NonZeroUsize::MIN,
        })
    }

    /// Prefix metric names with `namespace` instead of `elasticsearch`.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.registry = DescriptorRegistry::new(namespace);
        self
    }

    /// Fetch up to `concurrency` repositories at once. Defaults to one, i.e.
    /// repositories are fetched one after another.
    pub fn with_detail_concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.detail_concurrency = concurrency;
        self
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        self.fetcher.transport()
    }

    /// Metadata of every metric this collector may emit.
    ///
    /// Independent of the cluster's state, never performs a request.
    pub fn advertise(&self) -> impl Iterator<Item = &Descriptor> {
        self.registry.descriptors()
    }

    /// Run a single scrape.
    ///
    /// Returns an error, after logging it, only if the repositories could not
    /// be listed. Failures of single repositories are logged and returned as
    /// part of the [`Scrape`].
    pub fn collect(&self) -> Result<Scrape<'_>, FetchError> {
        let catalog = self.fetch_catalog().inspect_err(|err| {
            error!(url = %err.url(), error = %err, "failed to fetch and decode snapshot stats");
        })?;

        let mut scrape = Scrape::default();
        for (repository, result) in self.fetch_details(&catalog) {
            match result {
                Ok(stats) => self.emit(&repository, &stats, &mut scrape.samples),
                Err(error) => {
                    warn!(%repository, %error, "skipping snapshot repository");
                    scrape.failures.push(RepositoryFailure { repository, error });
                }
            }
        }

        debug!(
            repositories = catalog.len(),
            failed = scrape.failures.len(),
            samples = scrape.samples.len(),
            "collected snapshot stats"
        );
        Ok(scrape)
    }

    fn fetch_catalog(&self) -> Result<RepositoryCatalog, FetchError> {
        self.fetcher.fetch(&self.url(&["_snapshot"]))
    }

    fn fetch_repository(&self, repository: &str) -> Result<RepositoryStats, FetchError> {
        self.fetcher.fetch(&self.url(&["_snapshot", repository, "_all"]))
    }

    /// Fetch the details of every repository in `catalog`.
    ///
    /// With a concurrency above one, a pool of scoped workers pulls
    /// repositories off a shared cursor and sends results back over a
    /// channel. Results are in no particular order.
    fn fetch_details(
        &self,
        catalog: &RepositoryCatalog,
    ) -> Vec<(String, Result<RepositoryStats, FetchError>)> {
        let names = catalog.names().collect::<Vec<_>>();
        let workers = self.detail_concurrency.get().min(names.len());

        if workers <= 1 {
            return names
                .into_iter()
                .map(|name| (name.to_owned(), self.fetch_repository(name)))
                .collect();
        }

        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();
        std::thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let (next, names) = (&next, &names);
                scope.spawn(move || {
                    while let Some(name) = names.get(next.fetch_add(1, Ordering::Relaxed)) {
                        let result = self.fetch_repository(name);
                        if tx.send((name.to_string(), result)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(tx);

        rx.into_iter().collect()
    }

    /// Apply every descriptor to the stats of `repository`.
    fn emit<'a>(
        &'a self,
        repository: &str,
        stats: &RepositoryStats,
        samples: &mut Vec<Sample<'a>>,
    ) {
        for metric in self.registry.repository_metrics() {
            samples.push(Sample {
                descriptor: metric.descriptor(),
                value: metric.value(stats),
                label_values: metric.label_values(repository, stats),
            });
        }

        let Some(last) = stats.last() else {
            return;
        };
        for metric in self.registry.snapshot_metrics() {
            samples.push(Sample {
                descriptor: metric.descriptor(),
                value: metric.value(last),
                label_values: metric.label_values(repository, last),
            });
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Checked in the constructor.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl<T: Transport> Collector for SnapshotCollector<T> {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), std::fmt::Error> {
        let Ok(scrape) = self.collect() else {
            return Ok(());
        };

        encode_samples(&mut encoder, self.advertise(), &scrape.samples)
    }
}

/// Encode `samples` grouped by descriptor, in the order of `descriptors`.
///
/// Descriptors without any sample are skipped.
fn encode_samples<'a>(
    encoder: &mut DescriptorEncoder,
    descriptors: impl IntoIterator<Item = &'a Descriptor>,
    samples: &[Sample<'a>],
) -> Result<(), std::fmt::Error> {
    for descriptor in descriptors {
        let mut samples = samples
            .iter()
            .filter(|s| std::ptr::eq(s.descriptor, descriptor))
            .peekable();
        if samples.peek().is_none() {
            continue;
        }

        let mut metric_encoder = encoder.encode_descriptor(
            descriptor.name(),
            descriptor.help(),
            None,
            descriptor.kind().metric_type(),
        )?;
        for sample in samples {
            let labels = sample.labels();
            let family_encoder = metric_encoder.encode_family(&labels)?;
            match descriptor.kind() {
                MetricKind::Gauge => ConstGauge::new(sample.value).encode(family_encoder)?,
                MetricKind::Counter => ConstCounter::new(sample.value).encode(family_encoder)?,
            }
        }
    }

    Ok(())
}
