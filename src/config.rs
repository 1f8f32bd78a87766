//! Collector configuration.
//!
//! Settings are layered, lowest priority first:
//!
//! 1. Defaults of [`CollectorConfig`].
//! 2. An optional TOML file.
//! 3. Environment variables prefixed with `SNAPSHOT_COLLECTOR__`, e.g.
//!    `SNAPSHOT_COLLECTOR__URL=http://es:9200`.

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::Error;

/// Metric name prefix used unless configured otherwise.
pub const DEFAULT_NAMESPACE: &str = "elasticsearch";

const ENV_PREFIX: &str = "SNAPSHOT_COLLECTOR";

/// Settings of a [`SnapshotCollector`](crate::SnapshotCollector).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    /// Base URL of the cluster.
    pub url: Url,
    /// Prefix of every metric name. Empty to not prefix at all.
    pub namespace: String,
    /// Number of repositories fetched at once.
    pub detail_concurrency: NonZeroUsize,
    /// Per request timeout, in seconds.
    pub timeout: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:9200").expect("valid default URL"),
            namespace: DEFAULT_NAMESPACE.to_string(),
            detail_concurrency: NonZeroUsize::MIN,
            timeout: 5,
        }
    }
}

impl CollectorConfig {
    /// Load the configuration from defaults, the TOML file at `path` if it
    /// exists, and the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::load_with_env_prefix(path.as_ref(), ENV_PREFIX)
    }

    fn load_with_env_prefix(path: &Path, env_prefix: &str) -> Result<Self, Error> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(env_prefix).separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Per request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
