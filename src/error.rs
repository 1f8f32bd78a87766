//! Error types.

use thiserror::Error;
use url::Url;

/// Boxed error as returned by a [`Transport`](crate::fetch::Transport).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a single fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response, e.g. connection refused, DNS
    /// failure or timeout.
    #[error("failed to get from {url}: {source}")]
    Transport {
        /// Requested URL.
        url: Url,
        /// Underlying transport error.
        #[source]
        source: BoxError,
    },

    /// The cluster answered with anything but `200 OK`.
    #[error("HTTP request to {url} failed with code {status}")]
    UnexpectedStatus {
        /// Requested URL.
        url: Url,
        /// Response status code.
        status: u16,
    },

    /// The response body is not valid JSON or does not match the expected
    /// shape.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// Requested URL.
        url: Url,
        /// Underlying decoding error.
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// The URL the failed request was sent to.
    pub fn url(&self) -> &Url {
        match self {
            FetchError::Transport { url, .. }
            | FetchError::UnexpectedStatus { url, .. }
            | FetchError::Decode { url, .. } => url,
        }
    }
}

/// Failure to set up a collector.
#[derive(Debug, Error)]
pub enum Error {
    /// The base URL can not carry path segments, e.g. `mailto:` URLs.
    #[error("invalid base URL {0}: cannot be used as a base")]
    InvalidBaseUrl(Url),

    /// Loading or validating the configuration failed.
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
