//! Fetching and decoding JSON documents from the cluster.
//!
//! See [`Fetcher`] for details.

use std::io::Read;
use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{BoxError, Error, FetchError};

/// A response as handed out by a [`Transport`].
///
/// The connection backing `body` is released once the response is dropped.
pub struct HttpResponse {
    /// Response status code.
    pub status: u16,
    /// Response body stream.
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Issues blocking `GET` requests.
///
/// Authentication, TLS and retries are the implementor's business.
pub trait Transport: std::fmt::Debug + Send + Sync + 'static {
    /// Send a `GET` request to `url`.
    fn get(&self, url: &Url) -> Result<HttpResponse, BoxError>;
}

/// [`Transport`] backed by a blocking [`reqwest`] client.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Wrap an existing client, e.g. one configured with credentials.
    pub fn new(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }

    /// Build a client applying `timeout` to every request.
    pub fn with_timeout(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url) -> Result<HttpResponse, BoxError> {
        let response = self.client.get(url.clone()).send()?;
        Ok(HttpResponse {
            status: response.status().as_u16(),
            body: Box::new(response),
        })
    }
}

/// Fetches a URL and decodes its JSON body.
///
/// Only a `200 OK` response is decoded. The response, and with it the
/// underlying connection, is dropped before [`Fetcher::fetch`] returns, no
/// matter whether the request succeeded.
#[derive(Debug)]
pub struct Fetcher<T = HttpTransport> {
    transport: T,
}

impl<T: Transport> Fetcher<T> {
    /// Create a [`Fetcher`] on top of the given transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `GET` `url` and decode the body into a `D`.
    pub fn fetch<D: DeserializeOwned>(&self, url: &Url) -> Result<D, FetchError> {
        let response = self
            .transport
            .get(url)
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        if response.status != 200 {
            return Err(FetchError::UnexpectedStatus {
                url: url.clone(),
                status: response.status,
            });
        }

        serde_json::from_reader(response.body).map_err(|source| FetchError::Decode {
            url: url.clone(),
            source,
        })
    }
}
