//! Outbound HTTP transport to the summary writer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use url::Url;

/// Errors raised while sending one request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, protocol or body error from the HTTP client.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The request did not complete before its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Sends one serialized summary to the writer.
///
/// Returns the HTTP status code; deciding what counts as success is the
/// caller's job.
pub trait SinkTransport: Send + Sync {
    fn post(&self, body: Vec<u8>) -> impl Future<Output = Result<u16, TransportError>> + Send;
}

impl<T: SinkTransport> SinkTransport for Arc<T> {
    fn post(&self, body: Vec<u8>) -> impl Future<Output = Result<u16, TransportError>> + Send {
        (**self).post(body)
    }
}

/// `reqwest`-backed transport posting JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
}

impl HttpTransport {
    /// Build a transport whose client enforces `timeout` per request.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl SinkTransport for HttpTransport {
    async fn post(&self, body: Vec<u8>) -> Result<u16, TransportError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}
