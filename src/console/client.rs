use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use url::Url;

use crate::probe::model::{ProbeRequest, ProbeResult};

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8080";

/// Path of the probe endpoint, relative to the service root.
const TEST_ENDPOINT: &str = "api/test";

/// The call to the Probe Service itself failed, so there is no result to show.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("{0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid service URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Talks to the Probe Service. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    client: Client,
    endpoint: Url,
}

impl ProbeClient {
    /// `timeout` bounds the whole round trip. Probes such as traceroute can
    /// take a minute, so it should exceed the service side timeouts.
    pub fn new(service_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let invalid = |source| ClientError::InvalidUrl {
            url: service_url.to_string(),
            source,
        };

        let mut base = Url::parse(service_url).map_err(invalid)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join(TEST_ENDPOINT).map_err(invalid)?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(ProbeClient { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Exactly one request, never retried.
    pub async fn run(&self, request: &ProbeRequest) -> Result<ProbeResult, TransportError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(response.json::<ProbeResult>().await?)
    }
}
