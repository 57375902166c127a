//! Where dataset payloads come from.

use std::{future::Future, time::Duration};

use reqwest::Client;

use crate::{Error, Result};

/// Produces the raw dataset document. Implemented over HTTP and by test
/// doubles.
pub trait DatasetSource: Send + Sync {
  fn fetch(&self) -> impl Future<Output = Result<String>> + Send + '_;
}

/// Fetches the dataset with a plain `GET`.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpDatasetSource {
  client: Client,
  url:    String,
}

impl HttpDatasetSource {
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, url: url.into() })
  }
}

impl DatasetSource for HttpDatasetSource {
  async fn fetch(&self) -> Result<String> {
    tracing::debug!(url = %self.url, "fetching dataset");

    let resp = self
      .client
      .get(&self.url)
      .send()
      .await
      .map_err(|e| Error::Fetch(format!("GET {}: {e}", self.url)))?;

    if !resp.status().is_success() {
      return Err(Error::Fetch(format!("GET {} → {}", self.url, resp.status())));
    }
    resp
      .text()
      .await
      .map_err(|e| Error::Fetch(format!("reading body of {}: {e}", self.url)))
  }
}
