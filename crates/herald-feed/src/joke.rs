//! Random jokes from an XML endpoint.
//!
//! The endpoint answers `GET <base><arg>` with
//! `<root><content>…</content></root>`; `arg` selects a category and is
//! picked at random from the configured list on every request.

use std::{future::Future, time::Duration};

use rand::seq::SliceRandom as _;
use reqwest::Client;
use serde::Deserialize;

use crate::{Error, Result};

pub trait JokeSource: Send + Sync {
  fn random_joke(&self) -> impl Future<Output = Result<String>> + Send + '_;
}

#[derive(Clone)]
pub struct HttpJokeSource {
  client:   Client,
  base_url: String,
  args:     Vec<String>,
}

impl HttpJokeSource {
  pub fn new(base_url: impl Into<String>, args: Vec<String>, timeout: Duration) -> Result<Self> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, base_url: base_url.into(), args })
  }

  fn pick_url(&self) -> String {
    let arg = self.args.choose(&mut rand::thread_rng()).map(String::as_str).unwrap_or("");
    format!("{}{arg}", self.base_url)
  }
}

impl JokeSource for HttpJokeSource {
  async fn random_joke(&self) -> Result<String> {
    let url = self.pick_url();
    tracing::debug!(%url, "fetching joke");

    let resp = self
      .client
      .get(&url)
      .send()
      .await
      .map_err(|e| Error::Fetch(format!("GET {url}: {e}")))?;

    if !resp.status().is_success() {
      return Err(Error::Fetch(format!("GET {url} → {}", resp.status())));
    }
    let body = resp.text().await?;
    parse_joke(&body)
  }
}

#[derive(Deserialize)]
struct JokeXml {
  content: String,
}

/// Extract the joke text from the endpoint's XML document.
pub fn parse_joke(xml: &str) -> Result<String> {
  let doc: JokeXml = quick_xml::de::from_str(xml)?;
  Ok(doc.content.trim().to_owned())
}
