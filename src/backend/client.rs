use crate::cache::{Record, RemoteError, RemoteSource};
use crate::config::Config;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::future::Future;
use url::Url;

/// Longest error body kept in a `RemoteError::Status`, in characters
const MAX_ERROR_BODY: usize = 200;

const MISSING_API_KEY: &str =
  "backend API key not found, set PARIKRAMA_API_KEY or SUPABASE_ANON_KEY";

/// Client for the backend's REST table endpoints.
#[derive(Clone)]
pub struct BackendClient {
  http: reqwest::Client,
  /// `<project url>/rest/v1/`
  rest_url: Url,
  /// Without a key every read fails, so only cached data is served
  api_key: Option<String>,
}

impl BackendClient {
  pub fn new(config: &Config) -> Result<Self> {
    let api_key = Config::get_api_key().ok();
    if api_key.is_none() {
      tracing::warn!("no backend API key configured, serving cached data only");
    }
    Self::with_api_key(&config.backend.url, api_key)
  }

  pub fn with_api_key(project_url: &str, api_key: Option<String>) -> Result<Self> {
    let rest_url = rest_url(project_url)?;

    let http = reqwest::Client::builder()
      .gzip(true)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      rest_url,
      api_key,
    })
  }

  /// Build the URL that reads `resource` with the given field selection.
  fn table_url(&self, resource: &str, select: &str) -> Result<Url, RemoteError> {
    let mut url = self
      .rest_url
      .join(resource)
      .map_err(|e| RemoteError::Request(format!("invalid resource name {:?}: {}", resource, e)))?;
    url.query_pairs_mut().append_pair("select", select);
    Ok(url)
  }

  async fn get_rows(&self, resource: &str, select: &str) -> Result<Option<Vec<Record>>, RemoteError> {
    let api_key = self
      .api_key
      .as_deref()
      .ok_or_else(|| RemoteError::Request(MISSING_API_KEY.to_string()))?;
    let url = self.table_url(resource, select)?;

    let response = self
      .http
      .get(url)
      .header("apikey", api_key)
      .bearer_auth(api_key)
      .header(reqwest::header::ACCEPT, "application/json")
      .send()
      .await
      .map_err(|e| RemoteError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .bytes()
      .await
      .map_err(|e| RemoteError::Request(e.to_string()))?;

    if !status.is_success() {
      return Err(status_error(status.as_u16(), &body));
    }

    parse_rows(&body)
  }
}

impl RemoteSource for BackendClient {
  fn fetch(
    &self,
    resource: &str,
    select: &str,
  ) -> impl Future<Output = Result<Option<Vec<Record>>, RemoteError>> + Send {
    self.get_rows(resource, select)
  }
}

fn rest_url(project_url: &str) -> Result<Url> {
  let base = Url::parse(project_url)
    .map_err(|e| eyre!("Invalid backend url {}: {}", project_url, e))?;
  base
    .join("rest/v1/")
    .map_err(|e| eyre!("Invalid backend url {}: {}", project_url, e))
}

/// Error for a non-success response, keeping the start of its body.
fn status_error(status: u16, body: &[u8]) -> RemoteError {
  let message = String::from_utf8_lossy(body)
    .chars()
    .take(MAX_ERROR_BODY)
    .collect();
  RemoteError::Status { status, message }
}

/// Parse a table response body.
///
/// An empty or `null` body is a response without payload; anything that is
/// not an array of objects is a decode error.
fn parse_rows(body: &[u8]) -> Result<Option<Vec<Record>>, RemoteError> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(None);
  }

  let value: Value =
    serde_json::from_slice(body).map_err(|e| RemoteError::Decode(e.to_string()))?;

  match value {
    Value::Null => Ok(None),
    Value::Array(items) => items
      .into_iter()
      .map(|item| match item {
        Value::Object(row) => Ok(row),
        other => Err(RemoteError::Decode(format!("expected an object row, got {}", other))),
      })
      .collect::<Result<Vec<_>, _>>()
      .map(Some),
    other => Err(RemoteError::Decode(format!("expected an array of rows, got {}", other))),
  }
}
