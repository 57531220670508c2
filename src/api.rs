//! Client for the remote collection API.

use crate::error::{ApiError, Error, Result};
use crate::line::Record;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::{Client, multipart};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Files attached to a request, keyed by form field name.
pub type Files = BTreeMap<String, PathBuf>;

/// Submits a single record. Implementations block until the API answers.
pub trait ApiClient: Send + Sync {
    fn create(
        &self,
        url: &str,
        data: &Record,
        files: Option<&Files>,
    ) -> std::result::Result<(), ApiError>;
}

impl<T: ApiClient + ?Sized> ApiClient for Arc<T> {
    fn create(
        &self,
        url: &str,
        data: &Record,
        files: Option<&Files>,
    ) -> std::result::Result<(), ApiError> {
        (**self).create(url, data, files)
    }
}

/// Formats a timestamp the way the collection API expects it.
pub fn encode_datetime(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Blocking HTTP client posting to `<base_url>/<url>`. One pooled
/// connection set is shared by every request.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: Client,
    base_url: Url,
}

impl HttpApiClient {
    /// Builds a client. Relative URLs are resolved against `base_url`, so it
    /// should end with a slash.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| Error::Config {
            message: format!("invalid API URL '{}': {}", base_url, e),
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("telemetry-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::from)?;
        Ok(Self { client, base_url })
    }

    /// The URL every request path is joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, url: &str) -> std::result::Result<Url, ApiError> {
        self.base_url.join(url).map_err(|source| ApiError::InvalidUrl {
            url: url.to_string(),
            source,
        })
    }
}

impl ApiClient for HttpApiClient {
    fn create(
        &self,
        url: &str,
        data: &Record,
        files: Option<&Files>,
    ) -> std::result::Result<(), ApiError> {
        let target = self.resolve(url)?;
        debug!(url = %target, fields = data.len(), "Posting record");

        let request = match files {
            Some(files) => {
                let mut form = multipart::Form::new();
                for (name, value) in data {
                    form = form.text(name.clone(), form_value(value));
                }
                for (name, path) in files {
                    form = form.file(name.clone(), path).map_err(|source| ApiError::File {
                        path: path.clone(),
                        source,
                    })?;
                }
                self.client.post(target).multipart(form)
            }
            None => self.client.post(target).json(data),
        };

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Multipart parts are text; strings are sent bare, everything else as JSON.
fn form_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
