//! MLflow REST client
//!
//! Blocking `reqwest` client against `<tracking_uri>/api/2.0/mlflow/...`.
//! Listings follow `next_page_token` until the server stops returning one,
//! optionally capped by `AuditConfig::max_pages`.

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use super::wire::{
    ErrorBody, ListArtifactsResponse, MetricHistoryResponse, Page, SearchExperimentsResponse,
    SearchRegisteredModelsResponse, SearchRunsResponse, RESOURCE_DOES_NOT_EXIST,
};
use super::TrackingClient;
use crate::config::{AuditConfig, Credentials};
use crate::experiment::{Artifact, Experiment, MetricSample, RegisteredModel, Run};
use crate::{Error, Result};

/// Upper bound the server enforces on `registered-models/search` pages.
const MAX_REGISTERED_MODELS_PAGE: u32 = 1000;

/// HTTP implementation of [`TrackingClient`] for MLflow tracking servers.
pub struct HttpTrackingClient {
    base_url: String,
    credentials: Option<Credentials>,
    page_size: u32,
    max_pages: Option<usize>,
    client: Client,
}

impl HttpTrackingClient {
    /// Create a client for the configured tracking server.
    ///
    /// No request is sent until the first operation.
    ///
    /// # Errors
    ///
    /// `Error::Connection` if the HTTP client cannot be constructed.
    pub fn new(config: &AuditConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("experiment-audit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Connection {
                url: config.tracking_uri().to_string(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            base_url: config.tracking_uri().to_string(),
            credentials: config.credentials().cloned(),
            page_size: config.page_size(),
            max_pages: config.max_pages(),
            client,
        })
    }

    /// Base address requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/2.0/mlflow/{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(Credentials::Bearer(token)) => request.bearer_auth(token),
            Some(Credentials::Basic { username, password }) => {
                request.basic_auth(username, password.as_deref())
            }
            None => request,
        }
    }

    /// Send one request and decode a successful JSON body.
    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = self
            .authorize(request)
            .send()
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .map_err(|e| Error::Decode(format!("{what}: {e}")));
        }

        let body = response.text().unwrap_or_default();
        Err(status_error(status.as_u16(), &body, what))
    }

    fn transport_error(&self, error: &reqwest::Error) -> Error {
        Error::Connection {
            url: error
                .url()
                .map_or_else(|| self.base_url.clone(), ToString::to_string),
            message: error.to_string(),
        }
    }

    /// Drain a paginated listing.
    fn paginate<T, F>(&self, what: &str, mut fetch_page: F) -> Result<Vec<T>>
    where
        F: FnMut(Option<&str>) -> Result<Page<T>>,
    {
        let mut items = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = fetch_page(token.as_deref())?;
            pages += 1;
            items.extend(page.items);
            token = page.next_page_token.filter(|t| !t.is_empty());

            if token.is_none() {
                break;
            }
            if self.max_pages.is_some_and(|max| pages >= max) {
                warn!(
                    listing = what,
                    pages,
                    fetched = items.len(),
                    "page cap reached; remaining results were not fetched"
                );
                break;
            }
        }

        debug!(listing = what, pages, fetched = items.len(), "listing complete");
        Ok(items)
    }
}

/// Map a non-success response to the error taxonomy.
fn status_error(status: u16, body: &str, what: &str) -> Error {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    let message = if message.is_empty() {
        "no details".to_string()
    } else {
        message
    };

    match status {
        401 | 403 => Error::Auth { status, message },
        404 => Error::NotFound(format!("{what}: {message}")),
        _ if parsed.error_code.as_deref() == Some(RESOURCE_DOES_NOT_EXIST) => {
            Error::NotFound(format!("{what}: {message}"))
        }
        _ => Error::Api { status, message },
    }
}

fn paged_body(mut body: serde_json::Value, token: Option<&str>) -> serde_json::Value {
    if let Some(token) = token {
        body["page_token"] = json!(token);
    }
    body
}

impl TrackingClient for HttpTrackingClient {
    fn list_experiments(&self) -> Result<Vec<Experiment>> {
        let url = self.endpoint("experiments/search");
        self.paginate("experiments", |token| {
            let body = paged_body(json!({ "max_results": self.page_size }), token);
            let request = self.client.post(&url).json(&body);
            self.send::<SearchExperimentsResponse>(request, "experiments/search")?
                .into_page()
        })
    }

    fn list_runs(&self, experiment_id: &str) -> Result<Vec<Run>> {
        let url = self.endpoint("runs/search");
        self.paginate("runs", |token| {
            let body = paged_body(
                json!({
                    "experiment_ids": [experiment_id],
                    "max_results": self.page_size,
                }),
                token,
            );
            let request = self.client.post(&url).json(&body);
            self.send::<SearchRunsResponse>(request, "runs/search")?
                .into_page()
        })
    }

    fn fetch_metric_history(&self, run_id: &str, metric_name: &str) -> Result<Vec<MetricSample>> {
        let url = self.endpoint("metrics/get-history");
        let what = format!("metric history {metric_name} for run {run_id}");
        let page_size = self.page_size.to_string();

        let samples = self.paginate("metric history", |token| {
            let mut query = vec![
                ("run_id", run_id),
                ("metric_key", metric_name),
                ("max_results", page_size.as_str()),
            ];
            if let Some(token) = token {
                query.push(("page_token", token));
            }
            let request = self.client.get(&url).query(&query);
            self.send::<MetricHistoryResponse>(request, &what)?
                .into_page(run_id)
        })?;

        // The server answers an unknown metric key with an empty history.
        if samples.is_empty() {
            return Err(Error::NotFound(format!("{what}: metric was never logged")));
        }
        Ok(samples)
    }

    fn list_registered_models(&self) -> Result<Vec<RegisteredModel>> {
        let url = self.endpoint("registered-models/search");
        let page_size = self.page_size.min(MAX_REGISTERED_MODELS_PAGE).to_string();

        self.paginate("registered models", |token| {
            let mut query = vec![("max_results", page_size.as_str())];
            if let Some(token) = token {
                query.push(("page_token", token));
            }
            let request = self.client.get(&url).query(&query);
            self.send::<SearchRegisteredModelsResponse>(request, "registered-models/search")?
                .into_page()
        })
    }

    fn list_artifacts(&self, run_id: &str) -> Result<Vec<Artifact>> {
        let url = self.endpoint("artifacts/list");
        let what = format!("artifacts for run {run_id}");

        self.paginate("artifacts", |token| {
            let mut query = vec![("run_id", run_id)];
            if let Some(token) = token {
                query.push(("page_token", token));
            }
            let request = self.client.get(&url).query(&query);
            Ok(self.send::<ListArtifactsResponse>(request, &what)?.into_page())
        })
    }
}

impl std::fmt::Debug for HttpTrackingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTrackingClient")
            .field("base_url", &self.base_url)
            .field("has_credentials", &self.credentials.is_some())
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}
