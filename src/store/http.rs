use super::{DashboardStore, StoreError};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Dashboard service reached over HTTP.
///
/// `GET {endpoint}/dashboards/{name}` answers with the dashboard envelope and
/// `PUT` to the same URL replaces the body in full.
pub struct HttpStore {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetDashboardResponse {
    #[serde(default)]
    dashboard_name: Option<String>,
    dashboard_body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutDashboardRequest<'a> {
    dashboard_body: &'a str,
}

impl HttpStore {
    pub fn new(endpoint: &str, token: Option<String>, timeout: Option<Duration>) -> Result<Self, String> {
        let endpoint = Url::parse(endpoint).map_err(|error| format!("invalid endpoint `{endpoint}`: {error}"))?;
        if endpoint.cannot_be_a_base() {
            return Err(format!("endpoint `{endpoint}` cannot carry a path"));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|error| format!("build http client failed: {error}"))?;

        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    pub fn dashboard_url(&self, name: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("dashboards").push(name);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl DashboardStore for HttpStore {
    fn get_dashboard(&self, name: &str) -> Result<String, StoreError> {
        let request = self.authorize(self.client.get(self.dashboard_url(name)));
        let response = request.send().map_err(|error| transport(name, error))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(name.to_string()));
        }

        let envelope: GetDashboardResponse = response
            .error_for_status()
            .and_then(|response| response.json())
            .map_err(|error| transport(name, error))?;
        if let Some(returned) = envelope.dashboard_name.as_deref() {
            if returned != name {
                tracing::warn!(requested = name, returned, "store returned a differently named dashboard");
            }
        }
        Ok(envelope.dashboard_body)
    }

    fn put_dashboard(&self, name: &str, body: &str) -> Result<String, StoreError> {
        let request = self
            .authorize(self.client.put(self.dashboard_url(name)))
            .json(&PutDashboardRequest { dashboard_body: body });
        request
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(|error| transport(name, error))
    }
}

fn transport(board: &str, error: reqwest::Error) -> StoreError {
    StoreError::Transport {
        board: board.to_string(),
        message: error.to_string(),
    }
}
