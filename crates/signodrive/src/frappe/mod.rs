//! Client for the hosted Frappe backend that owns the authoritative driver, job opening and
//! job applicant records.
//!
//! Frappe exposes every doctype under `/api/resource/<doctype>` and wraps payloads in a
//! `{ "data": ... }` envelope. [`FrappeClient`] hides both details behind typed calls.

mod models;

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::FrappeConfig;

pub use models::{
    FrappeApplication, FrappeDriver, FrappeJob, NewFrappeApplication, APPLICATION_DOCTYPE,
    DRIVER_DOCTYPE, JOB_DOCTYPE,
};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum FrappeError {
    #[error("frappe backend is not configured")]
    NotConfigured,
    #[error("invalid frappe url: {0}")]
    InvalidUrl(String),
    #[error("frappe request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("frappe responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected frappe payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One `[field, operator, value]` triple of a Frappe list filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FrappeFilter {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

impl FrappeFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: "=".to_string(),
            value: value.into(),
        }
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: "like".to_string(),
            value: Value::String(pattern.into()),
        }
    }

    fn to_json(&self) -> Value {
        Value::Array(vec![
            Value::String(self.field.clone()),
            Value::String(self.operator.clone()),
            self.value.clone(),
        ])
    }
}

/// List query options mapped onto Frappe's REST parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrappeQuery {
    pub fields: Vec<String>,
    pub filters: Vec<FrappeFilter>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_by: Option<String>,
}

impl FrappeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: FrappeFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Query-string pairs; list values are JSON encoded the way Frappe expects.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.fields.is_empty() {
            params.push(("fields", Value::from(self.fields.clone()).to_string()));
        }
        if !self.filters.is_empty() {
            let filters: Vec<Value> = self.filters.iter().map(FrappeFilter::to_json).collect();
            params.push(("filters", Value::Array(filters).to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit_page_length", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("limit_start", offset.to_string()));
        }
        if let Some(order_by) = &self.order_by {
            params.push(("order_by", order_by.clone()));
        }
        params
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Async client for the Frappe REST API.
#[derive(Debug, Clone)]
pub struct FrappeClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl FrappeClient {
    /// Builds a client from configuration, failing with [`FrappeError::NotConfigured`] when no
    /// base URL is set.
    pub fn from_config(config: &FrappeConfig) -> Result<Self, FrappeError> {
        let base_url = config
            .base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(FrappeError::NotConfigured)?;
        let base_url =
            Url::parse(base_url.trim()).map_err(|err| FrappeError::InvalidUrl(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(FrappeError::InvalidUrl(base_url.to_string()));
        }

        let token = match (&config.api_key, &config.api_secret) {
            (Some(key), Some(secret)) => Some(format!("token {key}:{secret}")),
            _ => None,
        };
        let timeout = match config.timeout_secs {
            0 => DEFAULT_TIMEOUT_SECS,
            secs => secs,
        };
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resource_url(&self, doctype: &str, name: Option<&str>) -> Result<Url, FrappeError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| FrappeError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().extend(["api", "resource", doctype]);
            if let Some(name) = name {
                segments.push(name);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, FrappeError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(status = %status, "frappe request rejected");
            return Err(FrappeError::Status { status, body });
        }
        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        Ok(envelope.data)
    }

    /// Lists documents of `doctype`.
    pub async fn list<T: DeserializeOwned>(
        &self,
        doctype: &str,
        query: &FrappeQuery,
    ) -> Result<Vec<T>, FrappeError> {
        let url = self.resource_url(doctype, None)?;
        debug!(doctype, "frappe list");
        self.send(self.http.get(url).query(&query.params())).await
    }

    pub async fn get<T: DeserializeOwned>(&self, doctype: &str, name: &str) -> Result<T, FrappeError> {
        let url = self.resource_url(doctype, Some(name))?;
        debug!(doctype, name, "frappe get");
        self.send(self.http.get(url)).await
    }

    pub async fn insert<B, T>(&self, doctype: &str, body: &B) -> Result<T, FrappeError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.resource_url(doctype, None)?;
        debug!(doctype, "frappe insert");
        self.send(self.http.post(url).json(body)).await
    }

    pub async fn update<B, T>(&self, doctype: &str, name: &str, body: &B) -> Result<T, FrappeError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.resource_url(doctype, Some(name))?;
        debug!(doctype, name, "frappe update");
        self.send(self.http.put(url).json(body)).await
    }

    pub async fn open_jobs(&self, limit: usize) -> Result<Vec<FrappeJob>, FrappeError> {
        let query = FrappeQuery::new()
            .fields(FrappeJob::FIELDS.iter().copied())
            .filter(FrappeFilter::eq("status", "Open"))
            .order_by("creation desc")
            .limit(limit);
        self.list(JOB_DOCTYPE, &query).await
    }

    pub async fn drivers(&self, query: &FrappeQuery) -> Result<Vec<FrappeDriver>, FrappeError> {
        let mut query = query.clone();
        if query.fields.is_empty() {
            query = query.fields(FrappeDriver::FIELDS.iter().copied());
        }
        self.list(DRIVER_DOCTYPE, &query).await
    }

    pub async fn applications_for_job(
        &self,
        job_name: &str,
    ) -> Result<Vec<FrappeApplication>, FrappeError> {
        let query = FrappeQuery::new()
            .fields(FrappeApplication::FIELDS.iter().copied())
            .filter(FrappeFilter::eq("job_title", job_name))
            .order_by("creation asc");
        self.list(APPLICATION_DOCTYPE, &query).await
    }

    pub async fn submit_application(
        &self,
        application: &NewFrappeApplication,
    ) -> Result<FrappeApplication, FrappeError> {
        self.insert(APPLICATION_DOCTYPE, application).await
    }
}

#[cfg(test)]
mod tests;
