//! The contract to the external validation service and its two implementations.

use crate::categorizer::check_invariants;
use crate::config::{Backend, Config};
use crate::error::{AppError, Result};
use crate::models::{
    CategoryType, EmailAddress, HistoryFilters, HistoryPage, ResultStatus, ValidationResult,
};
use rand::{Rng, distributions::Alphanumeric};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

/// Fallback failure text when the service gives no usable message.
pub const GENERIC_FAILURE: &str = "Validation failed";

/// Submits addresses to a validation service.
///
/// Every call makes exactly one attempt. Retrying is up to the caller.
pub trait ValidationClient: Send + Sync {
    /// Validates a non-empty batch. An empty batch is rejected with
    /// [`AppError::EmptyInput`] before anything is sent.
    fn submit_batch(
        &self,
        addresses: &[EmailAddress],
    ) -> impl Future<Output = Result<ValidationResult>> + Send;

    /// Validates one address; equivalent to a batch of length 1.
    fn submit_single(&self, address: &str) -> impl Future<Output = Result<ValidationResult>> + Send;

    /// Fetches one page of past results.
    fn fetch_history(
        &self,
        page: usize,
        filters: &HistoryFilters,
    ) -> impl Future<Output = Result<HistoryPage>> + Send;
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Accepts a successful result only if it is completed and its buckets form a
/// valid partition of the `expected_total` submitted addresses.
fn accept_result(result: ValidationResult, expected_total: usize) -> Result<ValidationResult> {
    match result.status {
        ResultStatus::Completed => {}
        ResultStatus::Failed => return Err(AppError::ValidationService(GENERIC_FAILURE.to_string())),
        ResultStatus::Processing => {
            return Err(AppError::ValidationService(
                "Validation service returned an unfinished result".to_string(),
            ));
        }
    }

    check_invariants(&result, Some(expected_total)).map_err(|violation| {
        tracing::error!(target: "submit_task", "Rejecting result {}: {}", result.id, violation);
        AppError::ValidationService(format!(
            "Validation service returned an inconsistent result: {}",
            violation
        ))
    })?;

    tracing::info!(target: "submit_task",
        "Validation {} completed: {} emails, {} credits used",
        result.id, result.total_emails, result.credits_used
    );
    Ok(result)
}

/// Client for the real service, e.g. `https://api.emailcleaner.com/v1`.
#[derive(Clone)]
pub struct HttpValidationClient {
    http_client: Client,
    base_url: Url,
    credential: Option<String>,
}

impl std::fmt::Debug for HttpValidationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpValidationClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.credential.is_some())
            .finish()
    }
}

impl HttpValidationClient {
    /// Creates a client for `base_url`. The bearer `credential`, if any, is
    /// attached to every request.
    pub fn new(
        base_url: &str,
        credential: Option<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            credential,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.api_url,
            config.api_token.clone(),
            config.request_timeout,
            &config.user_agent,
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credential {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> Result<T> {
        let url = self.endpoint(path)?;
        tracing::debug!(target: "submit_task", "POST {}", url);
        let response = self
            .authorize(self.http_client.post(url).json(&body))
            .send()
            .await
            .map_err(transport_error)?;
        read_response(response).await
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    tracing::error!(target: "submit_task", "Request to validation service failed: {}", e);
    if e.is_timeout() {
        AppError::ValidationService("Validation service timed out".to_string())
    } else {
        AppError::ValidationService(e.to_string())
    }
}

async fn read_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.json::<ErrorBody>().await.unwrap_or_default();
        let message = body
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| GENERIC_FAILURE.to_string());
        tracing::warn!(target: "submit_task", "Validation service answered HTTP {}: {}", status, message);
        return Err(AppError::ValidationService(message));
    }

    response.json::<T>().await.map_err(|e| {
        tracing::error!(target: "submit_task", "Could not decode service response: {}", e);
        AppError::ValidationService(format!("Malformed response from validation service: {}", e))
    })
}

impl ValidationClient for HttpValidationClient {
    async fn submit_batch(&self, addresses: &[EmailAddress]) -> Result<ValidationResult> {
        if addresses.is_empty() {
            return Err(AppError::EmptyInput);
        }
        tracing::info!(target: "submit_task", "Submitting batch of {} addresses", addresses.len());
        let result = self
            .post_json("validate/bulk", json!({ "emails": addresses }))
            .await?;
        accept_result(result, addresses.len())
    }

    async fn submit_single(&self, address: &str) -> Result<ValidationResult> {
        tracing::info!(target: "submit_task", "Submitting single address");
        let result = self
            .post_json("validate/single", json!({ "email": address }))
            .await?;
        accept_result(result, 1)
    }

    async fn fetch_history(&self, page: usize, filters: &HistoryFilters) -> Result<HistoryPage> {
        let url = self.endpoint("validations/history")?;
        tracing::debug!("GET {} (page {})", url, page);
        let response = self
            .authorize(
                self.http_client
                    .get(url)
                    .query(&[("page", page)])
                    .query(filters),
            )
            .send()
            .await
            .map_err(transport_error)?;
        read_response(response).await
    }
}

/// Deterministic stand-in for the service. Classifies each distinct address by
/// the position it first appears at, so the same input always lands in the same
/// buckets and buckets never overlap.
#[derive(Debug, Clone, Default)]
pub struct FixtureValidationClient {
    bulk_delay: Duration,
    single_delay: Duration,
}

impl FixtureValidationClient {
    pub fn new(bulk_delay: Duration, single_delay: Duration) -> Self {
        Self {
            bulk_delay,
            single_delay,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.fixture_bulk_delay, config.fixture_single_delay)
    }

    fn category_at(index: usize) -> CategoryType {
        if index % 11 == 10 {
            CategoryType::SpamTraps
        } else if index % 7 == 6 {
            CategoryType::Disposable
        } else if index % 5 == 4 {
            CategoryType::Risky
        } else if index % 3 == 2 {
            CategoryType::Invalid
        } else {
            CategoryType::Valid
        }
    }

    /// Builds the result the fixture returns for `addresses`.
    pub fn classify(addresses: &[EmailAddress]) -> ValidationResult {
        let mut result = ValidationResult {
            id: local_result_id(),
            date: Some(chrono::Utc::now()),
            file_name: None,
            total_emails: addresses.len(),
            valid: Vec::new(),
            invalid: Vec::new(),
            risky: Vec::new(),
            disposable: Vec::new(),
            spam_traps: Vec::new(),
            credits_used: addresses.len() as u64,
            status: ResultStatus::Completed,
        };

        // Repeats share the category of their first occurrence.
        let mut seen: HashMap<&str, CategoryType> = HashMap::new();
        for (i, address) in addresses.iter().enumerate() {
            let category = *seen
                .entry(address.as_str())
                .or_insert_with(|| Self::category_at(i));
            let bucket = match category {
                CategoryType::Valid => &mut result.valid,
                CategoryType::Invalid => &mut result.invalid,
                CategoryType::Risky => &mut result.risky,
                CategoryType::Disposable => &mut result.disposable,
                CategoryType::SpamTraps => &mut result.spam_traps,
            };
            bucket.push(address.clone());
        }

        result
    }
}

fn local_result_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

impl ValidationClient for FixtureValidationClient {
    async fn submit_batch(&self, addresses: &[EmailAddress]) -> Result<ValidationResult> {
        if addresses.is_empty() {
            return Err(AppError::EmptyInput);
        }
        tracing::info!(target: "submit_task",
            "Classifying {} addresses with fixture backend", addresses.len()
        );
        if !self.bulk_delay.is_zero() {
            sleep(self.bulk_delay).await;
        }
        accept_result(Self::classify(addresses), addresses.len())
    }

    async fn submit_single(&self, address: &str) -> Result<ValidationResult> {
        if !self.single_delay.is_zero() {
            sleep(self.single_delay).await;
        }
        accept_result(Self::classify(&[address.to_string()]), 1)
    }

    async fn fetch_history(&self, page: usize, _filters: &HistoryFilters) -> Result<HistoryPage> {
        tracing::debug!("Serving fixture history page {}", page);
        let sample = vec!["test@example.com".to_string()];
        Ok(HistoryPage {
            results: (0..10).map(|_| Self::classify(&sample)).collect(),
            total: 100,
            pages: 10,
        })
    }
}

/// The client selected by configuration.
#[derive(Debug, Clone)]
pub enum ClientBackend {
    Http(HttpValidationClient),
    Fixture(FixtureValidationClient),
}

impl ClientBackend {
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.backend {
            Backend::Http => {
                tracing::info!("Using validation service at {}", config.api_url);
                Ok(ClientBackend::Http(HttpValidationClient::from_config(config)?))
            }
            Backend::Fixture => {
                tracing::info!("Using fixture validation backend");
                Ok(ClientBackend::Fixture(FixtureValidationClient::from_config(config)))
            }
        }
    }
}

impl ValidationClient for ClientBackend {
    async fn submit_batch(&self, addresses: &[EmailAddress]) -> Result<ValidationResult> {
        match self {
            ClientBackend::Http(client) => client.submit_batch(addresses).await,
            ClientBackend::Fixture(client) => client.submit_batch(addresses).await,
        }
    }

    async fn submit_single(&self, address: &str) -> Result<ValidationResult> {
        match self {
            ClientBackend::Http(client) => client.submit_single(address).await,
            ClientBackend::Fixture(client) => client.submit_single(address).await,
        }
    }

    async fn fetch_history(&self, page: usize, filters: &HistoryFilters) -> Result<HistoryPage> {
        match self {
            ClientBackend::Http(client) => client.fetch_history(page, filters).await,
            ClientBackend::Fixture(client) => client.fetch_history(page, filters).await,
        }
    }
}
