//! Local mock of the validation service, speaking the same wire contract as
//! the real one. Used for development and end-to-end tests.

use crate::client::ValidationClient;
use crate::error::AppError;
use crate::models::{HistoryFilters, ResultStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection, Reply};

/// Health check response structure
#[derive(Serialize, Deserialize)]
struct HealthResponse {
    success: bool,
    message: String,
}

/// Bulk API request structure
#[derive(Deserialize)]
struct BulkRequest {
    emails: Vec<String>,
}

/// Single API request structure
#[derive(Deserialize)]
struct SingleRequest {
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    page: Option<usize>,
    status: Option<ResultStatus>,
    date_from: Option<String>,
    date_to: Option<String>,
    search: Option<String>,
}

impl HistoryQuery {
    fn into_parts(self) -> (usize, HistoryFilters) {
        let filters = HistoryFilters {
            status: self.status,
            date_from: self.date_from,
            date_to: self.date_to,
            search: self.search,
        };
        (self.page.unwrap_or(1).max(1), filters)
    }
}

fn message_reply(status: StatusCode, message: &str) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(&json!({ "message": message })), status)
}

fn error_reply(err: &AppError) -> WithStatus<Json> {
    let status = match err {
        AppError::EmptyInput => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = match err {
        AppError::EmptyInput => "No email addresses provided".to_string(),
        other => other.to_string(),
    };
    message_reply(status, &message)
}

/// Builds the service routes around `client`.
pub fn routes<C>(client: Arc<C>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone
where
    C: ValidationClient + 'static,
{
    let client_filter = warp::any().map(move || client.clone());

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&HealthResponse {
                success: true,
                message: "Email Cleaner mock service is running".to_string(),
            })
        });

    let bulk = warp::path!("validate" / "bulk")
        .and(warp::post())
        .and(warp::body::json())
        .and(client_filter.clone())
        .and_then(handle_bulk::<C>);

    let single = warp::path!("validate" / "single")
        .and(warp::post())
        .and(warp::body::json())
        .and(client_filter.clone())
        .and_then(handle_single::<C>);

    let history = warp::path!("validations" / "history")
        .and(warp::get())
        .and(warp::query::<HistoryQuery>())
        .and(client_filter)
        .and_then(handle_history::<C>);

    health
        .or(bulk)
        .or(single)
        .or(history)
        .with(warp::cors().allow_any_origin())
        .recover(handle_rejection)
}

/// Serves on `port` until the process exits.
pub async fn start_mock_server<C>(port: u16, client: Arc<C>)
where
    C: ValidationClient + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(target: "mock_service", "Starting mock validation service on {}", addr);
    warp::serve(routes(client)).run(addr).await;
}

async fn handle_bulk<C: ValidationClient>(
    request: BulkRequest,
    client: Arc<C>,
) -> Result<WithStatus<Json>, Infallible> {
    tracing::info!(target: "mock_service", "Bulk request with {} emails", request.emails.len());
    match client.submit_batch(&request.emails).await {
        Ok(result) => Ok(warp::reply::with_status(warp::reply::json(&result), StatusCode::OK)),
        Err(e) => {
            tracing::warn!(target: "mock_service", "Bulk request rejected: {}", e);
            Ok(error_reply(&e))
        }
    }
}

async fn handle_single<C: ValidationClient>(
    request: SingleRequest,
    client: Arc<C>,
) -> Result<WithStatus<Json>, Infallible> {
    tracing::info!(target: "mock_service", "Single request");
    match client.submit_single(&request.email).await {
        Ok(result) => Ok(warp::reply::with_status(warp::reply::json(&result), StatusCode::OK)),
        Err(e) => {
            tracing::warn!(target: "mock_service", "Single request rejected: {}", e);
            Ok(error_reply(&e))
        }
    }
}

async fn handle_history<C: ValidationClient>(
    query: HistoryQuery,
    client: Arc<C>,
) -> Result<WithStatus<Json>, Infallible> {
    let (page, filters) = query.into_parts();
    match client.fetch_history(page, &filters).await {
        Ok(history) => Ok(warp::reply::with_status(warp::reply::json(&history), StatusCode::OK)),
        Err(e) => Ok(error_reply(&e)),
    }
}

/// Handle API rejections
async fn handle_rejection(err: Rejection) -> Result<WithStatus<Json>, Infallible> {
    if err.is_not_found() {
        Ok(message_reply(StatusCode::NOT_FOUND, "Not Found"))
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        Ok(message_reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"))
    } else {
        tracing::debug!(target: "mock_service", "Rejected request: {:?}", err);
        Ok(message_reply(StatusCode::BAD_REQUEST, "Bad request"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FixtureValidationClient;
    use crate::models::{HistoryPage, ValidationResult};

    fn fixture_routes() -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        routes(Arc::new(FixtureValidationClient::default()))
    }

    #[tokio::test]
    async fn test_health() {
        let resp = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&fixture_routes())
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: HealthResponse = serde_json::from_slice(resp.body()).unwrap();
        assert!(body.success);
    }

    #[tokio::test]
    async fn test_bulk_returns_result_shape() {
        let resp = warp::test::request()
            .method("POST")
            .path("/validate/bulk")
            .json(&json!({ "emails": ["a@x.com", "b@x.com", "c@x.com"] }))
            .reply(&fixture_routes())
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let result: ValidationResult = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(result.total_emails, 3);
        assert_eq!(result.invalid, vec!["c@x.com".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_bulk_is_bad_request_with_message() {
        let resp = warp::test::request()
            .method("POST")
            .path("/validate/bulk")
            .json(&json!({ "emails": [] }))
            .reply(&fixture_routes())
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["message"], "No email addresses provided");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let resp = warp::test::request()
            .method("POST")
            .path("/validate/single")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&fixture_routes())
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_query() {
        let resp = warp::test::request()
            .method("GET")
            .path("/validations/history?page=3&status=completed")
            .reply(&fixture_routes())
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let page: HistoryPage = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(page.results.len(), 10);
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let resp = warp::test::request()
            .method("GET")
            .path("/validate/nothing")
            .reply(&fixture_routes())
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
