//! Inventory backend API client.
//!
//! Provides HTTP communication with the inventory backend (movements, usage
//! requests, alerts, shelf lookups). Everything above this module talks to
//! the backend through the [`InventoryApi`] trait so stores can run against
//! an in-memory fake in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{
    Alert, LocatedSupply, MovementPage, OperatorContext, RequestStatus, ReturnPayload,
    StatusUpdate, TeacherRanking, UsageRequest,
};

/// Default timeout for API requests (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const OPERATOR_HEADER: &str = "X-Operator-Id";
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the backend base URL:
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-facing error.
fn friendly_error(url: &str, err: &reqwest::Error) -> ApiError {
    if err.is_connect() {
        return ApiError::Network(format!("Cannot reach inventory backend at {url}"));
    }
    if err.is_timeout() {
        return ApiError::Network(format!("Connection to {url} timed out"));
    }
    if err.is_builder() {
        return ApiError::InvalidUrl(url.to_string());
    }
    ApiError::Network(format!("Network error communicating with {url}: {err}"))
}

/// Default message for an HTTP status code.
fn status_message(status: StatusCode) -> String {
    match status.as_u16() {
        400 => "Request rejected by inventory backend".to_string(),
        401 | 403 => "Operator not authorized".to_string(),
        404 => "Inventory backend endpoint not found".to_string(),
        s if s >= 500 => "Inventory backend server error".to_string(),
        _ => "Unexpected response from inventory backend".to_string(),
    }
}

/// Build a `Server` error, preferring the backend's own `error`/`message`.
fn server_error(status: StatusCode, body_text: &str) -> ApiError {
    let trimmed = body_text.trim();
    let message = match serde_json::from_str::<Value>(trimmed) {
        Ok(json) => json
            .get("error")
            .or_else(|| json.get("message"))
            .or_else(|| json.get("mensaje"))
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .unwrap_or_else(|| status_message(status)),
        Err(_) if !trimmed.is_empty() && trimmed.len() <= 200 => {
            format!("{}: {trimmed}", status_message(status))
        }
        Err(_) => status_message(status),
    };
    ApiError::Server {
        status: status.as_u16(),
        message,
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Backend contract
// ---------------------------------------------------------------------------

/// Operations the client core needs from the inventory backend.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// `GET /Movimientos-inventario?page&pageSize`
    async fn list_movements(
        &self,
        operator: &OperatorContext,
        page: u32,
        page_size: u32,
    ) -> ApiResult<MovementPage>;

    /// `GET /solicitudes-uso/:id`
    async fn get_usage_request(&self, request_id: i64) -> ApiResult<UsageRequest>;

    /// `POST /solicitudes-uso/:id/devolver`
    async fn return_supplies(
        &self,
        operator: &OperatorContext,
        request_id: i64,
        payload: &ReturnPayload,
        idempotency_key: &str,
    ) -> ApiResult<()>;

    /// `GET /solicitudes-uso`
    async fn list_usage_requests(&self, operator: &OperatorContext)
        -> ApiResult<Vec<UsageRequest>>;

    /// `PUT /solicitudes-uso/:id/estado`
    async fn update_request_status(
        &self,
        operator: &OperatorContext,
        request_id: i64,
        status: RequestStatus,
    ) -> ApiResult<()>;

    /// `GET /alertas`
    async fn list_alerts(&self) -> ApiResult<Vec<Alert>>;

    /// `GET /insumos/ubicacion/:codigo`
    async fn supplies_at_location(&self, location_code: &str) -> ApiResult<Vec<LocatedSupply>>;

    /// `GET /top-docentes-laboratorios`
    async fn top_teachers(&self) -> ApiResult<Vec<TeacherRanking>>;
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url);
        Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join path segments onto the base URL, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn with_operator(req: RequestBuilder, operator: &OperatorContext) -> RequestBuilder {
        match HeaderValue::from_str(operator.id.trim()) {
            Ok(value) => req.header(OPERATOR_HEADER, value),
            Err(_) => {
                warn!(operator_id = %operator.id, "operator id is not a valid header value, sending request without it");
                req
            }
        }
    }

    /// Send a request and return the raw body of a 2xx response.
    async fn execute(&self, req: RequestBuilder) -> ApiResult<String> {
        let resp = req
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            let err = server_error(status, &body_text);
            warn!(status = status.as_u16(), error = %err, "inventory backend returned an error");
            return Err(err);
        }
        Ok(body_text)
    }

    async fn get_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> ApiResult<T> {
        let body = self.execute(req).await?;
        decode(&body)
    }
}

#[async_trait]
impl InventoryApi for ApiClient {
    async fn list_movements(
        &self,
        operator: &OperatorContext,
        page: u32,
        page_size: u32,
    ) -> ApiResult<MovementPage> {
        let url = self.endpoint(&["Movimientos-inventario"])?;
        debug!(page, page_size, "fetching inventory movements");
        let req = self
            .http
            .get(url)
            .query(&[("page", page), ("pageSize", page_size)]);
        self.get_json(Self::with_operator(req, operator)).await
    }

    async fn get_usage_request(&self, request_id: i64) -> ApiResult<UsageRequest> {
        let id = request_id.to_string();
        let url = self.endpoint(&["solicitudes-uso", &id])?;
        self.get_json(self.http.get(url)).await
    }

    async fn return_supplies(
        &self,
        operator: &OperatorContext,
        request_id: i64,
        payload: &ReturnPayload,
        idempotency_key: &str,
    ) -> ApiResult<()> {
        let id = request_id.to_string();
        let url = self.endpoint(&["solicitudes-uso", &id, "devolver"])?;
        let req = self
            .http
            .post(url)
            .header(IDEMPOTENCY_HEADER, idempotency_key)
            .json(payload);
        // Body is informational only; an empty 200 is a success.
        self.execute(Self::with_operator(req, operator)).await?;
        Ok(())
    }

    async fn list_usage_requests(
        &self,
        operator: &OperatorContext,
    ) -> ApiResult<Vec<UsageRequest>> {
        let url = self.endpoint(&["solicitudes-uso"])?;
        self.get_json(Self::with_operator(self.http.get(url), operator))
            .await
    }

    async fn update_request_status(
        &self,
        operator: &OperatorContext,
        request_id: i64,
        status: RequestStatus,
    ) -> ApiResult<()> {
        let id = request_id.to_string();
        let url = self.endpoint(&["solicitudes-uso", &id, "estado"])?;
        let req = self.http.put(url).json(&StatusUpdate { estado: status });
        self.execute(Self::with_operator(req, operator)).await?;
        Ok(())
    }

    async fn list_alerts(&self) -> ApiResult<Vec<Alert>> {
        let url = self.endpoint(&["alertas"])?;
        self.get_json(self.http.get(url)).await
    }

    async fn supplies_at_location(&self, location_code: &str) -> ApiResult<Vec<LocatedSupply>> {
        let url = self.endpoint(&["insumos", "ubicacion", location_code])?;
        self.get_json(self.http.get(url)).await
    }

    async fn top_teachers(&self) -> ApiResult<Vec<TeacherRanking>> {
        let url = self.endpoint(&["top-docentes-laboratorios"])?;
        self.get_json(self.http.get(url)).await
    }
}
