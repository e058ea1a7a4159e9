use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use super::page;
use super::AppState;
use crate::error::InspectError;
use crate::inspect::{InspectionReport, InspectionRequest, ProductInfo};

/// Error returned from the JSON endpoints.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_input",
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            message: message.into(),
        }
    }
}

impl From<InspectError> for ApiError {
    fn from(err: InspectError) -> Self {
        let status = match err {
            InspectError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            InspectError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            InspectError::Classification(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.kind,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

/// Same failure, rendered as an HTML page for the browser form.
pub struct PageError(ApiError);

impl From<ApiError> for PageError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        (self.0.status, Html(page::render_error(&self.0.message))).into_response()
    }
}

fn parse_optional<T: std::str::FromStr>(field: &str, value: &str) -> Result<Option<T>, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| ApiError::bad_request(format!("{} must be a number, got '{}'", field, value)))
}

/// Collect the uploads and product fields from a multipart form.
///
/// Unknown fields are ignored. Missing photos are left empty so the
/// inspection reports them per slot.
pub async fn read_form(mut multipart: Multipart) -> Result<InspectionRequest, ApiError> {
    let mut request = InspectionRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed form: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "front" | "side" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read {}: {}", name, e)))?;
                if name == "front" {
                    request.front = bytes.to_vec();
                } else {
                    request.side = bytes.to_vec();
                }
            }
            "product_name" | "base_price" | "usage_years" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read {}: {}", name, e)))?;
                apply_product_field(&mut request.product, &name, &text)?;
            }
            _ => tracing::debug!(field = %name, "Ignoring unknown form field"),
        }
    }

    Ok(request)
}

fn apply_product_field(product: &mut ProductInfo, name: &str, value: &str) -> Result<(), ApiError> {
    match name {
        "product_name" => {
            let value = value.trim();
            product.name = (!value.is_empty()).then(|| value.to_string());
        }
        "base_price" => {
            let price: Option<f64> = parse_optional(name, value)?;
            if matches!(price, Some(p) if !p.is_finite() || p < 0.0) {
                return Err(ApiError::bad_request("base_price must be a non-negative number"));
            }
            product.base_price = price;
        }
        "usage_years" => {
            let years: Option<f32> = parse_optional(name, value)?;
            if matches!(years, Some(y) if !y.is_finite() || y < 0.0) {
                return Err(ApiError::bad_request("usage_years must be a non-negative number"));
            }
            product.usage_years = years;
        }
        _ => {}
    }
    Ok(())
}

/// Inference is CPU-bound, so it runs on the blocking pool.
async fn run_inspection(state: &AppState, request: InspectionRequest) -> Result<InspectionReport, ApiError> {
    let inspector = Arc::clone(&state.inspector);
    tokio::task::spawn_blocking(move || inspector.inspect(&request))
        .await
        .map_err(|e| ApiError::internal(format!("inspection task failed: {}", e)))?
        .map_err(ApiError::from)
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let encoder = state.inspector.encoder();
    Html(page::render_index(encoder.name(), encoder.is_ready()))
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let encoder = state.inspector.encoder();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "encoder": encoder.name(),
        "model_ready": encoder.is_ready(),
    }))
}

pub async fn inspect_api(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<InspectionReport>, ApiError> {
    let request = read_form(multipart?).await?;
    let report = run_inspection(&state, request).await?;
    Ok(Json(report))
}

pub async fn inspect_page(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, PageError> {
    let multipart = multipart.map_err(ApiError::from)?;
    let request = read_form(multipart).await?;
    let report = run_inspection(&state, request).await?;
    Ok(Html(page::render_report(&report)))
}
