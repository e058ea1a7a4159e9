//! HTTP front end: an upload form, an HTML report and a JSON API.

mod handlers;
mod page;

pub use handlers::ApiError;
pub use page::escape_html;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::inspect::Inspector;

#[derive(Clone)]
pub struct AppState {
    pub inspector: Arc<Inspector>,
}

impl AppState {
    pub fn new(inspector: Inspector) -> Self {
        Self {
            inspector: Arc::new(inspector),
        }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/inspect", post(handlers::inspect_page))
        .route("/api/inspect", post(handlers::inspect_api))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: AppState, bind_address: &str, max_upload_bytes: usize) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!(address = %bind_address, "Listening");

    axum::serve(listener, router(state, max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::clip::testing::{color_config, color_encoder, png_bytes, striped};
    use crate::error::InspectError;
    use crate::explain::PlaceholderExplainer;

    const BOUNDARY: &str = "pricelens-test-boundary";

    fn app_with(encoder: crate::clip::testing::StubEncoder) -> Router {
        let config = color_config();
        let inspector = Inspector::new(
            Arc::new(encoder),
            Arc::new(PlaceholderExplainer::new("placeholder explanation")),
            &config,
        );
        router(AppState::new(inspector), config.server.max_upload_bytes)
    }

    fn app() -> Router {
        app_with(color_encoder())
    }

    enum Part<'a> {
        File(&'a str, Vec<u8>),
        Text(&'a str, &'a str),
    }

    fn multipart_body(parts: &[Part]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::File(name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}.png\"\r\nContent-Type: image/png\r\n\r\n",
                            name, name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}", name, value).as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn post_form(uri: &str, parts: &[Part]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    fn photos() -> Vec<Part<'static>> {
        vec![
            Part::File("front", png_bytes(&striped([255, 0, 0], 64, 64, 2))),
            Part::File("side", png_bytes(&striped([0, 255, 0], 96, 64, 5))),
        ]
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["encoder"], "stub");
        assert_eq!(json["model_ready"], true);
    }

    #[tokio::test]
    async fn test_index_serves_form() {
        let response = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("<form"));
    }

    #[tokio::test]
    async fn test_api_rejects_non_multipart() {
        let request = Request::post("/api/inspect")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_api_inspects_both_photos() {
        let mut parts = photos();
        parts.push(Part::Text("product_name", "Test car"));
        parts.push(Part::Text("base_price", "1000"));
        parts.push(Part::Text("usage_years", "1"));

        let response = app().oneshot(post_form("/api/inspect", &parts)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["adjustment"]["applied"], true);
        assert_eq!(json["images"][0]["slot"], "front");
        assert_eq!(json["images"][0]["status"], "inspected");
        assert_eq!(json["images"][0]["view"]["label"], "front");
        assert_eq!(json["images"][1]["view"]["label"], "side");
        assert_eq!(json["product"]["name"], "Test car");
        assert!(json["quote"]["suggested_price"].as_f64().unwrap() > 0.0);
        assert_eq!(json["explanation"], "placeholder explanation");
    }

    #[tokio::test]
    async fn test_api_form_without_photos() {
        let parts = [Part::Text("product_name", "Test car")];
        let response = app().oneshot(post_form("/api/inspect", &parts)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["adjustment"]["applied"], false);
        assert_eq!(json["adjustment"]["price_multiplier"], 1.0);
        assert_eq!(json["images"][0]["status"], "failed");
        assert_eq!(json["images"][1]["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn test_api_rejects_bad_price() {
        let mut parts = photos();
        parts.push(Part::Text("base_price", "a lot"));

        let response = app().oneshot(post_form("/api/inspect", &parts)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_api_model_unavailable() {
        let encoder = color_encoder().failing_with(InspectError::ModelLoad("no weights".into()));
        let response = app_with(encoder)
            .oneshot(post_form("/api/inspect", &photos()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["error"], "model_load");
    }

    #[tokio::test]
    async fn test_page_reports_failed_side() {
        let parts = vec![
            Part::File("front", png_bytes(&striped([255, 0, 0], 64, 64, 2))),
            Part::File("side", b"not an image".to_vec()),
        ];
        let response = app().oneshot(post_form("/inspect", &parts)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_string(response).await;
        assert!(html.contains("Inspection report"));
        assert!(html.contains("Failed:"));
        assert!(html.contains("no adjustment applied"));
    }
}
