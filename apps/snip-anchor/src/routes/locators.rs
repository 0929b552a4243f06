//! Locator API routes

use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use snip_anchor::locator::{self, SourceLocator};
use snip_anchor::snippet::normalize_whitespace;

use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EncodeRequest {
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Serialize)]
pub struct EncodeResponse {
    pub locator: String,
}

#[derive(Debug, Deserialize)]
pub struct DecodeRequest {
    pub locator: String,
}

#[derive(Debug, Serialize)]
pub struct DecodeResponse {
    pub snippet: Option<String>,
    /// Locator with its text directive removed
    pub address: String,
}

/// Create the locators router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(encode_locator))
        .route("/decode", post(decode_locator))
}

/// Build a locator for a snippet on a page
async fn encode_locator(Json(request): Json<EncodeRequest>) -> Result<Json<EncodeResponse>> {
    if normalize_whitespace(&request.snippet).is_empty() {
        return Err(AppError::BadRequest("snippet must not be empty".to_string()));
    }
    let locator = locator::encode(&request.url, &request.snippet);
    Ok(Json(EncodeResponse { locator }))
}

/// Recover the snippet named by a locator
async fn decode_locator(Json(request): Json<DecodeRequest>) -> Json<DecodeResponse> {
    let parsed = SourceLocator::parse(&request.locator);
    Json(DecodeResponse {
        snippet: parsed.text,
        address: parsed.address,
    })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::config::Config;
    use crate::routes::{self, testing::post_json};
    use crate::state::AppState;

    fn app() -> axum::Router {
        routes::router(AppState::new(Config::default()))
    }

    #[tokio::test]
    async fn test_encode_locator() {
        let (status, body) = post_json(
            app(),
            "/api/v1/locators",
            json!({ "url": "https://ex.com/p#section1", "snippet": "  hello \n world " }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["locator"], "https://ex.com/p#section1&:~:text=hello%20world");
    }

    #[tokio::test]
    async fn test_encode_rejects_blank_snippet() {
        let (status, body) = post_json(
            app(),
            "/api/v1/locators",
            json!({ "url": "https://ex.com/p", "snippet": " \t " }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_decode_locator() {
        let (status, body) = post_json(
            app(),
            "/api/v1/locators/decode",
            json!({ "locator": "https://ex.com/p#section1&:~:text=hello%20world" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["snippet"], "hello world");
        assert_eq!(body["address"], "https://ex.com/p#section1");
    }

    #[tokio::test]
    async fn test_decode_without_directive() {
        let (status, body) = post_json(
            app(),
            "/api/v1/locators/decode",
            json!({ "locator": "https://ex.com/p" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["snippet"].is_null());
        assert_eq!(body["address"], "https://ex.com/p");
    }
}
