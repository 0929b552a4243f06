//! Anchoring API routes
//!
//! Runs the anchoring scheduler over a submitted XHTML document and returns
//! the marked-up result.

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use snip_anchor::anchoring::{self, AnchorOutcome, AnchoringSession};
use snip_anchor::document::{Marker, XhtmlDocument};
use snip_anchor::locator;
use snip_anchor::snippet::Snippet;

use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorRequest {
    pub html: String,
    /// Literal snippet; takes precedence over `locator`
    pub snippet: Option<String>,
    pub locator: Option<String>,
    /// Override the configured native-highlight detection
    pub detect_native: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorResponse {
    pub outcome: &'static str,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    pub html: String,
}

/// Create the anchor router
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(anchor_document))
}

/// Anchor a snippet in a document
async fn anchor_document(
    State(state): State<AppState>,
    Json(request): Json<AnchorRequest>,
) -> Result<Json<AnchorResponse>> {
    let (snippet, from_locator) = resolve_snippet(request.snippet, request.locator)?;

    let mut options = state
        .anchor_options()
        .with_case_insensitive_fallback(from_locator);
    if let Some(detect) = request.detect_native {
        options = options.with_native_detection(detect);
    }

    let document = Arc::new(Mutex::new(XhtmlDocument::parse(&request.html)?));
    let session = Arc::new(AnchoringSession::new(snippet));
    tracing::debug!(session_id = %session.id(), from_locator, "Anchoring request");

    let outcome = anchoring::anchor(Arc::clone(&document), Arc::clone(&session), options)
        .finished()
        .await;

    let marker = match &outcome {
        AnchorOutcome::Marked(marker) | AnchorOutcome::AlreadyMarked(marker) => {
            Some(marker.clone())
        }
        _ => None,
    };
    let html = document.lock().to_html();

    Ok(Json(AnchorResponse {
        outcome: outcome.as_str(),
        attempts: session.attempts(),
        marker,
        html,
    }))
}

/// Pick the snippet to anchor; the flag is set when it came from a locator
fn resolve_snippet(snippet: Option<String>, locator: Option<String>) -> Result<(Snippet, bool)> {
    if let Some(snippet) = snippet.and_then(Snippet::new) {
        return Ok((snippet, false));
    }

    match locator {
        Some(locator) => locator::decode(&locator)
            .and_then(Snippet::new)
            .map(|snippet| (snippet, true))
            .ok_or_else(|| AppError::BadRequest("locator carries no text directive".to_string())),
        None => Err(AppError::BadRequest(
            "either snippet or locator is required".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::config::{AnchorConfig, Config};
    use crate::routes::{self, testing::post_json};
    use crate::state::AppState;

    fn app() -> axum::Router {
        let config = Config {
            anchor: AnchorConfig {
                initial_delay_ms: 0,
                retry_interval_ms: 10,
                max_attempts: 3,
                detect_native: true,
            },
            ..Config::default()
        };
        routes::router(AppState::new(config))
    }

    #[tokio::test]
    async fn test_anchor_marks_snippet() {
        let (status, body) = post_json(
            app(),
            "/api/v1/anchor",
            json!({
                "html": "<body><p>...The <b>quick</b> brown fox jumps...</p></body>",
                "snippet": "The quick brown fox"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "marked");
        assert_eq!(body["attempts"], 1);
        assert_eq!(body["marker"]["text"], "The quick brown fox");
        let html = body["html"].as_str().unwrap();
        assert_eq!(html.matches("<mark").count(), 1);
        assert!(html.contains("The <b>quick</b> brown fox</mark> jumps...</p>"));
    }

    #[tokio::test]
    async fn test_anchor_detect_native_override() {
        let html = "<body><p>...The quick brown fox jumps...</p></body>";

        let (_, body) = post_json(
            app(),
            "/api/v1/anchor",
            json!({ "html": html, "snippet": "The quick brown fox" }),
        )
        .await;
        assert_eq!(body["outcome"], "native_highlight");
        assert_eq!(body["attempts"], 0);
        assert!(!body["html"].as_str().unwrap().contains("<mark"));

        let (_, body) = post_json(
            app(),
            "/api/v1/anchor",
            json!({ "html": html, "snippet": "The quick brown fox", "detectNative": false }),
        )
        .await;
        assert_eq!(body["outcome"], "marked");
    }

    #[tokio::test]
    async fn test_anchor_from_locator_ignores_case() {
        let (status, body) = post_json(
            app(),
            "/api/v1/anchor",
            json!({
                "html": "<body><p>Chapter: Hello World</p></body>",
                "locator": "https://ex.com/p#:~:text=hello%20world"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "marked");
        assert_eq!(body["marker"]["text"], "Hello World");
    }

    #[tokio::test]
    async fn test_anchor_exhausted() {
        let (status, body) = post_json(
            app(),
            "/api/v1/anchor",
            json!({ "html": "<body><p>unrelated</p></body>", "snippet": "missing" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "exhausted");
        assert_eq!(body["attempts"], 3);
        assert!(body.get("marker").is_none());
        assert_eq!(body["html"], "<body><p>unrelated</p></body>");
    }

    #[tokio::test]
    async fn test_anchor_requires_snippet_or_locator() {
        let (status, body) = post_json(
            app(),
            "/api/v1/anchor",
            json!({ "html": "<body></body>", "snippet": "   " }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");

        let (status, _) = post_json(
            app(),
            "/api/v1/anchor",
            json!({ "html": "<body></body>", "locator": "https://ex.com/p" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_anchor_rejects_unparsable_html() {
        let (status, body) = post_json(
            app(),
            "/api/v1/anchor",
            json!({ "html": "<body><p>text</p><!-- never closed", "snippet": "text" }),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "parse_error");
    }
}
