//! Axum router configuration with middleware.
//!
//! Routes:
//! - `POST /chat`, `GET /chat/{chat_id}`: turn submission and transcripts
//! - `GET /`, `GET /health`: unauthenticated liveness
//!
//! Middleware: CORS, request tracing.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(handlers::chat::submit_turn))
        .route("/chat/{chat_id}", get(handlers::chat::get_transcript))
        .route("/", get(root))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET / - Welcome message.
async fn root() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "message": "Welcome to the Entangle chat API",
    }))
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use entangle_core::llm::box_provider::BoxLlmProvider;
    use entangle_core::testing::ScriptedProvider;
    use entangle_infra::sqlite::pool::DatabasePool;
    use entangle_types::config::{ApiKeyEntry, AuthConfig, GlobalConfig};
    use entangle_types::llm::LlmError;

    use crate::http::extractors::auth::hash_api_key;

    async fn test_state(provider: ScriptedProvider, auth: AuthConfig) -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        let pool = DatabasePool::new(&url).await.unwrap();

        let config = GlobalConfig {
            auth,
            ..GlobalConfig::default()
        };
        AppState::new(pool, BoxLlmProvider::new(provider), config)
    }

    fn post_chat(body: Value, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header("authorization", format!("Bearer {key}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn senders_and_contents(body: &Value) -> Vec<(String, String)> {
        body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| {
                (
                    m["sender_id"].as_str().unwrap().to_string(),
                    m["content"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    fn pair(sender: &str, content: &str) -> (String, String) {
        (sender.to_string(), content.to_string())
    }

    #[tokio::test]
    async fn test_health_and_root() {
        let router = build_router(
            test_state(ScriptedProvider::replying("unused"), AuthConfig::default()).await,
        );

        let (status, body) = send(&router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&router, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("Welcome"));
    }

    #[tokio::test]
    async fn test_submit_turn_returns_transcript() {
        let router = build_router(
            test_state(ScriptedProvider::replying("hi there"), AuthConfig::default()).await,
        );

        let (status, body) = send(
            &router,
            post_chat(json!({"chat_id": "c1", "sender_id": "u1", "content": "hello"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chat_id"], "c1");
        assert_eq!(
            senders_and_contents(&body),
            vec![pair("u1", "hello"), pair("ai", "hi there")]
        );
        assert!(body["messages"][0]["created_at"].is_string());

        let (status, reread) = send(&router, get("/chat/c1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reread, body);
    }

    #[tokio::test]
    async fn test_upstream_timeout_reports_chat_and_keeps_user_message() {
        let router = build_router(
            test_state(
                ScriptedProvider::failing(|| LlmError::Timeout(Duration::from_secs(60))),
                AuthConfig::default(),
            )
            .await,
        );

        let (status, body) = send(
            &router,
            post_chat(json!({"chat_id": "c1", "sender_id": "u1", "content": "hello"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error_kind"], "upstream_timeout");
        assert_eq!(body["chat_id"], "c1");

        let (status, body) = send(&router, get("/chat/c1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(senders_and_contents(&body), vec![pair("u1", "hello")]);
    }

    #[tokio::test]
    async fn test_upstream_unavailable_is_bad_gateway() {
        let router = build_router(
            test_state(
                ScriptedProvider::failing(|| LlmError::Unavailable("connection refused".into())),
                AuthConfig::default(),
            )
            .await,
        );

        let (status, body) = send(
            &router,
            post_chat(json!({"chat_id": "c9", "sender_id": "u1", "content": "hello"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error_kind"], "upstream_unavailable");
        assert_eq!(body["chat_id"], "c9");
    }

    #[tokio::test]
    async fn test_unknown_chat_is_not_found() {
        let router = build_router(
            test_state(ScriptedProvider::replying("unused"), AuthConfig::default()).await,
        );

        let (status, body) = send(&router, get("/chat/unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_kind"], "not_found");
        assert_eq!(body["chat_id"], "unknown");
    }

    #[tokio::test]
    async fn test_empty_content_is_rejected_without_side_effects() {
        let router = build_router(
            test_state(ScriptedProvider::replying("unused"), AuthConfig::default()).await,
        );

        let (status, body) = send(
            &router,
            post_chat(json!({"chat_id": "c1", "sender_id": "u1", "content": ""}), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_kind"], "invalid_input");
        assert_eq!(body["chat_id"], "c1");

        let (status, _) = send(&router, get("/chat/c1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &router,
            post_chat(json!({"chat_id": "", "sender_id": "u1", "content": "hi"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["chat_id"].is_null());
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_input() {
        let router = build_router(
            test_state(ScriptedProvider::replying("unused"), AuthConfig::default()).await,
        );

        for body in [
            json!({"chat_id": "c1", "sender_id": "u1"}),
            json!({"chat_id": "c1", "sender_id": "u1", "content": "hi", "extra": true}),
            json!({"chat_id": 7, "sender_id": "u1", "content": "hi"}),
        ] {
            let (status, response) = send(&router, post_chat(body, None)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(response["error_kind"], "invalid_input");
        }
    }

    #[tokio::test]
    async fn test_auth_binds_sender_to_principal() {
        let auth = AuthConfig {
            keys: vec![ApiKeyEntry {
                principal: "u1".to_string(),
                key_sha256: hash_api_key("k-u1"),
            }],
        };
        let router = build_router(test_state(ScriptedProvider::replying("ok"), auth).await);
        let turn = json!({"chat_id": "c1", "sender_id": "u1", "content": "hello"});

        let (status, body) = send(&router, post_chat(turn.clone(), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_kind"], "unauthorized");

        let (status, _) = send(&router, post_chat(turn.clone(), Some("wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let impersonation = json!({"chat_id": "c1", "sender_id": "u2", "content": "hello"});
        let (status, body) = send(&router, post_chat(impersonation, Some("k-u1"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error_kind"], "forbidden");

        let (status, _) = send(&router, post_chat(turn, Some("k-u1"))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&router, get("/chat/c1")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
