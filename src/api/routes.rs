use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::websocket::{websocket_handler, WsState};

use super::handlers::*;
use super::openapi::ApiDoc;

/// Create the API router with Swagger UI and WebSocket support
pub fn create_router(state: EngineState, ws_state: Arc<WsState>) -> Router {
    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // WebSocket endpoint
        .route("/ws", get(websocket_handler))
        .with_state(ws_state)
        // Simulation control endpoints
        .route("/api/simulation/mode", post(set_simulation_mode))
        .route("/api/simulation/jump", post(jump_simulation))
        .route("/api/simulation/status", get(get_simulation_status))
        // Quote and health endpoints
        .route("/api/quotes", get(get_quotes))
        .route("/api/health", get(health_check))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QuoteCache;
    use crate::config::EngineConfig;
    use crate::models::ActiveSourceKind;
    use crate::pipeline::QuotePipeline;
    use crate::simulation::SimulationController;
    use crate::websocket::Broadcaster;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn engine_state() -> EngineState {
        let cache = QuoteCache::new();
        let broadcaster = Broadcaster::new();
        let (pipeline, tick_tx) = QuotePipeline::new(
            cache.clone(),
            broadcaster,
            None,
            "INR".to_string(),
        );
        let controller = SimulationController::new(
            EngineConfig::default(),
            vec!["TCS.NS".to_string()],
            cache.clone(),
            tick_tx,
        );
        EngineState {
            controller,
            cache,
            pipeline: Arc::new(pipeline),
        }
    }

    fn router(state: EngineState) -> Router {
        let ws_state = Arc::new(WsState {
            broadcaster: Broadcaster::new(),
            cache: state.cache.clone(),
        });
        create_router(state, ws_state)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_bogus_mode_returns_400_and_leaves_mode_unchanged() {
        let state = engine_state();
        let app = router(state.clone());

        let response = app
            .oneshot(post_json("/api/simulation/mode", r#"{"mode":"BOGUS"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let status = state.controller.status().await;
        assert_eq!(status.active_source, ActiveSourceKind::Idle);
        assert_eq!(status.mode, None);
    }

    #[tokio::test]
    async fn test_unparseable_jump_date_returns_400() {
        let state = engine_state();
        let app = router(state.clone());

        let response = app
            .oneshot(post_json("/api/simulation/jump", r#"{"date":"yesterday"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let status = state.controller.status().await;
        assert_eq!(status.active_source, ActiveSourceKind::Idle);
    }

    #[tokio::test]
    async fn test_set_mode_gbm_succeeds() {
        let state = engine_state();
        let app = router(state.clone());

        let response = app
            .oneshot(post_json("/api/simulation/mode", r#"{"mode":"GBM"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let status = state.controller.status().await;
        assert_eq!(status.active_source, ActiveSourceKind::Simulated);
    }

    #[tokio::test]
    async fn test_quotes_and_health_endpoints() {
        let state = engine_state();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/quotes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
