//! HTTP route definitions

use axum::{
    extract::{Extension, Path, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use tracing::debug;
use uuid::Uuid;

use crate::app::AppState;
use crate::game::GameVariant;
use crate::http::middleware::{require_auth, AuthenticatedUser};
use crate::store::stats::UserStats;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws/:variant/:session_id", get(ws_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/games/:variant/session", post(create_session_handler))
        .route("/games/score", post(submit_score_handler))
        .route("/games/stats", get(stats_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct VariantHealth {
    sessions: usize,
    connections: usize,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    voice: VariantHealth,
    gesture: VariantHealth,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let counts = |variant| {
        let registry = state.sessions(variant);
        VariantHealth {
            sessions: registry.session_count(),
            connections: registry.connection_count(),
        }
    };

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        voice: counts(GameVariant::Voice),
        gesture: counts(GameVariant::Gesture),
    })
}

// ============================================================================
// Session endpoints
// ============================================================================

#[derive(Serialize)]
struct CreateSessionResponse {
    session_id: Uuid,
    variant: GameVariant,
    websocket_url: String,
    created_at: DateTime<Utc>,
}

async fn create_session_handler(
    State(state): State<AppState>,
    Path(variant): Path<GameVariant>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    debug!(
        user_id = %auth.user_id,
        email = ?auth.claims.email,
        variant = %variant,
        "Session requested"
    );
    let session = state.sessions(variant).open(auth.user_id);

    let websocket_url = format!(
        "{}/ws/{}/{}",
        state.config.websocket_base_url(),
        variant,
        session.session_id
    );

    Ok(Json(CreateSessionResponse {
        session_id: session.session_id,
        variant,
        websocket_url,
        created_at: session.created_at,
    }))
}

// ============================================================================
// Score endpoints
// ============================================================================

fn default_game_type() -> GameVariant {
    GameVariant::Voice
}

#[derive(Deserialize)]
struct SubmitScoreRequest {
    #[serde(default = "default_game_type")]
    game_type: GameVariant,
    #[serde(default)]
    score: u32,
}

#[derive(Serialize)]
struct SubmitScoreResponse {
    success: bool,
    is_high_score: bool,
    high_score: u32,
    total_games: u32,
    average_score: f64,
}

async fn submit_score_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(req): Json<SubmitScoreRequest>,
) -> Json<SubmitScoreResponse> {
    debug!(user_id = %auth.user_id, variant = %req.game_type, score = req.score, "Score submitted");
    let outcome = state.stats.record_score(auth.user_id, req.game_type, req.score);

    Json(SubmitScoreResponse {
        success: true,
        is_high_score: outcome.is_high_score,
        high_score: outcome.stats.high_score,
        total_games: outcome.stats.total_games,
        average_score: outcome.stats.average_score,
    })
}

#[derive(Serialize)]
struct StatsResponse {
    stats: UserStats,
}

async fn stats_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Json<StatsResponse> {
    Json(StatsResponse {
        stats: state.stats.get_stats(auth.user_id),
    })
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::test_config;
    use crate::http::middleware::{sign_test_token, JwtClaims};
    use crate::util::time::unix_secs;

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn bearer(secret: &str, user_id: Uuid) -> String {
        let claims = JwtClaims {
            sub: user_id,
            exp: unix_secs() + 3600,
            iat: unix_secs(),
            email: None,
        };
        format!("Bearer {}", sign_test_token(&claims, secret))
    }

    #[tokio::test]
    async fn test_health_reports_sessions() {
        let state = AppState::new(test_config());
        state.sessions(GameVariant::Gesture).get(&Uuid::new_v4());
        let router = build_router(state);

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["voice"]["sessions"], 0);
        assert_eq!(body["gesture"]["sessions"], 1);
        assert_eq!(body["gesture"]["connections"], 0);
    }

    #[tokio::test]
    async fn test_create_session() {
        let state = AppState::new(test_config());
        let user_id = Uuid::new_v4();
        let router = build_router(state.clone());

        let response = router
            .oneshot(
                Request::post("/games/gesture/session")
                    .header(header::AUTHORIZATION, bearer("test-secret", user_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["variant"], "gesture");

        let session_id: Uuid = body["session_id"].as_str().unwrap().parse().unwrap();
        assert_eq!(
            body["websocket_url"],
            format!("wss://games.example.com/ws/gesture/{}", session_id)
        );

        let info = state.sessions(GameVariant::Gesture).info(&session_id).unwrap();
        assert_eq!(info.owner, Some(user_id));
        assert!(state.sessions(GameVariant::Voice).info(&session_id).is_none());
    }

    #[tokio::test]
    async fn test_create_session_requires_auth() {
        let state = AppState::new(test_config());
        let router = build_router(state.clone());

        let response = router
            .clone()
            .oneshot(Request::post("/games/voice/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .oneshot(
                Request::post("/games/voice/session")
                    .header(header::AUTHORIZATION, bearer("wrong-secret", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(state.sessions(GameVariant::Voice).session_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_variant_rejected() {
        let router = build_router(AppState::new(test_config()));

        let response = router
            .oneshot(
                Request::post("/games/chess/session")
                    .header(header::AUTHORIZATION, bearer("test-secret", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let response = AppError::Conflict("busy".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    fn post_score(token: &str, body: &str) -> Request<Body> {
        Request::post("/games/score")
            .header(header::AUTHORIZATION, token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_score_tracks_high_score() {
        let router = build_router(AppState::new(test_config()));
        let token = bearer("test-secret", Uuid::new_v4());

        let response = router
            .clone()
            .oneshot(post_score(&token, r#"{"game_type":"gesture","score":50}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["is_high_score"], true);
        assert_eq!(body["high_score"], 50);
        assert_eq!(body["total_games"], 1);

        let response = router
            .oneshot(post_score(&token, r#"{"game_type":"gesture","score":20}"#))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["is_high_score"], false);
        assert_eq!(body["high_score"], 50);
        assert_eq!(body["total_games"], 2);
        assert_eq!(body["average_score"], 35.0);
    }

    #[tokio::test]
    async fn test_stats_cover_both_variants() {
        let state = AppState::new(test_config());
        let user_id = Uuid::new_v4();
        let token = bearer("test-secret", user_id);
        state.stats.record_score(user_id, GameVariant::Voice, 30);
        let router = build_router(state);

        let response = router
            .oneshot(
                Request::get("/games/stats")
                    .header(header::AUTHORIZATION, token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["stats"]["voice"]["high_score"], 30);
        assert_eq!(body["stats"]["voice"]["total_games"], 1);
        assert!(body["stats"]["voice"]["last_played"].is_string());
        assert_eq!(body["stats"]["gesture"]["total_games"], 0);
        assert!(body["stats"]["gesture"]["last_played"].is_null());
    }

    #[tokio::test]
    async fn test_score_defaults_to_voice_and_requires_auth() {
        let state = AppState::new(test_config());
        let user_id = Uuid::new_v4();
        let router = build_router(state.clone());

        let response = router
            .clone()
            .oneshot(post_score("Bearer nope", r#"{"score":10}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .oneshot(post_score(&bearer("test-secret", user_id), r#"{"score":10}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.stats.get_stats(user_id).voice.high_score, 10);
    }
}
