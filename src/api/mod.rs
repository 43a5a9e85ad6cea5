//! REST API endpoints.
//!
//! Axum-based HTTP API for querying player statistics, pairwise records,
//! team match-ups, and the settled dashboard snapshot.

pub mod routes;
pub mod state;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if let ApiError::Internal(message) = &self {
            tracing::error!("Request failed: {}", message);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Build the API router. `cors_origin` is either `*` or a single origin.
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let cors = match cors_origin {
        "*" => cors.allow_origin(Any),
        origin => match HeaderValue::from_str(origin) {
            Ok(origin) => cors.allow_origin(origin),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                cors
            }
        },
    };

    Router::new()
        .route("/api/overview", get(routes::dashboard::overview))
        .route("/api/dashboard", get(routes::dashboard::dashboard))
        .route("/api/filter", post(routes::dashboard::set_filter))
        .route("/api/players", get(routes::players::list_players))
        .route("/api/players/:id", get(routes::players::get_player))
        .route("/api/head-to-head", get(routes::head_to_head::matrix))
        .route("/api/head-to-head/:a/:b", get(routes::head_to_head::pair))
        .route("/api/teams/compare", get(routes::teams::compare))
        .route("/api/teams/suggest", get(routes::teams::suggest))
        .route("/api/refresh", post(routes::refresh::start_refresh))
        .route("/api/refresh/status", get(routes::refresh::status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Pagination parameters.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 50,
        }
    }
}

impl Pagination {
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(50).clamp(1, 100),
        }
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1) * self.page_size
    }
}

/// Pagination metadata in responses.
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub page_size: u32,
    pub total_items: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(pagination: &Pagination, total_items: u32) -> Self {
        let total_pages = total_items.div_ceil(pagination.page_size);
        Self {
            page: pagination.page,
            page_size: pagination.page_size,
            total_items,
            total_pages,
            has_next: pagination.page < total_pages,
            has_prev: pagination.page > 1,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_default() {
        let p = Pagination::default();
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, 50);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_pagination_new() {
        let p = Pagination::new(Some(3), Some(25));
        assert_eq!(p.page, 3);
        assert_eq!(p.page_size, 25);
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn test_pagination_bounds() {
        // Page can't be 0
        let p = Pagination::new(Some(0), Some(50));
        assert_eq!(p.page, 1);

        // Page size max is 100
        let p = Pagination::new(Some(1), Some(200));
        assert_eq!(p.page_size, 100);
    }

    #[test]
    fn test_pagination_meta() {
        let p = Pagination::new(Some(2), Some(10));
        let meta = PaginationMeta::new(&p, 25);

        assert_eq!(meta.page, 2);
        assert_eq!(meta.total_items, 25);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn test_pagination_meta_first_page() {
        let p = Pagination::new(Some(1), Some(10));
        let meta = PaginationMeta::new(&p, 25);

        assert!(!meta.has_prev);
        assert!(meta.has_next);
    }

    #[test]
    fn test_pagination_meta_last_page() {
        let p = Pagination::new(Some(3), Some(10));
        let meta = PaginationMeta::new(&p, 25);

        assert!(meta.has_prev);
        assert!(!meta.has_next);
    }

    // ── Router Tests ─────────────────────────────────────────────

    use super::test_support::*;
    use crate::calculate::filter::fixtures::*;

    #[tokio::test]
    async fn test_players_list_paged() {
        let app = build_router(test_state(three_matches()), "*");
        let (status, json) = get_json(app, "/api/players?page=1&page_size=3").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["players"].as_array().map(Vec::len), Some(3));
        assert_eq!(json["pagination"]["total_items"], 4);
        assert_eq!(json["pagination"]["has_next"], true);
    }

    #[tokio::test]
    async fn test_players_search() {
        let app = build_router(test_state(three_matches()), "*");
        let (status, json) = get_json(app, "/api/players?q=c").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["players"][0]["playerId"], "c");
        assert_eq!(json["players"][0]["losses"], 3);
        assert_eq!(json["pagination"]["total_items"], 1);
    }

    #[tokio::test]
    async fn test_player_detail() {
        let app = build_router(test_state(three_matches()), "*");
        let (status, json) = get_json(app, "/api/players/a").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["player"]["wins"], 2);
        assert_eq!(json["player"]["losses"], 1);
        assert_eq!(json["head_to_head"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_player_not_found() {
        let app = build_router(test_state(three_matches()), "*");
        let (status, json) = get_json(app, "/api/players/zed").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_players_window() {
        let app = build_router(test_state(three_matches()), "*");
        let (status, json) = get_json(app, "/api/players/a?to=2025-09-01").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["player"]["totalMatches"], 1);
    }

    #[tokio::test]
    async fn test_head_to_head_pair() {
        let app = build_router(test_state(three_matches()), "*");
        let (status, json) = get_json(app, "/api/head-to-head/a/b").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["matchesWithBoth"], 3);
        assert_eq!(json["player1WinsWithPlayer2"], 1);
        assert_eq!(json["player1WinsAgainstPlayer2"], 1);
        assert_eq!(json["player1LossesAgainstPlayer2"], 1);
    }

    #[tokio::test]
    async fn test_head_to_head_pair_same_player() {
        let app = build_router(test_state(three_matches()), "*");
        let (status, _) = get_json(app, "/api/head-to-head/a/a").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_head_to_head_matrix_selected() {
        let app = build_router(test_state(three_matches()), "*");
        let (status, json) = get_json(app, "/api/head-to-head?ids=a,b,unknown").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["players"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["matrix"]["b"]["a"]["player1WinsAgainstPlayer2"], 1);
    }

    #[tokio::test]
    async fn test_head_to_head_matrix_default() {
        let app = build_router(test_state(three_matches()), "*");
        let (status, json) = get_json(app, "/api/head-to-head").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["players"].as_array().map(Vec::len), Some(4));
        assert_eq!(json["players"][3]["playerId"], "c");
    }

    #[tokio::test]
    async fn test_teams_compare() {
        let app = build_router(test_state(three_matches()), "*");
        let (status, json) = get_json(app, "/api/teams/compare?team1=a&team2=b").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["result"]["totalGames"], 2);
        assert_eq!(json["result"]["team1Wins"], 1);
        assert_eq!(json["result"]["team2Wins"], 1);
        assert_eq!(json["team1_win_rate"], 50.0);
    }

    #[tokio::test]
    async fn test_teams_compare_overlap() {
        let app = build_router(test_state(three_matches()), "*");
        let (status, _) = get_json(app, "/api/teams/compare?team1=a,b&team2=b").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_teams_roster_limit() {
        let app = build_router(test_state(three_matches()), "*");
        let (status, _) = get_json(app, "/api/teams/compare?team1=a,b,c,d,e,f&team2=g").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_teams_suggest() {
        let app = build_router(test_state(three_matches()), "*");
        let (status, json) = get_json(app, "/api/teams/suggest?team1=a&team2=c").await;

        assert_eq!(status, StatusCode::OK);
        let suggestions = json["suggestions"].as_array().cloned().unwrap_or_default();
        assert_eq!(suggestions.len(), 2);
        for suggestion in &suggestions {
            assert_eq!(suggestion["totalGames"], 1);
            assert_eq!(suggestion["team1Wins"], 1);
        }
    }

    #[tokio::test]
    async fn test_bad_date_bound() {
        let app = build_router(test_state(three_matches()), "*");
        let (status, json) = get_json(app, "/api/players?from=yesterday").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[test]
    fn test_api_error_status() {
        let resp = ApiError::Conflict("busy".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let resp = ApiError::Internal("boom".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
