// HTTP request handlers for the read-only status API
use crate::domain::unit::UnitId;
use crate::presentation::app_state::AppState;
use crate::presentation::board::BoardState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Last loaded unit listing; `502` when the lookup failed, `404` until it has answered
pub async fn list_units(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match (state.board.listing(), state.board.listing_error()) {
        (Some(listing), _) => Json(listing).into_response(),
        (None, Some(reason)) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "state": "error", "message": reason })),
        )
            .into_response(),
        (None, None) => (StatusCode::NOT_FOUND, "unit list not loaded").into_response(),
    }
}

/// Latest rows and error for one unit
pub async fn unit_detail(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.board.unit(&UnitId::new(id)) {
        Some(status) => Json(status).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn totals(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.board.totals())
}

pub async fn hourly(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.board.hourly() {
        Some(summary) => Json(summary).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Everything the board currently shows
pub async fn board_state(State(state): State<Arc<AppState>>) -> Json<BoardState> {
    Json(state.board.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::sink::PresentationSink;
    use crate::domain::metrics::Row;

    fn state() -> Arc<AppState> {
        Arc::new(AppState {
            board: crate::presentation::board::StatusBoard::new(),
        })
    }

    #[tokio::test]
    async fn test_unit_detail_found_and_missing() {
        let state = state();
        state
            .board
            .render(&UnitId::new("LINE-A"), &[Row::new("X-100", 10, 2)]);

        let found = unit_detail(Path("LINE-A".to_string()), State(state.clone()))
            .await
            .into_response();
        assert_eq!(found.status(), StatusCode::OK);

        let missing = unit_detail(Path("LINE-Z".to_string()), State(state))
            .await
            .into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_units_not_loaded() {
        let response = list_units(State(state())).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_units_lookup_failed() {
        let state = state();
        state.board.render_units_failed("connection refused");
        let response = list_units(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
