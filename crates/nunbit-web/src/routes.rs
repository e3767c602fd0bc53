//! API 라우트 정의.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::AppState;

/// API 라우트 생성
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // 쿼리
        .route("/labels", get(handlers::perception::get_labels))
        .route(
            "/positions/{label}",
            get(handlers::perception::get_positions),
        )
        .route("/read_image", post(handlers::perception::read_image))
        .route("/text", get(handlers::perception::get_text))
        // 스트림
        .route("/video_feed", get(handlers::video::video_feed))
        .route("/stream", get(handlers::stream::event_stream))
}
