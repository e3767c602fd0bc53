//! 멀티파트 비디오 피드 핸들러.
//!
//! `multipart/x-mixed-replace` JPEG 스트림 — 클라이언트별로 자체 틱을
//! 돌며 틱마다 주석 프레임 한 장을 내보낸다. 렌더 실패 틱은 스킵하고
//! 스트림은 계속된다. 클라이언트가 끊으면 스트림이 드롭된다.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::warn;

use nunbit_perception::stream::StreamRenderer;

use crate::AppState;

/// 멀티파트 경계 문자열
const BOUNDARY: &str = "frame";

/// 비디오 피드 엔드포인트
///
/// GET /video_feed
pub async fn video_feed(State(state): State<AppState>) -> Response {
    let mut interval = tokio::time::interval(state.stream_tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let stream = futures::stream::unfold(
        (interval, state.renderer.clone()),
        |(mut interval, renderer): (Interval, Arc<StreamRenderer>)| async move {
            interval.tick().await;
            let chunk = match renderer.render().await {
                Ok(frame) => multipart_chunk(&frame.jpeg),
                Err(e) => {
                    warn!("비디오 피드 렌더 실패, 틱 스킵: {e}");
                    Bytes::new()
                }
            };
            Some((Ok::<_, Infallible>(chunk), (interval, renderer)))
        },
    );

    Response::builder()
        .header(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={BOUNDARY}"),
        )
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|e| {
            warn!("비디오 피드 응답 구성 실패: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

/// 프레임 하나를 멀티파트 조각으로 포장
fn multipart_chunk(jpeg: &[u8]) -> Bytes {
    let header = format!(
        "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut buf = Vec::with_capacity(header.len() + jpeg.len() + 2);
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(jpeg);
    buf.extend_from_slice(b"\r\n");
    Bytes::from(buf)
}
