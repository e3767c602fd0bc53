//! SSE 실시간 스트림 핸들러.
//!
//! 스트림 퍼블리셔가 브로드캐스트한 주석 프레임을 base64 JPEG 이벤트로
//! 내보낸다. 채널 지연으로 놓친 프레임은 스킵한다.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::AppState;

/// 프레임 이벤트 데이터
#[derive(Debug, Clone, Serialize)]
pub struct FrameEvent {
    /// 오버레이된 스냅샷 세대 (0이면 주석 없음)
    pub generation: u64,
    /// 렌더 시각 (RFC3339)
    pub rendered_at: String,
    /// base64 인코딩 JPEG
    pub image: String,
}

/// SSE 스트림 엔드포인트
///
/// GET /stream
///
/// 클라이언트는 EventSource API로 수신.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.frame_events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        match result {
            Ok(frame) => {
                let event = FrameEvent {
                    generation: frame.generation,
                    rendered_at: frame.rendered_at.to_rfc3339(),
                    image: B64.encode(&frame.jpeg),
                };
                let json = serde_json::to_string(&event).ok()?;
                Some(Ok(Event::default().event("frame").data(json)))
            }
            Err(_) => None, // 채널 지연 시 스킵
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_frame_event() {
        let event = FrameEvent {
            generation: 42,
            rendered_at: "2026-08-06T12:00:00Z".to_string(),
            image: B64.encode([0xFFu8, 0xD8]),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"generation\":42"));
        assert!(json.contains("\"image\":\"/9g=\""));
    }
}
