//! # nunbit-web
//!
//! 로컬 HTTP 표면.
//! Axum 기반 REST 쿼리 API + 멀티파트 비디오 피드 + SSE 푸시 스트림.
//! 지각 코어의 연산에 1:1로 매핑된다:
//!
//! - `GET /labels` — 현재 라벨별 개수
//! - `GET /positions/{label}` — 라벨의 박스 목록
//! - `POST /read_image` — 임의 영역 OCR
//! - `GET /text` — 현재 텍스트 맵
//! - `GET /video_feed` — 주석 프레임 멀티파트 스트림
//! - `GET /stream` — SSE 프레임 푸시

pub mod error;
pub mod handlers;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use nunbit_core::config::WebConfig;
use nunbit_perception::query::QueryService;
use nunbit_perception::stream::{RenderedFrame, StreamRenderer};

/// 포트 바인드 최대 시도 횟수
const MAX_PORT_ATTEMPTS: u16 = 10;

/// 웹 서버 애플리케이션 상태
#[derive(Clone)]
pub struct AppState {
    /// 쿼리 서비스
    pub query: Arc<QueryService>,
    /// 멀티파트 피드용 렌더러 (클라이언트별 틱)
    pub renderer: Arc<StreamRenderer>,
    /// SSE용 프레임 브로드캐스트 채널
    pub frame_events: broadcast::Sender<RenderedFrame>,
    /// 멀티파트 피드 틱 간격
    pub stream_tick: Duration,
}

/// 로컬 웹 서버
pub struct WebServer {
    config: WebConfig,
    state: AppState,
}

impl WebServer {
    /// 새 웹 서버 생성
    pub fn new(state: AppState, config: WebConfig) -> Self {
        Self { config, state }
    }

    /// 서버 실행.
    ///
    /// 기본 포트가 사용 중이면 다음 포트를 시도한다 (최대 10개).
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), std::io::Error> {
        let host = if self.config.allow_external {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        };

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            .merge(routes::api_routes())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state);

        let base_port = self.config.port;
        let mut last_error = None;

        for attempt in 0..MAX_PORT_ATTEMPTS {
            let port = base_port.saturating_add(attempt);
            if port < base_port && attempt > 0 {
                break;
            }

            let addr: SocketAddr = match format!("{host}:{port}").parse() {
                Ok(a) => a,
                Err(e) => {
                    error!("잘못된 주소 {host}:{port} — {e}");
                    continue;
                }
            };

            match TcpListener::bind(addr).await {
                Ok(listener) => {
                    if attempt > 0 {
                        warn!("포트 {base_port} 사용 불가, 대체 포트 {port} 사용");
                    }
                    info!("웹 서버 시작: http://{addr}");

                    axum::serve(listener, app)
                        .with_graceful_shutdown(async move {
                            loop {
                                if *shutdown_rx.borrow() {
                                    info!("웹 서버 종료 신호 수신");
                                    break;
                                }
                                if shutdown_rx.changed().await.is_err() {
                                    break;
                                }
                            }
                        })
                        .await?;

                    info!("웹 서버 종료");
                    return Ok(());
                }
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::AddrInUse {
                        warn!("포트 {port} 이미 사용 중, 다음 포트 시도...");
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "사용 가능한 포트 없음")
        }))
    }
}
