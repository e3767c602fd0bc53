//! 탐지 루프.
//!
//! 모델 추론 주기로 도는 무한 루프: 프레임 캡처 → 추론 → 스냅샷 조립 →
//! 게시. 한 사이클의 캡처/추론 실패는 로그 후 스킵되고 이전 스냅샷이
//! 유효하게 남는다. 종료 신호는 매 사이클 시작 시점에만 확인한다 —
//! 진행 중인 협력자 호출은 끝까지 완료된다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use nunbit_core::error::CoreError;
use nunbit_core::models::snapshot::DetectionSnapshot;
use nunbit_core::ports::{FrameSource, ObjectDetector};

use crate::persist::StateSink;
use crate::store::DetectionStore;

/// 탐지 루프
pub struct DetectorLoop {
    frames: Arc<dyn FrameSource>,
    model: Arc<dyn ObjectDetector>,
    store: Arc<DetectionStore>,
    sink: Option<Arc<StateSink>>,
    interval: Duration,
}

impl DetectorLoop {
    /// 새 탐지 루프 생성
    pub fn new(
        frames: Arc<dyn FrameSource>,
        model: Arc<dyn ObjectDetector>,
        store: Arc<DetectionStore>,
        interval: Duration,
    ) -> Self {
        Self {
            frames,
            model,
            store,
            sink: None,
            interval,
        }
    }

    /// 상태 파일 미러링 설정
    pub fn with_sink(mut self, sink: Arc<StateSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 종료 신호까지 루프 실행
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "탐지 루프 시작: 주기={}ms, 어휘 {}개 라벨",
            self.interval.as_millis(),
            self.model.labels().len()
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // 종료 확인은 협력자 호출 전, 사이클 시작 시점에만
                    if *shutdown.borrow() {
                        break;
                    }
                    if let Err(e) = self.run_cycle().await {
                        warn!("탐지 사이클 실패, 이전 스냅샷 유지: {e}");
                    }
                }
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("탐지 루프 종료");
    }

    /// 한 사이클 실행: 캡처 → 추론 → 게시. 게시된 세대 번호 반환.
    pub async fn run_cycle(&self) -> Result<u64, CoreError> {
        let frame = self.frames.grab().await?;
        let detections = self.model.infer(&frame).await?;

        let snapshot = DetectionSnapshot::from_detections(self.model.labels(), &detections);
        let generation = self.store.publish(snapshot);
        debug!(generation, detections = detections.len(), "스냅샷 게시");

        if let Some(sink) = &self.sink {
            // 미러링 실패는 게시를 되돌리지 않는다 — 인메모리 스토어가 진실
            if let Err(e) = sink.write_snapshot(&self.store.current()).await {
                warn!("상태 파일 기록 실패: {e}");
            }
        }

        Ok(generation)
    }
}
