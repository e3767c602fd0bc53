//! 주석 스트림.
//!
//! 틱마다 새 프레임을 잡아 현재 스냅샷의 박스와 "라벨: 개수" 캡션을
//! 그려 JPEG로 인코딩한다. 스냅샷이 아직 없으면 주석 없는 프레임이
//! 나간다. 틱 하나의 실패는 로그 후 다음 틱으로 넘어간다.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use nunbit_core::error::CoreError;
use nunbit_core::ports::FrameSource;
use nunbit_vision::annotate::FrameAnnotator;
use nunbit_vision::encoder::encode_jpeg;

use crate::store::DetectionStore;

/// 브로드캐스트 채널 용량
const FRAME_CHANNEL_CAPACITY: usize = 16;

/// 렌더링된 주석 프레임 하나
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    /// JPEG 바이트
    pub jpeg: Bytes,
    /// 오버레이된 스냅샷의 세대 (콜드면 0)
    pub generation: u64,
    /// 렌더 시각
    pub rendered_at: DateTime<Utc>,
}

/// 주석 프레임 렌더러.
///
/// 상태 없음 — 호출 시점의 프레임과 스냅샷으로만 그린다.
pub struct StreamRenderer {
    frames: Arc<dyn FrameSource>,
    detections: Arc<DetectionStore>,
    annotator: FrameAnnotator,
    jpeg_quality: u8,
}

impl StreamRenderer {
    /// 새 렌더러 생성
    pub fn new(
        frames: Arc<dyn FrameSource>,
        detections: Arc<DetectionStore>,
        annotator: FrameAnnotator,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            frames,
            detections,
            annotator,
            jpeg_quality,
        }
    }

    /// 한 틱 렌더: 캡처 → 3채널 변환 → 오버레이 → JPEG
    pub async fn render(&self) -> Result<RenderedFrame, CoreError> {
        let frame = self.frames.grab().await?;
        let mut rgb = frame.to_rgb8();

        let snapshot = self.detections.current();
        self.annotator.draw_snapshot(&mut rgb, &snapshot);

        let jpeg = encode_jpeg(&DynamicImage::ImageRgb8(rgb), self.jpeg_quality)?;

        Ok(RenderedFrame {
            jpeg: Bytes::from(jpeg),
            generation: snapshot.generation,
            rendered_at: Utc::now(),
        })
    }
}

/// 푸시 채널 루프.
///
/// 구독자가 있을 때만 렌더링하고, 렌더 결과를 브로드캐스트한다.
/// HTTP 멀티파트 쪽은 클라이언트별 틱으로 렌더러를 직접 부른다.
pub struct StreamPublisher {
    renderer: Arc<StreamRenderer>,
    tx: broadcast::Sender<RenderedFrame>,
    interval: Duration,
}

impl StreamPublisher {
    /// 새 퍼블리셔 생성
    pub fn new(renderer: Arc<StreamRenderer>, interval: Duration) -> Self {
        let (tx, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        Self {
            renderer,
            tx,
            interval,
        }
    }

    /// 프레임 이벤트 송신 채널 반환 (웹 레이어가 구독)
    pub fn sender(&self) -> broadcast::Sender<RenderedFrame> {
        self.tx.clone()
    }

    /// 종료 신호까지 루프 실행
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("스트림 퍼블리셔 시작: 틱={}ms", self.interval.as_millis());

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    if self.tx.receiver_count() == 0 {
                        continue;
                    }
                    match self.renderer.render().await {
                        Ok(frame) => {
                            debug!(generation = frame.generation, bytes = frame.jpeg.len(), "프레임 브로드캐스트");
                            let _ = self.tx.send(frame);
                        }
                        Err(e) => warn!("스트림 틱 실패, 다음 틱으로: {e}"),
                    }
                }
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("스트림 퍼블리셔 종료");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use nunbit_core::models::detection::Detection;
    use nunbit_core::models::geometry::BoundingBox;
    use nunbit_core::models::snapshot::DetectionSnapshot;

    struct WhiteFrames;

    #[async_trait]
    impl FrameSource for WhiteFrames {
        async fn grab(&self) -> Result<DynamicImage, CoreError> {
            let mut img = image::RgbImage::new(64, 64);
            for pixel in img.pixels_mut() {
                *pixel = image::Rgb([255, 255, 255]);
            }
            Ok(DynamicImage::ImageRgb8(img))
        }
    }

    fn renderer_with(detections: Arc<DetectionStore>) -> StreamRenderer {
        StreamRenderer::new(
            Arc::new(WhiteFrames),
            detections,
            FrameAnnotator::new(None),
            80,
        )
    }

    #[tokio::test]
    async fn cold_store_renders_unannotated_frame() {
        let rendered = renderer_with(Arc::new(DetectionStore::new()))
            .render()
            .await
            .unwrap();

        assert_eq!(rendered.generation, 0);
        // JPEG SOI 마커
        assert_eq!(&rendered.jpeg[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn rendered_frame_carries_snapshot_generation() {
        let detections = Arc::new(DetectionStore::new());
        let vocab = vec!["cup".to_string()];
        let dets = vec![Detection::new(
            "cup",
            BoundingBox::new(10.0, 10.0, 40.0, 40.0),
            0.9,
        )];
        detections.publish(DetectionSnapshot::from_detections(&vocab, &dets));

        let rendered = renderer_with(detections).render().await.unwrap();
        assert_eq!(rendered.generation, 1);
        assert!(!rendered.jpeg.is_empty());
    }

    #[tokio::test]
    async fn publisher_broadcasts_to_subscribers() {
        let renderer = Arc::new(renderer_with(Arc::new(DetectionStore::new())));
        let publisher = StreamPublisher::new(renderer, Duration::from_millis(10));
        let mut rx = publisher.sender().subscribe();

        let (tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(publisher.run(shutdown_rx));

        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("프레임 수신 타임아웃")
            .unwrap();
        assert_eq!(&frame.jpeg[..2], &[0xFF, 0xD8]);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
