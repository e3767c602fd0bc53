//! 쿼리 퍼사드.
//!
//! "지금 화면에 뭐가 있나" 질문에 답하는 읽기 전용 표면. 스토어에서
//! 현재 스냅샷/텍스트 맵을 읽고, 요청 시에만 캡처·OCR 협력자를 부른다.
//! 콜드 스타트와 미관측 라벨은 에러가 아니라 빈 결과다.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, GenericImageView};
use tracing::debug;

use nunbit_core::error::CoreError;
use nunbit_core::models::geometry::BoundingBox;
use nunbit_core::models::text_map::TextMap;
use nunbit_core::ports::{FrameSource, OcrProvider};

use crate::extractor::clean_text;
use crate::store::{DetectionStore, TextStore};

/// 읽기 전용 쿼리 서비스
pub struct QueryService {
    detections: Arc<DetectionStore>,
    texts: Arc<TextStore>,
    frames: Arc<dyn FrameSource>,
    ocr: Arc<dyn OcrProvider>,
    crop_margin: f32,
    ocr_timeout: Duration,
}

impl QueryService {
    /// 새 쿼리 서비스 생성
    pub fn new(
        detections: Arc<DetectionStore>,
        texts: Arc<TextStore>,
        frames: Arc<dyn FrameSource>,
        ocr: Arc<dyn OcrProvider>,
        crop_margin: u32,
        ocr_timeout: Duration,
    ) -> Self {
        Self {
            detections,
            texts,
            frames,
            ocr,
            crop_margin: crop_margin as f32,
            ocr_timeout,
        }
    }

    /// 현재 보이는 라벨별 개수 (콜드 스타트면 빈 매핑)
    pub fn labels(&self) -> BTreeMap<String, u32> {
        self.detections.current().counts.clone()
    }

    /// 라벨의 현재 박스 목록 (미관측/미지 라벨이면 빈 목록, 에러 아님)
    pub fn positions(&self, label: &str) -> Vec<BoundingBox> {
        self.detections.current().positions(label)
    }

    /// 현재 텍스트 맵
    pub fn text_map(&self) -> Arc<TextMap> {
        self.texts.current()
    }

    /// 임의 영역 OCR: 새 프레임을 잡아 추출기와 같은 여백/클램프 정책으로
    /// 잘라낸 뒤 인식한다. 클램프 후 퇴화한 영역은 빈 문자열.
    pub async fn read_region(&self, bbox: BoundingBox) -> Result<String, CoreError> {
        let frame = self.frames.grab().await?;
        let (width, height) = frame.dimensions();

        let Some(rect) = bbox.expanded(self.crop_margin).to_pixel_rect(width, height) else {
            debug!(?bbox, "프레임 밖 영역 — 빈 결과");
            return Ok(String::new());
        };

        let crop = frame.crop_imm(rect.x, rect.y, rect.width, rect.height);
        self.recognize_bounded(&crop).await
    }

    /// 이미 잘라낸 이미지 OCR
    pub async fn read_image(&self, image: &DynamicImage) -> Result<String, CoreError> {
        self.recognize_bounded(image).await
    }

    /// 영역 안에 들어오는 텍스트 맵 항목 찾기.
    ///
    /// 영역을 크롭 여백의 두 배로 확장한 뒤, 그 안에 완전히 포함되는
    /// 첫 항목을 반환한다.
    pub fn text_within(&self, region: BoundingBox) -> Option<(String, BoundingBox)> {
        let expanded = region.expanded(self.crop_margin * 2.0);
        let map = self.texts.current();
        map.entries
            .iter()
            .find(|(_, bbox)| expanded.contains(bbox))
            .map(|(text, bbox)| (text.clone(), *bbox))
    }

    /// 타임아웃을 건 OCR 호출 + 텍스트 정제
    async fn recognize_bounded(&self, image: &DynamicImage) -> Result<String, CoreError> {
        let raw = tokio::time::timeout(self.ocr_timeout, self.ocr.recognize(image))
            .await
            .map_err(|_| CoreError::Timeout {
                timeout_ms: self.ocr_timeout.as_millis() as u64,
            })??;
        Ok(clean_text(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use nunbit_core::models::detection::Detection;
    use nunbit_core::models::snapshot::DetectionSnapshot;

    struct FakeFrames;

    #[async_trait]
    impl FrameSource for FakeFrames {
        async fn grab(&self) -> Result<DynamicImage, CoreError> {
            Ok(DynamicImage::ImageRgb8(image::RgbImage::new(1920, 1080)))
        }
    }

    struct EchoOcr;

    #[async_trait]
    impl OcrProvider for EchoOcr {
        async fn recognize(&self, image: &DynamicImage) -> Result<String, CoreError> {
            let (w, h) = image.dimensions();
            Ok(format!("region {w}x{h}\n"))
        }

        fn provider_name(&self) -> &str {
            "echo-fake"
        }
    }

    struct SlowOcr;

    #[async_trait]
    impl OcrProvider for SlowOcr {
        async fn recognize(&self, _image: &DynamicImage) -> Result<String, CoreError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok("late".to_string())
        }

        fn provider_name(&self) -> &str {
            "slow-fake"
        }
    }

    fn service_with(
        detections: Arc<DetectionStore>,
        texts: Arc<TextStore>,
        ocr: Arc<dyn OcrProvider>,
    ) -> QueryService {
        QueryService::new(
            detections,
            texts,
            Arc::new(FakeFrames),
            ocr,
            5,
            Duration::from_millis(100),
        )
    }

    #[test]
    fn cold_store_yields_empty_answers() {
        let service = service_with(
            Arc::new(DetectionStore::new()),
            Arc::new(TextStore::new()),
            Arc::new(EchoOcr),
        );

        assert!(service.labels().is_empty());
        assert!(service.positions("cup").is_empty());
        assert!(service.text_map().is_empty());
    }

    #[test]
    fn published_snapshot_is_visible_immediately() {
        let detections = Arc::new(DetectionStore::new());
        let vocab = vec!["cup".to_string()];
        let dets = vec![Detection::new(
            "cup",
            BoundingBox::new(1.0, 2.0, 3.0, 4.0),
            0.9,
        )];
        detections.publish(DetectionSnapshot::from_detections(&vocab, &dets));

        let service = service_with(detections, Arc::new(TextStore::new()), Arc::new(EchoOcr));

        assert_eq!(service.labels()["cup"], 1);
        assert_eq!(
            service.positions("cup"),
            vec![BoundingBox::new(1.0, 2.0, 3.0, 4.0)]
        );
        // 어휘 밖 라벨은 빈 목록, 에러 아님
        assert!(service.positions("mug").is_empty());
    }

    #[tokio::test]
    async fn read_region_crops_with_margin_and_cleans() {
        let service = service_with(
            Arc::new(DetectionStore::new()),
            Arc::new(TextStore::new()),
            Arc::new(EchoOcr),
        );

        let text = service
            .read_region(BoundingBox::new(100.0, 100.0, 200.0, 150.0))
            .await
            .unwrap();
        // 여백 5픽셀씩 확장된 크롭, 개행 제거
        assert_eq!(text, "region 110x60");
    }

    #[tokio::test]
    async fn offscreen_region_reads_as_empty_string() {
        let service = service_with(
            Arc::new(DetectionStore::new()),
            Arc::new(TextStore::new()),
            Arc::new(EchoOcr),
        );

        let text = service
            .read_region(BoundingBox::new(5000.0, 5000.0, 6000.0, 6000.0))
            .await
            .unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_ocr_surfaces_as_timeout() {
        let service = service_with(
            Arc::new(DetectionStore::new()),
            Arc::new(TextStore::new()),
            Arc::new(SlowOcr),
        );

        let result = service
            .read_region(BoundingBox::new(0.0, 0.0, 50.0, 50.0))
            .await;
        assert_matches!(result, Err(CoreError::Timeout { .. }));
    }

    #[test]
    fn text_within_finds_contained_entry() {
        let texts = Arc::new(TextStore::new());
        let mut map = TextMap::empty();
        map.insert("Save".to_string(), BoundingBox::new(20.0, 20.0, 60.0, 40.0));
        texts.publish(map);

        let service = service_with(Arc::new(DetectionStore::new()), texts, Arc::new(EchoOcr));

        // 영역 (15,15,65,45)를 10픽셀 확장하면 (5,5,75,55) — 포함
        let hit = service.text_within(BoundingBox::new(15.0, 15.0, 65.0, 45.0));
        assert_eq!(
            hit,
            Some(("Save".to_string(), BoundingBox::new(20.0, 20.0, 60.0, 40.0)))
        );

        // 멀리 떨어진 영역은 미발견
        assert!(service
            .text_within(BoundingBox::new(500.0, 500.0, 600.0, 600.0))
            .is_none());
    }
}
