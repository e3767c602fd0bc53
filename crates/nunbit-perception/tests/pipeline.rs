//! 파이프라인 통합 테스트.
//!
//! 가짜 협력자(프레임/모델/OCR)로 탐지 → 스토어 → 추출 → 쿼리 흐름을
//! 끝까지 돌려본다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use parking_lot::Mutex;

use nunbit_core::error::CoreError;
use nunbit_core::models::detection::Detection;
use nunbit_core::models::geometry::BoundingBox;
use nunbit_core::ports::{FrameSource, ObjectDetector, OcrProvider};
use nunbit_perception::detector::DetectorLoop;
use nunbit_perception::extractor::TextExtractorLoop;
use nunbit_perception::query::QueryService;
use nunbit_perception::store::{DetectionStore, TextStore};

struct FakeFrames;

#[async_trait]
impl FrameSource for FakeFrames {
    async fn grab(&self) -> Result<DynamicImage, CoreError> {
        Ok(DynamicImage::ImageRgb8(image::RgbImage::new(1920, 1080)))
    }
}

/// 사이클마다 준비된 응답을 차례로 내놓는 가짜 모델
struct ScriptedModel {
    labels: Vec<String>,
    responses: Mutex<Vec<Vec<Detection>>>,
}

impl ScriptedModel {
    fn new(responses: Vec<Vec<Detection>>) -> Self {
        Self {
            labels: vec!["button".to_string(), "cup".to_string()],
            responses: Mutex::new(responses),
        }
    }
}

#[async_trait]
impl ObjectDetector for ScriptedModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    async fn infer(&self, _frame: &DynamicImage) -> Result<Vec<Detection>, CoreError> {
        let mut responses = self.responses.lock();
        if responses.is_empty() {
            return Ok(Vec::new());
        }
        Ok(responses.remove(0))
    }
}

/// 크롭 크기로 결정되는 결정적 OCR
struct SizeOcr;

#[async_trait]
impl OcrProvider for SizeOcr {
    async fn recognize(&self, image: &DynamicImage) -> Result<String, CoreError> {
        use image::GenericImageView;
        let (w, h) = image.dimensions();
        Ok(format!("text-{w}x{h}"))
    }

    fn provider_name(&self) -> &str {
        "size-fake"
    }
}

fn wire(
    model: Arc<ScriptedModel>,
) -> (
    Arc<DetectionStore>,
    Arc<TextStore>,
    DetectorLoop,
    TextExtractorLoop,
    QueryService,
) {
    let frames: Arc<dyn FrameSource> = Arc::new(FakeFrames);
    let ocr: Arc<dyn OcrProvider> = Arc::new(SizeOcr);
    let detections = Arc::new(DetectionStore::new());
    let texts = Arc::new(TextStore::new());

    let detector = DetectorLoop::new(
        frames.clone(),
        model,
        detections.clone(),
        Duration::from_millis(10),
    );
    let extractor = TextExtractorLoop::new(
        frames.clone(),
        ocr.clone(),
        detections.clone(),
        texts.clone(),
        Duration::from_millis(50),
        Duration::from_millis(500),
        5,
    );
    let query = QueryService::new(
        detections.clone(),
        texts.clone(),
        frames,
        ocr,
        5,
        Duration::from_millis(500),
    );

    (detections, texts, detector, extractor, query)
}

#[tokio::test]
async fn full_pipeline_scenario() {
    let model = Arc::new(ScriptedModel::new(vec![vec![Detection::new(
        "cup",
        BoundingBox::new(10.0, 10.0, 50.0, 50.0),
        0.93,
    )]]));
    let (_, _, detector, extractor, query) = wire(model);

    // 콜드 스타트: 전부 빈 결과, 에러 없음
    assert!(query.labels().is_empty());
    assert!(query.positions("cup").is_empty());
    assert!(query.text_map().is_empty());

    // 세대 1 게시
    let generation = detector.run_cycle().await.unwrap();
    assert_eq!(generation, 1);

    // 게시 직후 쿼리는 스냅샷을 그대로 반영한다
    assert_eq!(query.labels()["cup"], 1);
    assert_eq!(query.labels()["button"], 0);
    assert_eq!(
        query.positions("cup"),
        vec![BoundingBox::new(10.0, 10.0, 50.0, 50.0)]
    );
    // 어휘 밖 라벨은 빈 목록
    assert!(query.positions("mug").is_empty());

    // 추출 사이클: 읽기 목록 1개 → 텍스트 맵 1항목
    extractor.run_cycle().await.unwrap();
    let map = query.text_map();
    assert_eq!(map.len(), 1);
    // 여백 5픽셀 확장 크롭: 40x40 박스 → 50x50
    assert_eq!(
        map.get("text-50x50"),
        Some(&BoundingBox::new(10.0, 10.0, 50.0, 50.0))
    );
}

#[tokio::test]
async fn detector_cadence_outruns_extractor_without_mixing_generations() {
    // 탐지기가 여러 세대를 게시하는 동안 추출기는 한 세대의 읽기
    // 목록만 쓴다 — 마지막 게시 세대의 박스가 맵에 반영된다.
    let model = Arc::new(ScriptedModel::new(vec![
        vec![Detection::new(
            "cup",
            BoundingBox::new(0.0, 0.0, 20.0, 20.0),
            0.9,
        )],
        vec![Detection::new(
            "cup",
            BoundingBox::new(100.0, 100.0, 160.0, 140.0),
            0.9,
        )],
    ]));
    let (detections, _, detector, extractor, query) = wire(model);

    detector.run_cycle().await.unwrap();
    detector.run_cycle().await.unwrap();
    assert_eq!(detections.current().generation, 2);

    extractor.run_cycle().await.unwrap();

    let map = query.text_map();
    assert_eq!(map.len(), 1);
    // 세대 2의 박스 (60x40 → 확장 70x50)만 보인다
    assert_eq!(
        map.get("text-70x50"),
        Some(&BoundingBox::new(100.0, 100.0, 160.0, 140.0))
    );
}

#[tokio::test]
async fn stale_snapshot_reprocessing_is_idempotent() {
    let model = Arc::new(ScriptedModel::new(vec![vec![
        Detection::new("cup", BoundingBox::new(10.0, 10.0, 50.0, 50.0), 0.9),
        Detection::new("button", BoundingBox::new(200.0, 200.0, 300.0, 240.0), 0.8),
    ]]));
    let (_, texts, detector, extractor, _) = wire(model);

    detector.run_cycle().await.unwrap();

    extractor.run_cycle().await.unwrap();
    let first = texts.current();
    extractor.run_cycle().await.unwrap();
    let second = texts.current();

    assert_eq!(first.entries, second.entries);
}

#[tokio::test]
async fn read_region_answers_on_demand() {
    let model = Arc::new(ScriptedModel::new(vec![]));
    let (_, _, _, _, query) = wire(model);

    let text = query
        .read_region(BoundingBox::new(100.0, 100.0, 300.0, 200.0))
        .await
        .unwrap();
    assert_eq!(text, "text-210x110");
}
