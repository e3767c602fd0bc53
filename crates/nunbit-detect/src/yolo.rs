//! ONNX YOLO 탐지기.
//!
//! ort 세션이 모델을 소유한다. 로드 실패는 치명([`CoreError::ModelLoad`]),
//! 프레임 단위 추론 실패는 일시적([`CoreError::Inference`])이다.
//! 추론은 블로킹이므로 spawn_blocking에서 돈다.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use parking_lot::Mutex;
use tracing::{debug, info};

use nunbit_core::error::CoreError;
use nunbit_core::models::detection::Detection;
use nunbit_core::ports::ObjectDetector;

use crate::labels;
use crate::postprocess::{decode_predictions, non_max_suppression, Letterbox};

/// 레터박스 패딩 값 (ultralytics 관례의 회색 114)
const PAD_VALUE: f32 = 114.0 / 255.0;

/// 추론 파라미터
#[derive(Debug, Clone)]
pub struct YoloParams {
    /// 모델 입력 한 변 크기 (정사각)
    pub input_size: u32,
    /// 신뢰도 임계값
    pub confidence_threshold: f32,
    /// NMS IoU 임계값
    pub iou_threshold: f32,
    /// 프레임당 최대 탐지 수
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

/// ONNX YOLO 탐지기
pub struct YoloDetector {
    session: Arc<Mutex<Session>>,
    input_name: String,
    output_name: String,
    labels: Arc<Vec<String>>,
    params: YoloParams,
}

impl YoloDetector {
    /// 모델 로드.
    ///
    /// 라벨 어휘는 `labels_path`가 있으면 그 파일에서, 없으면 모델의
    /// `names` 메타데이터에서 읽는다. 둘 다 실패하면 치명 에러.
    pub fn load(
        model_path: &Path,
        labels_path: Option<&Path>,
        params: YoloParams,
    ) -> Result<Self, CoreError> {
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| {
                CoreError::ModelLoad(format!("ONNX 세션 생성 실패 {}: {e}", model_path.display()))
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| CoreError::ModelLoad("모델에 입력이 없음".to_string()))?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| CoreError::ModelLoad("모델에 출력이 없음".to_string()))?;

        let vocabulary = match labels_path {
            Some(path) => labels::load_labels_file(path)?,
            None => {
                let metadata = session.metadata().map_err(|e| {
                    CoreError::ModelLoad(format!("모델 메타데이터 조회 실패: {e}"))
                })?;
                metadata
                    .custom("names")
                    .ok()
                    .flatten()
                    .as_deref()
                    .and_then(labels::parse_names_metadata)
                    .ok_or_else(|| {
                        CoreError::ModelLoad(
                            "라벨 어휘를 찾을 수 없음 — labels_path를 지정하거나 \
                             names 메타데이터가 있는 모델을 사용"
                                .to_string(),
                        )
                    })?
            }
        };

        info!(
            "모델 로드 완료: {} (라벨 {}개, 입력 {}x{})",
            model_path.display(),
            vocabulary.len(),
            params.input_size,
            params.input_size
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            output_name,
            labels: Arc::new(vocabulary),
            params,
        })
    }
}

/// 레터박스 전처리: RGB 프레임 → NCHW f32 텐서
fn preprocess(rgb: &RgbImage, letterbox: &Letterbox, input_size: u32) -> Array4<f32> {
    let resized = image::imageops::resize(
        rgb,
        letterbox.resized_w,
        letterbox.resized_h,
        image::imageops::FilterType::Triangle,
    );

    let size = input_size as usize;
    let mut input = Array4::<f32>::from_elem((1, 3, size, size), PAD_VALUE);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let ix = (x + letterbox.pad_x) as usize;
        let iy = (y + letterbox.pad_y) as usize;
        for c in 0..3 {
            input[[0, c, iy, ix]] = pixel[c] as f32 / 255.0;
        }
    }
    input
}

#[async_trait]
impl ObjectDetector for YoloDetector {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    async fn infer(&self, frame: &DynamicImage) -> Result<Vec<Detection>, CoreError> {
        let rgb = frame.to_rgb8();
        let session = self.session.clone();
        let vocabulary = self.labels.clone();
        let params = self.params.clone();
        let input_name = self.input_name.clone();
        let output_name = self.output_name.clone();

        tokio::task::spawn_blocking(move || {
            let (frame_w, frame_h) = rgb.dimensions();
            let letterbox = Letterbox::fit(frame_w, frame_h, params.input_size);
            let input = preprocess(&rgb, &letterbox, params.input_size);

            let mut session = session.lock();
            let outputs = session
                .run(
                    ort::inputs![input_name.as_str() => input.view()]
                        .map_err(|e| CoreError::Inference(format!("입력 텐서 생성 실패: {e}")))?,
                )
                .map_err(|e| CoreError::Inference(format!("추론 실행 실패: {e}")))?;

            let tensor = outputs[output_name.as_str()]
                .try_extract_tensor::<f32>()
                .map_err(|e| CoreError::Inference(format!("출력 텐서 추출 실패: {e}")))?;

            let shape = tensor.shape();
            if shape.len() != 3 {
                return Err(CoreError::Inference(format!(
                    "예상 밖 출력 형상: {shape:?}"
                )));
            }
            let (num_attrs, num_anchors) = (shape[1], shape[2]);
            let data: Vec<f32> = tensor.iter().copied().collect();

            let candidates = decode_predictions(
                &data,
                num_attrs,
                num_anchors,
                &vocabulary,
                &letterbox,
                frame_w,
                frame_h,
                params.confidence_threshold,
            );
            let kept =
                non_max_suppression(candidates, params.iou_threshold, params.max_detections);
            debug!(anchors = num_anchors, detections = kept.len(), "추론 완료");
            Ok(kept)
        })
        .await
        .map_err(|e| CoreError::Inference(format!("추론 작업 조인 실패: {e}")))?
    }
}
