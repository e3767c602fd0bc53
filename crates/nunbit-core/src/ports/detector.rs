//! 객체 탐지 포트.
//!
//! 구현: `nunbit-detect` crate (ort, `onnx` feature)

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::CoreError;
use crate::models::detection::Detection;

/// 객체 탐지 모델 — 프레임 하나를 받아 (라벨, 박스, 신뢰도) 목록 반환.
///
/// 라벨 어휘는 모델 로드 시점에 고정되며 프로세스 수명 동안 불변이다.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// 고정 라벨 어휘 (모델의 클래스 목록, 로드 시 결정)
    fn labels(&self) -> &[String];

    /// 프레임 하나에 대한 추론 실행
    async fn infer(&self, frame: &DynamicImage) -> Result<Vec<Detection>, CoreError>;
}
