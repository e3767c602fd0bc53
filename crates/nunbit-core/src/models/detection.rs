//! 탐지 협력자의 원시 출력.

use serde::{Deserialize, Serialize};

use super::geometry::BoundingBox;

/// 탐지 모델이 반환하는 (라벨, 박스, 신뢰도) 하나.
///
/// 신뢰도는 스냅샷 조립 시점에 버려진다 — 게시되는 모델에는 포함되지 않는다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// 어휘 내 클래스 라벨
    pub label: String,
    /// 프레임 픽셀 좌표 바운딩 박스
    pub bbox: BoundingBox,
    /// 인식 신뢰도 (0.0 ~ 1.0)
    pub confidence: f32,
}

impl Detection {
    /// 새 탐지 결과 생성
    pub fn new(label: impl Into<String>, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            label: label.into(),
            bbox,
            confidence,
        }
    }
}
