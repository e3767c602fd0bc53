//! 추론 후처리.
//!
//! 레터박스 좌표 변환, YOLO 출력 디코드, NMS. ort와 무관한 순수 연산만
//! 있어 `onnx` feature 없이도 빌드/테스트된다.
//!
//! YOLO 출력 레이아웃: `[1, 4+nc, N]` — 앵커 N개 각각에 대해
//! (cx, cy, w, h) 다음 클래스 점수 nc개.

use nunbit_core::models::detection::Detection;
use nunbit_core::models::geometry::BoundingBox;

/// 레터박스 변환: 프레임을 비율 유지로 축소하고 회색 패딩으로
/// 정사각 모델 입력에 맞춘다.
#[derive(Debug, Clone, Copy)]
pub struct Letterbox {
    /// 축소 비율 (frame → model)
    pub scale: f32,
    /// 좌측 패딩 (픽셀)
    pub pad_x: u32,
    /// 상단 패딩 (픽셀)
    pub pad_y: u32,
    /// 축소 후 너비
    pub resized_w: u32,
    /// 축소 후 높이
    pub resized_h: u32,
}

impl Letterbox {
    /// 프레임 크기에 맞는 레터박스 계산
    pub fn fit(frame_w: u32, frame_h: u32, input_size: u32) -> Self {
        let scale = (input_size as f32 / frame_w as f32).min(input_size as f32 / frame_h as f32);
        let resized_w = ((frame_w as f32 * scale).round() as u32).min(input_size);
        let resized_h = ((frame_h as f32 * scale).round() as u32).min(input_size);
        Self {
            scale,
            pad_x: (input_size - resized_w) / 2,
            pad_y: (input_size - resized_h) / 2,
            resized_w,
            resized_h,
        }
    }

    /// 모델 좌표계의 중심 박스를 프레임 좌표계 코너 박스로 역변환.
    /// 프레임 경계로 클램프한다.
    pub fn unmap(&self, cx: f32, cy: f32, w: f32, h: f32, frame_w: u32, frame_h: u32) -> BoundingBox {
        let x1 = (cx - w / 2.0 - self.pad_x as f32) / self.scale;
        let y1 = (cy - h / 2.0 - self.pad_y as f32) / self.scale;
        let x2 = (cx + w / 2.0 - self.pad_x as f32) / self.scale;
        let y2 = (cy + h / 2.0 - self.pad_y as f32) / self.scale;
        BoundingBox::new(x1, y1, x2, y2).clamped(frame_w, frame_h)
    }
}

/// 원시 출력 디코드.
///
/// `data`는 `[attrs, anchors]` 행우선 평탄화: `data[attr * anchors + i]`.
/// 신뢰도 임계값 미달이나 역변환 후 퇴화한 박스는 버린다.
#[allow(clippy::too_many_arguments)]
pub fn decode_predictions(
    data: &[f32],
    num_attrs: usize,
    num_anchors: usize,
    labels: &[String],
    letterbox: &Letterbox,
    frame_w: u32,
    frame_h: u32,
    confidence_threshold: f32,
) -> Vec<Detection> {
    let num_classes = num_attrs.saturating_sub(4);
    if num_classes == 0 || data.len() < num_attrs * num_anchors {
        return Vec::new();
    }

    let at = |attr: usize, i: usize| data[attr * num_anchors + i];
    let mut detections = Vec::new();

    for i in 0..num_anchors {
        let mut best_class = 0usize;
        let mut best_score = 0f32;
        for c in 0..num_classes {
            let score = at(4 + c, i);
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }
        if best_score < confidence_threshold {
            continue;
        }

        let bbox = letterbox.unmap(at(0, i), at(1, i), at(2, i), at(3, i), frame_w, frame_h);
        if !bbox.is_valid() {
            continue;
        }

        let label = labels
            .get(best_class)
            .cloned()
            .unwrap_or_else(|| format!("class_{best_class}"));
        detections.push(Detection::new(label, bbox, best_score));
    }

    detections
}

/// IoU (intersection over union)
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);

    let iw = (ix2 - ix1).max(0.0);
    let ih = (iy2 - iy1).max(0.0);
    let intersection = iw * ih;

    let union = a.width() * a.height() + b.width() * b.height() - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}

/// 라벨별 그리디 NMS: 신뢰도 내림차순으로 돌며 같은 라벨에서 IoU가
/// 임계값을 넘는 박스를 억제한다.
pub fn non_max_suppression(
    mut candidates: Vec<Detection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.label == candidate.label && iou(&k.bbox, &candidate.bbox) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
