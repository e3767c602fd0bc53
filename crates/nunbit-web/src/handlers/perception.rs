//! 쿼리 API 핸들러.
//!
//! 콜드 스타트/미지 라벨은 빈 구조로 응답한다 — 에러는 협력자 실패뿐.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use nunbit_core::models::geometry::BoundingBox;

use crate::error::ApiError;
use crate::AppState;

/// 영역 OCR 요청
#[derive(Debug, Deserialize)]
pub struct ReadImageRequest {
    /// 프레임 픽셀 좌표 [x1, y1, x2, y2]
    pub coords: [f32; 4],
}

/// 영역 OCR 응답
#[derive(Debug, Serialize)]
pub struct ReadImageResponse {
    /// 인식된 텍스트 (정제됨, 빈 문자열 가능)
    pub text: String,
}

/// 텍스트 맵 응답
#[derive(Debug, Serialize)]
pub struct TextMapResponse {
    /// 텍스트 맵 세대 (0이면 콜드 스타트)
    pub generation: u64,
    /// 정제된 문자열 → 박스
    pub entries: BTreeMap<String, BoundingBox>,
}

/// 현재 라벨별 개수 조회
///
/// GET /labels
pub async fn get_labels(State(state): State<AppState>) -> Json<BTreeMap<String, u32>> {
    Json(state.query.labels())
}

/// 라벨의 현재 박스 목록 조회
///
/// GET /positions/{label} — 미지/미관측 라벨이면 빈 배열
pub async fn get_positions(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> Json<Vec<BoundingBox>> {
    Json(state.query.positions(&label))
}

/// 임의 영역 OCR
///
/// POST /read_image {"coords": [x1, y1, x2, y2]}
pub async fn read_image(
    State(state): State<AppState>,
    Json(request): Json<ReadImageRequest>,
) -> Result<Json<ReadImageResponse>, ApiError> {
    let bbox = BoundingBox::from(request.coords);
    if !bbox.is_valid() {
        return Err(ApiError::BadRequest(format!(
            "잘못된 좌표 (x1 < x2, y1 < y2 필요): {:?}",
            request.coords
        )));
    }

    let text = state.query.read_region(bbox).await?;
    Ok(Json(ReadImageResponse { text }))
}

/// 현재 텍스트 맵 조회
///
/// GET /text
pub async fn get_text(State(state): State<AppState>) -> Json<TextMapResponse> {
    let map = state.query.text_map();
    Json(TextMapResponse {
        generation: map.generation,
        entries: map.entries.clone(),
    })
}
