//! OCR 제공자 포트.
//!
//! 구현: `nunbit-vision` crate (leptess, `ocr` feature)

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::CoreError;

/// OCR 엔진 — 이미지 하나에서 텍스트 인식.
///
/// 최선 노력(best-effort) 계약이다: 빈 문자열은 정상적인 결과이며,
/// 에러는 해당 호출 단위로 흡수된다.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// 이미지에서 텍스트 추출
    async fn recognize(&self, image: &DynamicImage) -> Result<String, CoreError>;

    /// 제공자 이름 (예: "tesseract", "disabled")
    fn provider_name(&self) -> &str;
}
