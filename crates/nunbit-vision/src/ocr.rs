//! OCR 제공자.
//!
//! `leptess` 기반 Tesseract 래퍼. `ocr` feature flag 활성화 시에만
//! 빌드된다. Tesseract 호출은 블로킹이므로 spawn_blocking으로 감싼다.
//! feature가 꺼진 빌드를 위해 빈 결과를 돌려주는 [`DisabledOcr`]도
//! 제공한다 — 빈 문자열은 OCR 계약상 정상 결과다.

use async_trait::async_trait;
use image::DynamicImage;

use nunbit_core::error::CoreError;
use nunbit_core::ports::OcrProvider;

#[cfg(feature = "ocr")]
pub use tesseract::TesseractOcr;

/// OCR 비활성 제공자 — 항상 빈 문자열
pub struct DisabledOcr;

#[async_trait]
impl OcrProvider for DisabledOcr {
    async fn recognize(&self, _image: &DynamicImage) -> Result<String, CoreError> {
        Ok(String::new())
    }

    fn provider_name(&self) -> &str {
        "disabled"
    }
}

#[cfg(feature = "ocr")]
mod tesseract {
    use std::path::PathBuf;

    use async_trait::async_trait;
    use image::DynamicImage;
    use tracing::debug;

    use nunbit_core::error::CoreError;
    use nunbit_core::ports::OcrProvider;

    /// Tesseract OCR 제공자
    pub struct TesseractOcr {
        /// Tesseract 데이터 경로 (None이면 시스템 기본값)
        tessdata_path: Option<PathBuf>,
    }

    impl TesseractOcr {
        /// 새 제공자 생성
        pub fn new(tessdata_path: Option<PathBuf>) -> Self {
            Self { tessdata_path }
        }

        /// 블로킹 추출 본체
        fn extract_blocking(
            tessdata: Option<String>,
            raw: Vec<u8>,
            width: u32,
            height: u32,
        ) -> Result<String, CoreError> {
            let mut lt = leptess::LepTess::new(tessdata.as_deref(), "eng")
                .map_err(|e| CoreError::Ocr(format!("Tesseract 초기화 실패: {e}")))?;

            lt.set_image_from_mem(&raw, width as i32, height as i32, 4, (width * 4) as i32)
                .map_err(|_| CoreError::Ocr("이미지 메모리 설정 실패".to_string()))?;

            let text = lt
                .get_utf8_text()
                .map_err(|e| CoreError::Ocr(format!("텍스트 추출 실패: {e}")))?;

            Ok(text.trim().to_string())
        }
    }

    #[async_trait]
    impl OcrProvider for TesseractOcr {
        async fn recognize(&self, image: &DynamicImage) -> Result<String, CoreError> {
            let rgba = image.to_rgba8();
            let (width, height) = rgba.dimensions();

            if width == 0 || height == 0 {
                return Err(CoreError::Ocr("빈 이미지: 너비 또는 높이가 0".to_string()));
            }

            let tessdata = self
                .tessdata_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string());
            let raw = rgba.into_raw();

            debug!("OCR 실행: {width}x{height}");

            // 별도 스레드에서 OCR 실행
            tokio::task::spawn_blocking(move || {
                Self::extract_blocking(tessdata, raw, width, height)
            })
            .await
            .map_err(|e| CoreError::Ocr(format!("OCR 작업 조인 실패: {e}")))?
        }

        fn provider_name(&self) -> &str {
            "tesseract"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_provider_returns_empty_string() {
        let provider = DisabledOcr;
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(10, 10));
        assert_eq!(provider.recognize(&img).await.unwrap(), "");
        assert_eq!(provider.provider_name(), "disabled");
    }

    #[cfg(feature = "ocr")]
    #[tokio::test]
    async fn empty_image_is_an_ocr_error() {
        let provider = TesseractOcr::new(None);
        let img = DynamicImage::ImageRgba8(image::RgbaImage::new(0, 0));
        let result = provider.recognize(&img).await;
        assert!(matches!(result, Err(CoreError::Ocr(_))));
    }
}
