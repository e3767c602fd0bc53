//! 스크린 캡처.
//!
//! xcap 기반 주 모니터 캡처. 주 모니터를 찾지 못하면 첫 모니터로
//! 폴백한다.

use async_trait::async_trait;
use image::DynamicImage;
use tracing::debug;
use xcap::Monitor;

use nunbit_core::error::CoreError;
use nunbit_core::ports::FrameSource;

/// 스크린 캡처 — xcap 기반
pub struct ScreenCapture;

impl ScreenCapture {
    /// 새 캡처 인스턴스 생성
    pub fn new() -> Self {
        Self
    }

    /// 주 모니터 스크린 캡처 (블로킹)
    pub fn capture_primary() -> Result<DynamicImage, CoreError> {
        let monitors = Monitor::all()
            .map_err(|e| CoreError::Capture(format!("모니터 목록 조회 실패: {e}")))?;

        let monitor = monitors
            .into_iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .or_else(|| Monitor::all().ok()?.into_iter().next())
            .ok_or_else(|| CoreError::Capture("모니터를 찾을 수 없음".to_string()))?;

        let image = monitor
            .capture_image()
            .map_err(|e| CoreError::Capture(format!("스크린 캡처 실패: {e}")))?;

        debug!("스크린 캡처 완료: {}x{}", image.width(), image.height());

        Ok(DynamicImage::ImageRgba8(image))
    }
}

impl Default for ScreenCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for ScreenCapture {
    async fn grab(&self) -> Result<DynamicImage, CoreError> {
        // 캡처는 블로킹 — 런타임 워커를 막지 않도록 분리
        tokio::task::spawn_blocking(Self::capture_primary)
            .await
            .map_err(|e| CoreError::Capture(format!("캡처 작업 조인 실패: {e}")))?
    }
}
