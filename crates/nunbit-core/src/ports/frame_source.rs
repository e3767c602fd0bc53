//! 프레임 캡처 포트.
//!
//! 구현: `nunbit-vision` crate (xcap)

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::CoreError;

/// 화면 캡처 — 주 모니터의 현재 화면 이미지를 가져온다.
///
/// 동기적 스냅 동작이다: 프레임 큐잉 없이 호출 시점의 화면을 반환한다.
/// 크기는 반환된 이미지에서 읽는다.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// 주 모니터 화면 캡처
    async fn grab(&self) -> Result<DynamicImage, CoreError>;
}
