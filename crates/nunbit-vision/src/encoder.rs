//! JPEG 인코더.
//!
//! 멀티파트 스트림과 SSE 페이로드용 인메모리 JPEG 인코딩.
//! 스트림 소비자는 3채널 JPEG을 기대한다.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use nunbit_core::error::CoreError;

/// JPEG 인코딩. `quality`는 1..=100으로 잘린다.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, CoreError> {
    let rgb = image.to_rgb8();
    let mut buf = Cursor::new(Vec::new());

    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|e| CoreError::Internal(format!("JPEG 인코딩 실패: {e}")))?;

    Ok(buf.into_inner())
}
