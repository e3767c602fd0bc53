//! 탐지 결과 오버레이.
//!
//! 스냅샷의 박스를 2픽셀 초록 테두리로 그리고 박스 위에 "라벨: 개수"
//! 캡션을 붙인다. 캡션 폰트는 설정 경로 또는 알려진 시스템 경로에서
//! 로드한다 — 폰트가 없으면 캡션만 생략하고 박스는 그대로 그린다.

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use nunbit_core::models::snapshot::DetectionSnapshot;

/// 박스/캡션 색 (초록)
const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// 캡션 폰트 크기
const CAPTION_FONT_SIZE: f32 = 18.0;

/// 캡션 높이 (박스 위 오프셋)
const CAPTION_HEIGHT: i32 = 20;

/// 폰트 미지정 시 탐색하는 시스템 경로
const FALLBACK_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// 프레임 주석기
pub struct FrameAnnotator {
    font: Option<FontArc>,
    font_scale: PxScale,
}

impl FrameAnnotator {
    /// 새 주석기 생성. `font_path`가 없으면 시스템 경로를 탐색한다.
    pub fn new(font_path: Option<&Path>) -> Self {
        let font = load_font(font_path);
        if font.is_none() {
            warn!("캡션 폰트를 찾을 수 없음 — 박스만 그린다");
        }
        Self {
            font,
            font_scale: PxScale::from(CAPTION_FONT_SIZE),
        }
    }

    /// 스냅샷의 모든 라벨/박스를 이미지에 그린다
    pub fn draw_snapshot(&self, image: &mut RgbImage, snapshot: &DetectionSnapshot) {
        for (label, boxes) in &snapshot.boxes {
            if boxes.is_empty() {
                continue;
            }
            let count = snapshot.counts.get(label).copied().unwrap_or(0);
            let caption = format!("{label}: {count}");
            for bbox in boxes {
                self.draw_box(image, bbox, &caption);
            }
        }
    }

    /// 박스 하나 + 캡션 그리기
    fn draw_box(
        &self,
        image: &mut RgbImage,
        bbox: &nunbit_core::models::geometry::BoundingBox,
        caption: &str,
    ) {
        let (width, height) = image.dimensions();
        let Some(rect) = bbox.to_pixel_rect(width, height) else {
            debug!(?bbox, "프레임 밖 박스 — 그리기 생략");
            return;
        };

        draw_hollow_rect_mut(
            image,
            Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height),
            BOX_COLOR,
        );

        // 두께 2픽셀: 안쪽에 한 번 더
        if rect.width > 2 && rect.height > 2 {
            draw_hollow_rect_mut(
                image,
                Rect::at(rect.x as i32 + 1, rect.y as i32 + 1)
                    .of_size(rect.width - 2, rect.height - 2),
                BOX_COLOR,
            );
        }

        if let Some(font) = &self.font {
            let caption_y = (rect.y as i32 - CAPTION_HEIGHT).max(0);
            draw_text_mut(
                image,
                BOX_COLOR,
                rect.x as i32,
                caption_y,
                self.font_scale,
                font,
                caption,
            );
        }
    }

    /// 캡션 폰트 로드 여부
    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }
}

/// 설정 경로 → 시스템 폴백 순서로 폰트 로드
fn load_font(configured: Option<&Path>) -> Option<FontArc> {
    let candidates: Vec<PathBuf> = configured
        .map(|p| vec![p.to_path_buf()])
        .unwrap_or_else(|| FALLBACK_FONT_PATHS.iter().map(PathBuf::from).collect());

    for path in candidates {
        match std::fs::read(&path) {
            Ok(bytes) => match FontArc::try_from_vec(bytes) {
                Ok(font) => {
                    debug!("캡션 폰트 로드: {}", path.display());
                    return Some(font);
                }
                Err(e) => warn!("폰트 파싱 실패 {}: {e}", path.display()),
            },
            Err(_) => continue,
        }
    }
    None
}
