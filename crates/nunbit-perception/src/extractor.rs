//! 텍스트 추출 루프.
//!
//! 탐지기보다 느린 자체 주기로 돈다. 한 사이클은 단일 세대의 읽기
//! 목록만 처리한다: 현재 스냅샷의 박스 전체를 여백 확장·클램프해
//! 새 프레임에서 잘라내고, 박스마다 타임아웃을 건 OCR 호출로 텍스트를
//! 뽑아 통합 텍스트 맵을 만들어 원자적으로 게시한다.
//! 박스 하나의 실패/타임아웃은 그 박스만 스킵한다.

use std::sync::Arc;
use std::time::Duration;

use image::GenericImageView;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use nunbit_core::error::CoreError;
use nunbit_core::models::geometry::BoundingBox;
use nunbit_core::models::text_map::TextMap;
use nunbit_core::ports::{FrameSource, OcrProvider};

use crate::persist::StateSink;
use crate::store::{DetectionStore, TextStore};

/// 텍스트 추출 루프
pub struct TextExtractorLoop {
    frames: Arc<dyn FrameSource>,
    ocr: Arc<dyn OcrProvider>,
    detections: Arc<DetectionStore>,
    texts: Arc<TextStore>,
    sink: Option<Arc<StateSink>>,
    interval: Duration,
    ocr_timeout: Duration,
    crop_margin: f32,
}

impl TextExtractorLoop {
    /// 새 추출 루프 생성
    pub fn new(
        frames: Arc<dyn FrameSource>,
        ocr: Arc<dyn OcrProvider>,
        detections: Arc<DetectionStore>,
        texts: Arc<TextStore>,
        interval: Duration,
        ocr_timeout: Duration,
        crop_margin: u32,
    ) -> Self {
        Self {
            frames,
            ocr,
            detections,
            texts,
            sink: None,
            interval,
            ocr_timeout,
            crop_margin: crop_margin as f32,
        }
    }

    /// 상태 파일 미러링 설정
    pub fn with_sink(mut self, sink: Arc<StateSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 종료 신호까지 루프 실행
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "텍스트 추출 루프 시작: 주기={}ms, OCR 타임아웃={}ms, 제공자={}",
            self.interval.as_millis(),
            self.ocr_timeout.as_millis(),
            self.ocr.provider_name()
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // 종료 확인은 협력자 호출 전, 사이클 시작 시점에만
                    if *shutdown.borrow() {
                        break;
                    }
                    if let Err(e) = self.run_cycle().await {
                        warn!("추출 사이클 실패, 이전 텍스트 맵 유지: {e}");
                    }
                }
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("텍스트 추출 루프 종료");
    }

    /// 한 사이클 실행: 읽기 목록 → 크롭 → OCR → 게시. 게시된 세대 반환.
    pub async fn run_cycle(&self) -> Result<u64, CoreError> {
        let snapshot = self.detections.current();
        let read_list = snapshot.read_list();

        let map = if read_list.is_empty() {
            TextMap::empty()
        } else {
            let frame = self.frames.grab().await?;
            self.build_map(&frame, &read_list).await
        };

        let entries = map.len();
        let generation = self.texts.publish(map);
        debug!(
            generation,
            entries,
            source_generation = snapshot.generation,
            "텍스트 맵 게시"
        );

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.write_text_map(&self.texts.current()).await {
                warn!("텍스트 맵 파일 기록 실패: {e}");
            }
        }

        Ok(generation)
    }

    /// 읽기 목록의 각 박스를 잘라 OCR하고 맵으로 통합
    async fn build_map(&self, frame: &image::DynamicImage, read_list: &[BoundingBox]) -> TextMap {
        let (width, height) = frame.dimensions();
        let mut map = TextMap::empty();

        for bbox in read_list {
            let Some(rect) = bbox.expanded(self.crop_margin).to_pixel_rect(width, height) else {
                debug!(?bbox, "프레임 밖 박스 스킵");
                continue;
            };

            let crop = frame.crop_imm(rect.x, rect.y, rect.width, rect.height);

            let raw = match tokio::time::timeout(self.ocr_timeout, self.ocr.recognize(&crop)).await
            {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    warn!(?bbox, "OCR 실패, 박스 스킵: {e}");
                    continue;
                }
                Err(_) => {
                    warn!(
                        ?bbox,
                        timeout_ms = self.ocr_timeout.as_millis() as u64,
                        "OCR 타임아웃, 박스 스킵"
                    );
                    continue;
                }
            };

            let cleaned = clean_text(&raw);
            if cleaned.is_empty() {
                continue;
            }

            // 손실 통합: 같은 문자열은 나중 박스가 이긴다 (문서화된 동작)
            if let Some(displaced) = map.insert(cleaned.clone(), *bbox) {
                debug!(text = %cleaned, ?displaced, kept = ?bbox, "중복 텍스트, 이전 박스 대체");
            }
        }

        map
    }
}

/// 인식 문자열 정제: 개행 제거, 비출력/비ASCII 문자 제거, 양끝 공백 제거.
pub fn clean_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii() && (c.is_ascii_graphic() || *c == ' '))
        .collect::<String>()
        .trim()
        .to_string()
}
