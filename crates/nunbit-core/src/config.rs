//! 애플리케이션 설정 구조체.
//!
//! 탐지/추출/스트림 주기, 모델 경로, 웹 서버, 상태 퍼시스턴스 설정을
//! 정의한다. `config` crate를 통해 파일/환경변수에서 로드.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 탐지기 설정
    #[serde(default)]
    pub detector: DetectorConfig,
    /// 텍스트 추출기 설정
    #[serde(default)]
    pub extractor: ExtractorConfig,
    /// 주석 스트림 설정
    #[serde(default)]
    pub stream: StreamConfig,
    /// 웹 서버 설정
    #[serde(default)]
    pub web: WebConfig,
    /// 상태 파일 퍼시스턴스 설정
    #[serde(default)]
    pub persist: PersistConfig,
}

impl AppConfig {
    /// 기본 설정
    pub fn default_config() -> Self {
        Self::default()
    }
}

// ============================================================
// 탐지기 설정
// ============================================================

/// 탐지기 설정 — 모델 경로와 추론 주기/임계값
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// ONNX 모델 파일 경로
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// 라벨 어휘 JSON 파일 경로 (없으면 모델 메타데이터에서 읽음)
    #[serde(default)]
    pub labels_path: Option<PathBuf>,
    /// 탐지 사이클 간격 (밀리초)
    #[serde(default = "default_detector_interval_ms")]
    pub cycle_interval_ms: u64,
    /// 신뢰도 임계값 (0..1)
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// NMS IoU 임계값 (0..1)
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    /// 모델 입력 한 변 크기 (정사각, 픽셀)
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    /// 프레임당 최대 탐지 수
    #[serde(default = "default_max_detections")]
    pub max_detections: usize,
}

impl DetectorConfig {
    /// 사이클 간격을 Duration으로 반환
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            labels_path: None,
            cycle_interval_ms: default_detector_interval_ms(),
            confidence_threshold: default_confidence_threshold(),
            iou_threshold: default_iou_threshold(),
            input_size: default_input_size(),
            max_detections: default_max_detections(),
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from("nunbit.onnx")
}

fn default_detector_interval_ms() -> u64 {
    100
}

fn default_confidence_threshold() -> f32 {
    0.25
}

fn default_iou_threshold() -> f32 {
    0.45
}

fn default_input_size() -> u32 {
    640
}

fn default_max_detections() -> usize {
    300
}

// ============================================================
// 텍스트 추출기 설정
// ============================================================

/// 텍스트 추출기 설정 — 탐지기보다 느린 자체 주기로 동작
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// 추출기 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 추출 사이클 간격 (밀리초)
    #[serde(default = "default_extractor_interval_ms")]
    pub cycle_interval_ms: u64,
    /// 크롭 전 박스 확장 여백 (픽셀)
    #[serde(default = "default_crop_margin_px")]
    pub crop_margin_px: u32,
    /// 박스당 OCR 호출 타임아웃 (밀리초)
    #[serde(default = "default_ocr_timeout_ms")]
    pub ocr_timeout_ms: u64,
    /// Tesseract 데이터 경로 (None이면 시스템 기본값)
    #[serde(default)]
    pub tessdata_path: Option<PathBuf>,
}

impl ExtractorConfig {
    /// 사이클 간격을 Duration으로 반환
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    /// OCR 타임아웃을 Duration으로 반환
    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_millis(self.ocr_timeout_ms)
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cycle_interval_ms: default_extractor_interval_ms(),
            crop_margin_px: default_crop_margin_px(),
            ocr_timeout_ms: default_ocr_timeout_ms(),
            tessdata_path: None,
        }
    }
}

fn default_extractor_interval_ms() -> u64 {
    1_000
}

fn default_crop_margin_px() -> u32 {
    5
}

fn default_ocr_timeout_ms() -> u64 {
    3_000
}

// ============================================================
// 스트림 설정
// ============================================================

/// 주석 스트림 설정 — 박스 오버레이 + JPEG 인코딩 주기
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// 스트림 틱 간격 (밀리초)
    #[serde(default = "default_stream_tick_ms")]
    pub tick_interval_ms: u64,
    /// JPEG 품질 (1..100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// 캡션 폰트 파일 경로 (None이면 알려진 시스템 경로 탐색)
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

impl StreamConfig {
    /// 틱 간격을 Duration으로 반환
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_stream_tick_ms(),
            jpeg_quality: default_jpeg_quality(),
            font_path: None,
        }
    }
}

fn default_stream_tick_ms() -> u64 {
    100
}

fn default_jpeg_quality() -> u8 {
    80
}

// ============================================================
// 웹 서버 설정
// ============================================================

/// 로컬 웹 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// 기본 포트
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// 외부 접속 허용 (true면 0.0.0.0 바인드)
    #[serde(default)]
    pub allow_external: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
            allow_external: false,
        }
    }
}

fn default_web_port() -> u16 {
    5_000
}

// ============================================================
// 퍼시스턴스 설정
// ============================================================

/// 상태 파일 퍼시스턴스 설정.
///
/// 비활성(기본)이면 상태는 인메모리 스토어에만 존재한다. 활성화하면
/// 스냅샷/텍스트 맵이 라벨별 JSON 파일로 원자적으로 미러링된다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistConfig {
    /// 파일 미러링 활성화 여부
    #[serde(default)]
    pub enabled: bool,
    /// 상태 디렉토리 (None이면 플랫폼 데이터 디렉토리 하위 `state`)
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}
