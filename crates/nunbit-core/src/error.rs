//! NUNBIT 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 자체 실패를 `CoreError` 변형으로 래핑한다.
//! 치명(fatal) 클래스는 [`CoreError::ModelLoad`] 하나뿐이다 — 나머지는
//! 사이클/박스 단위로 흡수되고 이전 상태가 유효하게 남는다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 스크린 캡처 실패 (일시적 — 해당 사이클 스킵)
    #[error("캡처 에러: {0}")]
    Capture(String),

    /// 탐지 모델 로드 실패 (치명적 — 프로세스 중단)
    #[error("모델 로드 실패: {0}")]
    ModelLoad(String),

    /// 추론 실패 (일시적 — 해당 사이클 스킵)
    #[error("추론 에러: {0}")]
    Inference(String),

    /// OCR 처리 실패 (일시적 — 해당 박스 스킵)
    #[error("OCR 에러: {0}")]
    Ocr(String),

    /// 협력자 호출 타임아웃
    #[error("타임아웃: {timeout_ms}ms 초과")]
    Timeout {
        /// 초과된 타임아웃 시간 (밀리초)
        timeout_ms: u64,
    },

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl CoreError {
    /// 프로세스를 중단해야 하는 에러인지 여부.
    ///
    /// 모델 없이 파이프라인은 동작할 수 없으므로 [`CoreError::ModelLoad`]만
    /// 치명적으로 취급한다.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::ModelLoad(_))
    }
}
