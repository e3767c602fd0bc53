//! # nunbit-detect
//!
//! 객체 탐지 어댑터 크레이트.
//! ONNX YOLO 모델을 ort 세션으로 돌리는 [`ObjectDetector`] 구현과
//! 라벨 어휘 로드, 순수 후처리(레터박스, 디코드, NMS)를 제공한다.
//! 세션 자체는 `onnx` feature 뒤에 있다 — 후처리와 어휘 파싱은 항상
//! 빌드되고 테스트된다.
//!
//! [`ObjectDetector`]: nunbit_core::ports::ObjectDetector

pub mod labels;
pub mod postprocess;
#[cfg(feature = "onnx")]
pub mod yolo;
