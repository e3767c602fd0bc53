//! # nunbit-app
//!
//! NUNBIT 바이너리 진입점.
//! DI 컨테이너 역할: 협력자 어댑터 구성, 스토어/루프 와이어링,
//! 라이프사이클(시그널 → 종료 신호) 관리.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nunbit_core::config::{DetectorConfig, ExtractorConfig};
use nunbit_core::config_manager::ConfigManager;
use nunbit_core::error::CoreError;
use nunbit_core::models::snapshot::DetectionSnapshot;
use nunbit_core::models::text_map::TextMap;
use nunbit_core::ports::{FrameSource, ObjectDetector, OcrProvider};
use nunbit_perception::detector::DetectorLoop;
use nunbit_perception::extractor::TextExtractorLoop;
use nunbit_perception::persist::StateSink;
use nunbit_perception::query::QueryService;
use nunbit_perception::store::{DetectionStore, TextStore};
use nunbit_perception::stream::{StreamPublisher, StreamRenderer};
use nunbit_vision::annotate::FrameAnnotator;
use nunbit_vision::capture::ScreenCapture;
use nunbit_web::{AppState, WebServer};

/// NUNBIT — 화면 지각 파이프라인
///
/// 주 모니터를 계속 관찰하며 객체 탐지 스냅샷과 OCR 텍스트 맵을
/// 로컬 HTTP API와 주석 비디오 스트림으로 노출한다.
#[derive(Parser, Debug)]
#[command(name = "nunbit")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 nunbit.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// ONNX 모델 경로 (설정 오버라이드)
    #[arg(long, short = 'm')]
    model: Option<PathBuf>,

    /// 라벨 어휘 JSON 파일 경로 (없으면 모델 메타데이터 사용)
    #[arg(long)]
    labels: Option<PathBuf>,

    /// 웹 서버 포트
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 상태 파일 미러링 디렉토리 (지정 시 퍼시스턴스 활성화)
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// 텍스트 추출 루프 비활성화
    #[arg(long)]
    no_extractor: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "nunbit={0},nunbit_core={0},nunbit_vision={0},nunbit_detect={0},nunbit_perception={0},nunbit_web={0}",
        args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    info!("NUNBIT 시작");

    // 설정 로드 + CLI 오버라이드
    let mut config = ConfigManager::load(args.config.as_deref())?;
    if let Some(model) = args.model {
        config.detector.model_path = model;
    }
    if let Some(labels) = args.labels {
        config.detector.labels_path = Some(labels);
    }
    if let Some(port) = args.port {
        config.web.port = port;
    }
    if let Some(dir) = args.state_dir {
        config.persist.enabled = true;
        config.persist.state_dir = Some(dir);
    }
    if args.no_extractor {
        config.extractor.enabled = false;
    }

    // 협력자 어댑터 — 모델 로드 실패는 치명, 루프 진입 전에 중단한다
    let frames: Arc<dyn FrameSource> = Arc::new(ScreenCapture::new());
    let model = build_detector(&config.detector)
        .map_err(|e| anyhow!("탐지 백엔드 초기화 실패 (치명): {e}"))?;
    let ocr = build_ocr(&config.extractor);
    info!("OCR 제공자: {}", ocr.provider_name());

    // 스토어 — 스토어당 쓰기자는 하나 (탐지기/추출기)
    let detections = Arc::new(DetectionStore::new());
    let texts = Arc::new(TextStore::new());

    // 선택적 파일 미러링 + 디스크 상태 예열
    let sink = match build_sink(&config).await? {
        Some(sink) => {
            warm_stores(&sink, &detections, &texts).await;
            Some(sink)
        }
        None => None,
    };

    // 루프/서비스 와이어링
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut detector_loop = DetectorLoop::new(
        frames.clone(),
        model,
        detections.clone(),
        config.detector.cycle_interval(),
    );
    if let Some(sink) = &sink {
        detector_loop = detector_loop.with_sink(sink.clone());
    }

    let annotator = FrameAnnotator::new(config.stream.font_path.as_deref());
    let renderer = Arc::new(StreamRenderer::new(
        frames.clone(),
        detections.clone(),
        annotator,
        config.stream.jpeg_quality,
    ));
    let publisher = StreamPublisher::new(renderer.clone(), config.stream.tick_interval());
    let frame_events = publisher.sender();

    let query = Arc::new(QueryService::new(
        detections.clone(),
        texts.clone(),
        frames.clone(),
        ocr.clone(),
        config.extractor.crop_margin_px,
        config.extractor.ocr_timeout(),
    ));

    let state = AppState {
        query,
        renderer,
        frame_events,
        stream_tick: config.stream.tick_interval(),
    };
    let server = WebServer::new(state, config.web.clone());

    let mut tasks = Vec::new();
    tasks.push(tokio::spawn(detector_loop.run(shutdown_rx.clone())));

    if config.extractor.enabled {
        let mut extractor_loop = TextExtractorLoop::new(
            frames.clone(),
            ocr.clone(),
            detections.clone(),
            texts.clone(),
            config.extractor.cycle_interval(),
            config.extractor.ocr_timeout(),
            config.extractor.crop_margin_px,
        );
        if let Some(sink) = &sink {
            extractor_loop = extractor_loop.with_sink(sink.clone());
        }
        tasks.push(tokio::spawn(extractor_loop.run(shutdown_rx.clone())));
    } else {
        info!("텍스트 추출 루프 비활성화됨");
    }

    tasks.push(tokio::spawn(publisher.run(shutdown_rx.clone())));
    tasks.push(tokio::spawn(async move {
        if let Err(e) = server.run(shutdown_rx).await {
            error!("웹 서버 실패: {e}");
        }
    }));

    // 시그널 → 종료 신호. 진행 중인 협력자 호출은 완료까지 기다린다.
    wait_for_signal().await;
    info!("종료 신호 발송");
    let _ = shutdown_tx.send(true);

    for task in tasks {
        let _ = task.await;
    }

    info!("NUNBIT 종료");
    Ok(())
}

/// 탐지 백엔드 구성 (`onnx` feature)
#[cfg(feature = "onnx")]
fn build_detector(config: &DetectorConfig) -> Result<Arc<dyn ObjectDetector>, CoreError> {
    use nunbit_detect::yolo::{YoloDetector, YoloParams};

    let params = YoloParams {
        input_size: config.input_size,
        confidence_threshold: config.confidence_threshold,
        iou_threshold: config.iou_threshold,
        max_detections: config.max_detections,
    };
    let detector = YoloDetector::load(&config.model_path, config.labels_path.as_deref(), params)?;
    Ok(Arc::new(detector))
}

/// 탐지 백엔드 없음 — 모델 부재와 같은 치명 클래스
#[cfg(not(feature = "onnx"))]
fn build_detector(_config: &DetectorConfig) -> Result<Arc<dyn ObjectDetector>, CoreError> {
    Err(CoreError::ModelLoad(
        "onnx feature 없이 빌드됨 — 탐지 백엔드 없음 (`--features onnx`로 빌드)".to_string(),
    ))
}

/// OCR 제공자 구성 (`ocr` feature)
#[cfg(feature = "ocr")]
fn build_ocr(config: &ExtractorConfig) -> Arc<dyn OcrProvider> {
    Arc::new(nunbit_vision::ocr::TesseractOcr::new(
        config.tessdata_path.clone(),
    ))
}

/// OCR 비활성 — 추출기는 빈 텍스트 맵을 게시한다
#[cfg(not(feature = "ocr"))]
fn build_ocr(_config: &ExtractorConfig) -> Arc<dyn OcrProvider> {
    Arc::new(nunbit_vision::ocr::DisabledOcr)
}

/// 퍼시스턴스 싱크 구성
async fn build_sink(config: &nunbit_core::config::AppConfig) -> Result<Option<Arc<StateSink>>> {
    if !config.persist.enabled {
        return Ok(None);
    }
    let dir = config
        .persist
        .state_dir
        .clone()
        .or_else(|| ConfigManager::default_data_dir().map(|d| d.join("state")))
        .ok_or_else(|| anyhow!("상태 디렉토리를 결정할 수 없음"))?;
    let sink = StateSink::new(dir).await?;
    Ok(Some(Arc::new(sink)))
}

/// 디스크 상태로 스토어 예열. 손상/부재는 콜드 스타트.
async fn warm_stores(sink: &StateSink, detections: &DetectionStore, texts: &TextStore) {
    if let Some((counts, boxes)) = sink.load_snapshot().await {
        let mut snapshot = DetectionSnapshot::empty();
        snapshot.counts = counts;
        snapshot.boxes = boxes;
        detections.publish(snapshot);
    }
    if let Some(entries) = sink.load_text_map().await {
        let mut map = TextMap::empty();
        map.entries = entries;
        texts.publish(map);
    }
}

/// OS 시그널 대기 (SIGINT, SIGTERM)
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                error!("SIGINT 핸들러 등록 실패: {e}");
                return;
            }
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("SIGTERM 핸들러 등록 실패: {e}");
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => info!("SIGINT 수신"),
            _ = sigterm.recv() => info!("SIGTERM 수신"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Ctrl+C 핸들러 등록 실패: {e}");
            return;
        }
        info!("Ctrl+C 수신");
    }
}
