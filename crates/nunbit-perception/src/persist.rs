//! 상태 파일 미러링.
//!
//! 레이아웃: 라벨별 `<label>.json` (박스 목록) + `labels.json` (개수 요약)
//! + `text_map.json` (통합 텍스트 맵). 모든 기록은 같은 디렉토리에 임시
//! 파일을 쓴 뒤 rename으로 교체한다 — 읽는 쪽은 절대 찢어진 파일을 보지
//! 않는다. 손상되거나 없는 파일은 콜드 스타트로 취급한다.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use nunbit_core::error::CoreError;
use nunbit_core::models::geometry::BoundingBox;
use nunbit_core::models::snapshot::DetectionSnapshot;
use nunbit_core::models::text_map::TextMap;

/// 개수 요약 파일 이름
const SUMMARY_FILE: &str = "labels.json";

/// 텍스트 맵 파일 이름
const TEXT_MAP_FILE: &str = "text_map.json";

/// 상태 디렉토리에 스냅샷/텍스트 맵을 미러링하는 싱크
pub struct StateSink {
    dir: PathBuf,
}

impl StateSink {
    /// 싱크 생성 (디렉토리가 없으면 만든다)
    pub async fn new(dir: PathBuf) -> Result<Self, CoreError> {
        fs::create_dir_all(&dir).await?;
        info!("상태 디렉토리: {}", dir.display());
        Ok(Self { dir })
    }

    /// 스냅샷 미러링: 라벨별 박스 파일 전부 + 개수 요약.
    ///
    /// 요약 파일을 마지막에 쓴다 — 요약에 있는 라벨의 박스 파일은 이미
    /// 교체가 끝난 상태다.
    pub async fn write_snapshot(&self, snapshot: &DetectionSnapshot) -> Result<(), CoreError> {
        for (label, boxes) in &snapshot.boxes {
            self.write_atomic(&label_file_name(label), boxes).await?;
        }
        self.write_atomic(SUMMARY_FILE, &snapshot.counts).await?;
        debug!(
            generation = snapshot.generation,
            labels = snapshot.boxes.len(),
            "스냅샷 미러링 완료"
        );
        Ok(())
    }

    /// 텍스트 맵 미러링
    pub async fn write_text_map(&self, map: &TextMap) -> Result<(), CoreError> {
        self.write_atomic(TEXT_MAP_FILE, &map.entries).await
    }

    /// 디스크에서 스냅샷 복원 시도.
    ///
    /// 요약 파일에 나열된 라벨의 박스 파일을 모은다. 아무 파일이든
    /// 없거나 손상이면 `None` — 콜드 스타트이지 에러가 아니다.
    pub async fn load_snapshot(
        &self,
    ) -> Option<(BTreeMap<String, u32>, BTreeMap<String, Vec<BoundingBox>>)> {
        let counts: BTreeMap<String, u32> = self.read_json(SUMMARY_FILE).await?;

        let mut boxes = BTreeMap::new();
        for label in counts.keys() {
            let list: Vec<BoundingBox> = self.read_json(&label_file_name(label)).await?;
            boxes.insert(label.clone(), list);
        }

        info!(labels = counts.len(), "디스크에서 스냅샷 복원");
        Some((counts, boxes))
    }

    /// 디스크에서 텍스트 맵 복원 시도
    pub async fn load_text_map(&self) -> Option<BTreeMap<String, BoundingBox>> {
        self.read_json(TEXT_MAP_FILE).await
    }

    /// 임시 파일 + rename으로 원자적 기록
    async fn write_atomic<T: Serialize>(&self, file_name: &str, value: &T) -> Result<(), CoreError> {
        let path = self.dir.join(file_name);
        let tmp = self.dir.join(format!("{file_name}.tmp"));

        let json = serde_json::to_vec_pretty(value)?;
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// JSON 파일 읽기. 없거나 손상이면 `None` + 경고 로그.
    async fn read_json<T: DeserializeOwned>(&self, file_name: &str) -> Option<T> {
        let path = self.dir.join(file_name);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(_) => return None,
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("손상된 상태 파일 {} — 콜드 스타트로 취급: {e}", path.display());
                None
            }
        }
    }
}

/// 라벨을 안전한 파일 이름으로 변환.
///
/// 경로 구분자 등은 `_`로 치환한다 — 라벨 어휘 자체는 바뀌지 않는다.
fn label_file_name(label: &str) -> String {
    let safe: String = label
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use nunbit_core::models::detection::Detection;

    fn snapshot_with_cup() -> DetectionSnapshot {
        let vocab = vec!["cup".to_string(), "cell phone".to_string()];
        let dets = vec![Detection::new(
            "cup",
            BoundingBox::new(10.0, 10.0, 50.0, 50.0),
            0.9,
        )];
        DetectionSnapshot::from_detections(&vocab, &dets)
    }

    #[test]
    fn label_file_names_are_path_safe() {
        assert_eq!(label_file_name("cup"), "cup.json");
        assert_eq!(label_file_name("cell phone"), "cell_phone.json");
        assert_eq!(label_file_name("../evil"), "___evil.json");
    }

    #[tokio::test]
    async fn snapshot_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let sink = StateSink::new(dir.path().to_path_buf()).await.unwrap();

        sink.write_snapshot(&snapshot_with_cup()).await.unwrap();

        let (counts, boxes) = sink.load_snapshot().await.unwrap();
        assert_eq!(counts["cup"], 1);
        assert_eq!(counts["cell phone"], 0);
        assert_eq!(boxes["cup"], vec![BoundingBox::new(10.0, 10.0, 50.0, 50.0)]);
        assert!(boxes["cell phone"].is_empty());
    }

    #[tokio::test]
    async fn label_files_hold_plain_box_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let sink = StateSink::new(dir.path().to_path_buf()).await.unwrap();

        sink.write_snapshot(&snapshot_with_cup()).await.unwrap();

        // 와이어 포맷: 4-숫자 배열의 배열
        let raw = tokio::fs::read_to_string(dir.path().join("cup.json"))
            .await
            .unwrap();
        let parsed: Vec<[f32; 4]> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, vec![[10.0, 10.0, 50.0, 50.0]]);
    }

    #[tokio::test]
    async fn missing_state_loads_as_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let sink = StateSink::new(dir.path().to_path_buf()).await.unwrap();

        assert!(sink.load_snapshot().await.is_none());
        assert!(sink.load_text_map().await.is_none());
    }

    #[tokio::test]
    async fn corrupt_summary_loads_as_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let sink = StateSink::new(dir.path().to_path_buf()).await.unwrap();

        tokio::fs::write(dir.path().join(SUMMARY_FILE), b"{not json")
            .await
            .unwrap();

        assert!(sink.load_snapshot().await.is_none());
    }

    #[tokio::test]
    async fn text_map_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let sink = StateSink::new(dir.path().to_path_buf()).await.unwrap();

        let mut map = TextMap::empty();
        map.insert("Save".to_string(), BoundingBox::new(1.0, 2.0, 3.0, 4.0));
        sink.write_text_map(&map).await.unwrap();

        let loaded = sink.load_text_map().await.unwrap();
        assert_eq!(loaded["Save"], BoundingBox::new(1.0, 2.0, 3.0, 4.0));
    }

    #[tokio::test]
    async fn rewrite_replaces_without_leftover_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let sink = StateSink::new(dir.path().to_path_buf()).await.unwrap();

        sink.write_snapshot(&snapshot_with_cup()).await.unwrap();
        sink.write_snapshot(&snapshot_with_cup()).await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().to_string();
            assert!(!name.ends_with(".tmp"), "임시 파일 잔존: {name}");
        }
    }
}
