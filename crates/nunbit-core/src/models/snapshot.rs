//! 탐지 스냅샷.
//!
//! 탐지기 한 사이클의 불변 출력: 라벨별 개수 + 라벨별 박스 목록.
//! 한 번 게시되면 수정되지 않고 다음 세대로 통째로 교체된다.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::detection::Detection;
use super::geometry::BoundingBox;

/// 한 탐지 사이클의 불변 결과.
///
/// 게시된 모든 스냅샷은 고정 어휘의 **모든** 라벨을 `counts`와 `boxes`에
/// 키로 가진다 — 이번 사이클에 탐지되지 않은 라벨은 0 / 빈 목록.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSnapshot {
    /// 단조 증가 세대 번호. 0이면 콜드 스타트 (아직 게시된 적 없음).
    pub generation: u64,
    /// 프레임 캡처 시각
    pub captured_at: DateTime<Utc>,
    /// 라벨 → 탐지 개수
    pub counts: BTreeMap<String, u32>,
    /// 라벨 → 바운딩 박스 목록
    pub boxes: BTreeMap<String, Vec<BoundingBox>>,
}

impl DetectionSnapshot {
    /// 콜드 스타트 스냅샷 (세대 0, 빈 매핑)
    pub fn empty() -> Self {
        Self {
            generation: 0,
            captured_at: Utc::now(),
            counts: BTreeMap::new(),
            boxes: BTreeMap::new(),
        }
    }

    /// 탐지 결과 목록에서 스냅샷 조립.
    ///
    /// 어휘의 모든 라벨을 0/빈 목록으로 먼저 초기화한 뒤 누적한다.
    /// 어휘 밖 라벨이 들어와도 버리지 않고 포함한다.
    /// 세대 번호는 스토어가 게시 시점에 부여한다.
    pub fn from_detections(vocabulary: &[String], detections: &[Detection]) -> Self {
        let mut counts: BTreeMap<String, u32> =
            vocabulary.iter().map(|l| (l.clone(), 0)).collect();
        let mut boxes: BTreeMap<String, Vec<BoundingBox>> =
            vocabulary.iter().map(|l| (l.clone(), Vec::new())).collect();

        for det in detections {
            *counts.entry(det.label.clone()).or_insert(0) += 1;
            boxes.entry(det.label.clone()).or_default().push(det.bbox);
        }

        Self {
            generation: 0,
            captured_at: Utc::now(),
            counts,
            boxes,
        }
    }

    /// 아직 아무것도 게시되지 않은 상태인지 여부
    pub fn is_cold(&self) -> bool {
        self.generation == 0
    }

    /// 읽기 목록: 모든 라벨의 박스를 라벨 순서대로 평탄화.
    ///
    /// 텍스트 추출기의 한 사이클 작업 큐가 된다.
    pub fn read_list(&self) -> Vec<BoundingBox> {
        self.boxes.values().flatten().copied().collect()
    }

    /// 특정 라벨의 박스 목록 (없으면 빈 목록)
    pub fn positions(&self, label: &str) -> Vec<BoundingBox> {
        self.boxes.get(label).cloned().unwrap_or_default()
    }
}

impl Default for DetectionSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vec<String> {
        vec![
            "button".to_string(),
            "cup".to_string(),
            "icon".to_string(),
        ]
    }

    #[test]
    fn every_vocabulary_label_present_even_with_zero_detections() {
        let snapshot = DetectionSnapshot::from_detections(&vocab(), &[]);
        for label in vocab() {
            assert_eq!(snapshot.counts[&label], 0);
            assert!(snapshot.boxes[&label].is_empty());
        }
    }

    #[test]
    fn accumulates_counts_and_boxes_per_label() {
        let dets = vec![
            Detection::new("cup", BoundingBox::new(10.0, 10.0, 50.0, 50.0), 0.9),
            Detection::new("cup", BoundingBox::new(60.0, 60.0, 90.0, 90.0), 0.8),
            Detection::new("button", BoundingBox::new(0.0, 0.0, 5.0, 5.0), 0.7),
        ];
        let snapshot = DetectionSnapshot::from_detections(&vocab(), &dets);

        assert_eq!(snapshot.counts["cup"], 2);
        assert_eq!(snapshot.counts["button"], 1);
        assert_eq!(snapshot.counts["icon"], 0);
        assert_eq!(snapshot.boxes["cup"].len(), 2);
        assert_eq!(snapshot.boxes["cup"][0], BoundingBox::new(10.0, 10.0, 50.0, 50.0));
    }

    #[test]
    fn out_of_vocabulary_label_is_kept() {
        let dets = vec![Detection::new(
            "mystery",
            BoundingBox::new(1.0, 1.0, 2.0, 2.0),
            0.5,
        )];
        let snapshot = DetectionSnapshot::from_detections(&vocab(), &dets);
        assert_eq!(snapshot.counts["mystery"], 1);
    }

    #[test]
    fn read_list_flattens_all_boxes() {
        let dets = vec![
            Detection::new("cup", BoundingBox::new(10.0, 10.0, 50.0, 50.0), 0.9),
            Detection::new("button", BoundingBox::new(0.0, 0.0, 5.0, 5.0), 0.7),
        ];
        let snapshot = DetectionSnapshot::from_detections(&vocab(), &dets);
        let list = snapshot.read_list();
        // BTreeMap 순회 → 라벨 사전순 (button 먼저)
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], BoundingBox::new(0.0, 0.0, 5.0, 5.0));
        assert_eq!(list[1], BoundingBox::new(10.0, 10.0, 50.0, 50.0));
    }

    #[test]
    fn cold_snapshot_is_generation_zero_and_empty() {
        let snapshot = DetectionSnapshot::empty();
        assert!(snapshot.is_cold());
        assert!(snapshot.counts.is_empty());
        assert!(snapshot.read_list().is_empty());
        assert!(snapshot.positions("anything").is_empty());
    }
}
