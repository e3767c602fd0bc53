//! 텍스트 맵.
//!
//! 텍스트 추출기 한 사이클의 통합 결과: 정제된 인식 문자열 → 원본 박스.
//! 키는 유일이 보장되지 않는다 — 같은 문자열이 두 박스에서 나오면 나중
//! 항목이 이전 항목을 덮어쓴다 (손실 통합, 의도된 동작). 추출기는 덮어쓸
//! 때마다 로그를 남긴다.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geometry::BoundingBox;

/// 한 추출 사이클의 통합 텍스트 맵
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextMap {
    /// 단조 증가 세대 번호. 0이면 콜드 스타트.
    pub generation: u64,
    /// 맵 생성 시각
    pub built_at: DateTime<Utc>,
    /// 정제된 문자열 → 추출된 박스
    pub entries: BTreeMap<String, BoundingBox>,
}

impl TextMap {
    /// 콜드 스타트 텍스트 맵 (세대 0, 빈 매핑)
    pub fn empty() -> Self {
        Self {
            generation: 0,
            built_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }

    /// 항목 추가. 같은 키가 이미 있으면 교체하고 밀려난 박스를 반환한다.
    pub fn insert(&mut self, text: String, bbox: BoundingBox) -> Option<BoundingBox> {
        self.entries.insert(text, bbox)
    }

    /// 문자열로 박스 조회
    pub fn get(&self, text: &str) -> Option<&BoundingBox> {
        self.entries.get(text)
    }

    /// 항목 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TextMap {
    fn default() -> Self {
        Self::empty()
    }
}
