//! 버전 셀 — 원자적으로 통째 교체되는 공유 컨테이너.
//!
//! 게시자는 값을 완전히 구성한 뒤 `Arc` 포인터 스왑으로 교체한다.
//! 읽기자는 포인터 복제만 하므로 쓰기 도중의 부분 상태를 절대 볼 수 없고,
//! 게시 진행 중에도 블록되지 않는다. 스토어당 쓰기자는 하나뿐이다:
//! 탐지 스토어는 탐지기만, 텍스트 스토어는 추출기만 쓴다.

use std::sync::Arc;

use parking_lot::RwLock;

use nunbit_core::models::snapshot::DetectionSnapshot;
use nunbit_core::models::text_map::TextMap;

/// 세대 번호를 가진 값. 셀이 게시 시점에 번호를 부여한다.
pub trait Versioned {
    /// 현재 세대 번호
    fn generation(&self) -> u64;
    /// 세대 번호 부여 (게시 시 셀이 호출)
    fn set_generation(&mut self, generation: u64);
}

impl Versioned for DetectionSnapshot {
    fn generation(&self) -> u64 {
        self.generation
    }

    fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }
}

impl Versioned for TextMap {
    fn generation(&self) -> u64 {
        self.generation
    }

    fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }
}

/// 원자적 통째-교체 셀.
///
/// 콜드 스타트 계약: 게시 전 `current()`는 `T::default()` (세대 0)를
/// 반환하며 절대 실패하지 않는다.
pub struct VersionedCell<T> {
    slot: RwLock<Arc<T>>,
}

impl<T: Versioned + Default> VersionedCell<T> {
    /// 콜드 스타트 값으로 초기화된 셀 생성
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(Arc::new(T::default())),
        }
    }

    /// 완성된 값을 게시하고 새 세대 번호를 반환.
    ///
    /// 값 구성은 락 밖에서 끝나 있어야 한다 — 락 안에서는 세대 부여와
    /// 포인터 스왑만 일어난다.
    pub fn publish(&self, mut value: T) -> u64 {
        let mut slot = self.slot.write();
        let next = slot.generation() + 1;
        value.set_generation(next);
        *slot = Arc::new(value);
        next
    }

    /// 현재 값의 읽기 전용 참조 반환.
    ///
    /// 항상 완전한(찢어지지 않은) 어떤 세대의 값이다 — 오래됐을 수는 있다.
    pub fn current(&self) -> Arc<T> {
        self.slot.read().clone()
    }

    /// 현재 세대 번호
    pub fn generation(&self) -> u64 {
        self.slot.read().generation()
    }
}

impl<T: Versioned + Default> Default for VersionedCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 탐지 스냅샷 스토어 (쓰기자: 탐지기)
pub type DetectionStore = VersionedCell<DetectionSnapshot>;

/// 텍스트 맵 스토어 (쓰기자: 텍스트 추출기)
pub type TextStore = VersionedCell<TextMap>;
