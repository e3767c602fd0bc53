//! 라벨 어휘 로드.
//!
//! 어휘는 모델 로드 시점에 한 번 결정되고 프로세스 수명 동안 불변이다.
//! 출처는 둘: ultralytics 내보내기가 ONNX 메타데이터에 심는 `names`
//! 문자열(`{0: 'person', 1: 'bicycle', ...}`), 또는 명시적 JSON 배열
//! 파일. 어휘를 얻지 못하면 치명 에러다.

use std::collections::BTreeMap;
use std::path::Path;

use nunbit_core::error::CoreError;

/// ultralytics `names` 메타데이터 문자열 파싱.
///
/// 인덱스가 띄엄띄엄이면 빠진 자리는 `class_<i>`로 채운다.
pub fn parse_names_metadata(raw: &str) -> Option<Vec<String>> {
    let inner = raw.trim().strip_prefix('{')?.strip_suffix('}')?;

    let mut by_index: BTreeMap<usize, String> = BTreeMap::new();
    for part in inner.split(',') {
        let (index, name) = part.split_once(':')?;
        let index: usize = index.trim().trim_matches(|c| c == '\'' || c == '"').parse().ok()?;
        let name = name
            .trim()
            .trim_matches(|c| c == '\'' || c == '"')
            .to_string();
        if name.is_empty() {
            return None;
        }
        by_index.insert(index, name);
    }

    let max_index = *by_index.keys().next_back()?;
    Some(
        (0..=max_index)
            .map(|i| {
                by_index
                    .get(&i)
                    .cloned()
                    .unwrap_or_else(|| format!("class_{i}"))
            })
            .collect(),
    )
}

/// JSON 배열 라벨 파일 로드 (`["person", "cup", ...]`)
pub fn load_labels_file(path: &Path) -> Result<Vec<String>, CoreError> {
    let bytes = std::fs::read(path).map_err(|e| {
        CoreError::ModelLoad(format!("라벨 파일 읽기 실패 {}: {e}", path.display()))
    })?;

    let labels: Vec<String> = serde_json::from_slice(&bytes)
        .map_err(|e| CoreError::ModelLoad(format!("라벨 파일 파싱 실패 {}: {e}", path.display())))?;

    if labels.is_empty() {
        return Err(CoreError::ModelLoad(format!(
            "라벨 파일이 비어 있음: {}",
            path.display()
        )));
    }

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn parses_ultralytics_names_string() {
        let labels = parse_names_metadata("{0: 'person', 1: 'bicycle', 2: 'car'}").unwrap();
        assert_eq!(labels, vec!["person", "bicycle", "car"]);
    }

    #[test]
    fn parses_double_quoted_json_style() {
        let labels = parse_names_metadata(r#"{"0": "button", "1": "icon"}"#).unwrap();
        assert_eq!(labels, vec!["button", "icon"]);
    }

    #[test]
    fn sparse_indices_are_backfilled() {
        let labels = parse_names_metadata("{0: 'a', 2: 'c'}").unwrap();
        assert_eq!(labels, vec!["a", "class_1", "c"]);
    }

    #[test]
    fn garbage_metadata_is_rejected() {
        assert!(parse_names_metadata("").is_none());
        assert!(parse_names_metadata("not a dict").is_none());
        assert!(parse_names_metadata("{}").is_none());
        assert!(parse_names_metadata("{x: 'a'}").is_none());
    }

    #[test]
    fn labels_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["button", "icon", "cursor"]"#).unwrap();

        let labels = load_labels_file(file.path()).unwrap();
        assert_eq!(labels, vec!["button", "icon", "cursor"]);
    }

    #[test]
    fn empty_labels_file_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();

        assert_matches!(load_labels_file(file.path()), Err(CoreError::ModelLoad(_)));
    }

    #[test]
    fn missing_labels_file_is_fatal() {
        assert_matches!(
            load_labels_file(Path::new("/nonexistent/labels.json")),
            Err(CoreError::ModelLoad(_))
        );
    }
}
