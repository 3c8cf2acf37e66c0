//! 참조 힌트 DB — 파일명 단위 분류 힌트의 읽기 전용 저장소
//!
//! [`HintDb`]는 JSON 파일에서 힌트 레코드를 로드하여 core의
//! [`ReferenceLookup`] 포트를 구현합니다. 파일이 없으면 빈 DB로
//! 동작합니다 (힌트 없는 저하 모드).
//!
//! # 파일 형식
//!
//! ```json
//! [
//!   { "filename": "base.tar", "classification": "scan" },
//!   { "filename": "vendor.jar", "classification": "atomic" }
//! ]
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use strata_core::pipeline::ReferenceLookup;
use strata_core::types::{Classification, ReferenceHint};

use crate::error::ScanEngineError;

/// 힌트 파일 최대 크기
const MAX_HINT_FILE_SIZE: u64 = 50 * 1024 * 1024; // 50MB

/// JSON 레코드 형식
#[derive(Debug, Deserialize)]
struct HintRecord {
    filename: String,
    classification: Classification,
}

/// 참조 힌트 DB
///
/// 파일명 하나에 힌트가 여러 개 있을 수 있습니다.
#[derive(Debug, Default)]
pub struct HintDb {
    by_filename: HashMap<String, Vec<Classification>>,
}

impl HintDb {
    /// 빈 DB를 생성합니다.
    pub fn empty() -> Self {
        Self::default()
    }

    /// JSON 파일에서 DB를 로드합니다 (동기 I/O).
    ///
    /// `tokio::task::spawn_blocking` 내에서 호출되어야 합니다.
    pub fn load_from_file(path: &Path) -> Result<Self, ScanEngineError> {
        let metadata = std::fs::metadata(path).map_err(|e| ScanEngineError::HintDbLoad {
            path: path.display().to_string(),
            reason: format!("failed to read file metadata: {e}"),
        })?;

        if metadata.len() > MAX_HINT_FILE_SIZE {
            return Err(ScanEngineError::HintDbLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_HINT_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ScanEngineError::HintDbLoad {
            path: path.display().to_string(),
            reason: format!("failed to read file: {e}"),
        })?;

        let records: Vec<HintRecord> =
            serde_json::from_str(&content).map_err(|e| ScanEngineError::HintDbLoad {
                path: path.display().to_string(),
                reason: format!("invalid json: {e}"),
            })?;

        let mut by_filename: HashMap<String, Vec<Classification>> = HashMap::new();
        for record in records {
            by_filename
                .entry(record.filename)
                .or_default()
                .push(record.classification);
        }

        tracing::info!(
            path = %path.display(),
            entries = by_filename.len(),
            "loaded reference hint db"
        );

        Ok(Self { by_filename })
    }

    /// 힌트가 등록된 파일명 수를 반환합니다.
    pub fn entry_count(&self) -> usize {
        self.by_filename.len()
    }

    /// DB가 비어있는지 반환합니다.
    pub fn is_empty(&self) -> bool {
        self.by_filename.is_empty()
    }
}

impl ReferenceLookup for HintDb {
    fn hints_for(&self, filename: &str) -> Vec<ReferenceHint> {
        match self.by_filename.get(filename) {
            Some(classifications) => classifications
                .iter()
                .map(|c| ReferenceHint {
                    filename: filename.to_owned(),
                    classification: *c,
                })
                .collect(),
            None => Vec::new(),
        }
    }
}
