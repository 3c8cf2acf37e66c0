//! 패턴 파일 로더 — YAML 패턴 파일을 디스크에서 로드합니다.
//!
//! 패턴 디렉토리 내의 `.yml`/`.yaml` 파일을 스캔하고 파싱합니다.
//! 잘못된 패턴 설정은 스캔 시작 전 치명적 에러입니다 — 규칙 파일
//! 파싱 실패는 건너뛰지 않고 즉시 반환됩니다. 중복 ID만 경고 후
//! 건너뜁니다.

use std::collections::HashSet;
use std::path::Path;

use crate::error::ScanEngineError;

use super::PatternRule;

/// 패턴 파일 로더 설정
const MAX_PATTERN_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// 패턴 파일 로더
pub struct PatternLoader;

impl PatternLoader {
    /// 디렉토리에서 모든 YAML 패턴 파일을 로드합니다.
    ///
    /// `.yml` 또는 `.yaml` 확장자를 가진 파일만 처리합니다.
    /// 파일 순서는 파일명 사전순이며, 파일 내 선언 순서는 보존됩니다 —
    /// 패턴 선언 순서는 매칭 의미를 가집니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 패턴 파일이 YAML로 파싱되지 않는 경우 (치명적)
    /// - 규칙 수가 `max_rules`를 초과하는 경우
    pub async fn load_directory(
        dir: impl AsRef<Path>,
        max_rules: usize,
    ) -> Result<Vec<PatternRule>, ScanEngineError> {
        let dir = dir.as_ref();

        let mut entries =
            tokio::fs::read_dir(dir)
                .await
                .map_err(|e| ScanEngineError::PatternLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory: {e}"),
                })?;

        let mut files = Vec::new();
        while let Some(entry) =
            entries
                .next_entry()
                .await
                .map_err(|e| ScanEngineError::PatternLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory entry: {e}"),
                })?
        {
            let path = entry.path();

            // .yml / .yaml 확장자만 처리
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if is_yaml {
                files.push(path);
            }
        }
        files.sort();

        let mut rules = Vec::new();
        let mut seen_ids = HashSet::new();

        for path in files {
            let file_rules = Self::load_file(&path).await?;

            for rule in file_rules {
                // 중복 ID 검사
                if seen_ids.contains(&rule.id) {
                    tracing::warn!(
                        rule_id = %rule.id,
                        path = %path.display(),
                        "duplicate pattern id, skipping"
                    );
                    continue;
                }
                seen_ids.insert(rule.id.clone());
                rules.push(rule);

                if rules.len() > max_rules {
                    return Err(ScanEngineError::PatternLoad {
                        path: dir.display().to_string(),
                        reason: format!("too many pattern rules: max {max_rules}"),
                    });
                }
            }
        }

        tracing::info!(
            dir = %dir.display(),
            count = rules.len(),
            "loaded component pattern rules"
        );

        Ok(rules)
    }

    /// 단일 YAML 파일에서 패턴 규칙 목록을 로드합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<PatternRule>, ScanEngineError> {
        let path = path.as_ref();

        // 파일 크기 검증
        let metadata =
            tokio::fs::metadata(path)
                .await
                .map_err(|e| ScanEngineError::PatternLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file metadata: {e}"),
                })?;

        if metadata.len() > MAX_PATTERN_FILE_SIZE {
            return Err(ScanEngineError::PatternLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_PATTERN_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ScanEngineError::PatternLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        serde_yaml::from_str(&content).map_err(|e| ScanEngineError::PatternLoad {
            path: path.display().to_string(),
            reason: format!("invalid yaml: {e}"),
        })
    }
}
