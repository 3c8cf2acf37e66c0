//! 파일 수집 태스크 — 리프 파일을 아티팩트로 수집

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use strata_core::types::Artifact;

use crate::context::ScanContext;
use crate::error::ScanEngineError;
use crate::hash;
use crate::task::{ScanTask, attach_provenance};

/// 파일 수집 태스크
///
/// 규칙:
/// - 길이 0 파일은 아티팩트가 되지 않고 그대로 버려집니다.
/// - 아티팩트 ID는 파일명, 경로는 스캔 루트 기준 상대 경로입니다.
/// - 암묵적 언랩이 켜져 있고 경로가 언랩 대상 패턴에 매칭되면
///   언랩 대기 표시 후 종료합니다 (해시 계산은 언랩 태스크로 연기).
/// - 그 외에는 체크섬 집합을 계산하고, 레거시 다이제스트가 패턴
///   앵커와 일치하면 앵커 표시를 남깁니다.
pub struct FileCollectTask {
    file: PathBuf,
    chain: Vec<String>,
}

impl FileCollectTask {
    /// 새 수집 태스크를 생성합니다.
    pub fn new(file: PathBuf, chain: Vec<String>) -> Self {
        Self { file, chain }
    }

    /// 파일을 수집합니다.
    pub fn process(self, context: &mut ScanContext) -> Result<(), ScanEngineError> {
        let filename = self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative = context.relative_path(&self.file);

        let mut artifact = Artifact::new(filename, relative.clone());

        match fs::metadata(&self.file) {
            Ok(metadata) => {
                if metadata.len() == 0 {
                    debug!(path = %relative, "zero-length file dropped");
                    return Ok(());
                }
            }
            Err(e) => {
                // 파일 단위 I/O 장애: 이슈만 남기고 부분 데이터로 계속
                artifact.push_issue(format!("metadata read failed: {e}"));
                attach_provenance(context, &mut artifact, &self.chain);
                context.contribute(artifact);
                return Ok(());
            }
        }

        if context.is_unwrap_eligible(&relative) {
            artifact.pending_unwrap = true;
            attach_provenance(context, &mut artifact, &self.chain);
            context.contribute(artifact);
            context.enqueue(ScanTask::unwrap_artifact(self.file, relative, self.chain));
            return Ok(());
        }

        match hash::checksum_file(&self.file) {
            Ok(checksums) => {
                if context.matcher().anchor_pattern(&checksums.digest).is_some() {
                    artifact.anchor = true;
                }
                artifact.set_checksums(checksums);
            }
            Err(e) => artifact.push_issue(format!("checksum failed: {e}")),
        }

        if let Some(identity) = context.matcher().identify(&relative) {
            artifact.artifact_type = Some(identity.component_type.clone());
            artifact.source_type = Some(identity.specific_type.clone());
            artifact.identity = Some(identity);
        }

        attach_provenance(context, &mut artifact, &self.chain);
        context.contribute(artifact);
        Ok(())
    }
}
