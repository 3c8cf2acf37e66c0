//! 언랩 태스크 — 언랩 대기 아티팩트의 상태 기계
//!
//! 대상 폴더는 곁의 `[파일명]`이며 시도 전에 항상 삭제됩니다 — 모든
//! 시도는 깨끗한 상태에서 시작합니다 (멱등). 정책 플래그는
//! [`UnwrapPolicy`]가 파일명 단위 힌트 조회에서 유도합니다.
//!
//! 성공 시: 타입 라벨 설정 → 레이어 이미지 후처리 → 제외 판정
//! (통과형 아카이브는 삭제 표시, 최상위 암묵 아카이브는 보존) →
//! 보존 시 체인 연장과 콘텐츠 기반 에셋 등록 → 항상 대상 폴더 위에
//! 디렉토리 태스크 생성.
//!
//! 실패/생략 시: 연기된 체크섬을 지금 계산하고, 언랩 금지 힌트의
//! 분류를 아티팩트로 복사하며, 체인은 바뀌지 않습니다.

use std::fs;
use std::path::PathBuf;

use metrics::counter;
use tracing::{debug, warn};

use strata_core::metrics::{LABEL_RESULT, SCAN_UNWRAP_ATTEMPTS_TOTAL};
use strata_core::types::{Asset, ChecksumSet};

use crate::context::ScanContext;
use crate::error::ScanEngineError;
use crate::hash;
use crate::layer;
use crate::policy::{UnwrapPolicy, extension_of};
use crate::task::{ScanTask, bracket_name};

/// 일반 스코프 에셋 ID 접두어
///
/// 컨테이너 스코프 ID가 이미 있는 아티팩트는 기존 접두어를 보존합니다.
const GENERIC_ASSET_PREFIX: &str = "arc";

/// 에셋 ID에 쓰는 다이제스트 길이
const ASSET_ID_DIGEST_LEN: usize = 8;

/// 언랩 태스크
pub struct UnwrapTask {
    file: PathBuf,
    artifact_path: String,
    chain: Vec<String>,
}

impl UnwrapTask {
    /// 새 언랩 태스크를 생성합니다.
    pub fn new(file: PathBuf, artifact_path: String, chain: Vec<String>) -> Self {
        Self {
            file,
            artifact_path,
            chain,
        }
    }

    /// 이슈 기록 대상 아티팩트의 상대 경로를 반환합니다.
    pub fn artifact_path(&self) -> &str {
        &self.artifact_path
    }

    /// 언랩 상태 기계를 실행합니다.
    pub fn process(self, context: &mut ScanContext) -> Result<(), ScanEngineError> {
        let filename = self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = self
            .file
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default();
        let target = parent.join(bracket_name(&filename));

        // 수집 태스크가 먼저 기여한 아티팩트의 스냅샷
        let (existing_asset_id, prior_classification) =
            match context.artifact_mut(&self.artifact_path) {
                Some(artifact) => (artifact.asset_id.clone(), artifact.classification),
                None => {
                    warn!(
                        path = %self.artifact_path,
                        "unwrap task without collected artifact, skipping"
                    );
                    return Ok(());
                }
            };

        // 모든 시도는 깨끗한 대상에서 시작
        if target.exists() {
            if target.is_dir() {
                fs::remove_dir_all(&target).map_err(|e| ScanEngineError::io(&target, e))?;
            } else {
                fs::remove_file(&target).map_err(|e| ScanEngineError::io(&target, e))?;
            }
        }

        let hints = context.hints().hints_for(&filename);
        let policy = UnwrapPolicy::derive(
            &filename,
            prior_classification,
            &hints,
            &context.config().plain_module_extensions,
            &context.config().installer_suffixes,
        );

        let mut issues: Vec<String> = Vec::new();
        let mut unwrapped = false;

        if policy.should_attempt() {
            match fs::create_dir_all(&target) {
                Ok(()) => {
                    let unpacker = context.unpacker();
                    let outcome = unpacker.unpack(&self.file, &target);
                    let result = if outcome.success { "success" } else { "failure" };
                    counter!(SCAN_UNWRAP_ATTEMPTS_TOTAL, LABEL_RESULT => result).increment(1);
                    issues.extend(outcome.issues);
                    unwrapped = outcome.success;
                }
                Err(e) => issues.push(format!("failed to create unwrap target: {e}")),
            }
            if !unwrapped {
                // 실패 잔해가 브래킷 신호로 남지 않게 정리
                let _ = fs::remove_dir_all(&target);
            }
        } else {
            debug!(path = %self.artifact_path, "unwrap not attempted by policy");
        }

        if unwrapped {
            self.resolve_unwrapped(context, &policy, target, existing_asset_id, &mut issues);
        } else {
            self.resolve_leaf(context, &policy, &mut issues);
        }

        // 이슈는 항상 덮어쓰지 않고 추가
        if !issues.is_empty() {
            if let Some(artifact) = context.artifact_mut(&self.artifact_path) {
                for issue in issues {
                    artifact.push_issue(issue);
                }
            }
        }

        Ok(())
    }

    /// 언랩 성공 경로.
    fn resolve_unwrapped(
        &self,
        context: &mut ScanContext,
        policy: &UnwrapPolicy,
        target: PathBuf,
        existing_asset_id: Option<String>,
        issues: &mut Vec<String>,
    ) {
        let filename = self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source_type = extension_of(&filename).unwrap_or_else(|| "archive".to_owned());

        // 레이어 이미지 후처리 — 실패해도 언랩은 성공으로 유지
        let unpacker = context.unpacker();
        if let Some(report) = layer::apply_image_layout(&target, unpacker.as_ref()) {
            issues.extend(report.issues);
        }

        let top_level = !self.artifact_path.contains('/');
        let implicit_exclude = policy.implicit_exclude();
        let marked = (policy.explicit_exclude || implicit_exclude)
            && !(implicit_exclude && top_level);

        let mut chain_for_scan = self.chain.clone();
        let mut computed: Option<ChecksumSet> = None;

        if marked {
            // 통과형 아카이브: 원본 삭제, 체인 연장과 해시 생략
            if let Err(e) = fs::remove_file(&self.file) {
                issues.push(format!("failed to delete excluded original: {e}"));
            }
        } else {
            // 연기된 체크섬을 지금 계산
            match hash::checksum_file(&self.file) {
                Ok(sums) => computed = Some(sums),
                Err(e) => issues.push(format!("checksum failed: {e}")),
            }
        }

        let mut registered_asset: Option<Asset> = None;
        if let Some(artifact) = context.artifact_mut(&self.artifact_path) {
            artifact.artifact_type = Some("archive".to_owned());
            artifact.source_type = Some(source_type.clone());
            artifact.pending_unwrap = false;

            if marked {
                artifact.marked_for_deletion = true;
            } else if let Some(sums) = computed {
                let digest = sums.digest.clone();
                artifact.set_checksums(sums);
                chain_for_scan.push(self.artifact_path.clone());
                let asset_id =
                    derive_asset_id(existing_asset_id.as_deref(), &artifact.id, &digest);
                artifact.asset_id = Some(asset_id.clone());
                registered_asset = Some(Asset {
                    id: asset_id,
                    asset_type: source_type,
                    checksum: digest,
                    path: self.artifact_path.clone(),
                });
            }
        }

        // 에셋 등록은 내용물을 스캔할 디렉토리 태스크보다 항상 먼저
        if let Some(asset) = registered_asset {
            context.register_asset(asset);
        }
        context.enqueue(ScanTask::directory(target, chain_for_scan));
    }

    /// 실패 또는 시도 생략 경로 — 리프 처리. 체인은 바뀌지 않습니다.
    fn resolve_leaf(
        &self,
        context: &mut ScanContext,
        policy: &UnwrapPolicy,
        issues: &mut Vec<String>,
    ) {
        let mut anchor = false;
        let computed = match hash::checksum_file(&self.file) {
            Ok(sums) => {
                anchor = context.matcher().anchor_pattern(&sums.digest).is_some();
                Some(sums)
            }
            Err(e) => {
                issues.push(format!("checksum failed: {e}"));
                None
            }
        };

        if let Some(artifact) = context.artifact_mut(&self.artifact_path) {
            artifact.pending_unwrap = false;
            if let Some(sums) = computed {
                artifact.set_checksums(sums);
            }
            if anchor {
                artifact.anchor = true;
            }
            // 언랩 금지가 힌트로 적용된 경우 그 분류를 복사해
            // 하류 소비자가 사전 선언된 단일 유닛과 동일하게 취급하게 함
            if policy.explicit_no_unwrap {
                if let Some(classification) = policy.no_unwrap_hint {
                    artifact.classification = Some(classification);
                }
            }
        }
    }
}

/// 콘텐츠 기반 에셋 ID를 유도합니다.
///
/// 기존 ID의 컨테이너 스코프 접두어(`:` 앞부분)를 보존하고, 없으면
/// 일반 접두어를 부여합니다.
fn derive_asset_id(existing: Option<&str>, artifact_id: &str, digest: &str) -> String {
    let prefix = existing
        .and_then(|id| id.split(':').next())
        .filter(|p| !p.is_empty())
        .unwrap_or(GENERIC_ASSET_PREFIX);
    let short = &digest[..digest.len().min(ASSET_ID_DIGEST_LEN)];
    format!("{prefix}:{artifact_id}:{short}")
}
