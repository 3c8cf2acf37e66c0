//! 레이어 이미지 후처리 — 언랩된 컨테이너 이미지의 레이어 통합
//!
//! 언랩 결과 트리에 레이어 이미지 매니페스트(`manifest.json`)가 있으면
//! 각 레이어 아카이브를 매니페스트 순서대로 하나의 집계 폴더(`rootfs/`)에
//! 적용합니다. 나중 레이어가 경로 충돌 시 앞 레이어의 파일을 덮어씁니다
//! (유니온 파일시스템 의미론). 적용된 레이어 파일과 곁 메타데이터는
//! 소비(삭제)되고, 지정된 설정 엔트리는 고정 이름으로 복사되며,
//! 남은 블롭 저장소는 삭제됩니다.
//!
//! 여기서의 모든 실패는 잡혀서 이슈 텍스트로만 보고됩니다 — 내용물은
//! 이미 추출되었으므로 언랩 자체는 성공으로 유지됩니다.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use strata_core::pipeline::Unpacker;

/// 레이어 이미지 매니페스트 파일명
pub const MANIFEST_FILE: &str = "manifest.json";
/// 레이어가 통합되는 집계 폴더명
pub const ROOTFS_DIR: &str = "rootfs";
/// 이미지 설정이 복사되는 고정 파일명
pub const IMAGE_CONFIG_FILE: &str = "image-config.json";
/// 적용 후 삭제되는 블롭 저장소 디렉토리명
const BLOB_STORE_DIR: &str = "blobs";
/// 레이어 적용 중 사용하는 스테이징 디렉토리명
const STAGING_DIR: &str = ".layer-staging";
/// 레이어 파일 곁에 따라오는 메타데이터 파일명
const SIBLING_METADATA: &[&str] = &["json", "VERSION"];

/// 매니페스트 엔트리 — 정렬된 레이어 목록과 지정 설정 엔트리
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    #[serde(rename = "Config")]
    config: String,
    #[serde(rename = "Layers")]
    layers: Vec<String>,
}

/// 레이어 적용 결과
#[derive(Debug, Default)]
pub struct LayerReport {
    /// 적용에 성공한 레이어 수
    pub layers_applied: usize,
    /// 적용 중 수집된 이슈 텍스트
    pub issues: Vec<String>,
}

/// 언랩 결과 트리에서 레이어 이미지 레이아웃을 감지하고 적용합니다.
///
/// 매니페스트가 없으면 `None`을 반환합니다. 매니페스트가 있으면 적용을
/// 시도하고, 개별 실패는 이슈로만 남깁니다 — 이 함수는 실패하지 않습니다.
pub fn apply_image_layout(unpacked: &Path, unpacker: &dyn Unpacker) -> Option<LayerReport> {
    let manifest_path = unpacked.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return None;
    }

    let mut report = LayerReport::default();

    let content = match fs::read_to_string(&manifest_path) {
        Ok(c) => c,
        Err(e) => {
            report.issues.push(format!("manifest read failed: {e}"));
            return Some(report);
        }
    };

    let entries: Vec<ManifestEntry> = match serde_json::from_str(&content) {
        Ok(e) => e,
        Err(e) => {
            report.issues.push(format!("manifest parse failed: {e}"));
            return Some(report);
        }
    };

    let Some(entry) = entries.first() else {
        report.issues.push("manifest is empty".to_owned());
        return Some(report);
    };

    let rootfs = unpacked.join(ROOTFS_DIR);
    if let Err(e) = fs::create_dir_all(&rootfs) {
        report
            .issues
            .push(format!("failed to create aggregation folder: {e}"));
        return Some(report);
    }

    for layer in &entry.layers {
        apply_layer(unpacked, layer, &rootfs, unpacker, &mut report);
    }

    // 지정 설정 엔트리를 고정 이름으로 복사
    let config_src = unpacked.join(&entry.config);
    if config_src.is_file() {
        if let Err(e) = fs::copy(&config_src, unpacked.join(IMAGE_CONFIG_FILE)) {
            report
                .issues
                .push(format!("config copy failed: {}: {e}", entry.config));
        }
    } else {
        report
            .issues
            .push(format!("config entry not found: {}", entry.config));
    }

    // 이제 중복인 블롭 저장소 삭제
    let blobs = unpacked.join(BLOB_STORE_DIR);
    if blobs.is_dir() {
        if let Err(e) = fs::remove_dir_all(&blobs) {
            report
                .issues
                .push(format!("blob store cleanup failed: {e}"));
        }
    }

    debug!(
        unpacked = %unpacked.display(),
        layers = report.layers_applied,
        issues = report.issues.len(),
        "applied layered image layout"
    );

    Some(report)
}

/// 레이어 하나를 집계 폴더에 적용하고 소비합니다.
fn apply_layer(
    unpacked: &Path,
    layer: &str,
    rootfs: &Path,
    unpacker: &dyn Unpacker,
    report: &mut LayerReport,
) {
    let layer_path = unpacked.join(layer);
    if !layer_path.is_file() {
        report.issues.push(format!("layer not found: {layer}"));
        return;
    }

    let staging = unpacked.join(STAGING_DIR);
    let _ = fs::remove_dir_all(&staging);
    if let Err(e) = fs::create_dir_all(&staging) {
        report
            .issues
            .push(format!("layer staging failed: {layer}: {e}"));
        return;
    }

    let outcome = unpacker.unpack(&layer_path, &staging);
    if outcome.success {
        merge_tree(&staging, rootfs, report);
        report.layers_applied += 1;
    } else {
        for issue in outcome.issues {
            report.issues.push(format!("layer {layer}: {issue}"));
        }
    }
    let _ = fs::remove_dir_all(&staging);

    // 적용된 레이어 파일과 곁 메타데이터 소비
    if let Err(e) = fs::remove_file(&layer_path) {
        report
            .issues
            .push(format!("layer cleanup failed: {layer}: {e}"));
    }
    if let Some(parent) = layer_path.parent() {
        for name in SIBLING_METADATA {
            let sibling = parent.join(name);
            if sibling.is_file() {
                let _ = fs::remove_file(&sibling);
            }
        }
        // 비게 된 레이어 디렉토리는 정리 (비어있지 않으면 무시)
        if parent != unpacked {
            let _ = fs::remove_dir(parent);
        }
    }
}

/// 스테이징 트리를 집계 폴더 위로 병합합니다.
///
/// 경로 충돌 시 나중 레이어(src)가 이깁니다. 심링크는 스캔과 동일하게
/// 따라가지 않고 건너뜁니다.
fn merge_tree(src: &Path, dst: &Path, report: &mut LayerReport) {
    let entries = match fs::read_dir(src) {
        Ok(e) => e,
        Err(e) => {
            report
                .issues
                .push(format!("layer merge read failed: {}: {e}", src.display()));
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "failed to read layer entry, skipping");
                continue;
            }
        };
        let from = entry.path();
        let to = dst.join(entry.file_name());

        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                report
                    .issues
                    .push(format!("layer merge stat failed: {}: {e}", from.display()));
                continue;
            }
        };

        if file_type.is_symlink() {
            debug!(path = %from.display(), "skipping symlink in layer");
            continue;
        }

        if file_type.is_dir() {
            if to.is_file() {
                // 파일을 디렉토리로 교체 — 나중 레이어가 이김
                let _ = fs::remove_file(&to);
            }
            if let Err(e) = fs::create_dir_all(&to) {
                report
                    .issues
                    .push(format!("layer merge mkdir failed: {}: {e}", to.display()));
                continue;
            }
            merge_tree(&from, &to, report);
        } else {
            if to.is_dir() {
                // 디렉토리를 파일로 교체 — 나중 레이어가 이김
                let _ = fs::remove_dir_all(&to);
            }
            if let Err(e) = fs::copy(&from, &to) {
                report
                    .issues
                    .push(format!("layer merge copy failed: {}: {e}", to.display()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::pipeline::UnpackOutcome;

    /// 테스트용 언패커 — "아카이브"가 디렉토리 경로를 담은 텍스트 파일이라고
    /// 가정하고 그 디렉토리를 대상으로 복사합니다.
    struct CopyUnpacker;

    impl Unpacker for CopyUnpacker {
        fn unpack(&self, archive: &Path, target: &Path) -> UnpackOutcome {
            let source = match fs::read_to_string(archive) {
                Ok(s) => s,
                Err(e) => return UnpackOutcome::failed(format!("read failed: {e}")),
            };
            let source = Path::new(source.trim());
            copy_dir(source, target);
            UnpackOutcome::succeeded()
        }
    }

    fn copy_dir(src: &Path, dst: &Path) {
        fs::create_dir_all(dst).unwrap();
        for entry in fs::read_dir(src).unwrap() {
            let entry = entry.unwrap();
            let to = dst.join(entry.file_name());
            if entry.file_type().unwrap().is_dir() {
                copy_dir(&entry.path(), &to);
            } else {
                fs::copy(entry.path(), &to).unwrap();
            }
        }
    }

    /// 레이어 2개짜리 이미지 레이아웃 픽스처를 만듭니다.
    ///
    /// 두 레이어 모두 `a/b` 경로를 담아 유니온 의미론을 검증합니다.
    fn layered_fixture(root: &Path) {
        // 레이어 내용물 원본
        let l1_src = root.join("src-l1");
        fs::create_dir_all(l1_src.join("a")).unwrap();
        fs::write(l1_src.join("a/b"), "from-layer-1").unwrap();
        fs::write(l1_src.join("only-l1"), "l1").unwrap();

        let l2_src = root.join("src-l2");
        fs::create_dir_all(l2_src.join("a")).unwrap();
        fs::write(l2_src.join("a/b"), "from-layer-2").unwrap();

        // 언랩 결과 트리
        let unpacked = root.join("[image.tar]");
        fs::create_dir_all(unpacked.join("l1")).unwrap();
        fs::create_dir_all(unpacked.join("l2")).unwrap();
        fs::create_dir_all(unpacked.join("blobs")).unwrap();
        fs::write(unpacked.join("blobs/junk"), "blob").unwrap();
        fs::write(
            unpacked.join("l1/layer.tar"),
            l1_src.display().to_string(),
        )
        .unwrap();
        fs::write(unpacked.join("l1/VERSION"), "1.0").unwrap();
        fs::write(
            unpacked.join("l2/layer.tar"),
            l2_src.display().to_string(),
        )
        .unwrap();
        fs::write(unpacked.join("config.json"), "{\"os\":\"linux\"}").unwrap();
        fs::write(
            unpacked.join("manifest.json"),
            r#"[{"Config":"config.json","Layers":["l1/layer.tar","l2/layer.tar"]}]"#,
        )
        .unwrap();
    }

    #[test]
    fn no_manifest_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(apply_image_layout(dir.path(), &CopyUnpacker).is_none());
    }

    #[test]
    fn layers_apply_in_order_later_wins() {
        let dir = tempfile::tempdir().unwrap();
        layered_fixture(dir.path());
        let unpacked = dir.path().join("[image.tar]");

        let report = apply_image_layout(&unpacked, &CopyUnpacker).unwrap();
        assert_eq!(report.layers_applied, 2);
        assert!(report.issues.is_empty(), "issues: {:?}", report.issues);

        // 유니온 의미론: a/b는 L2의 내용
        let merged = fs::read_to_string(unpacked.join("rootfs/a/b")).unwrap();
        assert_eq!(merged, "from-layer-2");
        // L1 전용 파일도 보존
        let only = fs::read_to_string(unpacked.join("rootfs/only-l1")).unwrap();
        assert_eq!(only, "l1");
    }

    #[test]
    fn consumed_layers_and_metadata_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        layered_fixture(dir.path());
        let unpacked = dir.path().join("[image.tar]");

        apply_image_layout(&unpacked, &CopyUnpacker).unwrap();

        assert!(!unpacked.join("l1/layer.tar").exists());
        assert!(!unpacked.join("l1/VERSION").exists());
        assert!(!unpacked.join("l2/layer.tar").exists());
        // 블롭 저장소 삭제
        assert!(!unpacked.join("blobs").exists());
        // 설정은 고정 이름으로 복사
        let config = fs::read_to_string(unpacked.join(IMAGE_CONFIG_FILE)).unwrap();
        assert!(config.contains("linux"));
    }

    #[test]
    fn missing_layer_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let unpacked = dir.path().join("[broken.tar]");
        fs::create_dir_all(&unpacked).unwrap();
        fs::write(unpacked.join("config.json"), "{}").unwrap();
        fs::write(
            unpacked.join("manifest.json"),
            r#"[{"Config":"config.json","Layers":["missing/layer.tar"]}]"#,
        )
        .unwrap();

        let report = apply_image_layout(&unpacked, &CopyUnpacker).unwrap();
        assert_eq!(report.layers_applied, 0);
        assert!(report.issues.iter().any(|i| i.contains("layer not found")));
    }

    #[test]
    fn malformed_manifest_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let unpacked = dir.path().join("[bad.tar]");
        fs::create_dir_all(&unpacked).unwrap();
        fs::write(unpacked.join("manifest.json"), "{ not json ]").unwrap();

        let report = apply_image_layout(&unpacked, &CopyUnpacker).unwrap();
        assert!(report.issues.iter().any(|i| i.contains("parse failed")));
    }
}
