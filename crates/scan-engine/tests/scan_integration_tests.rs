//! 스캔 엔진 통합 테스트
//!
//! 전체 흐름을 검증합니다: 디렉토리 탐색 -> 파일 수집 -> 재귀 언랩 ->
//! 출처 체인 -> 인벤토리.
//!
//! 언팩 포트는 스크립트 언패커로 대체합니다: `ARC` 매직으로 시작하는
//! 파일만 아카이브로 인정하고 `경로=내용` 줄을 파일로 풉니다 (`;`는
//! 줄바꿈). 그 외 파일은 조용히 실패하여 리프로 처리됩니다.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use strata_core::pipeline::{Pipeline, UnpackOutcome, Unpacker};
use strata_core::types::Classification;
use strata_scan_engine::{
    ImageScanner, ImageScannerBuilder, ScanEngineConfig, ScanEngineConfigBuilder, ScanReport,
};

/// 테스트용 스크립트 언패커
struct ScriptedUnpacker;

impl Unpacker for ScriptedUnpacker {
    fn unpack(&self, archive: &Path, target: &Path) -> UnpackOutcome {
        let content = match fs::read_to_string(archive) {
            Ok(c) => c,
            Err(e) => return UnpackOutcome::failed(format!("read failed: {e}")),
        };
        if content.starts_with("FAIL") {
            return UnpackOutcome::failed("unsupported format");
        }
        let Some(body) = content.strip_prefix("ARC\n") else {
            return UnpackOutcome {
                success: false,
                issues: Vec::new(),
            };
        };
        for line in body.lines().filter(|l| !l.is_empty()) {
            let (path, data) = line.split_once('=').unwrap_or((line, ""));
            let out = target.join(path);
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            // 내용의 `;`는 줄바꿈으로 풀어 중첩 아카이브를 표현
            fs::write(out, data.replace(';', "\n")).unwrap();
        }
        UnpackOutcome::succeeded()
    }
}

fn config_for(root: &Path) -> ScanEngineConfig {
    ScanEngineConfigBuilder::new()
        .enabled(true)
        .scan_roots(vec![root.display().to_string()])
        .build()
        .unwrap()
}

async fn scan(config: ScanEngineConfig) -> Vec<ScanReport> {
    let (mut scanner, _event_rx) = ImageScannerBuilder::new()
        .config(config)
        .unpacker(Arc::new(ScriptedUnpacker))
        .build()
        .unwrap();
    scanner.start().await.unwrap();
    let reports = scanner.scan_once().await.unwrap();
    scanner.stop().await.unwrap();
    reports
}

fn build_scanner(config: ScanEngineConfig) -> ImageScanner {
    let (scanner, _event_rx) = ImageScannerBuilder::new()
        .config(config)
        .unpacker(Arc::new(ScriptedUnpacker))
        .build()
        .unwrap();
    scanner
}

/// 평면 트리: 리프 수집, 길이 0 파일과 심링크 제외
#[tokio::test]
async fn test_flat_tree_drops_empty_files_and_symlinks() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("keep.bin"), b"payload").unwrap();
    fs::write(dir.path().join("empty.bin"), b"").unwrap();
    #[cfg(unix)]
    std::os::unix::fs::symlink(dir.path().join("keep.bin"), dir.path().join("link.bin")).unwrap();

    // 언랩 없이 리프 수집만
    let config = ScanEngineConfigBuilder::new()
        .enabled(true)
        .scan_roots(vec![dir.path().display().to_string()])
        .unwrap_patterns(vec!["*.never".to_owned()])
        .build()
        .unwrap();
    let reports = scan(config).await;

    assert_eq!(reports.len(), 1);
    let inventory = &reports[0].inventory;
    assert_eq!(inventory.artifacts.len(), 1);
    let artifact = &inventory.artifacts[0];
    assert_eq!(artifact.id, "keep.bin");
    assert!(artifact.checksums.is_some());
    assert!(artifact.chain.is_empty());
}

/// 재귀 언랩: 최상위 아카이브 보존, 중첩 통과형 아카이브 제거,
/// 내용물의 출처 체인과 contained-in 표시
#[tokio::test]
async fn test_recursive_unwrap_with_provenance() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("app.tar"),
        "ARC\nopt/data.bin=hello\nopt/nested.tar=ARC;bin.dat=zz\n",
    )
    .unwrap();

    let reports = scan(config_for(dir.path())).await;
    let inventory = &reports[0].inventory;

    // 최상위 암묵 아카이브는 보존, 에셋 하나 등록
    assert_eq!(inventory.assets.len(), 1);
    let asset = &inventory.assets[0];
    assert_eq!(asset.path, "app.tar");
    assert!(asset.id.starts_with("arc:app.tar:"));

    let app = inventory
        .artifacts
        .iter()
        .find(|a| a.path == "app.tar")
        .unwrap();
    assert!(!app.marked_for_deletion);
    assert_eq!(app.artifact_type.as_deref(), Some("archive"));
    assert_eq!(app.asset_id.as_deref(), Some(asset.id.as_str()));

    // 중첩 통과형 아카이브: 삭제 표시 + 물리 삭제
    let nested = inventory
        .artifacts
        .iter()
        .find(|a| a.id == "nested.tar")
        .unwrap();
    assert!(nested.marked_for_deletion);
    assert!(nested.checksums.is_none());
    assert!(!dir.path().join("[app.tar]/opt/nested.tar").exists());

    // 내용물은 체인과 contained-in을 갖고 수집됨
    let data = inventory
        .artifacts
        .iter()
        .find(|a| a.id == "data.bin")
        .unwrap();
    assert_eq!(data.chain, vec!["app.tar"]);
    assert_eq!(data.contained_in, vec![asset.id.clone()]);

    // 버려진 중첩 아카이브의 내용물도 스캔되지만 체인은 연장되지 않음
    let inner = inventory
        .artifacts
        .iter()
        .find(|a| a.id == "bin.dat")
        .unwrap();
    assert_eq!(inner.chain, vec!["app.tar"]);

    // 보존 아티팩트: app.tar, data.bin, bin.dat (nested.tar 제외)
    assert_eq!(inventory.retained_count(), 3);
}

/// 멱등성: 변경 없는 트리의 재스캔은 동일한 결과를 낳는다
#[tokio::test]
async fn test_rescan_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("app.tar"),
        "ARC\nopt/data.bin=hello\nREADME=docs\n",
    )
    .unwrap();

    fn fingerprint(report: &ScanReport) -> (Vec<(String, Option<String>, Vec<String>, bool)>, Vec<(String, String, String)>) {
        let mut artifacts: Vec<_> = report
            .inventory
            .artifacts
            .iter()
            .map(|a| {
                (
                    a.path.clone(),
                    a.checksums.as_ref().map(|c| c.digest.clone()),
                    a.chain.clone(),
                    a.marked_for_deletion,
                )
            })
            .collect();
        artifacts.sort();
        let mut assets: Vec<_> = report
            .inventory
            .assets
            .iter()
            .map(|a| (a.id.clone(), a.path.clone(), a.checksum.clone()))
            .collect();
        assets.sort();
        (artifacts, assets)
    }

    let first = scan(config_for(dir.path())).await;
    let second = scan(config_for(dir.path())).await;

    assert_eq!(fingerprint(&first[0]), fingerprint(&second[0]));
    // 첫 스캔이 만든 브래킷 폴더는 재스캔에서 언랩 태스크가 다시 소화함
    assert!(dir.path().join("[app.tar]/opt/data.bin").exists());
}

/// ATOMIC 힌트: 언랩을 시도하지 않고 힌트 분류가 아티팩트에 복사된다
#[tokio::test]
async fn test_atomic_hint_classification_preserved() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("vendor.pkg"), "ARC\nwould-unpack=x\n").unwrap();

    let hint_file = dir.path().join("hints.json");
    fs::write(
        &hint_file,
        r#"[{ "filename": "vendor.pkg", "classification": "atomic" }]"#,
    )
    .unwrap();

    let config = ScanEngineConfigBuilder::new()
        .enabled(true)
        .scan_roots(vec![dir.path().display().to_string()])
        .hint_db_path(hint_file.display().to_string())
        .build()
        .unwrap();

    let mut scanner = build_scanner(config);
    scanner.start().await.unwrap();
    assert!(scanner.is_hint_db_loaded());

    let reports = scanner.scan_once().await.unwrap();
    scanner.stop().await.unwrap();

    let inventory = &reports[0].inventory;
    let artifact = inventory
        .artifacts
        .iter()
        .find(|a| a.id == "vendor.pkg")
        .unwrap();
    assert_eq!(artifact.classification, Some(Classification::Atomic));
    assert!(artifact.checksums.is_some());
    // 시도 자체가 없었으므로 브래킷 폴더도 없음
    assert!(!dir.path().join("[vendor.pkg]").exists());
}

/// 힌트 없는 일반 모듈 형식(jar)은 리프로 남고 전체 체크섬을 가진다
#[tokio::test]
async fn test_plain_jar_stays_leaf() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("lib")).unwrap();
    fs::write(dir.path().join("lib/foo-1.2.3.jar"), "ARC\nx=y\n").unwrap();

    let reports = scan(config_for(dir.path())).await;
    let inventory = &reports[0].inventory;

    let jar = inventory
        .artifacts
        .iter()
        .find(|a| a.id == "foo-1.2.3.jar")
        .unwrap();
    // 언랩이 시도되지 않은 리프 아티팩트
    assert!(!jar.marked_for_deletion);
    assert!(jar.checksums.is_some());
    assert!(!dir.path().join("lib/[foo-1.2.3.jar]").exists());
    assert!(inventory.assets.is_empty());
    assert_eq!(jar.path, "lib/foo-1.2.3.jar");
}

/// 언랩 대상 패턴을 좁히면 모듈 파일은 수집 경로에서 식별 정보를 얻는다
#[tokio::test]
async fn test_narrow_unwrap_patterns_keep_identity_matching() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("lib")).unwrap();
    fs::write(dir.path().join("lib/commons-io-2.11.0.jar"), "ARC\nx=y\n").unwrap();

    let config = ScanEngineConfigBuilder::new()
        .enabled(true)
        .scan_roots(vec![dir.path().display().to_string()])
        .unwrap_patterns(vec!["**/*.tar".to_owned()])
        .build()
        .unwrap();
    let reports = scan(config).await;
    let inventory = &reports[0].inventory;

    let jar = inventory
        .artifacts
        .iter()
        .find(|a| a.id == "commons-io-2.11.0.jar")
        .unwrap();
    let identity = jar.identity.as_ref().unwrap();
    assert_eq!(identity.name, "commons-io");
    assert_eq!(identity.version.as_deref(), Some("2.11.0"));
    assert_eq!(jar.source_type.as_deref(), Some("java-module"));
}

/// 레이어 이미지: 매니페스트 순서 적용, 나중 레이어가 경로 충돌에서 승리
#[tokio::test]
async fn test_layered_image_union_semantics() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("image.tar"),
        concat!(
            "ARC\n",
            "manifest.json=[{\"Config\":\"config.json\",\"Layers\":[\"l1.tar\",\"l2.tar\"]}]\n",
            "config.json={\"os\":\"linux\"}\n",
            "l1.tar=ARC;a/b=from-l1\n",
            "l2.tar=ARC;a/b=from-l2\n",
        ),
    )
    .unwrap();

    let reports = scan(config_for(dir.path())).await;
    let inventory = &reports[0].inventory;
    let unpacked = dir.path().join("[image.tar]");

    // 유니온 의미론: a/b는 L2의 내용
    let merged = fs::read_to_string(unpacked.join("rootfs/a/b")).unwrap();
    assert_eq!(merged, "from-l2");

    // 적용된 레이어는 소비되고 설정은 고정 이름으로 복사됨
    assert!(!unpacked.join("l1.tar").exists());
    assert!(!unpacked.join("l2.tar").exists());
    assert!(unpacked.join("image-config.json").exists());

    // 통합된 내용물이 이미지 에셋 아래에서 수집됨
    let merged_artifact = inventory
        .artifacts
        .iter()
        .find(|a| a.path == "[image.tar]/rootfs/a/b")
        .unwrap();
    assert_eq!(merged_artifact.chain, vec!["image.tar"]);
    assert_eq!(merged_artifact.contained_in.len(), 1);

    let image = inventory
        .artifacts
        .iter()
        .find(|a| a.path == "image.tar")
        .unwrap();
    assert!(!image.marked_for_deletion);
    assert!(image.issues.is_empty(), "issues: {:?}", image.issues);
}

/// 언팩 실패는 스캔을 중단시키지 않고 해당 아티팩트의 이슈로만 남는다
#[tokio::test]
async fn test_unpack_failure_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("corrupt.tar"), "FAIL").unwrap();
    fs::write(dir.path().join("good.tar"), "ARC\nok.bin=fine\n").unwrap();

    let reports = scan(config_for(dir.path())).await;
    let inventory = &reports[0].inventory;

    let corrupt = inventory
        .artifacts
        .iter()
        .find(|a| a.id == "corrupt.tar")
        .unwrap();
    assert!(corrupt.issues_joined().contains("unsupported format"));
    assert!(corrupt.checksums.is_some());
    assert!(!corrupt.marked_for_deletion);

    // 다른 아카이브는 정상 언랩됨
    assert!(inventory.artifacts.iter().any(|a| a.id == "ok.bin"));
    assert_eq!(inventory.assets.len(), 1);
    assert_eq!(reports[0].task_failures, 0);
}

/// 제외 패턴은 트리 전체에 적용된다 (언랩 출력물 포함)
#[tokio::test]
async fn test_exclude_patterns_apply_inside_unwrap_output() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("app.tar"),
        "ARC\nkeep.bin=k\nskip.log=s\n",
    )
    .unwrap();

    let config = ScanEngineConfigBuilder::new()
        .enabled(true)
        .scan_roots(vec![dir.path().display().to_string()])
        .exclude_patterns(vec!["**/*.log".to_owned()])
        .build()
        .unwrap();
    let reports = scan(config).await;
    let inventory = &reports[0].inventory;

    assert!(inventory.artifacts.iter().any(|a| a.id == "keep.bin"));
    assert!(!inventory.artifacts.iter().any(|a| a.id == "skip.log"));
}
