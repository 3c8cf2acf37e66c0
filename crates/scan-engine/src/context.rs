//! 스캔 컨텍스트 — 스캔 하나의 공유 상태
//!
//! 전역 상태 대신 모든 태스크 호출에 명시적으로 전달되는 컨텍스트
//! 객체입니다. 인벤토리 누적기, 경로→에셋 ID 인덱스, 컴파일된 경로
//! 규칙, 패턴 매처, 외부 포트 핸들, 대기 태스크 큐를 소유합니다.
//! 덕분에 프로세스당 독립 스캔 여러 개가 가능하고, 새 컨텍스트로
//! 태스크를 직접 단위 테스트할 수 있습니다.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use metrics::counter;

use strata_core::metrics::{SCAN_ARTIFACTS_COLLECTED_TOTAL, SCAN_ASSETS_REGISTERED_TOTAL};
use strata_core::pipeline::{ReferenceLookup, Unpacker};
use strata_core::types::{Artifact, Asset, ScanInventory};

use crate::config::{CompiledRules, ScanEngineConfig};
use crate::error::ScanEngineError;
use crate::pattern::PatternMatcher;
use crate::task::ScanTask;

/// 스캔 컨텍스트
pub struct ScanContext {
    root: PathBuf,
    config: ScanEngineConfig,
    rules: CompiledRules,
    matcher: Arc<PatternMatcher>,
    hints: Arc<dyn ReferenceLookup>,
    unpacker: Arc<dyn Unpacker>,
    inventory: ScanInventory,
    asset_index: HashMap<String, String>,
    queue: VecDeque<ScanTask>,
}

impl ScanContext {
    /// 새 컨텍스트를 생성합니다.
    ///
    /// glob 규칙은 이 시점에 한 번 컴파일됩니다. 인벤토리는 외부가
    /// 소유하는 누적기로, 미리 채워진 상태로 주입될 수 있습니다.
    pub fn new(
        root: impl Into<PathBuf>,
        config: ScanEngineConfig,
        matcher: Arc<PatternMatcher>,
        hints: Arc<dyn ReferenceLookup>,
        unpacker: Arc<dyn Unpacker>,
        inventory: ScanInventory,
    ) -> Result<Self, ScanEngineError> {
        let rules = CompiledRules::compile(&config)?;
        let mut context = Self {
            root: root.into(),
            config,
            rules,
            matcher,
            hints,
            unpacker,
            inventory,
            asset_index: HashMap::new(),
            queue: VecDeque::new(),
        };
        // 주입된 인벤토리에 이미 등록된 에셋의 인덱스 복원
        for asset in &context.inventory.assets {
            context
                .asset_index
                .insert(asset.path.clone(), asset.id.clone());
        }
        Ok(context)
    }

    /// 스캔 루트를 반환합니다.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 엔진 설정을 반환합니다.
    pub fn config(&self) -> &ScanEngineConfig {
        &self.config
    }

    /// 절대 경로를 스캔 루트 기준 상대 경로 문자열로 변환합니다.
    ///
    /// 경로 구분자는 `/`로 정규화됩니다.
    pub fn relative_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let text = relative.to_string_lossy();
        if std::path::MAIN_SEPARATOR == '/' {
            text.into_owned()
        } else {
            text.replace(std::path::MAIN_SEPARATOR, "/")
        }
    }

    /// 태스크를 큐 끝에 추가합니다.
    pub fn enqueue(&mut self, task: ScanTask) {
        self.queue.push_back(task);
    }

    /// 큐에서 다음 태스크를 꺼냅니다.
    pub fn pop_task(&mut self) -> Option<ScanTask> {
        self.queue.pop_front()
    }

    /// 대기 중인 태스크 수를 반환합니다.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// 파일이 스캔 대상에서 제외되는지 확인합니다.
    pub fn is_excluded_file(&self, relative_path: &str) -> bool {
        self.rules.is_excluded_file(relative_path)
    }

    /// 디렉토리가 스캔 대상에서 제외되는지 확인합니다.
    pub fn is_excluded_dir(&self, relative_path: &str) -> bool {
        self.rules.is_excluded_dir(relative_path)
    }

    /// 경로가 암묵적 언랩 대상인지 확인합니다.
    pub fn is_unwrap_eligible(&self, relative_path: &str) -> bool {
        self.config.implicit_unwrap && self.rules.is_unwrap_eligible(relative_path)
    }

    /// 패턴 매처를 반환합니다.
    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    /// 참조 힌트 포트를 반환합니다.
    pub fn hints(&self) -> &dyn ReferenceLookup {
        self.hints.as_ref()
    }

    /// 언팩 포트 핸들을 복제하여 반환합니다.
    pub fn unpacker(&self) -> Arc<dyn Unpacker> {
        Arc::clone(&self.unpacker)
    }

    /// 아티팩트를 인벤토리에 기여합니다 (중복 제거 없음).
    pub fn contribute(&mut self, artifact: Artifact) {
        counter!(SCAN_ARTIFACTS_COLLECTED_TOTAL).increment(1);
        self.inventory.push_artifact(artifact);
    }

    /// 에셋을 등록하고 경로→에셋 ID 인덱스에 넣습니다.
    ///
    /// 등록은 해당 에셋 내용물을 스캔할 디렉토리 태스크 생성보다
    /// 항상 먼저 일어납니다 (동일 태스크 호출 내).
    pub fn register_asset(&mut self, asset: Asset) {
        counter!(SCAN_ASSETS_REGISTERED_TOTAL).increment(1);
        self.asset_index.insert(asset.path.clone(), asset.id.clone());
        self.inventory.push_asset(asset);
    }

    /// 상대 경로에 등록된 에셋 ID를 조회합니다.
    pub fn asset_id_for(&self, relative_path: &str) -> Option<&String> {
        self.asset_index.get(relative_path)
    }

    /// 경로로 아티팩트를 가변 조회합니다.
    pub fn artifact_mut(&mut self, path: &str) -> Option<&mut Artifact> {
        self.inventory.artifact_mut(path)
    }

    /// 컨텍스트를 소비하고 인벤토리를 반환합니다.
    pub fn into_inventory(self) -> ScanInventory {
        self.inventory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanEngineConfigBuilder;
    use crate::hints::HintDb;
    use crate::unpack::NoopUnpacker;

    fn context(root: &Path) -> ScanContext {
        let config = ScanEngineConfigBuilder::new()
            .exclude_patterns(vec!["**/.git/**".to_owned()])
            .build()
            .unwrap();
        ScanContext::new(
            root,
            config,
            Arc::new(PatternMatcher::with_defaults().unwrap()),
            Arc::new(HintDb::empty()),
            Arc::new(NoopUnpacker),
            ScanInventory::new(),
        )
        .unwrap()
    }

    #[test]
    fn relative_path_strips_root() {
        let ctx = context(Path::new("/mnt/image"));
        assert_eq!(
            ctx.relative_path(Path::new("/mnt/image/usr/lib/libc.so")),
            "usr/lib/libc.so"
        );
    }

    #[test]
    fn queue_is_fifo() {
        let mut ctx = context(Path::new("/mnt/image"));
        ctx.enqueue(ScanTask::directory(PathBuf::from("/mnt/image/a"), vec![]));
        ctx.enqueue(ScanTask::directory(PathBuf::from("/mnt/image/b"), vec![]));
        assert_eq!(ctx.queue_len(), 2);

        let first = ctx.pop_task().unwrap();
        assert_eq!(first.kind(), "directory");
        assert_eq!(ctx.queue_len(), 1);
    }

    #[test]
    fn asset_registration_indexes_path() {
        let mut ctx = context(Path::new("/mnt/image"));
        ctx.register_asset(Asset {
            id: "arc:base.tar:11223344".to_owned(),
            asset_type: "tar".to_owned(),
            checksum: "11223344".to_owned(),
            path: "layers/base.tar".to_owned(),
        });
        assert_eq!(
            ctx.asset_id_for("layers/base.tar").map(String::as_str),
            Some("arc:base.tar:11223344")
        );
        assert!(ctx.asset_id_for("other").is_none());
    }

    #[test]
    fn preseeded_inventory_restores_asset_index() {
        let mut inventory = ScanInventory::new();
        inventory.push_asset(Asset {
            id: "cnt:layer1:aabb".to_owned(),
            asset_type: "tar".to_owned(),
            checksum: "aabb".to_owned(),
            path: "layer1.tar".to_owned(),
        });
        let config = ScanEngineConfigBuilder::new().build().unwrap();
        let ctx = ScanContext::new(
            Path::new("/mnt/image"),
            config,
            Arc::new(PatternMatcher::new()),
            Arc::new(HintDb::empty()),
            Arc::new(NoopUnpacker),
            inventory,
        )
        .unwrap();
        assert_eq!(
            ctx.asset_id_for("layer1.tar").map(String::as_str),
            Some("cnt:layer1:aabb")
        );
    }

    #[test]
    fn exclusion_uses_compiled_rules() {
        let ctx = context(Path::new("/mnt/image"));
        assert!(ctx.is_excluded_file(".git/config"));
        assert!(!ctx.is_excluded_file("usr/bin/tool"));
    }

    #[test]
    fn unwrap_eligibility_respects_global_switch() {
        let config = ScanEngineConfigBuilder::new().implicit_unwrap(false).build().unwrap();
        let ctx = ScanContext::new(
            Path::new("/mnt/image"),
            config,
            Arc::new(PatternMatcher::new()),
            Arc::new(HintDb::empty()),
            Arc::new(NoopUnpacker),
            ScanInventory::new(),
        )
        .unwrap();
        // 패턴은 전부 매칭하지만 전역 스위치가 꺼져 있음
        assert!(!ctx.is_unwrap_eligible("layers/base.tar"));
    }
}
