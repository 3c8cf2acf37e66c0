//! 스캔 오케스트레이터 -- 전체 스캔 흐름 관리
//!
//! [`ImageScanner`]는 core의 [`Pipeline`] trait을 구현하여 상위
//! 오케스트레이터에서 다른 모듈과 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//!
//! ```text
//! scan_roots --> DirectoryTask --> FileCollectTask --> Artifact
//!                     ^                   |
//!                     |                   v (pending unwrap)
//!                     +-- [output] <-- UnwrapTask --> Asset
//!                                         |
//!                                    ScanReport
//!                                         |
//!                                   mpsc --> downstream
//! ```
//!
//! 스캔 루프 자체는 동기 단일 스레드이며(협력 태스크 큐),
//! `tokio::task::spawn_blocking` 안에서 실행됩니다.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

use metrics::histogram;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use strata_core::error::{PipelineError, StrataError};
use strata_core::metrics::SCAN_DURATION_SECONDS;
use strata_core::pipeline::{HealthStatus, Pipeline, ReferenceLookup, Unpacker};
use strata_core::types::ScanInventory;

use crate::config::ScanEngineConfig;
use crate::context::ScanContext;
use crate::driver::{DriveStats, ScanDriver};
use crate::error::ScanEngineError;
use crate::event::ScanEvent;
use crate::hints::HintDb;
use crate::pattern::{PatternLoader, PatternMatcher};
use crate::task::ScanTask;
use crate::unpack::NoopUnpacker;

/// 스캐너 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScannerState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 루트 하나의 스캔 결과 보고서
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// 스캔 고유 ID
    pub scan_id: String,
    /// 스캔 루트 경로
    pub root: String,
    /// 수집된 인벤토리 (삭제 표시된 행 포함)
    pub inventory: ScanInventory,
    /// 처리된 태스크 수
    pub tasks_processed: u64,
    /// 격리된 태스크 실패 수
    pub task_failures: u64,
    /// 제한 시간 초과로 버려진 태스크 수
    pub tasks_abandoned: u64,
    /// 스캔 완료 시각
    pub scanned_at: SystemTime,
}

/// 스캔 오케스트레이터
///
/// 패턴/힌트 로딩, 루트별 스캔 실행, 이벤트 전송의 전체 흐름을 관리합니다.
/// core의 `Pipeline` trait을 구현하여 생명주기(start/stop/health_check)를
/// 제공합니다.
///
/// # 재시작 제한
///
/// `stop()` 후 재시작이 필요하면 `ImageScannerBuilder`로 새 인스턴스를
/// 생성해야 합니다.
pub struct ImageScanner {
    /// 엔진 설정
    config: ScanEngineConfig,
    /// 현재 상태
    state: ScannerState,
    /// 컴포넌트 패턴 매처 (start()에서 사이트 패턴이 추가됨)
    matcher: Arc<PatternMatcher>,
    /// 참조 힌트 포트 (start()에서 로드됨)
    hints: Arc<dyn ReferenceLookup>,
    /// 힌트 DB 로드 여부
    hint_db_loaded: bool,
    /// 언팩 포트
    unpacker: Arc<dyn Unpacker>,
    /// 이벤트 전송 채널
    event_tx: mpsc::Sender<ScanEvent>,
    /// 완료된 스캔 수
    scans_completed: Arc<AtomicU64>,
    /// 수집된 보존 아티팩트 수
    artifacts_collected: Arc<AtomicU64>,
}

impl ImageScanner {
    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            ScannerState::Initialized => "initialized",
            ScannerState::Running => "running",
            ScannerState::Stopped => "stopped",
        }
    }

    /// 완료된 스캔 수를 반환합니다.
    pub fn scans_completed(&self) -> u64 {
        self.scans_completed.load(Ordering::Relaxed)
    }

    /// 수집된 보존 아티팩트 수를 반환합니다.
    pub fn artifacts_collected(&self) -> u64 {
        self.artifacts_collected.load(Ordering::Relaxed)
    }

    /// 힌트 DB가 로드되었는지 반환합니다.
    pub fn is_hint_db_loaded(&self) -> bool {
        self.hint_db_loaded
    }

    /// 단일 스캔을 수행합니다 (수동 트리거용).
    ///
    /// 설정된 모든 scan_roots를 순서대로 스캔하고 보고서를 반환합니다.
    /// 루트마다 [`ScanEvent`]가 이벤트 채널로 전송됩니다.
    pub async fn scan_once(&self) -> Result<Vec<ScanReport>, ScanEngineError> {
        let mut reports = Vec::new();

        for scan_root in &self.config.scan_roots {
            let root_path = Path::new(scan_root);
            if !root_path.is_dir() {
                warn!(root = %scan_root, "scan root does not exist, skipping");
                continue;
            }

            let started = Instant::now();

            // 스캔 루프는 동기 단일 스레드 (blocking I/O)
            let (inventory, stats) = {
                let root = root_path.to_path_buf();
                let config = self.config.clone();
                let matcher = Arc::clone(&self.matcher);
                let hints = Arc::clone(&self.hints);
                let unpacker = Arc::clone(&self.unpacker);
                tokio::task::spawn_blocking(move || {
                    run_scan(&root, config, matcher, hints, unpacker)
                })
                .await
                .map_err(|e| ScanEngineError::Channel(format!("spawn_blocking failed: {e}")))?
            }?;

            histogram!(SCAN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

            let retained = inventory.retained_count() as u64;
            self.scans_completed.fetch_add(1, Ordering::Relaxed);
            self.artifacts_collected.fetch_add(retained, Ordering::Relaxed);

            let report = ScanReport {
                scan_id: uuid::Uuid::new_v4().to_string(),
                root: scan_root.clone(),
                inventory,
                tasks_processed: stats.tasks_processed,
                task_failures: stats.task_failures,
                tasks_abandoned: stats.tasks_abandoned,
                scanned_at: SystemTime::now(),
            };

            info!(
                root = %scan_root,
                artifacts = retained,
                assets = report.inventory.assets.len(),
                tasks = stats.tasks_processed,
                failures = stats.task_failures,
                "scan completed"
            );

            let event = ScanEvent::new(report.clone());
            if let Err(e) = self.event_tx.try_send(event) {
                warn!(
                    root = %scan_root,
                    error = %e,
                    "failed to send scan event (channel full or closed)"
                );
            }

            reports.push(report);
        }

        Ok(reports)
    }
}

/// 루트 하나를 동기적으로 스캔합니다.
///
/// `tokio::task::spawn_blocking` 내에서 호출되어야 합니다.
fn run_scan(
    root: &Path,
    config: ScanEngineConfig,
    matcher: Arc<PatternMatcher>,
    hints: Arc<dyn ReferenceLookup>,
    unpacker: Arc<dyn Unpacker>,
) -> Result<(ScanInventory, DriveStats), ScanEngineError> {
    let mut context = ScanContext::new(
        root,
        config,
        matcher,
        hints,
        unpacker,
        ScanInventory::new(),
    )?;
    context.enqueue(ScanTask::directory(root.to_path_buf(), Vec::new()));
    let stats = ScanDriver::drive(&mut context);
    Ok((context.into_inventory(), stats))
}

impl Pipeline for ImageScanner {
    async fn start(&mut self) -> Result<(), StrataError> {
        if self.state == ScannerState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!("starting scan engine");

        // 사이트 패턴 로딩 — 잘못된 패턴 설정은 스캔 전 치명적
        if !self.config.pattern_dir.is_empty() {
            let dir = Path::new(&self.config.pattern_dir);
            if dir.is_dir() {
                let rules =
                    PatternLoader::load_directory(dir, self.config.max_pattern_count()).await?;
                let mut matcher = PatternMatcher::with_defaults()?;
                for rule in rules {
                    matcher.add_rule(rule)?;
                }
                info!(patterns = matcher.pattern_count(), "component patterns compiled");
                self.matcher = Arc::new(matcher);
            } else {
                warn!(dir = %self.config.pattern_dir, "pattern directory not found, using built-ins");
            }
        }

        // 힌트 DB 로딩 (blocking I/O) — 없으면 힌트 없이 저하 모드
        if !self.config.hint_db_path.is_empty() {
            let hint_db_path = self.config.hint_db_path.clone();
            let db_result = tokio::task::spawn_blocking(move || {
                let path = Path::new(&hint_db_path);
                if path.exists() {
                    HintDb::load_from_file(path)
                } else {
                    tracing::warn!(path = %hint_db_path, "hint db not found");
                    Ok(HintDb::empty())
                }
            })
            .await
            .map_err(|e| {
                StrataError::from(ScanEngineError::Channel(format!(
                    "spawn_blocking failed: {e}"
                )))
            })?;

            match db_result {
                Ok(db) => {
                    let entry_count = db.entry_count();
                    if entry_count > 0 {
                        info!(entries = entry_count, "reference hint db loaded");
                        self.hint_db_loaded = true;
                    } else {
                        warn!("reference hint db is empty, scanning without hints");
                    }
                    self.hints = Arc::new(db);
                }
                Err(e) => {
                    warn!(error = %e, "failed to load reference hint db, running in degraded mode");
                }
            }
        } else {
            debug!("no hint db configured");
        }

        self.state = ScannerState::Running;
        info!("scan engine started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), StrataError> {
        if self.state != ScannerState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping scan engine");
        self.state = ScannerState::Stopped;
        info!("scan engine stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            ScannerState::Running => {
                if self.hint_db_loaded {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded(
                        "reference hint db not loaded, scanning without hints".to_owned(),
                    )
                }
            }
            ScannerState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            ScannerState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 스캔 오케스트레이터 빌더
///
/// 스캐너를 구성하고 필요한 채널을 생성합니다.
pub struct ImageScannerBuilder {
    config: ScanEngineConfig,
    unpacker: Arc<dyn Unpacker>,
    event_tx: Option<mpsc::Sender<ScanEvent>>,
    event_channel_capacity: usize,
}

impl ImageScannerBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ScanEngineConfig::default(),
            unpacker: Arc::new(NoopUnpacker),
            event_tx: None,
            event_channel_capacity: 256,
        }
    }

    /// 엔진 설정을 지정합니다.
    pub fn config(mut self, config: ScanEngineConfig) -> Self {
        self.config = config;
        self
    }

    /// 언팩 포트 구현을 주입합니다.
    ///
    /// 지정하지 않으면 [`NoopUnpacker`]가 사용됩니다 — 모든 아카이브가
    /// 리프 아티팩트로 처리됩니다.
    pub fn unpacker(mut self, unpacker: Arc<dyn Unpacker>) -> Self {
        self.unpacker = unpacker;
        self
    }

    /// 외부 이벤트 전송 채널을 설정합니다.
    ///
    /// 설정하지 않으면 빌더가 새 채널을 생성합니다.
    pub fn event_sender(mut self, tx: mpsc::Sender<ScanEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 이벤트 채널 용량을 설정합니다 (외부 채널 미사용 시).
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// 스캐너를 빌드합니다.
    ///
    /// # Returns
    ///
    /// - `ImageScanner`: 스캐너 인스턴스
    /// - `Option<mpsc::Receiver<ScanEvent>>`: 이벤트 수신 채널
    ///   (외부 event_sender를 설정한 경우 None)
    pub fn build(
        self,
    ) -> Result<(ImageScanner, Option<mpsc::Receiver<ScanEvent>>), ScanEngineError> {
        self.config.validate()?;

        let (event_tx, event_rx) = if let Some(tx) = self.event_tx {
            (tx, None)
        } else {
            let (tx, rx) = mpsc::channel(self.event_channel_capacity);
            (tx, Some(rx))
        };

        // 내장 패턴은 빌드 시점에 컴파일, 사이트 패턴은 start()에서 추가
        let matcher = Arc::new(PatternMatcher::with_defaults()?);

        let scanner = ImageScanner {
            config: self.config,
            state: ScannerState::Initialized,
            matcher,
            hints: Arc::new(HintDb::empty()),
            hint_db_loaded: false,
            unpacker: self.unpacker,
            event_tx,
            scans_completed: Arc::new(AtomicU64::new(0)),
            artifacts_collected: Arc::new(AtomicU64::new(0)),
        };

        Ok((scanner, event_rx))
    }
}

impl Default for ImageScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanEngineConfigBuilder;

    #[test]
    fn builder_creates_scanner() {
        let (scanner, event_rx) = ImageScannerBuilder::new().build().unwrap();
        assert_eq!(scanner.state_name(), "initialized");
        assert!(event_rx.is_some());
    }

    #[test]
    fn builder_with_external_event_sender() {
        let (event_tx, _event_rx) = mpsc::channel(10);
        let (_scanner, rx) = ImageScannerBuilder::new()
            .event_sender(event_tx)
            .build()
            .unwrap();
        assert!(rx.is_none());
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let mut config = ScanEngineConfig::default();
        config.include_patterns.clear(); // invalid
        let result = ImageScannerBuilder::new().config(config).build();
        assert!(result.is_err());
    }

    #[test]
    fn scanner_initial_metrics() {
        let (scanner, _) = ImageScannerBuilder::new().build().unwrap();
        assert_eq!(scanner.scans_completed(), 0);
        assert_eq!(scanner.artifacts_collected(), 0);
        assert!(!scanner.is_hint_db_loaded());
    }

    #[tokio::test]
    async fn scanner_health_check_before_start() {
        let (scanner, _) = ImageScannerBuilder::new().build().unwrap();
        assert!(scanner.health_check().await.is_unhealthy());
    }

    #[tokio::test]
    async fn scanner_double_stop_fails() {
        let (mut scanner, _) = ImageScannerBuilder::new().build().unwrap();
        let err = scanner.stop().await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn scanner_start_stop_lifecycle() {
        let (mut scanner, _) = ImageScannerBuilder::new().build().unwrap();

        // Start
        scanner.start().await.unwrap();
        assert_eq!(scanner.state_name(), "running");

        // Double start fails
        assert!(scanner.start().await.is_err());

        // Stop
        scanner.stop().await.unwrap();
        assert_eq!(scanner.state_name(), "stopped");

        // Double stop fails
        assert!(scanner.stop().await.is_err());
    }

    #[tokio::test]
    async fn scanner_health_check_running_no_db() {
        let (mut scanner, _) = ImageScannerBuilder::new().build().unwrap();
        scanner.start().await.unwrap();

        // 힌트 DB 없이는 저하 모드
        let status = scanner.health_check().await;
        assert!(!status.is_healthy());

        scanner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn scanner_scan_once_missing_root() {
        let config = ScanEngineConfigBuilder::new()
            .enabled(true)
            .scan_roots(vec!["/nonexistent/path/for/test".to_owned()])
            .build()
            .unwrap();
        let (mut scanner, _event_rx) = ImageScannerBuilder::new()
            .config(config)
            .build()
            .unwrap();

        scanner.start().await.unwrap();

        let reports = scanner.scan_once().await.unwrap();
        assert!(reports.is_empty());

        scanner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn scanner_scan_once_collects_and_emits_event() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"data").unwrap();

        let config = ScanEngineConfigBuilder::new()
            .enabled(true)
            .scan_roots(vec![dir.path().display().to_string()])
            // 언랩 없이 리프 수집만
            .unwrap_patterns(vec!["*.never".to_owned()])
            .build()
            .unwrap();
        let (mut scanner, event_rx) = ImageScannerBuilder::new().config(config).build().unwrap();
        let mut event_rx = event_rx.unwrap();

        scanner.start().await.unwrap();
        let reports = scanner.scan_once().await.unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].inventory.artifacts.len(), 1);
        assert_eq!(scanner.scans_completed(), 1);
        assert_eq!(scanner.artifacts_collected(), 1);

        let event = event_rx.try_recv().unwrap();
        assert_eq!(event.report.scan_id, reports[0].scan_id);

        scanner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn scanner_start_loads_hint_db() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("hints.json");
        std::fs::write(
            &db_path,
            r#"[{ "filename": "base.tar", "classification": "scan" }]"#,
        )
        .unwrap();

        let config = ScanEngineConfigBuilder::new()
            .hint_db_path(db_path.display().to_string())
            .build()
            .unwrap();
        let (mut scanner, _) = ImageScannerBuilder::new().config(config).build().unwrap();

        scanner.start().await.unwrap();
        assert!(scanner.is_hint_db_loaded());
        assert!(scanner.health_check().await.is_healthy());
        scanner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn scanner_start_fails_on_malformed_patterns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.yaml"), "{ not yaml ]").unwrap();

        let config = ScanEngineConfigBuilder::new()
            .pattern_dir(dir.path().display().to_string())
            .build()
            .unwrap();
        let (mut scanner, _) = ImageScannerBuilder::new().config(config).build().unwrap();

        let err = scanner.start().await.unwrap_err();
        assert!(matches!(err, StrataError::Pattern(_)));
    }
}
