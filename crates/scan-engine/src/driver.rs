//! 스캔 드라이버 — 큐가 빌 때까지 태스크 실행
//!
//! 단일 스레드 협력 모델입니다: 태스크는 끝까지 실행되고, 중간에
//! 멈추지 않으며, 선점이 없습니다. 태스크 실패는 격리됩니다 —
//! 처리 중이던 아티팩트가 있으면 그 아티팩트의 이슈로 기록하고,
//! 없으면 로그만 남기고 건너뜁니다. 어느 쪽이든 남은 큐는 계속
//! 처리됩니다.
//!
//! 스캔 제한 시간은 큐 pop 사이에만 검사됩니다 — 언팩 호출은
//! 중단 불가능한 불투명한 외부 호출이기 때문입니다.

use std::time::{Duration, Instant};

use metrics::counter;
use tracing::{debug, warn};

use strata_core::metrics::{
    LABEL_TASK_KIND, SCAN_TASK_FAILURES_TOTAL, SCAN_TASKS_PROCESSED_TOTAL,
};

use crate::context::ScanContext;

/// 드라이브 실행 통계
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DriveStats {
    /// 처리된 태스크 수
    pub tasks_processed: u64,
    /// 격리된 태스크 실패 수
    pub task_failures: u64,
    /// 제한 시간 초과로 버려진 태스크 수
    pub tasks_abandoned: u64,
}

/// 스캔 드라이버
pub struct ScanDriver;

impl ScanDriver {
    /// 큐가 빌 때까지 태스크를 실행합니다.
    ///
    /// 형제 간 처리 순서는 보장되지 않지만 인과 순서는 보장됩니다:
    /// 에셋 등록은 그 내용물을 스캔하는 디렉토리 태스크보다 항상
    /// 먼저 일어납니다 (언랩 태스크 내부에서 등록 후 enqueue).
    pub fn drive(context: &mut ScanContext) -> DriveStats {
        let mut stats = DriveStats::default();
        let deadline = match context.config().max_scan_secs {
            0 => None,
            secs => Some(Instant::now() + Duration::from_secs(secs)),
        };

        while let Some(task) = context.pop_task() {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    let remaining = context.queue_len() as u64 + 1;
                    warn!(
                        abandoned = remaining,
                        "scan time budget exhausted, abandoning remaining tasks"
                    );
                    stats.tasks_abandoned = remaining;
                    break;
                }
            }

            let kind = task.kind();
            let artifact_path = task.artifact_path().map(str::to_owned);
            counter!(SCAN_TASKS_PROCESSED_TOTAL, LABEL_TASK_KIND => kind).increment(1);
            stats.tasks_processed += 1;

            if let Err(e) = task.process(context) {
                counter!(SCAN_TASK_FAILURES_TOTAL, LABEL_TASK_KIND => kind).increment(1);
                stats.task_failures += 1;

                match artifact_path {
                    Some(path) => match context.artifact_mut(&path) {
                        Some(artifact) => {
                            debug!(path = %path, error = %e, "task failed, recorded on artifact");
                            artifact.push_issue(format!("task failed: {e}"));
                        }
                        None => warn!(
                            path = %path,
                            error = %e,
                            "task failed before artifact was collected, skipping"
                        ),
                    },
                    None => {
                        warn!(task = kind, error = %e, "task failed without artifact context, skipping")
                    }
                }
            }
        }

        stats
    }
}
