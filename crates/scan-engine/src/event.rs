//! 스캔 이벤트
//!
//! [`ScanEvent`]는 루트 하나의 스캔 완료를 나타내는 이벤트입니다.
//! core의 [`Event`] trait을 구현하여 `tokio::mpsc` 채널을 통한 전송이
//! 가능합니다.

use std::fmt;

use strata_core::event::{EVENT_TYPE_SCAN, Event, EventMetadata, MODULE_SCAN_ENGINE};

use crate::scanner::ScanReport;

/// 스캔 완료 이벤트
///
/// 스캔 결과 보고서를 담아 모듈 간 통신에 사용됩니다.
/// `Send + Sync + 'static` 바운드를 만족하여 `tokio::mpsc` 전송이 가능합니다.
#[derive(Debug, Clone)]
pub struct ScanEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 스캔 결과 보고서
    pub report: ScanReport,
}

impl ScanEvent {
    /// 새로운 trace를 시작하는 스캔 이벤트를 생성합니다.
    pub fn new(report: ScanReport) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_SCAN_ENGINE),
            report,
        }
    }

    /// 기존 trace에 연결된 스캔 이벤트를 생성합니다.
    pub fn with_trace(report: ScanReport, trace_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::new(MODULE_SCAN_ENGINE, trace_id),
            report,
        }
    }
}

impl Event for ScanEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_SCAN
    }
}

impl fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScanEvent[{}] root={} artifacts={} assets={} failures={}",
            &self.id[..8.min(self.id.len())],
            self.report.root,
            self.report.inventory.retained_count(),
            self.report.inventory.assets.len(),
            self.report.task_failures,
        )
    }
}
