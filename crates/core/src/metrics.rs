//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `strata_`
//! - 모듈명: `scan_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(strata_core::metrics::SCAN_TASKS_PROCESSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 태스크 종류 레이블 키 (directory, collect, unwrap)
pub const LABEL_TASK_KIND: &str = "task_kind";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Scan Engine 메트릭 ────────────────────────────────────────────

/// 스캔: 처리된 태스크 수 (counter, label: task_kind)
pub const SCAN_TASKS_PROCESSED_TOTAL: &str = "strata_scan_tasks_processed_total";

/// 스캔: 격리된 태스크 실패 수 (counter, label: task_kind)
pub const SCAN_TASK_FAILURES_TOTAL: &str = "strata_scan_task_failures_total";

/// 스캔: 수집된 아티팩트 수 (counter)
pub const SCAN_ARTIFACTS_COLLECTED_TOTAL: &str = "strata_scan_artifacts_collected_total";

/// 스캔: 언랩 시도 수 (counter, label: result)
pub const SCAN_UNWRAP_ATTEMPTS_TOTAL: &str = "strata_scan_unwrap_attempts_total";

/// 스캔: 등록된 에셋 수 (counter)
pub const SCAN_ASSETS_REGISTERED_TOTAL: &str = "strata_scan_assets_registered_total";

/// 스캔: 루트 하나의 스캔 소요 시간 (histogram, 초)
pub const SCAN_DURATION_SECONDS: &str = "strata_scan_duration_seconds";

/// 모든 메트릭의 설명을 레코더에 등록합니다.
///
/// 익스포터 설치 직후 한 번 호출합니다.
pub fn describe_metrics() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        SCAN_TASKS_PROCESSED_TOTAL,
        "Total scan tasks processed by the driver"
    );
    describe_counter!(
        SCAN_TASK_FAILURES_TOTAL,
        "Total scan task failures isolated by the driver"
    );
    describe_counter!(
        SCAN_ARTIFACTS_COLLECTED_TOTAL,
        "Total artifacts contributed to the inventory"
    );
    describe_counter!(
        SCAN_UNWRAP_ATTEMPTS_TOTAL,
        "Total archive unwrap attempts by result"
    );
    describe_counter!(
        SCAN_ASSETS_REGISTERED_TOTAL,
        "Total provenance assets registered"
    );
    describe_histogram!(SCAN_DURATION_SECONDS, "Wall-clock duration of one root scan");
}
