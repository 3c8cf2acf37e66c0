//! 에러 타입 — 도메인별 에러 정의

/// Strata 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum StrataError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 컴포넌트 패턴 에러
    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),

    /// 스캔 처리 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중인 파이프라인을 다시 시작함
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 파이프라인을 정지함
    #[error("pipeline not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),
}

/// 컴포넌트 패턴 에러
///
/// 패턴 설정 오류는 스캔 시작 전에 치명적으로 처리됩니다.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    /// 패턴 파일 로딩 실패
    #[error("pattern load failed: {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// 패턴 정규식 컴파일 실패
    #[error("pattern compile failed: '{id}': {reason}")]
    CompileFailed { id: String, reason: String },
}

/// 스캔 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 스캔 루트 디렉토리가 존재하지 않음
    #[error("scan root not found: {path}")]
    RootNotFound { path: String },

    /// 스캔 실패
    #[error("scan failed: {0}")]
    ScanFailed(String),

    /// 참조 힌트 DB 에러
    #[error("hint db error: {0}")]
    HintDb(String),
}
