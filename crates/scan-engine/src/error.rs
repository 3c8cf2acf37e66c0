//! 스캔 엔진 에러 타입
//!
//! [`ScanEngineError`]는 스캔 엔진 모듈 내에서 발생할 수 있는 모든 에러를 나타냅니다.
//! `From<ScanEngineError> for StrataError` 구현을 통해 `?` 연산자로
//! 상위 에러 타입으로 자연스럽게 전파됩니다.
//!
//! 언팩 실패는 에러가 아니라는 점에 유의하세요 — 실패한 아카이브는
//! 리프 아티팩트로 처리되는 지원되는 결과입니다. 여기의 에러들은
//! 설정/패턴/힌트 DB 문제와 태스크 단위로 격리되는 I/O 장애입니다.

use strata_core::error::{ConfigError, PatternError, ScanError, StrataError};

/// 스캔 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanEngineError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 패턴 파일 로딩 실패 (기동 전 치명적)
    #[error("pattern load error: {path}: {reason}")]
    PatternLoad {
        /// 패턴 파일/디렉토리 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 패턴 정규식/템플릿 컴파일 실패 (기동 전 치명적)
    #[error("pattern compile error: '{id}': {reason}")]
    PatternCompile {
        /// 패턴 규칙 ID
        id: String,
        /// 실패 사유
        reason: String,
    },

    /// 참조 힌트 DB 로딩 실패
    #[error("hint db load error: {path}: {reason}")]
    HintDbLoad {
        /// DB 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 스캔 루트가 존재하지 않음
    #[error("scan root not found: {path}")]
    RootNotFound {
        /// 루트 경로
        path: String,
    },

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),
}

impl ScanEngineError {
    /// 경로를 첨부한 I/O 에러를 생성합니다.
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl From<ScanEngineError> for StrataError {
    fn from(err: ScanEngineError) -> Self {
        match err {
            ScanEngineError::Config { field, reason } => {
                StrataError::Config(ConfigError::InvalidValue { field, reason })
            }
            ScanEngineError::PatternLoad { path, reason } => {
                StrataError::Pattern(PatternError::LoadFailed { path, reason })
            }
            ScanEngineError::PatternCompile { id, reason } => {
                StrataError::Pattern(PatternError::CompileFailed { id, reason })
            }
            ScanEngineError::HintDbLoad { path, reason } => {
                StrataError::Scan(ScanError::HintDb(format!("{path}: {reason}")))
            }
            ScanEngineError::RootNotFound { path } => {
                StrataError::Scan(ScanError::RootNotFound { path })
            }
            ScanEngineError::Io { path, source } => {
                StrataError::Scan(ScanError::ScanFailed(format!("io error: {path}: {source}")))
            }
            ScanEngineError::Channel(msg) => StrataError::Scan(ScanError::ScanFailed(msg)),
        }
    }
}
