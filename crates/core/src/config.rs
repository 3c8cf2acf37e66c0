//! 설정 관리 — strata.toml 파싱 및 런타임 설정
//!
//! [`StrataConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`STRATA_SCAN_IMPLICIT_UNWRAP=false` 형식)
//! 3. 설정 파일 (`strata.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), strata_core::error::StrataError> {
//! use strata_core::config::StrataConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = StrataConfig::load("strata.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = StrataConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, StrataError};

/// Strata 통합 설정
///
/// `strata.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스캔 엔진 설정
    #[serde(default)]
    pub scan: ScanConfig,
}

impl StrataConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StrataError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, StrataError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StrataError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                StrataError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, StrataError> {
        toml::from_str(toml_str).map_err(|e| {
            StrataError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `STRATA_{SECTION}_{FIELD}`
    /// 예: `STRATA_SCAN_PATTERN_DIR=/etc/strata/patterns`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "STRATA_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "STRATA_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "STRATA_GENERAL_DATA_DIR");

        // Scan
        override_bool(&mut self.scan.enabled, "STRATA_SCAN_ENABLED");
        override_csv(&mut self.scan.scan_roots, "STRATA_SCAN_SCAN_ROOTS");
        override_string(&mut self.scan.pattern_dir, "STRATA_SCAN_PATTERN_DIR");
        override_string(&mut self.scan.hint_db_path, "STRATA_SCAN_HINT_DB_PATH");
        override_csv(
            &mut self.scan.include_patterns,
            "STRATA_SCAN_INCLUDE_PATTERNS",
        );
        override_csv(
            &mut self.scan.exclude_patterns,
            "STRATA_SCAN_EXCLUDE_PATTERNS",
        );
        override_csv(&mut self.scan.unwrap_patterns, "STRATA_SCAN_UNWRAP_PATTERNS");
        override_bool(&mut self.scan.implicit_unwrap, "STRATA_SCAN_IMPLICIT_UNWRAP");
        override_u64(&mut self.scan.max_scan_secs, "STRATA_SCAN_MAX_SCAN_SECS");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), StrataError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // 스캔 활성화 시 루트 필수
        if self.scan.enabled && self.scan.scan_roots.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "scan.scan_roots".to_owned(),
                reason: "at least one scan root required when enabled".to_owned(),
            }
            .into());
        }

        // 포함 패턴이 비면 아무것도 스캔되지 않음
        if self.scan.enabled && self.scan.include_patterns.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "scan.include_patterns".to_owned(),
                reason: "must not be empty when enabled".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/strata".to_owned(),
        }
    }
}

/// 스캔 엔진 설정
///
/// 엔진 크레이트는 이 섹션에서 `ScanEngineConfig`를 파생합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 스캔 루트 디렉토리 목록 (추출된 파일시스템 트리)
    pub scan_roots: Vec<String>,
    /// 컴포넌트 패턴 YAML 디렉토리 (비우면 내장 패턴만 사용)
    pub pattern_dir: String,
    /// 참조 힌트 DB(JSON) 경로 (비우면 힌트 없이 동작)
    pub hint_db_path: String,
    /// 포함 glob 패턴 (`**` 지원)
    pub include_patterns: Vec<String>,
    /// 제외 glob 패턴
    pub exclude_patterns: Vec<String>,
    /// 암묵적 언랩 대상 glob 패턴
    pub unwrap_patterns: Vec<String>,
    /// 암묵적 언랩 전역 활성화 여부
    pub implicit_unwrap: bool,
    /// 스캔 전체 제한 시간 (초). 0이면 무제한
    pub max_scan_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scan_roots: Vec::new(),
            pattern_dir: "/etc/strata/patterns".to_owned(),
            hint_db_path: "/var/lib/strata/hints.json".to_owned(),
            include_patterns: vec!["**".to_owned()],
            exclude_patterns: Vec::new(),
            unwrap_patterns: vec!["**".to_owned()],
            implicit_unwrap: true,
            max_scan_secs: 0,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split(',').map(|s| s.trim().to_owned()).collect();
    }
}
