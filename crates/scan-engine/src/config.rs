//! 스캔 엔진 설정
//!
//! [`ScanEngineConfig`]는 core의 [`ScanConfig`](strata_core::config::ScanConfig)를
//! 확장하여 엔진 고유 설정(모듈 형식 확장자, 인스톨러 접미사)을 추가합니다.
//!
//! # 사용 예시
//!
//! ```
//! use strata_scan_engine::ScanEngineConfig;
//!
//! // 기본값으로 생성
//! let config = ScanEngineConfig::default();
//! config.validate().unwrap();
//!
//! // 빌더로 생성
//! use strata_scan_engine::ScanEngineConfigBuilder;
//!
//! let config = ScanEngineConfigBuilder::new()
//!     .enabled(true)
//!     .scan_roots(vec!["/mnt/image".to_owned()])
//!     .build()
//!     .unwrap();
//! ```

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ScanEngineError;

/// 스캔 엔진 설정
///
/// core의 `ScanConfig`에서 파생되며, 엔진 고유 확장 필드를 포함합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEngineConfig {
    /// 엔진 활성화 여부
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
    /// 스캔 전체 제한 시간 (초). 0이면 무제한. 큐 pop 사이에만 검사됩니다
    pub max_scan_secs: u64,

    // --- 모듈 고유 확장 ---
    /// 단일 유닛으로 취급하는 모듈 형식 확장자 (점 없이, 소문자)
    ///
    /// 힌트가 없는 파일이라도 이 형식이면 암묵적 언랩 대상이 아닙니다.
    pub plain_module_extensions: Vec<String>,
    /// 항상 인벤토리에 포함하는 실행형 인스톨러 접미사
    pub installer_suffixes: Vec<String>,
}

impl Default for ScanEngineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scan_roots: Vec::new(),
            pattern_dir: String::new(),
            hint_db_path: String::new(),
            include_patterns: vec!["**".to_owned()],
            exclude_patterns: Vec::new(),
            unwrap_patterns: vec!["**".to_owned()],
            implicit_unwrap: true,
            max_scan_secs: 0,
            plain_module_extensions: default_plain_module_extensions(),
            installer_suffixes: default_installer_suffixes(),
        }
    }
}

fn default_plain_module_extensions() -> Vec<String> {
    ["jar", "war", "ear", "aar", "whl", "egg", "gem", "nupkg"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn default_installer_suffixes() -> Vec<String> {
    [".exe", ".msi"].into_iter().map(str::to_owned).collect()
}

/// 설정 상한값 상수
const MAX_SCAN_SECS_LIMIT: u64 = 604_800; // 7 days
const MAX_PATTERN_COUNT: usize = 1_000;

impl ScanEngineConfig {
    /// core의 `ScanConfig`에서 엔진 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값을 사용합니다.
    pub fn from_core(core: &strata_core::config::ScanConfig) -> Self {
        Self {
            enabled: core.enabled,
            scan_roots: core.scan_roots.clone(),
            pattern_dir: core.pattern_dir.clone(),
            hint_db_path: core.hint_db_path.clone(),
            include_patterns: core.include_patterns.clone(),
            exclude_patterns: core.exclude_patterns.clone(),
            unwrap_patterns: core.unwrap_patterns.clone(),
            implicit_unwrap: core.implicit_unwrap,
            max_scan_secs: core.max_scan_secs,
            ..Self::default()
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `scan_roots`: 활성화 시 하나 이상 필요
    /// - `include_patterns`: 비어있으면 안 됨
    /// - 모든 glob 패턴이 컴파일 가능해야 함 (기동 전 치명적)
    /// - `max_scan_secs`: 0 또는 604800 이하
    pub fn validate(&self) -> Result<(), ScanEngineError> {
        if self.enabled && self.scan_roots.is_empty() {
            return Err(ScanEngineError::Config {
                field: "scan_roots".to_owned(),
                reason: "at least one scan root required when enabled".to_owned(),
            });
        }

        if self.include_patterns.is_empty() {
            return Err(ScanEngineError::Config {
                field: "include_patterns".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.max_scan_secs > MAX_SCAN_SECS_LIMIT {
            return Err(ScanEngineError::Config {
                field: "max_scan_secs".to_owned(),
                reason: format!("must be 0 (unlimited) or 1-{MAX_SCAN_SECS_LIMIT}"),
            });
        }

        // glob 패턴은 기동 전에 전부 컴파일 검증
        check_globs("include_patterns", &self.include_patterns)?;
        check_globs("exclude_patterns", &self.exclude_patterns)?;
        check_globs("unwrap_patterns", &self.unwrap_patterns)?;

        Ok(())
    }

    /// 최대 패턴 규칙 수를 반환합니다.
    pub fn max_pattern_count(&self) -> usize {
        MAX_PATTERN_COUNT
    }
}

fn check_globs(field: &str, patterns: &[String]) -> Result<(), ScanEngineError> {
    for pattern in patterns {
        Glob::new(pattern).map_err(|e| ScanEngineError::Config {
            field: field.to_owned(),
            reason: format!("invalid glob '{pattern}': {e}"),
        })?;
    }
    Ok(())
}

/// 컴파일된 경로 규칙 집합
///
/// 설정의 glob 패턴을 한 번 컴파일하여 스캔 내내 재사용합니다.
#[derive(Debug)]
pub struct CompiledRules {
    include: GlobSet,
    exclude: GlobSet,
    unwrap: GlobSet,
}

impl CompiledRules {
    /// 설정에서 규칙 집합을 컴파일합니다.
    pub fn compile(config: &ScanEngineConfig) -> Result<Self, ScanEngineError> {
        Ok(Self {
            include: build_set("include_patterns", &config.include_patterns)?,
            exclude: build_set("exclude_patterns", &config.exclude_patterns)?,
            unwrap: build_set("unwrap_patterns", &config.unwrap_patterns)?,
        })
    }

    /// 파일이 스캔 대상에서 제외되는지 확인합니다.
    pub fn is_excluded_file(&self, relative_path: &str) -> bool {
        !self.include.is_match(relative_path) || self.exclude.is_match(relative_path)
    }

    /// 디렉토리가 스캔 대상에서 제외되는지 확인합니다.
    ///
    /// 포함 패턴은 파일 단위 규칙이므로 디렉토리에는 제외 패턴만 적용합니다.
    pub fn is_excluded_dir(&self, relative_path: &str) -> bool {
        self.exclude.is_match(relative_path)
    }

    /// 경로가 암묵적 언랩 대상인지 확인합니다.
    pub fn is_unwrap_eligible(&self, relative_path: &str) -> bool {
        self.unwrap.is_match(relative_path)
    }
}

fn build_set(field: &str, patterns: &[String]) -> Result<GlobSet, ScanEngineError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ScanEngineError::Config {
            field: field.to_owned(),
            reason: format!("invalid glob '{pattern}': {e}"),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ScanEngineError::Config {
        field: field.to_owned(),
        reason: e.to_string(),
    })
}

/// 스캔 엔진 설정 빌더
pub struct ScanEngineConfigBuilder {
    config: ScanEngineConfig,
}

impl ScanEngineConfigBuilder {
    /// 기본값으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ScanEngineConfig::default(),
        }
    }

    /// 엔진 활성화 여부를 설정합니다.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// 스캔 루트 목록을 설정합니다.
    pub fn scan_roots(mut self, roots: Vec<String>) -> Self {
        self.config.scan_roots = roots;
        self
    }

    /// 패턴 디렉토리를 설정합니다.
    pub fn pattern_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.pattern_dir = dir.into();
        self
    }

    /// 힌트 DB 경로를 설정합니다.
    pub fn hint_db_path(mut self, path: impl Into<String>) -> Self {
        self.config.hint_db_path = path.into();
        self
    }

    /// 포함 glob 패턴을 설정합니다.
    pub fn include_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.include_patterns = patterns;
        self
    }

    /// 제외 glob 패턴을 설정합니다.
    pub fn exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.exclude_patterns = patterns;
        self
    }

    /// 암묵적 언랩 대상 glob 패턴을 설정합니다.
    pub fn unwrap_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.unwrap_patterns = patterns;
        self
    }

    /// 암묵적 언랩 전역 활성화 여부를 설정합니다.
    pub fn implicit_unwrap(mut self, enabled: bool) -> Self {
        self.config.implicit_unwrap = enabled;
        self
    }

    /// 스캔 제한 시간을 설정합니다 (초, 0 = 무제한).
    pub fn max_scan_secs(mut self, secs: u64) -> Self {
        self.config.max_scan_secs = secs;
        self
    }

    /// 검증 후 설정을 반환합니다.
    pub fn build(self) -> Result<ScanEngineConfig, ScanEngineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ScanEngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
