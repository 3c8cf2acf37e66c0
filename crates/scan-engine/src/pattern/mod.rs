//! 컴포넌트 패턴 매처 — 경로에서 컴포넌트 식별 정보 유도
//!
//! 선언 순서대로 평가되는 순수 함수 매처입니다. 평가 순서:
//!
//! 1. 정확 경로 오버라이드 조회 (즉시 반환)
//! 2. 매칭될 수 없는 확장자 거부 목록 (정규식 비용 없이 즉시 반환)
//! 3. 선언된 패턴의 선형 탐색 — 첫 매칭이 네 백레퍼런스 템플릿을
//!    독립적으로 전개하여 이름/버전/한정자/제거 하위 경로를 유도
//! 4. 모듈 형식 확장자인데 매칭 실패 시 비치명적 진단 로그
//!
//! 패턴 선언 순서는 의미를 가집니다: 기존 패턴 뒤에 추가된 겹치는
//! 패턴은 앞 패턴이 이미 매칭하던 입력의 결과를 바꾸지 않습니다.
//! 정규식은 로딩 시 한 번만 컴파일되며, 컴파일 실패는 기동 전
//! 치명적 에러입니다.

pub mod loader;

pub use loader::PatternLoader;

use std::collections::{HashMap, HashSet};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use strata_core::types::ComponentIdentity;

use crate::error::ScanEngineError;

/// 매칭될 수 없는 확장자 기본 거부 목록
const DEFAULT_DENY_EXTENSIONS: &[&str] = &[
    "txt", "md", "html", "htm", "css", "png", "jpg", "jpeg", "gif", "svg", "ico", "pdf",
];

/// 패키지 모듈 형식 확장자 — 매칭 실패 시 진단 로그 대상
const MODULE_EXTENSIONS: &[&str] = &["jar", "war", "ear", "aar", "whl", "egg", "gem", "nupkg"];

/// 선언형 패턴 규칙 — 정규식 하나와 네 백레퍼런스 템플릿
///
/// 템플릿은 regex 크레이트의 전개 문법(`${1}`)을 사용합니다.
/// 빈 템플릿은 해당 필드 없음을 의미합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRule {
    /// 규칙 ID (진단 및 앵커 역추적용)
    pub id: String,
    /// 스캔 상대 경로에 적용되는 정규식
    pub path_regex: String,
    /// 컴포넌트 이름 템플릿
    #[serde(default)]
    pub name_template: String,
    /// 버전 템플릿
    #[serde(default)]
    pub version_template: String,
    /// 한정자 템플릿
    #[serde(default)]
    pub qualifier_template: String,
    /// 제거 하위 경로 템플릿
    #[serde(default)]
    pub subpath_template: String,
    /// 타입 라벨
    pub component_type: String,
    /// 세부 타입 라벨
    pub specific_type: String,
    /// 앵커 체크섬 — 레거시 다이제스트가 일치하면 아티팩트에 앵커 표시
    #[serde(default)]
    pub anchor_checksums: Vec<String>,
}

/// 컴파일된 패턴
#[derive(Debug)]
struct CompiledPattern {
    rule: PatternRule,
    regex: Regex,
}

/// 컴포넌트 패턴 매처
///
/// 의존성이 없는 순수 함수입니다. 스캔 시작 전에 구성이 끝나며,
/// 스캔 중에는 읽기 전용으로 공유됩니다.
#[derive(Debug)]
pub struct PatternMatcher {
    overrides: HashMap<String, ComponentIdentity>,
    deny_extensions: HashSet<String>,
    module_extensions: HashSet<String>,
    patterns: Vec<CompiledPattern>,
    anchors: HashMap<String, String>,
}

impl PatternMatcher {
    /// 빈 매처를 생성합니다 (기본 거부 목록 포함).
    pub fn new() -> Self {
        Self {
            overrides: HashMap::new(),
            deny_extensions: DEFAULT_DENY_EXTENSIONS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            module_extensions: MODULE_EXTENSIONS.iter().map(|s| (*s).to_owned()).collect(),
            patterns: Vec::new(),
            anchors: HashMap::new(),
        }
    }

    /// 내장 기본 패턴이 선언된 매처를 생성합니다.
    pub fn with_defaults() -> Result<Self, ScanEngineError> {
        let mut matcher = Self::new();
        for rule in default_rules() {
            matcher.add_rule(rule)?;
        }
        Ok(matcher)
    }

    /// 패턴 규칙을 선언 순서의 끝에 추가합니다.
    ///
    /// 정규식 컴파일 실패는 치명적 에러로 반환됩니다.
    pub fn add_rule(&mut self, rule: PatternRule) -> Result<(), ScanEngineError> {
        let regex = Regex::new(&rule.path_regex).map_err(|e| ScanEngineError::PatternCompile {
            id: rule.id.clone(),
            reason: e.to_string(),
        })?;
        for checksum in &rule.anchor_checksums {
            self.anchors
                .insert(checksum.to_ascii_lowercase(), rule.id.clone());
        }
        self.patterns.push(CompiledPattern { rule, regex });
        Ok(())
    }

    /// 정확 경로 오버라이드를 등록합니다.
    pub fn add_override(&mut self, path: impl Into<String>, identity: ComponentIdentity) {
        self.overrides.insert(path.into(), identity);
    }

    /// 선언된 패턴 수를 반환합니다.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// 등록된 규칙 ID 목록을 선언 순서로 반환합니다.
    pub fn rule_ids(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.rule.id.as_str()).collect()
    }

    /// 경로에서 컴포넌트 식별 정보를 유도합니다.
    pub fn identify(&self, path: &str) -> Option<ComponentIdentity> {
        if let Some(identity) = self.overrides.get(path) {
            return Some(identity.clone());
        }

        let extension = crate::policy::extension_of(path);
        if let Some(ref ext) = extension {
            if self.deny_extensions.contains(ext) {
                return None;
            }
        }

        for compiled in &self.patterns {
            if let Some(caps) = compiled.regex.captures(path) {
                return Some(expand_identity(&compiled.rule, &caps));
            }
        }

        if let Some(ref ext) = extension {
            if self.module_extensions.contains(ext) {
                debug!(path, "could not identify packaged module component");
            }
        }

        None
    }

    /// 레거시 다이제스트가 앵커 체크섬과 일치하면 규칙 ID를 반환합니다.
    pub fn anchor_pattern(&self, checksum: &str) -> Option<&str> {
        self.anchors
            .get(&checksum.to_ascii_lowercase())
            .map(String::as_str)
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// 매칭된 캡처에 네 템플릿을 독립적으로 전개합니다.
fn expand_identity(rule: &PatternRule, caps: &Captures<'_>) -> ComponentIdentity {
    ComponentIdentity {
        name: expand(caps, &rule.name_template).unwrap_or_default(),
        version: expand(caps, &rule.version_template),
        qualifier: expand(caps, &rule.qualifier_template),
        removable_subpath: expand(caps, &rule.subpath_template),
        component_type: rule.component_type.clone(),
        specific_type: rule.specific_type.clone(),
    }
}

fn expand(caps: &Captures<'_>, template: &str) -> Option<String> {
    if template.is_empty() {
        return None;
    }
    let mut out = String::new();
    caps.expand(template, &mut out);
    if out.is_empty() { None } else { Some(out) }
}

/// 내장 기본 패턴 규칙
///
/// 선언 순서가 곧 평가 순서입니다. 새 규칙은 반드시 뒤에 추가하세요 —
/// 앞 규칙이 이미 매칭하던 입력의 결과가 바뀌면 안 됩니다.
pub fn default_rules() -> Vec<PatternRule> {
    vec![
        PatternRule {
            id: "python-dist-info".to_owned(),
            path_regex: r"(?:^|/)([A-Za-z0-9_.]+)-([0-9][A-Za-z0-9_.!+]*)\.dist-info/[^/]+$"
                .to_owned(),
            name_template: "${1}".to_owned(),
            version_template: "${2}".to_owned(),
            qualifier_template: String::new(),
            subpath_template: "${1}-${2}.dist-info".to_owned(),
            component_type: "module".to_owned(),
            specific_type: "python-module".to_owned(),
            anchor_checksums: Vec::new(),
        },
        PatternRule {
            id: "python-egg-info".to_owned(),
            path_regex: r"(?:^|/)([A-Za-z0-9_.]+)-([0-9][A-Za-z0-9_.!+]*)\.egg-info(?:/[^/]+)?$"
                .to_owned(),
            name_template: "${1}".to_owned(),
            version_template: "${2}".to_owned(),
            qualifier_template: String::new(),
            subpath_template: "${1}-${2}.egg-info".to_owned(),
            component_type: "module".to_owned(),
            specific_type: "python-module".to_owned(),
            anchor_checksums: Vec::new(),
        },
        PatternRule {
            id: "maven-jar".to_owned(),
            path_regex: r"(?:^|/)([A-Za-z][A-Za-z0-9_.-]*?)-([0-9][A-Za-z0-9_.-]*)\.jar$"
                .to_owned(),
            name_template: "${1}".to_owned(),
            version_template: "${2}".to_owned(),
            qualifier_template: String::new(),
            subpath_template: String::new(),
            component_type: "module".to_owned(),
            specific_type: "java-module".to_owned(),
            anchor_checksums: Vec::new(),
        },
        PatternRule {
            id: "node-module".to_owned(),
            path_regex: r"(?:^|/)node_modules/((?:@[^/]+/)?[^/@][^/]*)/package\.json$".to_owned(),
            name_template: "${1}".to_owned(),
            version_template: String::new(),
            qualifier_template: String::new(),
            subpath_template: "package.json".to_owned(),
            component_type: "module".to_owned(),
            specific_type: "node-module".to_owned(),
            anchor_checksums: Vec::new(),
        },
        PatternRule {
            id: "ruby-gem".to_owned(),
            path_regex: r"(?:^|/)cache/([A-Za-z0-9_-]+)-([0-9][A-Za-z0-9_.]*)\.gem$".to_owned(),
            name_template: "${1}".to_owned(),
            version_template: "${2}".to_owned(),
            qualifier_template: String::new(),
            subpath_template: String::new(),
            component_type: "module".to_owned(),
            specific_type: "ruby-gem".to_owned(),
            anchor_checksums: Vec::new(),
        },
    ]
}
