//! 언랩 정책 — 파일 하나에 대한 4-플래그 불리언 유도
//!
//! 참조 힌트(파일명 단위, 체크섬 무관), 이전 콘텐츠 스니핑 분류,
//! 파일 확장자, 설정된 인스톨러 접미사 네 입력에서 언랩/포함/제외를
//! 결정합니다. [`Classification`]이 닫힌 enum이므로 유도 규칙은
//! 컴파일러와 테스트로 전수 검사됩니다.
//!
//! 알려진 비대칭: 명시 금지(`explicit_no_unwrap`)는 콘텐츠 스니핑으로
//! `Scan` 판정이 이미 내려진 파일조차 뒤집습니다. 이 동작을 바로잡으면
//! 기존 SBOM 출력이 조용히 바뀌므로 그대로 유지합니다.

use strata_core::types::{Classification, ReferenceHint};

/// 언랩 정책 플래그
///
/// 하나의 언랩 대기 아티팩트에 대해 한 번 유도되어 언랩 태스크의
/// 상태 기계 전체를 구동합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwrapPolicy {
    /// 힌트가 Scan/Complex — 반드시 언랩 시도
    pub explicit_unwrap: bool,
    /// 힌트가 Atomic (Scan/Complex 힌트 부재 시) — 언랩 금지
    pub explicit_no_unwrap: bool,
    /// 힌트가 Include이거나 항상 포함되는 인스톨러 접미사
    pub explicit_include: bool,
    /// 힌트가 Exclude/Ignore (Include 부재 시)
    pub explicit_exclude: bool,
    /// 콘텐츠 스니핑 Scan 판정 또는 (힌트 부재 + 일반 모듈 형식 아님)
    pub implicit_unwrap: bool,
    /// 언랩 금지를 유발한 힌트의 분류 (아티팩트로 복사용)
    pub no_unwrap_hint: Option<Classification>,
}

impl UnwrapPolicy {
    /// 네 입력에서 정책을 유도합니다.
    ///
    /// # Arguments
    ///
    /// - `filename`: 아티팩트 파일명 (경로 아님)
    /// - `prior_classification`: 이전 스니핑 패스가 남긴 분류
    /// - `hints`: 파일명 단위 참조 힌트 (체크섬 무관 조회 결과)
    /// - `plain_module_extensions`: 단일 유닛으로 취급하는 확장자 (점 없이)
    /// - `installer_suffixes`: 항상 포함하는 인스톨러 접미사
    pub fn derive(
        filename: &str,
        prior_classification: Option<Classification>,
        hints: &[ReferenceHint],
        plain_module_extensions: &[String],
        installer_suffixes: &[String],
    ) -> Self {
        let has_hint = !hints.is_empty();

        let explicit_unwrap = hints.iter().any(|h| {
            matches!(
                h.classification,
                Classification::Scan | Classification::Complex
            )
        });

        let no_unwrap_hint = if explicit_unwrap {
            None
        } else {
            hints
                .iter()
                .find(|h| h.classification == Classification::Atomic)
                .map(|h| h.classification)
        };
        let explicit_no_unwrap = no_unwrap_hint.is_some();

        let lower = filename.to_ascii_lowercase();
        let installer_suffix = installer_suffixes
            .iter()
            .any(|suffix| lower.ends_with(&suffix.to_ascii_lowercase()));
        let explicit_include = installer_suffix
            || hints
                .iter()
                .any(|h| h.classification == Classification::Include);

        let explicit_exclude = !explicit_include
            && hints.iter().any(|h| {
                matches!(
                    h.classification,
                    Classification::Exclude | Classification::Ignore
                )
            });

        let plain_module = extension_of(filename)
            .map(|ext| plain_module_extensions.iter().any(|p| p == &ext))
            .unwrap_or(false);
        let implicit_unwrap =
            prior_classification == Some(Classification::Scan) || (!has_hint && !plain_module);

        Self {
            explicit_unwrap,
            explicit_no_unwrap,
            explicit_include,
            explicit_exclude,
            implicit_unwrap,
            no_unwrap_hint,
        }
    }

    /// 언랩을 시도해야 하는지 반환합니다.
    pub fn should_attempt(&self) -> bool {
        !self.explicit_no_unwrap && (self.implicit_unwrap || self.explicit_unwrap)
    }

    /// 암묵적 제외 여부 — 언랩 성공 후 통과형 아카이브 판정에 사용됩니다.
    pub fn implicit_exclude(&self) -> bool {
        !self.explicit_include && !self.explicit_unwrap
    }
}

/// 파일명의 확장자를 소문자로 반환합니다 (점 없이).
pub(crate) fn extension_of(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}
