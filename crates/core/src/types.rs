//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 스캔 엔진이 생성하고 인벤토리 소비자가 읽는 데이터 구조를 정의합니다.
//! [`Artifact`]는 발견된 파일 하나가 인벤토리 행 하나가 된 것이고,
//! [`Asset`]은 보존된 언랩 아카이브 하나의 출처 그룹 레코드입니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 참조 힌트 분류
///
/// 외부 참조 DB가 파일명 단위로 제공하는 분류 값입니다.
/// 언랩 정책의 4-플래그 유도가 이 닫힌 변형에 대해 전수 검사됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// 내부를 재귀 스캔해야 하는 컨테이너
    Scan,
    /// 복합 구조 — 스캔과 동일하게 언랩 대상
    Complex,
    /// 더 쪼개지 않는 단일 유닛
    Atomic,
    /// 항상 인벤토리에 포함
    Include,
    /// 인벤토리에서 제외
    Exclude,
    /// 무시 — 제외와 동일하게 처리
    Ignore,
}

impl Classification {
    /// 대소문자 무시 문자열 파싱 (설정/외부 DB 값 수용용)
    pub fn from_str_loose(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "scan" => Some(Self::Scan),
            "complex" => Some(Self::Complex),
            "atomic" => Some(Self::Atomic),
            "include" => Some(Self::Include),
            "exclude" => Some(Self::Exclude),
            "ignore" => Some(Self::Ignore),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scan => "scan",
            Self::Complex => "complex",
            Self::Atomic => "atomic",
            Self::Include => "include",
            Self::Exclude => "exclude",
            Self::Ignore => "ignore",
        };
        write!(f, "{name}")
    }
}

/// 참조 힌트 — 파일명 하나에 대한 분류 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceHint {
    /// 대상 파일명 (경로 아님)
    pub filename: String,
    /// 분류 값
    pub classification: Classification,
}

/// 체크섬 집합
///
/// 레거시 전체 파일 다이제스트(md5)와 SHA 계열을 함께 담습니다.
/// 네 값은 항상 한 번의 스트리밍 읽기로 같이 계산됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumSet {
    /// 레거시 전체 파일 다이제스트 (hex)
    pub digest: String,
    /// SHA-1 (hex)
    pub sha1: String,
    /// SHA-256 (hex)
    pub sha256: String,
    /// SHA-512 (hex)
    pub sha512: String,
}

/// 아티팩트 — 발견된 파일시스템 유닛 하나 = 인벤토리 행 하나
///
/// 최초 방문 시 생성되고, 분류/언랩 해석과 해시 계산으로 변경됩니다.
/// 결과 집합에서의 제거는 `marked_for_deletion` 표시로만 이루어집니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// 아티팩트 ID (파일명)
    pub id: String,
    /// 스캔 루트 기준 상대 경로
    pub path: String,
    /// 체크섬 집합 — 아티팩트당 최대 한 번만 계산됩니다
    pub checksums: Option<ChecksumSet>,
    /// 분류 태그 (힌트 복사 또는 콘텐츠 스니핑 결과)
    pub classification: Option<Classification>,
    /// 타입 라벨 (예: "archive", "module")
    pub artifact_type: Option<String>,
    /// 세부 타입 라벨 (예: "python-module", 아카이브 확장자)
    pub source_type: Option<String>,
    /// 패턴 매칭으로 유도된 컴포넌트 식별 정보
    pub identity: Option<ComponentIdentity>,
    /// 누적 이슈/에러 텍스트 — 항상 추가만 하고 덮어쓰지 않습니다
    pub issues: Vec<String>,
    /// 에셋 ID 체인 — 루트에서 리프 방향의 상대 경로 목록 (언랩마다 append)
    pub chain: Vec<String>,
    /// 이 아티팩트를 담고 있는 에셋 ID 목록
    pub contained_in: Vec<String>,
    /// 이 아티팩트가 곧 에셋일 때의 에셋 ID ("is-asset" 표시)
    pub asset_id: Option<String>,
    /// 체크섬이 패턴 앵커와 일치함
    pub anchor: bool,
    /// 언랩 대기 표시 (해시 계산은 언랩 태스크로 연기)
    pub pending_unwrap: bool,
    /// 최종 인벤토리에서 제거 예정 표시
    pub marked_for_deletion: bool,
}

impl Artifact {
    /// 새 아티팩트를 생성합니다.
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            checksums: None,
            classification: None,
            artifact_type: None,
            source_type: None,
            identity: None,
            issues: Vec::new(),
            chain: Vec::new(),
            contained_in: Vec::new(),
            asset_id: None,
            anchor: false,
            pending_unwrap: false,
            marked_for_deletion: false,
        }
    }

    /// 이슈 텍스트를 추가합니다 (append-only).
    pub fn push_issue(&mut self, issue: impl Into<String>) {
        self.issues.push(issue.into());
    }

    /// 누적 이슈를 쉼표로 연결한 문자열을 반환합니다.
    pub fn issues_joined(&self) -> String {
        self.issues.join(", ")
    }

    /// 체크섬 집합을 기록합니다.
    ///
    /// 이미 계산된 아티팩트에는 적용되지 않습니다 (파일당 최대 한 번).
    pub fn set_checksums(&mut self, checksums: ChecksumSet) {
        if self.checksums.is_none() {
            self.checksums = Some(checksums);
        }
    }

    /// 레거시 다이제스트를 반환합니다 (계산 전이면 None).
    pub fn digest(&self) -> Option<&str> {
        self.checksums.as_ref().map(|c| c.digest.as_str())
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.path)
    }
}

/// 에셋 — 보존된 언랩 아카이브/레이어 하나의 출처 그룹 레코드
///
/// 언랩에 성공하고 인벤토리에 보존된 아카이브당 정확히 한 번 생성됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// 콘텐츠 기반 ID — 접두어로 컨테이너 스코프/일반 스코프를 구분합니다
    pub id: String,
    /// 에셋 타입 (아카이브 확장자 등)
    pub asset_type: String,
    /// 원본 아카이브의 레거시 다이제스트
    pub checksum: String,
    /// 스캔 루트 기준 상대 경로
    pub path: String,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.path)
    }
}

/// 컴포넌트 식별 정보 — 패턴 매처의 출력
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentIdentity {
    /// 컴포넌트 이름
    pub name: String,
    /// 버전 (패턴이 추출하지 못하면 None)
    pub version: Option<String>,
    /// 한정자 (플랫폼, 분류자 등)
    pub qualifier: Option<String>,
    /// 컴포넌트 루트 계산 시 제거할 하위 경로
    pub removable_subpath: Option<String>,
    /// 타입 라벨 (예: "module")
    pub component_type: String,
    /// 세부 타입 라벨 (예: "python-module")
    pub specific_type: String,
}

/// 스캔 인벤토리 — 외부가 소유하는 누적기
///
/// 스캔 컨텍스트에 주입되어 아티팩트/에셋 레코드가 append되고,
/// 스캔 종료 후 호출자에게 반환됩니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanInventory {
    /// 발견된 아티팩트 (삭제 표시된 행 포함)
    pub artifacts: Vec<Artifact>,
    /// 등록된 에셋
    pub assets: Vec<Asset>,
}

impl ScanInventory {
    /// 빈 인벤토리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 아티팩트를 추가합니다 (중복 제거 없음).
    pub fn push_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    /// 에셋을 추가합니다.
    pub fn push_asset(&mut self, asset: Asset) {
        self.assets.push(asset);
    }

    /// 경로로 아티팩트를 가변 조회합니다.
    pub fn artifact_mut(&mut self, path: &str) -> Option<&mut Artifact> {
        self.artifacts.iter_mut().find(|a| a.path == path)
    }

    /// 삭제 표시되지 않은 아티팩트만 반환합니다.
    pub fn retained_artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(|a| !a.marked_for_deletion)
    }

    /// 보존 아티팩트 수를 반환합니다.
    pub fn retained_count(&self) -> usize {
        self.retained_artifacts().count()
    }

    /// 인벤토리를 JSON 문자열로 직렬화합니다.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_from_str_loose() {
        assert_eq!(Classification::from_str_loose("SCAN"), Some(Classification::Scan));
        assert_eq!(
            Classification::from_str_loose("complex"),
            Some(Classification::Complex)
        );
        assert_eq!(
            Classification::from_str_loose("Atomic"),
            Some(Classification::Atomic)
        );
        assert_eq!(Classification::from_str_loose("unknown"), None);
    }

    #[test]
    fn classification_display() {
        assert_eq!(Classification::Scan.to_string(), "scan");
        assert_eq!(Classification::Ignore.to_string(), "ignore");
    }

    #[test]
    fn classification_serde_roundtrip() {
        let json = serde_json::to_string(&Classification::Exclude).unwrap();
        assert_eq!(json, "\"exclude\"");
        let parsed: Classification = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Classification::Exclude);
    }

    #[test]
    fn artifact_new_has_empty_state() {
        let artifact = Artifact::new("foo.jar", "lib/foo.jar");
        assert_eq!(artifact.id, "foo.jar");
        assert_eq!(artifact.path, "lib/foo.jar");
        assert!(artifact.checksums.is_none());
        assert!(artifact.issues.is_empty());
        assert!(artifact.chain.is_empty());
        assert!(!artifact.marked_for_deletion);
    }

    #[test]
    fn artifact_issues_append_only() {
        let mut artifact = Artifact::new("a", "a");
        artifact.push_issue("first");
        artifact.push_issue("second");
        assert_eq!(artifact.issues_joined(), "first, second");
    }

    #[test]
    fn artifact_checksums_set_at_most_once() {
        let mut artifact = Artifact::new("a", "a");
        let first = ChecksumSet {
            digest: "aaa".to_owned(),
            sha1: "1".to_owned(),
            sha256: "2".to_owned(),
            sha512: "3".to_owned(),
        };
        let second = ChecksumSet {
            digest: "bbb".to_owned(),
            sha1: "x".to_owned(),
            sha256: "y".to_owned(),
            sha512: "z".to_owned(),
        };
        artifact.set_checksums(first);
        artifact.set_checksums(second);
        assert_eq!(artifact.digest(), Some("aaa"));
    }

    #[test]
    fn inventory_retained_filters_deletion_marks() {
        let mut inventory = ScanInventory::new();
        inventory.push_artifact(Artifact::new("keep", "keep"));
        let mut dropped = Artifact::new("drop", "drop");
        dropped.marked_for_deletion = true;
        inventory.push_artifact(dropped);

        assert_eq!(inventory.artifacts.len(), 2);
        assert_eq!(inventory.retained_count(), 1);
        assert_eq!(inventory.retained_artifacts().next().unwrap().id, "keep");
    }

    #[test]
    fn inventory_artifact_mut_by_path() {
        let mut inventory = ScanInventory::new();
        inventory.push_artifact(Artifact::new("a.zip", "dir/a.zip"));
        inventory
            .artifact_mut("dir/a.zip")
            .unwrap()
            .push_issue("late issue");
        assert_eq!(inventory.artifacts[0].issues_joined(), "late issue");
        assert!(inventory.artifact_mut("missing").is_none());
    }

    #[test]
    fn inventory_to_json_contains_artifacts() {
        let mut inventory = ScanInventory::new();
        inventory.push_artifact(Artifact::new("foo.jar", "lib/foo.jar"));
        let json = inventory.to_json().unwrap();
        assert!(json.contains("foo.jar"));
        assert!(json.contains("lib/foo.jar"));
    }

    #[test]
    fn asset_display() {
        let asset = Asset {
            id: "arc:base.tar:0011aabb".to_owned(),
            asset_type: "tar".to_owned(),
            checksum: "0011aabb".to_owned(),
            path: "layers/base.tar".to_owned(),
        };
        let text = asset.to_string();
        assert!(text.contains("arc:base.tar:0011aabb"));
        assert!(text.contains("layers/base.tar"));
    }
}
