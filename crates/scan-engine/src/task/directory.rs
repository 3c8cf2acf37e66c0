//! 디렉토리 태스크 — 엔트리를 순회하며 후속 태스크 생성

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::context::ScanContext;
use crate::error::ScanEngineError;
use crate::task::{ScanTask, bracket_inner};

/// 디렉토리 순회 태스크
///
/// 규칙:
/// - 심링크는 절대 따라가지 않고 건너뜁니다.
/// - 포함/제외 패턴으로 걸러진 엔트리는 건너뜁니다.
/// - 일반 파일은 같은 체인으로 수집 태스크를 만듭니다.
/// - 브래킷이 아닌 하위 디렉토리는 중첩 디렉토리 태스크를 만듭니다.
/// - 브래킷 폴더 `[x]`는 곁에 파일 `x`가 더 이상 없을 때만 큐에
///   넣습니다 — 고아가 된 언팩 출력물만 직접 재스캔하며, 정상 언팩
///   출력물은 해당 언랩 태스크가 암묵적으로 처리합니다.
pub struct DirectoryTask {
    dir: PathBuf,
    chain: Vec<String>,
}

impl DirectoryTask {
    /// 새 디렉토리 태스크를 생성합니다.
    pub fn new(dir: PathBuf, chain: Vec<String>) -> Self {
        Self { dir, chain }
    }

    /// 디렉토리를 순회합니다.
    ///
    /// 읽을 수 없는 디렉토리는 경고 후 건너뜁니다 — 에러를 던지지
    /// 않으므로 남은 큐는 계속 처리됩니다.
    pub fn process(self, context: &mut ScanContext) -> Result<(), ScanEngineError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    dir = %self.dir.display(),
                    error = %e,
                    "unreadable directory, skipping"
                );
                return Ok(());
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(
                        dir = %self.dir.display(),
                        error = %e,
                        "failed to read directory entry, skipping"
                    );
                    continue;
                }
            };
            let path = entry.path();

            // 심링크 판별은 링크 자체의 메타데이터로
            let metadata = match fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to stat entry, skipping");
                    continue;
                }
            };

            if metadata.file_type().is_symlink() {
                debug!(path = %path.display(), "skipping symlink");
                continue;
            }

            let relative = context.relative_path(&path);

            if metadata.is_file() {
                if context.is_excluded_file(&relative) {
                    debug!(path = %relative, "excluded by path patterns");
                    continue;
                }
                context.enqueue(ScanTask::collect(path, self.chain.clone()));
            } else if metadata.is_dir() {
                if context.is_excluded_dir(&relative) {
                    debug!(path = %relative, "excluded by path patterns");
                    continue;
                }

                let name = entry.file_name();
                let name = name.to_string_lossy();
                if let Some(inner) = bracket_inner(&name) {
                    // 언팩 출력 폴더: 원본 파일이 살아있으면 언랩 태스크가
                    // 처리하므로 여기서는 건너뜀
                    let sibling = self.dir.join(inner);
                    if sibling.is_file() {
                        debug!(
                            path = %relative,
                            "unpack output with live sibling, handled by its unwrap task"
                        );
                        continue;
                    }
                    debug!(path = %relative, "orphaned unpack output, rescanning");
                }

                context.enqueue(ScanTask::directory(path, self.chain.clone()));
            }
            // 파일도 디렉토리도 아닌 엔트리(fifo, 소켓 등)는 무시
        }

        Ok(())
    }
}
