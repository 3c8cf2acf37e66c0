//! 체크섬 계산 — 레거시 다이제스트와 SHA 계열을 한 번의 읽기로 계산
//!
//! 아티팩트당 체크섬은 최대 한 번 계산됩니다. 언랩 대기 아티팩트는
//! 계산이 언랩 태스크로 연기되므로, 호출 시점은 수집 태스크 또는
//! 언랩 태스크 중 한 곳뿐입니다.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha1::{Digest, Sha1};
use sha2::{Sha256, Sha512};

use strata_core::types::ChecksumSet;

use crate::error::ScanEngineError;

/// 스트리밍 읽기 버퍼 크기
const READ_BUF_SIZE: usize = 64 * 1024;

/// 파일의 체크섬 집합을 계산합니다.
///
/// 파일을 한 번만 읽으면서 네 다이제스트를 동시에 갱신합니다.
pub fn checksum_file(path: &Path) -> Result<ChecksumSet, ScanEngineError> {
    let file = File::open(path).map_err(|e| ScanEngineError::io(path, e))?;
    let mut reader = BufReader::new(file);

    let mut legacy = md5::Context::new();
    let mut sha1 = Sha1::new();
    let mut sha256 = Sha256::new();
    let mut sha512 = Sha512::new();

    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        let read = reader
            .read(&mut buf)
            .map_err(|e| ScanEngineError::io(path, e))?;
        if read == 0 {
            break;
        }
        legacy.consume(&buf[..read]);
        sha1.update(&buf[..read]);
        sha256.update(&buf[..read]);
        sha512.update(&buf[..read]);
    }

    Ok(ChecksumSet {
        digest: format!("{:x}", legacy.compute()),
        sha1: format!("{:x}", sha1.finalize()),
        sha256: format!("{:x}", sha256.finalize()),
        sha512: format!("{:x}", sha512.finalize()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn known_digests_for_abc() {
        let file = write_temp(b"abc");
        let sums = checksum_file(file.path()).unwrap();
        assert_eq!(sums.digest, "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(sums.sha1, "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(
            sums.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(sums.sha512.starts_with("ddaf35a193617aba"));
    }

    #[test]
    fn empty_file_digests() {
        let file = write_temp(b"");
        let sums = checksum_file(file.path()).unwrap();
        assert_eq!(sums.digest, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(sums.sha1, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn identical_content_yields_identical_checksums() {
        let a = write_temp(b"same content");
        let b = write_temp(b"same content");
        assert_eq!(
            checksum_file(a.path()).unwrap(),
            checksum_file(b.path()).unwrap()
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = checksum_file(Path::new("/nonexistent/file.bin")).unwrap_err();
        assert!(matches!(err, ScanEngineError::Io { .. }));
    }

    #[test]
    fn large_file_spans_multiple_buffers() {
        let content = vec![0xabu8; READ_BUF_SIZE * 2 + 17];
        let file = write_temp(&content);
        let sums = checksum_file(file.path()).unwrap();
        // 전체 내용을 한 번에 계산한 값과 일치해야 함
        assert_eq!(sums.digest, format!("{:x}", md5::compute(&content)));
    }
}
