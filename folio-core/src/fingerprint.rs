use std::fs::{File, Metadata};
use std::io::{self, Read};
use std::path::Path;
use std::time::UNIX_EPOCH;

use folio_model::FileFingerprint;
use sha2::{Digest, Sha256};

/// Leading bytes hashed into the weak content hash.
pub const SAMPLE_BYTES: u64 = 64 * 1024;

/// Hex digest of the first [`SAMPLE_BYTES`] of `path`.
///
/// This touches file content, so callers run it under the archive permit
/// and timeout rather than on the walking thread.
pub fn weak_hash(path: &Path) -> io::Result<String> {
    let mut sample = Vec::with_capacity(SAMPLE_BYTES as usize);
    File::open(path)?.take(SAMPLE_BYTES).read_to_end(&mut sample)?;
    let digest = Sha256::digest(&sample);
    Ok(hex::encode(&digest[..16]))
}

pub fn modified_ms(metadata: &Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .and_then(|elapsed| i64::try_from(elapsed.as_millis()).ok())
        .unwrap_or_default()
}

/// Metadata-only fingerprint. The weak hash starts out empty and is filled
/// in when the file is inspected.
pub fn from_metadata(metadata: &Metadata) -> FileFingerprint {
    FileFingerprint {
        size: metadata.len(),
        modified_ms: modified_ms(metadata),
        weak_hash: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sampled(path: &Path) -> FileFingerprint {
        FileFingerprint {
            weak_hash: weak_hash(path).ok(),
            ..from_metadata(&fs::metadata(path).unwrap())
        }
    }

    #[test]
    fn identical_content_shares_identity() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.cbz");
        let b = dir.path().join("nested-b.cbz");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();

        let fa = sampled(&a);
        let fb = sampled(&b);
        assert_eq!(fa.identity_key(), fb.identity_key());
        assert_eq!(fa.size, 10);

        fs::write(&b, b"other bytes").unwrap();
        let fb = sampled(&b);
        assert_ne!(fa.identity_key(), fb.identity_key());
    }

    #[test]
    fn metadata_fingerprint_has_no_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cbz");
        fs::write(&path, b"bytes").unwrap();
        let fingerprint = from_metadata(&fs::metadata(&path).unwrap());
        assert_eq!(fingerprint.size, 5);
        assert_eq!(fingerprint.identity_key(), None);
    }

    #[test]
    fn only_the_leading_sample_is_hashed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let mut bytes = vec![7u8; SAMPLE_BYTES as usize + 10];
        fs::write(&path, &bytes).unwrap();
        let before = weak_hash(&path).unwrap();
        bytes[SAMPLE_BYTES as usize + 5] = 1;
        fs::write(&path, &bytes).unwrap();
        assert_eq!(weak_hash(&path).unwrap(), before);
    }
}
