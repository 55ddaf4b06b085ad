use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use folio_model::EmbeddedMetadata;
use tracing::{debug, warn};
use zip::ZipArchive;

use super::comic_info::parse_comic_info;
use super::{ArchiveBackend, ArchiveError, ArchiveLimits, Result, read_capped};
use crate::classifier::PathClassifier;
use crate::natural::natural_cmp;

pub(super) type ZipReader = ZipArchive<BufReader<File>>;

/// Zip-family comic (`.cbz`, `.zip`).
pub struct ZipHandle {
    path: PathBuf,
    archive: ZipReader,
    /// Page entries in natural order.
    pages: Vec<String>,
    sidecar: Option<String>,
    limits: ArchiveLimits,
}

impl std::fmt::Debug for ZipHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipHandle")
            .field("path", &self.path)
            .field("pages", &self.pages.len())
            .field("sidecar", &self.sidecar)
            .finish()
    }
}

pub(super) fn open_zip(path: &Path, limits: ArchiveLimits) -> Result<ZipReader> {
    let file = File::open(path)?;
    let archive = ZipArchive::new(BufReader::new(file))?;
    if archive.len() > limits.max_entries {
        return Err(ArchiveError::TooManyEntries(archive.len()));
    }
    Ok(archive)
}

/// Image entries of `archive` in natural order.
pub(super) fn image_entries(archive: &ZipReader) -> Vec<String> {
    let mut pages: Vec<String> = archive
        .file_names()
        .filter(|name| !name.ends_with('/') && PathClassifier::is_image_name(name))
        .map(str::to_string)
        .collect();
    pages.sort_by(|a, b| natural_cmp(a, b));
    pages
}

pub(super) fn read_entry(
    archive: &mut ZipReader,
    name: &str,
    limit: u64,
) -> Result<Vec<u8>> {
    let entry = archive.by_name(name)?;
    if entry.size() > limit {
        return Err(ArchiveError::EntryTooLarge {
            name: name.to_string(),
            limit,
        });
    }
    read_capped(entry, name, limit)
}

impl ZipHandle {
    pub fn open(path: &Path, limits: ArchiveLimits) -> Result<Self> {
        let archive = open_zip(path, limits)?;
        let pages = image_entries(&archive);
        if pages.is_empty() {
            let nested = archive
                .file_names()
                .filter(|name| PathClassifier::is_container_name(name))
                .count();
            return Err(if nested > 0 {
                ArchiveError::NestedArchive(nested)
            } else {
                ArchiveError::NoPages
            });
        }

        // Prefer a root-level ComicInfo.xml over one buried in a folder.
        let mut sidecars: Vec<&str> = archive
            .file_names()
            .filter(|name| PathClassifier::is_sidecar_name(name))
            .collect();
        sidecars.sort_by_key(|name| (name.matches('/').count(), name.to_string()));
        let sidecar = sidecars.first().map(|name| name.to_string());

        Ok(Self {
            path: path.to_path_buf(),
            archive,
            pages,
            sidecar,
            limits,
        })
    }
}

impl ArchiveBackend for ZipHandle {
    fn entry_count(&self) -> usize {
        self.pages.len()
    }

    fn read_sidecar(&mut self) -> Option<EmbeddedMetadata> {
        let name = self.sidecar.clone()?;
        let bytes = match read_entry(&mut self.archive, &name, self.limits.max_sidecar_bytes) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(target: "scan::archive", path = %self.path.display(), error = %err, "sidecar unreadable; ignoring");
                return None;
            }
        };
        let xml = String::from_utf8_lossy(&bytes);
        match parse_comic_info(&xml) {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                warn!(target: "scan::archive", path = %self.path.display(), error = %err, "malformed ComicInfo.xml; ignoring");
                None
            }
        }
    }

    fn extract_cover(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(first) = self.pages.first().cloned() else {
            return Ok(None);
        };
        debug!(target: "scan::archive", path = %self.path.display(), entry = %first, "cover entry");
        read_entry(&mut self.archive, &first, self.limits.max_cover_bytes).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, bytes) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn pages_sidecar_and_cover() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.cbz");
        write_zip(
            &path,
            &[
                ("p10.jpg", b"ten"),
                ("p2.jpg", b"two"),
                ("notes.txt", b"x"),
                ("ComicInfo.xml", b"<ComicInfo><Series>Zed</Series></ComicInfo>"),
            ],
        );
        let mut handle = ZipHandle::open(&path, ArchiveLimits::default()).unwrap();
        assert_eq!(handle.entry_count(), 2);
        assert_eq!(handle.read_sidecar().unwrap().series.as_deref(), Some("Zed"));
        assert_eq!(handle.extract_cover().unwrap().unwrap(), b"two");
    }

    #[test]
    fn malformed_sidecar_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.cbz");
        write_zip(&path, &[("1.png", b"x"), ("ComicInfo.xml", b"<ComicInfo><Series>")]);
        let mut handle = ZipHandle::open(&path, ArchiveLimits::default()).unwrap();
        assert!(handle.read_sidecar().is_none());
        assert_eq!(handle.entry_count(), 1);
    }

    #[test]
    fn nested_only_archives_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.cbz");
        write_zip(&path, &[("inner/vol1.cbz", b"PK"), ("inner/vol2.cbz", b"PK")]);
        assert!(matches!(
            ZipHandle::open(&path, ArchiveLimits::default()),
            Err(ArchiveError::NestedArchive(2))
        ));
    }

    #[test]
    fn oversized_sidecar_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.cbz");
        let big = vec![b' '; 2048];
        write_zip(&path, &[("1.png", b"x"), ("ComicInfo.xml", &big)]);
        let limits = ArchiveLimits {
            max_sidecar_bytes: 1024,
            ..ArchiveLimits::default()
        };
        let mut handle = ZipHandle::open(&path, limits).unwrap();
        assert!(handle.read_sidecar().is_none());
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.cbz");
        std::fs::write(&path, b"definitely not a zip").unwrap();
        assert!(matches!(
            ZipHandle::open(&path, ArchiveLimits::default()),
            Err(ArchiveError::Corrupt(_))
        ));
    }
}
