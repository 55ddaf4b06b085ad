//! RAR-family comics (`.cbr`, `.rar`) through the unrar library.

use std::path::{Path, PathBuf};

use folio_model::EmbeddedMetadata;
use tracing::warn;
use unrar::Archive;

use super::comic_info::parse_comic_info;
use super::{ArchiveBackend, ArchiveError, ArchiveLimits, Result};
use crate::classifier::PathClassifier;
use crate::natural::natural_cmp;

/// RAR gives no random access; entries are located by a listing pass and
/// read back with a processing pass that skips everything else.
#[derive(Debug)]
pub struct RarHandle {
    path: PathBuf,
    pages: Vec<String>,
    sidecar: Option<String>,
    limits: ArchiveLimits,
}

fn corrupt(err: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Corrupt(err.to_string())
}

impl RarHandle {
    pub fn open(path: &Path, limits: ArchiveLimits) -> Result<Self> {
        let listing = Archive::new(path).open_for_listing().map_err(corrupt)?;
        let mut pages = Vec::new();
        let mut sidecars = Vec::new();
        let mut nested = 0usize;
        let mut entries = 0usize;
        for header in listing {
            let header = header.map_err(corrupt)?;
            entries += 1;
            if entries > limits.max_entries {
                return Err(ArchiveError::TooManyEntries(entries));
            }
            if header.is_directory() {
                continue;
            }
            let name = header.filename.to_string_lossy().replace('\\', "/");
            if PathClassifier::is_image_name(&name) {
                pages.push(name);
            } else if PathClassifier::is_sidecar_name(&name) {
                sidecars.push(name);
            } else if PathClassifier::is_container_name(&name) {
                nested += 1;
            }
        }
        if pages.is_empty() {
            return Err(if nested > 0 {
                ArchiveError::NestedArchive(nested)
            } else {
                ArchiveError::NoPages
            });
        }
        pages.sort_by(|a, b| natural_cmp(a, b));
        sidecars.sort_by_key(|name| (name.matches('/').count(), name.clone()));

        Ok(Self {
            path: path.to_path_buf(),
            pages,
            sidecar: sidecars.into_iter().next(),
            limits,
        })
    }

    fn read_entry(&self, wanted: &str, limit: u64) -> Result<Vec<u8>> {
        let mut archive = Archive::new(&self.path)
            .open_for_processing()
            .map_err(corrupt)?;
        while let Some(header) = archive.read_header().map_err(corrupt)? {
            let entry = header.entry();
            let name = entry.filename.to_string_lossy().replace('\\', "/");
            if name != wanted {
                archive = header.skip().map_err(corrupt)?;
                continue;
            }
            if entry.unpacked_size > limit {
                return Err(ArchiveError::EntryTooLarge {
                    name,
                    limit,
                });
            }
            let (bytes, _rest) = header.read().map_err(corrupt)?;
            return Ok(bytes);
        }
        Err(ArchiveError::Corrupt(format!("entry {wanted} vanished")))
    }
}

impl ArchiveBackend for RarHandle {
    fn entry_count(&self) -> usize {
        self.pages.len()
    }

    fn read_sidecar(&mut self) -> Option<EmbeddedMetadata> {
        let name = self.sidecar.clone()?;
        let parsed = self
            .read_entry(&name, self.limits.max_sidecar_bytes)
            .map(|bytes| parse_comic_info(&String::from_utf8_lossy(&bytes)));
        match parsed {
            Ok(Ok(metadata)) => Some(metadata),
            Ok(Err(err)) => {
                warn!(target: "scan::archive", path = %self.path.display(), error = %err, "malformed ComicInfo.xml; ignoring");
                None
            }
            Err(err) => {
                warn!(target: "scan::archive", path = %self.path.display(), error = %err, "sidecar unreadable; ignoring");
                None
            }
        }
    }

    fn extract_cover(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(first) = self.pages.first().cloned() else {
            return Ok(None);
        };
        self.read_entry(&first, self.limits.max_cover_bytes).map(Some)
    }
}
