use std::fs::{self, File};
use std::path::{Path, PathBuf};

use folio_model::EmbeddedMetadata;
use tracing::debug;

use super::comic_info::parse_comic_info;
use super::{ArchiveBackend, ArchiveLimits, Result, read_capped};

const FOLDER_SIDECAR: &str = "ComicInfo.xml";

/// A loose image. It is its own single page; its folder may carry a
/// ComicInfo.xml that describes the whole image set.
#[derive(Debug)]
pub struct ImageHandle {
    path: PathBuf,
    file: File,
    limits: ArchiveLimits,
}

impl ImageHandle {
    pub fn open(path: &Path, limits: ArchiveLimits) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            file: File::open(path)?,
            limits,
        })
    }

    fn folder_sidecar(&self) -> Option<PathBuf> {
        let parent = self.path.parent()?;
        let exact = parent.join(FOLDER_SIDECAR);
        if exact.is_file() {
            return Some(exact);
        }
        fs::read_dir(parent)
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .find(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.eq_ignore_ascii_case(FOLDER_SIDECAR))
            })
    }
}

impl ArchiveBackend for ImageHandle {
    fn entry_count(&self) -> usize {
        1
    }

    fn read_sidecar(&mut self) -> Option<EmbeddedMetadata> {
        let sidecar = self.folder_sidecar()?;
        let bytes = File::open(&sidecar)
            .map_err(Into::into)
            .and_then(|file| read_capped(file, FOLDER_SIDECAR, self.limits.max_sidecar_bytes));
        let parsed = bytes.map(|bytes| parse_comic_info(&String::from_utf8_lossy(&bytes)));
        match parsed {
            Ok(Ok(metadata)) => Some(metadata),
            Ok(Err(err)) => {
                debug!(target: "scan::archive", path = %sidecar.display(), error = %err, "malformed folder ComicInfo.xml; ignoring");
                None
            }
            Err(err) => {
                debug!(target: "scan::archive", path = %sidecar.display(), error = %err, "folder ComicInfo.xml unreadable; ignoring");
                None
            }
        }
    }

    fn extract_cover(&mut self) -> Result<Option<Vec<u8>>> {
        let name = self.path.to_string_lossy().into_owned();
        read_capped(&mut self.file, &name, self.limits.max_cover_bytes).map(Some)
    }
}
