//! Path-only decisions about which filesystem entries the scanner cares
//! about. Nothing here touches the disk.

use std::path::Path;

use folio_model::Format;

const ARCHIVE_EXTENSIONS: &[&str] = &["cbz", "zip", "cbr", "rar"];
const BOOK_EXTENSIONS: &[(&str, Format)] =
    &[("epub", Format::Epub), ("pdf", Format::Pdf)];
const IMAGE_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "gif", "webp", "avif", "bmp", "jxl"];
const PARTIAL_DOWNLOAD_EXTENSIONS: &[&str] =
    &["part", "crdownload", "download", "partial", "tmp", "!qb", "aria2"];
const SYSTEM_FILES: &[&str] = &["thumbs.db", "desktop.ini", ".ds_store"];
const SYSTEM_DIRECTORIES: &[&str] =
    &["__macosx", "@eadir", "@recycle", "#recycle", ".@__thumb", "$recycle.bin"];
// Artwork dropped next to series files by other tools, not pages.
const ARTWORK_STEMS: &[&str] = &["cover", "folder", "poster", "thumbnail", "banner"];
const SIDECAR_NAME: &str = "comicinfo.xml";

/// Outcome of classifying a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Supported(Format),
    SidecarMetadata,
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Hidden,
    SystemFile,
    PartialDownload,
    Empty,
    Artwork,
    NoExtension,
    UnsupportedExtension,
}

impl Classification {
    pub fn format(self) -> Option<Format> {
        match self {
            Classification::Supported(format) => Some(format),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PathClassifier;

impl PathClassifier {
    /// Classify by file name alone. Ancestor directories are the walker's
    /// concern (see [`PathClassifier::is_ignored_directory`]).
    pub fn classify(path: &Path) -> Classification {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return Classification::Ignored(IgnoreReason::NoExtension);
        };
        let lowered = name.to_ascii_lowercase();

        if SYSTEM_FILES.contains(&lowered.as_str()) {
            return Classification::Ignored(IgnoreReason::SystemFile);
        }
        if lowered.starts_with('.') {
            return Classification::Ignored(IgnoreReason::Hidden);
        }
        if lowered == SIDECAR_NAME {
            return Classification::SidecarMetadata;
        }

        let Some(extension) = extension_of(&lowered) else {
            return Classification::Ignored(IgnoreReason::NoExtension);
        };
        if PARTIAL_DOWNLOAD_EXTENSIONS.contains(&extension) {
            return Classification::Ignored(IgnoreReason::PartialDownload);
        }

        match Self::format_for_extension(extension) {
            Some(Format::Image) if is_artwork(&lowered) => {
                Classification::Ignored(IgnoreReason::Artwork)
            }
            Some(format) => Classification::Supported(format),
            None => Classification::Ignored(IgnoreReason::UnsupportedExtension),
        }
    }

    /// Classify with the entry's size; zero-byte files are never supported.
    pub fn classify_entry(path: &Path, len: u64) -> Classification {
        match Self::classify(path) {
            Classification::Supported(_) if len == 0 => {
                Classification::Ignored(IgnoreReason::Empty)
            }
            other => other,
        }
    }

    pub fn format_for_extension(extension: &str) -> Option<Format> {
        let lowered = extension.to_ascii_lowercase();
        if ARCHIVE_EXTENSIONS.contains(&lowered.as_str()) {
            return Some(Format::Archive);
        }
        if IMAGE_EXTENSIONS.contains(&lowered.as_str()) {
            return Some(Format::Image);
        }
        BOOK_EXTENSIONS
            .iter()
            .find(|(ext, _)| *ext == lowered)
            .map(|(_, format)| *format)
    }

    pub fn format_for_path(path: &Path) -> Option<Format> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::format_for_extension)
    }

    /// Directories the walker never descends into.
    pub fn is_ignored_directory(name: &str) -> bool {
        let lowered = name.to_ascii_lowercase();
        (lowered.starts_with('.') && lowered != "." && lowered != "..")
            || SYSTEM_DIRECTORIES.contains(&lowered.as_str())
    }

    /// Entry names inside containers that are page images.
    pub fn is_image_name(name: &str) -> bool {
        let lowered = name.to_ascii_lowercase();
        let base = lowered.rsplit('/').next().unwrap_or(&lowered);
        !base.starts_with('.')
            && !lowered.contains("__macosx/")
            && extension_of(base).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext))
    }

    /// Entry names inside containers that are themselves containers.
    pub fn is_container_name(name: &str) -> bool {
        let lowered = name.to_ascii_lowercase();
        extension_of(&lowered).is_some_and(|ext| {
            ARCHIVE_EXTENSIONS.contains(&ext) || matches!(ext, "7z" | "cb7" | "epub")
        })
    }

    pub fn is_sidecar_name(name: &str) -> bool {
        name.rsplit(['/', '\\'])
            .next()
            .is_some_and(|base| base.eq_ignore_ascii_case(SIDECAR_NAME))
    }
}

fn extension_of(name: &str) -> Option<&str> {
    let (stem, extension) = name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        None
    } else {
        Some(extension)
    }
}

fn is_artwork(lowered_name: &str) -> bool {
    lowered_name
        .rsplit_once('.')
        .is_some_and(|(stem, _)| ARTWORK_STEMS.contains(&stem))
}
