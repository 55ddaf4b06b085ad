//! Container access for every supported format family.
//!
//! [`ArchiveReader::open`] picks a backend from the format and extension and
//! returns an [`ArchiveHandle`]. Handles own their file descriptors; dropping
//! the handle releases them on every path, including early returns and
//! panics inside a blocking task.

mod cbz;
mod comic_info;
mod epub;
mod image;
#[cfg(feature = "pdf")]
mod pdf;
#[cfg(feature = "rar")]
mod rar;

use std::io;
use std::path::Path;
use std::time::Duration;

use folio_model::{EmbeddedMetadata, Format};
use thiserror::Error;

pub use comic_info::parse_comic_info;

/// File-level failures. Each one excludes a single file from the pass.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt archive: {0}")]
    Corrupt(String),

    #[error("unsupported container: {0}")]
    Unsupported(String),

    #[error("archive contains no pages")]
    NoPages,

    #[error("nested archives are not supported ({0} nested containers, no pages)")]
    NestedArchive(usize),

    #[error("archive has {0} entries, more than allowed")]
    TooManyEntries(usize),

    #[error("entry {name} is larger than {limit} bytes")]
    EntryTooLarge { name: String, limit: u64 },

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

impl From<::zip::result::ZipError> for ArchiveError {
    fn from(err: ::zip::result::ZipError) -> Self {
        match err {
            ::zip::result::ZipError::Io(io) => ArchiveError::Io(io),
            other => ArchiveError::Corrupt(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Caps applied while reading entries, so a hostile archive cannot make
/// the scanner allocate unbounded memory.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveLimits {
    pub max_entries: usize,
    pub max_sidecar_bytes: u64,
    pub max_cover_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_entries: 100_000,
            max_sidecar_bytes: 4 * 1024 * 1024,
            max_cover_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Capabilities every container backend provides.
pub trait ArchiveBackend {
    /// Pages for comics and image sets, spine items for EPUB, pages for PDF.
    fn entry_count(&self) -> usize;

    /// Embedded metadata. Absent and malformed sidecars both yield `None`.
    fn read_sidecar(&mut self) -> Option<EmbeddedMetadata>;

    /// The declared cover, else the first image in natural order.
    fn extract_cover(&mut self) -> Result<Option<Vec<u8>>>;
}

#[derive(Debug)]
pub enum ArchiveHandle {
    Zip(cbz::ZipHandle),
    Epub(epub::EpubHandle),
    Image(image::ImageHandle),
    #[cfg(feature = "rar")]
    Rar(rar::RarHandle),
    #[cfg(feature = "pdf")]
    Pdf(pdf::PdfHandle),
}

impl ArchiveHandle {
    fn backend(&mut self) -> &mut dyn ArchiveBackend {
        match self {
            ArchiveHandle::Zip(handle) => handle,
            ArchiveHandle::Epub(handle) => handle,
            ArchiveHandle::Image(handle) => handle,
            #[cfg(feature = "rar")]
            ArchiveHandle::Rar(handle) => handle,
            #[cfg(feature = "pdf")]
            ArchiveHandle::Pdf(handle) => handle,
        }
    }

    pub fn entry_count(&mut self) -> usize {
        self.backend().entry_count()
    }

    pub fn read_sidecar(&mut self) -> Option<EmbeddedMetadata> {
        self.backend().read_sidecar()
    }

    pub fn extract_cover(&mut self) -> Result<Option<Vec<u8>>> {
        self.backend().extract_cover()
    }
}

/// What the scan pipeline keeps from an opened container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub pages: u32,
    pub metadata: Option<EmbeddedMetadata>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveReader {
    limits: ArchiveLimits,
}

impl ArchiveReader {
    pub fn new(limits: ArchiveLimits) -> Self {
        Self { limits }
    }

    pub fn open(&self, path: &Path, format: Format) -> Result<ArchiveHandle> {
        match format {
            Format::Archive => self.open_archive(path),
            Format::Epub => Ok(ArchiveHandle::Epub(epub::EpubHandle::open(path, self.limits)?)),
            Format::Image => Ok(ArchiveHandle::Image(image::ImageHandle::open(path, self.limits)?)),
            Format::Pdf => self.open_pdf(path),
        }
    }

    /// Open, count entries and read the sidecar, then release the handle.
    pub fn inspect(&self, path: &Path, format: Format) -> Result<Inspection> {
        let mut handle = self.open(path, format)?;
        let pages = u32::try_from(handle.entry_count()).unwrap_or(u32::MAX);
        let metadata = handle.read_sidecar();
        Ok(Inspection { pages, metadata })
    }

    fn open_archive(&self, path: &Path) -> Result<ArchiveHandle> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "cbr" | "rar" => self.open_rar(path),
            _ => Ok(ArchiveHandle::Zip(cbz::ZipHandle::open(path, self.limits)?)),
        }
    }

    #[cfg(feature = "rar")]
    fn open_rar(&self, path: &Path) -> Result<ArchiveHandle> {
        Ok(ArchiveHandle::Rar(rar::RarHandle::open(path, self.limits)?))
    }

    #[cfg(not(feature = "rar"))]
    fn open_rar(&self, _path: &Path) -> Result<ArchiveHandle> {
        Err(ArchiveError::Unsupported("rar support is not compiled in".to_string()))
    }

    #[cfg(feature = "pdf")]
    fn open_pdf(&self, path: &Path) -> Result<ArchiveHandle> {
        Ok(ArchiveHandle::Pdf(pdf::PdfHandle::open(path)?))
    }

    #[cfg(not(feature = "pdf"))]
    fn open_pdf(&self, _path: &Path) -> Result<ArchiveHandle> {
        Err(ArchiveError::Unsupported("pdf support is not compiled in".to_string()))
    }
}

/// Read at most `limit` bytes, failing if the source holds more.
fn read_capped(reader: impl io::Read, name: &str, limit: u64) -> Result<Vec<u8>> {
    use std::io::Read as _;
    let mut buffer = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut buffer)?;
    if buffer.len() as u64 > limit {
        return Err(ArchiveError::EntryTooLarge {
            name: name.to_string(),
            limit,
        });
    }
    Ok(buffer)
}
