//! PDF books. Pages come from the page tree; the document information
//! dictionary stands in for a sidecar.

use std::path::{Path, PathBuf};

use folio_model::{EmbeddedMetadata, Person, PersonRole};
use lopdf::{Document, Object};

use super::{ArchiveBackend, ArchiveError, Result};

pub struct PdfHandle {
    path: PathBuf,
    document: Document,
}

impl std::fmt::Debug for PdfHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfHandle").field("path", &self.path).finish()
    }
}

impl PdfHandle {
    pub fn open(path: &Path) -> Result<Self> {
        let document =
            Document::load(path).map_err(|err| ArchiveError::Corrupt(err.to_string()))?;
        if document.get_pages().is_empty() {
            return Err(ArchiveError::NoPages);
        }
        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    fn info_string(&self, key: &[u8]) -> Option<String> {
        let info = self.document.trailer.get(b"Info").ok()?;
        let dictionary = match info {
            Object::Reference(id) => self.document.get_dictionary(*id).ok()?,
            Object::Dictionary(dictionary) => dictionary,
            _ => return None,
        };
        let bytes = dictionary.get(key).ok()?.as_str().ok()?;
        let text = decode_text_string(bytes);
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// PDF text strings are UTF-16BE with a byte-order mark or PDFDocEncoding,
/// which agrees with Latin-1 for printable text.
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|byte| *byte as char).collect(),
    }
}

impl ArchiveBackend for PdfHandle {
    fn entry_count(&self) -> usize {
        self.document.get_pages().len()
    }

    fn read_sidecar(&mut self) -> Option<EmbeddedMetadata> {
        let title = self.info_string(b"Title");
        let author = self.info_string(b"Author");
        let subject = self.info_string(b"Subject");
        let keywords = self.info_string(b"Keywords");
        if title.is_none() && author.is_none() && subject.is_none() && keywords.is_none() {
            return None;
        }
        Some(EmbeddedMetadata {
            title,
            summary: subject,
            people: author
                .into_iter()
                .map(|name| Person::new(name, PersonRole::Writer))
                .collect(),
            tags: keywords
                .map(|words| {
                    words
                        .split([',', ';'])
                        .map(str::trim)
                        .filter(|word| !word.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            page_count: u32::try_from(self.entry_count()).ok(),
            ..EmbeddedMetadata::default()
        })
    }

    /// Rendering a page is outside the scanner; PDFs report no cover bytes.
    fn extract_cover(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf16_and_latin1() {
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9]), "Aé");
        assert_eq!(decode_text_string(b"Plain"), "Plain");
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.pdf");
        std::fs::write(&path, b"%PDF-nope").unwrap();
        assert!(matches!(PdfHandle::open(&path), Err(ArchiveError::Corrupt(_))));
    }
}
