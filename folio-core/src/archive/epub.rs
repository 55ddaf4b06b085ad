//! EPUB: a zip whose package document (OPF) is the sidecar.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use folio_model::{EmbeddedMetadata, Numbering, Person, PersonRole};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::warn;

use super::cbz::{ZipReader, image_entries, open_zip, read_entry};
use super::{ArchiveBackend, ArchiveError, ArchiveLimits, Result};

const CONTAINER_PATH: &str = "META-INF/container.xml";

pub struct EpubHandle {
    path: PathBuf,
    archive: ZipReader,
    package: Option<Package>,
    images: Vec<String>,
    content_documents: usize,
    limits: ArchiveLimits,
}

impl std::fmt::Debug for EpubHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpubHandle")
            .field("path", &self.path)
            .field("package", &self.package.is_some())
            .field("images", &self.images.len())
            .finish()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Package {
    metadata: EmbeddedMetadata,
    spine_len: usize,
    /// Archive path of the declared cover image.
    cover: Option<String>,
}

impl EpubHandle {
    pub fn open(path: &Path, limits: ArchiveLimits) -> Result<Self> {
        let mut archive = open_zip(path, limits)?;
        let container = read_entry(&mut archive, CONTAINER_PATH, limits.max_sidecar_bytes)
            .map_err(|err| ArchiveError::Corrupt(format!("{CONTAINER_PATH}: {err}")))?;
        let rootfile = parse_container(&String::from_utf8_lossy(&container))
            .ok()
            .flatten()
            .ok_or_else(|| ArchiveError::Corrupt("container.xml names no package".into()))?;
        let opf = read_entry(&mut archive, &rootfile, limits.max_sidecar_bytes)
            .map_err(|err| ArchiveError::Corrupt(format!("{rootfile}: {err}")))?;

        let base = rootfile
            .rsplit_once('/')
            .map(|(dir, _)| format!("{dir}/"))
            .unwrap_or_default();
        let package = match parse_package(&String::from_utf8_lossy(&opf), &base) {
            Ok(package) => Some(package),
            Err(err) => {
                warn!(target: "scan::archive", path = %path.display(), error = %err, "malformed package document; ignoring");
                None
            }
        };

        let content_documents = archive
            .file_names()
            .filter(|name| {
                let lowered = name.to_ascii_lowercase();
                lowered.ends_with(".xhtml") || lowered.ends_with(".html") || lowered.ends_with(".htm")
            })
            .count();
        let images = image_entries(&archive);

        let handle = Self {
            path: path.to_path_buf(),
            archive,
            package,
            images,
            content_documents,
            limits,
        };
        if handle.entry_count() == 0 {
            return Err(ArchiveError::NoPages);
        }
        Ok(handle)
    }
}

impl ArchiveBackend for EpubHandle {
    fn entry_count(&self) -> usize {
        self.package
            .as_ref()
            .map(|package| package.spine_len)
            .filter(|len| *len > 0)
            .unwrap_or(self.content_documents)
    }

    fn read_sidecar(&mut self) -> Option<EmbeddedMetadata> {
        let package = self.package.as_ref()?;
        let mut metadata = package.metadata.clone();
        metadata.page_count = Some(u32::try_from(package.spine_len).unwrap_or(u32::MAX));
        Some(metadata)
    }

    fn extract_cover(&mut self) -> Result<Option<Vec<u8>>> {
        let declared = self
            .package
            .as_ref()
            .and_then(|package| package.cover.clone())
            .filter(|cover| self.archive.index_for_name(cover).is_some());
        let Some(entry) = declared.or_else(|| self.images.first().cloned()) else {
            return Ok(None);
        };
        read_entry(&mut self.archive, &entry, self.limits.max_cover_bytes).map(Some)
    }
}

fn attribute(element: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == local)
        .and_then(|attr| attr.unescape_value().ok().map(|value| value.into_owned()))
}

fn parse_container(xml: &str) -> std::result::Result<Option<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == b"rootfile" =>
            {
                if let Some(path) = attribute(&element, b"full-path") {
                    return Ok(Some(path));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Elements whose text is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Title,
    Creator(PersonRole),
    Description,
    Date,
    Subject,
    Language,
    Publisher,
    Collection,
    GroupPosition,
}

fn creator_role(code: Option<&str>) -> PersonRole {
    match code.map(str::to_ascii_lowercase).as_deref() {
        Some("ill") | Some("art") => PersonRole::Penciller,
        Some("trl") => PersonRole::Translator,
        Some("edt") => PersonRole::Editor,
        Some("cov") => PersonRole::CoverArtist,
        _ => PersonRole::Writer,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    raw.get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .or_else(|| {
            raw.get(..4)
                .and_then(|year| year.parse().ok())
                .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
        })
}

fn parse_package(xml: &str, base: &str) -> std::result::Result<Package, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut package = Package::default();
    let mut metadata = EmbeddedMetadata::default();
    let mut capture: Option<Capture> = None;
    let mut text = String::new();
    let mut cover_id: Option<String> = None;
    let mut manifest: Vec<(String, String, bool)> = Vec::new();

    loop {
        let event = reader.read_event()?;
        let (element, is_empty) = match &event {
            Event::Start(element) => (Some(element), false),
            Event::Empty(element) => (Some(element), true),
            _ => (None, false),
        };
        if let Some(element) = element {
            match element.local_name().as_ref() {
                b"title" if metadata.title.is_none() => capture = Some(Capture::Title),
                b"creator" => {
                    let role = attribute(element, b"role");
                    capture = Some(Capture::Creator(creator_role(role.as_deref())));
                }
                b"description" => capture = Some(Capture::Description),
                b"date" => capture = Some(Capture::Date),
                b"subject" => capture = Some(Capture::Subject),
                b"language" => capture = Some(Capture::Language),
                b"publisher" => capture = Some(Capture::Publisher),
                b"meta" => {
                    let name = attribute(element, b"name");
                    let content = attribute(element, b"content");
                    match (name.as_deref(), content) {
                        (Some("calibre:series"), Some(series)) => metadata.series = Some(series),
                        (Some("calibre:series_index"), Some(index)) => {
                            metadata.volume = index.parse::<Numbering>().ok();
                        }
                        (Some("cover"), Some(id)) => cover_id = Some(id),
                        _ => {}
                    }
                    match attribute(element, b"property").as_deref() {
                        Some("belongs-to-collection") => capture = Some(Capture::Collection),
                        Some("group-position") => capture = Some(Capture::GroupPosition),
                        _ => {}
                    }
                }
                b"item" => {
                    if let (Some(id), Some(href)) =
                        (attribute(element, b"id"), attribute(element, b"href"))
                    {
                        let is_cover = attribute(element, b"properties")
                            .is_some_and(|props| props.split_whitespace().any(|p| p == "cover-image"));
                        manifest.push((id, format!("{base}{href}"), is_cover));
                    }
                }
                b"itemref" => package.spine_len += 1,
                _ => {}
            }
            text.clear();
            if is_empty {
                capture = None;
            }
            continue;
        }

        match event {
            Event::Text(value) => text.push_str(&value.unescape()?),
            Event::CData(value) => text.push_str(&String::from_utf8_lossy(&value)),
            Event::End(_) => {
                if let Some(kind) = capture.take() {
                    apply_capture(&mut metadata, kind, text.trim());
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    package.cover = manifest
        .iter()
        .find(|(_, _, is_cover)| *is_cover)
        .or_else(|| {
            let id = cover_id.as_deref()?;
            manifest.iter().find(|(item_id, _, _)| item_id == id)
        })
        .map(|(_, href, _)| href.clone());
    package.metadata = metadata;
    Ok(package)
}

fn apply_capture(metadata: &mut EmbeddedMetadata, kind: Capture, value: &str) {
    if value.is_empty() {
        return;
    }
    let value = value.to_string();
    match kind {
        Capture::Title => metadata.title = Some(value),
        Capture::Creator(role) => metadata.people.push(Person::new(value, role)),
        Capture::Description => metadata.summary = Some(value),
        Capture::Date => metadata.release_date = metadata.release_date.or(parse_date(&value)),
        Capture::Subject => metadata.genres.push(value),
        Capture::Language => metadata.language = metadata.language.take().or(Some(value)),
        Capture::Publisher => metadata.publisher = Some(value),
        Capture::Collection => {
            metadata.series.get_or_insert(value);
        }
        Capture::GroupPosition => {
            if metadata.volume.is_none() {
                metadata.volume = value.parse::<Numbering>().ok();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

    const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>The Long Road</dc:title>
    <dc:creator opf:role="aut">A. Writer</dc:creator>
    <dc:creator opf:role="ill">B. Artist</dc:creator>
    <dc:description><![CDATA[<p>Journeys &amp; more.</p>]]></dc:description>
    <dc:date>2011-03-04T00:00:00Z</dc:date>
    <dc:subject>Fantasy</dc:subject>
    <dc:language>en</dc:language>
    <dc:publisher>House</dc:publisher>
    <meta name="calibre:series" content="Road Saga"/>
    <meta name="calibre:series_index" content="2"/>
    <meta name="cover" content="cover-img"/>
  </metadata>
  <manifest>
    <item id="cover-img" href="images/cover.png" media-type="image/png"/>
    <item id="c1" href="c1.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="c2.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine><itemref idref="c1"/><itemref idref="c2"/></spine>
</package>"#;

    fn write_epub(path: &Path, opf: &str) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        let entries: [(&str, &[u8]); 6] = [
            ("mimetype", b"application/epub+zip"),
            (CONTAINER_PATH, CONTAINER.as_bytes()),
            ("OEBPS/content.opf", opf.as_bytes()),
            ("OEBPS/c1.xhtml", b"<html/>"),
            ("OEBPS/c2.xhtml", b"<html/>"),
            ("OEBPS/images/cover.png", b"cover-bytes"),
        ];
        for (name, bytes) in entries {
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn package_document_is_the_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_epub(&path, OPF);

        let mut handle = EpubHandle::open(&path, ArchiveLimits::default()).unwrap();
        assert_eq!(handle.entry_count(), 2);
        let meta = handle.read_sidecar().unwrap();
        assert_eq!(meta.title.as_deref(), Some("The Long Road"));
        assert_eq!(meta.series.as_deref(), Some("Road Saga"));
        assert_eq!(meta.volume, Some(Numbering::number(2.0)));
        assert_eq!(meta.release_date, NaiveDate::from_ymd_opt(2011, 3, 4));
        assert_eq!(meta.people[1], Person::new("B. Artist", PersonRole::Penciller));
        assert_eq!(meta.summary.as_deref(), Some("<p>Journeys &amp; more.</p>"));
        assert_eq!(meta.page_count, Some(2));
        assert_eq!(handle.extract_cover().unwrap().unwrap(), b"cover-bytes");
    }

    #[test]
    fn broken_package_falls_back_to_content_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_epub(&path, "<package><metadata><dc:title>x</metadata>");

        let mut handle = EpubHandle::open(&path, ArchiveLimits::default()).unwrap();
        assert!(handle.read_sidecar().is_none());
        assert_eq!(handle.entry_count(), 2);
        assert_eq!(handle.extract_cover().unwrap().unwrap(), b"cover-bytes");
    }
}
