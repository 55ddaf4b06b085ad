//! Shared fixtures for scanner integration tests.
#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use folio_config::{LibraryConfig, ScannerConfig};
use folio_core::{CatalogStore, RecordingEventSink, ScanOrchestrator};
use folio_model::LibraryType;
use zip::write::SimpleFileOptions;

/// Write a CBZ with `pages` images. `marker` is stored as an extra entry so
/// archives with the same page count still fingerprint differently.
pub fn write_cbz(path: &Path, pages: usize, marker: &str, comic_info: Option<&str>) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut zip = zip::ZipWriter::new(fs::File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    for page in 0..pages {
        zip.start_file(format!("{page:03}.jpg"), options).unwrap();
        zip.write_all(format!("page {page} of {marker}").as_bytes())
            .unwrap();
    }
    if let Some(xml) = comic_info {
        zip.start_file("ComicInfo.xml", options).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Write a minimal EPUB whose package document carries calibre series
/// metadata.
pub fn write_epub(path: &Path, title: &str, series: &str, index: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let container = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;
    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>{title}</dc:title>
    <meta name="calibre:series" content="{series}"/>
    <meta name="calibre:series_index" content="{index}"/>
  </metadata>
  <manifest><item id="c1" href="c1.xhtml" media-type="application/xhtml+xml"/></manifest>
  <spine><itemref idref="c1"/></spine>
</package>"#
    );
    let mut zip = zip::ZipWriter::new(fs::File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    for (name, bytes) in [
        ("mimetype", "application/epub+zip".as_bytes()),
        ("META-INF/container.xml", container.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/c1.xhtml", b"<html/>".as_slice()),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

pub fn comic_info(series: &str, summary: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?>\n<ComicInfo><Series>{series}</Series><Summary>{summary}</Summary></ComicInfo>"
    )
}

pub fn manga_library(name: &str, root: impl Into<PathBuf>) -> LibraryConfig {
    LibraryConfig::new(name, LibraryType::Manga, vec![root.into()])
}

pub fn config(libraries: Vec<LibraryConfig>) -> ScannerConfig {
    ScannerConfig {
        libraries,
        max_parallel_files: 2,
        max_open_archives: 2,
        ..ScannerConfig::default()
    }
}

pub fn orchestrator(
    config: ScannerConfig,
    catalog: Arc<dyn CatalogStore>,
    events: Arc<RecordingEventSink>,
) -> ScanOrchestrator {
    ScanOrchestrator::new(Arc::new(config), catalog, events)
}
