use std::fs;
use std::sync::Arc;

use folio_core::{InMemoryCatalog, RecordingEventSink};
use folio_config::LibraryConfig;
use folio_model::{
    FieldValue, Format, LibraryScanStatus, LibraryType, MetadataField, Numbering, ScanEvent,
    WarningScope,
};

#[path = "support/mod.rs"]
mod support;

use support::{comic_info, config, manga_library, orchestrator, write_cbz, write_epub};

#[tokio::test]
async fn first_scan_creates_series_and_second_scan_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    write_cbz(&dir.path().join("SeriesA - Manga/SeriesA v01.cbz"), 3, "a1", None);
    write_cbz(&dir.path().join("SeriesA - Manga/SeriesA v02.cbz"), 4, "a2", None);
    let library = manga_library("Manga", dir.path());
    let library_id = library.id;
    let catalog = Arc::new(InMemoryCatalog::new());
    let events = Arc::new(RecordingEventSink::new());
    let scanner = orchestrator(config(vec![library]), catalog.clone(), events.clone());

    let first = scanner.scan_library(library_id).await.unwrap();
    assert_eq!(first.status, LibraryScanStatus::Completed);
    assert_eq!(first.counts.series_created, 1);
    assert_eq!(first.counts.volumes_created, 2);
    assert_eq!(first.counts.files_created, 2);

    let series = catalog.series(library_id);
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].name, "SeriesA");
    let volumes: Vec<Numbering> = series[0].volumes.iter().map(|v| v.number).collect();
    assert_eq!(volumes, vec![Numbering::number(1.0), Numbering::number(2.0)]);
    assert_eq!(series[0].files().map(|file| file.pages).sum::<u32>(), 7);

    let second = scanner.scan_library(library_id).await.unwrap();
    assert_eq!(second.status, LibraryScanStatus::Completed);
    assert_eq!(second.counts.files_unchanged, 2);
    assert_eq!(second.counts.files_created, 0);
    assert_eq!(second.counts.series_created, 0);
    assert_eq!(second.counts.series_updated, 0);
    assert_eq!(catalog.series(library_id), series);

    let recorded = events.events();
    assert!(matches!(recorded.first(), Some(ScanEvent::ScanStarted { .. })));
    assert!(matches!(recorded.last(), Some(ScanEvent::ScanCompleted { .. })));
    assert!(recorded.iter().any(|event| matches!(
        event,
        ScanEvent::SeriesProcessed { series_name, counts, .. }
            if series_name == "SeriesA" && counts.files == 2
    )));
}

#[tokio::test]
async fn deleted_volume_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    write_cbz(&dir.path().join("SeriesA - Manga/SeriesA v01.cbz"), 2, "a1", None);
    write_cbz(&dir.path().join("SeriesA - Manga/SeriesA v02.cbz"), 2, "a2", None);
    let library = manga_library("Manga", dir.path());
    let library_id = library.id;
    let catalog = Arc::new(InMemoryCatalog::new());
    let scanner = orchestrator(
        config(vec![library]),
        catalog.clone(),
        Arc::new(RecordingEventSink::new()),
    );
    scanner.scan_library(library_id).await.unwrap();
    let series_id = catalog.series(library_id)[0].id;

    fs::remove_file(dir.path().join("SeriesA - Manga/SeriesA v02.cbz")).unwrap();
    let result = scanner.scan_library(library_id).await.unwrap();

    assert_eq!(result.counts.volumes_removed, 1);
    assert_eq!(result.counts.files_removed, 1);
    assert_eq!(result.counts.series_removed, 0);
    let series = catalog.series(library_id);
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].id, series_id);
    assert_eq!(series[0].volumes.len(), 1);
    assert_eq!(series[0].volumes[0].number, Numbering::number(1.0));
}

#[tokio::test]
async fn renamed_folder_keeps_series_identity() {
    let dir = tempfile::tempdir().unwrap();
    write_cbz(&dir.path().join("Old Name/Old Name v01.cbz"), 2, "n1", None);
    write_cbz(&dir.path().join("Old Name/Old Name v02.cbz"), 2, "n2", None);
    let library = manga_library("Manga", dir.path());
    let library_id = library.id;
    let catalog = Arc::new(InMemoryCatalog::new());
    let scanner = orchestrator(
        config(vec![library]),
        catalog.clone(),
        Arc::new(RecordingEventSink::new()),
    );
    scanner.scan_library(library_id).await.unwrap();
    let before = catalog.series(library_id);
    let file_ids: Vec<_> = before[0].files().map(|file| file.id).collect();

    fs::create_dir_all(dir.path().join("New Name")).unwrap();
    for volume in ["01", "02"] {
        fs::rename(
            dir.path().join(format!("Old Name/Old Name v{volume}.cbz")),
            dir.path().join(format!("New Name/New Name v{volume}.cbz")),
        )
        .unwrap();
    }
    fs::remove_dir(dir.path().join("Old Name")).unwrap();

    let result = scanner.scan_library(library_id).await.unwrap();
    assert_eq!(result.counts.series_created, 0);
    assert_eq!(result.counts.series_removed, 0);
    assert_eq!(result.counts.files_updated, 2);

    let after = catalog.series(library_id);
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, before[0].id);
    assert_eq!(after[0].name, "New Name");
    let mut moved: Vec<_> = after[0].files().map(|file| file.id).collect();
    let mut original = file_ids.clone();
    moved.sort();
    original.sort();
    assert_eq!(moved, original);
    assert!(after[0].files().all(|file| file.path.starts_with(dir.path().join("New Name"))));
}

#[tokio::test]
async fn corrupt_archive_is_skipped_without_removing_it() {
    let dir = tempfile::tempdir().unwrap();
    write_cbz(&dir.path().join("SeriesA - Manga/SeriesA v01.cbz"), 2, "a1", None);
    write_cbz(&dir.path().join("SeriesA - Manga/SeriesA v02.cbz"), 2, "a2", None);
    let library = manga_library("Manga", dir.path());
    let library_id = library.id;
    let catalog = Arc::new(InMemoryCatalog::new());
    let events = Arc::new(RecordingEventSink::new());
    let scanner = orchestrator(config(vec![library]), catalog.clone(), events.clone());
    scanner.scan_library(library_id).await.unwrap();

    fs::write(dir.path().join("SeriesA - Manga/SeriesA v02.cbz"), b"truncated").unwrap();
    let result = scanner.scan_library(library_id).await.unwrap();

    assert_eq!(result.status, LibraryScanStatus::Completed);
    assert_eq!(result.counts.files_removed, 0);
    assert_eq!(result.counts.volumes_removed, 0);
    assert_eq!(result.counts.errors, 1);
    let file_warnings: Vec<_> = result
        .warnings
        .iter()
        .filter(|warning| warning.scope == WarningScope::File)
        .collect();
    assert_eq!(file_warnings.len(), 1);
    assert!(
        file_warnings[0]
            .path
            .as_ref()
            .unwrap()
            .ends_with("SeriesA v02.cbz")
    );
    assert_eq!(catalog.series(library_id)[0].files().count(), 2);
    assert!(events.events().iter().any(|event| matches!(event, ScanEvent::FileError { .. })));
}

#[tokio::test]
async fn locked_field_survives_a_changed_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Alpha/Alpha v01.cbz");
    write_cbz(&path, 2, "x1", Some(&comic_info("Alpha", "Curated summary")));
    let library = manga_library("Manga", dir.path());
    let library_id = library.id;
    let catalog = Arc::new(InMemoryCatalog::new());
    let scanner = orchestrator(
        config(vec![library]),
        catalog.clone(),
        Arc::new(RecordingEventSink::new()),
    );
    scanner.scan_library(library_id).await.unwrap();

    let mut series = catalog.series(library_id);
    assert_eq!(
        series[0].metadata.get(MetadataField::Summary),
        Some(&FieldValue::Text("Curated summary".to_string()))
    );
    series[0].locked_fields.insert(MetadataField::Summary);
    catalog.replace_library(library_id, series);

    write_cbz(&path, 2, "x1", Some(&comic_info("Alpha", "Sidecar rewrite")));
    let result = scanner.scan_library(library_id).await.unwrap();
    assert_eq!(result.status, LibraryScanStatus::Completed);
    assert_eq!(result.counts.files_updated, 1);

    let series = catalog.series(library_id);
    assert_eq!(
        series[0].metadata.get(MetadataField::Summary),
        Some(&FieldValue::Text("Curated summary".to_string()))
    );
}

#[tokio::test]
async fn same_folder_name_in_two_libraries_stays_separate() {
    let manga_dir = tempfile::tempdir().unwrap();
    let comic_dir = tempfile::tempdir().unwrap();
    write_cbz(&manga_dir.path().join("Alpha/Alpha v01.cbz"), 2, "m1", None);
    write_cbz(&comic_dir.path().join("Alpha/Alpha v01.cbz"), 2, "c1", None);
    let manga = manga_library("Manga", manga_dir.path());
    let comics = manga_library("Comics", comic_dir.path());
    let (manga_id, comic_id) = (manga.id, comics.id);
    let catalog = Arc::new(InMemoryCatalog::new());
    let scanner = orchestrator(
        config(vec![manga, comics]),
        catalog.clone(),
        Arc::new(RecordingEventSink::new()),
    );

    let summary = scanner.scan_all().await;
    assert_eq!(summary.libraries.len(), 2);
    assert_eq!(summary.totals.series_created, 2);
    assert!(!summary.cancelled);

    let in_manga = catalog.series(manga_id);
    let in_comics = catalog.series(comic_id);
    assert_eq!(in_manga.len(), 1);
    assert_eq!(in_comics.len(), 1);
    assert_ne!(in_manga[0].id, in_comics[0].id);
    assert_eq!(in_manga[0].library_id, manga_id);
    assert_eq!(in_comics[0].library_id, comic_id);
}

#[tokio::test]
async fn missing_root_fails_without_touching_the_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("mount");
    write_cbz(&root.join("SeriesA - Manga/SeriesA v01.cbz"), 2, "a1", None);
    let library = manga_library("Manga", &root);
    let library_id = library.id;
    let catalog = Arc::new(InMemoryCatalog::new());
    let scanner = orchestrator(
        config(vec![library]),
        catalog.clone(),
        Arc::new(RecordingEventSink::new()),
    );
    scanner.scan_library(library_id).await.unwrap();
    let before = catalog.series(library_id);

    fs::remove_dir_all(&root).unwrap();
    let result = scanner.scan_library(library_id).await.unwrap();

    assert_eq!(result.status, LibraryScanStatus::Failed);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].scope, WarningScope::Library);
    assert_eq!(catalog.series(library_id), before);
}

#[tokio::test]
async fn dry_run_leaves_the_catalog_alone() {
    let dir = tempfile::tempdir().unwrap();
    write_cbz(&dir.path().join("SeriesA - Manga/SeriesA v01.cbz"), 2, "a1", None);
    let library = manga_library("Manga", dir.path());
    let library_id = library.id;
    let catalog = Arc::new(InMemoryCatalog::new());
    let scanner = orchestrator(
        config(vec![library]),
        catalog.clone(),
        Arc::new(RecordingEventSink::new()),
    )
    .with_dry_run(true);

    let result = scanner.scan_library(library_id).await.unwrap();
    assert_eq!(result.status, LibraryScanStatus::Completed);
    assert_eq!(result.counts.series_created, 1);
    assert!(catalog.series(library_id).is_empty());
}

#[tokio::test]
async fn unknown_library_is_an_error() {
    let scanner = orchestrator(
        config(Vec::new()),
        Arc::new(InMemoryCatalog::new()),
        Arc::new(RecordingEventSink::new()),
    );
    let err = scanner
        .scan_library(folio_model::LibraryId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, folio_core::ScanError::UnknownLibrary(_)));
}

#[tokio::test]
async fn epub_package_metadata_groups_books_into_a_series() {
    let dir = tempfile::tempdir().unwrap();
    write_epub(&dir.path().join("Unsorted/first.epub"), "Departure", "Road Saga", 1);
    write_epub(&dir.path().join("Unsorted/second.epub"), "Arrival", "Road Saga", 2);
    let library = LibraryConfig::new("Books", LibraryType::Book, vec![dir.path().to_path_buf()]);
    let library_id = library.id;
    let catalog = Arc::new(InMemoryCatalog::new());
    let scanner = orchestrator(
        config(vec![library]),
        catalog.clone(),
        Arc::new(RecordingEventSink::new()),
    );

    let result = scanner.scan_library(library_id).await.unwrap();
    assert_eq!(result.status, LibraryScanStatus::Completed);

    let series = catalog.series(library_id);
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].name, "Road Saga");
    assert_eq!(series[0].format, Format::Epub);
    let volumes: Vec<Numbering> = series[0].volumes.iter().map(|v| v.number).collect();
    assert_eq!(volumes, vec![Numbering::number(1.0), Numbering::number(2.0)]);
    assert!(series[0].files().all(|file| file.pages == 1));
}
