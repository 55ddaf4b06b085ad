//! Groups one library's scanned files into series, volumes and chapters.

use std::collections::BTreeMap;
use std::path::PathBuf;

use folio_model::{
    ChapterKey, FieldValue, Format, LibraryId, MetadataField, MetadataSet, Numbering,
    ScanWarning, ScannedChapter, ScannedFile, ScannedSeries, ScannedVolume,
};
use tracing::{debug, warn};

use crate::parser::naming::{clean_series_title, normalize_series_name};

/// Result of grouping one library.
#[derive(Debug, Default)]
pub struct Assembly {
    /// Ordered by normalized name, then format.
    pub series: Vec<ScannedSeries>,
    pub warnings: Vec<ScanWarning>,
    /// Files that could not be placed in any series.
    pub excluded: Vec<PathBuf>,
}

/// Where a file lands, decided from its sidecar first and its path second.
#[derive(Debug)]
struct Placement {
    name: String,
    normalized: String,
    volume: Numbering,
    chapter: ChapterKey,
}

#[derive(Debug)]
pub struct SeriesAssembler {
    library_id: LibraryId,
    series: BTreeMap<(String, Format), ScannedSeries>,
    warnings: Vec<ScanWarning>,
    excluded: Vec<PathBuf>,
}

impl SeriesAssembler {
    pub fn new(library_id: LibraryId) -> Self {
        Self {
            library_id,
            series: BTreeMap::new(),
            warnings: Vec::new(),
            excluded: Vec::new(),
        }
    }

    /// Convenience wrapper: add every file, then finish.
    pub fn assemble(
        library_id: LibraryId,
        files: impl IntoIterator<Item = ScannedFile>,
    ) -> Assembly {
        let mut assembler = Self::new(library_id);
        for file in files {
            assembler.add(file);
        }
        assembler.finish()
    }

    /// Files should arrive in path order; the first file of a series picks
    /// its display name and the first value seen for a field wins.
    pub fn add(&mut self, file: ScannedFile) {
        let Some(placement) = place(&file) else {
            let name = file
                .file
                .file_name()
                .unwrap_or_default()
                .to_string();
            warn!(target: "scan::reconcile", path = %file.file.path.display(), "no usable series name; file skipped");
            self.warnings.push(ScanWarning::series(
                name,
                format!("no usable series name for {}", file.file.path.display()),
            ));
            self.excluded.push(file.file.path);
            return;
        };

        let format = file.parsed.format;
        let library_id = self.library_id;
        let series = self
            .series
            .entry((placement.normalized.clone(), format))
            .or_insert_with(|| ScannedSeries {
                library_id,
                name: placement.name.clone(),
                normalized_name: placement.normalized.clone(),
                format,
                volumes: BTreeMap::new(),
                metadata: MetadataSet::new(),
            });

        if let Some(metadata) = &file.metadata {
            merge(&mut series.metadata, &metadata.series_fields());
        }
        if let Some(localized) = &file.parsed.localized_series
            && series.metadata.get(MetadataField::LocalizedName).is_none()
        {
            series.metadata.insert(
                MetadataField::LocalizedName,
                FieldValue::Text(localized.clone()),
            );
        }

        let volume = series
            .volumes
            .entry(placement.volume)
            .or_insert_with(|| ScannedVolume {
                number: placement.volume,
                chapters: BTreeMap::new(),
            });
        let chapter = volume
            .chapters
            .entry(placement.chapter.clone())
            .or_insert_with(|| ScannedChapter {
                key: placement.chapter,
                files: Vec::new(),
                metadata: MetadataSet::new(),
            });
        if let Some(metadata) = &file.metadata {
            merge(&mut chapter.metadata, &metadata.chapter_fields());
        }
        chapter.files.push(file);
    }

    pub fn finish(self) -> Assembly {
        let series: Vec<ScannedSeries> = self.series.into_values().collect();
        debug!(
            target: "scan::reconcile",
            library_id = %self.library_id,
            series = series.len(),
            "assembled library"
        );
        Assembly {
            series,
            warnings: self.warnings,
            excluded: self.excluded,
        }
    }
}

fn merge(target: &mut MetadataSet, incoming: &MetadataSet) {
    target.fill_missing(incoming);
    target.union_lists(incoming);
}

fn place(file: &ScannedFile) -> Option<Placement> {
    let metadata = file.metadata.as_ref();

    let (name, normalized) = metadata
        .and_then(|metadata| metadata.series.as_deref())
        .map(clean_series_title)
        .map(|name| {
            let normalized = normalize_series_name(&name);
            (name, normalized)
        })
        .filter(|(_, normalized)| !normalized.is_empty())
        .or_else(|| {
            let parsed = &file.parsed;
            (!parsed.normalized_series.is_empty())
                .then(|| (parsed.series.clone(), parsed.normalized_series.clone()))
        })?;

    let volume = metadata
        .and_then(|metadata| metadata.volume)
        .unwrap_or(file.parsed.volume);
    let special = file.parsed.is_special
        || file.parsed.chapter.is_special()
        || metadata.is_some_and(|metadata| metadata.is_special);

    let chapter = if special {
        let stem = file
            .file
            .path
            .file_stem()
            .map(|stem| clean_series_title(&stem.to_string_lossy()))
            .unwrap_or_default();
        ChapterKey {
            number: Numbering::Special,
            special: Some(stem),
        }
    } else {
        ChapterKey::numbered(
            metadata
                .and_then(|metadata| metadata.number)
                .unwrap_or(file.parsed.chapter),
        )
    };

    Some(Placement {
        name,
        normalized,
        volume,
        chapter,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use folio_model::{DiscoveredFile, EmbeddedMetadata, FileFingerprint, LibraryType};

    use super::*;
    use crate::parser::FilenameParser;

    fn scanned(root: &str, relative: &str, metadata: Option<EmbeddedMetadata>) -> ScannedFile {
        let root = Path::new(root);
        let path = root.join(relative);
        let parsed = FilenameParser::default().parse_in_root(&path, root, LibraryType::Manga);
        ScannedFile {
            file: DiscoveredFile {
                path,
                root: root.to_path_buf(),
                size: 10,
                modified_ms: 0,
                fingerprint: FileFingerprint::default(),
            },
            parsed,
            metadata,
            pages: 1,
        }
    }

    #[test]
    fn volumes_group_under_one_series() {
        let assembly = SeriesAssembler::assemble(
            LibraryId::new(),
            [
                scanned("/lib", "SeriesA - Manga/SeriesA v01.cbz", None),
                scanned("/lib", "SeriesA - Manga/SeriesA v02.cbz", None),
            ],
        );
        assert_eq!(assembly.series.len(), 1);
        let series = &assembly.series[0];
        assert_eq!(series.name, "SeriesA");
        let volumes: Vec<_> = series.volumes.keys().copied().collect();
        assert_eq!(volumes, vec![Numbering::number(1.0), Numbering::number(2.0)]);
        for volume in series.volumes.values() {
            let keys: Vec<_> = volume.chapters.keys().cloned().collect();
            assert_eq!(keys, vec![ChapterKey::numbered(Numbering::LooseLeaf)]);
        }
    }

    #[test]
    fn sidecar_series_name_wins_over_folder() {
        let metadata = EmbeddedMetadata::builder()
            .series("Real Title")
            .volume(Numbering::number(4.0))
            .summary("From the sidecar")
            .build();
        let assembly = SeriesAssembler::assemble(
            LibraryId::new(),
            [scanned("/lib", "Wrong Folder/whatever 01.cbz", Some(metadata))],
        );
        let series = &assembly.series[0];
        assert_eq!(series.name, "Real Title");
        assert_eq!(series.normalized_name, "realtitle");
        assert!(series.volumes.contains_key(&Numbering::number(4.0)));
        assert_eq!(
            series.metadata.get(MetadataField::Summary),
            Some(&FieldValue::Text("From the sidecar".into()))
        );
    }

    #[test]
    fn specials_get_their_own_chapter_keys() {
        let assembly = SeriesAssembler::assemble(
            LibraryId::new(),
            [
                scanned("/lib", "Series/Series SP01.cbz", None),
                scanned("/lib", "Series/Series Omake.cbz", None),
                scanned("/lib", "Series/Series c01.cbz", None),
            ],
        );
        let series = &assembly.series[0];
        assert_eq!(series.chapter_count(), 3);
        let specials = series
            .volumes
            .values()
            .flat_map(|volume| volume.chapters.keys())
            .filter(|key| key.number.is_special())
            .count();
        assert_eq!(specials, 2);
    }

    #[test]
    fn trailing_punctuation_does_not_split_a_series() {
        let assembly = SeriesAssembler::assemble(
            LibraryId::new(),
            [
                scanned("/lib", "Love is War!/Love is War! v01.cbz", None),
                scanned("/lib", "Love is War/Love is War v02.cbz", None),
            ],
        );
        assert_eq!(assembly.series.len(), 1);
        assert_eq!(assembly.series[0].normalized_name, "loveiswar");
        assert_eq!(assembly.series[0].volumes.len(), 2);
    }

    #[test]
    fn formats_are_kept_apart() {
        let assembly = SeriesAssembler::assemble(
            LibraryId::new(),
            [
                scanned("/lib", "Alpha/Alpha v01.cbz", None),
                scanned("/lib", "Alpha/Alpha v01.epub", None),
            ],
        );
        assert_eq!(assembly.series.len(), 2);
    }
}
