//! Filename grammar: turns a path into [`ParsedInfo`].
//!
//! Parsing is total: every input yields a best-effort result. The cascade
//! runs in a fixed order per dimension:
//!
//! 1. annotations are lifted off the stem (leading group tag, year, edition,
//!    CJK alternate title) and every remaining bracket group is dropped;
//! 2. combined volume+chapter patterns;
//! 3. volume patterns (range before single) and chapter patterns (range
//!    before single), independently;
//! 4. bare trailing numbers, for manga and comic libraries only, when 2 and
//!    3 found nothing;
//! 5. special keywords in the stem or a `Specials` parent folder.
//!
//! The series name is the text before the earliest numbering or special
//! match. When that is empty, or nothing matched at all, the name comes from
//! the nearest ancestor folder that is not itself a numbering folder.

mod budget;
pub mod naming;
mod patterns;

use std::path::{Path, PathBuf};
use std::time::Duration;

use folio_model::{Format, LibraryType, Numbering, ParsedInfo};
use regex::Captures;
use tracing::trace;

use crate::classifier::PathClassifier;
use budget::{MatchBudget, bounded_input};
use naming::{clean_series_title, collapse_whitespace, normalize_series_name};
use patterns::{
    BARE_PATTERNS, BRACKET_PATTERN, CHAPTER_PATTERNS, COMBINED_PATTERNS,
    EDITION_PATTERN, GROUP_PATTERN, LOCALIZED_PATTERN, MARKER_FOLDER_PATTERNS,
    PatternTable, RESOLUTION_PATTERN, SPECIAL_PATTERN, VOLUME_PATTERNS,
    YEAR_PATTERN,
};

pub use budget::MAX_INPUT_CHARS;

/// Volumes above this are treated as false positives.
pub const VOLUME_CEILING: f64 = 1_000.0;
/// Chapters above this are treated as false positives.
pub const CHAPTER_CEILING: f64 = 10_000.0;

pub const DEFAULT_PARSE_BUDGET: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy)]
pub struct FilenameParser {
    budget: Duration,
}

impl Default for FilenameParser {
    fn default() -> Self {
        Self::new(DEFAULT_PARSE_BUDGET)
    }
}

/// Numbering found in one piece of text.
#[derive(Debug, Default)]
struct Detection {
    volume: Numbering,
    chapter: Numbering,
    special: bool,
    /// Byte offset where the first numbering or special marker begins.
    cut: Option<usize>,
    /// Series text captured by a bare-number pattern.
    series: Option<String>,
}

impl Detection {
    fn found_numbers(&self) -> bool {
        !self.volume.is_loose_leaf() || !self.chapter.is_loose_leaf()
    }

    fn found_anything(&self) -> bool {
        self.found_numbers() || self.special
    }

    fn cut_at(&mut self, offset: usize) {
        self.cut = Some(self.cut.map_or(offset, |cut| cut.min(offset)));
    }
}

/// Annotation-free text plus what was lifted off it.
#[derive(Debug, Default)]
struct Stripped {
    text: String,
    group: Option<String>,
    year: Option<u16>,
    edition: Option<String>,
    localized: Option<String>,
}

impl FilenameParser {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    /// Parse with no library root; folder fallbacks look at most two levels
    /// up.
    pub fn parse(&self, path: &Path, library_type: LibraryType) -> ParsedInfo {
        self.parse_with_root(path, None, library_type)
    }

    /// Parse a file found under `root`. Folder fallbacks never climb to or
    /// above the root.
    pub fn parse_in_root(
        &self,
        path: &Path,
        root: &Path,
        library_type: LibraryType,
    ) -> ParsedInfo {
        self.parse_with_root(path, Some(root), library_type)
    }

    fn parse_with_root(
        &self,
        path: &Path,
        root: Option<&Path>,
        library_type: LibraryType,
    ) -> ParsedInfo {
        let mut budget = MatchBudget::new(self.budget);
        let format = PathClassifier::format_for_path(path)
            .unwrap_or_else(|| library_type.preferred_format());
        let folders = ancestor_folders(path, root);
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let info = if format == Format::Image {
            self.parse_image(&stem, &folders, &mut budget)
        } else {
            self.parse_file(&stem, &folders, library_type, &mut budget)
        };

        let mut info = ParsedInfo { format, ..info };
        if info.series.is_empty() {
            info.series = clean_series_title(&stem);
        }
        if info.series.is_empty() {
            info.series = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Unknown".to_string());
        }
        info.normalized_series = normalize_series_name(&info.series);
        if info.normalized_series.is_empty() {
            info.normalized_series = info.series.to_lowercase();
        }
        trace!(
            target: "scan::parse",
            path = %path.display(),
            series = %info.series,
            volume = %info.volume,
            chapter = %info.chapter,
            budget_exhausted = budget.is_exhausted(),
            "parsed filename"
        );
        info
    }

    fn parse_file(
        &self,
        stem: &str,
        folders: &[String],
        library_type: LibraryType,
        budget: &mut MatchBudget,
    ) -> ParsedInfo {
        let stripped = strip_annotations(stem, budget);
        let mut detection =
            detect_numbering(&stripped.text, library_type.allows_bare_chapter_numbers(), budget);

        let mut info = ParsedInfo {
            localized_series: stripped.localized,
            edition: stripped.edition,
            year: stripped.year,
            group: stripped.group,
            ..ParsedInfo::default()
        };

        // A `Vol 01` or `Specials` folder numbers the files inside it.
        if let Some(parent) = folders.first() {
            let marker = detect_marker_folder(parent, budget);
            if detection.volume.is_loose_leaf() && !marker.volume.is_loose_leaf() {
                detection.volume = marker.volume;
            }
            if marker.special {
                detection.special = true;
            }
        }

        info.volume = detection.volume;
        info.chapter = detection.chapter;
        if detection.special {
            info.is_special = true;
            info.chapter = Numbering::Special;
        }

        let from_text = detection
            .series
            .clone()
            .or_else(|| {
                detection
                    .cut
                    .map(|cut| stripped.text[..cut].to_string())
            })
            .map(|raw| clean_series_title(&raw))
            .unwrap_or_default();

        if !from_text.is_empty() {
            info.series = from_text;
            return info;
        }

        let use_folder = detection.found_anything()
            || (library_type != LibraryType::Book && !folders.is_empty());
        match use_folder.then(|| series_from_folders(folders, budget)).flatten() {
            Some(series) => {
                info.series = series;
                info.series_from_folder = true;
            }
            None => info.series = clean_series_title(&stripped.text),
        }
        info
    }

    /// Loose images are numbered by their folder and named by the folder
    /// above it, so every image in one folder lands in one chapter.
    fn parse_image(
        &self,
        stem: &str,
        folders: &[String],
        budget: &mut MatchBudget,
    ) -> ParsedInfo {
        let mut info = ParsedInfo {
            series_from_folder: true,
            ..ParsedInfo::default()
        };
        let Some(parent) = folders.first() else {
            info.series = clean_series_title(stem);
            info.series_from_folder = false;
            return info;
        };

        let stripped = strip_annotations(parent, budget);
        let detection = detect_numbering(&stripped.text, true, budget);
        info.year = stripped.year;
        info.group = stripped.group;
        info.edition = stripped.edition;
        info.localized_series = stripped.localized;

        if !detection.found_anything() {
            info.series = clean_series_title(&stripped.text);
            return info;
        }

        info.volume = detection.volume;
        info.chapter = detection.chapter;
        if detection.special {
            info.is_special = true;
            info.chapter = Numbering::Special;
        }
        let prefix = detection
            .series
            .clone()
            .or_else(|| detection.cut.map(|cut| stripped.text[..cut].to_string()))
            .map(|raw| clean_series_title(&raw))
            .unwrap_or_default();
        info.series = if prefix.is_empty() {
            series_from_folders(&folders[1..], budget)
                .unwrap_or_else(|| clean_series_title(&stripped.text))
        } else {
            prefix
        };
        info
    }
}

/// Folder names between the file and the root, nearest first.
fn ancestor_folders(path: &Path, root: Option<&Path>) -> Vec<String> {
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut names = Vec::new();
    match root {
        Some(root) => {
            let mut current: PathBuf = parent;
            while current.starts_with(root) && current != root {
                if let Some(name) = current.file_name() {
                    names.push(name.to_string_lossy().into_owned());
                }
                if !current.pop() {
                    break;
                }
            }
        }
        None => {
            names.extend(
                parent
                    .ancestors()
                    .take(2)
                    .filter_map(|dir| dir.file_name())
                    .map(|name| name.to_string_lossy().into_owned()),
            );
        }
    }
    names
}

fn strip_annotations(raw: &str, budget: &mut MatchBudget) -> Stripped {
    let input = bounded_input(raw).replace('_', " ");
    let mut stripped = Stripped::default();

    if let Some(caps) = budget.captures("year", &YEAR_PATTERN, &input) {
        stripped.year = caps["year"].parse().ok();
    }
    if let Some(caps) = budget.captures("group", &GROUP_PATTERN, &input) {
        let group = caps["group"].trim();
        if !group.is_empty() && !group.chars().all(|ch| ch.is_ascii_digit()) {
            stripped.group = Some(group.to_string());
        }
    }
    if let Some(caps) = budget.captures("localized", &LOCALIZED_PATTERN, &input) {
        stripped.localized = Some(collapse_whitespace(&caps["localized"]));
    }
    if let Some(caps) = budget.captures("edition", &EDITION_PATTERN, &input) {
        stripped.edition = Some(collapse_whitespace(&caps["edition"]));
    }

    let text = budget.strip("edition", &EDITION_PATTERN, &input);
    let text = budget.strip("brackets", &BRACKET_PATTERN, &text);
    let text = budget.strip("resolution", &RESOLUTION_PATTERN, &text);
    stripped.text = collapse_whitespace(&text);
    stripped
}

fn detect_numbering(text: &str, allow_bare: bool, budget: &mut MatchBudget) -> Detection {
    let mut detection = Detection::default();

    for (name, pattern) in COMBINED_PATTERNS.iter() {
        let Some(caps) = budget.captures(*name, pattern, text) else {
            continue;
        };
        let volume = capture_number(&caps, "volume", VOLUME_CEILING);
        let chapter = match caps.name("chapter_end") {
            Some(_) => capture_range(&caps, "chapter", "chapter_end", CHAPTER_CEILING),
            None => capture_number(&caps, "chapter", CHAPTER_CEILING),
        };
        if let (Some(volume), Some(chapter)) = (volume, chapter) {
            detection.volume = volume;
            detection.chapter = chapter;
            detection.cut_at(match_start(&caps));
            trace!(target: "scan::parse", pattern = *name, "combined numbering");
            break;
        }
    }

    if !detection.found_numbers() {
        if let Some((volume, start)) =
            first_plausible(&VOLUME_PATTERNS, "volume", VOLUME_CEILING, text, budget)
        {
            detection.volume = volume;
            detection.cut_at(start);
        }
        if let Some((chapter, start)) =
            first_plausible(&CHAPTER_PATTERNS, "chapter", CHAPTER_CEILING, text, budget)
        {
            detection.chapter = chapter;
            detection.cut_at(start);
        }
    }

    if let Some(caps) = budget.captures("special", &SPECIAL_PATTERN, text) {
        detection.special = true;
        detection.cut_at(match_start(&caps));
    }

    if allow_bare && !detection.found_anything() {
        for (name, pattern) in BARE_PATTERNS.iter() {
            let Some(caps) = budget.captures(*name, pattern, text) else {
                continue;
            };
            let chapter = if caps.name("start").is_some() {
                capture_range(&caps, "start", "end", CHAPTER_CEILING)
            } else {
                capture_number(&caps, "chapter", CHAPTER_CEILING)
            };
            if let Some(chapter) = chapter {
                detection.chapter = chapter;
                detection.series = caps.name("series").map(|m| m.as_str().to_string());
                break;
            }
        }
    }

    detection
}

/// First pattern in `table` whose capture is plausible. Range patterns
/// capture `start`/`end`, single patterns capture `single`.
fn first_plausible(
    table: &PatternTable,
    single: &str,
    ceiling: f64,
    text: &str,
    budget: &mut MatchBudget,
) -> Option<(Numbering, usize)> {
    for (name, pattern) in table.iter() {
        let Some(caps) = budget.captures(*name, pattern, text) else {
            continue;
        };
        let number = if caps.name("start").is_some() {
            capture_range(&caps, "start", "end", ceiling)
        } else {
            capture_number(&caps, single, ceiling)
        };
        if let Some(number) = number {
            trace!(target: "scan::parse", pattern = *name, %number, "numbering matched");
            return Some((number, match_start(&caps)));
        }
    }
    None
}

fn detect_marker_folder(name: &str, budget: &mut MatchBudget) -> Detection {
    let mut detection = Detection::default();
    let name = bounded_input(name).replace('_', " ");
    for (family, pattern) in MARKER_FOLDER_PATTERNS.iter() {
        let Some(caps) = budget.captures(*family, pattern, &name) else {
            continue;
        };
        if let Some(volume) = capture_number(&caps, "volume", VOLUME_CEILING) {
            detection.volume = volume;
        } else if let Some(chapter) = capture_number(&caps, "chapter", CHAPTER_CEILING) {
            detection.chapter = chapter;
        } else {
            detection.special = true;
        }
        detection.cut_at(0);
        break;
    }
    detection
}

/// Series name from the nearest usable ancestor folder.
fn series_from_folders(folders: &[String], budget: &mut MatchBudget) -> Option<String> {
    folders.iter().find_map(|folder| {
        if detect_marker_folder(folder, budget).cut.is_some() {
            return None;
        }
        let stripped = strip_annotations(folder, budget);
        let detection = detect_numbering(&stripped.text, false, budget);
        let text = match detection.cut {
            Some(cut) => &stripped.text[..cut],
            None => stripped.text.as_str(),
        };
        Some(clean_series_title(text)).filter(|name| !name.is_empty())
    })
}

fn match_start(caps: &Captures<'_>) -> usize {
    caps.get(0).map_or(0, |whole| whole.start())
}

/// Normalize a captured number: leading zeros dropped, decimals kept.
fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

fn capture_number(caps: &Captures<'_>, group: &str, ceiling: f64) -> Option<Numbering> {
    let value = parse_number(caps.name(group)?.as_str())?;
    (value < ceiling).then(|| Numbering::number(value))
}

fn capture_range(
    caps: &Captures<'_>,
    start: &str,
    end: &str,
    ceiling: f64,
) -> Option<Numbering> {
    let start = parse_number(caps.name(start)?.as_str())?;
    let end = parse_number(caps.name(end)?.as_str())?;
    if end >= ceiling {
        return None;
    }
    Numbering::range(start, end).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str, library_type: LibraryType) -> ParsedInfo {
        FilenameParser::default().parse_in_root(Path::new(path), Path::new("/lib"), library_type)
    }

    #[test]
    fn decimal_chapter_without_volume() {
        let info = parse("/lib/Series/Series_c012.5.cbz", LibraryType::Manga);
        assert_eq!(info.series, "Series");
        assert_eq!(info.chapter, Numbering::number(12.5));
        assert_eq!(info.chapter.to_string(), "12.5");
        assert!(info.volume.is_loose_leaf());
        assert!(!info.is_special);
        assert_eq!(info.format, Format::Archive);
    }

    #[test]
    fn volume_only_files_keep_loose_leaf_chapter() {
        let info = parse("/lib/SeriesA - Manga/SeriesA v01.cbz", LibraryType::Manga);
        assert_eq!(info.series, "SeriesA");
        assert_eq!(info.normalized_series, "seriesa");
        assert_eq!(info.volume, Numbering::number(1.0));
        assert!(info.chapter.is_loose_leaf());
        assert!(!info.series_from_folder);
    }

    #[test]
    fn combined_patterns_outrank_single_ones() {
        let info = parse(
            "/lib/x/[Group] Kaguya-sama v03 c025-027 (2019) [Digital].cbz",
            LibraryType::Manga,
        );
        assert_eq!(info.series, "Kaguya-sama");
        assert_eq!(info.volume, Numbering::number(3.0));
        assert_eq!(info.chapter, Numbering::range(25.0, 27.0).unwrap());
        assert_eq!(info.group.as_deref(), Some("Group"));
        assert_eq!(info.year, Some(2019));
    }

    #[test]
    fn implausible_ranges_fall_back_to_single_numbers() {
        let info = parse("/lib/x/Series Vol 5-2.cbz", LibraryType::Manga);
        assert_eq!(info.volume, Numbering::number(5.0));

        let info = parse("/lib/x/Series Vol 1-3.cbz", LibraryType::Manga);
        assert_eq!(info.volume, Numbering::range(1.0, 3.0).unwrap());
    }

    #[test]
    fn resolution_tokens_are_not_numbers() {
        let info = parse("/lib/Art/Wallpaper 1920x1080.cbz", LibraryType::Comic);
        assert!(info.volume.is_loose_leaf());
        assert!(info.chapter.is_loose_leaf());
        assert_eq!(info.series, "Art");
        assert!(info.series_from_folder);
    }

    #[test]
    fn bare_numbers_only_in_manga_and_comic_libraries() {
        let comic = parse("/lib/Batman/Batman - 001.cbz", LibraryType::Comic);
        assert_eq!(comic.series, "Batman");
        assert_eq!(comic.chapter, Numbering::number(1.0));

        let book = parse("/lib/Batman 001.epub", LibraryType::Book);
        assert!(book.chapter.is_loose_leaf());
        assert_eq!(book.series, "Batman 001");
        assert_eq!(book.format, Format::Epub);
    }

    #[test]
    fn numbers_only_filename_takes_folder_name() {
        let info = parse("/lib/Naruto/Vol 02/012.cbz", LibraryType::Manga);
        assert_eq!(info.series, "Naruto");
        assert_eq!(info.volume, Numbering::number(2.0));
        assert_eq!(info.chapter, Numbering::number(12.0));
        assert!(info.series_from_folder);
    }

    #[test]
    fn specials_are_flagged() {
        let info = parse("/lib/Series/Series - Omake 2.cbz", LibraryType::Manga);
        assert!(info.is_special);
        assert_eq!(info.chapter, Numbering::Special);
        assert_eq!(info.series, "Series");

        let info = parse("/lib/Series/Specials/Drama CD.cbz", LibraryType::Manga);
        assert!(info.is_special);
        assert_eq!(info.series, "Series");
        assert!(info.series_from_folder);
    }

    #[test]
    fn editions_and_localized_titles_are_lifted() {
        let info = parse(
            "/lib/x/Berserk Deluxe Edition v01 (ベルセルク).cbz",
            LibraryType::Manga,
        );
        assert_eq!(info.series, "Berserk");
        assert_eq!(info.edition.as_deref(), Some("Deluxe Edition"));
        assert_eq!(info.localized_series.as_deref(), Some("ベルセルク"));
        assert_eq!(info.volume, Numbering::number(1.0));
    }

    #[test]
    fn cjk_markers() {
        let info = parse("/lib/x/鬼滅の刃 第3巻.cbz", LibraryType::Manga);
        assert_eq!(info.volume, Numbering::number(3.0));
        assert_eq!(info.series, "鬼滅の刃");
    }

    #[test]
    fn no_match_defaults_to_parent_folder() {
        let info = parse("/lib/Some Series/misc scans.cbz", LibraryType::Manga);
        assert_eq!(info.series, "Some Series");
        assert!(info.series_from_folder);
        assert!(info.volume.is_loose_leaf());
    }

    #[test]
    fn image_sets_use_folder_numbering() {
        let info = parse("/lib/Series Name/Chapter 3/page01.jpg", LibraryType::Image);
        assert_eq!(info.series, "Series Name");
        assert_eq!(info.chapter, Numbering::number(3.0));
        assert_eq!(info.format, Format::Image);

        let info = parse("/lib/Holiday Set/img_0001.png", LibraryType::Image);
        assert_eq!(info.series, "Holiday Set");
        assert!(info.chapter.is_loose_leaf());
    }

    #[test]
    fn parse_is_total_and_deterministic() {
        let parser = FilenameParser::default();
        let long = format!("/lib/{}.cbz", "(((a".repeat(400));
        let inputs = [
            "/lib/.cbz",
            "/lib/x/---.cbz",
            "/lib/x/v.cbz",
            "/lib/x/c-1-2-3-.cbz",
            "/lib/x/[]()(){}.cbz",
            "/lib/x/99999999999999999999999 v1.cbz",
            long.as_str(),
        ];
        for input in inputs {
            let first = parser.parse_in_root(Path::new(input), Path::new("/lib"), LibraryType::Manga);
            let second = parser.parse_in_root(Path::new(input), Path::new("/lib"), LibraryType::Manga);
            assert_eq!(first, second, "{input}");
            assert!(!first.series.is_empty(), "{input}");
        }
    }

    #[test]
    fn exhausted_budget_is_a_non_match() {
        let parser = FilenameParser::new(Duration::ZERO);
        let info = parser.parse_in_root(
            Path::new("/lib/Folder/Series v01.cbz"),
            Path::new("/lib"),
            LibraryType::Manga,
        );
        assert!(info.volume.is_loose_leaf());
        assert!(!info.series.is_empty());
    }
}
