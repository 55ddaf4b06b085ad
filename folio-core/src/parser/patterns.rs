//! Pattern tables for the filename cascade, in priority order per family.
//!
//! Numbers are captured as `\d+(?:\.\d+)?` so padded and fractional values
//! (`001.5`) survive until normalization.

use once_cell::sync::Lazy;
use regex::Regex;

use super::budget::compile;

pub type PatternTable = Vec<(&'static str, Regex)>;

/// Volume and chapter captured together. Outrank everything else.
pub static COMBINED_PATTERNS: Lazy<PatternTable> = Lazy::new(|| {
    vec![
        (
            "volume_chapter",
            compile(
                r"(?i)\b(?:vol(?:ume)?\.?\s?|v\.?)(?P<volume>\d+(?:\.\d+)?)[\s.,-]*(?:ch(?:apter|ap)?\.?\s?|c|#|ep(?:isode)?\.?\s?)(?P<chapter>\d+(?:\.\d+)?)(?:\s?-\s?(?:ch(?:apter|ap)?\.?\s?|c)?(?P<chapter_end>\d+(?:\.\d+)?))?\b",
            ),
        ),
        (
            "cjk_volume_chapter",
            compile(
                r"第?\s?(?P<volume>\d+)\s?[巻卷권]\s?第?\s?(?P<chapter>\d+(?:\.\d+)?)\s?[話话章回화]",
            ),
        ),
    ]
});

pub static VOLUME_PATTERNS: Lazy<PatternTable> = Lazy::new(|| {
    vec![
        (
            "volume_range",
            compile(
                r"(?i)\b(?:(?:vol(?:ume)?s?|tomes?|tomo|band)\.?\s?|v\.?|t)(?P<start>\d+(?:\.\d+)?)\s?-\s?(?:(?:vol(?:ume)?|tome)\.?\s?|v|t)?(?P<end>\d+(?:\.\d+)?)\b",
            ),
        ),
        (
            "volume",
            compile(
                r"(?i)\b(?:(?:vol(?:ume)?|tome|tomo|band)\.?\s?|v\.?|t)(?P<volume>\d+(?:\.\d+)?)\b",
            ),
        ),
        ("cjk_volume", compile(r"第?\s?(?P<volume>\d+)\s?[巻卷권]")),
    ]
});

pub static CHAPTER_PATTERNS: Lazy<PatternTable> = Lazy::new(|| {
    vec![
        (
            "chapter_range",
            compile(
                r"(?i)(?:\b(?:ch(?:apter|ap)?s?|episodes?|ep|issues?)\.?\s?|\bc|#)(?P<start>\d+(?:\.\d+)?)\s?-\s?(?:(?:ch(?:apter|ap)?|ep)\.?\s?|c|#)?(?P<end>\d+(?:\.\d+)?)\b",
            ),
        ),
        (
            "chapter",
            compile(
                r"(?i)(?:\b(?:ch(?:apter|ap)?|episode|ep|issue)\.?\s?|\bc|#)(?P<chapter>\d+(?:\.\d+)?)\b",
            ),
        ),
        (
            "cjk_chapter",
            compile(r"第?\s?(?P<chapter>\d+(?:\.\d+)?)\s?[話话章回화]"),
        ),
    ]
});

/// Trailing numbers without a marker. Only tried for manga and comic
/// libraries, and only when nothing more specific matched.
pub static BARE_PATTERNS: Lazy<PatternTable> = Lazy::new(|| {
    vec![
        (
            "bare_range",
            compile(
                r"^(?P<series>.*?\S)[\s-]+(?P<start>\d{1,4}(?:\.\d+)?)\s?-\s?(?P<end>\d{1,4}(?:\.\d+)?)\s*$",
            ),
        ),
        (
            "bare_number",
            compile(r"^(?P<series>.*?\S)[\s-]+(?P<chapter>\d{1,4}(?:\.\d+)?)\s*$"),
        ),
        ("bare_only", compile(r"^\s*(?P<chapter>\d{1,4}(?:\.\d+)?)\s*$")),
    ]
});

pub static SPECIAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\b(?:sp\s?\d+|specials?|omake|one[\s-]?shots?|ova|oav|side[\s-]stor(?:y|ies)|bonus(?:\s(?:chapter|story))?|art\s?(?:book|collection)|extras?\s(?:chapter|story))\b",
    )
});

pub static EDITION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)[\[(]?\b(?P<edition>omnibus(?:\sedition)?|deluxe(?:\sedition)?|full[\s-]colou?r(?:\sedition)?|colou?red(?:\sedition)?|uncensored|collector'?s(?:\sedition)?|perfect\sedition|complete\sedition|special\sedition|anniversary\sedition|kanzenban|aizouban|shinsouban|bunko(?:ban)?|wideban)\b[\])]?",
    )
});

/// Leading `[Group]` or `(Publisher)` tag.
pub static GROUP_PATTERN: Lazy<Regex> =
    Lazy::new(|| compile(r"^\s*[\[(](?P<group>[^\[\]()]+)[\])]"));

pub static YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| compile(r"[\[(](?P<year>(?:19|20)\d{2})[\])]"));

/// Bracketed alternate title written in a CJK script.
pub static LOCALIZED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"[\[(](?P<localized>[^\[\]()\d]*[\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}][^\[\]()\d]*)[\])]",
    )
});

pub static BRACKET_PATTERN: Lazy<Regex> =
    Lazy::new(|| compile(r"\[[^\]]*\]|\([^)]*\)|\{[^}]*\}"));

pub static RESOLUTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b\d{3,4}\s?[x×]\s?\d{3,4}\b|\b\d{3,4}p\b")
});

/// Folder names that only carry numbering (`Vol 01`, `Chapter 3`,
/// `Specials`) and therefore never name a series.
pub static MARKER_FOLDER_PATTERNS: Lazy<PatternTable> = Lazy::new(|| {
    vec![
        (
            "volume_folder",
            compile(r"(?i)^\s*(?:vol(?:ume)?|tome|v)\.?\s?(?P<volume>\d+(?:\.\d+)?)\s*$"),
        ),
        (
            "chapter_folder",
            compile(
                r"(?i)^\s*(?:ch(?:apter)?|c|episode|ep)\.?\s?(?P<chapter>\d+(?:\.\d+)?)\s*$",
            ),
        ),
        (
            "special_folder",
            compile(r"(?i)^\s*(?:specials?|extras?|omake|sp)\s*$"),
        ),
    ]
});
