use crate::format::Format;
use crate::numbers::Numbering;

/// Structured information derived purely from a file's path text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParsedInfo {
    /// Cleaned display name.
    pub series: String,
    /// Case, whitespace and punctuation insensitive grouping key.
    pub normalized_series: String,
    pub localized_series: Option<String>,
    pub volume: Numbering,
    pub chapter: Numbering,
    pub is_special: bool,
    pub edition: Option<String>,
    pub format: Format,
    pub year: Option<u16>,
    /// Leading `[Group]` / `(Publisher)` tag.
    pub group: Option<String>,
    /// True when the series name had to fall back to a folder name.
    pub series_from_folder: bool,
}

impl ParsedInfo {
    pub fn has_volume(&self) -> bool {
        !self.volume.is_loose_leaf()
    }

    pub fn has_chapter(&self) -> bool {
        !matches!(self.chapter, Numbering::LooseLeaf | Numbering::Special)
    }
}
