use crate::format::Format;

/// Library type hint supplied by settings. Steers filename parsing and the
/// default format family for files that do not announce one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum LibraryType {
    #[default]
    Manga,
    Comic,
    Book,
    Image,
}

impl LibraryType {
    /// Whether a bare trailing number (`Series 012`) counts as a chapter.
    pub fn allows_bare_chapter_numbers(self) -> bool {
        matches!(self, LibraryType::Manga | LibraryType::Comic)
    }

    pub fn preferred_format(self) -> Format {
        match self {
            LibraryType::Manga | LibraryType::Comic => Format::Archive,
            LibraryType::Book => Format::Epub,
            LibraryType::Image => Format::Image,
        }
    }
}

impl std::fmt::Display for LibraryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryType::Manga => write!(f, "Manga"),
            LibraryType::Comic => write!(f, "Comics"),
            LibraryType::Book => write!(f, "Books"),
            LibraryType::Image => write!(f, "Images"),
        }
    }
}
