/// Closed set of format families the scanner understands.
///
/// Zip and rar containers both land in [`Format::Archive`]; the archive
/// reader picks the container backend from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Format {
    #[default]
    Archive,
    Epub,
    Pdf,
    Image,
}

impl Format {
    /// Book formats are single files that describe themselves.
    pub fn is_book(self) -> bool {
        matches!(self, Format::Epub | Format::Pdf)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Archive => "archive",
            Format::Epub => "epub",
            Format::Pdf => "pdf",
            Format::Image => "image",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
