use std::path::PathBuf;

use folio_model::{LibraryId, LibraryType};
use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}

/// One library as described by settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Stable identifier shared with the catalog store. Must not change
    /// between runs or every series would look new.
    pub id: LibraryId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub library_type: LibraryType,
    /// Root folders walked for this library. Series under different roots
    /// of the same library may merge; series of different libraries never do.
    pub roots: Vec<PathBuf>,
    /// Glob patterns matched against paths relative to each root, e.g.
    /// `**/Extras/**` or `*.tmp`.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Overrides `ScannerConfig::default_max_depth` for this library.
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl LibraryConfig {
    pub fn new(
        name: impl Into<String>,
        library_type: LibraryType,
        roots: Vec<PathBuf>,
    ) -> Self {
        Self {
            id: LibraryId::new(),
            name: name.into(),
            library_type,
            roots,
            exclude_patterns: Vec::new(),
            max_depth: None,
            enabled: true,
        }
    }

    pub fn with_excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }
}
