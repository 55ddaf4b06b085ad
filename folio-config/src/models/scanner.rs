use anyhow::{Context, anyhow};
use folio_model::LibraryId;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use super::library::LibraryConfig;
use super::metadata::MetadataPolicy;

/// Source that produced the scanner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScannerConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

fn default_parallel_files() -> usize {
    num_cpus::get().max(2)
}

/// Top-level scanner settings. Read once when a scan starts.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Libraries known to the scanner.
    pub libraries: Vec<LibraryConfig>,
    /// How many libraries may scan at once. A single library is never
    /// reconciled by more than one worker.
    pub max_parallel_libraries: usize,
    /// Files inspected concurrently inside one library (parse + archive
    /// read). Defaults to the CPU count.
    pub max_parallel_files: usize,
    /// Archives held open at the same time across all libraries. Keep this
    /// well below the process file-descriptor limit.
    pub max_open_archives: usize,
    /// Time allowed to open and inspect a single archive before it is
    /// abandoned and reported as a file error.
    pub archive_timeout_ms: u64,
    /// Time budget for matching one filename against the pattern cascade.
    pub parse_budget_ms: u64,
    /// Follow symbolic links while walking. Cycles are detected either way.
    pub follow_symlinks: bool,
    /// Recursion limit below each library root.
    pub default_max_depth: usize,
    /// Capacity of the in-process progress event channel.
    pub event_capacity: usize,
    pub metadata: MetadataPolicy,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            libraries: Vec::new(),
            max_parallel_libraries: 2,
            max_parallel_files: default_parallel_files(),
            max_open_archives: 8,
            archive_timeout_ms: 30_000,
            parse_budget_ms: 250,
            follow_symlinks: true,
            default_max_depth: 32,
            event_capacity: 1_024,
            metadata: MetadataPolicy::default(),
        }
    }
}

impl ScannerConfig {
    /// Load scanner configuration overrides using environment variables.
    /// Evaluation order:
    /// 1) `$FOLIO_SCAN_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$FOLIO_SCAN_CONFIG_JSON` (inline JSON),
    /// 3) well-known files in the working directory,
    /// 4) defaults if none of the above is present.
    pub fn load_from_env() -> anyhow::Result<(Self, ScannerConfigSource)> {
        if let Ok(path_str) = env::var("FOLIO_SCAN_CONFIG_PATH")
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path)?;
            return Ok((config, ScannerConfigSource::EnvPath(path)));
        }

        if let Ok(raw) = env::var("FOLIO_SCAN_CONFIG_JSON")
            && !raw.trim().is_empty()
        {
            let parsed = Self::parse_json(&raw)
                .context("failed to parse FOLIO_SCAN_CONFIG_JSON")?;
            return Ok((parsed, ScannerConfigSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file() {
            let config = Self::load_from_file(&path)?;
            return Ok((config, ScannerConfigSource::File(path)));
        }

        Ok((Self::default(), ScannerConfigSource::Default))
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| {
            format!("failed to read scanner config from {}", path.display())
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents).with_context(|| {
                format!("invalid scanner config {}", path.display())
            }),
            Some("toml") | Some("tml") => {
                toml::from_str(&contents).map_err(|err| {
                    anyhow!(
                        "invalid scanner config {}: {}",
                        path.display(),
                        err
                    )
                })
            }
            _ => Self::parse_from_str(&contents, &path.display().to_string()),
        }
    }

    pub fn parse_from_str(
        contents: &str,
        origin: &str,
    ) -> anyhow::Result<Self> {
        // Try TOML first, then JSON for convenience.
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                anyhow!(
                    "failed to parse scanner config {}: toml error: {}; json error: {}",
                    origin,
                    toml_err,
                    json_err
                )
            })
        })
    }

    pub fn parse_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| anyhow!("invalid scanner config json: {err}"))
    }

    fn find_default_file() -> Option<PathBuf> {
        const CANDIDATES: &[&str] = &[
            "folio.toml",
            "folio.json",
            "config/folio.toml",
            "config/folio.json",
        ];

        CANDIDATES
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(|path| path.to_path_buf())
    }

    pub fn library(&self, id: LibraryId) -> Option<&LibraryConfig> {
        self.libraries.iter().find(|library| library.id == id)
    }

    pub fn enabled_libraries(&self) -> impl Iterator<Item = &LibraryConfig> {
        self.libraries.iter().filter(|library| library.enabled)
    }

    pub fn archive_timeout(&self) -> Duration {
        Duration::from_millis(self.archive_timeout_ms)
    }

    pub fn parse_budget(&self) -> Duration {
        Duration::from_millis(self.parse_budget_ms)
    }

    /// Effective recursion depth for `library`.
    pub fn max_depth_for(&self, library: &LibraryConfig) -> usize {
        library.max_depth.unwrap_or(self.default_max_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_model::LibraryType;

    #[test]
    fn parses_toml_with_defaults_for_missing_keys() {
        let raw = r#"
            max_parallel_libraries = 1

            [[libraries]]
            id = "0192b7a4-51c1-7f3e-9d1c-3a2b1c0d9e8f"
            name = "Manga"
            type = "manga"
            roots = ["/srv/manga"]
            exclude_patterns = ["**/@eaDir/**"]
        "#;

        let config = ScannerConfig::parse_from_str(raw, "inline").unwrap();
        assert_eq!(config.max_parallel_libraries, 1);
        assert_eq!(config.max_open_archives, 8);
        assert_eq!(config.libraries.len(), 1);
        let library = &config.libraries[0];
        assert_eq!(library.library_type, LibraryType::Manga);
        assert!(library.enabled);
        assert_eq!(config.max_depth_for(library), 32);
    }

    #[test]
    fn falls_back_to_json() {
        let raw = r#"{"archive_timeout_ms": 500, "libraries": []}"#;
        let config = ScannerConfig::parse_from_str(raw, "inline").unwrap();
        assert_eq!(config.archive_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn reports_both_parse_errors() {
        let err = ScannerConfig::parse_from_str("not = [valid", "inline")
            .unwrap_err()
            .to_string();
        assert!(err.contains("toml error"));
        assert!(err.contains("json error"));
    }
}
