//! Entry point that resolves, parses and validates scanner settings.

pub mod error;

use std::path::PathBuf;

use tracing::{info, warn};

use crate::models::scanner::{ScannerConfig, ScannerConfigSource};
use crate::validation::ConfigWarnings;
use error::ConfigLoadError;

/// Validated configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: ScannerConfig,
    pub source: ScannerConfigSource,
    pub warnings: ConfigWarnings,
}

/// Resolves the scanner configuration from an explicit path or the
/// environment, then applies the guard rails.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    explicit_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_path = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let (config, source) = match &self.explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigLoadError::Missing(path.clone()));
                }
                let config = ScannerConfig::load_from_file(path)?;
                (config, ScannerConfigSource::File(path.clone()))
            }
            None => ScannerConfig::load_from_env()?,
        };

        let origin = describe_source(&source);
        let warnings = config
            .validate()
            .map_err(|source| ConfigLoadError::Invalid {
                origin: origin.clone(),
                source,
            })?;

        for warning in warnings.iter() {
            warn!(target: "config", %warning, "scanner config warning");
        }
        info!(
            target: "config",
            source = %origin,
            libraries = config.libraries.len(),
            "loaded scanner config"
        );

        Ok(ConfigLoad {
            config,
            source,
            warnings,
        })
    }
}

fn describe_source(source: &ScannerConfigSource) -> String {
    match source {
        ScannerConfigSource::Default => "defaults".to_string(),
        ScannerConfigSource::EnvPath(path) => {
            format!("$FOLIO_SCAN_CONFIG_PATH ({})", path.display())
        }
        ScannerConfigSource::EnvInline => "$FOLIO_SCAN_CONFIG_JSON".to_string(),
        ScannerConfigSource::File(path) => path.display().to_string(),
    }
}
