use std::path::PathBuf;

use thiserror::Error;

use crate::validation::ConfigGuardRailError;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to load scanner config: {0:#}")]
    Load(#[from] anyhow::Error),

    #[error("scanner config from {origin} is invalid: {source}")]
    Invalid {
        origin: String,
        #[source]
        source: ConfigGuardRailError,
    },

    #[error("scanner config file {0} does not exist")]
    Missing(PathBuf),
}
