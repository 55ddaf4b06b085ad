use std::sync::{Arc, RwLock};

use folio_config::ScannerConfig;

/// Read-only settings source. A scan takes one snapshot when it starts and
/// never looks again.
pub trait SettingsProvider: Send + Sync {
    fn snapshot(&self) -> ScannerConfig;
}

impl SettingsProvider for ScannerConfig {
    fn snapshot(&self) -> ScannerConfig {
        self.clone()
    }
}

/// Settings that may be swapped between scans, e.g. after an operator
/// edits the config file.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<ScannerConfig>>,
}

impl SharedSettings {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn replace(&self, config: ScannerConfig) {
        match self.inner.write() {
            Ok(mut guard) => *guard = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }
}

impl SettingsProvider for SharedSettings {
    fn snapshot(&self) -> ScannerConfig {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_detached_from_later_edits() {
        let shared = SharedSettings::new(ScannerConfig::default());
        let before = shared.snapshot();
        shared.replace(ScannerConfig {
            max_parallel_libraries: 7,
            ..ScannerConfig::default()
        });
        assert_eq!(before.max_parallel_libraries, 2);
        assert_eq!(shared.snapshot().max_parallel_libraries, 7);
    }
}
