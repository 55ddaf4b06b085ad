use std::collections::BTreeSet;

use folio_model::MetadataField;
use serde::{Deserialize, Serialize};

fn all_fields() -> BTreeSet<MetadataField> {
    MetadataField::ALL.into_iter().collect()
}

/// Which metadata fields a scan may write, and whether it may overwrite
/// fields that a manual edit locked.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct MetadataPolicy {
    /// Fields sidecar metadata is allowed to populate. Fields missing from
    /// this set are left exactly as the catalog has them.
    pub enabled_fields: BTreeSet<MetadataField>,
    /// Allow sidecar values to replace locked fields. Off by default; a
    /// locked field otherwise never changes during a scan.
    pub override_locks: bool,
}

impl Default for MetadataPolicy {
    fn default() -> Self {
        Self {
            enabled_fields: all_fields(),
            override_locks: false,
        }
    }
}

impl MetadataPolicy {
    /// Whether `field` may be written given its current lock state.
    pub fn may_write(&self, field: MetadataField, locked: bool) -> bool {
        self.enabled_fields.contains(&field) && (!locked || self.override_locks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_fields_are_protected_by_default() {
        let policy = MetadataPolicy::default();
        assert!(policy.may_write(MetadataField::Summary, false));
        assert!(!policy.may_write(MetadataField::Summary, true));
    }

    #[test]
    fn disabled_fields_are_never_written() {
        let policy = MetadataPolicy {
            enabled_fields: [MetadataField::Title].into_iter().collect(),
            override_locks: true,
        };
        assert!(policy.may_write(MetadataField::Title, true));
        assert!(!policy.may_write(MetadataField::Genres, false));
    }
}
