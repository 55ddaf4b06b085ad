//! Lock-aware metadata comparison.

use folio_config::MetadataPolicy;
use folio_model::{FieldChange, LockedFields, MetadataField, MetadataSet};

#[derive(Debug, Default)]
pub(crate) struct FieldDiff {
    pub changes: Vec<FieldChange>,
    /// Fields whose scanned value differs but stayed put because of a lock.
    pub held_by_lock: Vec<MetadataField>,
}

/// Compare scanned values against the catalog. Fields the scan did not see
/// are never cleared.
pub(crate) fn diff_fields(
    current: &MetadataSet,
    locked: &LockedFields,
    scanned: &MetadataSet,
    policy: &MetadataPolicy,
) -> FieldDiff {
    let mut diff = FieldDiff::default();
    for (field, value) in scanned.iter() {
        if current.get(field) == Some(value) {
            continue;
        }
        let is_locked = locked.contains(&field);
        if policy.may_write(field, is_locked) {
            diff.changes.push(FieldChange {
                field,
                previous: current.get(field).cloned(),
                value: value.clone(),
            });
        } else if is_locked && policy.enabled_fields.contains(&field) {
            diff.held_by_lock.push(field);
        }
    }
    diff
}

/// The subset of `scanned` a new entity may carry.
pub(crate) fn writable(scanned: &MetadataSet, policy: &MetadataPolicy) -> MetadataSet {
    scanned
        .iter()
        .filter(|(field, _)| policy.may_write(*field, false))
        .map(|(field, value)| (field, value.clone()))
        .collect()
}

pub(crate) fn field_label(field: MetadataField) -> &'static str {
    match field {
        MetadataField::Name => "name",
        MetadataField::LocalizedName => "localized name",
        MetadataField::Title => "title",
        MetadataField::Summary => "summary",
        MetadataField::ReleaseDate => "release date",
        MetadataField::AgeRating => "age rating",
        MetadataField::Genres => "genres",
        MetadataField::Tags => "tags",
        MetadataField::People => "people",
        MetadataField::Publisher => "publisher",
        MetadataField::Language => "language",
    }
}

#[cfg(test)]
mod tests {
    use folio_model::FieldValue;

    use super::*;

    fn set(field: MetadataField, text: &str) -> MetadataSet {
        [(field, FieldValue::Text(text.to_string()))].into_iter().collect()
    }

    #[test]
    fn locked_fields_hold() {
        let current = set(MetadataField::Summary, "Edited by hand");
        let locked: LockedFields = [MetadataField::Summary].into_iter().collect();
        let scanned = set(MetadataField::Summary, "From sidecar");

        let diff = diff_fields(&current, &locked, &scanned, &MetadataPolicy::default());
        assert!(diff.changes.is_empty());
        assert_eq!(diff.held_by_lock, vec![MetadataField::Summary]);

        let overriding = MetadataPolicy {
            override_locks: true,
            ..MetadataPolicy::default()
        };
        let diff = diff_fields(&current, &locked, &scanned, &overriding);
        assert_eq!(diff.changes.len(), 1);
        assert_eq!(
            diff.changes[0].previous,
            Some(FieldValue::Text("Edited by hand".into()))
        );
    }

    #[test]
    fn unseen_fields_are_kept_and_disabled_fields_ignored() {
        let current = set(MetadataField::Publisher, "Kept");
        let scanned = set(MetadataField::Title, "New");
        let policy = MetadataPolicy {
            enabled_fields: [MetadataField::Summary].into_iter().collect(),
            override_locks: false,
        };
        let diff = diff_fields(&current, &LockedFields::new(), &scanned, &policy);
        assert!(diff.changes.is_empty());
        assert!(diff.held_by_lock.is_empty());
        assert!(writable(&scanned, &policy).is_empty());
    }
}
