//! Pairs scanned series with persisted ones.
//!
//! Exact key matches are taken first. A scanned series left over is then
//! matched by content: the persisted series owning most of the missing
//! files that reappear inside it is treated as renamed, keeping its id.

use std::collections::{BTreeMap, HashMap, HashSet};

use folio_model::{Format, PersistedSeries, ScannedSeries};
use tracing::info;

use super::index::FileIndex;

/// How a scanned series was paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesMatch {
    /// Same normalized name and format.
    Exact(usize),
    /// Files moved here from a persisted series stored under another name.
    Renamed(usize),
    New,
}

impl SeriesMatch {
    pub fn persisted(self) -> Option<usize> {
        match self {
            SeriesMatch::Exact(position) | SeriesMatch::Renamed(position) => Some(position),
            SeriesMatch::New => None,
        }
    }
}

/// One entry per scanned series, in the same order.
pub(crate) fn match_series(
    persisted: &[PersistedSeries],
    scanned: &[ScannedSeries],
    index: &FileIndex,
) -> Vec<SeriesMatch> {
    let by_key: HashMap<(&str, Format), usize> = persisted
        .iter()
        .enumerate()
        .map(|(position, series)| ((series.normalized_name.as_str(), series.format), position))
        .collect();

    let mut claimed = HashSet::new();
    let mut matches: Vec<SeriesMatch> = scanned
        .iter()
        .map(|series| {
            match by_key.get(&(series.normalized_name.as_str(), series.format)) {
                Some(&position) if claimed.insert(position) => SeriesMatch::Exact(position),
                _ => SeriesMatch::New,
            }
        })
        .collect();

    for (slot, series) in matches.iter_mut().zip(scanned) {
        if *slot != SeriesMatch::New {
            continue;
        }
        let mut hits: BTreeMap<usize, usize> = BTreeMap::new();
        for file in series.files() {
            let Some(key) = file.file.fingerprint.identity_key() else {
                continue;
            };
            for location in index.missing_with_identity(&key) {
                let candidate = &persisted[location.series];
                if candidate.format == series.format && !claimed.contains(&location.series) {
                    *hits.entry(location.series).or_default() += 1;
                }
            }
        }
        // Most hits wins; ties go to the earlier persisted series.
        let best = hits
            .into_iter()
            .max_by(|(left_pos, left), (right_pos, right)| {
                left.cmp(right).then(right_pos.cmp(left_pos))
            });
        if let Some((position, count)) = best {
            claimed.insert(position);
            info!(
                target: "scan::reconcile",
                from = %persisted[position].name,
                to = %series.name,
                matching_files = count,
                "series matched by file fingerprint"
            );
            *slot = SeriesMatch::Renamed(position);
        }
    }
    matches
}
