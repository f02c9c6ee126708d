#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Stratified sampling of matched rooftops.
//!
//! Draws a bounded-size uniform sample without replacement from each
//! group of a [`MatchedDataset`], grouped by a boundary column such as
//! the PSU identifier. The seed is an explicit parameter with a
//! documented default so the determinism contract is visible: identical
//! input and options always produce identical output, which survey
//! designs rely on for reproducibility.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rooftop_survey_matching::MatchedDataset;
use thiserror::Error;

/// Default sampling seed. Every group is drawn with a fresh
/// `StdRng::seed_from_u64(seed)` so results do not depend on group
/// visit order.
pub const DEFAULT_SEED: u64 = 42;

/// Errors that can occur during sampling.
#[derive(Debug, Error)]
pub enum SampleError {
    /// The named multiplier column exists in no record of the dataset.
    #[error("column '{column}' not present in the matched dataset")]
    UnknownColumn {
        /// The missing column name.
        column: String,
    },
}

/// Options for [`sample_rooftops`].
#[derive(Debug, Clone)]
pub struct SampleOptions {
    /// Base sample size per group.
    pub per_group: usize,
    /// Optional column whose value in a group's first row scales the
    /// base size: `per_group × floor(value)`.
    pub multiplier_column: Option<String>,
    /// Seed for the per-group RNG.
    pub seed: u64,
}

impl SampleOptions {
    #[must_use]
    pub const fn new(per_group: usize) -> Self {
        Self {
            per_group,
            multiplier_column: None,
            seed: DEFAULT_SEED,
        }
    }

    #[must_use]
    pub fn with_multiplier(mut self, column: impl Into<String>) -> Self {
        self.multiplier_column = Some(column.into());
        self
    }
}

/// Draws a per-group sample of `matched`, grouped by `group_column`.
///
/// Each group's target size is `per_group`, or
/// `per_group × floor(first_row[multiplier_column])` when a multiplier
/// column is configured, clamped to the group's row count; an
/// undersized group returns all of its rows rather than erroring.
/// Groups are visited in sorted key order and drawn independently with
/// a fixed seed, so two calls with identical input and options return
/// identical rows in identical order. Rows lacking the group column are
/// skipped. No cross-group deduplication is performed.
///
/// # Errors
///
/// Returns [`SampleError::UnknownColumn`] if `multiplier_column` is
/// configured but absent from every record. An empty input returns an
/// empty sample without the column check, since there are no records
/// to check it against.
pub fn sample_rooftops(
    matched: &MatchedDataset,
    group_column: &str,
    options: &SampleOptions,
) -> Result<MatchedDataset, SampleError> {
    // An empty input has nothing to sample and no rows to check the
    // multiplier column against; it is not a column error.
    if matched.is_empty() {
        return Ok(MatchedDataset::new());
    }
    if let Some(column) = &options.multiplier_column {
        if !matched.has_column(column) {
            return Err(SampleError::UnknownColumn {
                column: column.clone(),
            });
        }
    }

    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (row, record) in matched.iter().enumerate() {
        let Some(value) = record.column(group_column) else {
            log::warn!("Skipping row {row} without group column '{group_column}'");
            continue;
        };
        groups.entry(group_key(value)).or_default().push(row);
    }

    let mut sampled = MatchedDataset::new();
    for (key, rows) in &groups {
        let target = target_size(matched, rows, options);
        let size = target.min(rows.len());
        let mut rng = StdRng::seed_from_u64(options.seed);
        let picked = rand::seq::index::sample(&mut rng, rows.len(), size);
        for index in picked.iter() {
            sampled.records.push(matched.records[rows[index]].clone());
        }
        log::debug!("Group {key}: sampled {size} of {} row(s)", rows.len());
    }

    Ok(sampled)
}

/// Canonical grouping key for an attribute value. Strings group by
/// their content; any other JSON value groups by its serialization.
fn group_key(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn target_size(matched: &MatchedDataset, rows: &[usize], options: &SampleOptions) -> usize {
    let Some(column) = &options.multiplier_column else {
        return options.per_group;
    };
    let first = &matched.records[rows[0]];
    let multiplier = first.column(column).and_then(serde_json::Value::as_f64);
    multiplier.map_or_else(
        || {
            log::warn!("Group first row has no numeric '{column}' value, using base size");
            options.per_group
        },
        |value| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let floored = value.floor().max(0.0) as usize;
            // An absurd multiplier saturates instead of overflowing;
            // the clamp to the group's row count bounds it anyway.
            options.per_group.saturating_mul(floored)
        },
    )
}

#[cfg(test)]
mod tests {
    use geo::Point;
    use rooftop_survey_cells::{CellId, Level};
    use rooftop_survey_matching::RooftopRecord;

    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn record(psu: &str, multiplier: Option<i64>, row: usize) -> RooftopRecord {
        let mut boundary_attributes = serde_json::Map::new();
        boundary_attributes.insert(
            "psu_id".to_string(),
            serde_json::Value::String(psu.to_string()),
        );
        if let Some(m) = multiplier {
            boundary_attributes.insert("sample_multiplier".to_string(), serde_json::Value::from(m));
        }
        let mut attributes = serde_json::Map::new();
        attributes.insert("rooftop_id".to_string(), serde_json::Value::from(row as u64));
        RooftopRecord {
            centroid: Point::new(77.59 + row as f64 * 0.001, 12.97),
            cell: CellId::from_lng_lat(77.59, 12.97, Level::new(8).unwrap()),
            attributes,
            boundary_attributes,
        }
    }

    fn dataset(rows: &[(&str, Option<i64>)]) -> MatchedDataset {
        let mut dataset = MatchedDataset::new();
        for (row, &(psu, multiplier)) in rows.iter().enumerate() {
            dataset.records.push(record(psu, multiplier, row));
        }
        dataset
    }

    #[test]
    fn sampling_is_deterministic() {
        let data = dataset(&[("A", None); 20]);
        let options = SampleOptions::new(5);

        let first = sample_rooftops(&data, "psu_id", &options).unwrap();
        let second = sample_rooftops(&data, "psu_id", &options).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn undersized_group_returns_all_rows() {
        let data = dataset(&[("A", None), ("A", None), ("A", None)]);
        let options = SampleOptions::new(10);

        let sampled = sample_rooftops(&data, "psu_id", &options).unwrap();
        assert_eq!(sampled.len(), 3);
    }

    #[test]
    fn multiplier_scales_and_clamps_per_group() {
        // Group A: 5 rows, multiplier 2, base 2 -> target 4.
        // Group B: 2 rows, multiplier 3, base 2 -> target 6 clamped to 2.
        let mut rows = vec![("A", Some(2)); 5];
        rows.extend(vec![("B", Some(3)); 2]);
        let data = dataset(&rows);
        let options = SampleOptions::new(2).with_multiplier("sample_multiplier");

        let sampled = sample_rooftops(&data, "psu_id", &options).unwrap();
        let count = |psu: &str| {
            sampled
                .iter()
                .filter(|r| r.column("psu_id") == Some(&serde_json::Value::String(psu.to_string())))
                .count()
        };
        assert_eq!(count("A"), 4);
        assert_eq!(count("B"), 2);
        assert_eq!(sampled.len(), 6);
    }

    #[test]
    fn unknown_multiplier_column_is_rejected() {
        let data = dataset(&[("A", None)]);
        let options = SampleOptions::new(2).with_multiplier("nope");

        let err = sample_rooftops(&data, "psu_id", &options).unwrap_err();
        assert!(matches!(err, SampleError::UnknownColumn { column } if column == "nope"));
    }

    #[test]
    fn huge_multiplier_saturates_and_clamps() {
        let mut data = dataset(&[("A", None); 3]);
        for row in &mut data.records {
            row.boundary_attributes
                .insert("sample_multiplier".to_string(), serde_json::Value::from(1e300));
        }
        let options = SampleOptions::new(2).with_multiplier("sample_multiplier");

        let sampled = sample_rooftops(&data, "psu_id", &options).unwrap();
        assert_eq!(sampled.len(), 3);
    }

    #[test]
    fn empty_dataset_yields_empty_sample_even_with_multiplier() {
        let data = MatchedDataset::new();
        let options = SampleOptions::new(2).with_multiplier("sample_multiplier");

        let sampled = sample_rooftops(&data, "psu_id", &options).unwrap();
        assert!(sampled.is_empty());
    }

    #[test]
    fn rows_without_group_column_are_skipped() {
        let mut data = dataset(&[("A", None)]);
        // A record with neither psu_id nor multiplier columns.
        let mut orphan = record("A", None, 1);
        orphan.boundary_attributes.clear();
        data.records.push(orphan);

        let sampled = sample_rooftops(&data, "psu_id", &SampleOptions::new(10)).unwrap();
        assert_eq!(sampled.len(), 1);
    }

    #[test]
    fn groups_are_visited_in_sorted_order() {
        let data = dataset(&[("B", None), ("A", None)]);
        let sampled = sample_rooftops(&data, "psu_id", &SampleOptions::new(10)).unwrap();
        assert_eq!(
            sampled.records[0].column("psu_id"),
            Some(&serde_json::Value::String("A".to_string()))
        );
    }
}
